//! Reindex and forget commands - maintain the semantic index.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};

use super::Context;

/// Arguments for the reindex command.
#[derive(Args, Debug)]
pub struct ReindexArgs {
    /// Session key to rebuild
    pub key: String,
}

/// Arguments for the forget command.
#[derive(Args, Debug)]
pub struct ForgetArgs {
    /// Session key to clear
    pub key: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Rebuild one session's semantic index entries from its snapshot.
pub async fn run_reindex(args: ReindexArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store(true).await?;
    if !store.semantic().is_enabled() {
        bail!("semantic memory is not available; run `mnemo check` for details");
    }
    if store.get_history(&args.key).is_empty() {
        bail!("no messages stored for '{}'", args.key);
    }

    let count = store.reindex(&args.key).await?;
    println!(
        "{} Reindexed {} message(s) for {}",
        Style::new().green().apply_to("✓"),
        style(count).cyan(),
        style(&args.key).bold()
    );
    Ok(())
}

/// Clear a session's history on disk and drop it from the semantic index.
pub async fn run_forget(args: ForgetArgs, ctx: &Context) -> Result<()> {
    if !args.yes {
        bail!(
            "this clears every message of '{}'; re-run with --yes to confirm",
            args.key
        );
    }

    let store = ctx.open_store(true).await?;
    if !store.keys().contains(&args.key) {
        bail!("unknown session '{}'", args.key);
    }

    store.clear(&args.key);
    store.flush().await?;
    store.save(&args.key)?;

    let note = if store.semantic().is_enabled() {
        ""
    } else {
        " (semantic index not reachable; only the log was cleared)"
    };
    println!(
        "{} Cleared {}{}",
        Style::new().green().apply_to("✓"),
        style(&args.key).bold(),
        Style::new().dim().apply_to(note)
    );
    Ok(())
}
