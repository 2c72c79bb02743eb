//! Search command - semantic recall over stored messages.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use mnemo_memory::{RecallFilters, RecallQuery, recall};

use super::Context;

/// Arguments for the search command.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Restrict to one session (default: all sessions)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Only messages with this role (user, assistant, system)
    #[arg(short, long)]
    pub role: Option<String>,

    /// Only messages stored at or after this time (RFC 3339)
    #[arg(long)]
    pub from: Option<String>,

    /// Only messages stored at or before this time (RFC 3339)
    #[arg(long)]
    pub to: Option<String>,

    /// Maximum results to return (1-20)
    #[arg(short, long, default_value = "5")]
    pub limit: i64,
}

/// Run the search command.
pub async fn run(args: SearchArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store(true).await?;
    if !store.semantic().is_enabled() {
        bail!("semantic memory is not available; run `mnemo check` for details");
    }

    let query = RecallQuery::new(args.query)
        .with_limit(args.limit)
        .with_filters(RecallFilters {
            role: args.role,
            session_key: args.session,
            timestamp_from: args.from,
            timestamp_to: args.to,
        });

    if ctx.verbose {
        let dim = Style::new().dim();
        println!(
            "{}",
            dim.apply_to(format!(
                "Searching: \"{}\" (limit: {})",
                query.query_text,
                query.effective_limit()
            ))
        );
        println!();
    }

    let results = recall(store.semantic(), "", &query).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("{}", Style::new().dim().apply_to(mnemo_memory::retrieval::NO_RESULTS));
    } else {
        println!("{}", style("Memory Search Results").bold());
        println!("{}", Style::new().dim().apply_to("─".repeat(50)));
        println!();
        println!("{}", mnemo_memory::format_results(&results));
    }

    Ok(())
}
