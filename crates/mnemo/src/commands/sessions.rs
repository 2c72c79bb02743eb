//! Sessions command - list stored sessions.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde_json::json;

use super::Context;

/// Arguments for the sessions command.
#[derive(Args, Debug)]
pub struct SessionsArgs {}

/// Run the sessions command.
pub async fn run(_args: SessionsArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store(false).await?;
    let dim = Style::new().dim();

    let rows: Vec<_> = store
        .keys()
        .into_iter()
        .map(|key| {
            let session = store.get_or_create(&key);
            (key, session.len(), session.updated)
        })
        .collect();

    if ctx.json_output {
        let out: Vec<_> = rows
            .iter()
            .map(|(key, count, updated)| {
                json!({"key": key, "messages": count, "updated": updated.to_rfc3339()})
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("{}", dim.apply_to("No sessions found"));
        if let Some(dir) = store.storage_dir() {
            println!("{}", dim.apply_to(format!("(looked in {})", dir.display())));
        }
        return Ok(());
    }

    println!("{}", style("Sessions").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    for (key, count, updated) in rows {
        println!(
            "  {:<32} {:>5} msgs  {}",
            style(key).cyan(),
            count,
            dim.apply_to(updated.format("%Y-%m-%d %H:%M"))
        );
    }

    Ok(())
}
