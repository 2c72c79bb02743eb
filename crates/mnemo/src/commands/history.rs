//! History command - print a session's messages.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use mnemo_types::Role;

use super::Context;

/// Arguments for the history command.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Session key (e.g. telegram:123456)
    pub key: String,

    /// Only show the last N messages
    #[arg(short = 'n', long)]
    pub last: Option<usize>,
}

/// Run the history command.
pub async fn run(args: HistoryArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store(false).await?;
    let dim = Style::new().dim();

    let history = store.get_history(&args.key);
    let skip = args
        .last
        .map(|n| history.len().saturating_sub(n))
        .unwrap_or(0);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&history[skip..])?);
        return Ok(());
    }

    if history.is_empty() {
        println!("{}", dim.apply_to(format!("No messages for '{}'", args.key)));
        return Ok(());
    }

    let summary = store.get_summary(&args.key);
    if !summary.is_empty() {
        println!("{} {}", style("Summary:").bold(), summary);
        println!();
    }

    for (i, message) in history.iter().enumerate().skip(skip) {
        let role = match message.role {
            Role::User => style(message.role.as_str()).green(),
            Role::Assistant => style(message.role.as_str()).cyan(),
            Role::System | Role::Tool => style(message.role.as_str()).dim(),
        };
        println!("{} {}", dim.apply_to(format!("[{i:>3}]")), role.bold());
        if !message.content.is_empty() {
            println!("{}", message.content);
        }
        for call in &message.tool_calls {
            println!(
                "{}",
                dim.apply_to(format!(
                    "  -> {}({})",
                    call.function.name,
                    super::truncate(&call.function.arguments, 60)
                ))
            );
        }
        println!();
    }

    Ok(())
}
