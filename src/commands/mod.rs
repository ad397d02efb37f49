//! CLI command handlers.

mod add;
mod config;
mod context;
mod editions;
mod enrich;
mod links;
mod search;

pub use add::run_add_command;
pub use config::run_config_show_command;
pub use context::AppContext;
pub use editions::run_editions_command;
pub use enrich::run_enrich_command;
pub use links::run_links_command;
pub use search::run_search_command;

use anyhow::{Context, Result};
use serde::Serialize;

/// Prints `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}
