//! Editions command handler.

use anyhow::{Context, Result};

use super::{AppContext, print_json};
use crate::cli::EditionsArgs;

pub async fn run_editions_command(context: &AppContext, args: &EditionsArgs) -> Result<()> {
    let book = context
        .catalog
        .require(args.book_id)
        .await
        .with_context(|| format!("cannot list editions of book {}", args.book_id))?;
    let response = context.orchestrator.editions(&book).await;
    print_json(&response)
}
