//! Search command handler: run the orchestrator and print the response.

use anyhow::Result;
use bookmeta_core::{Include, SearchParams};
use tracing::info;

use super::{AppContext, print_json};
use crate::cli::SearchArgs;

pub async fn run_search_command(context: &AppContext, args: &SearchArgs) -> Result<()> {
    let params = SearchParams {
        max_results: args.max_results,
        includes: if args.links {
            vec![Include::Links]
        } else {
            Vec::new()
        },
        locale: args.locale.clone(),
    };

    let response = context.orchestrator.search(&args.term, &params).await;
    info!(
        success = response.success,
        provider = response.provider.as_deref().unwrap_or("none"),
        books = response.books.len(),
        "Search finished"
    );
    print_json(&response)
}
