//! Enrich command handler: batch enrichment behind a spinner.

use std::time::Duration;

use anyhow::Result;
use bookmeta_core::EnrichmentOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use super::{AppContext, print_json};
use crate::cli::EnrichArgs;

/// Batch report printed on stdout.
#[derive(Debug, Serialize)]
struct EnrichSummary {
    requested: usize,
    succeeded: usize,
    failed: usize,
    outcomes: Vec<EnrichmentOutcome>,
}

impl EnrichSummary {
    fn from_outcomes(outcomes: Vec<EnrichmentOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|outcome| outcome.success).count();
        Self {
            requested: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        }
    }
}

pub async fn run_enrich_command(context: &AppContext, args: &EnrichArgs, quiet: bool) -> Result<()> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Enriching {} book(s)", args.ids.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcomes = context.enrichment.enrich_books_in_batch(&args.ids).await;
    spinner.finish_and_clear();

    let summary = EnrichSummary::from_outcomes(outcomes);
    info!(
        requested = summary.requested,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Enrichment finished"
    );
    print_json(&summary)
}
