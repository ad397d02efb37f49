//! Add command handler: resolve or create a book and attach it to a library.

use anyhow::{Context, Result};
use bookmeta_core::AddToLibraryRequest;
use tracing::info;

use super::{AppContext, print_json};
use crate::cli::AddArgs;

pub async fn run_add_command(context: &AppContext, args: &AddArgs) -> Result<()> {
    let request = AddToLibraryRequest {
        user_id: args.user.clone(),
        book_id: args.book_id,
        isbn: args.isbn.clone(),
        google_id: args.google_id.clone(),
        asin: args.asin.clone(),
        is_private: args.private,
        reading_status: args.status,
    };

    let outcome = context
        .enrichment
        .add_to_library(&request)
        .await
        .with_context(|| format!("failed to add book to library of {}", args.user))?;
    info!(
        book_id = outcome.book.id,
        created = outcome.created,
        enriched = outcome.enrichment.as_ref().is_some_and(|e| e.success),
        "Book added to library"
    );
    print_json(&outcome)
}
