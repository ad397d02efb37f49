//! Enrichment of canonical books from external providers.
//!
//! # Overview
//!
//! - [`should_enrich`] - Decision gate; skips books that are already complete
//! - [`merge_record`] - Non-destructive field merge
//! - [`EnrichmentService`] - Fetch, merge and persist; library-add and admin
//!   save flows built on top
//!
//! A provider with nothing to offer is a normal outcome: the book is left
//! untouched and the returned [`EnrichmentOutcome`] has `success == false`.
//! `Err` is reserved for catalog failures and for creation paths that cannot
//! produce a row at all.

mod error;
mod gate;
mod library;
mod merge;

pub use error::EnrichmentError;
pub use gate::should_enrich;
pub use library::{AddToLibraryRequest, LibraryAddOutcome, SaveOutcome};
pub use merge::merge_record;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{AsinStatus, BookQuality, CanonicalBook, CatalogStore};
use crate::provider::{BookProvider, ExternalRecord, ProviderChain};

/// Result type for enrichment operations.
pub type Result<T> = std::result::Result<T, EnrichmentError>;

/// Per-book enrichment report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentOutcome {
    pub book_id: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Fields that went from empty to populated.
    pub added_fields: Vec<String>,
    pub message: String,
    /// The book as persisted after the merge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<CanonicalBook>,
}

impl EnrichmentOutcome {
    /// Unsuccessful outcome that touched nothing.
    #[must_use]
    pub fn failed(book_id: i64, provider: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            book_id,
            success: false,
            provider: provider.map(str::to_string),
            added_fields: Vec::new(),
            message: message.into(),
            book: None,
        }
    }
}

/// Resolves, fetches and merges provider data into the catalog.
pub struct EnrichmentService {
    catalog: Arc<dyn CatalogStore>,
    providers: ProviderChain,
}

impl EnrichmentService {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogStore>, providers: ProviderChain) -> Self {
        Self { catalog, providers }
    }

    /// Enriches `book` from the provider that owns `external_id`.
    ///
    /// Without an explicit id the book's Google id, then its ASIN, is used.
    /// Running this twice with the same inputs changes nothing the second
    /// time and never lowers quality.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::MissingIdentifier`] when no id is available,
    /// [`EnrichmentError::BookNotFound`] if the row disappeared, or
    /// [`EnrichmentError::Catalog`] if persistence fails.
    #[instrument(skip(self, book), fields(book_id = book.id))]
    pub async fn enrich_book(
        &self,
        book: &CanonicalBook,
        external_id: Option<&str>,
    ) -> Result<EnrichmentOutcome> {
        let external_id = external_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| book.google_id.clone())
            .or_else(|| book.amazon_asin.clone())
            .ok_or_else(|| EnrichmentError::missing_identifier("enrich the book"))?;

        let lookup = lookup_record(book, &external_id);
        let Some(provider) = self.provider_for(&lookup, &external_id) else {
            debug!(external_id = %external_id, "no enabled provider owns this id");
            return Ok(EnrichmentOutcome::failed(
                book.id,
                None,
                format!("No enabled provider handles id '{external_id}'"),
            ));
        };
        let tracks_asin = lookup.amazon_asin.is_some();

        if tracks_asin {
            self.catalog
                .mark_asin_status(book.id, AsinStatus::Processing)
                .await?;
        }

        let result = provider.get_items(std::slice::from_ref(&external_id)).await;
        let record = if result.is_hit() {
            result.books.into_iter().next()
        } else {
            None
        };
        let Some(record) = record else {
            warn!(
                provider = provider.name(),
                message = %result.message,
                "provider returned nothing to enrich with"
            );
            if tracks_asin {
                self.catalog
                    .mark_asin_status(book.id, AsinStatus::Failed)
                    .await?;
            }
            return Ok(EnrichmentOutcome::failed(
                book.id,
                Some(provider.name()),
                result.message,
            ));
        };

        let mut outcome = match self.apply_record(book.id, &record, provider.name()).await {
            Ok(outcome) => outcome,
            Err(error) => {
                if tracks_asin
                    && let Err(mark_error) = self
                        .catalog
                        .mark_asin_status(book.id, AsinStatus::Failed)
                        .await
                {
                    warn!(error = %mark_error, "could not mark ASIN lookup as failed");
                }
                return Err(error);
            }
        };
        if tracks_asin {
            let updated = self
                .catalog
                .mark_asin_status(book.id, AsinStatus::Completed)
                .await?;
            outcome.book = Some(updated);
        }
        Ok(outcome)
    }

    /// Enriches each id in turn; one failure never stops the rest.
    ///
    /// Books that do not pass [`should_enrich`] are reported as successful
    /// no-ops without a provider call.
    #[instrument(skip(self, book_ids), fields(count = book_ids.len()))]
    pub async fn enrich_books_in_batch(&self, book_ids: &[i64]) -> Vec<EnrichmentOutcome> {
        let mut outcomes = Vec::with_capacity(book_ids.len());
        for &book_id in book_ids {
            let outcome = match self.enrich_book_by_id(book_id).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(book_id, error = %error, "batch enrichment item failed");
                    EnrichmentOutcome::failed(book_id, None, error.to_string())
                }
            };
            outcomes.push(outcome);
        }
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        info!(
            succeeded,
            failed = outcomes.len() - succeeded,
            "batch enrichment finished"
        );
        outcomes
    }

    /// Loads `book_id` and enriches it when [`should_enrich`] holds.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::BookNotFound`] for an unknown id, otherwise
    /// the errors of [`Self::enrich_book`].
    pub async fn enrich_book_by_id(&self, book_id: i64) -> Result<EnrichmentOutcome> {
        let book = self
            .catalog
            .get(book_id)
            .await?
            .ok_or(EnrichmentError::BookNotFound(book_id))?;
        if !should_enrich(&book) {
            debug!(book_id, "enrichment not needed");
            return Ok(EnrichmentOutcome {
                book_id,
                success: true,
                provider: None,
                added_fields: Vec::new(),
                message: "Enrichment not needed".to_string(),
                book: Some(book),
            });
        }
        self.enrich_book(&book, None).await
    }

    /// Merges `record` into the current row and persists the result.
    async fn apply_record(
        &self,
        book_id: i64,
        record: &ExternalRecord,
        provider: &str,
    ) -> Result<EnrichmentOutcome> {
        let mut current = self.require(book_id).await?;
        let record = self.without_colliding_identifiers(&current, record.clone()).await?;
        let mut added = merge_record(&mut current, &record);

        if !added.is_empty() {
            current = match self.catalog.update(&current).await {
                Ok(updated) => updated,
                Err(error) if error.is_unique_violation() => {
                    // another row claimed an identifier since the check above
                    warn!(book_id, error = %error, "identifier race on update; merging content only");
                    let mut fresh = self.require(book_id).await?;
                    added = merge_record(&mut fresh, &content_only(record));
                    if added.is_empty() {
                        fresh
                    } else {
                        self.catalog.update(&fresh).await?
                    }
                }
                Err(error) => return Err(error.into()),
            };
        }

        if !added.is_empty()
            || current.quality() == BookQuality::Basic
            || current.enriched_at.is_none()
        {
            current = self.catalog.mark_enriched(book_id).await?;
        }

        let message = if added.is_empty() {
            "Book already up to date".to_string()
        } else {
            format!("Added {} field(s) from {provider}", added.len())
        };
        info!(book_id, provider, added = ?added, "enrichment applied");

        Ok(EnrichmentOutcome {
            book_id,
            success: true,
            provider: Some(provider.to_string()),
            added_fields: added.into_iter().map(str::to_string).collect(),
            message,
            book: Some(current),
        })
    }

    /// Drops identifiers from `record` that already belong to another row.
    async fn without_colliding_identifiers(
        &self,
        book: &CanonicalBook,
        mut record: ExternalRecord,
    ) -> Result<ExternalRecord> {
        if book.isbn.is_none()
            && let Some(isbn) = record.best_isbn()
            && let Some(owner) = self.catalog.find_existing(None, Some(&isbn), None).await?
            && owner.id != book.id
        {
            warn!(book_id = book.id, owner = owner.id, isbn = %isbn, "isbn belongs to another book; not merging it");
            record.isbn = None;
            record.isbn_10 = None;
            record.isbn_13 = None;
        }
        if book.google_id.is_none()
            && let Some(google_id) = record.google_id.clone()
            && let Some(owner) = self.catalog.find_existing(None, None, Some(&google_id)).await?
            && owner.id != book.id
        {
            warn!(book_id = book.id, owner = owner.id, "google id belongs to another book; not merging it");
            record.google_id = None;
        }
        if book.amazon_asin.is_none()
            && let Some(asin) = record.amazon_asin.clone()
            && let Some(owner) = self.catalog.find_existing(None, None, Some(&asin)).await?
            && owner.id != book.id
        {
            warn!(book_id = book.id, owner = owner.id, "asin belongs to another book; not merging it");
            record.amazon_asin = None;
        }
        Ok(record)
    }

    async fn require(&self, book_id: i64) -> Result<CanonicalBook> {
        self.catalog
            .get(book_id)
            .await?
            .ok_or(EnrichmentError::BookNotFound(book_id))
    }

    /// First enabled provider that claims `id` for the lookup record.
    fn provider_for(&self, lookup: &ExternalRecord, id: &str) -> Option<&Arc<dyn BookProvider>> {
        self.providers
            .enabled()
            .find(|provider| provider.provider_key(lookup).as_deref() == Some(id))
    }
}

impl std::fmt::Debug for EnrichmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentService")
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

/// A record carrying `id` in the slot it most likely belongs to.
///
/// An id the book already stores keeps its kind; otherwise ASIN-shaped ids
/// (`B` + 9 uppercase alphanumerics) are ASINs and anything else is a Google
/// volume id.
fn lookup_record(book: &CanonicalBook, id: &str) -> ExternalRecord {
    let known_asin = book
        .amazon_asin
        .as_deref()
        .is_some_and(|asin| asin.eq_ignore_ascii_case(id));
    let known_google = book.google_id.as_deref() == Some(id);
    if known_asin || (!known_google && looks_like_asin(id)) {
        ExternalRecord {
            amazon_asin: Some(id.to_string()),
            ..ExternalRecord::default()
        }
    } else {
        ExternalRecord {
            google_id: Some(id.to_string()),
            ..ExternalRecord::default()
        }
    }
}

fn looks_like_asin(id: &str) -> bool {
    id.len() == 10
        && id.starts_with('B')
        && id
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
}

fn content_only(mut record: ExternalRecord) -> ExternalRecord {
    record.isbn = None;
    record.isbn_10 = None;
    record.isbn_13 = None;
    record.google_id = None;
    record.amazon_asin = None;
    record
}

#[cfg(test)]
pub(crate) fn test_book() -> CanonicalBook {
    CanonicalBook {
        id: 1,
        isbn: None,
        google_id: None,
        amazon_asin: None,
        title: "Dom Casmurro".to_string(),
        authors: None,
        subtitle: None,
        thumbnail: None,
        description: None,
        publisher: None,
        published_date: None,
        page_count: None,
        language: None,
        categories: None,
        maturity_rating: None,
        quality_str: "basic".to_string(),
        enriched_at: None,
        asin_status_str: "pending".to_string(),
        asin_processed_at: None,
        created_at: "2026-01-01 00:00:00".to_string(),
        updated_at: "2026-01-01 00:00:00".to_string(),
    }
}
