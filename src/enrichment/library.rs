//! Library-add and admin save flows.
//!
//! Adding resolves identity first (catalog id, ISBN, external id). A known
//! book is enriched when the gate says so and then attached. An unknown book
//! is fetched from a provider before any row is written, so a failed fetch
//! leaves neither a catalog row nor a library entry behind.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{AsinStatus, CanonicalBook, CatalogError, LibraryEntry, NewBook, ReadingStatus};
use crate::isbn;
use crate::provider::{ExternalRecord, SearchOptions};

use super::{EnrichmentError, EnrichmentOutcome, EnrichmentService, Result, should_enrich};

/// Results requested per provider when resolving a bare ISBN.
const ISBN_LOOKUP_RESULTS: u32 = 5;

/// A request to put a book on a user's shelf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddToLibraryRequest {
    pub user_id: String,
    pub book_id: Option<i64>,
    pub isbn: Option<String>,
    pub google_id: Option<String>,
    pub asin: Option<String>,
    pub is_private: bool,
    pub reading_status: ReadingStatus,
}

/// Result of a library add.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryAddOutcome {
    pub entry: LibraryEntry,
    pub book: CanonicalBook,
    /// True when this call created the catalog row.
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentOutcome>,
}

/// Result of an admin catalog save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub book: CanonicalBook,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentOutcome>,
}

impl EnrichmentService {
    /// Resolves, creates or enriches as needed, then attaches to the library.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::MissingIdentifier`] for a request with no
    /// identifiers, [`EnrichmentError::BookNotFound`] for an unknown catalog
    /// id, [`EnrichmentError::ProviderFailed`] when a new book cannot be
    /// fetched, or [`EnrichmentError::Catalog`] on persistence failures.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn add_to_library(&self, request: &AddToLibraryRequest) -> Result<LibraryAddOutcome> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(CatalogError::invalid_value("user_id", "must not be empty").into());
        }
        let isbn = clean(request.isbn.as_deref());
        let google_id = clean(request.google_id.as_deref());
        let asin = clean(request.asin.as_deref());
        if request.book_id.is_none() && isbn.is_none() && google_id.is_none() && asin.is_none() {
            return Err(EnrichmentError::missing_identifier("add a book to a library"));
        }

        let mut existing = self
            .catalog
            .find_existing(request.book_id, isbn, google_id)
            .await?;
        if existing.is_none()
            && let Some(asin) = asin
        {
            existing = self.catalog.find_existing(None, None, Some(asin)).await?;
        }

        if let Some(book) = existing {
            debug!(book_id = book.id, "book already catalogued");
            return self
                .attach_existing(book, google_id.or(asin), user_id, request)
                .await;
        }

        if let Some(google_id) = google_id {
            return self
                .create_enriched_book_from_google(
                    google_id,
                    user_id,
                    request.is_private,
                    request.reading_status,
                )
                .await;
        }
        if let Some(asin) = asin {
            let lookup = ExternalRecord {
                amazon_asin: Some(asin.to_string()),
                ..ExternalRecord::default()
            };
            let record = self.fetch_by_id(&lookup, asin).await?;
            return self
                .create_and_attach(record, user_id, request.is_private, request.reading_status)
                .await;
        }
        if let Some(isbn) = isbn {
            let record = self.lookup_isbn(isbn).await?;
            return self
                .create_and_attach(record, user_id, request.is_private, request.reading_status)
                .await;
        }

        Err(EnrichmentError::BookNotFound(request.book_id.unwrap_or_default()))
    }

    /// Creates a catalog row from a Google Books volume, enriches it and
    /// attaches it to `user_id`'s library.
    ///
    /// The volume is fetched before anything is written. A concurrent create
    /// of the same volume resolves to the existing row.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::ProviderFailed`] if the volume cannot be
    /// fetched, or [`EnrichmentError::Catalog`] on persistence failures.
    #[instrument(skip(self))]
    pub async fn create_enriched_book_from_google(
        &self,
        google_id: &str,
        user_id: &str,
        is_private: bool,
        reading_status: ReadingStatus,
    ) -> Result<LibraryAddOutcome> {
        let google_id = google_id.trim();
        if google_id.is_empty() {
            return Err(EnrichmentError::missing_identifier("create a book from Google Books"));
        }
        let lookup = ExternalRecord {
            google_id: Some(google_id.to_string()),
            ..ExternalRecord::default()
        };
        let mut record = self.fetch_by_id(&lookup, google_id).await?;
        record.google_id = Some(google_id.to_string());
        self.create_and_attach(record, user_id, is_private, reading_status)
            .await
    }

    /// Admin create/update: resolves or creates the row, then enriches it
    /// from its Google id when the gate allows.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::Catalog`] on persistence failures.
    #[instrument(skip(self, new_book), fields(title = %new_book.title))]
    pub async fn save_catalog_entry(&self, new_book: &NewBook) -> Result<SaveOutcome> {
        let created = self.catalog.create(new_book).await?;
        let book = created.book;

        let google_id = clean(new_book.google_id.as_deref());
        let enrichment = match google_id {
            Some(google_id) if should_enrich(&book) => {
                Some(self.enrich_book(&book, Some(google_id)).await?)
            }
            _ => None,
        };

        let book = enrichment
            .as_ref()
            .and_then(|outcome| outcome.book.clone())
            .unwrap_or(book);
        Ok(SaveOutcome {
            book,
            created: created.created,
            enrichment,
        })
    }

    async fn attach_existing(
        &self,
        book: CanonicalBook,
        external_id: Option<&str>,
        user_id: &str,
        request: &AddToLibraryRequest,
    ) -> Result<LibraryAddOutcome> {
        let has_id = external_id.is_some() || book.has_external_id();
        let enrichment = if should_enrich(&book) && has_id {
            Some(self.enrich_book(&book, external_id).await?)
        } else {
            None
        };
        let book = enrichment
            .as_ref()
            .and_then(|outcome| outcome.book.clone())
            .unwrap_or(book);

        let entry = self
            .catalog
            .attach_to_library(user_id, book.id, request.is_private, request.reading_status)
            .await?;
        Ok(LibraryAddOutcome {
            entry,
            book,
            created: false,
            enrichment,
        })
    }

    /// Creates (or resolves) the row for `record`, merges it, then attaches.
    async fn create_and_attach(
        &self,
        record: ExternalRecord,
        user_id: &str,
        is_private: bool,
        reading_status: ReadingStatus,
    ) -> Result<LibraryAddOutcome> {
        let created = self.catalog.create(&NewBook::from_record(&record)).await?;
        if created.created {
            info!(book_id = created.book.id, provider = %record.provider, "created catalog book");
        } else {
            warn!(book_id = created.book.id, "book was created concurrently; using existing row");
        }

        let mut enrichment = self
            .apply_record(created.book.id, &record, &record.provider)
            .await?;
        if record.amazon_asin.is_some() && created.book.asin_status() != AsinStatus::Completed {
            let updated = self
                .catalog
                .mark_asin_status(created.book.id, AsinStatus::Completed)
                .await?;
            enrichment.book = Some(updated);
        }

        let book = enrichment.book.clone().unwrap_or(created.book);
        let entry = self
            .catalog
            .attach_to_library(user_id, book.id, is_private, reading_status)
            .await?;
        Ok(LibraryAddOutcome {
            entry,
            book,
            created: created.created,
            enrichment: Some(enrichment),
        })
    }

    /// Fetches the record for `id` from the provider that owns it.
    async fn fetch_by_id(&self, lookup: &ExternalRecord, id: &str) -> Result<ExternalRecord> {
        let Some(provider) = self.provider_for(lookup, id) else {
            return Err(EnrichmentError::provider_failed(
                "any enabled provider",
                id,
                "no enabled provider handles this id",
            ));
        };
        let result = provider.get_items(&[id.to_string()]).await;
        if !result.is_hit() {
            return Err(EnrichmentError::provider_failed(
                provider.name(),
                id,
                result.message,
            ));
        }
        result.books.into_iter().next().ok_or_else(|| {
            EnrichmentError::provider_failed(provider.name(), id, "empty result")
        })
    }

    /// Searches the chain for an ISBN, preferring a record with that ISBN.
    async fn lookup_isbn(&self, isbn_input: &str) -> Result<ExternalRecord> {
        let variants = isbn::isbn_variants(isbn_input);
        let options = SearchOptions {
            max_results: ISBN_LOOKUP_RESULTS,
            ..SearchOptions::default()
        };

        let mut tried = Vec::new();
        for provider in self.providers.enabled() {
            tried.push(provider.name());
            let result = provider.search(isbn_input, &options).await;
            if !result.is_hit() {
                debug!(provider = provider.name(), message = %result.message, "isbn not found");
                continue;
            }
            let mut books = result.books;
            let position = books
                .iter()
                .position(|record| {
                    record
                        .best_isbn()
                        .is_some_and(|found| isbn::isbn_variants(&found).iter().any(|v| variants.contains(v)))
                })
                .unwrap_or(0);
            let mut record = books.swap_remove(position);
            if record.best_isbn().is_none() {
                record.isbn = variants.first().cloned();
            }
            return Ok(record);
        }

        let provider = if tried.is_empty() {
            "any enabled provider".to_string()
        } else {
            tried.join(", ")
        };
        Err(EnrichmentError::provider_failed(
            &provider,
            isbn_input,
            "no provider found this ISBN",
        ))
    }
}

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::catalog::{BookQuality, Catalog};
    use crate::db::Database;
    use crate::enrichment::tests::FakeGoogle;
    use crate::provider::ProviderChain;

    fn record() -> ExternalRecord {
        ExternalRecord {
            provider: "Fake Google".to_string(),
            title: "Quincas Borba".to_string(),
            authors: Some("Machado de Assis".to_string()),
            page_count: Some(280),
            isbn_13: Some("9788535910667".to_string()),
            ..ExternalRecord::default()
        }
    }

    async fn setup(record: Option<ExternalRecord>) -> (EnrichmentService, Catalog, Arc<FakeGoogle>) {
        let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
        let provider = Arc::new(FakeGoogle {
            record,
            calls: AtomicUsize::new(0),
        });
        let service = EnrichmentService::new(
            Arc::new(catalog.clone()),
            ProviderChain::new(vec![provider.clone()]),
        );
        (service, catalog, provider)
    }

    #[tokio::test]
    async fn test_create_enriched_book_from_google_attaches() {
        let (service, catalog, _) = setup(Some(record())).await;

        let outcome = service
            .create_enriched_book_from_google("vol-7", "reader-1", true, ReadingStatus::Reading)
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.book.google_id.as_deref(), Some("vol-7"));
        assert_eq!(outcome.book.page_count, Some(280));
        assert_eq!(outcome.book.quality(), BookQuality::Complete);
        assert!(outcome.entry.is_private);
        assert_eq!(outcome.entry.reading_status(), ReadingStatus::Reading);
        assert_eq!(catalog.library_entries("reader-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_creates_nothing() {
        let (service, catalog, _) = setup(None).await;

        let err = service
            .create_enriched_book_from_google("vol-missing", "reader-1", false, ReadingStatus::WantToRead)
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichmentError::ProviderFailed { .. }));
        assert_eq!(catalog.count().await.unwrap(), 0);
        assert!(catalog.library_entries("reader-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_by_isbn_then_again_reuses_row() {
        let (service, catalog, _) = setup(Some(record())).await;
        let request = AddToLibraryRequest {
            user_id: "reader-1".to_string(),
            isbn: Some("978-85-359-1066-7".to_string()),
            ..AddToLibraryRequest::default()
        };

        let first = service.add_to_library(&request).await.unwrap();
        let second = service.add_to_library(&request).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.book.id, second.book.id);
        assert_eq!(first.entry.id, second.entry.id);
        assert_eq!(catalog.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_existing_complete_book_skips_provider() {
        let (service, catalog, provider) = setup(Some(record())).await;
        let created = service
            .create_enriched_book_from_google("vol-7", "reader-1", false, ReadingStatus::Read)
            .await
            .unwrap();
        let calls_after_create = provider.calls.load(Ordering::SeqCst);

        let outcome = service
            .add_to_library(&AddToLibraryRequest {
                user_id: "reader-2".to_string(),
                book_id: Some(created.book.id),
                ..AddToLibraryRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.book.id, created.book.id);
        assert!(outcome.enrichment.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_create);
        assert_eq!(catalog.library_entries("reader-2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_without_identifiers_or_user_is_rejected() {
        let (service, _, _) = setup(Some(record())).await;
        let err = service
            .add_to_library(&AddToLibraryRequest {
                user_id: "reader-1".to_string(),
                ..AddToLibraryRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichmentError::MissingIdentifier { .. }));

        let err = service
            .add_to_library(&AddToLibraryRequest {
                isbn: Some("9788535910667".to_string()),
                ..AddToLibraryRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichmentError::Catalog(CatalogError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn test_save_catalog_entry_enriches_with_google_id() {
        let (service, _, provider) = setup(Some(record())).await;
        let saved = service
            .save_catalog_entry(&NewBook {
                title: "Quincas Borba".to_string(),
                google_id: Some("vol-7".to_string()),
                ..NewBook::default()
            })
            .await
            .unwrap();

        assert!(saved.created);
        assert_eq!(saved.book.page_count, Some(280));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let again = service
            .save_catalog_entry(&NewBook {
                title: "Quincas Borba".to_string(),
                google_id: Some("vol-7".to_string()),
                ..NewBook::default()
            })
            .await
            .unwrap();
        assert!(!again.created);
        assert!(again.enrichment.is_none());
        assert_eq!(again.book.id, saved.book.id);
    }
}
