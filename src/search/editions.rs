//! Editions lookup: provider variations with a local title/author fallback.

use tracing::{debug, info, instrument, warn};

use crate::catalog::CanonicalBook;
use crate::provider::ProviderResult;

use super::{LOCAL_PROVIDER, SearchOrchestrator, SearchResponse, SearchSource};

/// Local fallback rows fetched before excluding the book itself.
const LOCAL_EDITIONS_LIMIT: i64 = 20;

impl SearchOrchestrator {
    /// Other editions of `book`.
    ///
    /// Each enabled provider that understands one of the book's external ids
    /// is asked for variations, in priority order; the first hit wins. Without
    /// a hit, the catalog is searched for the same title (and first author).
    #[instrument(skip(self, book), fields(book_id = book.id))]
    pub async fn editions(&self, book: &CanonicalBook) -> SearchResponse {
        let record = book.to_record(LOCAL_PROVIDER);
        let mut tried = Vec::new();

        for provider in self.providers.enabled() {
            let Some(key) = provider.provider_key(&record) else {
                continue;
            };
            tried.push(provider.name().to_string());
            debug!(provider = provider.name(), key = %key, "requesting variations");

            let result = provider.get_variations(&key).await;
            if result.is_hit() {
                info!(
                    provider = provider.name(),
                    editions = result.books.len(),
                    "provider returned editions"
                );
                let mut response = SearchResponse::from_result(result, SearchSource::Provider);
                response.providers_tried = tried;
                return response;
            }
            debug!(provider = provider.name(), message = %result.message, "no variations");
        }

        let mut response = self.local_editions(book).await;
        response.providers_tried = tried;
        response
    }

    async fn local_editions(&self, book: &CanonicalBook) -> SearchResponse {
        let first_author = book
            .authors
            .as_deref()
            .and_then(|authors| authors.split(',').next())
            .map(str::trim)
            .filter(|author| !author.is_empty());

        let rows = match self
            .catalog
            .search_local(&book.title, first_author, LOCAL_EDITIONS_LIMIT)
            .await
        {
            Ok(rows) => rows,
            Err(error) => {
                warn!(error = %error, "local editions search failed");
                Vec::new()
            }
        };

        let records = rows
            .into_iter()
            .filter(|candidate| candidate.id != book.id)
            .map(|candidate| candidate.to_record(LOCAL_PROVIDER))
            .collect();
        let result = ProviderResult::from_books(LOCAL_PROVIDER, &book.title, records, None);
        if !result.success {
            let mut response = SearchResponse::failure(format!(
                "No other editions found for \"{}\"",
                book.title
            ));
            response.suggestions = vec!["Add the book's Google Books id or ASIN".to_string()];
            return response;
        }
        SearchResponse::from_result(result, SearchSource::Local)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::catalog::{Catalog, NewBook};
    use crate::db::Database;
    use crate::provider::{BookProvider, ExternalRecord, ProviderChain, SearchOptions};

    /// Answers variations for Google ids only.
    struct GoogleLike {
        editions: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BookProvider for GoogleLike {
        fn name(&self) -> &str {
            "Google-like"
        }
        fn priority(&self) -> u8 {
            1
        }
        fn is_enabled(&self) -> bool {
            true
        }
        async fn search(&self, _query: &str, _options: &SearchOptions) -> ProviderResult {
            ProviderResult::failure("Google-like", "unused")
        }
        async fn get_items(&self, _ids: &[String]) -> ProviderResult {
            ProviderResult::failure("Google-like", "unused")
        }
        async fn get_variations(&self, id: &str) -> ProviderResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let books = self
                .editions
                .iter()
                .map(|title| ExternalRecord {
                    title: (*title).to_string(),
                    ..ExternalRecord::default()
                })
                .collect();
            ProviderResult::from_books("Google-like", id, books, None)
        }
        fn provider_key(&self, record: &ExternalRecord) -> Option<String> {
            record.google_id.clone()
        }
    }

    async fn setup(editions: Vec<&'static str>) -> (SearchOrchestrator, Catalog, Arc<GoogleLike>) {
        let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
        let provider = Arc::new(GoogleLike {
            editions,
            calls: AtomicUsize::new(0),
        });
        let orchestrator = SearchOrchestrator::new(
            Arc::new(catalog.clone()),
            ProviderChain::new(vec![provider.clone()]),
            Arc::new(MemoryCache::new()),
        );
        (orchestrator, catalog, provider)
    }

    async fn add(catalog: &Catalog, title: &str, google_id: Option<&str>) -> CanonicalBook {
        catalog
            .create(&NewBook {
                title: title.to_string(),
                authors: Some("Machado de Assis".to_string()),
                google_id: google_id.map(str::to_string),
                ..NewBook::default()
            })
            .await
            .unwrap()
            .book
    }

    #[tokio::test]
    async fn test_editions_from_provider_variations() {
        let (orchestrator, catalog, provider) = setup(vec!["Dom Casmurro (Pocket)"]).await;
        let book = add(&catalog, "Dom Casmurro", Some("vol-1")).await;

        let response = orchestrator.editions(&book).await;
        assert!(response.success);
        assert_eq!(response.source, Some(SearchSource::Provider));
        assert_eq!(response.books[0].title, "Dom Casmurro (Pocket)");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_editions_fall_back_to_local_catalog() {
        let (orchestrator, catalog, provider) = setup(Vec::new()).await;
        let book = add(&catalog, "Dom Casmurro", None).await;
        add(&catalog, "Dom Casmurro - Edição Comentada", None).await;

        let response = orchestrator.editions(&book).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(response.success);
        assert_eq!(response.source, Some(SearchSource::Local));
        assert_eq!(response.books.len(), 1);
        assert_eq!(response.books[0].title, "Dom Casmurro - Edição Comentada");
    }

    #[tokio::test]
    async fn test_editions_without_matches_is_failure() {
        let (orchestrator, catalog, _) = setup(Vec::new()).await;
        let book = add(&catalog, "Memórias Póstumas", Some("vol-2")).await;

        let response = orchestrator.editions(&book).await;
        assert!(!response.success);
        assert_eq!(response.providers_tried, vec!["Google-like"]);
    }
}
