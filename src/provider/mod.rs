//! Bibliographic data providers behind one uniform contract.
//!
//! Each external source (Google Books, Open Library, Amazon) implements
//! [`BookProvider`] and normalizes its payloads into [`ExternalRecord`]s. The
//! orchestrator walks a [`ProviderChain`] in ascending priority order.
//!
//! # Architecture
//!
//! - [`BookProvider`] - Async trait every provider implements
//! - [`ProviderChain`] - Priority-ordered provider collection, sorted once
//! - [`ProviderResult`] - Tagged result of every provider operation
//! - [`ExternalRecord`] - Normalized provider output
//! - [`GoogleBooksProvider`] - Google Books volumes API (priority 1)
//! - [`OpenLibraryProvider`] - Open Library books/search APIs (priority 2)
//! - [`AmazonCreatorsProvider`] - Amazon Creators catalog API (priority 3)
//! - [`AmazonLegacyProvider`] - Retired PA-API 5 placeholder (priority 4, always disabled)
//! - [`AmazonLinksProvider`] - Marketplace search-link provider (priority 5)
//!
//! Provider failures never surface as `Err`: timeouts, HTTP errors, malformed
//! payloads and empty result sets all come back as a [`ProviderResult`] with
//! `success == false` and a diagnostic message.

mod amazon_creators;
mod amazon_legacy;
mod amazon_links;
mod error;
mod google_books;
mod http_client;
mod open_library;
mod utils;

pub use amazon_creators::AmazonCreatorsProvider;
pub use amazon_legacy::AmazonLegacyProvider;
pub use amazon_links::AmazonLinksProvider;
pub use error::ProviderError;
pub use google_books::GoogleBooksProvider;
pub use http_client::build_provider_http_client;
pub use open_library::OpenLibraryProvider;
pub use utils::parse_retry_after;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::AppConfig;
use crate::isbn;
use crate::links::{Region, region_for_locale};

/// `get_items` silently ignores ids past this many.
pub const MAX_BATCH_IDS: usize = 10;

/// Results requested when the caller does not say.
pub const DEFAULT_MAX_RESULTS: u32 = 20;

/// Upper bound on pages fetched by paging providers.
pub const MAX_PAGES: u32 = 10;

/// A provider's normalized description of one book.
///
/// Created fresh per provider call and never persisted directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalRecord {
    /// Display name of the provider that produced the record.
    pub provider: String,
    pub google_id: Option<String>,
    pub amazon_asin: Option<String>,
    /// Open Library work or edition key (e.g. `/works/OL45804W`).
    pub open_library_key: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    /// Authors joined with `", "`.
    pub authors: Option<String>,
    pub isbn: Option<String>,
    pub isbn_10: Option<String>,
    pub isbn_13: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i64>,
    pub language: Option<String>,
    pub categories: Vec<String>,
    pub maturity_rating: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
}

impl ExternalRecord {
    /// Preferred ISBN for catalog storage (ISBN-13 when derivable).
    #[must_use]
    pub fn best_isbn(&self) -> Option<String> {
        [&self.isbn_13, &self.isbn, &self.isbn_10]
            .into_iter()
            .flatten()
            .find_map(|candidate| isbn::preferred_isbn(candidate))
    }

    /// The provider id usable with the producing provider's `get_items`.
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.google_id
            .as_deref()
            .or(self.amazon_asin.as_deref())
            .or(self.open_library_key.as_deref())
    }

    /// Fills `isbn` from the 13/10 forms when the provider gave no primary value.
    pub(crate) fn settle_isbn(&mut self) {
        if self.isbn.is_none() {
            self.isbn = self.isbn_13.clone().or_else(|| self.isbn_10.clone());
        }
    }
}

/// Outcome of a provider operation.
///
/// A call that succeeds but matches nothing is reported as a failure so the
/// fallback chain moves on to the next provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub success: bool,
    pub provider: String,
    pub books: Vec<ExternalRecord>,
    pub total_found: u64,
    pub message: String,
    /// Typed failure, when there was one.
    #[serde(skip)]
    pub error: Option<ProviderError>,
}

impl ProviderResult {
    /// Wraps fetched records; an empty list becomes a `NotFound` failure.
    #[must_use]
    pub fn from_books(
        provider: &str,
        query: &str,
        books: Vec<ExternalRecord>,
        total_found: Option<u64>,
    ) -> Self {
        if books.is_empty() {
            return Self::from_error(provider, ProviderError::not_found(provider, query));
        }
        let count = books.len() as u64;
        let total_found = total_found.unwrap_or(count).max(count);
        Self {
            success: true,
            provider: provider.to_string(),
            message: format!("{provider} returned {count} result(s)"),
            books,
            total_found,
            error: None,
        }
    }

    /// Converts a provider error into a failed result.
    #[must_use]
    pub fn from_error(provider: &str, error: ProviderError) -> Self {
        Self {
            success: false,
            provider: provider.to_string(),
            books: Vec::new(),
            total_found: 0,
            message: error.summary(),
            error: Some(error),
        }
    }

    /// A failed result carrying only a message.
    #[must_use]
    pub fn failure(provider: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider: provider.to_string(),
            books: Vec::new(),
            total_found: 0,
            message: message.into(),
            error: None,
        }
    }

    /// True when the result should win the fallback chain.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.success && self.total_found > 0 && !self.books.is_empty()
    }
}

/// Per-call search hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_results: u32,
    /// Explicit marketplace region.
    pub region: Option<Region>,
    /// Caller locale, mapped to a region when `region` is absent.
    pub locale: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    /// Pages to fetch from paging providers (capped at [`MAX_PAGES`]).
    pub pages: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            region: None,
            locale: None,
            title: None,
            author: None,
            pages: 1,
        }
    }
}

impl SearchOptions {
    /// Explicit region, else the locale's region, else `default`.
    #[must_use]
    pub fn region_or(&self, default: Region) -> Region {
        self.region.unwrap_or_else(|| {
            self.locale
                .as_deref()
                .map_or(default, |locale| region_for_locale(locale, default))
        })
    }

    /// Title and author hints when both are present.
    #[must_use]
    pub fn title_author(&self) -> Option<(&str, &str)> {
        let title = self.title.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let author = self.author.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        Some((title, author))
    }
}

/// Trait that all bibliographic providers implement.
///
/// # Object Safety
///
/// This trait uses `async_trait` so providers can be held as
/// `Arc<dyn BookProvider>` in the ordered chain.
#[async_trait]
pub trait BookProvider: Send + Sync {
    /// Display name (e.g. "Google Books").
    fn name(&self) -> &str;

    /// Fallback order; lower values are tried first.
    fn priority(&self) -> u8;

    /// True when configuration and credentials allow calls.
    fn is_enabled(&self) -> bool;

    /// Free-text or ISBN search.
    async fn search(&self, query: &str, options: &SearchOptions) -> ProviderResult;

    /// Batch fetch by external id; ids past [`MAX_BATCH_IDS`] are ignored.
    async fn get_items(&self, ids: &[String]) -> ProviderResult;

    /// Alternate editions or formats of the same work.
    async fn get_variations(&self, id: &str) -> ProviderResult;

    /// The id of `record` in this provider's namespace, as accepted by
    /// `get_items` and `get_variations`.
    fn provider_key(&self, _record: &ExternalRecord) -> Option<String> {
        None
    }
}

/// Returns at most [`MAX_BATCH_IDS`] non-empty ids, in input order.
#[must_use]
pub fn truncate_ids(ids: &[String]) -> Vec<String> {
    if ids.len() > MAX_BATCH_IDS {
        debug!(
            requested = ids.len(),
            limit = MAX_BATCH_IDS,
            "truncating batch id list"
        );
    }
    ids.iter()
        .take(MAX_BATCH_IDS)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Priority-ordered collection of providers.
///
/// Sorted once at construction; ties keep insertion order.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn BookProvider>>,
}

impl ProviderChain {
    #[must_use]
    pub fn new(mut providers: Vec<Arc<dyn BookProvider>>) -> Self {
        providers.sort_by_key(|provider| provider.priority());
        for provider in &providers {
            debug!(
                name = provider.name(),
                priority = provider.priority(),
                enabled = provider.is_enabled(),
                "registered provider"
            );
        }
        Self { providers }
    }

    /// All providers in priority order.
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn BookProvider>] {
        &self.providers
    }

    /// Enabled providers in priority order.
    pub fn enabled(&self) -> impl Iterator<Item = &Arc<dyn BookProvider>> {
        self.providers.iter().filter(|provider| provider.is_enabled())
    }

    /// Looks a provider up by display name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Arc<dyn BookProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|provider| provider.name()))
            .finish()
    }
}

/// Builds the provider chain from configuration.
///
/// A provider whose HTTP client cannot be built is left out with a warning.
#[must_use]
pub fn build_default_providers(config: &AppConfig, cache: Arc<dyn CacheStore>) -> ProviderChain {
    let mut providers: Vec<Arc<dyn BookProvider>> = Vec::new();

    match GoogleBooksProvider::new(config.google_books.clone()) {
        Ok(provider) => providers.push(Arc::new(provider)),
        Err(error) => warn!(
            error = %error,
            "Google Books provider unavailable; continuing with remaining providers"
        ),
    }

    match OpenLibraryProvider::new(config.open_library.clone()) {
        Ok(provider) => providers.push(Arc::new(provider)),
        Err(error) => warn!(
            error = %error,
            "Open Library provider unavailable; continuing with remaining providers"
        ),
    }

    match AmazonCreatorsProvider::new(
        config.amazon.creators.clone(),
        config.amazon.default_region,
        cache,
    ) {
        Ok(provider) => providers.push(Arc::new(provider)),
        Err(error) => warn!(
            error = %error,
            "Amazon Creators provider unavailable; continuing with remaining providers"
        ),
    }

    providers.push(Arc::new(AmazonLegacyProvider::new(config.amazon.legacy.clone())));
    providers.push(Arc::new(AmazonLinksProvider::new(
        config.amazon.affiliate_tags.clone(),
        config.amazon.default_region,
    )));

    ProviderChain::new(providers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    struct FixedPriority(&'static str, u8);

    #[async_trait]
    impl BookProvider for FixedPriority {
        fn name(&self) -> &str {
            self.0
        }
        fn priority(&self) -> u8 {
            self.1
        }
        fn is_enabled(&self) -> bool {
            self.1 % 2 == 1
        }
        async fn search(&self, _query: &str, _options: &SearchOptions) -> ProviderResult {
            ProviderResult::failure(self.0, "unused")
        }
        async fn get_items(&self, _ids: &[String]) -> ProviderResult {
            ProviderResult::failure(self.0, "unused")
        }
        async fn get_variations(&self, _id: &str) -> ProviderResult {
            ProviderResult::failure(self.0, "unused")
        }
    }

    #[test]
    fn test_provider_chain_sorted_once_by_priority() {
        let chain = ProviderChain::new(vec![
            Arc::new(FixedPriority("c", 3)),
            Arc::new(FixedPriority("a", 1)),
            Arc::new(FixedPriority("b", 2)),
        ]);
        let names: Vec<&str> = chain.providers().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let enabled: Vec<&str> = chain.enabled().map(|p| p.name()).collect();
        assert_eq!(enabled, vec!["a", "c"]);
        assert!(chain.by_name("B").is_some());
    }

    #[test]
    fn test_default_chain_order_and_enablement() {
        let chain = build_default_providers(&AppConfig::default(), Arc::new(MemoryCache::new()));
        let names: Vec<&str> = chain.providers().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "Google Books",
                "Open Library",
                "Amazon Creators",
                "Amazon PA-API",
                "Amazon Links"
            ]
        );
        let enabled: Vec<&str> = chain.enabled().map(|p| p.name()).collect();
        assert_eq!(enabled, vec!["Google Books", "Open Library"]);
    }

    #[test]
    fn test_empty_books_is_failure() {
        let result = ProviderResult::from_books("Google Books", "nothing", Vec::new(), Some(0));
        assert!(!result.success);
        assert_eq!(result.total_found, 0);
        assert!(!result.is_hit());
        assert!(matches!(result.error, Some(ProviderError::NotFound { .. })));
    }

    #[test]
    fn test_from_books_total_never_below_count() {
        let record = ExternalRecord {
            title: "T".to_string(),
            ..ExternalRecord::default()
        };
        let result = ProviderResult::from_books("Open Library", "t", vec![record], Some(0));
        assert!(result.is_hit());
        assert_eq!(result.total_found, 1);
    }

    #[test]
    fn test_truncate_ids_keeps_first_ten() {
        let ids: Vec<String> = (0..15).map(|i| format!("id-{i}")).collect();
        let truncated = truncate_ids(&ids);
        assert_eq!(truncated.len(), MAX_BATCH_IDS);
        assert_eq!(truncated[0], "id-0");
        assert_eq!(truncated[9], "id-9");
    }

    #[test]
    fn test_best_isbn_prefers_isbn13() {
        let record = ExternalRecord {
            isbn_10: Some("0306406152".to_string()),
            ..ExternalRecord::default()
        };
        assert_eq!(record.best_isbn().as_deref(), Some("9780306406157"));
        assert_eq!(ExternalRecord::default().best_isbn(), None);
    }

    #[test]
    fn test_search_options_region_resolution() {
        let mut options = SearchOptions::default();
        assert_eq!(options.region_or(Region::Br), Region::Br);
        options.locale = Some("en-GB".to_string());
        assert_eq!(options.region_or(Region::Br), Region::Uk);
        options.region = Some(Region::Ca);
        assert_eq!(options.region_or(Region::Br), Region::Ca);
    }
}
