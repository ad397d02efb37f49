//! Search orchestration over the provider chain.
//!
//! [`SearchOrchestrator::search`] resolves a term in this order:
//!
//! 1. exact identifier match in the local catalog (`source = local`)
//! 2. cached provider result for the normalized query (`source = cache`)
//! 3. enabled providers in ascending priority; the first one returning at
//!    least one record wins and its records are returned unmerged
//!
//! Only provider wins are cached. When every provider comes back empty the
//! response carries `success = false`, suggestions, and the providers tried.

mod editions;
mod query;

pub use query::{cache_key, normalize_query};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cache::CacheStore;
use crate::catalog::CatalogStore;
use crate::isbn;
use crate::links::{MarketplaceLinkGenerator, PurchaseLink, Region, region_for_locale};
use crate::provider::{
    DEFAULT_MAX_RESULTS, ExternalRecord, ProviderChain, ProviderError, ProviderResult,
    SearchOptions,
};

/// Provider label used for catalog hits.
pub const LOCAL_PROVIDER: &str = "Local catalog";

/// Default lifetime of cached search results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Upper bound on a single provider call, on top of its HTTP timeout.
pub const DEFAULT_PROVIDER_DEADLINE: Duration = Duration::from_secs(30);

/// Where a response's books came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Local,
    Cache,
    Provider,
}

/// Optional extras attached to a search response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Include {
    /// Marketplace purchase links per book.
    Links,
}

/// Caller options for [`SearchOrchestrator::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub max_results: u32,
    pub includes: Vec<Include>,
    /// Caller locale (e.g. `pt-BR`), used for region selection.
    pub locale: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            includes: Vec::new(),
            locale: None,
        }
    }
}

impl SearchParams {
    fn provider_options(&self) -> SearchOptions {
        SearchOptions {
            max_results: self.max_results.max(1),
            locale: self.locale.clone(),
            ..SearchOptions::default()
        }
    }
}

/// Purchase links for the book at `position` in [`SearchResponse::books`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookLinks {
    pub position: usize,
    pub links: Vec<PurchaseLink>,
}

/// Unified search (and editions) response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    /// Winning provider, or [`LOCAL_PROVIDER`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SearchSource>,
    pub books: Vec<ExternalRecord>,
    pub total_found: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub providers_tried: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<BookLinks>,
}

impl SearchResponse {
    fn from_result(result: ProviderResult, source: SearchSource) -> Self {
        Self {
            success: result.success,
            provider: Some(result.provider),
            source: Some(source),
            books: result.books,
            total_found: result.total_found,
            message: result.message,
            suggestions: Vec::new(),
            providers_tried: Vec::new(),
            links: Vec::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider: None,
            source: None,
            books: Vec::new(),
            total_found: 0,
            message: message.into(),
            suggestions: Vec::new(),
            providers_tried: Vec::new(),
            links: Vec::new(),
        }
    }
}

/// Runs the local-catalog, cache and provider fallback chain.
pub struct SearchOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    providers: ProviderChain,
    cache: Arc<dyn CacheStore>,
    cache_ttl: Duration,
    provider_deadline: Duration,
    links: MarketplaceLinkGenerator,
    default_region: Region,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        providers: ProviderChain,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            catalog,
            providers,
            cache,
            cache_ttl: DEFAULT_CACHE_TTL,
            provider_deadline: DEFAULT_PROVIDER_DEADLINE,
            links: MarketplaceLinkGenerator::default(),
            default_region: Region::default(),
        }
    }

    /// Sets the cache lifetime of provider results.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the per-provider call deadline.
    #[must_use]
    pub fn with_provider_deadline(mut self, deadline: Duration) -> Self {
        self.provider_deadline = deadline;
        self
    }

    /// Enables [`Include::Links`] using `generator`.
    #[must_use]
    pub fn with_links(mut self, generator: MarketplaceLinkGenerator, default_region: Region) -> Self {
        self.links = generator;
        self.default_region = default_region;
        self
    }

    #[must_use]
    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    /// Searches for `term`. Always returns a well-formed response.
    #[instrument(skip(self, params), fields(max_results = params.max_results))]
    pub async fn search(&self, term: &str, params: &SearchParams) -> SearchResponse {
        let term = term.trim();
        if term.is_empty() {
            let mut response = SearchResponse::failure("Search term is empty");
            response.suggestions = vec!["Enter a title, author or ISBN".to_string()];
            return response;
        }

        let mut response = match self.local_match(term).await {
            Some(response) => response,
            None => self.search_remote(term, params).await,
        };

        if params.includes.contains(&Include::Links) {
            self.attach_links(&mut response, params);
        }
        response
    }

    async fn local_match(&self, term: &str) -> Option<SearchResponse> {
        match self.catalog.find_exact_identifier(term).await {
            Ok(Some(book)) => {
                info!(book_id = book.id, "exact identifier match in local catalog");
                let result = ProviderResult::from_books(
                    LOCAL_PROVIDER,
                    term,
                    vec![book.to_record(LOCAL_PROVIDER)],
                    None,
                );
                Some(SearchResponse::from_result(result, SearchSource::Local))
            }
            Ok(None) => None,
            Err(error) => {
                warn!(error = %error, "local catalog lookup failed; searching providers");
                None
            }
        }
    }

    async fn search_remote(&self, term: &str, params: &SearchParams) -> SearchResponse {
        let key = cache_key(term, params.max_results, params.locale.as_deref());

        if let Some(cached) = self.cached(&key).await {
            debug!(provider = %cached.provider, "serving search from cache");
            return SearchResponse::from_result(cached, SearchSource::Cache);
        }

        let options = params.provider_options();
        let mut tried = Vec::new();
        let mut hints = Vec::new();
        let mut winner = None;

        for provider in self.providers.enabled() {
            tried.push(provider.name().to_string());
            debug!(provider = provider.name(), "trying provider");

            let result = match tokio::time::timeout(
                self.provider_deadline,
                provider.search(term, &options),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => {
                    warn!(provider = provider.name(), "provider call exceeded deadline");
                    ProviderResult::from_error(
                        provider.name(),
                        ProviderError::timeout(provider.name(), self.provider_deadline.as_secs()),
                    )
                }
            };

            if result.is_hit() {
                info!(
                    provider = provider.name(),
                    total_found = result.total_found,
                    "provider returned results"
                );
                winner = Some(result);
                break;
            }

            debug!(provider = provider.name(), message = %result.message, "provider had no results");
            // untyped failures carry caller-facing hints such as marketplace links
            if result.error.is_none() && !result.message.is_empty() {
                hints.push(result.message);
            }
        }

        match winner {
            Some(result) => {
                self.store(&key, &result).await;
                let mut response = SearchResponse::from_result(result, SearchSource::Provider);
                response.providers_tried = tried;
                response
            }
            None => no_results(term, tried, hints),
        }
    }

    async fn cached(&self, key: &str) -> Option<ProviderResult> {
        let raw = self.cache.get(key).await?;
        match serde_json::from_str::<ProviderResult>(&raw) {
            Ok(result) if result.is_hit() => Some(result),
            Ok(_) => None,
            Err(error) => {
                warn!(error = %error, "discarding unreadable cached search result");
                None
            }
        }
    }

    async fn store(&self, key: &str, result: &ProviderResult) {
        match serde_json::to_string(result) {
            Ok(raw) => self.cache.put(key, raw, self.cache_ttl).await,
            Err(error) => warn!(error = %error, "failed to serialize search result for cache"),
        }
    }

    fn attach_links(&self, response: &mut SearchResponse, params: &SearchParams) {
        if !self.links.is_enabled() {
            debug!("links requested but no affiliate tags configured");
            return;
        }
        let region = params
            .locale
            .as_deref()
            .map_or(self.default_region, |locale| {
                region_for_locale(locale, self.default_region)
            });
        response.links = response
            .books
            .iter()
            .enumerate()
            .map(|(position, record)| BookLinks {
                position,
                links: self.links.links_for_record(record, &[region]),
            })
            .filter(|entry| !entry.links.is_empty())
            .collect();
    }
}

impl std::fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("providers", &self.providers)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

fn no_results(term: &str, tried: Vec<String>, hints: Vec<String>) -> SearchResponse {
    let message = if tried.is_empty() {
        "No providers are enabled; check the configuration".to_string()
    } else {
        format!(
            "No results found for \"{term}\" (tried: {})",
            tried.join(", ")
        )
    };
    info!(providers_tried = tried.len(), "search exhausted all providers");

    let mut suggestions = Vec::new();
    match isbn::normalize_isbn(term) {
        Some(digits) if !isbn::has_valid_checksum(&digits) => {
            suggestions.push("Check the ISBN digits; the check digit does not match".to_string());
        }
        Some(_) => suggestions.push("Try searching by title and author instead".to_string()),
        None => {
            suggestions.push("Check the spelling of the title or author".to_string());
            suggestions.push("Try searching by ISBN".to_string());
            suggestions.push("Use fewer or more general keywords".to_string());
        }
    }
    suggestions.extend(hints);

    let mut response = SearchResponse::failure(message);
    response.suggestions = suggestions;
    response.providers_tried = tried;
    response
}
