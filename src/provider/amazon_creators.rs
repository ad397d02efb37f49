//! Amazon Creators catalog API provider.
//!
//! Authenticates with an OAuth2 client-credentials token and calls the
//! `searchItems`, `getItems` and `getVariations` catalog operations on the
//! endpoint for the requested marketplace region. Payloads follow the PA-API 5
//! shapes in camelCase.
//!
//! Searches are paged (up to [`MAX_PAGES`] pages of [`ITEMS_PER_PAGE`] items)
//! with a fixed delay between pages. An HTTP 429 from Amazon sets a
//! short-circuit flag in the shared cache; while the flag is live every
//! operation fails fast without touching the network.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, is_rate_limited, set_rate_limited};
use crate::config::AmazonCreatorsConfig;
use crate::isbn;
use crate::links::Region;

use super::http_client::build_provider_http_client;
use super::utils::{clean_text, error_for_status, https_url, join_authors, retain_well_formed};
use super::{
    BookProvider, ExternalRecord, MAX_PAGES, ProviderError, ProviderResult, SearchOptions,
    truncate_ids,
};

const PROVIDER_NAME: &str = "Amazon Creators";

/// Page size accepted by `searchItems`.
pub const ITEMS_PER_PAGE: u32 = 10;

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

const SEARCH_INDEX: &str = "Books";

const RESOURCES: [&str; 8] = [
    "itemInfo.title",
    "itemInfo.byLineInfo",
    "itemInfo.contentInfo",
    "itemInfo.externalIds",
    "itemInfo.classifications",
    "images.primary.large",
    "images.primary.medium",
    "offersV2.listings.price",
];

// ==================== Request Payloads ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchItemsRequest<'a> {
    pub keywords: &'a str,
    pub search_index: &'static str,
    pub item_count: u32,
    pub item_page: u32,
    pub marketplace: String,
    pub resources: &'static [&'static str],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetItemsRequest {
    pub item_ids: Vec<String>,
    pub item_id_type: &'static str,
    pub marketplace: String,
    pub resources: &'static [&'static str],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetVariationsRequest<'a> {
    pub asin: &'a str,
    pub marketplace: String,
    pub resources: &'static [&'static str],
}

// ==================== Response Types ====================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: u64,
}

fn default_token_lifetime() -> u64 {
    3600
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct CatalogResponse {
    pub search_result: Option<ItemList>,
    pub items_result: Option<ItemList>,
    pub variations_result: Option<ItemList>,
    pub errors: Vec<ApiErrorEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ItemList {
    pub total_result_count: Option<u64>,
    pub items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ApiErrorEntry {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Item {
    pub asin: String,
    pub detail_page_url: Option<String>,
    pub item_info: ItemInfo,
    pub images: Option<Images>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ItemInfo {
    pub title: Option<DisplayValue<String>>,
    pub by_line_info: Option<ByLineInfo>,
    pub content_info: Option<ContentInfo>,
    pub external_ids: Option<ExternalIds>,
    pub classifications: Option<Classifications>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct DisplayValue<T: Default> {
    pub display_value: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct DisplayValues {
    pub display_values: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ByLineInfo {
    pub contributors: Vec<Contributor>,
    pub manufacturer: Option<DisplayValue<String>>,
    pub brand: Option<DisplayValue<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Contributor {
    pub name: String,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ContentInfo {
    pub pages_count: Option<DisplayValue<i64>>,
    pub publication_date: Option<DisplayValue<String>>,
    pub languages: Option<Languages>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Languages {
    pub display_values: Vec<LanguageValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct LanguageValue {
    pub display_value: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ExternalIds {
    pub isbns: Option<DisplayValues>,
    pub eans: Option<DisplayValues>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Classifications {
    pub binding: Option<DisplayValue<String>>,
    pub product_group: Option<DisplayValue<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Images {
    pub primary: Option<ImageSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ImageSet {
    pub large: Option<ImageRef>,
    pub medium: Option<ImageRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ImageRef {
    #[serde(rename = "URL", alias = "url")]
    pub url: String,
}

// ==================== Token Cache ====================

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

// ==================== AmazonCreatorsProvider ====================

/// Amazon Creators catalog API provider.
pub struct AmazonCreatorsProvider {
    client: Client,
    config: AmazonCreatorsConfig,
    default_region: Region,
    cache: Arc<dyn CacheStore>,
    token: Mutex<Option<AccessToken>>,
}

impl AmazonCreatorsProvider {
    /// Creates the provider.
    ///
    /// `default_region` is used when a search carries neither a region nor a
    /// locale. `cache` holds the rate-limit short-circuit flag.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if HTTP client construction fails.
    #[tracing::instrument(skip_all, fields(enabled = config.enabled, region = %default_region))]
    pub fn new(
        config: AmazonCreatorsConfig,
        default_region: Region,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, ProviderError> {
        let client = build_provider_http_client("amazon_creators", config.timeout_secs)?;
        Ok(Self {
            client,
            config,
            default_region,
            cache,
            token: Mutex::new(None),
        })
    }

    /// API root for a marketplace region.
    #[must_use]
    pub fn endpoint(&self, region: Region) -> String {
        match &self.config.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://creatorsapi.{}", region.domain()),
        }
    }

    /// Keyword sent to `searchItems`: bare ISBN digits, else "title author",
    /// else the trimmed query.
    #[must_use]
    pub fn build_keywords(query: &str, options: &SearchOptions) -> String {
        if let Some(digits) = isbn::normalize_isbn(query) {
            return digits;
        }
        if let Some((title, author)) = options.title_author() {
            return format!("{title} {author}");
        }
        query.trim().to_string()
    }

    /// Returns a bearer token, fetching a new one when the cached one is stale.
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let (Some(id), Some(secret)) = (
            self.config.credential_id.as_deref(),
            self.config.credential_secret.as_deref(),
        ) else {
            return Err(ProviderError::disabled(PROVIDER_NAME, "credentials missing"));
        };

        debug!(token_url = %self.config.token_url, "requesting Amazon Creators access token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", id),
            ("client_secret", secret),
            ("scope", "creatorsapi/default"),
        ];
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|error| {
                ProviderError::from_reqwest(PROVIDER_NAME, self.config.timeout_secs, &error)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(PROVIDER_NAME, status, response.headers()));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|error| ProviderError::malformed(PROVIDER_NAME, error.to_string()))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let token = AccessToken {
            value: body.access_token,
            refresh_at: Instant::now() + lifetime,
        };
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    /// POSTs one catalog operation, recording the rate-limit flag on 429.
    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        operation: &str,
        region: Region,
        body: &B,
    ) -> Result<T, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}/catalog/v1/{operation}", self.endpoint(region));
        debug!(api_url = %url, region = %region, "Calling Amazon Creators API");

        let response = self
            .client
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {token}, Version {}", self.config.version),
            )
            .header("x-marketplace", region.marketplace_host())
            .json(body)
            .send()
            .await
            .map_err(|error| {
                ProviderError::from_reqwest(PROVIDER_NAME, self.config.timeout_secs, &error)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error = error_for_status(PROVIDER_NAME, status, response.headers());
            if let ProviderError::RateLimited {
                retry_after_secs, ..
            } = &error
            {
                let window = if *retry_after_secs > 0 {
                    *retry_after_secs
                } else {
                    self.config.rate_limit_window_secs
                };
                warn!(window_secs = window, "Amazon Creators rate limited; short-circuiting");
                set_rate_limited(self.cache.as_ref(), PROVIDER_NAME, Duration::from_secs(window))
                    .await;
            }
            return Err(error);
        }

        response.json::<T>().await.map_err(|error| {
            warn!(error = %error, "Failed to parse Amazon Creators response JSON");
            ProviderError::malformed(PROVIDER_NAME, error.to_string())
        })
    }

    /// Fails fast when the short-circuit flag is live or the provider is off.
    async fn preflight(&self) -> Result<(), ProviderError> {
        if !self.is_enabled() {
            return Err(ProviderError::disabled(
                PROVIDER_NAME,
                "disabled or credentials missing",
            ));
        }
        if is_rate_limited(self.cache.as_ref(), PROVIDER_NAME).await {
            debug!("rate-limit flag set; skipping network call");
            return Err(ProviderError::rate_limited(PROVIDER_NAME, 0));
        }
        Ok(())
    }

    async fn fetch_page(
        &self,
        keywords: &str,
        region: Region,
        page: u32,
        item_count: u32,
    ) -> Result<ItemList, ProviderError> {
        let request = SearchItemsRequest {
            keywords,
            search_index: SEARCH_INDEX,
            item_count,
            item_page: page,
            marketplace: region.marketplace_host(),
            resources: &RESOURCES,
        };
        let response: CatalogResponse = self.call("searchItems", region, &request).await?;
        Ok(checked_list(response.search_result, response.errors))
    }

    /// Paged search; see the module docs for the stop rules.
    async fn paged_search(
        &self,
        keywords: &str,
        options: &SearchOptions,
    ) -> Result<(Vec<ExternalRecord>, Option<u64>), ProviderError> {
        let region = options.region_or(self.default_region);
        let pages = options.pages.clamp(1, MAX_PAGES);
        let item_count = options.max_results.clamp(1, ITEMS_PER_PAGE);
        let delay = Duration::from_millis(self.config.inter_page_delay_ms);

        let mut records = Vec::new();
        let mut total = None;
        for page in 1..=pages {
            if page > 1 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let list = match self.fetch_page(keywords, region, page, item_count).await {
                Ok(list) => list,
                Err(error) if page == 1 => return Err(error),
                Err(error) => {
                    warn!(page, error = %error, "Amazon Creators page failed; keeping earlier pages");
                    break;
                }
            };

            if total.is_none() {
                total = list.total_result_count;
            }
            let received = list.items.len();
            debug!(page, received, "fetched Amazon Creators page");
            records.extend(list.items.into_iter().map(item_to_record));

            if received == 0 {
                debug!(page, "empty page; stopping");
                break;
            }
            if received < item_count as usize {
                debug!(page, "short page; results exhausted");
                break;
            }
        }
        Ok((retain_well_formed(PROVIDER_NAME, records), total))
    }

    async fn report<F>(&self, query: &str, operation: F) -> ProviderResult
    where
        F: Future<Output = Result<(Vec<ExternalRecord>, Option<u64>), ProviderError>>,
    {
        if let Err(error) = self.preflight().await {
            return ProviderResult::from_error(PROVIDER_NAME, error);
        }
        match operation.await {
            Ok((records, total)) => {
                let result = ProviderResult::from_books(PROVIDER_NAME, query, records, total);
                if result.success {
                    info!(results = result.books.len(), "Amazon Creators returned results");
                }
                result
            }
            Err(error) => {
                warn!(error = %error, "Amazon Creators request failed");
                ProviderResult::from_error(PROVIDER_NAME, error)
            }
        }
    }
}

impl std::fmt::Debug for AmazonCreatorsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmazonCreatorsProvider")
            .field("enabled", &self.config.enabled)
            .field("has_credentials", &self.config.has_credentials())
            .field("default_region", &self.default_region)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BookProvider for AmazonCreatorsProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn priority(&self) -> u8 {
        3
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.has_credentials()
    }

    fn provider_key(&self, record: &ExternalRecord) -> Option<String> {
        record.amazon_asin.clone()
    }

    #[tracing::instrument(skip(self, options), fields(provider = PROVIDER_NAME))]
    async fn search(&self, query: &str, options: &SearchOptions) -> ProviderResult {
        let keywords = Self::build_keywords(query, options);
        self.report(&keywords, self.paged_search(&keywords, options))
            .await
    }

    #[tracing::instrument(skip(self, ids), fields(provider = PROVIDER_NAME, requested = ids.len()))]
    async fn get_items(&self, ids: &[String]) -> ProviderResult {
        let item_ids = truncate_ids(ids);
        let joined = item_ids.join(",");
        let region = self.default_region;
        let request = GetItemsRequest {
            item_ids,
            item_id_type: "ASIN",
            marketplace: region.marketplace_host(),
            resources: &RESOURCES,
        };
        let operation = async {
            let response: CatalogResponse = self.call("getItems", region, &request).await?;
            let list = checked_list(response.items_result, response.errors);
            let records = list.items.into_iter().map(item_to_record).collect();
            Ok((retain_well_formed(PROVIDER_NAME, records), None))
        };
        self.report(&joined, operation).await
    }

    #[tracing::instrument(skip(self), fields(provider = PROVIDER_NAME))]
    async fn get_variations(&self, id: &str) -> ProviderResult {
        let asin = id.trim();
        let region = self.default_region;
        let request = GetVariationsRequest {
            asin,
            marketplace: region.marketplace_host(),
            resources: &RESOURCES,
        };
        let operation = async {
            let response: CatalogResponse = self.call("getVariations", region, &request).await?;
            let list = checked_list(response.variations_result, response.errors);
            let records = list
                .items
                .into_iter()
                .map(item_to_record)
                .filter(|record| record.amazon_asin.as_deref() != Some(asin))
                .collect();
            Ok((retain_well_formed(PROVIDER_NAME, records), None))
        };
        self.report(asin, operation).await
    }
}

// ==================== Helpers ====================

/// Unwraps a result list, logging per-item API errors.
fn checked_list(list: Option<ItemList>, errors: Vec<ApiErrorEntry>) -> ItemList {
    for error in &errors {
        debug!(code = %error.code, message = %error.message, "Amazon Creators item error");
    }
    list.unwrap_or_default()
}

fn item_to_record(item: Item) -> ExternalRecord {
    let info = item.item_info;

    let by_line = info.by_line_info.unwrap_or_default();
    let authors: Vec<String> = {
        let named_authors: Vec<String> = by_line
            .contributors
            .iter()
            .filter(|c| {
                c.role
                    .as_deref()
                    .is_some_and(|role| role.eq_ignore_ascii_case("author"))
            })
            .map(|c| c.name.clone())
            .collect();
        if named_authors.is_empty() {
            by_line.contributors.into_iter().map(|c| c.name).collect()
        } else {
            named_authors
        }
    };
    let publisher = by_line
        .manufacturer
        .or(by_line.brand)
        .map(|value| value.display_value);

    let content = info.content_info.unwrap_or_default();
    let language = content.languages.and_then(|languages| {
        let values = languages.display_values;
        let published = values.iter().position(|v| {
            v.kind
                .as_deref()
                .is_some_and(|kind| kind.eq_ignore_ascii_case("published"))
        });
        values
            .into_iter()
            .nth(published.unwrap_or(0))
            .map(|v| v.display_value)
    });

    let ids = info.external_ids.unwrap_or_default();
    let mut isbn_10 = None;
    let mut isbn_13 = None;
    let raw_ids = ids
        .isbns
        .into_iter()
        .chain(ids.eans)
        .flat_map(|values| values.display_values);
    for raw in raw_ids {
        match isbn::normalize_isbn(&raw) {
            Some(value) if value.len() == 10 && isbn_10.is_none() => isbn_10 = Some(value),
            Some(value) if value.len() == 13 && isbn_13.is_none() => isbn_13 = Some(value),
            _ => {}
        }
    }

    let thumbnail = item
        .images
        .and_then(|images| images.primary)
        .and_then(|set| set.large.or(set.medium))
        .map(|image| https_url(&image.url))
        .filter(|url| !url.is_empty());

    let categories = info
        .classifications
        .and_then(|c| c.binding)
        .map(|binding| binding.display_value)
        .filter(|binding| !binding.trim().is_empty())
        .into_iter()
        .collect();

    let mut record = ExternalRecord {
        provider: PROVIDER_NAME.to_string(),
        amazon_asin: clean_text(Some(item.asin)),
        title: info
            .title
            .map(|title| title.display_value.trim().to_string())
            .unwrap_or_default(),
        authors: join_authors(&authors),
        isbn_10,
        isbn_13,
        thumbnail,
        publisher: clean_text(publisher),
        published_date: clean_text(content.publication_date.map(|date| date.display_value)),
        page_count: content
            .pages_count
            .map(|pages| pages.display_value)
            .filter(|pages| *pages > 0),
        language: clean_text(language),
        categories,
        info_link: clean_text(item.detail_page_url),
        ..ExternalRecord::default()
    };
    record.settle_isbn();
    record
}
