//! Google Books provider - the free, highest-priority source.
//!
//! Queries the volumes API (`GET /volumes?q=...&printType=books`). ISBN-shaped
//! queries are sent as `isbn:<digits>` so the API performs an identifier
//! lookup instead of free-text matching.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::GoogleBooksConfig;
use crate::isbn;

use super::http_client::build_provider_http_client;
use super::utils::{clean_text, error_for_status, https_url, join_authors, retain_well_formed};
use super::{
    BookProvider, ExternalRecord, ProviderError, ProviderResult, SearchOptions, truncate_ids,
};

const PROVIDER_NAME: &str = "Google Books";

/// The volumes API rejects `maxResults` above this.
const MAX_RESULTS_PER_REQUEST: u32 = 40;

// ==================== Google Books API Response Types ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VolumesResponse {
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Volume {
    pub id: String,
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct VolumeInfo {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    pub industry_identifiers: Vec<IndustryIdentifier>,
    pub page_count: Option<i64>,
    pub categories: Vec<String>,
    pub maturity_rating: Option<String>,
    pub image_links: Option<ImageLinks>,
    pub language: Option<String>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageLinks {
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
}

// ==================== GoogleBooksProvider ====================

/// Google Books volumes API provider.
pub struct GoogleBooksProvider {
    client: Client,
    config: GoogleBooksConfig,
}

impl GoogleBooksProvider {
    /// Creates the provider from its config section.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if HTTP client construction fails.
    #[tracing::instrument(skip_all, fields(base_url = %config.base_url))]
    pub fn new(config: GoogleBooksConfig) -> Result<Self, ProviderError> {
        let client = build_provider_http_client("google_books", config.timeout_secs)?;
        Ok(Self { client, config })
    }

    /// Builds the `q` parameter for a user query.
    #[must_use]
    pub fn build_query(query: &str) -> String {
        match isbn::normalize_isbn(query) {
            Some(digits) => format!("isbn:{digits}"),
            None => query.trim().to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.get(&url).query(params);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.query(&[("key", key)]);
        }

        debug!(api_url = %url, "Calling Google Books API");
        let response = request.send().await.map_err(|error| {
            ProviderError::from_reqwest(PROVIDER_NAME, self.config.timeout_secs, &error)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(PROVIDER_NAME, status, response.headers()));
        }

        response.json::<T>().await.map_err(|error| {
            warn!(error = %error, "Failed to parse Google Books response JSON");
            ProviderError::malformed(PROVIDER_NAME, error.to_string())
        })
    }

    async fn run_search(
        &self,
        q: &str,
        max_results: u32,
    ) -> Result<(Vec<ExternalRecord>, u64), ProviderError> {
        let params = [
            ("q", q.to_string()),
            ("maxResults", max_results.clamp(1, MAX_RESULTS_PER_REQUEST).to_string()),
            ("printType", "books".to_string()),
        ];
        let body: VolumesResponse = self.get_json("/volumes", &params).await?;
        let records = body.items.into_iter().map(volume_to_record).collect();
        Ok((retain_well_formed(PROVIDER_NAME, records), body.total_items))
    }

    async fn fetch_volume(&self, id: &str) -> Result<Volume, ProviderError> {
        let path = format!("/volumes/{}", urlencoding::encode(id));
        self.get_json(&path, &[]).await
    }

    async fn variations(&self, id: &str) -> Result<Vec<ExternalRecord>, ProviderError> {
        let original = volume_to_record(self.fetch_volume(id).await?);
        if original.title.trim().is_empty() {
            return Err(ProviderError::malformed(PROVIDER_NAME, "volume has no title"));
        }

        let mut q = format!("intitle:\"{}\"", original.title.trim());
        if let Some(first_author) = original
            .authors
            .as_deref()
            .and_then(|authors| authors.split(", ").next())
        {
            q.push_str(&format!(" inauthor:\"{first_author}\""));
        }

        let (records, _) = self.run_search(&q, MAX_RESULTS_PER_REQUEST).await?;
        Ok(records
            .into_iter()
            .filter(|record| record.google_id.as_deref() != Some(id))
            .collect())
    }
}

impl std::fmt::Debug for GoogleBooksProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleBooksProvider")
            .field("base_url", &self.config.base_url)
            .field("has_api_key", &self.config.api_key.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BookProvider for GoogleBooksProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn priority(&self) -> u8 {
        1
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn provider_key(&self, record: &ExternalRecord) -> Option<String> {
        record.google_id.clone()
    }

    #[tracing::instrument(skip(self, options), fields(provider = PROVIDER_NAME))]
    async fn search(&self, query: &str, options: &SearchOptions) -> ProviderResult {
        if !self.is_enabled() {
            return ProviderResult::from_error(
                PROVIDER_NAME,
                ProviderError::disabled(PROVIDER_NAME, "disabled in configuration"),
            );
        }
        let q = Self::build_query(query);
        match self.run_search(&q, options.max_results).await {
            Ok((records, total)) => ProviderResult::from_books(PROVIDER_NAME, query, records, Some(total)),
            Err(error) => {
                warn!(error = %error, "Google Books search failed");
                ProviderResult::from_error(PROVIDER_NAME, error)
            }
        }
    }

    #[tracing::instrument(skip(self, ids), fields(provider = PROVIDER_NAME, requested = ids.len()))]
    async fn get_items(&self, ids: &[String]) -> ProviderResult {
        let ids = truncate_ids(ids);
        let mut records = Vec::with_capacity(ids.len());
        let mut last_error = None;
        for id in &ids {
            match self.fetch_volume(id).await {
                Ok(volume) => records.push(volume_to_record(volume)),
                Err(error) => {
                    debug!(id = %id, error = %error, "Google Books volume lookup failed");
                    last_error = Some(error);
                }
            }
        }
        let records = retain_well_formed(PROVIDER_NAME, records);
        match (records.is_empty(), last_error) {
            (true, Some(error)) => ProviderResult::from_error(PROVIDER_NAME, error),
            _ => ProviderResult::from_books(PROVIDER_NAME, &ids.join(","), records, None),
        }
    }

    #[tracing::instrument(skip(self), fields(provider = PROVIDER_NAME))]
    async fn get_variations(&self, id: &str) -> ProviderResult {
        match self.variations(id).await {
            Ok(records) => ProviderResult::from_books(PROVIDER_NAME, id, records, None),
            Err(error) => {
                debug!(error = %error, "Google Books variations lookup failed");
                ProviderResult::from_error(PROVIDER_NAME, error)
            }
        }
    }
}

// ==================== Normalization ====================

fn volume_to_record(volume: Volume) -> ExternalRecord {
    let info = volume.volume_info;

    let mut isbn_10 = None;
    let mut isbn_13 = None;
    for identifier in &info.industry_identifiers {
        let normalized = isbn::normalize_isbn(&identifier.identifier);
        match identifier.kind.as_str() {
            "ISBN_13" => isbn_13 = isbn_13.or(normalized),
            "ISBN_10" => isbn_10 = isbn_10.or(normalized),
            _ => {}
        }
    }

    let thumbnail = info
        .image_links
        .and_then(|links| links.thumbnail.or(links.small_thumbnail))
        .map(|url| https_url(&url));

    let mut record = ExternalRecord {
        provider: PROVIDER_NAME.to_string(),
        google_id: Some(volume.id),
        title: info.title.unwrap_or_default().trim().to_string(),
        subtitle: clean_text(info.subtitle),
        authors: join_authors(&info.authors),
        isbn_10,
        isbn_13,
        thumbnail,
        description: clean_text(info.description),
        publisher: clean_text(info.publisher),
        published_date: clean_text(info.published_date),
        page_count: info.page_count.filter(|count| *count > 0),
        language: clean_text(info.language),
        categories: info
            .categories
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        maturity_rating: clean_text(info.maturity_rating),
        preview_link: clean_text(info.preview_link),
        info_link: clean_text(info.info_link),
        ..ExternalRecord::default()
    };
    record.settle_isbn();
    record
}
