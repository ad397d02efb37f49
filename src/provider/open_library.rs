//! Open Library provider.
//!
//! ISBN-shaped queries go to the Books API
//! (`/api/books?bibkeys=ISBN:<digits>&format=json&jscmd=data`); everything else
//! goes to the Search API (`/search.json`). Editions of a work come from
//! `/works/<key>/editions.json`.
//!
//! When a payload carries no cover, the thumbnail falls back to the fixed
//! `covers.openlibrary.org/b/isbn/<isbn>-M.jpg` pattern.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::OpenLibraryConfig;
use crate::isbn;

use super::http_client::build_provider_http_client;
use super::utils::{clean_text, error_for_status, https_url, join_authors, retain_well_formed};
use super::{
    BookProvider, ExternalRecord, ProviderError, ProviderResult, SearchOptions, truncate_ids,
};

const PROVIDER_NAME: &str = "Open Library";

const EDITIONS_LIMIT: u32 = 50;

// ==================== Open Library API Response Types ====================

/// One entry of a Books API (`jscmd=data`) response, keyed by bibkey.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct BookData {
    pub key: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Vec<Named>,
    pub publishers: Vec<Named>,
    pub publish_date: Option<String>,
    pub number_of_pages: Option<i64>,
    pub identifiers: Identifiers,
    pub cover: Option<Cover>,
    pub subjects: Vec<Named>,
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Named {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Identifiers {
    pub isbn_10: Vec<String>,
    pub isbn_13: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Cover {
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SearchResponse {
    #[serde(rename = "numFound")]
    pub num_found: u64,
    pub docs: Vec<SearchDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SearchDoc {
    pub key: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author_name: Vec<String>,
    pub publisher: Vec<String>,
    pub first_publish_year: Option<i64>,
    pub isbn: Vec<String>,
    pub number_of_pages_median: Option<i64>,
    pub language: Vec<String>,
    pub subject: Vec<String>,
    pub cover_i: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct EditionsResponse {
    pub size: u64,
    pub entries: Vec<Edition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Edition {
    pub key: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub publishers: Vec<String>,
    pub publish_date: Option<String>,
    pub number_of_pages: Option<i64>,
    pub isbn_10: Vec<String>,
    pub isbn_13: Vec<String>,
    pub covers: Vec<i64>,
    pub languages: Vec<KeyRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct KeyRef {
    pub key: String,
}

// ==================== OpenLibraryProvider ====================

/// Open Library books/search API provider.
pub struct OpenLibraryProvider {
    client: Client,
    config: OpenLibraryConfig,
}

impl OpenLibraryProvider {
    /// Creates the provider from its config section.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if HTTP client construction fails.
    #[tracing::instrument(skip_all, fields(base_url = %config.base_url))]
    pub fn new(config: OpenLibraryConfig) -> Result<Self, ProviderError> {
        let client = build_provider_http_client("open_library", config.timeout_secs)?;
        Ok(Self { client, config })
    }

    /// Cover URL for an ISBN using the fixed covers pattern.
    #[must_use]
    pub fn isbn_cover_url(&self, isbn: &str) -> String {
        format!(
            "{}/b/isbn/{isbn}-M.jpg",
            self.config.covers_base_url.trim_end_matches('/')
        )
    }

    fn cover_id_url(&self, cover_id: i64) -> String {
        format!(
            "{}/b/id/{cover_id}-M.jpg",
            self.config.covers_base_url.trim_end_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        debug!(api_url = %url, "Calling Open Library API");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|error| {
                ProviderError::from_reqwest(PROVIDER_NAME, self.config.timeout_secs, &error)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(PROVIDER_NAME, status, response.headers()));
        }

        response.json::<T>().await.map_err(|error| {
            warn!(error = %error, "Failed to parse Open Library response JSON");
            ProviderError::malformed(PROVIDER_NAME, error.to_string())
        })
    }

    /// Books API lookup for a list of bibkeys (`ISBN:...`, `OLID:...`).
    async fn lookup_bibkeys(&self, bibkeys: &[String]) -> Result<Vec<ExternalRecord>, ProviderError> {
        let params = [
            ("bibkeys", bibkeys.join(",")),
            ("format", "json".to_string()),
            ("jscmd", "data".to_string()),
        ];
        let mut body: HashMap<String, BookData> = self.get_json("/api/books", &params).await?;

        // keep request order; the response is an unordered map
        let records = bibkeys
            .iter()
            .filter_map(|bibkey| body.remove(bibkey))
            .map(|data| self.book_data_to_record(data))
            .collect();
        Ok(retain_well_formed(PROVIDER_NAME, records))
    }

    async fn text_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<(Vec<ExternalRecord>, u64), ProviderError> {
        let mut params = vec![("limit", options.max_results.max(1).to_string())];
        match options.title_author() {
            Some((title, author)) => {
                params.push(("title", title.to_string()));
                params.push(("author", author.to_string()));
            }
            None => params.push(("q", query.trim().to_string())),
        }
        let body: SearchResponse = self.get_json("/search.json", &params).await?;
        let records = body
            .docs
            .into_iter()
            .map(|doc| self.search_doc_to_record(doc))
            .collect();
        Ok((retain_well_formed(PROVIDER_NAME, records), body.num_found))
    }

    async fn editions(&self, work_id: &str) -> Result<Vec<ExternalRecord>, ProviderError> {
        let work = work_id
            .trim()
            .trim_start_matches("/works/")
            .trim_end_matches('/');
        if work.is_empty() || !work.ends_with('W') {
            return Err(ProviderError::not_found(PROVIDER_NAME, work_id));
        }
        let path = format!("/works/{}/editions.json", urlencoding::encode(work));
        let body: EditionsResponse = self
            .get_json(&path, &[("limit", EDITIONS_LIMIT.to_string())])
            .await?;
        debug!(work, size = body.size, "fetched Open Library editions");
        let records = body
            .entries
            .into_iter()
            .map(|edition| self.edition_to_record(edition))
            .collect();
        Ok(retain_well_formed(PROVIDER_NAME, records))
    }

    fn book_data_to_record(&self, data: BookData) -> ExternalRecord {
        let isbn_13 = first_isbn(&data.identifiers.isbn_13);
        let isbn_10 = first_isbn(&data.identifiers.isbn_10);
        let cover = data
            .cover
            .and_then(|cover| cover.medium.or(cover.large).or(cover.small));

        let authors: Vec<String> = data.authors.into_iter().map(|a| a.name).collect();
        let mut record = ExternalRecord {
            provider: PROVIDER_NAME.to_string(),
            open_library_key: clean_text(data.key),
            title: data.title.unwrap_or_default().trim().to_string(),
            subtitle: clean_text(data.subtitle),
            authors: join_authors(&authors),
            isbn_10,
            isbn_13,
            thumbnail: cover.map(|url| https_url(&url)),
            publisher: data.publishers.into_iter().map(|p| p.name).find(|p| !p.trim().is_empty()),
            published_date: clean_text(data.publish_date),
            page_count: data.number_of_pages.filter(|pages| *pages > 0),
            categories: data
                .subjects
                .into_iter()
                .map(|s| s.name.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            info_link: clean_text(data.url),
            ..ExternalRecord::default()
        };
        self.finish_record(&mut record);
        record
    }

    fn search_doc_to_record(&self, doc: SearchDoc) -> ExternalRecord {
        let (isbn_13, isbn_10) = split_isbns(&doc.isbn);
        let mut record = ExternalRecord {
            provider: PROVIDER_NAME.to_string(),
            open_library_key: clean_text(doc.key),
            title: doc.title.unwrap_or_default().trim().to_string(),
            subtitle: clean_text(doc.subtitle),
            authors: join_authors(&doc.author_name),
            isbn_10,
            isbn_13,
            thumbnail: doc.cover_i.map(|id| self.cover_id_url(id)),
            publisher: doc.publisher.into_iter().find(|p| !p.trim().is_empty()),
            published_date: doc.first_publish_year.map(|year| year.to_string()),
            page_count: doc.number_of_pages_median.filter(|pages| *pages > 0),
            language: doc.language.into_iter().find(|l| !l.trim().is_empty()),
            categories: doc.subject.into_iter().take(10).collect(),
            ..ExternalRecord::default()
        };
        self.finish_record(&mut record);
        record
    }

    fn edition_to_record(&self, edition: Edition) -> ExternalRecord {
        let mut record = ExternalRecord {
            provider: PROVIDER_NAME.to_string(),
            open_library_key: clean_text(edition.key),
            title: edition.title.unwrap_or_default().trim().to_string(),
            subtitle: clean_text(edition.subtitle),
            isbn_10: first_isbn(&edition.isbn_10),
            isbn_13: first_isbn(&edition.isbn_13),
            thumbnail: edition
                .covers
                .iter()
                .find(|id| **id > 0)
                .map(|id| self.cover_id_url(*id)),
            publisher: edition.publishers.into_iter().find(|p| !p.trim().is_empty()),
            published_date: clean_text(edition.publish_date),
            page_count: edition.number_of_pages.filter(|pages| *pages > 0),
            language: edition
                .languages
                .first()
                .and_then(|lang| lang.key.rsplit('/').next())
                .filter(|code| !code.is_empty())
                .map(str::to_string),
            ..ExternalRecord::default()
        };
        self.finish_record(&mut record);
        record
    }

    /// Settles the primary ISBN and applies the ISBN cover fallback.
    fn finish_record(&self, record: &mut ExternalRecord) {
        record.settle_isbn();
        if record.thumbnail.is_none()
            && let Some(isbn) = record.isbn.clone()
        {
            record.thumbnail = Some(self.isbn_cover_url(&isbn));
        }
    }
}

impl std::fmt::Debug for OpenLibraryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenLibraryProvider")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BookProvider for OpenLibraryProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn priority(&self) -> u8 {
        2
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn provider_key(&self, record: &ExternalRecord) -> Option<String> {
        record.open_library_key.clone()
    }

    #[tracing::instrument(skip(self, options), fields(provider = PROVIDER_NAME))]
    async fn search(&self, query: &str, options: &SearchOptions) -> ProviderResult {
        if !self.is_enabled() {
            return ProviderResult::from_error(
                PROVIDER_NAME,
                ProviderError::disabled(PROVIDER_NAME, "disabled in configuration"),
            );
        }

        let outcome = match isbn::normalize_isbn(query) {
            Some(digits) => self
                .lookup_bibkeys(&[format!("ISBN:{digits}")])
                .await
                .map(|records| (records, None)),
            None => self
                .text_search(query, options)
                .await
                .map(|(records, total)| (records, Some(total))),
        };

        match outcome {
            Ok((records, total)) => ProviderResult::from_books(PROVIDER_NAME, query, records, total),
            Err(error) => {
                warn!(error = %error, "Open Library search failed");
                ProviderResult::from_error(PROVIDER_NAME, error)
            }
        }
    }

    #[tracing::instrument(skip(self, ids), fields(provider = PROVIDER_NAME, requested = ids.len()))]
    async fn get_items(&self, ids: &[String]) -> ProviderResult {
        let bibkeys: Vec<String> = truncate_ids(ids)
            .into_iter()
            .filter_map(|id| bibkey_for(&id))
            .collect();
        if bibkeys.is_empty() {
            return ProviderResult::from_error(
                PROVIDER_NAME,
                ProviderError::not_found(PROVIDER_NAME, &ids.join(",")),
            );
        }
        match self.lookup_bibkeys(&bibkeys).await {
            Ok(records) => {
                ProviderResult::from_books(PROVIDER_NAME, &bibkeys.join(","), records, None)
            }
            Err(error) => ProviderResult::from_error(PROVIDER_NAME, error),
        }
    }

    #[tracing::instrument(skip(self), fields(provider = PROVIDER_NAME))]
    async fn get_variations(&self, id: &str) -> ProviderResult {
        match self.editions(id).await {
            Ok(records) => ProviderResult::from_books(PROVIDER_NAME, id, records, None),
            Err(error) => {
                debug!(error = %error, "Open Library editions lookup failed");
                ProviderResult::from_error(PROVIDER_NAME, error)
            }
        }
    }
}

// ==================== Helpers ====================

/// Maps an id to a Books API bibkey: ISBNs and edition OLIDs only.
fn bibkey_for(id: &str) -> Option<String> {
    if let Some(digits) = isbn::normalize_isbn(id) {
        return Some(format!("ISBN:{digits}"));
    }
    let olid = id.trim().trim_start_matches("/books/");
    if olid.starts_with("OL") && olid.ends_with('M') {
        return Some(format!("OLID:{olid}"));
    }
    debug!(id, "id is not batch-fetchable from Open Library");
    None
}

fn first_isbn(values: &[String]) -> Option<String> {
    values.iter().find_map(|value| isbn::normalize_isbn(value))
}

/// First ISBN-13 and first ISBN-10 from a mixed list.
fn split_isbns(values: &[String]) -> (Option<String>, Option<String>) {
    let normalized: Vec<String> = values
        .iter()
        .filter_map(|value| isbn::normalize_isbn(value))
        .collect();
    let isbn_13 = normalized.iter().find(|v| v.len() == 13).cloned();
    let isbn_10 = normalized.iter().find(|v| v.len() == 10).cloned();
    (isbn_13, isbn_10)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    fn provider_for(base_url: &str) -> OpenLibraryProvider {
        OpenLibraryProvider::new(OpenLibraryConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            ..OpenLibraryConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_bibkey_for_isbn_and_olid() {
        assert_eq!(bibkey_for("0-306-40615-2").as_deref(), Some("ISBN:0306406152"));
        assert_eq!(bibkey_for("/books/OL7353617M").as_deref(), Some("OLID:OL7353617M"));
        assert_eq!(bibkey_for("/works/OL45804W"), None);
    }

    #[test]
    fn test_split_isbns() {
        let (isbn13, isbn10) = split_isbns(&[
            "0306406152".to_string(),
            "junk".to_string(),
            "9780306406157".to_string(),
        ]);
        assert_eq!(isbn13.as_deref(), Some("9780306406157"));
        assert_eq!(isbn10.as_deref(), Some("0306406152"));
    }

    #[test]
    fn test_book_data_without_cover_uses_isbn_cover_pattern() {
        let provider = provider_for("https://openlibrary.org");
        let data: BookData = serde_json::from_value(serde_json::json!({
            "title": "Signals",
            "authors": [{"name": "A. Writer"}, {"name": "B. Writer"}],
            "identifiers": {"isbn_13": ["9780306406157"]},
            "number_of_pages": 210
        }))
        .unwrap();
        let record = provider.book_data_to_record(data);

        assert_eq!(record.authors.as_deref(), Some("A. Writer, B. Writer"));
        assert_eq!(record.isbn.as_deref(), Some("9780306406157"));
        assert_eq!(
            record.thumbnail.as_deref(),
            Some("https://covers.openlibrary.org/b/isbn/9780306406157-M.jpg")
        );
        assert_eq!(record.language, None);
    }

    #[tokio::test]
    async fn test_search_isbn_uses_books_api() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .and(query_param("bibkeys", "ISBN:9780306406157"))
            .and(query_param("jscmd", "data"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ISBN:9780306406157": {
                    "key": "/books/OL1M",
                    "title": "Signals",
                    "publishers": [{"name": "Plenum"}],
                    "cover": {"medium": "http://covers.openlibrary.org/b/id/1-M.jpg"}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider_for(&server.uri())
            .search("978-0-306-40615-7", &SearchOptions::default())
            .await;
        assert!(result.success);
        assert_eq!(result.total_found, 1);
        let record = &result.books[0];
        assert_eq!(record.publisher.as_deref(), Some("Plenum"));
        assert_eq!(
            record.thumbnail.as_deref(),
            Some("https://covers.openlibrary.org/b/id/1-M.jpg")
        );
    }

    #[tokio::test]
    async fn test_search_text_uses_title_and_author_hints() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("title", "Dom Casmurro"))
            .and(query_param("author", "Machado"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "numFound": 3,
                "docs": [{
                    "key": "/works/OL1W",
                    "title": "Dom Casmurro",
                    "author_name": ["Machado de Assis"],
                    "isbn": ["9788535902771"],
                    "language": ["por"],
                    "cover_i": 42
                }]
            })))
            .mount(&server)
            .await;

        let options = SearchOptions {
            title: Some("Dom Casmurro".to_string()),
            author: Some("Machado".to_string()),
            ..SearchOptions::default()
        };
        let result = provider_for(&server.uri())
            .search("Dom Casmurro Machado", &options)
            .await;

        assert!(result.success);
        assert_eq!(result.total_found, 3);
        assert_eq!(result.books[0].language.as_deref(), Some("por"));
        assert_eq!(
            result.books[0].thumbnail.as_deref(),
            Some("https://covers.openlibrary.org/b/id/42-M.jpg")
        );
    }

    #[tokio::test]
    async fn test_search_isbn_missing_from_books_api_is_failure() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let result = provider_for(&server.uri())
            .search("9781234567890", &SearchOptions::default())
            .await;
        assert!(!result.success);
        assert!(result.books.is_empty());
    }

    #[tokio::test]
    async fn test_get_variations_lists_editions() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/works/OL45804W/editions.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "size": 2,
                "entries": [
                    {"key": "/books/OL1M", "title": "Fantastic Mr Fox", "isbn_10": ["0140328726"],
                     "languages": [{"key": "/languages/eng"}]},
                    {"key": "/books/OL2M"}
                ]
            })))
            .mount(&server)
            .await;

        let result = provider_for(&server.uri())
            .get_variations("/works/OL45804W")
            .await;
        assert!(result.success);
        assert_eq!(result.books.len(), 1);
        assert_eq!(result.books[0].language.as_deref(), Some("eng"));
        assert_eq!(result.books[0].isbn.as_deref(), Some("0140328726"));
    }

    #[tokio::test]
    async fn test_get_variations_without_work_key_is_failure() {
        let provider = provider_for("http://127.0.0.1:9");
        let result = provider.get_variations("not-a-work").await;
        assert!(!result.success);
    }
}
