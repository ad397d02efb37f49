//! Canonical book types and status definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::provider::ExternalRecord;

/// How much curated or fetched data a canonical record carries.
///
/// Only ever moves `Basic -> Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookQuality {
    /// Created from partial data, not yet enriched.
    Basic,
    /// Enriched from a provider at least once.
    Complete,
}

impl BookQuality {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for BookQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "complete" => Ok(Self::Complete),
            _ => Err(format!("invalid book quality: {s}")),
        }
    }
}

/// Processing state of the Amazon ASIN lookup for a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsinStatus {
    /// Not looked up yet.
    Pending,
    /// Lookup in flight.
    Processing,
    /// Lookup finished (an ASIN may or may not have been found).
    Completed,
    /// Lookup failed.
    Failed,
}

impl AsinStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AsinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AsinStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid asin status: {s}")),
        }
    }
}

/// A persisted catalog entry, deduplicated across external identifiers.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct CanonicalBook {
    /// Stable catalog id.
    pub id: i64,
    /// Preferred ISBN form (ISBN-13 where derivable). Unique when set.
    pub isbn: Option<String>,
    /// Google Books volume id. Unique when set.
    pub google_id: Option<String>,
    /// Amazon ASIN. Unique when set.
    pub amazon_asin: Option<String>,
    pub title: String,
    /// Authors joined with `", "`.
    pub authors: Option<String>,
    pub subtitle: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i64>,
    pub language: Option<String>,
    /// Categories as a JSON array (read via [`CanonicalBook::categories`]).
    #[serde(serialize_with = "serialize_categories")]
    pub categories: Option<String>,
    pub maturity_rating: Option<String>,
    /// Quality indicator (stored as text, parsed via `quality()`).
    #[sqlx(rename = "quality")]
    #[serde(rename = "quality")]
    pub quality_str: String,
    /// Last enrichment timestamp (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub enriched_at: Option<String>,
    /// ASIN lookup status (stored as text, parsed via `asin_status()`).
    #[sqlx(rename = "asin_status")]
    #[serde(rename = "asin_status")]
    pub asin_status_str: String,
    pub asin_processed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CanonicalBook {
    /// Returns the parsed quality, treating unknown values as `Basic`.
    #[must_use]
    pub fn quality(&self) -> BookQuality {
        self.quality_str.parse().unwrap_or(BookQuality::Basic)
    }

    /// Returns the parsed ASIN status, treating unknown values as `Pending`.
    #[must_use]
    pub fn asin_status(&self) -> AsinStatus {
        self.asin_status_str.parse().unwrap_or(AsinStatus::Pending)
    }

    /// Decodes the stored categories list.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        decode_categories(self.categories.as_deref())
    }

    /// True when any external provider id is known for this book.
    #[must_use]
    pub fn has_external_id(&self) -> bool {
        self.google_id.is_some() || self.amazon_asin.is_some()
    }

    /// Renders the book in the provider record shape used by search responses.
    #[must_use]
    pub fn to_record(&self, provider: &str) -> ExternalRecord {
        ExternalRecord {
            provider: provider.to_string(),
            google_id: self.google_id.clone(),
            amazon_asin: self.amazon_asin.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            authors: self.authors.clone(),
            isbn: self.isbn.clone(),
            isbn_13: self.isbn.clone().filter(|isbn| isbn.len() == 13),
            isbn_10: self.isbn.clone().filter(|isbn| isbn.len() == 10),
            thumbnail: self.thumbnail.clone(),
            description: self.description.clone(),
            publisher: self.publisher.clone(),
            published_date: self.published_date.clone(),
            page_count: self.page_count,
            language: self.language.clone(),
            categories: self.categories(),
            maturity_rating: self.maturity_rating.clone(),
            ..ExternalRecord::default()
        }
    }
}

/// Fields for creating a canonical book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBook {
    pub isbn: Option<String>,
    pub google_id: Option<String>,
    pub amazon_asin: Option<String>,
    pub title: String,
    pub authors: Option<String>,
    pub subtitle: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i64>,
    pub language: Option<String>,
    pub categories: Vec<String>,
    pub maturity_rating: Option<String>,
}

impl NewBook {
    /// Seeds a basic catalog row from a provider record.
    ///
    /// Only identity fields plus title/authors/thumbnail are copied; the rest
    /// arrives through enrichment so that the merge reports what it added.
    #[must_use]
    pub fn from_record(record: &ExternalRecord) -> Self {
        Self {
            isbn: record.best_isbn(),
            google_id: record.google_id.clone(),
            amazon_asin: record.amazon_asin.clone(),
            title: record.title.clone(),
            authors: record.authors.clone(),
            thumbnail: record.thumbnail.clone(),
            ..Self::default()
        }
    }

    /// Normalizes identifiers in place: preferred ISBN form, empty strings dropped.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.isbn = self
            .isbn
            .as_deref()
            .and_then(crate::isbn::preferred_isbn);
        self.google_id = non_empty(self.google_id);
        self.amazon_asin = non_empty(self.amazon_asin).map(|asin| asin.to_ascii_uppercase());
        self
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn encode_categories(categories: &[String]) -> Option<String> {
    if categories.is_empty() {
        return None;
    }
    serde_json::to_string(categories).ok()
}

fn serialize_categories<S>(raw: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(decode_categories(raw.as_deref()))
}

pub(crate) fn decode_categories(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default()
}
