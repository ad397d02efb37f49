//! Identity resolution: mapping identifier sets onto one canonical row.
//!
//! Lookup order is fixed: explicit catalog id, then ISBN (any form), then
//! external provider id (Google id, then ASIN). The same inputs always yield
//! the same row. Title/author matching exists only for bulk imports and is
//! reported with [`MatchConfidence::Low`].

use serde::Serialize;
use tracing::{debug, instrument};

use super::{CanonicalBook, Catalog, Result};

/// Minimum normalized similarity for a fuzzy title match to be accepted.
const FUZZY_TITLE_THRESHOLD: f64 = 0.6;

/// Candidate rows fetched for fuzzy scoring.
const FUZZY_CANDIDATE_LIMIT: i64 = 25;

/// How a bulk-import match was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    /// Matched on a unique identifier.
    Exact,
    /// Matched on title/author similarity only.
    Low,
}

/// A bulk-import identity match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportMatch {
    pub book: CanonicalBook,
    pub confidence: MatchConfidence,
}

impl Catalog {
    /// Resolves an identifier set to an existing canonical row.
    ///
    /// # Errors
    ///
    /// Returns [`super::CatalogError::Database`] if a lookup fails.
    #[instrument(skip(self))]
    pub async fn find_existing(
        &self,
        book_id: Option<i64>,
        isbn: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<Option<CanonicalBook>> {
        if let Some(id) = book_id
            && let Some(book) = self.get(id).await?
        {
            debug!(book_id = id, "resolved by catalog id");
            return Ok(Some(book));
        }

        if let Some(isbn) = isbn.map(str::trim).filter(|v| !v.is_empty())
            && let Some(book) = self.find_by_isbn(isbn).await?
        {
            debug!(book_id = book.id, "resolved by isbn");
            return Ok(Some(book));
        }

        if let Some(external_id) = external_id.map(str::trim).filter(|v| !v.is_empty())
            && let Some(book) = self.find_by_external_id(external_id).await?
        {
            debug!(book_id = book.id, "resolved by external id");
            return Ok(Some(book));
        }

        Ok(None)
    }

    /// Bulk-import resolution: identifiers first, then title/author similarity.
    ///
    /// Not used by interactive add or search paths.
    ///
    /// # Errors
    ///
    /// Returns [`super::CatalogError::Database`] if a lookup fails.
    #[instrument(skip(self))]
    pub async fn find_existing_for_import(
        &self,
        isbn: Option<&str>,
        external_id: Option<&str>,
        title: &str,
        author: Option<&str>,
    ) -> Result<Option<ImportMatch>> {
        if let Some(book) = self.find_existing(None, isbn, external_id).await? {
            return Ok(Some(ImportMatch {
                book,
                confidence: MatchConfidence::Exact,
            }));
        }

        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .search_local(title, author, FUZZY_CANDIDATE_LIMIT)
            .await?;
        let wanted = title.to_lowercase();
        let best = candidates
            .into_iter()
            .map(|book| {
                let score = strsim::normalized_levenshtein(&wanted, &book.title.to_lowercase());
                (score, book)
            })
            .filter(|(score, _)| *score >= FUZZY_TITLE_THRESHOLD)
            .max_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // lower id wins ties so repeated imports pick the same row
                    .then_with(|| b.1.id.cmp(&a.1.id))
            });

        Ok(best.map(|(score, book)| {
            debug!(book_id = book.id, score, "fuzzy import match");
            ImportMatch {
                book,
                confidence: MatchConfidence::Low,
            }
        }))
    }
}
