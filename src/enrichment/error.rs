//! Enrichment error types.

use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors returned by [`super::EnrichmentService`].
///
/// A provider that has nothing for an id is an expected outcome and is
/// reported through [`super::EnrichmentOutcome`], not here. `ProviderFailed`
/// only appears on creation paths, where there is no row to report against.
#[derive(Debug, Clone, Error)]
pub enum EnrichmentError {
    /// Catalog read or write failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The referenced catalog book does not exist.
    #[error(
        "book not found: id {0}\n  Suggestion: List the catalog or re-add the book by ISBN or Google Books id"
    )]
    BookNotFound(i64),

    /// Nothing identifies the book to a provider.
    #[error("no identifier to {action}\n  Suggestion: Supply an ISBN, a Google Books id or an ASIN")]
    MissingIdentifier {
        /// What was being attempted.
        action: String,
    },

    /// No provider could supply a record for a new catalog entry.
    #[error(
        "could not fetch '{identifier}' from {provider}: {message}\n  Suggestion: Check the identifier, or try again later if the provider is unavailable"
    )]
    ProviderFailed {
        provider: String,
        identifier: String,
        message: String,
    },
}

impl EnrichmentError {
    /// Creates a `MissingIdentifier` error.
    #[must_use]
    pub fn missing_identifier(action: &str) -> Self {
        Self::MissingIdentifier {
            action: action.to_string(),
        }
    }

    /// Creates a `ProviderFailed` error.
    #[must_use]
    pub fn provider_failed(provider: &str, identifier: &str, message: impl Into<String>) -> Self {
        Self::ProviderFailed {
            provider: provider.to_string(),
            identifier: identifier.to_string(),
            message: message.into(),
        }
    }
}
