//! Error types for provider operations.
//!
//! Providers use these internally; at the [`super::BookProvider`] boundary every
//! error is folded into a failed [`super::ProviderResult`] so callers never
//! receive a provider `Err`.

use thiserror::Error;

/// Errors raised while talking to an external bibliographic provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Missing configuration or credentials.
    #[error("{provider} is disabled: {reason}\n  Suggestion: {suggestion}")]
    Disabled {
        provider: String,
        reason: String,
        suggestion: String,
    },

    /// The request exceeded the provider's timeout.
    #[error(
        "{provider} request timed out after {timeout_secs}s\n  Suggestion: Try again later or raise the provider timeout"
    )]
    Timeout { provider: String, timeout_secs: u64 },

    /// The provider answered with a non-success HTTP status.
    #[error("{provider} returned HTTP {status}: {reason}\n  Suggestion: {suggestion}")]
    Http {
        provider: String,
        status: u16,
        reason: String,
        suggestion: String,
    },

    /// The provider could not be reached.
    #[error("cannot reach {provider}: {reason}\n  Suggestion: Check your network connection")]
    Network { provider: String, reason: String },

    /// The provider is rate limiting requests.
    #[error(
        "{provider} is rate limited (retry after {retry_after_secs}s)\n  Suggestion: Wait before searching this provider again"
    )]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected {provider} response: {reason}\n  Suggestion: The provider API may have changed")]
    Malformed { provider: String, reason: String },

    /// The request succeeded but matched nothing.
    #[error("{provider} found no results for '{query}'\n  Suggestion: {suggestion}")]
    NotFound {
        provider: String,
        query: String,
        suggestion: String,
    },
}

impl ProviderError {
    /// Creates a `Disabled` error.
    #[must_use]
    pub fn disabled(provider: &str, reason: &str) -> Self {
        Self::Disabled {
            provider: provider.to_string(),
            reason: reason.to_string(),
            suggestion: "Enable the provider and supply its credentials in config.toml".to_string(),
        }
    }

    /// Creates a `Timeout` error.
    #[must_use]
    pub fn timeout(provider: &str, timeout_secs: u64) -> Self {
        Self::Timeout {
            provider: provider.to_string(),
            timeout_secs,
        }
    }

    /// Creates an `Http` error with a reason chosen from the status code.
    #[must_use]
    pub fn http(provider: &str, status: u16) -> Self {
        let (reason, suggestion) = match status {
            400 => ("bad request", "Check the query and try again"),
            401 | 403 => ("access denied", "Check the provider credentials"),
            404 => ("resource not found", "Check the identifier"),
            s if s >= 500 => ("provider unavailable", "Try again later"),
            _ => ("unexpected status", "Try again later"),
        };
        Self::Http {
            provider: provider.to_string(),
            status,
            reason: reason.to_string(),
            suggestion: suggestion.to_string(),
        }
    }

    /// Creates a `Network` error.
    #[must_use]
    pub fn network(provider: &str, reason: impl Into<String>) -> Self {
        Self::Network {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `RateLimited` error.
    #[must_use]
    pub fn rate_limited(provider: &str, retry_after_secs: u64) -> Self {
        Self::RateLimited {
            provider: provider.to_string(),
            retry_after_secs,
        }
    }

    /// Creates a `Malformed` error.
    #[must_use]
    pub fn malformed(provider: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(provider: &str, query: &str) -> Self {
        Self::NotFound {
            provider: provider.to_string(),
            query: query.to_string(),
            suggestion: "Check spelling or search by ISBN".to_string(),
        }
    }

    /// Classifies a reqwest transport error.
    #[must_use]
    pub fn from_reqwest(provider: &str, timeout_secs: u64, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(provider, timeout_secs)
        } else if error.is_decode() {
            Self::malformed(provider, error.to_string())
        } else if let Some(status) = error.status() {
            Self::http(provider, status.as_u16())
        } else {
            Self::network(provider, error.to_string())
        }
    }

    /// Short description without the suggestion line, for result messages.
    #[must_use]
    pub fn summary(&self) -> String {
        let rendered = self.to_string();
        rendered
            .split("\n  Suggestion:")
            .next()
            .unwrap_or(&rendered)
            .to_string()
    }
}
