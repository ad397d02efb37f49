//! Shared normalization helpers for provider modules.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::{debug, instrument, warn};

use super::{ExternalRecord, ProviderError};

/// Maximum Retry-After value honoured (1 hour).
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Rewrites `http://` image URLs to `https://`.
#[must_use]
pub fn https_url(url: &str) -> String {
    let url = url.trim();
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// Joins author names with `", "`, skipping blanks. No authors yields `None`.
#[must_use]
pub fn join_authors<S: AsRef<str>>(authors: &[S]) -> Option<String> {
    let joined = authors
        .iter()
        .map(|author| author.as_ref().trim())
        .filter(|author| !author.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() { None } else { Some(joined) }
}

/// Trims a provider text field, mapping blank values to `None`.
#[must_use]
pub fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Drops records without a title; they are malformed, not fatal.
#[must_use]
pub fn retain_well_formed(provider: &str, records: Vec<ExternalRecord>) -> Vec<ExternalRecord> {
    let before = records.len();
    let kept: Vec<ExternalRecord> = records
        .into_iter()
        .filter(|record| !record.title.trim().is_empty())
        .collect();
    if kept.len() < before {
        warn!(
            provider,
            dropped = before - kept.len(),
            "dropping provider records without a title"
        );
    }
    kept
}

/// Maps a non-success response status to a provider error.
///
/// HTTP 429 becomes [`ProviderError::RateLimited`] carrying the `Retry-After`
/// delay (zero when absent or unparseable).
#[must_use]
pub fn error_for_status(provider: &str, status: StatusCode, headers: &HeaderMap) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after)
            .map_or(0, |delay| delay.as_secs());
        return ProviderError::rate_limited(provider, retry_after_secs);
    }
    ProviderError::http(provider, status.as_u16())
}

/// Parses a `Retry-After` header value into a delay.
///
/// Supports integer seconds and HTTP-date (RFC 7231). Values above one hour
/// are capped; dates in the past yield zero.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bookmeta_core::provider::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(duration.min(MAX_RETRY_AFTER));
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let delay = datetime
            .duration_since(std::time::SystemTime::now())
            .unwrap_or(Duration::ZERO);
        Some(delay.min(MAX_RETRY_AFTER))
    } else {
        debug!(header_value, "unparseable Retry-After value");
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_https_url_rewrites_http_only() {
        assert_eq!(
            https_url("http://books.google.com/cover.jpg"),
            "https://books.google.com/cover.jpg"
        );
        assert_eq!(
            https_url("https://covers.openlibrary.org/b/id/1-M.jpg"),
            "https://covers.openlibrary.org/b/id/1-M.jpg"
        );
    }

    #[test]
    fn test_join_authors() {
        assert_eq!(
            join_authors(&["Machado de Assis", " ", "Outro Autor"]).as_deref(),
            Some("Machado de Assis, Outro Autor")
        );
        assert_eq!(join_authors::<&str>(&[]), None);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(Some("  pt ".to_string())).as_deref(), Some("pt"));
        assert_eq!(clean_text(Some("   ".to_string())), None);
        assert_eq!(clean_text(None), None);
    }

    #[test]
    fn test_retain_well_formed_drops_untitled() {
        let records = vec![
            ExternalRecord {
                title: "Kept".to_string(),
                ..ExternalRecord::default()
            },
            ExternalRecord::default(),
        ];
        let kept = retain_well_formed("Google Books", records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Kept");
    }

    #[test]
    fn test_parse_retry_after_variants() {
        assert_eq!(parse_retry_after("  120 "), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after("7200"), Some(Duration::from_secs(3600)));
        assert_eq!(
            parse_retry_after("Wed, 01 Jan 2020 00:00:00 GMT"),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_error_for_status_maps_429_with_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        let err = error_for_status("Amazon Creators", StatusCode::TOO_MANY_REQUESTS, &headers);
        assert_eq!(err, ProviderError::rate_limited("Amazon Creators", 30));

        let err = error_for_status("Google Books", StatusCode::BAD_GATEWAY, &HeaderMap::new());
        assert!(matches!(err, ProviderError::Http { status: 502, .. }));
    }

    #[test]
    fn test_parse_retry_after_future_http_date() {
        let future = std::time::SystemTime::now() + Duration::from_secs(60);
        let delay = parse_retry_after(&httpdate::fmt_http_date(future)).unwrap();
        assert!(delay >= Duration::from_secs(55) && delay <= Duration::from_secs(61));
    }
}
