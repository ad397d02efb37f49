//! Shared User-Agent string for provider HTTP clients.
//!
//! Single source for the project URL and UA format so every provider sends
//! the same identification (RFC 9308).

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/bookmeta";

/// Default User-Agent for provider requests (no per-provider name in header).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bookmeta/{version} (book-metadata-tool; +{PROJECT_UA_URL})")
}
