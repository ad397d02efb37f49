//! Query normalization and search cache keys.

use sha2::{Digest, Sha256};

use crate::isbn;

const CACHE_KEY_PREFIX: &str = "book_search:";

/// Canonical form of a search term.
///
/// ISBN-shaped terms reduce to their digits; anything else is lowercased with
/// whitespace runs collapsed to one space.
#[must_use]
pub fn normalize_query(term: &str) -> String {
    if let Some(digits) = isbn::normalize_isbn(term) {
        return digits;
    }
    term.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cache key for a search: `book_search:` + SHA-256 of query, limit and locale.
#[must_use]
pub fn cache_key(term: &str, max_results: u32, locale: Option<&str>) -> String {
    let locale = locale.map(str::trim).unwrap_or_default().to_ascii_lowercase();
    let material = format!("{}|{max_results}|{locale}", normalize_query(term));
    let digest = Sha256::digest(material.as_bytes());
    format!("{CACHE_KEY_PREFIX}{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Dom   CASMURRO "), "dom casmurro");
        assert_eq!(normalize_query("978-85-359-0277-1"), "9788535902771");
    }

    #[test]
    fn test_cache_key_is_stable_across_formatting() {
        let a = cache_key("Dom Casmurro", 20, Some("pt-BR"));
        let b = cache_key(" dom  casmurro", 20, Some("PT-br"));
        assert_eq!(a, b);
        assert!(a.starts_with("book_search:"));
        assert_eq!(a.len(), "book_search:".len() + 64);
    }

    #[test]
    fn test_cache_key_varies_with_limit_and_locale() {
        let base = cache_key("dune", 20, None);
        assert_ne!(base, cache_key("dune", 10, None));
        assert_ne!(base, cache_key("dune", 20, Some("en")));
    }
}
