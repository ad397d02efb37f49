//! Link-only Amazon provider.
//!
//! Produces no searchable results. Every operation fails so the fallback chain
//! moves on, but the failure message carries a marketplace URL the caller can
//! offer instead.

use async_trait::async_trait;

use crate::isbn;
use crate::links::{AffiliateTags, MarketplaceLinkGenerator, Region};

use super::{BookProvider, ProviderError, ProviderResult, SearchOptions};

const PROVIDER_NAME: &str = "Amazon Links";

/// Marketplace search-link provider.
#[derive(Debug, Clone)]
pub struct AmazonLinksProvider {
    generator: MarketplaceLinkGenerator,
    default_region: Region,
}

impl AmazonLinksProvider {
    #[must_use]
    pub fn new(tags: AffiliateTags, default_region: Region) -> Self {
        Self {
            generator: MarketplaceLinkGenerator::new(tags),
            default_region,
        }
    }

    /// Marketplace search URL for `query`; ISBN-shaped input is searched by digits.
    #[must_use]
    pub fn search_url(&self, query: &str, region: Region) -> Option<String> {
        let keyword = isbn::normalize_isbn(query).unwrap_or_else(|| query.trim().to_string());
        self.generator.search_url(&keyword, region)
    }

    fn disabled() -> ProviderResult {
        ProviderResult::from_error(
            PROVIDER_NAME,
            ProviderError::disabled(PROVIDER_NAME, "no affiliate tags configured"),
        )
    }
}

#[async_trait]
impl BookProvider for AmazonLinksProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn priority(&self) -> u8 {
        5
    }

    fn is_enabled(&self) -> bool {
        self.generator.is_enabled()
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> ProviderResult {
        if !self.is_enabled() {
            return Self::disabled();
        }
        let region = options.region_or(self.default_region);
        match self.search_url(query, region) {
            Some(url) => ProviderResult::failure(
                PROVIDER_NAME,
                format!("No catalog results; search on Amazon {region}: {url}"),
            ),
            None => ProviderResult::failure(
                PROVIDER_NAME,
                format!("No affiliate tag for region {region}"),
            ),
        }
    }

    async fn get_items(&self, ids: &[String]) -> ProviderResult {
        if !self.is_enabled() {
            return Self::disabled();
        }
        let links: Vec<String> = super::truncate_ids(ids)
            .iter()
            .filter_map(|asin| self.generator.product_url(asin, self.default_region))
            .collect();
        ProviderResult::failure(
            PROVIDER_NAME,
            format!("Link-only provider; product pages: {}", links.join(" ")),
        )
    }

    async fn get_variations(&self, id: &str) -> ProviderResult {
        if !self.is_enabled() {
            return Self::disabled();
        }
        ProviderResult::failure(
            PROVIDER_NAME,
            format!("Link-only provider has no variations for {}", id.trim()),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tagged() -> AmazonLinksProvider {
        let mut tags = AffiliateTags::default();
        tags.set(Region::Br, "livros-20");
        AmazonLinksProvider::new(tags, Region::Br)
    }

    #[test]
    fn test_disabled_without_tags() {
        let provider = AmazonLinksProvider::new(AffiliateTags::default(), Region::Br);
        assert!(!provider.is_enabled());
        assert_eq!(provider.search_url("dune", Region::Br), None);
    }

    #[test]
    fn test_search_url_uses_isbn_digits() {
        let url = tagged().search_url("978-85-7657-049-3", Region::Br).unwrap();
        assert_eq!(
            url,
            "https://www.amazon.com.br/s?k=9788576570493&tag=livros-20"
        );
    }

    #[tokio::test]
    async fn test_search_fails_with_url_in_message() {
        let result = tagged().search("Dom Casmurro", &SearchOptions::default()).await;
        assert!(!result.success);
        assert!(result.books.is_empty());
        assert!(
            result
                .message
                .contains("https://www.amazon.com.br/s?k=Dom+Casmurro&tag=livros-20"),
            "{}",
            result.message
        );
    }

    #[tokio::test]
    async fn test_search_in_untagged_region_reports_missing_tag() {
        let options = SearchOptions {
            region: Some(Region::Us),
            ..SearchOptions::default()
        };
        let result = tagged().search("Dune", &options).await;
        assert!(!result.success);
        assert!(result.message.contains("US"));
    }
}
