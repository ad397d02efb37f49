//! Amazon marketplace regions and purchase-link generation.
//!
//! Regions map to a fixed marketplace domain. Locale strings are mapped to a
//! region through an explicit table; anything not in the table resolves to a
//! caller-supplied default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::catalog::CanonicalBook;
use crate::provider::ExternalRecord;

/// An Amazon marketplace locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    #[default]
    Br,
    Us,
    Uk,
    Ca,
}

impl Region {
    /// Every supported region, in display order.
    pub const ALL: [Region; 4] = [Region::Br, Region::Us, Region::Uk, Region::Ca];

    /// Two-letter region code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Br => "BR",
            Self::Us => "US",
            Self::Uk => "UK",
            Self::Ca => "CA",
        }
    }

    /// Marketplace domain for this region.
    #[must_use]
    pub fn domain(self) -> &'static str {
        match self {
            Self::Br => "amazon.com.br",
            Self::Us => "amazon.com",
            Self::Uk => "amazon.co.uk",
            Self::Ca => "amazon.ca",
        }
    }

    /// Marketplace host used in URLs and API headers.
    #[must_use]
    pub fn marketplace_host(self) -> String {
        format!("www.{}", self.domain())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BR" => Ok(Self::Br),
            "US" => Ok(Self::Us),
            "UK" | "GB" => Ok(Self::Uk),
            "CA" => Ok(Self::Ca),
            other => Err(format!("unknown region '{other}' (expected BR, US, UK or CA)")),
        }
    }
}

const LOCALE_REGIONS: &[(&str, Region)] = &[
    ("pt", Region::Br),
    ("pt-br", Region::Br),
    ("en-gb", Region::Uk),
    ("en-ca", Region::Ca),
    ("fr-ca", Region::Ca),
    ("en", Region::Us),
    ("en-us", Region::Us),
];

/// Maps a locale such as `pt-BR` or `en_GB` to a marketplace region.
///
/// The full tag is looked up first, then its language subtag. Unknown locales
/// resolve to `default`.
///
/// ```
/// use bookmeta_core::links::{Region, region_for_locale};
///
/// assert_eq!(region_for_locale("pt-BR", Region::Us), Region::Br);
/// assert_eq!(region_for_locale("en_GB", Region::Br), Region::Uk);
/// assert_eq!(region_for_locale("de-DE", Region::Us), Region::Us);
/// ```
#[must_use]
pub fn region_for_locale(locale: &str, default: Region) -> Region {
    let normalized = locale.trim().to_ascii_lowercase().replace('_', "-");
    if normalized.is_empty() {
        return default;
    }
    let lookup = |tag: &str| {
        LOCALE_REGIONS
            .iter()
            .find(|(key, _)| *key == tag)
            .map(|(_, region)| *region)
    };
    lookup(&normalized)
        .or_else(|| normalized.split('-').next().and_then(lookup))
        .unwrap_or(default)
}

/// Affiliate tags per marketplace region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffiliateTags {
    pub br: Option<String>,
    pub us: Option<String>,
    pub uk: Option<String>,
    pub ca: Option<String>,
}

impl AffiliateTags {
    /// Returns the non-empty tag configured for `region`.
    #[must_use]
    pub fn get(&self, region: Region) -> Option<&str> {
        let tag = match region {
            Region::Br => self.br.as_deref(),
            Region::Us => self.us.as_deref(),
            Region::Uk => self.uk.as_deref(),
            Region::Ca => self.ca.as_deref(),
        };
        tag.map(str::trim).filter(|tag| !tag.is_empty())
    }

    /// Sets the tag for `region`.
    pub fn set(&mut self, region: Region, tag: impl Into<String>) {
        let slot = match region {
            Region::Br => &mut self.br,
            Region::Us => &mut self.us,
            Region::Uk => &mut self.uk,
            Region::Ca => &mut self.ca,
        };
        *slot = Some(tag.into());
    }

    /// True when at least one region has a tag.
    #[must_use]
    pub fn any(&self) -> bool {
        Region::ALL.iter().any(|region| self.get(*region).is_some())
    }
}

/// Whether a link points at a product page or a marketplace search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Product,
    Search,
}

/// A marketplace purchase link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseLink {
    pub region: Region,
    pub kind: LinkKind,
    pub url: String,
}

/// Builds affiliate purchase links for canonical books.
#[derive(Debug, Clone, Default)]
pub struct MarketplaceLinkGenerator {
    tags: AffiliateTags,
}

impl MarketplaceLinkGenerator {
    #[must_use]
    pub fn new(tags: AffiliateTags) -> Self {
        Self { tags }
    }

    /// True when any region has affiliate credentials.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.tags.any()
    }

    /// Product-page URL for an ASIN, or `None` without a tag for `region`.
    #[must_use]
    pub fn product_url(&self, asin: &str, region: Region) -> Option<String> {
        let tag = self.tags.get(region)?;
        let asin = asin.trim();
        if asin.is_empty() {
            return None;
        }
        let mut url = Url::parse(&format!(
            "https://{}/dp/{}",
            region.marketplace_host(),
            urlencoding::encode(&asin.to_ascii_uppercase())
        ))
        .ok()?;
        url.query_pairs_mut().append_pair("tag", tag);
        Some(url.into())
    }

    /// Marketplace search URL for free text, or `None` without a tag for `region`.
    #[must_use]
    pub fn search_url(&self, query: &str, region: Region) -> Option<String> {
        let tag = self.tags.get(region)?;
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let mut url = Url::parse(&format!("https://{}/s", region.marketplace_host())).ok()?;
        url.query_pairs_mut()
            .append_pair("k", query)
            .append_pair("tag", tag);
        Some(url.into())
    }

    /// Purchase links for `book` in each requested region.
    ///
    /// A known ASIN yields a product link; otherwise the ISBN (or title and
    /// authors) is used for a marketplace search. Regions without a tag are
    /// skipped, so missing credentials produce an empty list.
    #[must_use]
    pub fn links_for_book(&self, book: &CanonicalBook, regions: &[Region]) -> Vec<PurchaseLink> {
        self.links_for_record(&book.to_record("catalog"), regions)
    }

    /// Same as [`Self::links_for_book`] for a provider record.
    #[must_use]
    pub fn links_for_record(&self, record: &ExternalRecord, regions: &[Region]) -> Vec<PurchaseLink> {
        if !self.is_enabled() {
            debug!("no affiliate tags configured; link generation disabled");
            return Vec::new();
        }

        let search_term = record.best_isbn().unwrap_or_else(|| match &record.authors {
            Some(authors) => format!("{} {authors}", record.title),
            None => record.title.clone(),
        });

        regions
            .iter()
            .filter_map(|&region| {
                if let Some(asin) = record.amazon_asin.as_deref()
                    && let Some(url) = self.product_url(asin, region)
                {
                    return Some(PurchaseLink {
                        region,
                        kind: LinkKind::Product,
                        url,
                    });
                }
                self.search_url(&search_term, region).map(|url| PurchaseLink {
                    region,
                    kind: LinkKind::Search,
                    url,
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn generator() -> MarketplaceLinkGenerator {
        let mut tags = AffiliateTags::default();
        tags.set(Region::Br, "bookmeta-20");
        tags.set(Region::Us, "bookmetaus-20");
        MarketplaceLinkGenerator::new(tags)
    }

    fn book(asin: Option<&str>, isbn: Option<&str>) -> CanonicalBook {
        CanonicalBook {
            id: 1,
            isbn: isbn.map(str::to_string),
            google_id: None,
            amazon_asin: asin.map(str::to_string),
            title: "Dom Casmurro".to_string(),
            authors: Some("Machado de Assis".to_string()),
            subtitle: None,
            thumbnail: None,
            description: None,
            publisher: None,
            published_date: None,
            page_count: None,
            language: None,
            categories: None,
            maturity_rating: None,
            quality_str: "basic".to_string(),
            enriched_at: None,
            asin_status_str: "pending".to_string(),
            asin_processed_at: None,
            created_at: "2026-01-01 00:00:00".to_string(),
            updated_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_region_domains() {
        assert_eq!(Region::Br.domain(), "amazon.com.br");
        assert_eq!(Region::Us.domain(), "amazon.com");
        assert_eq!(Region::Uk.domain(), "amazon.co.uk");
        assert_eq!(Region::Ca.domain(), "amazon.ca");
    }

    #[test]
    fn test_region_parse() {
        assert_eq!("br".parse::<Region>().unwrap(), Region::Br);
        assert_eq!("GB".parse::<Region>().unwrap(), Region::Uk);
        assert!("DE".parse::<Region>().is_err());
    }

    #[test]
    fn test_region_for_locale_table() {
        assert_eq!(region_for_locale("pt", Region::Us), Region::Br);
        assert_eq!(region_for_locale("pt-BR", Region::Us), Region::Br);
        assert_eq!(region_for_locale("en-GB", Region::Br), Region::Uk);
        assert_eq!(region_for_locale("en-CA", Region::Br), Region::Ca);
        assert_eq!(region_for_locale("fr_CA", Region::Br), Region::Ca);
        assert_eq!(region_for_locale("en-US", Region::Br), Region::Us);
    }

    #[test]
    fn test_region_for_locale_language_fallback_and_default() {
        assert_eq!(region_for_locale("en-AU", Region::Br), Region::Us);
        assert_eq!(region_for_locale("de-DE", Region::Ca), Region::Ca);
        assert_eq!(region_for_locale("", Region::Uk), Region::Uk);
        // no substring guessing
        assert_eq!(region_for_locale("xpt", Region::Us), Region::Us);
    }

    #[test]
    fn test_product_link_with_tag() {
        let links = generator().links_for_book(&book(Some("b00test123"), None), &[Region::Br]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, LinkKind::Product);
        assert_eq!(
            links[0].url,
            "https://www.amazon.com.br/dp/B00TEST123?tag=bookmeta-20"
        );
    }

    #[test]
    fn test_search_link_uses_isbn_and_skips_untagged_regions() {
        let links = generator().links_for_book(
            &book(None, Some("9788535902771")),
            &[Region::Us, Region::Uk],
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].region, Region::Us);
        assert_eq!(links[0].kind, LinkKind::Search);
        assert_eq!(
            links[0].url,
            "https://www.amazon.com/s?k=9788535902771&tag=bookmetaus-20"
        );
    }

    #[test]
    fn test_search_link_falls_back_to_title_and_authors() {
        let url = generator()
            .links_for_book(&book(None, None), &[Region::Br])
            .remove(0)
            .url;
        assert!(url.starts_with("https://www.amazon.com.br/s?k=Dom+Casmurro+Machado+de+Assis"));
    }

    #[test]
    fn test_no_tags_yields_empty_list() {
        let generator = MarketplaceLinkGenerator::default();
        assert!(!generator.is_enabled());
        assert!(
            generator
                .links_for_book(&book(Some("B00TEST123"), None), &Region::ALL)
                .is_empty()
        );
    }
}
