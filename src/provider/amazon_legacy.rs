//! Retired Product Advertising API 5 provider.
//!
//! Kept in the chain so configurations that still name it load cleanly. It
//! never makes a network call and always reports disabled.

use async_trait::async_trait;
use tracing::debug;

use crate::config::AmazonLegacyConfig;

use super::{BookProvider, ProviderError, ProviderResult, SearchOptions};

const PROVIDER_NAME: &str = "Amazon PA-API";

const DISABLED_REASON: &str = "PA-API 5 is retired; use the Amazon Creators provider";

/// Placeholder for the retired PA-API 5 integration.
#[derive(Debug, Clone, Default)]
pub struct AmazonLegacyProvider {
    config: AmazonLegacyConfig,
}

impl AmazonLegacyProvider {
    #[must_use]
    pub fn new(config: AmazonLegacyConfig) -> Self {
        if config.enabled {
            debug!("ignoring enabled flag for retired PA-API provider");
        }
        Self { config }
    }

    fn disabled(&self) -> ProviderResult {
        ProviderResult::from_error(
            PROVIDER_NAME,
            ProviderError::disabled(PROVIDER_NAME, DISABLED_REASON),
        )
    }
}

#[async_trait]
impl BookProvider for AmazonLegacyProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn priority(&self) -> u8 {
        4
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn search(&self, _query: &str, _options: &SearchOptions) -> ProviderResult {
        self.disabled()
    }

    async fn get_items(&self, _ids: &[String]) -> ProviderResult {
        self.disabled()
    }

    async fn get_variations(&self, _id: &str) -> ProviderResult {
        self.disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_legacy_provider_is_always_disabled() {
        let provider = AmazonLegacyProvider::new(AmazonLegacyConfig { enabled: true });
        assert!(!provider.is_enabled());
        assert_eq!(provider.config, AmazonLegacyConfig { enabled: true });

        let result = provider.search("dune", &SearchOptions::default()).await;
        assert!(!result.success);
        assert!(matches!(result.error, Some(ProviderError::Disabled { .. })));
        assert!(!provider.get_items(&["B00X".to_string()]).await.success);
        assert!(!provider.get_variations("B00X").await.success);
    }
}
