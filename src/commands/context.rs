//! Wiring shared by commands: config, catalog, providers and services.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bookmeta_core::links::AffiliateTags;
use bookmeta_core::{
    AppConfig, CacheStore, Catalog, CatalogStore, Database, DatabaseOptions, EnrichmentService,
    LoadedConfig, MarketplaceLinkGenerator, MemoryCache, ProviderChain, SearchOrchestrator,
    build_default_providers,
};
use tracing::{debug, info};

use crate::cli::Args;

/// Everything a command needs to talk to the catalog and providers.
pub struct AppContext {
    pub config: AppConfig,
    pub catalog: Catalog,
    pub orchestrator: SearchOrchestrator,
    pub enrichment: EnrichmentService,
}

impl AppContext {
    /// Loads config, opens the catalog database and builds the provider chain.
    pub async fn open(args: &Args) -> Result<Self> {
        let loaded = load_config(args)?;
        let db_path = resolve_db_path(args, &loaded);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let options = DatabaseOptions {
            max_connections: loaded.config.database.max_connections,
            busy_timeout_ms: loaded.config.database.busy_timeout_ms,
        };
        let db = Database::with_options(&db_path, options)
            .await
            .with_context(|| format!("failed to open catalog database {}", db_path.display()))?;
        info!(path = %db_path.display(), "Catalog database opened");

        let config = loaded.config;
        let catalog = Catalog::new(db);
        let store: Arc<dyn CatalogStore> = Arc::new(catalog.clone());
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let providers = build_default_providers(&config, Arc::clone(&cache));
        debug!(providers = ?providers, "Provider chain built");

        let orchestrator = SearchOrchestrator::new(Arc::clone(&store), providers.clone(), cache)
            .with_cache_ttl(Duration::from_secs(config.cache.search_ttl_secs))
            .with_links(
                link_generator(&config.amazon.affiliate_tags),
                config.amazon.default_region,
            );
        let enrichment = EnrichmentService::new(store, providers);

        Ok(Self {
            config,
            catalog,
            orchestrator,
            enrichment,
        })
    }

    /// Marketplace link generator for the configured affiliate tags.
    pub fn links(&self) -> MarketplaceLinkGenerator {
        link_generator(&self.config.amazon.affiliate_tags)
    }

    pub fn providers(&self) -> &ProviderChain {
        self.orchestrator.providers()
    }
}

pub(crate) fn load_config(args: &Args) -> Result<LoadedConfig> {
    AppConfig::load(args.config.as_deref()).context("failed to load configuration")
}

pub(crate) fn resolve_db_path(args: &Args, loaded: &LoadedConfig) -> PathBuf {
    args.db
        .clone()
        .unwrap_or_else(|| loaded.config.database_path(loaded.path.as_deref()))
}

fn link_generator(tags: &AffiliateTags) -> MarketplaceLinkGenerator {
    MarketplaceLinkGenerator::new(tags.clone())
}
