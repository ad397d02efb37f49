//! Bookmeta Core Library
//!
//! This library resolves a free-text query, an ISBN or a provider-specific id
//! into canonical book records. Results come from a local catalog first and
//! then from an ordered chain of external providers; catalog rows are
//! deduplicated on their identifiers and enriched field-by-field without ever
//! overwriting curated data.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`catalog`] - Canonical book store, identity resolution and user libraries
//! - [`provider`] - Provider contract and the Google Books, Open Library and
//!   Amazon implementations
//! - [`search`] - Cache-aware search orchestration and editions lookup
//! - [`enrichment`] - Enrichment gate, merge engine and library-add flow
//! - [`links`] - Marketplace regions and affiliate purchase links
//! - [`cache`] - TTL cache store and provider rate-limit flags
//! - [`isbn`] - ISBN shape detection, normalization and conversion
//! - [`config`] - TOML configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod isbn;
pub mod links;
pub mod provider;
pub mod search;
pub(crate) mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use cache::{CacheStore, MemoryCache};
pub use catalog::{
    AsinStatus, BookQuality, CanonicalBook, Catalog, CatalogError, CatalogStore, LibraryEntry,
    MatchConfidence, NewBook, ReadingStatus,
};
pub use config::{AppConfig, ConfigError, LoadedConfig};
pub use db::{Database, DatabaseOptions, DbError};
pub use enrichment::{
    AddToLibraryRequest, EnrichmentError, EnrichmentOutcome, EnrichmentService,
    LibraryAddOutcome, SaveOutcome, should_enrich,
};
pub use links::{MarketplaceLinkGenerator, PurchaseLink, Region};
pub use provider::{
    BookProvider, ExternalRecord, ProviderChain, ProviderError, ProviderResult, SearchOptions,
    build_default_providers,
};
pub use search::{Include, SearchOrchestrator, SearchParams, SearchResponse, SearchSource};
