//! Data-access seam for catalog operations.
//!
//! Search and enrichment depend on this trait rather than on [`Catalog`]
//! directly so they can be driven against any store.

use async_trait::async_trait;

use super::{
    AsinStatus, CanonicalBook, Catalog, CreatedBook, LibraryEntry, NewBook, ReadingStatus, Result,
};

/// Data-access contract for canonical book persistence.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Gets a book by catalog id.
    async fn get(&self, id: i64) -> Result<Option<CanonicalBook>>;

    /// Resolves an identifier set to an existing row (id, then ISBN, then external id).
    async fn find_existing(
        &self,
        book_id: Option<i64>,
        isbn: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<Option<CanonicalBook>>;

    /// Exact identifier match for a free-form search term.
    async fn find_exact_identifier(&self, term: &str) -> Result<Option<CanonicalBook>>;

    /// Creates a book or returns the row already owning one of its identifiers.
    async fn create(&self, new_book: &NewBook) -> Result<CreatedBook>;

    /// Persists content and identifier columns.
    async fn update(&self, book: &CanonicalBook) -> Result<CanonicalBook>;

    /// Upgrades quality and advances the enrichment timestamp.
    async fn mark_enriched(&self, id: i64) -> Result<CanonicalBook>;

    /// Records an ASIN lookup status transition.
    async fn mark_asin_status(&self, id: i64, status: AsinStatus) -> Result<CanonicalBook>;

    /// Title/author substring search.
    async fn search_local(
        &self,
        title: &str,
        author: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CanonicalBook>>;

    /// Attaches a book to a user's library (idempotent).
    async fn attach_to_library(
        &self,
        user_id: &str,
        book_id: i64,
        is_private: bool,
        status: ReadingStatus,
    ) -> Result<LibraryEntry>;
}

#[async_trait]
impl CatalogStore for Catalog {
    async fn get(&self, id: i64) -> Result<Option<CanonicalBook>> {
        Catalog::get(self, id).await
    }

    async fn find_existing(
        &self,
        book_id: Option<i64>,
        isbn: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<Option<CanonicalBook>> {
        Catalog::find_existing(self, book_id, isbn, external_id).await
    }

    async fn find_exact_identifier(&self, term: &str) -> Result<Option<CanonicalBook>> {
        Catalog::find_exact_identifier(self, term).await
    }

    async fn create(&self, new_book: &NewBook) -> Result<CreatedBook> {
        Catalog::create(self, new_book).await
    }

    async fn update(&self, book: &CanonicalBook) -> Result<CanonicalBook> {
        Catalog::update(self, book).await
    }

    async fn mark_enriched(&self, id: i64) -> Result<CanonicalBook> {
        Catalog::mark_enriched(self, id).await
    }

    async fn mark_asin_status(&self, id: i64, status: AsinStatus) -> Result<CanonicalBook> {
        Catalog::mark_asin_status(self, id, status).await
    }

    async fn search_local(
        &self,
        title: &str,
        author: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CanonicalBook>> {
        Catalog::search_local(self, title, author, limit).await
    }

    async fn attach_to_library(
        &self,
        user_id: &str,
        book_id: i64,
        is_private: bool,
        status: ReadingStatus,
    ) -> Result<LibraryEntry> {
        Catalog::attach_to_library(self, user_id, book_id, is_private, status).await
    }
}
