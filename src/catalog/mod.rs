//! Catalog module for canonical book persistence.
//!
//! This module provides `SQLite`-backed storage of canonical book records,
//! deduplicated across ISBN, Google Books id and Amazon ASIN, plus per-user
//! library membership.
//!
//! # Overview
//!
//! - [`Catalog`] - Main interface for catalog operations
//! - [`CatalogStore`] - Data-access seam used by search and enrichment
//! - [`CanonicalBook`] - Persisted catalog entity
//! - [`NewBook`] - Creation payload
//! - [`CatalogError`] - Operation error types
//!
//! Uniqueness of `isbn`, `google_id` and `amazon_asin` is enforced by the
//! schema and is the only concurrency guard: [`Catalog::create`] treats a
//! unique violation as "someone else created it first" and returns that row.
//!
//! # Example
//!
//! ```ignore
//! use bookmeta_core::catalog::{Catalog, NewBook};
//! use bookmeta_core::Database;
//!
//! let catalog = Catalog::new(Database::new_in_memory().await?);
//! let created = catalog.create(&NewBook { title: "Dom Casmurro".into(), ..NewBook::default() }).await?;
//! let again = catalog.find_existing(Some(created.book.id), None, None).await?;
//! ```

mod book;
mod error;
mod identity;
mod library;
mod store;

pub use book::{AsinStatus, BookQuality, CanonicalBook, NewBook};
pub use error::{CatalogError, DbErrorKind};
pub use identity::{ImportMatch, MatchConfidence};
pub use library::{LibraryEntry, ReadingStatus};
pub use store::CatalogStore;

pub(crate) use book::{decode_categories, encode_categories, non_empty};

use tracing::{debug, instrument, warn};

use crate::db::Database;
use crate::isbn;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Outcome of [`Catalog::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedBook {
    /// The canonical row (new or pre-existing).
    pub book: CanonicalBook,
    /// False when the create collided with an existing identifier.
    pub created: bool,
}

/// Catalog manager for canonical books.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    /// Creates a new catalog manager with the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Gets a book by catalog id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<CanonicalBook>> {
        let book = sqlx::query_as::<_, CanonicalBook>(r"SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(book)
    }

    /// Gets a book by catalog id, failing when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::BookNotFound`] if no row has this id.
    pub async fn require(&self, id: i64) -> Result<CanonicalBook> {
        self.get(id).await?.ok_or(CatalogError::BookNotFound(id))
    }

    /// Finds a book stored under any ISBN form of `isbn_input`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_by_isbn(&self, isbn_input: &str) -> Result<Option<CanonicalBook>> {
        let variants = isbn::isbn_variants(isbn_input);
        let Some(primary) = variants.first() else {
            return Ok(None);
        };
        let secondary = variants.get(1).unwrap_or(primary);

        let book = sqlx::query_as::<_, CanonicalBook>(
            r"SELECT * FROM books WHERE isbn IN (?, ?) ORDER BY id ASC LIMIT 1",
        )
        .bind(primary)
        .bind(secondary)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(book)
    }

    /// Finds a book by Google Books volume id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_by_google_id(&self, google_id: &str) -> Result<Option<CanonicalBook>> {
        let book = sqlx::query_as::<_, CanonicalBook>(r"SELECT * FROM books WHERE google_id = ?")
            .bind(google_id.trim())
            .fetch_optional(self.db.pool())
            .await?;
        Ok(book)
    }

    /// Finds a book by Amazon ASIN.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_by_asin(&self, asin: &str) -> Result<Option<CanonicalBook>> {
        let book = sqlx::query_as::<_, CanonicalBook>(r"SELECT * FROM books WHERE amazon_asin = ?")
            .bind(asin.trim().to_ascii_uppercase())
            .fetch_optional(self.db.pool())
            .await?;
        Ok(book)
    }

    /// Finds a book by any external provider id (Google id first, then ASIN).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<CanonicalBook>> {
        if let Some(book) = self.find_by_google_id(external_id).await? {
            return Ok(Some(book));
        }
        self.find_by_asin(external_id).await
    }

    /// Exact identifier match used by search to short-circuit providers.
    ///
    /// ISBN-shaped terms are looked up by ISBN first; any term is then tried as
    /// an external id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if a query fails.
    #[instrument(skip(self))]
    pub async fn find_exact_identifier(&self, term: &str) -> Result<Option<CanonicalBook>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(None);
        }
        if isbn::is_isbn_shaped(term)
            && let Some(book) = self.find_by_isbn(term).await?
        {
            return Ok(Some(book));
        }
        self.find_by_external_id(term).await
    }

    /// Case-insensitive title/author substring search over the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn search_local(
        &self,
        title: &str,
        author: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CanonicalBook>> {
        let title_pattern = like_pattern(title);
        let author_pattern = author.map(like_pattern);
        let books = sqlx::query_as::<_, CanonicalBook>(
            r"SELECT * FROM books
              WHERE title LIKE ? ESCAPE '\'
                AND (? IS NULL OR authors LIKE ? ESCAPE '\')
              ORDER BY id ASC
              LIMIT ?",
        )
        .bind(&title_pattern)
        .bind(author_pattern.as_deref())
        .bind(author_pattern.as_deref())
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(books)
    }

    /// Inserts a new canonical book with `basic` quality.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] (with `DbErrorKind::UniqueViolation`
    /// when an identifier is taken) if the insert fails.
    #[instrument(skip(self, new_book), fields(title = %new_book.title))]
    pub async fn insert(&self, new_book: &NewBook) -> Result<CanonicalBook> {
        if new_book.title.trim().is_empty() {
            return Err(CatalogError::invalid_value("title", "title must not be empty"));
        }
        let book = sqlx::query_as::<_, CanonicalBook>(
            r"INSERT INTO books (
                isbn, google_id, amazon_asin, title, authors, subtitle, thumbnail,
                description, publisher, published_date, page_count, language,
                categories, maturity_rating, quality
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING *",
        )
        .bind(&new_book.isbn)
        .bind(&new_book.google_id)
        .bind(&new_book.amazon_asin)
        .bind(new_book.title.trim())
        .bind(&new_book.authors)
        .bind(&new_book.subtitle)
        .bind(&new_book.thumbnail)
        .bind(&new_book.description)
        .bind(&new_book.publisher)
        .bind(&new_book.published_date)
        .bind(new_book.page_count)
        .bind(&new_book.language)
        .bind(encode_categories(&new_book.categories))
        .bind(&new_book.maturity_rating)
        .bind(BookQuality::Basic.as_str())
        .fetch_one(self.db.pool())
        .await?;
        Ok(book)
    }

    /// Creates a canonical book, or returns the row that already owns one of its identifiers.
    ///
    /// Identifiers are resolved before inserting; if a concurrent writer wins the
    /// race the resulting unique violation is recovered by re-reading.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for failures other than a recoverable duplicate.
    #[instrument(skip(self, new_book), fields(title = %new_book.title))]
    pub async fn create(&self, new_book: &NewBook) -> Result<CreatedBook> {
        let new_book = new_book.clone().normalized();

        if let Some(book) = self.find_by_identifiers(&new_book).await? {
            debug!(book_id = book.id, "identifier already catalogued");
            return Ok(CreatedBook {
                book,
                created: false,
            });
        }

        match self.insert(&new_book).await {
            Ok(book) => {
                debug!(book_id = book.id, "created canonical book");
                Ok(CreatedBook {
                    book,
                    created: true,
                })
            }
            Err(error) if error.is_unique_violation() => {
                warn!(error = %error, "duplicate identifier on create; resolving existing row");
                match self.find_by_identifiers(&new_book).await? {
                    Some(book) => Ok(CreatedBook {
                        book,
                        created: false,
                    }),
                    None => Err(error),
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Persists content and identifier columns of `book`.
    ///
    /// `quality` and `enriched_at` are not written here; see [`Catalog::mark_enriched`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::BookNotFound`] if the row is gone, or
    /// [`CatalogError::Database`] if the update fails.
    #[instrument(skip(self, book), fields(book_id = book.id))]
    pub async fn update(&self, book: &CanonicalBook) -> Result<CanonicalBook> {
        let updated = sqlx::query_as::<_, CanonicalBook>(
            r"UPDATE books
              SET isbn = ?, google_id = ?, amazon_asin = ?, title = ?, authors = ?,
                  subtitle = ?, thumbnail = ?, description = ?, publisher = ?,
                  published_date = ?, page_count = ?, language = ?, categories = ?,
                  maturity_rating = ?, updated_at = datetime('now')
              WHERE id = ?
              RETURNING *",
        )
        .bind(&book.isbn)
        .bind(&book.google_id)
        .bind(&book.amazon_asin)
        .bind(&book.title)
        .bind(&book.authors)
        .bind(&book.subtitle)
        .bind(&book.thumbnail)
        .bind(&book.description)
        .bind(&book.publisher)
        .bind(&book.published_date)
        .bind(book.page_count)
        .bind(&book.language)
        .bind(&book.categories)
        .bind(&book.maturity_rating)
        .bind(book.id)
        .fetch_optional(self.db.pool())
        .await?;

        updated.ok_or(CatalogError::BookNotFound(book.id))
    }

    /// Upgrades quality to `complete` and advances `enriched_at` to now.
    ///
    /// Never downgrades quality and never moves `enriched_at` backwards.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::BookNotFound`] if the row is gone.
    #[instrument(skip(self))]
    pub async fn mark_enriched(&self, id: i64) -> Result<CanonicalBook> {
        let updated = sqlx::query_as::<_, CanonicalBook>(
            r"UPDATE books
              SET quality = 'complete',
                  enriched_at = CASE
                      WHEN enriched_at IS NULL OR enriched_at < datetime('now') THEN datetime('now')
                      ELSE enriched_at
                  END,
                  updated_at = datetime('now')
              WHERE id = ?
              RETURNING *",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        updated.ok_or(CatalogError::BookNotFound(id))
    }

    /// Records a transition of the ASIN lookup lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::BookNotFound`] if the row is gone.
    #[instrument(skip(self))]
    pub async fn mark_asin_status(&self, id: i64, status: AsinStatus) -> Result<CanonicalBook> {
        let updated = sqlx::query_as::<_, CanonicalBook>(
            r"UPDATE books
              SET asin_status = ?,
                  asin_processed_at = CASE WHEN ? THEN datetime('now') ELSE asin_processed_at END,
                  updated_at = datetime('now')
              WHERE id = ?
              RETURNING *",
        )
        .bind(status.as_str())
        .bind(matches!(status, AsinStatus::Completed | AsinStatus::Failed))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        updated.ok_or(CatalogError::BookNotFound(id))
    }

    /// Counts catalog rows.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    async fn find_by_identifiers(&self, new_book: &NewBook) -> Result<Option<CanonicalBook>> {
        if let Some(isbn) = new_book.isbn.as_deref()
            && let Some(book) = self.find_by_isbn(isbn).await?
        {
            return Ok(Some(book));
        }
        if let Some(google_id) = new_book.google_id.as_deref()
            && let Some(book) = self.find_by_google_id(google_id).await?
        {
            return Ok(Some(book));
        }
        if let Some(asin) = new_book.amazon_asin.as_deref() {
            return self.find_by_asin(asin).await;
        }
        Ok(None)
    }
}

fn like_pattern(value: &str) -> String {
    let escaped = value
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
