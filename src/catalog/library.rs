//! Per-user library membership rows.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;

use super::{Catalog, CatalogError, Result};

/// Reading progress recorded when a book is added to a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    #[default]
    WantToRead,
    Reading,
    Read,
    Abandoned,
}

impl ReadingStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WantToRead => "want_to_read",
            Self::Reading => "reading",
            Self::Read => "read",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReadingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "want_to_read" => Ok(Self::WantToRead),
            "reading" => Ok(Self::Reading),
            "read" => Ok(Self::Read),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(format!("invalid reading status: {s}")),
        }
    }
}

/// A book attached to a user's library.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct LibraryEntry {
    pub id: i64,
    pub user_id: String,
    pub book_id: i64,
    pub is_private: bool,
    #[sqlx(rename = "reading_status")]
    #[serde(rename = "reading_status")]
    pub reading_status_str: String,
    pub added_at: String,
}

impl LibraryEntry {
    /// Returns the parsed reading status, treating unknown values as `WantToRead`.
    #[must_use]
    pub fn reading_status(&self) -> ReadingStatus {
        self.reading_status_str.parse().unwrap_or_default()
    }
}

impl Catalog {
    /// Attaches a book to a user's library.
    ///
    /// Idempotent: an existing membership row is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::BookNotFound`] when `book_id` does not exist, or
    /// [`CatalogError::Database`] if the write fails.
    #[instrument(skip(self))]
    pub async fn attach_to_library(
        &self,
        user_id: &str,
        book_id: i64,
        is_private: bool,
        status: ReadingStatus,
    ) -> Result<LibraryEntry> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(CatalogError::invalid_value("user_id", "user id must not be empty"));
        }
        if self.get(book_id).await?.is_none() {
            return Err(CatalogError::BookNotFound(book_id));
        }

        sqlx::query(
            r"INSERT INTO user_books (user_id, book_id, is_private, reading_status)
              VALUES (?, ?, ?, ?)
              ON CONFLICT (user_id, book_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(book_id)
        .bind(is_private)
        .bind(status.as_str())
        .execute(self.db.pool())
        .await?;

        let entry = sqlx::query_as::<_, LibraryEntry>(
            r"SELECT * FROM user_books WHERE user_id = ? AND book_id = ?",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(entry)
    }

    /// Lists a user's library, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn library_entries(&self, user_id: &str) -> Result<Vec<LibraryEntry>> {
        let entries = sqlx::query_as::<_, LibraryEntry>(
            r"SELECT * FROM user_books WHERE user_id = ? ORDER BY added_at ASC, id ASC",
        )
        .bind(user_id.trim())
        .fetch_all(self.db.pool())
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::catalog::NewBook;

    async fn catalog_with_book() -> (Catalog, i64) {
        let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
        let book = catalog
            .insert(&NewBook {
                title: "Library Book".to_string(),
                ..NewBook::default()
            })
            .await
            .unwrap();
        (catalog, book.id)
    }

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let (catalog, book_id) = catalog_with_book().await;

        let first = catalog
            .attach_to_library("user-1", book_id, true, ReadingStatus::Reading)
            .await
            .unwrap();
        let second = catalog
            .attach_to_library("user-1", book_id, false, ReadingStatus::Read)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.is_private);
        assert_eq!(second.reading_status(), ReadingStatus::Reading);
        assert_eq!(catalog.library_entries("user-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_attach_unknown_book_fails() {
        let (catalog, _) = catalog_with_book().await;
        let err = catalog
            .attach_to_library("user-1", 777, false, ReadingStatus::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::BookNotFound(777)));
    }

    #[tokio::test]
    async fn test_attach_rejects_blank_user() {
        let (catalog, book_id) = catalog_with_book().await;
        let err = catalog
            .attach_to_library(" ", book_id, false, ReadingStatus::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidValue { .. }));
    }

    #[test]
    fn test_reading_status_parse() {
        assert_eq!(
            "want_to_read".parse::<ReadingStatus>().unwrap(),
            ReadingStatus::WantToRead
        );
        assert!("later".parse::<ReadingStatus>().is_err());
    }
}
