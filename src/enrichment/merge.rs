//! Non-destructive merge of provider records into canonical books.
//!
//! A fetched value lands only where the canonical field is empty. Populated
//! fields are never overwritten, so running the same merge twice is a no-op.

use crate::catalog::{CanonicalBook, decode_categories, encode_categories};
use crate::provider::ExternalRecord;

/// Fills empty fields of `book` from `record`.
///
/// Returns the names of the fields that changed, in a fixed order.
pub fn merge_record(book: &mut CanonicalBook, record: &ExternalRecord) -> Vec<&'static str> {
    let mut added = Vec::new();

    let mut text = |name: &'static str, dest: &mut Option<String>, src: Option<&String>| {
        if is_blank(dest.as_deref())
            && let Some(value) = src.map(|v| v.trim()).filter(|v| !v.is_empty())
        {
            *dest = Some(value.to_string());
            added.push(name);
        }
    };

    text("authors", &mut book.authors, record.authors.as_ref());
    text("subtitle", &mut book.subtitle, record.subtitle.as_ref());
    text("description", &mut book.description, record.description.as_ref());
    text("publisher", &mut book.publisher, record.publisher.as_ref());
    text("published_date", &mut book.published_date, record.published_date.as_ref());
    text("language", &mut book.language, record.language.as_ref());
    text("maturity_rating", &mut book.maturity_rating, record.maturity_rating.as_ref());
    text("thumbnail", &mut book.thumbnail, record.thumbnail.as_ref());
    text("google_id", &mut book.google_id, record.google_id.as_ref());

    if book.page_count.is_none_or(|pages| pages <= 0)
        && let Some(pages) = record.page_count.filter(|pages| *pages > 0)
    {
        book.page_count = Some(pages);
        added.push("page_count");
    }

    if decode_categories(book.categories.as_deref()).is_empty() {
        let categories: Vec<String> = record
            .categories
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if let Some(encoded) = encode_categories(&categories) {
            book.categories = Some(encoded);
            added.push("categories");
        }
    }

    if is_blank(book.isbn.as_deref())
        && let Some(isbn) = record.best_isbn()
    {
        book.isbn = Some(isbn);
        added.push("isbn");
    }

    if is_blank(book.amazon_asin.as_deref())
        && let Some(asin) = record
            .amazon_asin
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    {
        book.amazon_asin = Some(asin.to_ascii_uppercase());
        added.push("amazon_asin");
    }

    added
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::enrichment::test_book;

    fn record() -> ExternalRecord {
        ExternalRecord {
            provider: "Google Books".to_string(),
            google_id: Some("vol-1".to_string()),
            title: "Ignored Title".to_string(),
            authors: Some("Machado de Assis".to_string()),
            description: Some("A novel.".to_string()),
            publisher: Some("Penguin".to_string()),
            page_count: Some(320),
            language: Some("pt".to_string()),
            categories: vec!["Fiction".to_string()],
            isbn_13: Some("9788535902771".to_string()),
            ..ExternalRecord::default()
        }
    }

    #[test]
    fn test_merge_fills_only_empty_fields() {
        let mut book = test_book();
        book.publisher = Some("Companhia das Letras".to_string());

        let added = merge_record(&mut book, &record());

        assert_eq!(book.publisher.as_deref(), Some("Companhia das Letras"));
        assert_eq!(book.page_count, Some(320));
        assert_eq!(book.title, "Dom Casmurro");
        assert_eq!(book.categories(), vec!["Fiction".to_string()]);
        assert_eq!(book.isbn.as_deref(), Some("9788535902771"));
        assert!(added.contains(&"page_count"));
        assert!(added.contains(&"description"));
        assert!(!added.contains(&"publisher"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut book = test_book();
        merge_record(&mut book, &record());
        let snapshot = book.clone();

        let added = merge_record(&mut book, &record());
        assert!(added.is_empty());
        assert_eq!(book, snapshot);
    }

    #[test]
    fn test_empty_source_never_clears_destination() {
        let mut book = test_book();
        book.description = Some("Curated".to_string());
        let empty = ExternalRecord {
            description: Some("   ".to_string()),
            ..ExternalRecord::default()
        };
        let added = merge_record(&mut book, &empty);
        assert!(added.is_empty());
        assert_eq!(book.description.as_deref(), Some("Curated"));
    }
}
