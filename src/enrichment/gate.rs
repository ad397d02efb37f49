//! Decision gate for enrichment.

use crate::catalog::{BookQuality, CanonicalBook};

/// True when `book` is worth a provider round trip.
///
/// Holds when the book was never enriched, is still `basic`, or lacks a page
/// count while an external id is known.
#[must_use]
pub fn should_enrich(book: &CanonicalBook) -> bool {
    book.enriched_at.is_none()
        || book.quality() == BookQuality::Basic
        || (book.page_count.is_none() && book.has_external_id())
}
