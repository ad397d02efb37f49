//! ISBN detection, normalization and ISBN-10/ISBN-13 conversion.
//!
//! An input is ISBN-shaped when, after dropping every character other than
//! digits and a trailing `X`, exactly 10 or 13 characters remain. Shape is
//! all that matters for query routing; checksums are only consulted when
//! converting between the two forms.

/// Reduces `input` to its ISBN characters when it is ISBN-shaped.
///
/// Returns the digit string (with an uppercase trailing `X` when the input
/// ends in one), or `None` when the remaining length is not 10 or 13. A
/// 13-character value ending in `X` is still ISBN-shaped; it simply never
/// passes [`has_valid_checksum`].
///
/// # Examples
///
/// ```
/// use bookmeta_core::isbn::normalize_isbn;
///
/// assert_eq!(normalize_isbn("978-85-359-0277-1").as_deref(), Some("9788535902771"));
/// assert_eq!(normalize_isbn("0-306-40615-x").as_deref(), Some("030640615X"));
/// assert_eq!(normalize_isbn("not a book"), None);
/// ```
#[must_use]
pub fn normalize_isbn(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let mut cleaned: String = trimmed.chars().filter(char::is_ascii_digit).collect();

    let ends_with_x = trimmed
        .chars()
        .rev()
        .find(|c| c.is_ascii_alphanumeric())
        .is_some_and(|c| c.eq_ignore_ascii_case(&'x'));
    if ends_with_x {
        cleaned.push('X');
    }

    match cleaned.len() {
        10 | 13 => Some(cleaned),
        _ => None,
    }
}

/// True when `input` normalizes to a 10- or 13-character ISBN.
#[must_use]
pub fn is_isbn_shaped(input: &str) -> bool {
    normalize_isbn(input).is_some()
}

/// Validates the check digit of a normalized ISBN-10 or ISBN-13.
#[must_use]
pub fn has_valid_checksum(isbn: &str) -> bool {
    match isbn.len() {
        10 => isbn10_check_digit(&isbn[..9]).is_some_and(|check| isbn.ends_with(check)),
        13 => isbn13_check_digit(&isbn[..12])
            .is_some_and(|check| isbn[12..].chars().next() == Some(check)),
        _ => false,
    }
}

/// Converts a normalized ISBN-10 to its `978`-prefixed ISBN-13 form.
#[must_use]
pub fn isbn10_to_isbn13(isbn10: &str) -> Option<String> {
    if isbn10.len() != 10 {
        return None;
    }
    let body = format!("978{}", &isbn10[..9]);
    let check = isbn13_check_digit(&body)?;
    Some(format!("{body}{check}"))
}

/// Converts a normalized `978`-prefixed ISBN-13 to ISBN-10.
///
/// `979` ISBNs have no ISBN-10 equivalent and yield `None`.
#[must_use]
pub fn isbn13_to_isbn10(isbn13: &str) -> Option<String> {
    if isbn13.len() != 13
        || !isbn13.starts_with("978")
        || !isbn13.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let body = &isbn13[3..12];
    let check = isbn10_check_digit(body)?;
    Some(format!("{body}{check}"))
}

/// Every stored form a book with this ISBN may have been saved under.
///
/// The normalized input comes first, followed by its counterpart form when one
/// exists. Non-ISBN input yields an empty list.
#[must_use]
pub fn isbn_variants(input: &str) -> Vec<String> {
    let Some(normalized) = normalize_isbn(input) else {
        return Vec::new();
    };
    let counterpart = match normalized.len() {
        10 => isbn10_to_isbn13(&normalized),
        _ => isbn13_to_isbn10(&normalized),
    };
    let mut variants = vec![normalized];
    variants.extend(counterpart);
    variants
}

/// Picks the preferred storage form: ISBN-13 when derivable, otherwise the input.
#[must_use]
pub fn preferred_isbn(input: &str) -> Option<String> {
    let normalized = normalize_isbn(input)?;
    if normalized.len() == 10 {
        return isbn10_to_isbn13(&normalized).or(Some(normalized));
    }
    Some(normalized)
}

fn isbn10_check_digit(body: &str) -> Option<char> {
    if body.len() != 9 {
        return None;
    }
    let mut sum = 0u32;
    for (index, c) in body.chars().enumerate() {
        let digit = c.to_digit(10)?;
        #[allow(clippy::cast_possible_truncation)]
        let weight = 10 - index as u32;
        sum += digit * weight;
    }
    let check = (11 - (sum % 11)) % 11;
    Some(if check == 10 {
        'X'
    } else {
        char::from_digit(check, 10)?
    })
}

fn isbn13_check_digit(body: &str) -> Option<char> {
    if body.len() != 12 {
        return None;
    }
    let mut sum = 0u32;
    for (index, c) in body.chars().enumerate() {
        let digit = c.to_digit(10)?;
        sum += if index % 2 == 0 { digit } else { digit * 3 };
    }
    char::from_digit((10 - (sum % 10)) % 10, 10)
}
