//! Post-processing: strip OCR pagination noise from page markdown.
//!
//! Scanned books carry running headers and footers such as `12` or
//! `Page 3 of 210`. OCR faithfully transcribes them, and once pages are
//! joined into one reflowable document they show up as stray lines in the
//! middle of paragraphs.
//!
//! The rule is deliberately narrow: only a line whose *entire* content is a
//! page number (optionally `Page N`, optionally `N of M`) is removed. A line
//! that happens to consist of just a number in the body text is removed too;
//! that false positive is accepted.

use once_cell::sync::Lazy;
use regex::Regex;

// `[^\S\r\n]` is horizontal Unicode whitespace (NBSP, em space, ...), so a
// match never spans two lines.
static RE_PAGE_NUMBER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[^\S\r\n]*(?:Page[^\S\r\n]*)?\d+(?:[^\S\r\n]*of[^\S\r\n]*\d+)?[^\S\r\n]*\r?$\n?",
    )
    .unwrap()
});

/// Remove every standalone page-number line, terminator included.
///
/// Idempotent: removing whole lines cannot create a new page-number-only line.
pub fn strip_page_numbers(input: &str) -> String {
    RE_PAGE_NUMBER_LINE.replace_all(input, "").into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────
