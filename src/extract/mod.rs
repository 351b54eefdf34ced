//! Entity extraction
//!
//! Extractors map a fetched page body to a typed record. Extraction is total:
//! any input string produces a record. Fields that cannot be located get a
//! default value and their name is added to the record's `missing_fields`.
//!
//! - `perfume`: perfume detail pages (HTML)
//! - `discussion`: discussion threads and wiki pages (JSON API responses)

mod discussion;
mod perfume;

pub use discussion::{Comment, DiscussionExtractor, DiscussionPost};
pub use perfume::{Accord, PerfumeExtractor, PerfumeNotes, PerfumeRecord};

use scraper::{ElementRef, Html, Selector};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;

/// Default for identity strings that could not be located
pub const UNKNOWN: &str = "Unknown";

/// A record produced by an extractor
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Source URL of the record
    fn url(&self) -> &str;

    /// Names of expected fields that were absent or malformed
    fn missing_fields(&self) -> &BTreeSet<String>;

    /// True when every core identity field was resolved
    ///
    /// Records with unresolved identity are still emitted; consumers decide
    /// whether to keep them.
    fn identity_resolved(&self) -> bool;
}

/// Maps a page body to a record
pub trait Extractor: Send + Sync + 'static {
    type Record: Record;

    /// Extracts a record from `body` fetched from `url`; never fails
    fn extract(&self, body: &str, url: &str) -> Self::Record;
}

/// Collects the names of fields that fell back to defaults
#[derive(Debug, Default, Clone)]
pub(crate) struct MissingFields(BTreeSet<String>);

impl MissingFields {
    /// Returns `value`, or `default` after recording `field` as missing
    pub(crate) fn or_default<T>(&mut self, field: &str, value: Option<T>, default: T) -> T {
        match value {
            Some(v) => v,
            None => {
                self.note(field);
                default
            }
        }
    }

    /// Returns `value` as is, recording `field` when it is `None`
    pub(crate) fn optional<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.note(field);
        }
        value
    }

    /// Returns `items`, recording `field` when the list is empty
    pub(crate) fn non_empty<T>(&mut self, field: &str, items: Vec<T>) -> Vec<T> {
        if items.is_empty() {
            self.note(field);
        }
        items
    }

    pub(crate) fn note(&mut self, field: impl Into<String>) {
        self.0.insert(field.into());
    }

    pub(crate) fn into_set(self) -> BTreeSet<String> {
        self.0
    }
}

/// First element matching `css` in the document
pub(crate) fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

/// All elements matching `css` in the document
pub(crate) fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// All elements matching `css` below `scope`
pub(crate) fn select_within<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Trimmed text content, `None` when empty
pub(crate) fn text_of(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Text fragments trimmed individually and joined with single spaces
pub(crate) fn compact_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
