//! Perfume detail page extraction

use crate::extract::{
    compact_text, select_all, select_first, select_within, text_of, Extractor, MissingFields,
    Record, UNKNOWN,
};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One main accord with its bar width in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accord {
    pub name: String,
    pub strength: f64,
}

/// Notes of the fragrance pyramid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfumeNotes {
    pub top: Vec<String>,
    pub middle: Vec<String>,
    pub base: Vec<String>,
}

/// A perfume extracted from its detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfumeRecord {
    pub url: String,
    pub name: String,
    pub brand: String,
    pub gender: String,
    pub photo_url: Option<String>,
    pub accords: Vec<Accord>,
    pub notes: PerfumeNotes,
    pub longevity: Option<String>,
    pub sillage: Option<String>,
    pub price_value: Option<String>,
    pub smells_like: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<String>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub missing_fields: BTreeSet<String>,
}

impl Record for PerfumeRecord {
    fn url(&self) -> &str {
        &self.url
    }

    fn missing_fields(&self) -> &BTreeSet<String> {
        &self.missing_fields
    }

    fn identity_resolved(&self) -> bool {
        !self.missing_fields.contains("name") && !self.missing_fields.contains("brand")
    }
}

/// Extracts [`PerfumeRecord`]s from perfume detail pages
#[derive(Debug, Clone, Default)]
pub struct PerfumeExtractor;

impl PerfumeExtractor {
    pub fn new() -> Self {
        Self
    }
}

const PYRAMID_LEVELS: [(&str, &str); 3] = [
    ("top", "pyramid_top"),
    ("middle", "pyramid_middle"),
    ("base", "pyramid_base"),
];

impl Extractor for PerfumeExtractor {
    type Record = PerfumeRecord;

    fn extract(&self, body: &str, url: &str) -> PerfumeRecord {
        let document = Html::parse_document(body);
        let mut missing = MissingFields::default();

        let title = select_first(&document, "h1[itemprop='name']");
        let name = missing.or_default("name", title.and_then(heading_text), UNKNOWN.to_string());

        let brand = missing.or_default(
            "brand",
            select_first(&document, "p[itemprop='brand'] a span[itemprop='name']")
                .and_then(text_of),
            UNKNOWN.to_string(),
        );

        let gender = missing.or_default(
            "gender",
            select_first(&document, "h1[itemprop='name'] small").and_then(text_of),
            UNKNOWN.to_string(),
        );

        let photo_url = missing.optional(
            "photo_url",
            select_first(&document, "img[itemprop='image']")
                .and_then(|img| img.value().attr("src"))
                .map(str::trim)
                .filter(|src| !src.is_empty())
                .map(str::to_string),
        );

        let accords = extract_accords(&document, &mut missing);
        let notes = extract_notes(&document, &mut missing);

        let longevity = missing.optional("longevity", rating(&document, "longevity-rating"));
        let sillage = missing.optional("sillage", rating(&document, "sillage-rating"));
        let price_value = missing.optional("price_value", rating(&document, "price-value-widget"));

        let smells_like = missing.non_empty(
            "smells_like",
            select_all(&document, "similar-perfumes .carousel-cell a span.brand")
                .into_iter()
                .filter_map(text_of)
                .collect(),
        );

        let reviews = select_all(&document, ".fragrance-review-box")
            .into_iter()
            .filter_map(|review| {
                select_within(review, "[itemprop='reviewBody']")
                    .into_iter()
                    .next()
                    .and_then(text_of)
            })
            .collect();

        let (pros, cons) = extract_pros_cons(&document);

        PerfumeRecord {
            url: url.to_string(),
            name,
            brand,
            gender,
            photo_url,
            accords,
            notes,
            longevity,
            sillage,
            price_value,
            smells_like,
            reviews,
            pros,
            cons,
            missing_fields: missing.into_set(),
        }
    }
}

/// Heading text without the nested `<small>` gender label
fn heading_text(heading: ElementRef<'_>) -> Option<String> {
    let own: Vec<&str> = heading
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect();

    if own.is_empty() {
        text_of(heading)
    } else {
        Some(own.join(" "))
    }
}

/// Parses the accord bars; a bar whose width is not a number is dropped
/// and recorded as `accords: <name>`
fn extract_accords(document: &Html, missing: &mut MissingFields) -> Vec<Accord> {
    let mut accords = Vec::new();

    for bar in select_all(document, ".accord-box .accord-bar") {
        let name = text_of(bar).unwrap_or_else(|| "unnamed".to_string());

        match bar.value().attr("style").and_then(parse_width_percent) {
            Some(strength) => accords.push(Accord { name, strength }),
            None => missing.note(format!("accords: {}", name)),
        }
    }

    if accords.is_empty() {
        missing.note("accords");
    }

    accords
}

/// Extracts the width percentage from an inline style such as `background: red; width: 85.5%;`
pub(crate) fn parse_width_percent(style: &str) -> Option<f64> {
    let (_, after) = style.rsplit_once("width:")?;
    let number = after.split('%').next()?.trim();
    let value = number.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Three independent pyramid passes; an empty pass records `notes_<level>`
fn extract_notes(document: &Html, missing: &mut MissingFields) -> PerfumeNotes {
    let mut notes = PerfumeNotes::default();

    for (level, id) in PYRAMID_LEVELS {
        let mut found: Vec<String> = select_all(document, &format!("div#{} a", id))
            .into_iter()
            .filter_map(text_of)
            .collect();

        if found.is_empty() {
            found = pyramid_level_notes(document, level);
        }

        let found = missing.non_empty(&format!("notes_{}", level), found);
        match level {
            "top" => notes.top = found,
            "middle" => notes.middle = found,
            _ => notes.base = found,
        }
    }

    notes
}

/// Notes from `<pyramid-level notes="...">` markup, where the note name is
/// the anchor text or the text node right after the anchor
fn pyramid_level_notes(document: &Html, level: &str) -> Vec<String> {
    let mut notes = Vec::new();

    for section in select_all(document, &format!("pyramid-level[notes='{}']", level)) {
        for anchor in select_within(section, "a") {
            let name = text_of(anchor).or_else(|| {
                anchor
                    .next_sibling()
                    .and_then(|node| node.value().as_text().map(|t| t.trim().to_string()))
                    .filter(|t| !t.is_empty())
            });

            if let Some(name) = name {
                if !notes.contains(&name) {
                    notes.push(name);
                }
            }
        }
    }

    notes
}

/// Text of a rating widget (`<widget> p span`)
fn rating(document: &Html, widget: &str) -> Option<String> {
    select_first(document, &format!("{} p span", widget)).and_then(text_of)
}

/// Pros and cons columns, located by their `h4.header` captions
fn extract_pros_cons(document: &Html) -> (Vec<String>, Vec<String>) {
    let mut pros = Vec::new();
    let mut cons = Vec::new();

    for column in select_all(document, ".grid-x .cell.small-6") {
        let caption = select_within(column, "h4.header")
            .into_iter()
            .next()
            .map(compact_text)
            .unwrap_or_default();

        let target = if caption.contains("Pros") {
            &mut pros
        } else if caption.contains("Cons") {
            &mut cons
        } else {
            continue;
        };

        for line in select_within(column, ".cell.small-12") {
            let cleaned = strip_leading_digits(&compact_text(line));
            if !cleaned.is_empty() {
                target.push(cleaned);
            }
        }
    }

    (pros, cons)
}

/// Removes a leading vote count: `"201 Good for everyday wear"` -> `"Good for everyday wear"`
pub(crate) fn strip_leading_digits(text: &str) -> String {
    text.trim_start_matches(|c: char| c.is_ascii_digit())
        .trim()
        .to_string()
}
