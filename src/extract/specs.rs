use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;
use tracing::debug;

use super::{char_len, element_text, own_text, page_text, selector};
use crate::models::PropertySpec;

/// Snippets at or above this many characters are prose, not specs
const MAX_SNIPPET_CHARS: usize = 100;

/// One scalar spec and its cascade of patterns, highest priority first.
///
/// Labeled `label: N` forms come first, then bare `N unit` co-occurrence
/// forms, then the loose `label N` form that catches label/value table
/// cells. Bare forms only allow horizontal whitespace so a count in one
/// cell never pairs with the unit of the next line, and start on a word
/// boundary so the `2` of `m2` is never read as a count.
struct SpecField {
    label: &'static str,
    patterns: Vec<Regex>,
}

impl SpecField {
    fn new(label: &'static str, patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
            .collect();
        Self { label, patterns }
    }

    /// First pattern that matches wins; its first capture is the value
    fn find(&self, text: &str) -> Option<(String, String)> {
        self.patterns.iter().find_map(|re| {
            let caps = re.captures(text)?;
            let value = caps.get(1)?.as_str().to_string();
            let matched = caps.get(0)?.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            let evidence = format!("{}: {}", self.label, matched);
            Some((value, evidence))
        })
    }
}

static AREA: LazyLock<SpecField> = LazyLock::new(|| {
    SpecField::new(
        "Area",
        &[
            r"(?:área|area|superficie|size|tamaño)\s*:?\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(?:m[²2]|metros)",
            r"\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)[^\S\n]*m[²2]",
            r"\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)[^\S\n]*metros?[^\S\n]*cuadrados?",
        ],
    )
});

static BEDROOMS: LazyLock<SpecField> = LazyLock::new(|| {
    SpecField::new(
        "Bedrooms",
        &[
            r"(?:habitaci[oó]n(?:es)?|rec[aá]maras?|dormitorios?|bedrooms?)\s*:\s*(\d+)",
            r"\b(\d+)[^\S\n]*-[^\S\n]*\d+[^\S\n]*(?:rec[aá]maras?|habitaci[oó]n(?:es)?|dormitorios?|bedrooms?)",
            r"\b(\d+)[^\S\n]*habitaci[oó]n(?:es)?",
            r"\b(\d+)[^\S\n]*rec[aá]maras?",
            r"\b(\d+)[^\S\n]*dormitorios?",
            r"\b(\d+)[^\S\n]*bedrooms?",
            r"\b(\d+)[^\S\n]*hab\b",
            r"(?:habitaci[oó]n(?:es)?|rec[aá]maras?|dormitorios?|bedrooms?)\s*(\d+)",
        ],
    )
});

static BATHROOMS: LazyLock<SpecField> = LazyLock::new(|| {
    SpecField::new(
        "Bathrooms",
        &[
            r"(?:baños?|bathrooms?)\s*:\s*(\d+(?:\.\d+)?)",
            r"\b(\d+(?:\.\d+)?)[^\S\n]*baños?",
            r"\b(\d+(?:\.\d+)?)[^\S\n]*bathrooms?",
            r"(?:baños?|bathrooms?)\s*(\d+(?:\.\d+)?)",
        ],
    )
});

static PARKING: LazyLock<SpecField> = LazyLock::new(|| {
    SpecField::new(
        "Parking",
        &[
            r"(?:estacionamientos?|parking|garajes?)\s*:\s*(\d+)",
            r"\b(\d+)[^\S\n]*estacionamientos?",
            r"\b(\d+)[^\S\n]*parking[^\S\n]*spaces?",
            r"\b(\d+)[^\S\n]*garajes?",
            r"(?:estacionamientos?|parking)\s*(\d+)",
        ],
    )
});

static FLOOR: LazyLock<SpecField> = LazyLock::new(|| {
    SpecField::new(
        "Floor",
        &[
            r"(?:piso|floor|nivel)\s*:\s*(\d+)",
            r"piso\s*(\d+)",
            r"floor\s*(\d+)",
            r"nivel\s*(\d+)",
            r"\b(\d+)(?:er|do|ro|to|vo|no|mo|th|st|nd|rd|°|º)?[^\S\n]*piso",
            r"\b(\d+)(?:th|st|nd|rd)?[^\S\n]*floor",
        ],
    )
});

/// Element text that looks like a compact spec ("70 m2", "3 hab", "2 baños")
static SPEC_SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+\s*m[²2]|\d+\s*hab|\d+\s*baño|\d+\s*rec[aá]mara").unwrap()
});

/// Text node holding a `label: N` pair
static KEY_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\s*\d+").unwrap());

const SPEC_KEYWORDS: &[&str] = &[
    "área",
    "area",
    "habitacion",
    "recámara",
    "recamara",
    "baño",
    "estacionamiento",
    "piso",
];

/// Recovers area, room counts, parking and floor from a detail page
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecParser;

impl SpecParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, document: &Html) -> PropertySpec {
        let mut spec = self.parse_text(&page_text(document));
        spec.raw_specs.extend(collect_snippets(document));
        debug!(
            area = ?spec.area_m2,
            bedrooms = ?spec.bedrooms,
            bathrooms = ?spec.bathrooms,
            evidence = spec.raw_specs.len(),
            "Parsed property specs"
        );
        spec
    }

    /// Run the pattern cascades over plain text
    pub fn parse_text(&self, text: &str) -> PropertySpec {
        let mut spec = PropertySpec::default();

        let mut run = |field: &SpecField| {
            field.find(text).map(|(value, evidence)| {
                spec.raw_specs.insert(evidence);
                value
            })
        };

        let area_m2 = run(&*AREA);
        let bedrooms = run(&*BEDROOMS);
        let bathrooms = run(&*BATHROOMS);
        let parking = run(&*PARKING);
        let floor = run(&*FLOOR);

        spec.area_m2 = area_m2;
        spec.bedrooms = bedrooms;
        spec.bathrooms = bathrooms;
        spec.parking = parking;
        spec.floor = floor;
        spec
    }
}

/// Short spec-looking snippets from structured elements and `label: N` text nodes
fn collect_snippets(document: &Html) -> Vec<String> {
    let mut snippets = Vec::new();

    if let Some(sel) = selector("p, div, span") {
        for element in document.select(&sel) {
            if !SPEC_SNIPPET_RE.is_match(&own_text(element)) {
                continue;
            }
            let text = element_text(element);
            if char_len(&text) < MAX_SNIPPET_CHARS {
                snippets.push(text);
            }
        }
    }

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let text = text.trim();
        if text.is_empty() || char_len(text) >= MAX_SNIPPET_CHARS || !KEY_VALUE_RE.is_match(text) {
            continue;
        }
        let lower = text.to_lowercase();
        let in_code = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|p| matches!(p.value().name(), "script" | "style"));
        if !in_code && SPEC_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            snippets.push(text.to_string());
        }
    }

    snippets
}
