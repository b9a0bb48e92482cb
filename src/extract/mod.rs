//! Heuristic extraction over parsed listing pages.
//!
//! Nothing in here returns an error: a heuristic that finds nothing yields
//! `None` or an empty collection and the caller moves on to the next one.

pub mod detail;
pub mod harvest;
pub mod models;
pub mod specs;

pub use detail::DetailPageExtractor;
pub use models::ModelExtractor;
pub use specs::SpecParser;

use scraper::{ElementRef, Html, Node, Selector};

/// Markers that identify a price in free text
pub const CURRENCY_MARKERS: &[&str] = &["$", "B/."];

/// Markers that identify a surface area in free text
pub const AREA_MARKERS: &[&str] = &["m²", "m2"];

/// Parse a CSS selector, treating an invalid one as "matches nothing"
pub fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// First element matched by the first selector in `chain` that matches anything
pub fn select_first<'a>(scope: ElementRef<'a>, chain: &[&str]) -> Option<ElementRef<'a>> {
    chain
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| scope.select(&sel).next())
}

/// Text of an element with every text node trimmed and joined by one space
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of an element exactly as it appears in the markup, line breaks included
pub fn raw_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Text of the whole page without script and style bodies.
///
/// Block-level elements are fenced by line breaks so adjacent table cells
/// or list items never run together on one line.
pub fn page_text(document: &Html) -> String {
    let mut out = String::new();
    render_text(document.root_element(), &mut out);
    out
}

fn render_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if matches!(name, "script" | "style" | "noscript" | "template") {
        return;
    }
    let block = is_block(name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    render_text(child, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "html"
            | "body"
            | "div"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "main"
            | "aside"
            | "nav"
            | "p"
            | "br"
            | "ul"
            | "ol"
            | "li"
            | "dl"
            | "dt"
            | "dd"
            | "table"
            | "thead"
            | "tbody"
            | "tr"
            | "td"
            | "th"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

/// Text held directly by an element, ignoring nested elements
pub fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| &**t))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn has_currency(text: &str) -> bool {
    CURRENCY_MARKERS.iter().any(|m| text.contains(m))
}

pub fn has_area_marker(text: &str) -> bool {
    AREA_MARKERS.iter().any(|m| text.contains(m))
}

/// Length in characters, not bytes
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Turn a free-form label into a record key: lowercase, accents folded,
/// colons dropped, whitespace runs collapsed into underscores.
///
/// `"Recámaras:"` becomes `"recamaras"`, `"Área total"` becomes `"area_total"`.
pub fn normalize_key(label: &str) -> String {
    let folded: String = label
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != ':')
        .map(fold_accent)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join("_")
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        other => other,
    }
}
