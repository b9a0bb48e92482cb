use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use super::{
    element_text, has_area_marker, has_currency, normalize_key, raw_text, select_first, selector,
};
use crate::models::ModelRecord;

/// Class selectors that mark a floor-plan / unit container
const MODEL_CONTAINER_SELECTORS: &[&str] = &[
    ".model-card",
    ".apartment-model",
    ".unit-type",
    ".property-model",
    ".model",
    ".apartment-type",
    ".floor-plan",
];

const MODEL_TITLE_SELECTORS: &[&str] = &[".model-title", ".title", "h3", "h4", ".model-name"];
const MODEL_PRICE_SELECTORS: &[&str] = &[".model-price", ".price", ".price-tag"];
const ROOM_KEYWORDS: &[&str] = &["recámara", "recamara", "habitacion", "baño"];

/// Lists shorter than this are navigation, not a unit description
const MIN_LIST_ITEMS: usize = 3;

static MODELO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)modelo\s*\d+[^$\n]*").unwrap());
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\$|B/\.)\s*\d[\d,]*(?:\.\d+)?").unwrap());
static AREA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*m[²2]").unwrap());
static BEDROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*(?:rec[aá]maras?|habitaci[oó]n(?:es)?|bedrooms?)").unwrap()
});
static BATHROOM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*baños?").unwrap());
static PARKING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s*estacionamiento").unwrap());
/// Label-first forms (`Recámaras 3`), tried when no count precedes a label
static BEDROOM_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:rec[aá]maras?|habitaci[oó]n(?:es)?|bedrooms?)\s*:?\s*(\d+)\b").unwrap()
});
static BATHROOM_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)baños?\s*:?\s*(\d+(?:\.\d+)?)\b").unwrap());

/// One way of finding sub-unit records in a detail page
pub trait ModelStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every candidate this strategy can see, before any evidence filtering
    fn candidates(&self, document: &Html) -> Vec<ModelRecord>;
}

/// Containers matched by well-known model class names
#[derive(Debug, Default)]
pub struct ClassSelectorStrategy;

impl ModelStrategy for ClassSelectorStrategy {
    fn name(&self) -> &'static str {
        "class-selector"
    }

    fn candidates(&self, document: &Html) -> Vec<ModelRecord> {
        MODEL_CONTAINER_SELECTORS
            .iter()
            .filter_map(|css| selector(css))
            .flat_map(|sel| document.select(&sel).map(parse_container).collect::<Vec<_>>())
            .collect()
    }
}

/// Any `div` whose text mentions both a price and an area or room count
#[derive(Debug, Default)]
pub struct CooccurrenceStrategy;

impl ModelStrategy for CooccurrenceStrategy {
    fn name(&self) -> &'static str {
        "co-occurrence"
    }

    fn candidates(&self, document: &Html) -> Vec<ModelRecord> {
        let Some(sel) = selector("div") else {
            return Vec::new();
        };
        document
            .select(&sel)
            .filter(|div| {
                let text = raw_text(*div);
                if !has_currency(&text) {
                    return false;
                }
                let lower = text.to_lowercase();
                has_area_marker(&text) || ROOM_KEYWORDS.iter().any(|kw| lower.contains(kw))
            })
            .map(parse_container)
            .collect()
    }
}

/// Tables read as `key | value | key | value` rows
#[derive(Debug, Default)]
pub struct TableStrategy;

impl ModelStrategy for TableStrategy {
    fn name(&self) -> &'static str {
        "table"
    }

    fn candidates(&self, document: &Html) -> Vec<ModelRecord> {
        let (Some(table_sel), Some(row_sel), Some(cell_sel)) =
            (selector("table"), selector("tr"), selector("td, th"))
        else {
            return Vec::new();
        };

        document
            .select(&table_sel)
            .map(|table| {
                let mut model = ModelRecord::new();
                for row in table.select(&row_sel) {
                    let cells: Vec<String> = row.select(&cell_sel).map(element_text).collect();
                    for pair in cells.chunks_exact(2) {
                        model.insert(normalize_key(&pair[0]), pair[1].as_str());
                    }
                }
                model
            })
            .collect()
    }
}

/// `ul`/`ol` lists with a title item followed by `label: value` items
#[derive(Debug, Default)]
pub struct ListStrategy;

impl ModelStrategy for ListStrategy {
    fn name(&self) -> &'static str {
        "list"
    }

    fn candidates(&self, document: &Html) -> Vec<ModelRecord> {
        let (Some(list_sel), Some(item_sel)) = (selector("ul, ol"), selector("li")) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for list in document.select(&list_sel) {
            let items: Vec<String> = list.select(&item_sel).map(element_text).collect();
            if items.len() < MIN_LIST_ITEMS {
                continue;
            }

            let mut model = ModelRecord::new();
            for (i, text) in items.iter().enumerate() {
                if text.is_empty() {
                    continue;
                }
                if i == 0 || text.to_lowercase().contains("model") {
                    model.insert("model_title", text.as_str());
                } else if let Some((key, value)) = text.split_once(':') {
                    model.insert(normalize_key(key), value);
                } else if has_currency(text) {
                    model.insert("model_price", text.as_str());
                } else if has_area_marker(text) {
                    model.insert("area", text.as_str());
                }
            }
            out.push(model);
        }
        out
    }
}

/// Runs every strategy over a page and merges their output
pub struct ModelExtractor {
    strategies: Vec<Box<dyn ModelStrategy>>,
}

impl Default for ModelExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelExtractor {
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(ClassSelectorStrategy),
            Box::new(CooccurrenceStrategy),
            Box::new(TableStrategy),
            Box::new(ListStrategy),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ModelStrategy>>) -> Self {
        Self { strategies }
    }

    /// Candidates with a single attribute are dropped; identical records found
    /// by several strategies are kept once, in first-seen order.
    pub fn extract(&self, document: &Html) -> Vec<ModelRecord> {
        let mut seen = HashSet::new();
        let mut models = Vec::new();

        for strategy in &self.strategies {
            let found: Vec<ModelRecord> = strategy
                .candidates(document)
                .into_iter()
                .filter(|m| m.len() > 1)
                .collect();
            debug!(strategy = strategy.name(), found = found.len(), "Model candidates");

            for model in found {
                if seen.insert(model.clone()) {
                    models.push(model);
                }
            }
        }

        models
    }
}

/// Field-by-field parse of one model container
fn parse_container(element: ElementRef<'_>) -> ModelRecord {
    let mut model = ModelRecord::new();
    let text = element_text(element);

    if let Some(title) = select_first(element, MODEL_TITLE_SELECTORS) {
        model.insert("model_title", element_text(title));
    } else if let Some(m) = MODELO_RE.find(&text) {
        model.insert("model_title", m.as_str());
    }

    if let Some(price) = select_first(element, MODEL_PRICE_SELECTORS) {
        model.insert("model_price", element_text(price));
    } else if let Some(m) = PRICE_RE.find(&text) {
        model.insert("model_price", m.as_str());
    }

    if let Some(m) = AREA_RE.find(&text) {
        model.insert("area", m.as_str());
    }
    if let Some(c) = BEDROOM_RE
        .captures(&text)
        .or_else(|| BEDROOM_LABEL_RE.captures(&text))
    {
        model.insert("recamaras", &c[1]);
    }
    if let Some(c) = BATHROOM_RE
        .captures(&text)
        .or_else(|| BATHROOM_LABEL_RE.captures(&text))
    {
        model.insert("banos", &c[1]);
    }
    if let Some(c) = PARKING_RE.captures(&text) {
        model.insert("estacionamiento", &c[1]);
    }

    if let Some(sel) = selector("p") {
        for p in element.select(&sel) {
            if let Some((key, value)) = element_text(p).split_once(':') {
                model.insert(normalize_key(key), value);
            }
        }
    }

    if let Some(sel) = selector("strong, b, em") {
        for label in element.select(&sel) {
            if let Some((key, value)) = labeled_value(label) {
                model.insert(key, value);
            }
        }
    }

    model
}

/// Resolve `<strong>Label:</strong> value` into a key/value pair.
///
/// The value is the text node right after the label; failing that, whatever
/// follows the label inside its parent up to the next line break; failing
/// that, anything after the colon inside the label itself.
fn labeled_value(label: ElementRef<'_>) -> Option<(String, String)> {
    let label_text = element_text(label);
    let (key, inline) = label_text.split_once(':')?;
    let key = normalize_key(key);
    if key.is_empty() {
        return None;
    }

    let following = label
        .next_sibling()
        .and_then(|node| node.value().as_text().map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty());

    let from_parent = || {
        let parent = label.parent().and_then(ElementRef::wrap)?;
        let parent_text = raw_text(parent);
        let own = raw_text(label);
        let start = parent_text.find(own.as_str())? + own.len();
        let line = parent_text[start..].trim_start().lines().next()?.trim().to_string();
        (!line.is_empty()).then_some(line)
    };

    let value = following
        .or_else(from_parent)
        .or_else(|| Some(inline.trim().to_string()).filter(|v| !v.is_empty()))?;
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn table_rows_become_one_model() {
        let page = doc("<table><tr><td>Área</td><td>50 m2</td></tr>\
                        <tr><td>Recámaras</td><td>2</td></tr></table>");
        let models = ModelExtractor::new().extract(&page);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].get("area"), Some("50 m2"));
        assert_eq!(models[0].get("recamaras"), Some("2"));
    }

    #[test]
    fn table_pairs_cells_across_a_row() {
        let page = doc("<table><tr><th>Modelo</th><td>A</td><th>Baños</th><td>2</td></tr></table>");
        let models = TableStrategy.candidates(&page);
        assert_eq!(models[0].get("modelo"), Some("A"));
        assert_eq!(models[0].get("banos"), Some("2"));
    }

    #[test]
    fn class_container_is_parsed_field_by_field() {
        let page = doc(
            "<section class='model-card'>\
               <h3>Modelo Tipo A</h3>\
               <span class='price'>$185,000</span>\
               <span>85 m²</span><span>2 recámaras, 2 baños</span>\
               <p>Balcón: Sí</p>\
             </section>",
        );
        let models = ClassSelectorStrategy.candidates(&page);
        assert_eq!(models.len(), 1);
        let m = &models[0];
        assert_eq!(m.get("model_title"), Some("Modelo Tipo A"));
        assert_eq!(m.get("model_price"), Some("$185,000"));
        assert_eq!(m.get("area"), Some("85 m²"));
        assert_eq!(m.get("recamaras"), Some("2"));
        assert_eq!(m.get("banos"), Some("2"));
        assert_eq!(m.get("balcon"), Some("Sí"));
    }

    #[test]
    fn strong_label_takes_following_text() {
        let page = doc("<section class='model'><p><strong>Terraza:</strong> 12 m2</p>\
                        <span>$90,000</span></section>");
        let models = ClassSelectorStrategy.candidates(&page);
        assert_eq!(models[0].get("terraza"), Some("12 m2"));
    }

    #[test]
    fn strong_label_falls_back_to_parent_line() {
        let page = doc("<section class='model'><div><b>Vista:</b><i>al mar</i>\nextra</div>\
                        <span>$90,000</span></section>");
        let models = ClassSelectorStrategy.candidates(&page);
        assert_eq!(models[0].get("vista"), Some("al mar"));
    }

    #[test]
    fn cooccurrence_needs_price_and_size() {
        let page = doc("<div>Desde $120,000 con 65 m2</div><div>Solo 65 m2</div>");
        let models = CooccurrenceStrategy.candidates(&page);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].get("model_price"), Some("$120,000"));
        assert_eq!(models[0].get("area"), Some("65 m2"));
    }

    #[test]
    fn unit_suffix_is_not_read_as_a_count() {
        let page = doc("<div><h1>Altamira PH</h1><span class='price'>$250,000</span>\
                        <span>70 m2</span> <span>Recámaras 3</span></div>");
        let models = CooccurrenceStrategy.candidates(&page);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].get("area"), Some("70 m2"));
        assert_eq!(models[0].get("recamaras"), Some("3"));
    }

    #[test]
    fn wrapped_table_page_keeps_true_counts() {
        let page = doc("<div class='container'><h1>Altamira PH</h1><span class='price'>$250,000</span>\
                        <table><tr><th>Área</th><td>70 m2</td></tr>\
                        <tr><th>Recámaras</th><td>3</td></tr></table></div>");
        let models = ModelExtractor::new().extract(&page);
        assert!(!models.is_empty());
        assert!(models.iter().all(|m| m.get("recamaras") == Some("3")));
    }

    #[test]
    fn area_keeps_thousands_separator() {
        let page = doc("<div>Lote desde $95,000 con 1,200 m2</div>");
        let models = CooccurrenceStrategy.candidates(&page);
        assert_eq!(models[0].get("area"), Some("1,200 m2"));
    }

    #[test]
    fn list_items_map_to_fields() {
        let page = doc("<ul><li>Modelo B</li><li>Precio: $200,000</li>\
                        <li>B/. 210,000 con financiamiento</li><li>95 m²</li></ul>");
        let models = ListStrategy.candidates(&page);
        assert_eq!(models.len(), 1);
        let m = &models[0];
        assert_eq!(m.get("model_title"), Some("Modelo B"));
        assert_eq!(m.get("precio"), Some("$200,000"));
        assert_eq!(m.get("model_price"), Some("B/. 210,000 con financiamiento"));
        assert_eq!(m.get("area"), Some("95 m²"));
    }

    #[test]
    fn short_lists_are_ignored() {
        let page = doc("<ul><li>Inicio</li><li>Contacto</li></ul>");
        assert!(ListStrategy.candidates(&page).is_empty());
    }

    #[test]
    fn single_attribute_candidates_are_discarded() {
        let page = doc("<ul><li>Menu</li><li>Inicio</li><li>Contacto</li></ul>");
        assert!(ModelExtractor::new().extract(&page).is_empty());
    }

    #[test]
    fn duplicates_across_strategies_are_merged() {
        struct Fixed;
        impl ModelStrategy for Fixed {
            fn name(&self) -> &'static str {
                "fixed"
            }
            fn candidates(&self, _: &Html) -> Vec<ModelRecord> {
                let mut m = ModelRecord::new();
                m.insert("area", "50 m2");
                m.insert("recamaras", "2");
                vec![m]
            }
        }
        let page = doc("<table><tr><td>Área</td><td>50 m2</td></tr>\
                        <tr><td>Recámaras</td><td>2</td></tr></table>");
        let extractor =
            ModelExtractor::with_strategies(vec![Box::new(TableStrategy), Box::new(Fixed)]);
        assert_eq!(extractor.extract(&page).len(), 1);
    }
}
