use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;
use tracing::debug;

use super::harvest::Harvester;
use super::{char_len, element_text, has_currency, page_text, selector, ModelExtractor, SpecParser};
use crate::models::DetailRecord;

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    ".title",
    ".property-title",
    ".listing-title",
    ".ad-title",
    ".header h1",
    ".main-title",
    "[class*='title']",
];

const SUBTITLE_SELECTORS: &[&str] = &[
    ".subtitle",
    ".property-subtitle",
    ".listing-subtitle",
    "h2",
    ".location-info",
    ".address",
    "[class*='subtitle']",
];

const PRICE_SELECTORS: &[&str] = &[
    ".price-tag",
    ".price",
    ".listing-price",
    ".property-price",
    "[class*='price']",
    ".cost",
    ".valor",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".description",
    ".property-description",
    ".listing-description",
    "[itemprop='description']",
    "[class*='description']",
];

const DESCRIPTION_KEYWORDS: &[&str] =
    &["descripción", "description", "proyecto", "detalles", "sobre", "acerca"];

const MIN_TITLE_CHARS: usize = 5;
const MIN_DESCRIPTION_CHARS: usize = 20;

/// "desde $X" is the headline price of a project; a bare amount is the fallback
static PRICE_FALLBACKS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)desde\s*(?:\$|B/\.)\s*\d[\d,]*(?:\.\d+)?").unwrap(),
        Regex::new(r"(?:\$|B/\.)\s*\d[\d,]*(?:\.\d+)?").unwrap(),
    ]
});

/// Pulls every field a detail page can offer; missing fields stay empty
pub struct DetailPageExtractor {
    models: ModelExtractor,
    specs: SpecParser,
    harvesters: [Harvester; 3],
}

impl Default for DetailPageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailPageExtractor {
    pub fn new() -> Self {
        Self {
            models: ModelExtractor::new(),
            specs: SpecParser::new(),
            harvesters: [
                Harvester::amenities(),
                Harvester::apartment_features(),
                Harvester::additional_benefits(),
            ],
        }
    }

    /// Parse raw HTML and extract it
    pub fn extract_html(&self, html: &str) -> DetailRecord {
        self.extract(&Html::parse_document(html))
    }

    pub fn extract(&self, document: &Html) -> DetailRecord {
        let title = first_passing(document, TITLE_SELECTORS, |t| char_len(t) > MIN_TITLE_CHARS);
        let subtitle =
            first_passing(document, SUBTITLE_SELECTORS, |t| char_len(t) > MIN_TITLE_CHARS);
        let listing_price_text = first_passing(document, PRICE_SELECTORS, has_currency)
            .or_else(|| price_from_text(&page_text(document)));
        let description = first_passing(document, DESCRIPTION_SELECTORS, is_description)
            .or_else(|| description_near_keyword(document));

        let [amenities, features, benefits] = &self.harvesters;
        let record = DetailRecord {
            title,
            subtitle,
            listing_price_text,
            description,
            models: self.models.extract(document),
            amenities: amenities.harvest(document),
            apartment_features: features.harvest(document),
            additional_benefits: benefits.harvest(document),
            spec: self.specs.parse(document),
        };

        debug!(
            title = record.title.is_some(),
            price = record.listing_price_text.is_some(),
            description = record.description.is_some(),
            models = record.models.len(),
            amenities = record.amenities.len(),
            features = record.apartment_features.len(),
            benefits = record.additional_benefits.len(),
            area = ?record.spec.area_m2,
            beds = ?record.spec.bedrooms,
            baths = ?record.spec.bathrooms,
            "Extracted detail page"
        );

        record
    }
}

/// Text of the first selector hit that passes `gate`; each selector gets one try
fn first_passing(document: &Html, chain: &[&str], gate: impl Fn(&str) -> bool) -> Option<String> {
    chain.iter().find_map(|css| {
        let sel = selector(css)?;
        let text = element_text(document.select(&sel).next()?);
        gate(&text).then_some(text)
    })
}

fn is_description(text: &str) -> bool {
    char_len(text) > MIN_DESCRIPTION_CHARS
}

fn price_from_text(text: &str) -> Option<String> {
    PRICE_FALLBACKS.iter().find_map(|re| {
        re.find(text)
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
    })
}

/// Description under a heading (or any text) mentioning a description keyword
fn description_near_keyword(document: &Html) -> Option<String> {
    let heading_sel = selector("h1, h2, h3, h4")?;
    let block_sel = selector("p, div")?;

    DESCRIPTION_KEYWORDS.iter().find_map(|keyword| {
        let under_heading = document
            .select(&heading_sel)
            .find(|h| element_text(*h).to_lowercase().contains(keyword))
            .and_then(|heading| {
                heading
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| matches!(el.value().name(), "p" | "div"))
                    .map(element_text)
                    .find(|t| is_description(t))
            });

        under_heading.or_else(|| {
            let parent = keyword_parent(document, keyword)?;
            parent
                .select(&block_sel)
                .map(element_text)
                .find(|t| is_description(t))
        })
    })
}

/// Parent element of the first text node containing `keyword`
fn keyword_parent<'a>(document: &'a Html, keyword: &str) -> Option<ElementRef<'a>> {
    document.root_element().descendants().find_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };
        if !text.to_lowercase().contains(keyword) {
            return None;
        }
        node.parent()
            .and_then(ElementRef::wrap)
            .filter(|p| !matches!(p.value().name(), "script" | "style" | "title"))
    })
}
