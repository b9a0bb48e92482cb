use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Node};
use std::collections::BTreeSet;
use tracing::debug;

use super::{char_len, element_text, selector};

/// Keyword-anchored harvest of one list-valued field.
///
/// Every text node matching a keyword anchors a search: the nearest
/// enclosing block container is located and its list items (plus any containers
/// whose class matches `container_class`) are collected when their text
/// length falls strictly inside the window. Independently, every `div` in
/// the page whose class matches `document_class` is collected too.
#[derive(Debug, Clone)]
pub struct Harvester {
    field: &'static str,
    keywords: Regex,
    container_class: Option<Regex>,
    items: &'static str,
    min_chars: usize,
    max_chars: usize,
    document_class: Option<Regex>,
}

impl Harvester {
    pub fn new(field: &'static str, keywords: &[&str], items: &'static str) -> Self {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        Self {
            field,
            keywords: case_insensitive(&alternation),
            container_class: None,
            items,
            min_chars: 0,
            max_chars: usize::MAX,
            document_class: None,
        }
    }

    pub fn with_container_class(mut self, pattern: &str) -> Self {
        self.container_class = Some(case_insensitive(pattern));
        self
    }

    pub fn with_document_class(mut self, pattern: &str) -> Self {
        self.document_class = Some(case_insensitive(pattern));
        self
    }

    /// Exclusive bounds on the harvested text length, in characters
    pub fn with_window(mut self, min_chars: usize, max_chars: usize) -> Self {
        self.min_chars = min_chars;
        self.max_chars = max_chars;
        self
    }

    pub fn amenities() -> Self {
        Self::new(
            "amenities",
            &["amenidades", "amenities", "servicios", "instalaciones", "comodidades", "facilidades"],
            "li",
        )
        .with_container_class("amenity|grid")
        .with_document_class("amenity|amenidad|feature|benefit|service")
        .with_window(2, 50)
    }

    pub fn apartment_features() -> Self {
        Self::new(
            "apartment_features",
            &["características", "features", "apartamento", "incluye", "cuenta con", "dispone"],
            "li",
        )
        .with_container_class("benefit|feature")
        .with_document_class("feature|caracteristica")
        .with_window(3, 200)
    }

    pub fn additional_benefits() -> Self {
        Self::new(
            "additional_benefits",
            &["beneficios", "benefits", "adicionales", "ventajas", "plus"],
            "li, div, p",
        )
        .with_document_class("benefit|ventaja")
        .with_window(3, 100)
    }

    pub fn harvest(&self, document: &Html) -> BTreeSet<String> {
        let mut found = BTreeSet::new();

        for anchor in self.anchors(document) {
            if let (Some(pattern), Some(sel)) = (&self.container_class, selector("div")) {
                for div in anchor
                    .select(&sel)
                    .filter(|d| d.id() != anchor.id() && class_matches(*d, pattern))
                {
                    self.keep(&mut found, div);
                }
            }
            if let Some(sel) = selector(self.items) {
                for item in anchor.select(&sel).filter(|i| i.id() != anchor.id()) {
                    self.keep(&mut found, item);
                }
            }
        }

        if let (Some(pattern), Some(sel)) = (&self.document_class, selector("div")) {
            for div in document.select(&sel).filter(|d| class_matches(*d, pattern)) {
                self.keep(&mut found, div);
            }
        }

        debug!(field = self.field, found = found.len(), "Harvested list field");
        found
    }

    /// Structural ancestors of every keyword-bearing text node, each once
    fn anchors<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let mut anchors: Vec<ElementRef<'a>> = Vec::new();
        for node in document.root_element().descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            if !self.keywords.is_match(text) {
                continue;
            }
            let Some(parent) = node.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            if matches!(parent.value().name(), "script" | "style") {
                continue;
            }
            let Some(anchor) = structural_ancestor(parent) else {
                continue;
            };
            if !anchors.iter().any(|a| a.id() == anchor.id()) {
                anchors.push(anchor);
            }
        }
        anchors
    }

    fn keep(&self, found: &mut BTreeSet<String>, element: ElementRef<'_>) {
        let text = element_text(element);
        let len = char_len(&text);
        if len > self.min_chars && len < self.max_chars {
            found.insert(text);
        }
    }
}

fn case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|_| Regex::new("$^").unwrap())
}

fn class_matches(element: ElementRef<'_>, pattern: &Regex) -> bool {
    element
        .value()
        .attr("class")
        .is_some_and(|class| pattern.is_match(class))
}

/// Nearest block container holding the keyword. `body` and `html` never
/// qualify: a keyword with no enclosing section anchors nothing.
fn structural_ancestor(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut current = Some(element);
    while let Some(el) = current {
        match el.value().name() {
            "body" | "html" => return None,
            name if is_container(name) => return Some(el),
            _ => current = el.parent().and_then(ElementRef::wrap),
        }
    }
    None
}

fn is_container(name: &str) -> bool {
    matches!(
        name,
        "section" | "div" | "article" | "aside" | "li" | "ul" | "ol" | "dl" | "table"
    )
}
