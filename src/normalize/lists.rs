use serde_json::{Map, Value};
use std::collections::HashSet;

/// Model keys rendered in fixed positions by [`flatten_models`]
const TITLE_KEYS: &[&str] = &["model_title"];
const PRICE_KEYS: &[&str] = &["model_price"];
const AREA_KEYS: &[&str] = &["área", "area", "size"];
const BEDROOM_KEYS: &[&str] = &["recámaras", "recamaras", "habitaciones", "bedrooms"];
const BATHROOM_KEYS: &[&str] = &["baños", "banos", "bathrooms"];
const PARKING_KEYS: &[&str] = &["estacionamiento", "parking"];

/// Coerce any list-ish value into a JSON array.
///
/// - array of strings: deduplicated, first occurrence kept
/// - array holding anything else: returned unchanged
/// - string holding a list literal: parsed, then normalized again
/// - any other string: split on commas, trimmed, deduplicated
/// - null, empty or scalar: empty array
pub fn normalize_list(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.iter().all(Value::is_string) => {
            dedupe(items.iter().filter_map(Value::as_str))
        }
        Value::Array(_) => value.clone(),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Value::Array(Vec::new());
            }
            if let Some(parsed @ Value::Array(_)) = parse_literal(text) {
                return normalize_list(&parsed);
            }
            dedupe(text.split(',').map(str::trim))
        }
        _ => Value::Array(Vec::new()),
    }
}

/// Strings of a normalized list, ignoring non-string entries
pub fn string_items(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn dedupe<'a>(items: impl Iterator<Item = &'a str>) -> Value {
    let mut seen = HashSet::new();
    items
        .filter(|item| !item.is_empty() && seen.insert(*item))
        .map(|item| Value::String(item.to_string()))
        .collect()
}

/// JSON first; a single-quoted list literal gets one more try with quotes swapped
fn parse_literal(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    if text.starts_with('[') && text.ends_with(']') && text.contains('\'') {
        return serde_json::from_str(&text.replace('\'', "\"")).ok();
    }
    None
}

/// One line per model, e.g. `Modelo A - @ $185,000 - Area: 85 m2 - 2 hab, 2 baños`,
/// models joined by `"; "`. `None` when there is nothing to summarize.
pub fn flatten_models(models: &Value) -> Option<String> {
    let flattened: Vec<String> = models
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .map(flatten_model)
        .filter(|line| !line.is_empty())
        .collect();

    (!flattened.is_empty()).then(|| flattened.join("; "))
}

fn flatten_model(model: &Map<String, Value>) -> String {
    let get = |keys: &[&str]| keys.iter().find_map(|k| text_of(model.get(*k)?));
    let mut parts = Vec::new();

    if let Some(title) = get(TITLE_KEYS) {
        parts.push(title);
    }
    if let Some(price) = get(PRICE_KEYS) {
        parts.push(format!("@ {price}"));
    }
    if let Some(area) = get(AREA_KEYS) {
        parts.push(format!("Area: {area}"));
    }

    let bedrooms = get(BEDROOM_KEYS);
    let bathrooms = get(BATHROOM_KEYS);
    if bedrooms.is_some() || bathrooms.is_some() {
        parts.push(format!(
            "{} hab, {} baños",
            bedrooms.as_deref().unwrap_or("N/A"),
            bathrooms.as_deref().unwrap_or("N/A")
        ));
    }

    if let Some(parking) = get(PARKING_KEYS) {
        parts.push(format!("Parking: {parking}"));
    }

    let known = [TITLE_KEYS, PRICE_KEYS, AREA_KEYS, BEDROOM_KEYS, BATHROOM_KEYS, PARKING_KEYS];
    for (key, value) in model {
        if known.iter().any(|keys| keys.contains(&key.as_str())) {
            continue;
        }
        if let Some(value) = text_of(value) {
            parts.push(format!("{}: {}", label_of(key), value));
        }
    }

    parts.join(" - ")
}

fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// `"area_total"` → `"Area Total"`
fn label_of(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
