//! Merged raw listings to canonical rows.

pub mod coerce;
pub mod lists;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{CanonicalListing, RawListing};
use coerce::{clean_price, parse_float, parse_int, recover_from_specs};
use lists::{flatten_models, normalize_list, string_items};

const MAX_TITLE_CHARS: usize = 200;
const MAX_URL_CHARS: usize = 200;
const MAX_LOCATION_CHARS: usize = 255;

/// How row ids are produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Fresh random id per row; re-scraping a URL inserts a new row
    #[default]
    Random,
    /// Derived from the listing URL; re-scraping a URL hits the conflict-skip
    Url,
}

impl FromStr for IdStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "url" => Ok(Self::Url),
            other => Err(format!("unknown id strategy '{other}', expected 'random' or 'url'")),
        }
    }
}

impl IdStrategy {
    /// Non-negative 63-bit id
    pub fn id_for(&self, url: &str) -> i64 {
        let bits = match self {
            Self::Random => Uuid::new_v4().as_u128() as u64,
            Self::Url => {
                let digest = Sha256::digest(url.as_bytes());
                let mut head = [0u8; 8];
                head.copy_from_slice(&digest[..8]);
                u64::from_be_bytes(head)
            }
        };
        (bits & i64::MAX as u64) as i64
    }
}

/// Reconciles merged stub + detail records into the canonical schema
#[derive(Debug, Clone)]
pub struct Normalizer {
    id_strategy: IdStrategy,
    marketplace_id: i64,
}

impl Normalizer {
    pub fn new(id_strategy: IdStrategy, marketplace_id: i64) -> Self {
        Self {
            id_strategy,
            marketplace_id,
        }
    }

    /// Normalize a whole run. All rows share one `scraped_at`; ids are unique
    /// within the batch (a URL-derived id seen twice keeps the first row).
    pub fn normalize_batch(&self, raws: Vec<RawListing>) -> Vec<CanonicalListing> {
        let scraped_at = Utc::now();
        let total = raws.len();
        let mut ids = HashSet::new();
        let mut rows = Vec::with_capacity(total);

        for raw in raws {
            let Some(mut row) = self.normalize(raw, scraped_at) else {
                continue;
            };
            while !ids.insert(row.id) {
                if self.id_strategy == IdStrategy::Url {
                    debug!(url = %row.url, "Duplicate listing in batch, keeping the first");
                    break;
                }
                row.id = self.id_strategy.id_for(&row.url);
            }
            if ids.len() > rows.len() {
                rows.push(row);
            }
        }

        info!("Normalized {} of {} listings", rows.len(), total);
        rows
    }

    /// `None` when the record has no usable `http` URL
    pub fn normalize(&self, raw: RawListing, scraped_at: DateTime<Utc>) -> Option<CanonicalListing> {
        let url = clean_text(raw.url);
        if !url.starts_with("http") {
            debug!(url = %url, "Dropping listing without an http URL");
            return None;
        }

        let title = clean_text(raw.title);
        let location = clean_text(raw.location);
        let description = clean_text(raw.description);
        let page_title = clean_text(raw.page_title);
        let subtitle = clean_text(raw.subtitle);
        let listing_price = clean_text(raw.listing_price);

        let price = clean_price(&clean_text(raw.price)).or_else(|| clean_price(&listing_price));
        let area_m2 = raw.area_m2.as_deref().and_then(parse_float);
        let floor = raw.floor.as_deref().and_then(parse_float);

        let raw_specs = normalize_list(&raw.property_specs_raw);
        let evidence = string_items(&raw_specs);
        let count = |value: &Option<String>, label: &str| {
            value
                .as_deref()
                .and_then(parse_int)
                .map(|n| n as f64)
                .or_else(|| recover_from_specs(evidence.iter().copied(), label))
        };
        let bedrooms = count(&raw.bedrooms, "Bedrooms");
        let bathrooms = count(&raw.bathrooms, "Bathrooms");
        let parking = count(&raw.parking, "Parking");

        let models = normalize_list(&raw.models);
        let models_flat = flatten_models(&models);

        let mut attributes = Map::new();
        let lists = [
            ("amenities", normalize_list(&raw.amenities)),
            ("apartment_features", normalize_list(&raw.apartment_features)),
            ("additional_benefits", normalize_list(&raw.additional_benefits)),
            ("models", models),
            ("property_specs_raw", raw_specs.clone()),
        ];
        for (key, value) in lists {
            if value.as_array().is_some_and(|items| !items.is_empty()) {
                attributes.insert(key.to_string(), value);
            }
        }
        let texts = [
            ("models_flat", models_flat.unwrap_or_default()),
            ("page_title", page_title),
            ("subtitle", subtitle),
            ("listing_price", listing_price),
        ];
        for (key, value) in texts {
            if !value.is_empty() {
                attributes.insert(key.to_string(), Value::String(value));
            }
        }

        Some(CanonicalListing {
            price: price.unwrap_or(0.0),
            bathrooms: bathrooms.unwrap_or(0.0),
            bedrooms: bedrooms.map(|n| n as i32).unwrap_or(0),
            floor: floor.map(|n| n as i32).unwrap_or(0),
            parking: parking.map(|n| n as i32).unwrap_or(0),
            id: self.id_strategy.id_for(&url),
            attributes: Value::Object(attributes),
            scraped_at,
            marketplace_id: self.marketplace_id,
            area_m2: area_m2.unwrap_or(0.0),
            title: truncate(&title, MAX_TITLE_CHARS),
            description,
            url: truncate(&url, MAX_URL_CHARS),
            image_url: String::new(),
            location: truncate(&location, MAX_LOCATION_CHARS),
        })
    }
}

/// Trim and collapse internal whitespace; missing text becomes empty
fn clean_text(text: Option<String>) -> String {
    text.map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(url: &str) -> RawListing {
        RawListing {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn normalizer() -> Normalizer {
        Normalizer::new(IdStrategy::Random, 1)
    }

    #[test]
    fn drops_rows_without_http_url() {
        assert!(normalizer().normalize(raw("/relative/path"), Utc::now()).is_none());
        assert!(normalizer().normalize(RawListing::default(), Utc::now()).is_none());
    }

    #[test]
    fn empty_record_gets_defaults() {
        let row = normalizer().normalize(raw("https://x.test/1"), Utc::now()).unwrap();
        assert_eq!(row.price, 0.0);
        assert_eq!(row.bedrooms, 0);
        assert_eq!(row.floor, 0);
        assert_eq!(row.attributes, json!({}));
        assert_eq!(row.title, "");
        assert_eq!(row.image_url, "");
        assert_eq!(row.marketplace_id, 1);
        assert!(row.id >= 0);
    }

    #[test]
    fn coerces_and_recovers_numbers() {
        let record = RawListing {
            price: Some(" B/.120,000 - 150,000 ".into()),
            area_m2: Some("85.5".into()),
            bedrooms: Some("tres".into()),
            bathrooms: Some("2.5".into()),
            parking: Some("1".into()),
            floor: Some("12".into()),
            property_specs_raw: json!(["Bedrooms: 3 habitaciones", "Bathrooms: 2.5 baños"]),
            ..raw("https://x.test/1")
        };
        let row = normalizer().normalize(record, Utc::now()).unwrap();
        assert_eq!(row.price, 120000.0);
        assert_eq!(row.area_m2, 85.5);
        assert_eq!(row.bedrooms, 3);
        assert_eq!(row.bathrooms, 2.5);
        assert_eq!(row.parking, 1);
        assert_eq!(row.floor, 12);
    }

    #[test]
    fn falls_back_to_detail_price() {
        let record = RawListing {
            listing_price: Some("$99,000".into()),
            ..raw("https://x.test/1")
        };
        let row = normalizer().normalize(record, Utc::now()).unwrap();
        assert_eq!(row.price, 99000.0);
        assert_eq!(row.attributes["listing_price"], json!("$99,000"));
    }

    #[test]
    fn builds_attributes_and_omits_empty_values() {
        let record = RawListing {
            page_title: Some("  Torre   Pacífica ".into()),
            subtitle: Some("   ".into()),
            amenities: json!("Piscina, Gimnasio, Piscina"),
            apartment_features: json!([]),
            models: json!([{"area": "70 m2", "recamaras": "3"}]),
            ..raw("https://x.test/1")
        };
        let row = normalizer().normalize(record, Utc::now()).unwrap();
        let attrs = row.attributes.as_object().unwrap();

        assert_eq!(attrs["page_title"], json!("Torre Pacífica"));
        assert_eq!(attrs["amenities"], json!(["Piscina", "Gimnasio"]));
        assert_eq!(attrs["models"], json!([{"area": "70 m2", "recamaras": "3"}]));
        assert_eq!(attrs["models_flat"], json!("Area: 70 m2 - 3 hab, N/A baños"));
        assert!(!attrs.contains_key("subtitle"));
        assert!(!attrs.contains_key("apartment_features"));
        assert!(!attrs.contains_key("property_specs_raw"));
    }

    #[test]
    fn truncates_long_text() {
        let long_url = format!("https://x.test/{}", "a".repeat(300));
        let record = RawListing {
            title: Some("é".repeat(250)),
            location: Some("l".repeat(300)),
            ..raw(&long_url)
        };
        let row = normalizer().normalize(record, Utc::now()).unwrap();
        assert_eq!(row.title.chars().count(), 200);
        assert_eq!(row.url.chars().count(), 200);
        assert_eq!(row.location.chars().count(), 255);
    }

    #[test]
    fn url_ids_are_stable_and_deduplicated_in_batch() {
        let normalizer = Normalizer::new(IdStrategy::Url, 1);
        let a = IdStrategy::Url.id_for("https://x.test/1");
        assert_eq!(a, IdStrategy::Url.id_for("https://x.test/1"));
        assert!(a >= 0);

        let rows = normalizer.normalize_batch(vec![
            raw("https://x.test/1"),
            raw("https://x.test/1"),
            raw("https://x.test/2"),
        ]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, a);
    }

    #[test]
    fn random_ids_are_unique_in_batch() {
        let rows = normalizer().normalize_batch(vec![
            raw("https://x.test/1"),
            raw("https://x.test/1"),
            raw("ftp://x.test/3"),
        ]);
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].id, rows[1].id);
        assert_eq!(rows[0].scraped_at, rows[1].scraped_at);
    }

    #[test]
    fn id_strategy_parses() {
        assert_eq!("URL".parse::<IdStrategy>(), Ok(IdStrategy::Url));
        assert!("hash".parse::<IdStrategy>().is_err());
    }
}
