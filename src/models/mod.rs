use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Lightweight card data captured from an index page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingStub {
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub location_text: Option<String>,
    pub url: String,
}

/// Scalar specs recovered from a detail page's free text.
///
/// Numbers are kept as the matched text; coercion happens in the normalizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PropertySpec {
    pub area_m2: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub parking: Option<String>,
    pub floor: Option<String>,
    pub raw_specs: BTreeSet<String>,
}

/// One sub-unit (floor plan / model) offered inside a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ModelRecord(pub BTreeMap<String, String>);

impl ModelRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, ignoring blank keys and values
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return;
        }
        self.0.insert(key, value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Everything extracted from one detail page. Absent fields are `None`/empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailRecord {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub listing_price_text: Option<String>,
    pub description: Option<String>,
    pub models: Vec<ModelRecord>,
    pub amenities: BTreeSet<String>,
    pub apartment_features: BTreeSet<String>,
    pub additional_benefits: BTreeSet<String>,
    pub spec: PropertySpec,
}

/// Stub and detail data merged into one loosely typed record.
///
/// List-valued fields are kept as JSON so records from any producer go
/// through the same permissive list normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawListing {
    pub title: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub page_title: Option<String>,
    pub subtitle: Option<String>,
    pub listing_price: Option<String>,
    pub description: Option<String>,
    pub area_m2: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub parking: Option<String>,
    pub floor: Option<String>,
    pub property_specs_raw: Value,
    pub models: Value,
    pub amenities: Value,
    pub apartment_features: Value,
    pub additional_benefits: Value,
}

impl RawListing {
    /// Combine an index stub with its detail page; stub fields take precedence
    pub fn merge(stub: ListingStub, detail: DetailRecord) -> Self {
        let to_json = |set: BTreeSet<String>| Value::from(set.into_iter().collect::<Vec<_>>());

        Self {
            title: stub.title,
            price: stub.price_text,
            location: stub.location_text,
            url: Some(stub.url),
            page_title: detail.title,
            subtitle: detail.subtitle,
            listing_price: detail.listing_price_text,
            description: detail.description,
            area_m2: detail.spec.area_m2,
            bedrooms: detail.spec.bedrooms,
            bathrooms: detail.spec.bathrooms,
            parking: detail.spec.parking,
            floor: detail.spec.floor,
            property_specs_raw: to_json(detail.spec.raw_specs),
            models: serde_json::to_value(detail.models).unwrap_or(Value::Null),
            amenities: to_json(detail.amenities),
            apartment_features: to_json(detail.apartment_features),
            additional_benefits: to_json(detail.additional_benefits),
        }
    }
}

/// The persisted row (15 columns)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalListing {
    pub price: f64,
    pub bathrooms: f64,
    pub bedrooms: i32,
    pub floor: i32,
    pub parking: i32,
    pub id: i64,
    pub attributes: Value,
    pub scraped_at: DateTime<Utc>,
    pub marketplace_id: i64,
    pub area_m2: f64,
    pub title: String,
    pub description: String,
    pub url: String,
    pub image_url: String,
    pub location: String,
}
