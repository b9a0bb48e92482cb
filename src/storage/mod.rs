//! Persistence of canonical rows.

pub mod postgres;

pub use postgres::PgListingStore;

use crate::error::LoadError;
use crate::models::CanonicalListing;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::info;

/// Destination for normalized listings.
///
/// `insert_batch` is all-or-nothing and skips rows whose id already exists,
/// returning how many rows were actually written.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn ensure_schema(&self) -> Result<(), LoadError>;

    async fn insert_batch(&self, rows: &[CanonicalListing]) -> Result<u64, LoadError>;
}

/// In-process store with the same conflict semantics as the database
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<i64, CanonicalListing>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn get(&self, id: i64) -> Option<CanonicalListing> {
        self.rows.lock().await.get(&id).cloned()
    }

    pub async fn all(&self) -> Vec<CanonicalListing> {
        self.rows.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<(), LoadError> {
        Ok(())
    }

    async fn insert_batch(&self, rows: &[CanonicalListing]) -> Result<u64, LoadError> {
        let mut stored = self.rows.lock().await;
        let mut inserted = 0;
        for row in rows {
            if !stored.contains_key(&row.id) {
                stored.insert(row.id, row.clone());
                inserted += 1;
            }
        }
        info!("Inserted {} of {} rows into memory", inserted, rows.len());
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn row(id: i64, title: &str) -> CanonicalListing {
        CanonicalListing {
            price: 100000.0,
            bathrooms: 1.0,
            bedrooms: 2,
            floor: 0,
            parking: 1,
            id,
            attributes: json!({}),
            scraped_at: Utc::now(),
            marketplace_id: 1,
            area_m2: 60.0,
            title: title.to_string(),
            description: String::new(),
            url: format!("https://x.test/{id}"),
            image_url: String::new(),
            location: String::new(),
        }
    }

    #[tokio::test]
    async fn existing_ids_are_skipped() {
        let store = MemoryStore::new();
        store.ensure_schema().await.unwrap();

        let first = store.insert_batch(&[row(1, "original"), row(2, "other")]).await.unwrap();
        assert_eq!(first, 2);

        let second = store.insert_batch(&[row(1, "changed"), row(3, "new")]).await.unwrap();
        assert_eq!(second, 1);
        assert_eq!(store.len().await, 3);
        assert_eq!(store.get(1).await.unwrap().title, "original");
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = MemoryStore::new();
        assert_eq!(store.insert_batch(&[]).await.unwrap(), 0);
        assert!(store.all().await.is_empty());
    }
}
