use crate::error::LoadError;
use crate::models::CanonicalListing;
use crate::storage::ListingStore;
use async_trait::async_trait;
use regex::Regex;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::sync::LazyLock;
use tracing::{info, warn};

/// `table` or `schema.table`, plain identifiers only
static TABLE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap()
});

/// Postgres-backed listing store
pub struct PgListingStore {
    pool: PgPool,
    table: String,
}

impl PgListingStore {
    pub fn new(pool: PgPool, table: &str) -> Result<Self, LoadError> {
        if !TABLE_NAME_RE.is_match(table) {
            return Err(LoadError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub async fn connect(options: PgConnectOptions, table: &str) -> Result<Self, LoadError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(LoadError::Connect)?;
        Self::new(pool, table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn insert_sql(&self) -> String {
        format!(
            r#"
            INSERT INTO {} (
                price, bathrooms, bedrooms, floor, parking, id, attributes, scraped_at,
                marketplace_id, area_m2, title, description, url, image_url, location
            ) VALUES (
                $1::numeric, $2::numeric, $3, $4, $5, $6, $7, $8,
                $9, $10::numeric, $11, $12, $13, $14, $15
            )
            ON CONFLICT (id) DO NOTHING
            "#,
            self.table
        )
    }
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn ensure_schema(&self) -> Result<(), LoadError> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                price NUMERIC,
                bathrooms NUMERIC,
                bedrooms INTEGER,
                floor INTEGER,
                parking INTEGER,
                id BIGINT PRIMARY KEY,
                attributes JSONB,
                scraped_at TIMESTAMPTZ,
                marketplace_id BIGINT,
                area_m2 NUMERIC,
                title VARCHAR(200),
                description TEXT,
                url VARCHAR(200),
                image_url VARCHAR(200),
                location VARCHAR(255)
            )
            "#,
            self.table
        );

        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|source| LoadError::Schema {
                table: self.table.clone(),
                source,
            })?;
        Ok(())
    }

    async fn insert_batch(&self, rows: &[CanonicalListing]) -> Result<u64, LoadError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = self.insert_sql();
        let mut tx = self.pool.begin().await.map_err(LoadError::Transaction)?;
        let mut inserted = 0;

        for row in rows {
            let result = sqlx::query(&sql)
                .bind(row.price)
                .bind(row.bathrooms)
                .bind(row.bedrooms)
                .bind(row.floor)
                .bind(row.parking)
                .bind(row.id)
                .bind(&row.attributes)
                .bind(row.scraped_at)
                .bind(row.marketplace_id)
                .bind(row.area_m2)
                .bind(&row.title)
                .bind(&row.description)
                .bind(&row.url)
                .bind(&row.image_url)
                .bind(&row.location)
                .execute(&mut *tx)
                .await;

            match result {
                Ok(done) => inserted += done.rows_affected(),
                Err(source) => {
                    warn!("Insert of listing {} failed, rolling back batch", row.id);
                    if let Err(e) = tx.rollback().await {
                        warn!("Rollback failed: {}", e);
                    }
                    return Err(LoadError::Insert { id: row.id, source });
                }
            }
        }

        tx.commit().await.map_err(LoadError::Transaction)?;
        info!(
            "Inserted {} of {} rows into {}",
            inserted,
            rows.len(),
            self.table
        );
        Ok(inserted)
    }
}
