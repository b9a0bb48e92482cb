use crate::normalize::IdStrategy;
use crate::scrapers::ScrapeParams;
use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use sqlx::postgres::PgConnectOptions;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub table: String,
}

impl DbConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub base_url: String,
    pub list_path: String,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub id_strategy: IdStrategy,
    pub marketplace_id: i64,
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let id_strategy = var("LISTING_ID_STRATEGY", "random")
            .parse::<IdStrategy>()
            .map_err(|e| anyhow!(e))
            .context("LISTING_ID_STRATEGY must be 'random' or 'url'")?;

        Ok(Self {
            db: DbConfig {
                name: var("DB_NAME", "postgres"),
                user: var("DB_USER", "postgres"),
                password: var("DB_PASSWORD", "postgres"),
                host: var("DB_HOST", "localhost"),
                port: var("DB_PORT", "5433")
                    .parse()
                    .context("DB_PORT must be a valid port number")?,
                table: var("DB_TABLE", "public.frontend_product"),
            },
            base_url: var("SCRAPER_BASE_URL", "https://www.encuentra24.com"),
            list_path: var("SCRAPER_LIST_PATH", "/panama-es/bienes-raices"),
            request_delay: Duration::from_secs(
                var("SCRAPER_DELAY_SECS", "2")
                    .parse()
                    .context("SCRAPER_DELAY_SECS must be a whole number of seconds")?,
            ),
            request_timeout: Duration::from_secs(
                var("SCRAPER_TIMEOUT_SECS", "10")
                    .parse()
                    .context("SCRAPER_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            user_agent: var("SCRAPER_USER_AGENT", DEFAULT_USER_AGENT),
            id_strategy,
            marketplace_id: var("MARKETPLACE_ID", "1")
                .parse()
                .context("MARKETPLACE_ID must be a valid number")?,
            bind_addr: var("BIND_ADDR", "0.0.0.0:8000")
                .parse()
                .context("BIND_ADDR must be host:port")?,
        })
    }

    /// Run parameters for `pages` index pages
    pub fn scrape_params(&self, pages: u32) -> ScrapeParams {
        ScrapeParams {
            base_url: self.base_url.clone(),
            list_path: self.list_path.clone(),
            pages,
            request_delay: self.request_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.db.name, "postgres");
        assert_eq!(config.db.host, "localhost");
        assert_eq!(config.db.port, 5433);
        assert_eq!(config.db.table, "public.frontend_product");
        assert_eq!(config.request_delay, Duration::from_secs(2));
        assert_eq!(config.id_strategy, IdStrategy::Random);
        assert_eq!(config.marketplace_id, 1);
        assert_eq!(config.bind_addr.port(), 8000);
    }

    #[test]
    fn overrides_are_read() {
        let config = config_from(&[
            ("DB_PORT", "5432"),
            ("LISTING_ID_STRATEGY", "url"),
            ("SCRAPER_DELAY_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(config.db.port, 5432);
        assert_eq!(config.id_strategy, IdStrategy::Url);

        let params = config.scrape_params(3);
        assert_eq!(params.pages, 3);
        assert_eq!(params.request_delay, Duration::ZERO);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(config_from(&[("DB_PORT", "abc")]).is_err());
        assert!(config_from(&[("LISTING_ID_STRATEGY", "sequential")]).is_err());
    }
}
