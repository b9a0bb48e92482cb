use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::extract::DetailPageExtractor;
use crate::models::{DetailRecord, ListingStub, RawListing};
use crate::normalize::Normalizer;
use crate::scrapers::{ListingIndexScraper, PageFetcher, ScrapeParams};
use crate::storage::ListingStore;

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub index_pages: u32,
    pub index_failures: u32,
    pub stubs: usize,
    pub detail_failures: usize,
    pub rows_normalized: usize,
    pub rows_inserted: u64,
}

/// Sequential scrape: index pages, then each detail page, then one load
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ListingStore>,
    extractor: DetailPageExtractor,
    normalizer: Normalizer,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn PageFetcher>, store: Arc<dyn ListingStore>, normalizer: Normalizer) -> Self {
        Self {
            fetcher,
            store,
            extractor: DetailPageExtractor::new(),
            normalizer,
        }
    }

    pub async fn run(&self, params: &ScrapeParams) -> Result<RunSummary> {
        let index = ListingIndexScraper::new(&params.base_url)?;
        let mut summary = RunSummary::default();

        info!(
            "Scraping {} index pages from {} via {}",
            params.pages,
            params.base_url,
            self.fetcher.source_name()
        );
        let stubs = self.collect_stubs(&index, params, &mut summary).await;
        summary.stubs = stubs.len();
        info!("Found {} listings", stubs.len());

        if stubs.is_empty() {
            warn!("No listings found, nothing to load");
            return Ok(summary);
        }

        let raws = self.enrich(stubs, params, &mut summary).await;
        let rows = self.normalizer.normalize_batch(raws);
        summary.rows_normalized = rows.len();

        self.store
            .ensure_schema()
            .await
            .context("Failed to prepare listing table")?;
        summary.rows_inserted = self
            .store
            .insert_batch(&rows)
            .await
            .context("Failed to load listings")?;

        info!(
            "Run complete: {} normalized, {} inserted, {} detail pages failed",
            summary.rows_normalized, summary.rows_inserted, summary.detail_failures
        );
        Ok(summary)
    }

    async fn collect_stubs(
        &self,
        index: &ListingIndexScraper,
        params: &ScrapeParams,
        summary: &mut RunSummary,
    ) -> Vec<ListingStub> {
        let mut stubs = Vec::new();

        for page in 1..=params.pages {
            let url = params.index_page_url(page);
            info!("Scraping index page {}: {}", page, url);

            match self.fetcher.fetch_page(&url).await {
                Ok(html) => {
                    summary.index_pages += 1;
                    stubs.extend(index.parse_page(&html));
                }
                Err(e) => {
                    summary.index_failures += 1;
                    warn!("Skipping index page {}: {}", page, e);
                }
            }

            tokio::time::sleep(params.request_delay).await;
        }

        stubs
    }

    async fn enrich(
        &self,
        stubs: Vec<ListingStub>,
        params: &ScrapeParams,
        summary: &mut RunSummary,
    ) -> Vec<RawListing> {
        let total = stubs.len();
        let mut raws = Vec::with_capacity(total);

        for (i, stub) in stubs.into_iter().enumerate() {
            info!("[{}/{}] Processing: {}", i + 1, total, stub.url);

            let detail = match self.fetcher.fetch_page(&stub.url).await {
                Ok(html) => self.extractor.extract_html(&html),
                Err(e) => {
                    summary.detail_failures += 1;
                    warn!("Detail page unavailable, keeping card data only: {}", e);
                    DetailRecord::default()
                }
            };
            raws.push(RawListing::merge(stub, detail));

            tokio::time::sleep(params.request_delay).await;
        }

        raws
    }
}
