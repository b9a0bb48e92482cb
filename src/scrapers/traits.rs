use crate::error::FetchError;
use async_trait::async_trait;

/// Retrieval boundary for listing pages.
/// Implementations return the raw HTML body; parsing happens in the extractors.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page; any failure means the page is unavailable
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;

    /// Name of the fetcher for logs
    fn source_name(&self) -> &'static str;
}
