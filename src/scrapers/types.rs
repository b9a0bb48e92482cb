use std::time::Duration;

/// Parameters for one pipeline run
#[derive(Debug, Clone)]
pub struct ScrapeParams {
    /// Site root, used to resolve relative listing links
    pub base_url: String,
    /// Path of the first index page, relative to `base_url`
    pub list_path: String,
    /// Number of index pages to walk (`?page=1..=pages`)
    pub pages: u32,
    /// Pause after every index and detail request
    pub request_delay: Duration,
}

impl ScrapeParams {
    /// Absolute URL of index page `page` (1-based)
    pub fn index_page_url(&self, page: u32) -> String {
        format!(
            "{}/{}?page={}",
            self.base_url.trim_end_matches('/'),
            self.list_path.trim_start_matches('/'),
            page
        )
    }
}

impl Default for ScrapeParams {
    fn default() -> Self {
        Self {
            base_url: "https://www.encuentra24.com".to_string(),
            list_path: "/panama-es/bienes-raices".to_string(),
            pages: 1,
            request_delay: Duration::from_secs(2),
        }
    }
}
