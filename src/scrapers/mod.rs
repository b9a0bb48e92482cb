pub mod http;
pub mod index;
pub mod traits;
pub mod types;

pub use http::HttpFetcher;
pub use index::ListingIndexScraper;
pub use traits::PageFetcher;
pub use types::ScrapeParams;
