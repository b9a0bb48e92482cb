use crate::error::FetchError;
use crate::extract::{element_text, select_first, selector};
use crate::models::ListingStub;
use scraper::Html;
use tracing::{debug, info};
use url::Url;

/// Card containers, tried in order until one matches anything
const CARD_SELECTORS: &[&str] = &["div.d3-ad-tile", ".listing-card", ".property-card"];

const TITLE_SELECTORS: &[&str] = &[".d3-ad-tile__title", ".title", "h2", "h3"];
const PRICE_SELECTORS: &[&str] = &[".d3-ad-tile__price", ".price", ".price-tag"];
const LOCATION_SELECTORS: &[&str] = &[".d3-ad-tile__location span", ".location", ".address"];
const LINK_SELECTORS: &[&str] = &["a.d3-ad-tile__description", "a[href]"];

/// Turns an index page into listing stubs
pub struct ListingIndexScraper {
    base_url: Url,
}

impl ListingIndexScraper {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|e| FetchError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { base_url })
    }

    /// One stub per card that carries a resolvable link
    pub fn parse_page(&self, html: &str) -> Vec<ListingStub> {
        let document = Html::parse_document(html);

        let cards: Vec<_> = CARD_SELECTORS
            .iter()
            .filter_map(|css| selector(css))
            .map(|sel| document.select(&sel).collect::<Vec<_>>())
            .find(|cards| !cards.is_empty())
            .unwrap_or_default();
        info!("Found {} listing cards", cards.len());

        let mut stubs = Vec::new();
        for (idx, card) in cards.into_iter().enumerate() {
            let href = select_first(card, LINK_SELECTORS)
                .and_then(|a| a.value().attr("href"))
                .map(str::trim)
                .filter(|h| !h.is_empty());
            let Some(url) = href.and_then(|h| self.base_url.join(h).ok()) else {
                debug!("Skipped card {} without a usable link", idx);
                continue;
            };

            let text_of = |chain: &[&str]| {
                select_first(card, chain)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
            };

            stubs.push(ListingStub {
                title: text_of(TITLE_SELECTORS),
                price_text: text_of(PRICE_SELECTORS),
                location_text: text_of(LOCATION_SELECTORS),
                url: url.to_string(),
            });
        }

        stubs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cards_and_resolves_links() {
        let html = r#"
            <div class="d3-ad-tile">
              <a class="d3-ad-tile__description" href="/panama-es/bienes-raices/altamira-ph/123">
                <div class="d3-ad-tile__title">Altamira PH</div>
              </a>
              <div class="d3-ad-tile__price">$250,000</div>
              <div class="d3-ad-tile__location"><span>San Francisco</span></div>
            </div>
            <div class="d3-ad-tile"><div class="d3-ad-tile__title">No link</div></div>
        "#;
        let scraper = ListingIndexScraper::new("https://www.encuentra24.com").unwrap();
        let stubs = scraper.parse_page(html);

        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].title.as_deref(), Some("Altamira PH"));
        assert_eq!(stubs[0].price_text.as_deref(), Some("$250,000"));
        assert_eq!(stubs[0].location_text.as_deref(), Some("San Francisco"));
        assert_eq!(
            stubs[0].url,
            "https://www.encuentra24.com/panama-es/bienes-raices/altamira-ph/123"
        );
    }

    #[test]
    fn falls_back_to_generic_cards() {
        let html = r#"<article class="listing-card"><h3>Casa en Boquete</h3>
            <span class="price">B/. 180,000</span><a href="https://other.example/casa">Ver</a></article>"#;
        let scraper = ListingIndexScraper::new("https://www.encuentra24.com").unwrap();
        let stubs = scraper.parse_page(html);

        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].title.as_deref(), Some("Casa en Boquete"));
        assert_eq!(stubs[0].location_text, None);
        assert_eq!(stubs[0].url, "https://other.example/casa");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(ListingIndexScraper::new("not a url").is_err());
    }
}
