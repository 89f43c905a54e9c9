pub mod enrich;
pub mod extract;
pub mod fetch;
pub mod imovirtual;
pub mod oracle;
pub mod pagination;

use async_trait::async_trait;
use imoscout_core::{CrawlSettings, DedupedListing, Result, SiteKind, SiteSettings};
use std::sync::Arc;

pub use enrich::{extract_record, DetailEnricher, DetailLayout, EnrichmentFailure, EnrichmentReport};
pub use extract::{extract_fields, extract_first, extract_listing_stubs, Document, FieldSelector};
pub use fetch::{FetchError, FetchedPage, HttpFetcher, PageSource};
pub use imovirtual::ImovirtualScraper;
pub use oracle::{find_element_after_sequence, StopReason, TerminationOracle, Verdict};
pub use pagination::{probe_page_count, CrawlOptions, CrawlOutcome, CrawlState, Paginator, Termination};

/// One typology's listing index on one site, positioned at a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeQuery {
    pub base_url: String,
    pub typology: String,
    /// Fragment between the typology and the page number, ending in the
    /// page parameter (for example `/?page=`)
    pub search: Option<String>,
    pub page: u32,
}

impl ScrapeQuery {
    pub fn new(base_url: &str, typology: &str, search: Option<String>) -> Self {
        Self {
            base_url: base_url.to_string(),
            typology: typology.to_string(),
            search,
            page: 1,
        }
    }

    pub fn from_site(site: &SiteSettings, typology: &str) -> Self {
        Self::new(&site.base_url, typology, site.search.clone())
    }

    pub fn next_page(&mut self) {
        self.page += 1;
    }

    pub fn url_for_page(&self, page: u32) -> String {
        let listing = format!("{}{}", self.base_url, self.typology);
        match &self.search {
            Some(search) => format!("{}{}{}", listing, search, page),
            None if listing.contains('?') => format!("{}&page={}", listing, page),
            None => format!("{}?page={}", listing, page),
        }
    }

    pub fn page_url(&self) -> String {
        self.url_for_page(self.page)
    }
}

/// A listing site the tool knows how to crawl and enrich.
#[async_trait]
pub trait Scraper: Send + Sync {
    fn site(&self) -> SiteKind;

    /// Total page count advertised by the site, `None` when unknown.
    async fn probe_page_count(&self, query: &ScrapeQuery) -> Option<u32>;

    /// Crawls the listing index from `query.page`. `max_pages` overrides the
    /// configured budget for this call.
    async fn scrape_listing(&self, query: ScrapeQuery, max_pages: Option<u32>) -> CrawlOutcome;

    /// Visits every listing's detail page.
    async fn enrich(&self, listings: &[DedupedListing]) -> EnrichmentReport;
}

/// Factory for creating scraper instances
pub struct ScraperFactory;

impl ScraperFactory {
    pub fn create_scraper(site: SiteKind, settings: &CrawlSettings) -> Result<Arc<dyn Scraper>> {
        match site {
            SiteKind::Imovirtual => Ok(Arc::new(ImovirtualScraper::new(settings.clone())?)),
        }
    }
}
