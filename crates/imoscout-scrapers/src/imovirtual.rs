use crate::enrich::{DetailEnricher, DetailLayout, EnrichmentReport};
use crate::extract::FieldSelector;
use crate::fetch::{HttpFetcher, PageSource};
use crate::pagination::{self, CrawlOptions, CrawlOutcome, Paginator};
use crate::{ScrapeQuery, Scraper};
use async_trait::async_trait;
use imoscout_core::{CrawlSettings, DedupedListing, Result, SiteKind};
use tracing::{debug, info};

/// Title element of a listing card on an index page.
pub fn listing_title() -> FieldSelector {
    FieldSelector::new("span", "offer-item-title")
}

/// Entries of the pagination widget. Only the numbered ones carry no class.
pub fn pagination_item() -> FieldSelector {
    FieldSelector::new("li", "")
}

pub fn detail_layout() -> DetailLayout {
    DetailLayout {
        address: FieldSelector::new("div", "css-z9gx1y e3ustps0"),
        price: FieldSelector::new("strong", "css-t3wmkv e1l1avn10"),
        price_per_area: FieldSelector::new("div", "css-1h1l5lm efcnut39"),
        attribute_labels: FieldSelector::new("div", "css-o4i8bk e1qm3vsd1"),
        attribute_values: FieldSelector::new("div", "css-1ytkscc e1qm3vsd3"),
    }
}

pub struct ImovirtualScraper<S: PageSource = HttpFetcher> {
    source: S,
    settings: CrawlSettings,
    title: FieldSelector,
    pagination_item: FieldSelector,
    layout: DetailLayout,
}

impl ImovirtualScraper<HttpFetcher> {
    pub fn new(settings: CrawlSettings) -> Result<Self> {
        Ok(Self::with_source(HttpFetcher::new()?, settings))
    }
}

impl<S: PageSource> ImovirtualScraper<S> {
    pub fn with_source(source: S, settings: CrawlSettings) -> Self {
        Self {
            source,
            settings,
            title: listing_title(),
            pagination_item: pagination_item(),
            layout: detail_layout(),
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }
}

#[async_trait]
impl<S: PageSource> Scraper for ImovirtualScraper<S> {
    fn site(&self) -> SiteKind {
        SiteKind::Imovirtual
    }

    async fn probe_page_count(&self, query: &ScrapeQuery) -> Option<u32> {
        pagination::probe_page_count(&self.source, query, &self.pagination_item).await
    }

    async fn scrape_listing(&self, query: ScrapeQuery, max_pages: Option<u32>) -> CrawlOutcome {
        let known_last_page = if self.settings.use_page_count {
            let count = self.probe_page_count(&query).await;
            match count {
                Some(pages) => info!("{} advertises {} pages for {}", self.site(), pages, query.typology),
                None => info!("Page count unknown for {}, relying on {}", query.typology, self.settings.stop_policy),
            }
            tokio::time::sleep(self.settings.request_delay()).await;
            count
        } else {
            None
        };

        let options = CrawlOptions {
            policy: self.settings.stop_policy,
            max_pages: max_pages.or(self.settings.max_pages),
            known_last_page,
            delay: self.settings.request_delay(),
        };
        debug!("Crawling {} with {:?}", query.page_url(), options);

        Paginator::new(&self.source, &self.title, options)
            .crawl(&query)
            .await
    }

    async fn enrich(&self, listings: &[DedupedListing]) -> EnrichmentReport {
        DetailEnricher::new(&self.source, &self.layout)
            .with_delay(self.settings.request_delay())
            .with_concurrency(self.settings.detail_concurrency)
            .enrich_all(listings)
            .await
    }
}
