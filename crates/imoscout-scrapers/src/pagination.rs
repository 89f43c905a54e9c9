//! The fetch -> extract -> terminate loop over listing index pages.
//!
//! Pages are fetched strictly in order: the stop decision for page N needs
//! the links seen on page N-1. A page that trips the empty-page or
//! repeat-page check contributes nothing to the result.

use crate::extract::{extract_fields, extract_listing_stubs, FieldSelector};
use crate::fetch::{FetchError, PageSource};
use crate::oracle::{find_element_after_sequence, StopReason, TerminationOracle, Verdict, PAGE_COUNT_SEQUENCE};
use crate::ScrapeQuery;
use imoscout_core::{ListingStub, StopPolicy};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Mutable bookkeeping for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlState {
    pub current_page: u32,
    pub collected: Vec<ListingStub>,
    pub previous_page_links: HashSet<Url>,
    pub known_last_page: Option<u32>,
}

impl CrawlState {
    pub fn new(start_page: u32, known_last_page: Option<u32>) -> Self {
        Self {
            current_page: start_page,
            collected: Vec::new(),
            previous_page_links: HashSet::new(),
            known_last_page,
        }
    }

    /// Keeps an accepted page's stubs and moves to the next page.
    fn accept(&mut self, batch: Vec<ListingStub>) {
        self.previous_page_links = batch.iter().map(|stub| stub.link.clone()).collect();
        self.collected.extend(batch);
        self.current_page += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The stop condition fired
    Clean(StopReason),
    /// Fetching `page` failed; everything before it was kept
    Aborted { page: u32, error: FetchError },
}

#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub stubs: Vec<ListingStub>,
    pub pages_fetched: u32,
    pub termination: Termination,
}

impl CrawlOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self.termination, Termination::Clean(_))
    }

    pub fn summary(&self) -> String {
        match &self.termination {
            Termination::Clean(reason) => format!(
                "collected {} listings from {} pages; stopped cleanly ({})",
                self.stubs.len(),
                self.pages_fetched,
                reason
            ),
            Termination::Aborted { page, error } => format!(
                "collected {} listings from {} pages; aborted at page {}: {}",
                self.stubs.len(),
                self.pages_fetched,
                page,
                error
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub policy: StopPolicy,
    pub max_pages: Option<u32>,
    pub known_last_page: Option<u32>,
    pub delay: Duration,
}

pub struct Paginator<'a, S: PageSource> {
    source: &'a S,
    title_selector: &'a FieldSelector,
    options: CrawlOptions,
}

impl<'a, S: PageSource> Paginator<'a, S> {
    pub fn new(source: &'a S, title_selector: &'a FieldSelector, options: CrawlOptions) -> Self {
        Self {
            source,
            title_selector,
            options,
        }
    }

    /// Crawls from `query.page` until the oracle stops it or a fetch fails.
    pub async fn crawl(&self, query: &ScrapeQuery) -> CrawlOutcome {
        let oracle = TerminationOracle::new(self.options.policy, query.page, self.options.max_pages);
        let mut state = CrawlState::new(query.page, self.options.known_last_page);
        let mut pages_fetched = 0;

        let termination = loop {
            if let Verdict::Stop(reason) = oracle.before_fetch(&state) {
                info!("Stopping before page {}: {}", state.current_page, reason);
                break Termination::Clean(reason);
            }

            let url = query.url_for_page(state.current_page);
            info!("Scraping page {}: {}", state.current_page, url);

            let page = match self.source.fetch(&url).await {
                Ok(page) => page,
                Err(error) => {
                    error!("Fetching page {} failed: {}", state.current_page, error);
                    break Termination::Aborted {
                        page: state.current_page,
                        error,
                    };
                }
            };
            pages_fetched += 1;

            let batch = {
                let document = page.document();
                extract_listing_stubs(&document, self.title_selector)
            };
            debug!("Page {} yielded {} listings", state.current_page, batch.len());

            if let Verdict::Stop(reason) = oracle.after_extract(&state, &batch) {
                info!("Stopping at page {}: {}", state.current_page, reason);
                break Termination::Clean(reason);
            }

            state.accept(batch);

            if !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }
        };

        CrawlOutcome {
            stubs: state.collected,
            pages_fetched,
            termination,
        }
    }
}

/// Reads the total page count off the pagination widget of the query's first
/// page. Any failure resolves to `None`.
pub async fn probe_page_count<S: PageSource>(
    source: &S,
    query: &ScrapeQuery,
    widget_item: &FieldSelector,
) -> Option<u32> {
    let url = query.url_for_page(1);
    let page = match source.fetch(&url).await {
        Ok(page) => page,
        Err(e) => {
            warn!("Could not probe page count at {}: {}", url, e);
            return None;
        }
    };

    let values = {
        let document = page.document();
        extract_fields(&document, widget_item)
    };
    if values.is_empty() {
        info!("No pagination items found at {}", url);
    }

    let count = find_element_after_sequence(&values, PAGE_COUNT_SEQUENCE);
    debug!("Probed page count for {}: {:?}", url, count);
    count
}
