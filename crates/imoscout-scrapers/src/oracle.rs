//! Deciding when a paginated crawl is over.

use crate::pagination::CrawlState;
use imoscout_core::{ListingStub, StopPolicy};
use std::collections::HashSet;
use url::Url;

/// The run of pagination labels that precedes the total page count.
pub const PAGE_COUNT_SEQUENCE: &[&str] = &["1", "2", "3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page yielded no listings
    EmptyPage,
    /// A page only repeated links from the page before it
    RepeatedPage,
    /// The caller's page budget is spent
    PageBudget,
    /// The pagination widget's page count was reached
    LastKnownPage,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EmptyPage => write!(f, "page had no listings"),
            StopReason::RepeatedPage => write!(f, "page repeated the previous page"),
            StopReason::PageBudget => write!(f, "page budget reached"),
            StopReason::LastKnownPage => write!(f, "last advertised page reached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Stop(StopReason),
}

#[derive(Debug, Clone)]
pub struct TerminationOracle {
    policy: StopPolicy,
    /// Last page index the budget allows, inclusive
    budget_end: Option<u32>,
}

impl TerminationOracle {
    /// `max_pages` counts pages from `start_page`; `None` means unbounded.
    pub fn new(policy: StopPolicy, start_page: u32, max_pages: Option<u32>) -> Self {
        Self {
            policy,
            budget_end: max_pages.map(|pages| start_page.saturating_add(pages.saturating_sub(1))),
        }
    }

    pub fn policy(&self) -> StopPolicy {
        self.policy
    }

    /// Checked before fetching `state.current_page`.
    pub fn before_fetch(&self, state: &CrawlState) -> Verdict {
        let page = state.current_page;

        if let Some(last) = state.known_last_page {
            if page > last {
                return Verdict::Stop(StopReason::LastKnownPage);
            }
        }
        if let Some(end) = self.budget_end {
            if page > end {
                return Verdict::Stop(StopReason::PageBudget);
            }
        }

        Verdict::Continue
    }

    /// Checked after extracting `batch` from `state.current_page`.
    pub fn after_extract(&self, state: &CrawlState, batch: &[ListingStub]) -> Verdict {
        if batch.is_empty() {
            return Verdict::Stop(StopReason::EmptyPage);
        }

        if self.policy == StopPolicy::RepeatPage && is_repeat(batch, &state.previous_page_links) {
            return Verdict::Stop(StopReason::RepeatedPage);
        }

        Verdict::Continue
    }
}

/// True when the batch's links form a non-empty subset of `previous`.
fn is_repeat(batch: &[ListingStub], previous: &HashSet<Url>) -> bool {
    !batch.is_empty() && batch.iter().all(|stub| previous.contains(&stub.link))
}

/// Finds the first occurrence of `sequence` in `values` and parses the value
/// right after it as a page count.
pub fn find_element_after_sequence(values: &[String], sequence: &[&str]) -> Option<u32> {
    if sequence.is_empty() || values.len() <= sequence.len() {
        return None;
    }

    values
        .windows(sequence.len() + 1)
        .find(|window| {
            window
                .iter()
                .zip(sequence)
                .all(|(value, expected)| value == expected)
        })
        .and_then(|window| window[sequence.len()].trim().parse::<u32>().ok())
}
