//! Second phase: visiting each listing's own page for its attributes.

use crate::extract::{extract_fields, extract_first, Document, FieldSelector};
use crate::fetch::{FetchError, PageSource};
use futures::stream::{self, StreamExt};
use imoscout_core::{strip_price_suffix, DedupedListing, EnrichedRecord};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the attributes sit on a detail page.
#[derive(Debug, Clone)]
pub struct DetailLayout {
    pub address: FieldSelector,
    pub price: FieldSelector,
    pub price_per_area: FieldSelector,
    /// Label column of the facts table
    pub attribute_labels: FieldSelector,
    /// Value column of the facts table, parallel to the labels
    pub attribute_values: FieldSelector,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("enrichment of '{}' failed: {error}", .listing.title)]
pub struct EnrichmentFailure {
    pub listing: DedupedListing,
    pub error: FetchError,
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentReport {
    pub records: Vec<EnrichedRecord>,
    pub failures: Vec<EnrichmentFailure>,
}

/// Builds the record for `listing` out of its detail page.
pub fn extract_record(
    document: &Document,
    layout: &DetailLayout,
    listing: &DedupedListing,
) -> EnrichedRecord {
    let mut record = EnrichedRecord::from_listing(listing);

    record.set_address(extract_first(document, &layout.address));
    record.price = extract_first(document, &layout.price).map(|p| strip_price_suffix(&p));
    record.price_per_area =
        extract_first(document, &layout.price_per_area).map(|p| strip_price_suffix(&p));

    let labels = extract_fields(document, &layout.attribute_labels);
    let values = extract_fields(document, &layout.attribute_values);
    if labels.len() != values.len() {
        debug!(
            "{}: {} labels vs {} values, pairing by position",
            listing.link,
            labels.len(),
            values.len()
        );
    }

    for (label, value) in labels.iter().zip(values) {
        let label = label.trim().trim_matches(':').trim();
        if !record.merge_attribute(label, value) {
            debug!("Ignoring unknown attribute '{}'", label);
        }
    }

    record
}

pub struct DetailEnricher<'a, S: PageSource> {
    source: &'a S,
    layout: &'a DetailLayout,
    delay: Duration,
    concurrency: usize,
}

impl<'a, S: PageSource> DetailEnricher<'a, S> {
    pub fn new(source: &'a S, layout: &'a DetailLayout) -> Self {
        Self {
            source,
            layout,
            delay: Duration::ZERO,
            concurrency: 1,
        }
    }

    /// Pause each worker takes after every detail request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of detail pages in flight at once, at least one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn enrich(&self, listing: &DedupedListing) -> Result<EnrichedRecord, EnrichmentFailure> {
        let page = self
            .source
            .fetch(listing.link.as_str())
            .await
            .map_err(|error| EnrichmentFailure {
                listing: listing.clone(),
                error,
            })?;

        let document = page.document();
        Ok(extract_record(&document, self.layout, listing))
    }

    /// Enriches every listing. One listing's failure is recorded and the rest
    /// carry on; records keep the input order.
    pub async fn enrich_all(&self, listings: &[DedupedListing]) -> EnrichmentReport {
        info!(
            "Enriching {} listings ({} at a time)",
            listings.len(),
            self.concurrency
        );

        let pending: Vec<_> = listings
            .iter()
            .map(|listing| async move {
                let result = self.enrich(listing).await;
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                result
            })
            .collect();
        let results: Vec<Result<EnrichedRecord, EnrichmentFailure>> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = EnrichmentReport::default();
        for result in results {
            match result {
                Ok(record) => report.records.push(record),
                Err(failure) => {
                    warn!("{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        info!(
            "Enriched {} listings, {} failed",
            report.records.len(),
            report.failures.len()
        );
        report
    }
}
