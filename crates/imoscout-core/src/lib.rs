use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod config;
pub mod db;
mod display;
mod listing;
pub mod metrics;
pub mod sink;
pub mod upload;

pub use config::{load_config, Config, CrawlSettings, OutputSettings, SiteSettings, StopPolicy, UploadSettings};
pub use db::{Database, RecordFilter, StoredListing};
pub use display::{create_record_table, RecordTableRow};
pub use listing::{
    dedupe, parse_amount, split_address, strip_price_suffix, DedupedListing, EnrichedRecord,
    ListingStub, KNOWN_ATTRIBUTES,
};
pub use metrics::{MetricsRecord, MetricsRecorder, ScopedTimer};
pub use sink::{CsvSink, JsonSink};
pub use upload::{collect_files, DirectoryUploader, UploadKind, Uploader};

pub type Result<T> = std::result::Result<T, ScoutError>;

#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Scraping error: {0}")]
    Scraping(String),
    #[error("Unknown site: {0}")]
    UnknownSite(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Upload error: {0}")]
    Upload(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Listing sites with a known adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    /// Imovirtual - Portuguese real estate listings
    Imovirtual,
}

impl SiteKind {
    pub const ALL: &'static [SiteKind] = &[SiteKind::Imovirtual];

    pub fn key(&self) -> &'static str {
        match self {
            SiteKind::Imovirtual => "imovirtual",
        }
    }
}

impl std::fmt::Display for SiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SiteKind {
    type Err = ScoutError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SiteKind::ALL
            .iter()
            .copied()
            .find(|site| site.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScoutError::UnknownSite(s.to_string()))
    }
}
