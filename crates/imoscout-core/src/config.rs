//! Runtime configuration.
//!
//! Loaded once at start-up from a TOML file and handed to every component
//! that needs it. Site sections are resolved to [`SiteKind`] here, so an
//! unknown site key fails the load instead of being skipped later.

use crate::{Result, ScoutError, SiteKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const UPLOAD_DESTINATION_ENV: &str = "IMOSCOUT_UPLOAD_DESTINATION";

/// How the pagination engine decides that a site has run out of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StopPolicy {
    /// Stop on the first page that yields no listings.
    EmptyPage,
    /// Stop on an empty page, or on a page whose links all appeared on the
    /// page before it.
    #[default]
    RepeatPage,
}

impl std::fmt::Display for StopPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopPolicy::EmptyPage => write!(f, "empty-page"),
            StopPolicy::RepeatPage => write!(f, "repeat-page"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlSettings {
    /// Pause after every request, in milliseconds
    pub request_delay_ms: u64,
    /// Page budget; `None` runs until the stop policy fires
    pub max_pages: Option<u32>,
    pub start_page: u32,
    pub stop_policy: StopPolicy,
    /// Cap the crawl at the page count advertised by the pagination widget
    pub use_page_count: bool,
    /// Number of detail pages fetched at once
    pub detail_concurrency: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
            max_pages: None,
            start_page: 1,
            stop_policy: StopPolicy::default(),
            use_page_count: true,
            detail_concurrency: 1,
        }
    }
}

impl CrawlSettings {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputSettings {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    /// Directory of the daily-rotated log file
    pub log_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_path: PathBuf::from("data/imoscout.db"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UploadSettings {
    pub destination: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteSettings {
    /// Protocol, host and path prefix; the typology is appended to it
    pub base_url: String,
    /// Query fragment placed between the typology and the page number
    pub search: Option<String>,
    pub typologies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    crawl: CrawlSettings,
    #[serde(default)]
    output: OutputSettings,
    #[serde(default)]
    upload: UploadSettings,
    #[serde(default)]
    sites: BTreeMap<String, SiteSettings>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub crawl: CrawlSettings,
    pub output: OutputSettings,
    pub upload: UploadSettings,
    sites: HashMap<SiteKind, SiteSettings>,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;

        let mut sites = HashMap::new();
        for (key, settings) in raw.sites {
            let kind: SiteKind = key.parse()?;
            sites.insert(kind, settings);
        }

        let config = Self {
            crawl: raw.crawl,
            output: raw.output,
            upload: raw.upload,
            sites,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn site(&self, kind: SiteKind) -> Result<&SiteSettings> {
        self.sites
            .get(&kind)
            .ok_or_else(|| ScoutError::Config(format!("no [sites.{}] section configured", kind)))
    }

    pub fn sites(&self) -> impl Iterator<Item = (SiteKind, &SiteSettings)> {
        self.sites.iter().map(|(kind, settings)| (*kind, settings))
    }

    /// Applies overrides read from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(destination) = std::env::var(UPLOAD_DESTINATION_ENV) {
            if !destination.trim().is_empty() {
                debug!("Upload destination overridden from {}", UPLOAD_DESTINATION_ENV);
                self.upload.destination = Some(PathBuf::from(destination));
            }
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.crawl.start_page == 0 {
            return Err(ScoutError::Config("start-page must be at least 1".to_string()));
        }
        if self.crawl.max_pages == Some(0) {
            return Err(ScoutError::Config("max-pages must be at least 1".to_string()));
        }
        if self.crawl.detail_concurrency == 0 {
            return Err(ScoutError::Config(
                "detail-concurrency must be at least 1".to_string(),
            ));
        }

        for (kind, site) in &self.sites {
            let url = Url::parse(&site.base_url).map_err(|e| {
                ScoutError::Config(format!("invalid base-url for {}: {}", kind, e))
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ScoutError::Config(format!(
                    "base-url for {} must be http or https, got {}",
                    kind,
                    url.scheme()
                )));
            }
            if site.typologies.is_empty() {
                return Err(ScoutError::Config(format!(
                    "site {} needs at least one typology",
                    kind
                )));
            }
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}
