//! File sinks for crawl output: the raw title -> link mapping as JSON and the
//! enriched table as CSV.

use crate::{DedupedListing, EnrichedRecord, Result, KNOWN_ATTRIBUTES};
use chrono::Utc;
use csv::Writer;
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

const BASE_COLUMNS: &[&str] = &[
    "title",
    "url",
    "full_address",
    "price",
    "price_per_area",
    "city",
    "region",
];

fn timestamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Keeps a typology such as `apartamento/lisboa` usable inside a file name.
fn file_label(site: &str, typology: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect::<String>()
            .trim_matches('_')
            .to_string()
    };
    format!("{}_{}", clean(site), clean(typology))
}

#[derive(Debug, Clone)]
pub struct JsonSink {
    dir: PathBuf,
}

impl JsonSink {
    /// Files land in `{data_dir}/raw`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("raw"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_raw(
        &self,
        site: &str,
        typology: &str,
        listings: &[DedupedListing],
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("{}_{}.json", file_label(site, typology), timestamp()));

        let mapping: IndexMap<&str, &str> = listings
            .iter()
            .map(|listing| (listing.title.as_str(), listing.link.as_str()))
            .collect();

        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &mapping)?;

        info!("Saved {} listings to {}", listings.len(), path.display());
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    /// Files land in `{data_dir}/processed`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("processed"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_processed(
        &self,
        site: &str,
        typology: &str,
        records: &[EnrichedRecord],
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("{}_{}.csv", file_label(site, typology), timestamp()));
        Self::write_records(&path, records)?;

        info!("Saved {} records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Writes the fixed-schema table; missing values become empty cells.
    pub fn write_records(path: &Path, records: &[EnrichedRecord]) -> Result<()> {
        let mut writer = Writer::from_path(path)?;
        writer.write_record(BASE_COLUMNS.iter().chain(KNOWN_ATTRIBUTES.iter()))?;

        for record in records {
            let opt = |value: &Option<String>| value.clone().unwrap_or_default();
            let mut row = vec![
                record.title.clone(),
                record.link.to_string(),
                opt(&record.full_address),
                opt(&record.price),
                opt(&record.price_per_area),
                opt(&record.city),
                opt(&record.region),
            ];
            row.extend(
                KNOWN_ATTRIBUTES
                    .iter()
                    .map(|label| record.attribute(label).unwrap_or_default().to_string()),
            );
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}
