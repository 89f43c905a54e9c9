//! Explicit timing of pipeline stages.
//!
//! Callers wrap the operations they care about in [`MetricsRecorder::measure`]
//! (or drive a [`ScopedTimer`] by hand); each measurement is written as one
//! JSON file under `{data_dir}/metrics`.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::future::Future;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub succeeded: bool,
}

#[derive(Debug)]
pub struct ScopedTimer {
    operation: String,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl ScopedTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    pub fn finish(self, succeeded: bool) -> MetricsRecord {
        MetricsRecord {
            operation: self.operation,
            started_at: self.started_at,
            elapsed_seconds: self.start.elapsed().as_secs_f64(),
            succeeded,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    dir: PathBuf,
}

impl MetricsRecorder {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("metrics"),
        }
    }

    pub fn write(&self, record: &MetricsRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!(
            "{}_metrics_{}.json",
            record.operation,
            record.started_at.format("%Y%m%d%H%M%S%3f")
        ));

        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, record)?;
        Ok(path)
    }

    /// Runs `operation`, then records how long it took and whether it succeeded.
    /// A metrics write failure is logged and never masks the operation's result.
    pub async fn measure<F, T, E>(&self, operation: &str, fut: F) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
    {
        self.measure_outcome(operation, fut, |outcome| outcome.is_ok())
            .await
    }

    /// Like [`measure`](Self::measure) for operations that always return a
    /// value; `succeeded` decides from that value how the run is recorded.
    pub async fn measure_outcome<F, T, P>(&self, operation: &str, fut: F, succeeded: P) -> T
    where
        F: Future<Output = T>,
        P: FnOnce(&T) -> bool,
    {
        let timer = ScopedTimer::start(operation);
        let outcome = fut.await;
        let record = timer.finish(succeeded(&outcome));

        info!(
            "{} finished in {:.2}s (ok: {})",
            record.operation, record.elapsed_seconds, record.succeeded
        );
        if let Err(e) = self.write(&record) {
            warn!("Failed to write metrics for {}: {}", operation, e);
        }

        outcome
    }
}
