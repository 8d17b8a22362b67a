//! Detached archiving of validated input rows
//!
//! Tables handed to [`RowArchive::submit`] are written by a background worker.
//! The caller never waits and never sees a write failure.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::thread;

use chrono::Utc;
use polars::prelude::*;

use crate::error::Result;
use crate::pipeline::loader::save_dataframe;

struct ArchiveJob {
    label: String,
    frame: DataFrame,
}

/// Handle to the archive worker
#[derive(Debug, Clone)]
pub struct RowArchive {
    dir: PathBuf,
    sender: Sender<ArchiveJob>,
}

impl RowArchive {
    /// Start the worker. It runs until every handle has been dropped.
    pub fn spawn(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let (sender, receiver) = channel::<ArchiveJob>();
        let worker_dir = dir.clone();
        thread::Builder::new()
            .name("row-archive".to_string())
            .spawn(move || {
                for (seq, job) in receiver.into_iter().enumerate() {
                    if let Err(e) = write_job(&worker_dir, job, seq) {
                        tracing::warn!(error = %e, "row archive write failed");
                    }
                }
            })?;

        Ok(Self { dir, sender })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queue a copy of `df` for archiving and return immediately
    pub fn submit(&self, label: &str, df: &DataFrame) {
        let job = ArchiveJob {
            label: sanitize(label),
            frame: df.clone(),
        };
        if self.sender.send(job).is_err() {
            tracing::warn!(label, "row archive worker is gone, rows not archived");
        }
    }
}

/// Jobs land in `<label>_<timestamp>_<seq>.csv`; the worker's sequence number
/// keeps same-millisecond jobs apart
fn write_job(dir: &Path, mut job: ArchiveJob, seq: usize) -> Result<()> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
    let path = dir.join(format!("{}_{}_{:06}.csv", job.label, stamp, seq));
    save_dataframe(&mut job.frame, &path)?;
    tracing::debug!(path = %path.display(), rows = job.frame.height(), "rows archived");
    Ok(())
}

/// Keep labels usable as file name prefixes
fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "rows".to_string()
    } else {
        cleaned
    }
}
