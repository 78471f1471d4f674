//! Run-wide counters and the end-of-run summary.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use humansize::{format_size, BINARY};
use serde::Serialize;

use super::dedup::DedupTracker;

/// Archives with at least this many duplicates are listed without examples.
const DUPLICATE_EXAMPLE_LIMIT: usize = 10;

/// Counters shared by every message task of a run.
#[derive(Debug, Default)]
pub struct RunStats {
    total_seen: AtomicU64,
    rendered: AtomicU64,
    skipped_existing: AtomicU64,
    failed: AtomicU64,
    attachments_written: AtomicU64,
    attachment_bytes: AtomicU64,
    duplicates: Mutex<BTreeMap<PathBuf, Vec<String>>>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_seen: u64,
    pub rendered: u64,
    pub skipped_existing: u64,
    pub failed: u64,
    pub attachments_written: u64,
    pub attachment_bytes: u64,
}

impl RunStats {
    pub fn record_seen(&self) {
        self.total_seen.fetch_add(1, Ordering::Relaxed);
    }

    /// A message was newly rendered (or would have been, in dry-run mode).
    pub fn record_rendered(&self) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_existing(&self) {
        self.skipped_existing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attachment(&self, bytes: u64) {
        self.attachments_written.fetch_add(1, Ordering::Relaxed);
        self.attachment_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Register a same-archive duplicate basename.
    pub fn record_duplicate(&self, archive: &Path, basename: &str) {
        let mut duplicates = self
            .duplicates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        duplicates
            .entry(archive.to_path_buf())
            .or_default()
            .push(basename.to_string());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_seen: self.total_seen.load(Ordering::Relaxed),
            rendered: self.rendered.load(Ordering::Relaxed),
            skipped_existing: self.skipped_existing.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            attachments_written: self.attachments_written.load(Ordering::Relaxed),
            attachment_bytes: self.attachment_bytes.load(Ordering::Relaxed),
        }
    }

    /// Duplicate registry, keyed by source archive.
    pub fn duplicates(&self) -> BTreeMap<PathBuf, Vec<String>> {
        self.duplicates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Duplicates found inside one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveDuplicates {
    pub archive: PathBuf,
    pub count: usize,
    /// All duplicate basenames when there are fewer than ten, else empty.
    pub examples: Vec<String>,
}

/// One basename that maps to several output directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasenameCollision {
    pub basename: String,
    pub targets: Vec<PathBuf>,
}

/// End-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub duplicates: Vec<ArchiveDuplicates>,
    pub collisions: Vec<BasenameCollision>,
}

impl RunReport {
    pub fn build(stats: &RunStats, dedup: &DedupTracker) -> Self {
        let duplicates = stats
            .duplicates()
            .into_iter()
            .map(|(archive, basenames)| {
                let count = basenames.len();
                let examples = if count < DUPLICATE_EXAMPLE_LIMIT {
                    basenames
                } else {
                    Vec::new()
                };
                ArchiveDuplicates {
                    archive,
                    count,
                    examples,
                }
            })
            .collect();

        let collisions = dedup
            .collisions()
            .into_iter()
            .map(|(basename, targets)| BasenameCollision { basename, targets })
            .collect();

        Self {
            stats: stats.snapshot(),
            duplicates,
            collisions,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f)?;
        writeln!(f, "  {:<25} {}", "Total messages", s.total_seen)?;
        writeln!(f, "  {:<25} {}", "Newly rendered", s.rendered)?;
        writeln!(f, "  {:<25} {}", "Already present", s.skipped_existing)?;
        if s.failed > 0 {
            writeln!(f, "  {:<25} {}", "Failed to render", s.failed)?;
        }
        writeln!(
            f,
            "  {:<25} {} ({})",
            "Attachments written",
            s.attachments_written,
            format_size(s.attachment_bytes, BINARY)
        )?;

        if !self.duplicates.is_empty() {
            writeln!(f)?;
            writeln!(f, "  Duplicates within an archive:")?;
            for dup in &self.duplicates {
                writeln!(f, "    {:>6}  {}", dup.count, dup.archive.display())?;
                for example in &dup.examples {
                    writeln!(f, "            - {example}")?;
                }
            }
        }

        writeln!(f)?;
        writeln!(
            f,
            "  {:<25} {}",
            "Basename collisions",
            self.collisions.len()
        )?;
        for collision in &self.collisions {
            writeln!(f, "    {}", collision.basename)?;
            for target in &collision.targets {
                writeln!(f, "            - {}", target.display())?;
            }
        }
        Ok(())
    }
}
