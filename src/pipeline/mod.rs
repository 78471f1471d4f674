//! Conversion orchestration: archives in, per-message PDFs and attachments out.
//!
//! A [`Converter`] walks a list of [`walker::ArchiveEntry`] values. For each
//! archive it opens one render session, hands every message to the
//! [`scheduler`], and closes the session once the last task is done. All
//! run-wide state lives in a [`RunContext`] shared by the tasks.

pub mod dedup;
pub mod gate;
pub mod progress;
pub mod scheduler;
pub mod stats;
pub mod walker;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::render::{DocumentOptimizer, DocumentRenderer};

use dedup::DedupTracker;
use stats::{RunReport, RunStats};
use walker::ArchiveEntry;

/// How message tasks of one archive are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One message at a time, in archive order.
    Sequential,
    /// Up to `max_in_flight` messages at once.
    Parallel { max_in_flight: usize },
}

/// Run-wide switches.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Re-render even when the PDF already exists.
    pub force: bool,
    /// Decide and count, but write nothing.
    pub dry_run: bool,
    pub mode: Mode,
    /// Limit for a single render call.
    pub render_timeout: Duration,
    /// Attempts per message, including the first.
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    /// Draw a per-archive progress line on stderr.
    pub show_progress: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ConvertOptions {
    /// Options taken from the config file; CLI flags are applied on top.
    pub fn from_config(config: &Config) -> Self {
        Self {
            force: false,
            dry_run: false,
            mode: Mode::Parallel {
                max_in_flight: config.pipeline.max_in_flight.max(1),
            },
            render_timeout: config.render.timeout(),
            max_attempts: config.render.max_attempts.max(1),
            retry_backoff: config.render.retry_backoff(),
            show_progress: false,
        }
    }
}

/// State shared by every message task of a run.
pub struct RunContext {
    pub options: ConvertOptions,
    pub dedup: DedupTracker,
    pub stats: RunStats,
    pub optimizer: Arc<dyn DocumentOptimizer>,
}

impl RunContext {
    pub fn new(options: ConvertOptions, optimizer: Arc<dyn DocumentOptimizer>) -> Self {
        Self {
            options,
            dedup: DedupTracker::default(),
            stats: RunStats::default(),
            optimizer,
        }
    }
}

/// Drives a whole run over a list of archives.
pub struct Converter {
    ctx: Arc<RunContext>,
    renderer: Arc<dyn DocumentRenderer>,
}

impl Converter {
    pub fn new(
        options: ConvertOptions,
        renderer: Arc<dyn DocumentRenderer>,
        optimizer: Arc<dyn DocumentOptimizer>,
    ) -> Self {
        Self {
            ctx: Arc::new(RunContext::new(options, optimizer)),
            renderer,
        }
    }

    /// Convert every archive in order and return the run summary.
    ///
    /// Archives are processed one after another; parallelism applies to the
    /// messages inside an archive. A fatal error stops the run after the
    /// current archive's in-flight tasks have drained. An archive whose
    /// render session cannot be opened for a non-fatal reason is skipped.
    pub async fn run(&self, archives: &[ArchiveEntry]) -> Result<RunReport> {
        for entry in archives {
            info!(
                input = %entry.input_path.display(),
                output = %entry.output_dir.display(),
                "Converting archive"
            );
            let session = match self.renderer.open_session().await {
                Ok(session) => session,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        input = %entry.input_path.display(),
                        error = %e,
                        "Could not open render session, skipping archive"
                    );
                    continue;
                }
            };
            let result =
                scheduler::convert_archive(self.ctx.clone(), session.clone(), entry.clone()).await;
            if let Err(e) = session.close().await {
                warn!(
                    input = %entry.input_path.display(),
                    error = %e,
                    "Failed to close render session"
                );
            }
            let messages = result?;
            info!(input = %entry.input_path.display(), messages, "Archive done");
        }
        Ok(self.report())
    }

    /// Summary of everything recorded so far.
    pub fn report(&self) -> RunReport {
        RunReport::build(&self.ctx.stats, &self.ctx.dedup)
    }

    pub fn stats(&self) -> &RunStats {
        &self.ctx.stats
    }

    pub fn dedup(&self) -> &DedupTracker {
        &self.ctx.dedup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.pipeline.max_in_flight = 0;
        config.render.max_attempts = 0;
        config.render.retry_backoff_ms = 20;

        let options = ConvertOptions::from_config(&config);
        assert_eq!(options.mode, Mode::Parallel { max_in_flight: 1 });
        assert_eq!(options.max_attempts, 1);
        assert_eq!(options.retry_backoff, Duration::from_millis(20));
        assert!(!options.force);
        assert!(!options.dry_run);
    }

    #[test]
    fn test_default_options_are_parallel_five() {
        let options = ConvertOptions::default();
        assert_eq!(options.mode, Mode::Parallel { max_in_flight: 5 });
        assert_eq!(options.render_timeout, Duration::from_secs(600));
        assert_eq!(options.max_attempts, 3);
    }
}
