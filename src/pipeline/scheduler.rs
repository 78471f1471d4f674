//! Per-archive scheduling of message tasks.
//!
//! The scanner runs on a blocking thread and feeds a bounded channel. Each
//! message is parsed, named and classified in archive order, then handed to
//! the gate. In parallel mode a semaphore caps the gate tasks in flight; they
//! are launched in archive order and may finish in any order.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::dedup::Classification;
use super::gate::{self, GateOutcome};
use super::progress::ArchiveProgress;
use super::walker::ArchiveEntry;
use super::{Mode, RunContext};
use crate::error::{ConvertError, Result};
use crate::export::naming::derive_header;
use crate::model::mail::{Header, MboxRecord, ParsedMessage};
use crate::parser::mbox::MboxScanner;
use crate::parser::message::parse_message;
use crate::render::RenderSession;

/// Records buffered between the scanner thread and the scheduler.
const CHANNEL_CAPACITY: usize = 16;

/// Result of one message task.
#[derive(Debug, Clone)]
pub struct MessageOutcome {
    pub header: Header,
    pub outcome: GateOutcome,
}

/// A message that has been parsed, named and classified, ready for the gate.
pub struct PreparedMessage {
    header: Header,
    msg: ParsedMessage,
    target_dir: PathBuf,
    classification: Classification,
    sequence: u64,
}

/// Parse, name and classify one record.
///
/// Called in archive order so that the first of several messages sharing an
/// output directory is the one classified [`Classification::Fresh`].
pub async fn prepare_message(
    ctx: &RunContext,
    archive: &ArchiveEntry,
    record: MboxRecord,
) -> Result<PreparedMessage> {
    ctx.stats.record_seen();
    let sequence = record.sequence;

    let msg = tokio::task::spawn_blocking(move || parse_message(&record.contents)).await?;
    let header = derive_header(&msg)?;
    let target_dir = archive.output_dir.join(&header.basename);

    let classification = ctx.dedup.classify(
        &target_dir,
        &header.basename,
        &archive.input_path,
        &ctx.stats,
    );
    if classification == Classification::BasenameCollision {
        debug!(
            basename = %header.basename,
            archive = %archive.input_path.display(),
            "Basename already produced from another location"
        );
    }

    Ok(PreparedMessage {
        header,
        msg,
        target_dir,
        classification,
        sequence,
    })
}

/// Run the gate for a prepared message. Only fatal errors are returned.
pub async fn finish_message(
    ctx: Arc<RunContext>,
    session: Arc<dyn RenderSession>,
    prepared: PreparedMessage,
) -> Result<MessageOutcome> {
    let PreparedMessage {
        header,
        msg,
        target_dir,
        classification,
        sequence,
    } = prepared;

    let outcome = gate::process(
        &ctx,
        session.as_ref(),
        &header,
        &msg,
        &target_dir,
        classification,
    )
    .await?;
    debug!(sequence, basename = %header.basename, outcome = outcome.label(), "Message done");

    Ok(MessageOutcome { header, outcome })
}

/// Handle one message from raw record to final outcome.
///
/// Only fatal errors are returned.
pub async fn process_message(
    ctx: Arc<RunContext>,
    session: Arc<dyn RenderSession>,
    archive: Arc<ArchiveEntry>,
    record: MboxRecord,
) -> Result<MessageOutcome> {
    let prepared = prepare_message(&ctx, &archive, record).await?;
    finish_message(ctx, session, prepared).await
}

/// Convert every message of one archive. Returns the number of messages
/// admitted.
///
/// An archive that cannot be opened contributes nothing. A scanner error
/// mid-archive stops reading that archive but lets admitted tasks finish.
/// A fatal task error stops admission, drains in-flight tasks, and is
/// returned.
pub async fn convert_archive(
    ctx: Arc<RunContext>,
    session: Arc<dyn RenderSession>,
    entry: ArchiveEntry,
) -> Result<u64> {
    let scanner = match MboxScanner::open(&entry.input_path) {
        Ok(s) => s,
        Err(e) => {
            warn!(
                path = %entry.input_path.display(),
                error = %e,
                "Cannot open archive, skipping"
            );
            return Ok(0);
        }
    };

    let progress = ArchiveProgress::new(&entry.input_path, ctx.options.show_progress);
    let result = run_archive(ctx, session, entry, scanner, &progress).await;
    progress.finish();
    result
}

/// Feed one opened archive through the scheduler, reporting each finished
/// message on `progress`.
async fn run_archive<R>(
    ctx: Arc<RunContext>,
    session: Arc<dyn RenderSession>,
    entry: ArchiveEntry,
    scanner: MboxScanner<R>,
    progress: &ArchiveProgress,
) -> Result<u64>
where
    R: std::io::BufRead + Send + 'static,
{
    let archive = Arc::new(entry);
    let (tx, mut rx) = mpsc::channel::<Result<MboxRecord>>(CHANNEL_CAPACITY);
    let reader = tokio::task::spawn_blocking(move || {
        for item in scanner {
            let stop = item.is_err();
            if tx.blocking_send(item).is_err() || stop {
                break;
            }
        }
    });

    let mut fatal: Option<ConvertError> = None;
    let mut admitted = 0u64;

    match ctx.options.mode {
        Mode::Sequential => {
            while let Some(record) = next_record(&mut rx, &archive).await {
                admitted += 1;
                let result =
                    process_message(ctx.clone(), session.clone(), archive.clone(), record).await;
                settle(&ctx, progress, result, &mut fatal);
                if fatal.is_some() {
                    break;
                }
            }
        }
        Mode::Parallel { max_in_flight } => {
            let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
            let mut tasks = JoinSet::new();

            while fatal.is_none() {
                tokio::select! {
                    biased;

                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        settle(&ctx, progress, flatten(joined), &mut fatal);
                    }
                    permit = semaphore.clone().acquire_owned() => {
                        let Ok(permit) = permit else {
                            break;
                        };
                        let Some(record) = next_record(&mut rx, &archive).await else {
                            break;
                        };
                        admitted += 1;

                        // Dedup slots are claimed here, in archive order; only
                        // the gate runs concurrently.
                        let prepared = prepare_message(&ctx, &archive, record).await;
                        while let Some(joined) = tasks.try_join_next() {
                            settle(&ctx, progress, flatten(joined), &mut fatal);
                        }
                        let prepared = match prepared {
                            Ok(p) => p,
                            Err(e) => {
                                settle(&ctx, progress, Err(e), &mut fatal);
                                continue;
                            }
                        };
                        if fatal.is_some() {
                            break;
                        }

                        let ctx = ctx.clone();
                        let session = session.clone();
                        tasks.spawn(async move {
                            let _permit = permit;
                            finish_message(ctx, session, prepared).await
                        });
                    }
                }
            }

            while let Some(joined) = tasks.join_next().await {
                settle(&ctx, progress, flatten(joined), &mut fatal);
            }
        }
    }

    // Unblocks the scanner thread if we stopped early.
    drop(rx);
    if let Err(e) = reader.await {
        warn!(path = %archive.input_path.display(), error = %e, "Scanner thread failed");
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(admitted),
    }
}

/// Next record from the scanner, or `None` at end of archive or on a scan error.
async fn next_record(
    rx: &mut mpsc::Receiver<Result<MboxRecord>>,
    archive: &ArchiveEntry,
) -> Option<MboxRecord> {
    match rx.recv().await? {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(
                path = %archive.input_path.display(),
                error = %e,
                "Archive read failed, stopping this archive"
            );
            None
        }
    }
}

fn flatten(
    joined: std::result::Result<Result<MessageOutcome>, tokio::task::JoinError>,
) -> Result<MessageOutcome> {
    joined.map_err(ConvertError::from).and_then(|r| r)
}

/// Fold one finished task into progress and the fatal slot.
fn settle(
    ctx: &RunContext,
    progress: &ArchiveProgress,
    result: Result<MessageOutcome>,
    fatal: &mut Option<ConvertError>,
) {
    match result {
        Ok(outcome) => progress.report(&outcome),
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Fatal error, stopping run");
            fatal.get_or_insert(e);
        }
        Err(e) => {
            error!(error = %e, "Message task failed");
            ctx.stats.record_failed();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::pipeline::ConvertOptions;
    use crate::render::{DocumentRenderer, LopdfOptimizer, NullRenderer};

    fn archive_bytes(subjects: &[&str]) -> Vec<u8> {
        subjects
            .iter()
            .map(|subject| {
                format!(
                    "From a@example.com Mon Jan  1 10:00:00 2024\n\
Subject: {subject}\n\
Date: Mon, 01 Jan 2024 10:00:00 +0000\n\
\n\
body\n\
\n"
                )
            })
            .collect::<String>()
            .into_bytes()
    }

    async fn run_dry(subjects: &[&str], mode: Mode) -> (u64, u64, Vec<(PathBuf, Vec<String>)>) {
        let options = ConvertOptions {
            dry_run: true,
            mode,
            ..ConvertOptions::default()
        };
        let ctx = Arc::new(RunContext::new(options, Arc::new(LopdfOptimizer)));
        let session = NullRenderer.open_session().await.unwrap();
        let entry = ArchiveEntry {
            input_path: PathBuf::from("Inbox"),
            output_dir: PathBuf::from("out/Inbox"),
        };
        let scanner = MboxScanner::new(std::io::Cursor::new(archive_bytes(subjects)), "Inbox");
        let progress = ArchiveProgress::new(Path::new("Inbox"), false);

        let admitted = run_archive(ctx.clone(), session, entry, scanner, &progress)
            .await
            .unwrap();
        let duplicates = ctx.stats.duplicates().into_iter().collect();
        (admitted, progress.done(), duplicates)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_completion_is_reported() {
        let subjects: Vec<String> = (0..12).map(|i| format!("m{i}")).collect();
        let subjects: Vec<&str> = subjects.iter().map(String::as_str).collect();
        let (admitted, reported, _) =
            run_dry(&subjects, Mode::Parallel { max_in_flight: 3 }).await;
        assert_eq!(admitted, 12);
        assert_eq!(reported, 12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicates_classified_in_archive_order() {
        let (_, reported, duplicates) = run_dry(
            &["Hi", "Other", "Hi", "Hi"],
            Mode::Parallel { max_in_flight: 4 },
        )
        .await;
        assert_eq!(reported, 4);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].0, PathBuf::from("Inbox"));
        assert_eq!(duplicates[0].1.len(), 2);
    }
}
