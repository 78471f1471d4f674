//! Per-message decision to render, and the render-and-optimize sequence.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::dedup::Classification;
use super::RunContext;
use crate::error::{ConvertError, Result};
use crate::export::attachment::write_attachments;
use crate::export::document::render_document;
use crate::model::mail::{Header, ParsedMessage};
use crate::render::RenderSession;

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// The PDF was rendered, optimized and moved into place.
    Rendered { attempts: u32 },
    /// Dry run: the message would have been rendered.
    DryRun,
    /// The PDF already existed and `force` was not set.
    SkippedExisting,
    /// Another message of this run already owns the output directory.
    SkippedDuplicate,
    /// Every attempt failed.
    Failed { attempts: u32 },
}

impl GateOutcome {
    /// Short tag for progress lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rendered { .. } => "new",
            Self::DryRun => "would render",
            Self::SkippedExisting => "exists",
            Self::SkippedDuplicate => "duplicate",
            Self::Failed { .. } => "FAILED",
        }
    }
}

/// `target_dir/basename.pdf`.
pub fn pdf_path(target_dir: &Path, basename: &str) -> PathBuf {
    target_dir.join(format!("{basename}.pdf"))
}

/// Where a render attempt writes before the final rename.
fn partial_path(target_dir: &Path, basename: &str) -> PathBuf {
    target_dir.join(format!(".{basename}.pdf.partial"))
}

/// Decide whether `msg` needs rendering and, if so, produce its outputs.
///
/// Only fatal errors are returned; per-message failures are logged and
/// reported as [`GateOutcome::Failed`].
pub async fn process(
    ctx: &RunContext,
    session: &dyn RenderSession,
    header: &Header,
    msg: &ParsedMessage,
    target_dir: &Path,
    classification: Classification,
) -> Result<GateOutcome> {
    let options = &ctx.options;

    if classification == Classification::ArchiveDuplicate {
        info!(
            basename = %header.basename,
            target = %target_dir.display(),
            "Duplicate message in archive, not rendering again"
        );
        return Ok(GateOutcome::SkippedDuplicate);
    }

    let pdf = pdf_path(target_dir, &header.basename);
    if !options.force && tokio::fs::try_exists(&pdf).await.unwrap_or(false) {
        debug!(path = %pdf.display(), "Output exists, skipping");
        ctx.stats.record_skipped_existing();
        return Ok(GateOutcome::SkippedExisting);
    }

    if options.dry_run {
        ctx.stats.record_rendered();
        return Ok(GateOutcome::DryRun);
    }

    if let Err(e) = tokio::fs::create_dir_all(target_dir).await {
        error!(
            basename = %header.basename,
            target = %target_dir.display(),
            error = %e,
            "Could not create output directory"
        );
        ctx.stats.record_failed();
        return Ok(GateOutcome::Failed { attempts: 0 });
    }

    write_attachments(target_dir, header, &msg.attachments, &ctx.stats).await;

    let html = render_document(header, msg);
    let (attempts, result) = render_with_retry(ctx, session, &html, target_dir, header).await;
    match result {
        Ok(()) => {
            ctx.stats.record_rendered();
            Ok(GateOutcome::Rendered { attempts })
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            error!(
                basename = %header.basename,
                from = %header.from,
                date = %header.date,
                attempts,
                error = %e,
                "Giving up on message"
            );
            ctx.stats.record_failed();
            Ok(GateOutcome::Failed { attempts })
        }
    }
}

/// Run the render-and-optimize pair until it succeeds or the budget is spent.
///
/// Returns the number of attempts made and the last result.
async fn render_with_retry(
    ctx: &RunContext,
    session: &dyn RenderSession,
    html: &str,
    target_dir: &Path,
    header: &Header,
) -> (u32, Result<()>) {
    let max_attempts = ctx.options.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = render_once(ctx, session, html, target_dir, &header.basename).await;
        match result {
            Ok(()) => return (attempt, Ok(())),
            Err(e) if e.is_fatal() || attempt >= max_attempts => return (attempt, Err(e)),
            Err(e) => {
                warn!(
                    basename = %header.basename,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Render attempt failed, retrying"
                );
                tokio::time::sleep(ctx.options.retry_backoff).await;
            }
        }
    }
}

/// One full attempt: render to a partial file, optimize it, rename into place.
///
/// The final path is only ever written by the rename, so a failed attempt
/// never leaves something that looks finished.
async fn render_once(
    ctx: &RunContext,
    session: &dyn RenderSession,
    html: &str,
    target_dir: &Path,
    basename: &str,
) -> Result<()> {
    let partial = partial_path(target_dir, basename);
    let pdf = pdf_path(target_dir, basename);

    let result = async {
        let mut surface = session.open_surface().await?;
        surface
            .render_pdf(html, &partial, ctx.options.render_timeout)
            .await?;
        drop(surface);

        let optimizer = ctx.optimizer.clone();
        let staged = partial.clone();
        let bytes = tokio::task::spawn_blocking(move || optimizer.optimize(&staged)).await??;

        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| ConvertError::io(&partial, e))?;
        tokio::fs::rename(&partial, &pdf)
            .await
            .map_err(|e| ConvertError::io(&pdf, e))?;
        Ok::<(), ConvertError>(())
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let dir = Path::new("out/2024-01-01-10.00.00 - Hi");
        assert_eq!(
            pdf_path(dir, "2024-01-01-10.00.00 - Hi"),
            Path::new("out/2024-01-01-10.00.00 - Hi/2024-01-01-10.00.00 - Hi.pdf")
        );
        assert_eq!(
            partial_path(dir, "x"),
            Path::new("out/2024-01-01-10.00.00 - Hi/.x.pdf.partial")
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(GateOutcome::Rendered { attempts: 1 }.label(), "new");
        assert_eq!(GateOutcome::Failed { attempts: 3 }.label(), "FAILED");
    }
}
