//! Headless Chromium as the HTML → PDF renderer.
//!
//! Every surface gets its own scratch directory and browser profile under the
//! session's scratch root, so concurrent renders never share browser state.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use super::{DocumentRenderer, RenderSession, RenderSurface};
use crate::config::RenderConfig;
use crate::error::{ConvertError, Result};

/// Binary names tried on `PATH` when no explicit path is configured.
const CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "msedge",
];

/// Flags passed to every invocation.
const BASE_ARGS: &[&str] = &[
    "--headless",
    "--disable-gpu",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-extensions",
    "--hide-scrollbars",
    "--no-pdf-header-footer",
];

/// Renderer backed by a Chromium-family browser binary.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl ChromiumRenderer {
    pub fn new(binary: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args,
        }
    }

    /// Use the configured binary, or the first known browser found on `PATH`.
    pub fn discover(config: &RenderConfig) -> Result<Self> {
        if let Some(path) = &config.chrome_path {
            if !path.is_file() {
                return Err(ConvertError::RendererUnavailable(format!(
                    "configured browser '{}' does not exist",
                    path.display()
                )));
            }
            return Ok(Self::new(path, config.extra_args.clone()));
        }

        CANDIDATES
            .iter()
            .find_map(|name| find_on_path(name))
            .map(|path| {
                debug!(binary = %path.display(), "Using browser from PATH");
                Self::new(path, config.extra_args.clone())
            })
            .ok_or_else(|| {
                ConvertError::RendererUnavailable(format!(
                    "no Chromium-based browser found on PATH (tried {}); set --chrome or render.chrome_path",
                    CANDIDATES.join(", ")
                ))
            })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl DocumentRenderer for ChromiumRenderer {
    async fn open_session(&self) -> Result<Arc<dyn RenderSession>> {
        let scratch = tempfile::Builder::new()
            .prefix("mboxpdf-")
            .tempdir()
            .map_err(|e| ConvertError::io(std::env::temp_dir(), e))?;
        debug!(scratch = %scratch.path().display(), "Opened render session");

        Ok(Arc::new(ChromiumSession {
            binary: self.binary.clone(),
            extra_args: self.extra_args.clone(),
            root: scratch.path().to_path_buf(),
            scratch: Mutex::new(Some(scratch)),
        }))
    }
}

struct ChromiumSession {
    binary: PathBuf,
    extra_args: Vec<String>,
    root: PathBuf,
    scratch: Mutex<Option<TempDir>>,
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn open_surface(&self) -> Result<Box<dyn RenderSurface>> {
        let dir = tempfile::Builder::new()
            .prefix("surface-")
            .tempdir_in(&self.root)
            .map_err(|e| ConvertError::io(&self.root, e))?;

        Ok(Box::new(ChromiumSurface {
            binary: self.binary.clone(),
            extra_args: self.extra_args.clone(),
            dir,
        }))
    }

    async fn close(&self) -> Result<()> {
        let scratch = self
            .scratch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(scratch) = scratch {
            let root = self.root.clone();
            tokio::task::spawn_blocking(move || scratch.close())
                .await?
                .map_err(|e| ConvertError::io(root, e))?;
        }
        Ok(())
    }
}

struct ChromiumSurface {
    binary: PathBuf,
    extra_args: Vec<String>,
    dir: TempDir,
}

#[async_trait]
impl RenderSurface for ChromiumSurface {
    async fn render_pdf(&mut self, html: &str, dest: &Path, timeout: Duration) -> Result<()> {
        let page = self.dir.path().join("message.html");
        tokio::fs::write(&page, html)
            .await
            .map_err(|e| ConvertError::io(&page, e))?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(BASE_ARGS)
            .arg(format!(
                "--user-data-dir={}",
                self.dir.path().join("profile").display()
            ))
            .arg(format!("--print-to-pdf={}", dest.display()))
            .args(&self.extra_args)
            .arg(&page)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Err(_) => return Err(ConvertError::RenderTimeout(timeout)),
            Ok(Err(e)) => {
                return Err(ConvertError::Render(format!(
                    "could not start '{}': {e}",
                    self.binary.display()
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(ConvertError::Render(format!(
                "browser exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        if !tokio::fs::try_exists(dest).await.unwrap_or(false) {
            return Err(ConvertError::Render(format!(
                "browser produced no file at '{}'",
                dest.display()
            )));
        }
        Ok(())
    }
}

/// Last few lines of the browser's stderr, for error messages.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(3);
    lines[start..].join(" | ")
}

/// Search `PATH` for an executable named `name`.
fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension("exe");
        exe.is_file().then_some(exe)
    })
}
