//! Document rendering: HTML → paginated PDF, then PDF normalization.
//!
//! A [`DocumentRenderer`] opens one [`RenderSession`] per archive. The session
//! is shared by every in-flight message task of that archive; each task asks
//! it for its own [`RenderSurface`], so concurrent renders never share state.

pub mod chromium;
pub mod optimize;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ConvertError, Result};

pub use chromium::ChromiumRenderer;
pub use optimize::LopdfOptimizer;

/// Factory for per-archive render sessions.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Open the shared handle used for one archive.
    async fn open_session(&self) -> Result<Arc<dyn RenderSession>>;
}

/// Shared per-archive renderer handle.
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Obtain an isolated surface for one message.
    async fn open_surface(&self) -> Result<Box<dyn RenderSurface>>;

    /// Release the session. Called once, after the archive's last task.
    async fn close(&self) -> Result<()>;
}

/// One isolated rendering context.
#[async_trait]
pub trait RenderSurface: Send {
    /// Render `html` as a PDF written to `dest`, giving up after `timeout`.
    async fn render_pdf(&mut self, html: &str, dest: &Path, timeout: Duration) -> Result<()>;
}

/// Rewrites a rendered PDF into a normalized, compacted form.
pub trait DocumentOptimizer: Send + Sync {
    /// Reload the document at `path` and return its optimized bytes.
    fn optimize(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Renderer used in dry-run mode: sessions open, but no surface ever does.
#[derive(Debug, Default)]
pub struct NullRenderer;

#[async_trait]
impl DocumentRenderer for NullRenderer {
    async fn open_session(&self) -> Result<Arc<dyn RenderSession>> {
        Ok(Arc::new(NullRenderer))
    }
}

#[async_trait]
impl RenderSession for NullRenderer {
    async fn open_surface(&self) -> Result<Box<dyn RenderSurface>> {
        Err(ConvertError::RendererUnavailable(
            "no renderer configured (dry run)".into(),
        ))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
