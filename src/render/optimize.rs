//! PDF post-processing with `lopdf`.

use std::path::Path;

use lopdf::Document;
use tracing::debug;

use super::DocumentOptimizer;
use crate::error::{ConvertError, Result};

/// Reloads a PDF, drops unreferenced objects and empty streams, renumbers,
/// compresses, and serializes it again.
#[derive(Debug, Clone, Default)]
pub struct LopdfOptimizer;

impl DocumentOptimizer for LopdfOptimizer {
    fn optimize(&self, path: &Path) -> Result<Vec<u8>> {
        let mut doc = Document::load(path)
            .map_err(|e| ConvertError::Optimize(format!("{}: {e}", path.display())))?;

        let before = doc.objects.len();
        doc.prune_objects();
        doc.delete_zero_length_streams();
        doc.renumber_objects();
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| ConvertError::Optimize(format!("{}: {e}", path.display())))?;

        debug!(
            path = %path.display(),
            objects_before = before,
            objects_after = doc.objects.len(),
            size = bytes.len(),
            "Optimized PDF"
        );
        Ok(bytes)
    }
}
