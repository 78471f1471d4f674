//! Input discovery: a single archive, or every file under a directory tree.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// One archive and the directory its messages are written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
}

/// Result of walking the input.
///
/// An empty `archives` list with an empty `unreadable` list means the input
/// was genuinely empty; anything that could not be read is listed separately.
#[derive(Debug, Default)]
pub struct Discovery {
    pub archives: Vec<ArchiveEntry>,
    /// Paths that could not be read, with the reason.
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Resolve `input` into archive entries.
///
/// A file maps to `output_dir/<file name>`. A directory is mirrored: each
/// sub-directory becomes a path component under `output_dir` and each file
/// becomes an entry. Entries are visited in name order. Files whose extension
/// is listed in `skip_extensions` (case-insensitive, no dot) are ignored.
pub fn discover_archives(input: &Path, output_dir: &Path, skip_extensions: &[String]) -> Discovery {
    let mut discovery = Discovery::default();

    let metadata = match std::fs::metadata(input) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %input.display(), error = %e, "Input is not accessible");
            discovery
                .unreadable
                .push((input.to_path_buf(), e.to_string()));
            return discovery;
        }
    };

    if metadata.is_dir() {
        walk_dir(input, output_dir, skip_extensions, &mut discovery);
    } else if let Some(name) = input.file_name() {
        discovery.archives.push(ArchiveEntry {
            input_path: input.to_path_buf(),
            output_dir: output_dir.join(name),
        });
    }
    discovery
}

fn walk_dir(dir: &Path, output_dir: &Path, skip_extensions: &[String], out: &mut Discovery) {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(r) => r,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Cannot list directory, skipping");
            out.unreadable.push((dir.to_path_buf(), e.to_string()));
            return;
        }
    };

    let mut children = Vec::new();
    for entry in read_dir {
        match entry {
            Ok(entry) => children.push(entry.path()),
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Cannot read directory entry");
                out.unreadable.push((dir.to_path_buf(), e.to_string()));
            }
        }
    }
    children.sort();

    for child in children {
        let Some(name) = child.file_name() else {
            continue;
        };
        let target = output_dir.join(name);
        // Follows symlinks, like a plain open would.
        match std::fs::metadata(&child) {
            Ok(m) if m.is_dir() => walk_dir(&child, &target, skip_extensions, out),
            Ok(_) if is_skipped(&child, skip_extensions) => {
                debug!(path = %child.display(), "Skipping by extension");
            }
            Ok(_) => out.archives.push(ArchiveEntry {
                input_path: child,
                output_dir: target,
            }),
            Err(e) => {
                warn!(path = %child.display(), error = %e, "Cannot stat entry, skipping");
                out.unreadable.push((child, e.to_string()));
            }
        }
    }
}

fn is_skipped(path: &Path, skip_extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    skip_extensions
        .iter()
        .any(|skip| skip.trim_start_matches('.').eq_ignore_ascii_case(ext))
}
