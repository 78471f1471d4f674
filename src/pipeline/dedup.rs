//! Per-run duplicate detection on output directories and basenames.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::stats::RunStats;

/// How a message's output location relates to earlier messages of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// First message to use this directory and basename.
    Fresh,
    /// Another message already claimed this exact output directory.
    ArchiveDuplicate,
    /// The basename was already produced under a different output directory.
    BasenameCollision,
}

#[derive(Debug, Default)]
struct DedupState {
    target_dir_seen: HashSet<PathBuf>,
    basename_to_targets: HashMap<String, Vec<PathBuf>>,
    /// Basenames in first-seen order, so reports are stable.
    order: Vec<String>,
}

/// Records every output directory and basename seen during one run.
#[derive(Debug, Default)]
pub struct DedupTracker {
    state: Mutex<DedupState>,
}

impl DedupTracker {
    /// Classify a message and record it. Safe to call for every message,
    /// including ones whose rendering is later skipped.
    pub fn classify(
        &self,
        target_dir: &Path,
        basename: &str,
        source_archive: &Path,
        stats: &RunStats,
    ) -> Classification {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let classification = if state.target_dir_seen.contains(target_dir) {
            stats.record_duplicate(source_archive, basename);
            Classification::ArchiveDuplicate
        } else {
            state.target_dir_seen.insert(target_dir.to_path_buf());
            let elsewhere = state
                .basename_to_targets
                .get(basename)
                .is_some_and(|targets| targets.iter().any(|t| t != target_dir));
            if elsewhere {
                Classification::BasenameCollision
            } else {
                Classification::Fresh
            }
        };

        if !state.basename_to_targets.contains_key(basename) {
            state.order.push(basename.to_string());
        }
        state
            .basename_to_targets
            .entry(basename.to_string())
            .or_default()
            .push(target_dir.to_path_buf());

        classification
    }

    /// Basenames recorded under two or more distinct directories, with every
    /// directory recorded for them.
    pub fn collisions(&self) -> Vec<(String, Vec<PathBuf>)> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        state
            .order
            .iter()
            .filter_map(|basename| {
                let targets = state.basename_to_targets.get(basename)?;
                let distinct: HashSet<&PathBuf> = targets.iter().collect();
                (distinct.len() >= 2).then(|| (basename.clone(), targets.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_target_is_archive_duplicate() {
        let tracker = DedupTracker::default();
        let stats = RunStats::default();
        let archive = Path::new("Inbox");
        let dir = Path::new("out/Inbox/2024-01-01-10.00.00 - Hi");

        assert_eq!(
            tracker.classify(dir, "2024-01-01-10.00.00 - Hi", archive, &stats),
            Classification::Fresh
        );
        assert_eq!(
            tracker.classify(dir, "2024-01-01-10.00.00 - Hi", archive, &stats),
            Classification::ArchiveDuplicate
        );

        let duplicates = stats.duplicates();
        assert_eq!(duplicates[archive], vec!["2024-01-01-10.00.00 - Hi"]);
        // Same directory recorded twice is not a cross-archive collision
        assert!(tracker.collisions().is_empty());
    }

    #[test]
    fn test_same_basename_elsewhere_is_collision() {
        let tracker = DedupTracker::default();
        let stats = RunStats::default();

        let a = tracker.classify(Path::new("out/Inbox/Hi"), "Hi", Path::new("Inbox"), &stats);
        let b = tracker.classify(Path::new("out/Sent/Hi"), "Hi", Path::new("Sent"), &stats);
        assert_eq!(a, Classification::Fresh);
        assert_eq!(b, Classification::BasenameCollision);
        assert!(stats.duplicates().is_empty());

        let collisions = tracker.collisions();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].0, "Hi");
        assert_eq!(
            collisions[0].1,
            vec![PathBuf::from("out/Inbox/Hi"), PathBuf::from("out/Sent/Hi")]
        );
    }

    #[test]
    fn test_collisions_keep_insertion_order() {
        let tracker = DedupTracker::default();
        let stats = RunStats::default();
        for name in ["b", "a"] {
            for folder in ["x", "y"] {
                let dir = PathBuf::from(folder).join(name);
                tracker.classify(&dir, name, Path::new(folder), &stats);
            }
        }
        let names: Vec<_> = tracker.collisions().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
