//! One in-place progress line per archive.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use unicode_width::UnicodeWidthStr;

use super::scheduler::MessageOutcome;

/// Progress display for the messages of one archive.
///
/// Each update overwrites the previous one; lines are padded to the widest
/// line shown so far so that shorter lines leave no residue.
pub struct ArchiveProgress {
    bar: ProgressBar,
    widest: Mutex<usize>,
    done: AtomicU64,
}

impl ArchiveProgress {
    /// A visible spinner when `visible`, otherwise a hidden bar.
    pub fn new(archive: &Path, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} {prefix} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.set_prefix(archive.display().to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            widest: Mutex::new(0),
            done: AtomicU64::new(0),
        }
    }

    /// Record one finished message and redraw the line.
    pub fn report(&self, outcome: &MessageOutcome) {
        let n = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let line = format!("[{n}] {}: {}", outcome.outcome.label(), outcome.header.basename);
        self.bar.set_message(self.padded(&line));
    }

    /// `line` right-padded to the widest line seen so far.
    pub fn padded(&self, line: &str) -> String {
        let width = UnicodeWidthStr::width(line);
        let mut widest = self.widest.lock().unwrap_or_else(|p| p.into_inner());
        *widest = (*widest).max(width);
        let pad = *widest - width;
        format!("{line}{}", " ".repeat(pad))
    }

    /// Messages reported so far.
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mail::Header;
    use crate::pipeline::gate::GateOutcome;

    #[test]
    fn test_padding_tracks_widest_line() {
        let progress = ArchiveProgress::new(Path::new("Inbox"), false);
        assert_eq!(progress.padded("long line"), "long line");
        assert_eq!(progress.padded("ab"), "ab       ");
        // Wide characters count by display width
        assert_eq!(progress.padded("日本"), "日本     ");
    }

    #[test]
    fn test_report_counts_messages() {
        let progress = ArchiveProgress::new(Path::new("Inbox"), false);
        let outcome = MessageOutcome {
            header: Header {
                basename: "Hi".into(),
                ..Header::default()
            },
            outcome: GateOutcome::SkippedExisting,
        };
        progress.report(&outcome);
        progress.report(&outcome);
        assert_eq!(progress.done(), 2);
        progress.finish();
    }
}
