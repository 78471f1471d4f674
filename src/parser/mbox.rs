//! Streaming MBOX scanner.
//!
//! Reads MBOX files line-by-line with a 1 MB buffer and yields one
//! [`MboxRecord`] at a time. Never loads the entire file into memory.
//! Tolerant of malformed input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ConvertError, Result};
use crate::model::mail::MboxRecord;

/// Size of the internal read buffer (1 MB for fast sequential reads on modern SSDs).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default maximum message size in bytes (256 MB).
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Lazy iterator over the messages of an MBOX archive.
///
/// The scanner is tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning)
/// - Content before the first separator (kept as a message with an empty envelope)
/// - Truncated messages at EOF
/// - UTF-8 BOM at the start of the file
///
/// Body lines escaped as `>From ` (mboxo/mboxrd) lose one leading `>`.
pub struct MboxScanner<R> {
    reader: R,
    path: PathBuf,
    max_message_size: usize,
    line_buf: Vec<u8>,
    pending: Option<Pending>,
    current_offset: u64,
    prev_line_was_empty: bool,
    first_line: bool,
    sequence: u64,
    done: bool,
}

/// A message being accumulated.
struct Pending {
    offset: u64,
    envelope_sender: String,
    envelope_date: String,
    contents: Vec<u8>,
    truncated: bool,
}

impl MboxScanner<BufReader<File>> {
    /// Open an MBOX file for scanning.
    ///
    /// Verifies that the file exists and is readable, but does NOT validate
    /// that it is actually an MBOX.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConvertError::FileNotFound(path.to_path_buf())
            } else {
                ConvertError::io(path, e)
            }
        })?;
        Ok(Self::new(
            BufReader::with_capacity(READ_BUFFER_SIZE, file),
            path,
        ))
    }
}

impl<R: BufRead> MboxScanner<R> {
    /// Scan any buffered reader. `path` is only used in log and error context.
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            max_message_size: MAX_MESSAGE_SIZE,
            line_buf: Vec::with_capacity(4096),
            pending: None,
            current_offset: 0,
            prev_line_was_empty: true,
            first_line: true,
            sequence: 0,
            done: false,
        }
    }

    /// Path of the archive being scanned.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn finish(&mut self, pending: Pending) -> MboxRecord {
        let record = MboxRecord {
            offset: pending.offset,
            envelope_sender: pending.envelope_sender,
            envelope_date: pending.envelope_date,
            contents: pending.contents,
            sequence: self.sequence,
        };
        self.sequence += 1;
        record
    }

    fn append_line(&mut self) {
        let max = self.max_message_size;
        let offset = self.current_offset;
        let line = unescape_from_line(&self.line_buf);
        let pending = self.pending.get_or_insert_with(|| Pending {
            offset,
            envelope_sender: String::new(),
            envelope_date: String::new(),
            contents: Vec::with_capacity(64 * 1024),
            truncated: false,
        });

        if pending.contents.len() + line.len() <= max {
            pending.contents.extend_from_slice(line);
        } else if !pending.truncated {
            // Warn once per message
            warn!(
                offset = pending.offset,
                max_size = max,
                "Message exceeds maximum size, truncating body"
            );
            pending.truncated = true;
        }
    }
}

impl<R: BufRead> Iterator for MboxScanner<R> {
    type Item = Result<MboxRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.line_buf.clear();
            let line_len = match self.reader.read_until(b'\n', &mut self.line_buf) {
                Ok(n) => n as u64,
                Err(e) => {
                    self.done = true;
                    return Some(Err(ConvertError::io(&self.path, e)));
                }
            };

            if line_len == 0 {
                // EOF: flush the last message
                self.done = true;
                return self.pending.take().map(|p| Ok(self.finish(p)));
            }

            let mut finished = None;
            if let Some((sender, date)) = parse_separator(&self.line_buf) {
                if !self.first_line && !self.prev_line_was_empty {
                    warn!(
                        path = %self.path.display(),
                        offset = self.current_offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                finished = self.pending.replace(Pending {
                    offset: self.current_offset,
                    envelope_sender: sender,
                    envelope_date: date,
                    contents: Vec::with_capacity(64 * 1024),
                    truncated: false,
                });
            } else if self.pending.is_some() || !is_blank_line(&self.line_buf) {
                self.append_line();
            }

            self.prev_line_was_empty = is_blank_line(&self.line_buf);
            self.first_line = false;
            self.current_offset += line_len;

            if let Some(pending) = finished {
                return Some(Ok(self.finish(pending)));
            }
        }
    }
}

/// Parse an MBOX separator line into `(return_path, timestamp)`.
///
/// Returns `None` if the line is not a separator.
fn parse_separator(line: &[u8]) -> Option<(String, String)> {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    let rest = line.strip_prefix(b"From ")?;
    let text = String::from_utf8_lossy(rest);
    let text = text.trim_end_matches(['\r', '\n']).trim();
    match text.split_once(char::is_whitespace) {
        Some((sender, date)) => Some((sender.to_string(), date.trim().to_string())),
        None => Some((text.to_string(), String::new())),
    }
}

/// Drop one `>` from `>From `, `>>From `, … body lines.
fn unescape_from_line(line: &[u8]) -> &[u8] {
    let quotes = line.iter().take_while(|&&b| b == b'>').count();
    if quotes > 0 && line[quotes..].starts_with(b"From ") {
        &line[1..]
    } else {
        line
    }
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
