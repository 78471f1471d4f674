//! Core message types: scanner records, parsed messages, and derived headers.

use chrono::{DateTime, FixedOffset};

use super::address::AddressField;
use super::attachment::Attachment;

/// One message as split out of an MBOX archive, before MIME parsing.
#[derive(Debug, Clone)]
pub struct MboxRecord {
    /// Byte offset of the `From ` separator line inside the archive.
    pub offset: u64,

    /// Return-path from the `From ` separator line.
    pub envelope_sender: String,

    /// Timestamp text from the `From ` separator line, unparsed.
    pub envelope_date: String,

    /// Raw RFC 5322 message (separator stripped, `>From ` unescaped).
    pub contents: Vec<u8>,

    /// Sequential index within the archive (0, 1, 2, …).
    pub sequence: u64,
}

/// Structured view of a message, produced by the message parser.
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    pub from: Option<AddressField>,
    pub to: Option<AddressField>,
    pub cc: Option<AddressField>,
    pub bcc: Option<AddressField>,

    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: Option<String>,

    /// `Date:` header, in the offset the message was written with.
    pub date: Option<DateTime<FixedOffset>>,

    /// HTML body (from a genuine `text/html` part).
    pub html: Option<String>,

    /// Plain-text body (from a genuine `text/plain` part).
    pub text: Option<String>,

    /// Best-effort text when neither body part is usable
    /// (e.g. the parser rejected the MIME structure).
    pub fallback_text: Option<String>,

    /// Attachments in arrival order.
    pub attachments: Vec<Attachment>,
}

/// Canonical header record for one message.
///
/// `basename` doubles as the output sub-directory name and the PDF file stem.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Header {
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub date: String,
    pub basename: String,
}
