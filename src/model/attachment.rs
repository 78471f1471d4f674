//! Decoded attachment payloads.

/// One attachment of a parsed message, with its content already decoded.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Filename declared in `Content-Disposition` or `Content-Type`, if any.
    pub filename: Option<String>,

    /// Lowercase MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded bytes.
    pub contents: Vec<u8>,
}

impl Attachment {
    /// Decoded size in bytes.
    pub fn size(&self) -> u64 {
        self.contents.len() as u64
    }
}
