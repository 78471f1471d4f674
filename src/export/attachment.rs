//! Write message attachments next to the rendered document.

use std::path::{Path, PathBuf};

use crate::model::attachment::Attachment;
use crate::model::mail::Header;
use crate::pipeline::stats::RunStats;

use super::naming::strip_forbidden;

/// File extension for a content type, or `None` when it is not recognized.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "message/rfc822" => Some("eml"),
        "application/pdf" => Some("pdf"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "text/calendar" => Some("ics"),
        _ => None,
    }
}

/// Name used for attachment number `index` when it declares no usable filename.
fn generated_name(index: usize, attachment: &Attachment, header: &Header) -> String {
    let extension = extension_for(&attachment.content_type).unwrap_or_else(|| {
        tracing::warn!(
            basename = %header.basename,
            content_type = %attachment.content_type,
            index,
            "Unrecognized attachment content type without filename"
        );
        "unknown"
    });
    format!("attachment-{index}.{extension}")
}

/// Sanitized on-disk filename for one attachment.
pub fn attachment_filename(index: usize, attachment: &Attachment, header: &Header) -> String {
    let declared = attachment
        .filename
        .as_deref()
        .map(|name| strip_forbidden(name).trim().to_string())
        .filter(|name| !name.is_empty() && name != "." && name != "..");

    match declared {
        Some(name) => name,
        None => strip_forbidden(&generated_name(index, attachment, header)),
    }
}

/// Write every attachment of a message into `target_dir`, overwriting same-named files.
///
/// A failed write is logged and skipped; the counters in `stats` only count
/// files that were actually written.
pub async fn write_attachments(
    target_dir: &Path,
    header: &Header,
    attachments: &[Attachment],
    stats: &RunStats,
) -> Vec<PathBuf> {
    let mut written = Vec::with_capacity(attachments.len());

    for (index, attachment) in attachments.iter().enumerate() {
        let filename = attachment_filename(index, attachment, header);
        let path = target_dir.join(&filename);

        match tokio::fs::write(&path, &attachment.contents).await {
            Ok(()) => {
                stats.record_attachment(attachment.size());
                written.push(path);
            }
            Err(e) => {
                tracing::warn!(
                    basename = %header.basename,
                    filename = %filename,
                    error = %e,
                    "Failed to write attachment"
                );
            }
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            from: String::new(),
            to: String::new(),
            cc: String::new(),
            bcc: String::new(),
            subject: "Files".into(),
            date: String::new(),
            basename: "2024-01-01-10.00.00 - Files".into(),
        }
    }

    fn attachment(filename: Option<&str>, content_type: &str) -> Attachment {
        Attachment {
            filename: filename.map(String::from),
            content_type: content_type.into(),
            contents: b"data".to_vec(),
        }
    }

    #[test]
    fn test_extension_table() {
        assert_eq!(extension_for("message/rfc822"), Some("eml"));
        assert_eq!(extension_for("application/pdf"), Some("pdf"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/jpg"), Some("jpg"));
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/gif"), Some("gif"));
        assert_eq!(extension_for("text/calendar"), Some("ics"));
        assert_eq!(extension_for("application/zip"), None);
    }

    #[test]
    fn test_generated_names() {
        let h = header();
        assert_eq!(attachment_filename(0, &attachment(None, "image/png"), &h), "attachment-0.png");
        assert_eq!(
            attachment_filename(3, &attachment(None, "application/x-foo"), &h),
            "attachment-3.unknown"
        );
    }

    #[test]
    fn test_declared_name_is_sanitized() {
        let h = header();
        assert_eq!(
            attachment_filename(0, &attachment(Some("../etc/pass:wd"), "text/plain"), &h),
            "..etcpasswd"
        );
        assert_eq!(
            attachment_filename(1, &attachment(Some("report?.pdf"), "application/pdf"), &h),
            "report.pdf"
        );
        // Names that sanitize to nothing usable fall back to generated ones
        assert_eq!(
            attachment_filename(2, &attachment(Some("??"), "image/gif"), &h),
            "attachment-2.gif"
        );
        assert_eq!(
            attachment_filename(4, &attachment(Some(".."), "image/gif"), &h),
            "attachment-4.gif"
        );
    }

    #[tokio::test]
    async fn test_write_attachments_overwrites_and_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let stats = RunStats::default();
        let attachments = vec![
            attachment(Some("same.txt"), "text/plain"),
            Attachment {
                filename: Some("same.txt".into()),
                content_type: "text/plain".into(),
                contents: b"second".to_vec(),
            },
            attachment(None, "image/png"),
        ];

        let written = write_attachments(tmp.path(), &header(), &attachments, &stats).await;

        assert_eq!(written.len(), 3);
        assert_eq!(std::fs::read(tmp.path().join("same.txt")).unwrap(), b"second");
        assert!(tmp.path().join("attachment-2.png").exists());
        assert_eq!(stats.snapshot().attachments_written, 3);
    }

    #[tokio::test]
    async fn test_failed_write_is_not_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");
        let stats = RunStats::default();

        let written =
            write_attachments(&missing, &header(), &[attachment(None, "image/png")], &stats).await;

        assert!(written.is_empty());
        assert_eq!(stats.snapshot().attachments_written, 0);
    }
}
