//! HTML layout handed to the document renderer.
//!
//! Order is fixed: generator credit, header lines, body, attachment list.

use std::fmt::Write;

use tracing::warn;

use crate::model::attachment::Attachment;
use crate::model::mail::{Header, ParsedMessage};

const CREDIT: &str = concat!("Converted by mboxpdf ", env!("CARGO_PKG_VERSION"));

/// Page-level CSS. Backgrounds embedded in message HTML must survive printing.
const STYLE: &str = "\
html, body { -webkit-print-color-adjust: exact; print-color-adjust: exact; }
body { font-family: sans-serif; font-size: 11pt; margin: 0; }
.mboxpdf-credit { color: #777; font-size: 8pt; margin: 0 0 6pt 0; }
.mboxpdf-headers { border-collapse: collapse; margin-bottom: 8pt; }
.mboxpdf-headers th { text-align: left; padding-right: 8pt; vertical-align: top; }
.mboxpdf-attachments { margin-top: 12pt; border-top: 1px solid #999; padding-top: 6pt; }
";

/// Escape every character outside `[0-9A-Za-z ]` as a numeric character reference.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == ' ' {
            out.push(c);
        } else {
            let _ = write!(out, "&#{};", u32::from(c));
        }
    }
    out
}

/// Human-readable size with two decimals, base 1024 (`2048` → `2.00KB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2}{}", UNITS[unit])
}

/// Build the full HTML document for one message.
pub fn render_document(header: &Header, msg: &ParsedMessage) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>");
    html.push_str(&escape_html(&header.basename));
    html.push_str("</title>\n<style>\n");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n");

    let _ = writeln!(html, "<p class=\"mboxpdf-credit\">{}</p>", escape_html(CREDIT));

    html.push_str("<table class=\"mboxpdf-headers\">\n");
    for (label, value) in [
        ("From", &header.from),
        ("To", &header.to),
        ("Cc", &header.cc),
        ("Bcc", &header.bcc),
        ("Subject", &header.subject),
        ("Date", &header.date),
    ] {
        let _ = writeln!(
            html,
            "<tr><th>{label}:</th><td>{}</td></tr>",
            escape_html(value)
        );
    }
    html.push_str("</table>\n<hr>\n");

    html.push_str(&body_html(header, msg));
    html.push('\n');

    if !msg.attachments.is_empty() {
        html.push_str(&attachment_block(&msg.attachments));
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// HTML body verbatim, else plain text with line breaks, else the fallback text.
fn body_html(header: &Header, msg: &ParsedMessage) -> String {
    if let Some(html) = &msg.html {
        return html.clone();
    }
    if let Some(text) = &msg.text {
        return text_to_html(text);
    }
    warn!(basename = %header.basename, "No text or HTML body, rendering fallback text");
    text_to_html(msg.fallback_text.as_deref().unwrap_or_default())
}

/// Escape plain text line by line and map newlines to `<br>`.
fn text_to_html(text: &str) -> String {
    text.lines()
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br>\n")
}

fn attachment_block(attachments: &[Attachment]) -> String {
    let mut block = String::from("<div class=\"mboxpdf-attachments\">\n<b>Attachments:</b>\n<ul>\n");
    for att in attachments {
        let name = att.filename.as_deref().unwrap_or("unknown");
        let _ = writeln!(
            block,
            "<li>{} ({})</li>",
            escape_html(name),
            format_size(att.size())
        );
    }
    block.push_str("</ul>\n</div>\n");
    block
}
