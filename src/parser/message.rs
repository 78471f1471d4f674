//! MIME message parsing: headers, body selection, and attachment extraction.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use mail_parser::{Address, MessageParser, MimeHeaders, PartType};

use crate::model::address::{AddressField, EmailAddress};
use crate::model::attachment::Attachment;
use crate::model::mail::ParsedMessage;

/// Parse a complete raw message (headers + body) into a [`ParsedMessage`].
///
/// Uses `mail-parser` internally. When the MIME structure cannot be parsed at
/// all, the headers are lost and everything after the first blank line is kept
/// as `fallback_text`.
pub fn parse_message(raw_message: &[u8]) -> ParsedMessage {
    let message_bytes = skip_from_line(raw_message);

    let parser = MessageParser::default();
    let Some(msg) = parser.parse(message_bytes) else {
        return ParsedMessage {
            fallback_text: Some(extract_body_fallback(message_bytes)),
            ..ParsedMessage::default()
        };
    };

    let html = msg.html_part(0).and_then(|part| match &part.body {
        PartType::Html(html) => Some(html.to_string()),
        _ => None,
    });
    let text = msg.text_part(0).and_then(|part| match &part.body {
        PartType::Text(text) => Some(text.to_string()),
        _ => None,
    });

    // mail-parser converts between the two body flavours on demand; only fall
    // back when neither genuine part exists.
    let fallback_text = if html.is_none() && text.is_none() {
        msg.body_text(0)
            .map(|s| s.into_owned())
            .or_else(|| Some(extract_body_fallback(message_bytes)))
    } else {
        None
    };

    ParsedMessage {
        from: msg.from().map(address_field),
        to: msg.to().map(address_field),
        cc: msg.cc().map(address_field),
        bcc: msg.bcc().map(address_field),
        subject: msg.subject().map(String::from),
        date: msg.date().and_then(to_chrono),
        html,
        text,
        fallback_text,
        attachments: list_attachments(&msg),
    }
}

/// Map a parsed address header; groups are flattened in header order.
fn address_field(address: &Address<'_>) -> AddressField {
    let entries = match address {
        Address::List(list) => list
            .iter()
            .map(|addr| EmailAddress::from_parts(addr.name.as_deref(), addr.address.as_deref()))
            .collect(),
        Address::Group(groups) => groups
            .iter()
            .flat_map(|group| group.addresses.iter())
            .map(|addr| EmailAddress::from_parts(addr.name.as_deref(), addr.address.as_deref()))
            .collect(),
    };
    AddressField::from_vec(entries)
}

/// Convert a `mail-parser` date into a chrono timestamp, keeping its offset.
fn to_chrono(dt: &mail_parser::DateTime) -> Option<DateTime<FixedOffset>> {
    let sign = if dt.tz_before_gmt { -1 } else { 1 };
    let offset_secs = sign * (i32::from(dt.tz_hour) * 3600 + i32::from(dt.tz_minute) * 60);
    let offset = FixedOffset::east_opt(offset_secs)?;
    let naive = NaiveDate::from_ymd_opt(
        i32::from(dt.year),
        u32::from(dt.month),
        u32::from(dt.day),
    )?
    .and_hms_opt(
        u32::from(dt.hour),
        u32::from(dt.minute),
        u32::from(dt.second),
    )?;
    offset.from_local_datetime(&naive).single()
}

/// Collect decoded attachments from a parsed `mail_parser::Message`.
fn list_attachments(msg: &mail_parser::Message<'_>) -> Vec<Attachment> {
    msg.attachments()
        .map(|part| {
            let content_type = part
                .content_type()
                .map(|ct| {
                    let main = ct.ctype();
                    match ct.subtype() {
                        Some(sub) => format!("{main}/{sub}"),
                        None => main.to_string(),
                    }
                })
                .unwrap_or_else(|| "application/octet-stream".to_string())
                .to_lowercase();

            Attachment {
                filename: part
                    .attachment_name()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from),
                content_type,
                contents: part.contents().to_vec(),
            }
        })
        .collect()
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Fallback body extraction when `mail-parser` cannot parse the message.
///
/// Everything after the first blank line; UTF-8 first, then Windows-1252
/// (which accepts every byte).
fn extract_body_fallback(data: &[u8]) -> String {
    let body = find_body_start(data).map_or(&[][..], |pos| &data[pos..]);
    match std::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(body);
            decoded.into_owned()
        }
    }
}

/// Offset of the first body byte (just after the header/body blank line).
fn find_body_start(data: &[u8]) -> Option<usize> {
    let lf = data.windows(2).position(|w| w == b"\n\n").map(|p| p + 2);
    let crlf = data.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4);
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
