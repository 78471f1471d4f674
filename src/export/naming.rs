//! Derivation of the canonical [`Header`] and the per-message basename.
//!
//! The basename is used both as the output sub-directory name and as the
//! PDF file stem, so it must be a valid path segment on every platform.

use crate::error::{ConvertError, Result};
use crate::model::address::AddressField;
use crate::model::mail::{Header, ParsedMessage};

/// Characters that are never allowed in a basename or attachment filename.
pub const FORBIDDEN_CHARS: [char; 9] = [':', '\\', '/', '*', '?', '"', '<', '>', '|'];

/// Maximum basename length, in characters.
pub const MAX_BASENAME_LEN: usize = 80;

/// Basename used when a message has neither a date nor a subject.
const UNTITLED: &str = "untitled";

/// Build the [`Header`] record for a parsed message.
///
/// Fails with [`ConvertError::InvalidAddressList`] when an address list
/// contains an entry without display text.
pub fn derive_header(msg: &ParsedMessage) -> Result<Header> {
    let subject_text = msg.subject.clone().unwrap_or_default();

    let address = |field: &Option<AddressField>, name: &'static str| {
        address_text(field.as_ref(), name, &subject_text)
    };
    let from = address(&msg.from, "from")?;
    let to = address(&msg.to, "to")?;
    let cc = address(&msg.cc, "cc")?;
    let bcc = address(&msg.bcc, "bcc")?;

    let mut raw = String::new();
    if let Some(date) = &msg.date {
        raw.push_str(&date.format("%Y-%m-%d-%H.%M.%S").to_string());
    }
    if let Some(subject) = &msg.subject {
        raw.push_str(" - ");
        raw.push_str(&strip_forbidden(subject));
    }

    let mut basename = finish_basename(&raw);
    if basename.is_empty() {
        basename = UNTITLED.to_string();
    }

    Ok(Header {
        from,
        to,
        cc,
        bcc,
        subject: subject_text.clone(),
        date: msg.date.map(|d| d.to_rfc2822()).unwrap_or_default(),
        basename,
    })
}

/// Display text of an address header.
fn address_text(field: Option<&AddressField>, name: &'static str, subject: &str) -> Result<String> {
    match field {
        None => Ok(String::new()),
        Some(AddressField::Single(addr)) => Ok(addr.display_text().unwrap_or_default()),
        Some(AddressField::List(entries)) => {
            let texts = entries
                .iter()
                .map(|addr| addr.display_text())
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| ConvertError::InvalidAddressList {
                    field: name,
                    subject: subject.to_string(),
                })?;
            Ok(texts.join(", "))
        }
    }
}

/// Remove every forbidden path character (no escaping).
pub fn strip_forbidden(s: &str) -> String {
    s.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect()
}

/// Final basename clean-up: strip, trim, truncate, then drop trailing dots.
pub fn finish_basename(raw: &str) -> String {
    let stripped = strip_forbidden(raw);
    let truncated: String = stripped.trim().chars().take(MAX_BASENAME_LEN).collect();
    truncated.trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::EmailAddress;
    use chrono::{DateTime, FixedOffset};

    fn date(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn message(subject: Option<&str>, when: Option<&str>) -> ParsedMessage {
        ParsedMessage {
            subject: subject.map(String::from),
            date: when.map(date),
            ..ParsedMessage::default()
        }
    }

    #[test]
    fn test_basename_from_date_and_subject() {
        let header = derive_header(&message(Some("Hi"), Some("2024-01-01T10:00:00+00:00"))).unwrap();
        assert_eq!(header.basename, "2024-01-01-10.00.00 - Hi");
        assert_eq!(header.subject, "Hi");
        assert_eq!(header.date, "Mon, 1 Jan 2024 10:00:00 +0000");
    }

    #[test]
    fn test_date_components_zero_padded() {
        let header = derive_header(&message(None, Some("2023-03-04T05:06:07-05:00"))).unwrap();
        assert_eq!(header.basename, "2023-03-04-05.06.07");
    }

    #[test]
    fn test_subject_forbidden_chars_stripped() {
        let header = derive_header(&message(Some("a/b:c"), Some("2024-01-01T10:00:00+00:00"))).unwrap();
        assert_eq!(header.basename, "2024-01-01-10.00.00 - abc");
        // The header keeps the subject as written
        assert_eq!(header.subject, "a/b:c");
    }

    #[test]
    fn test_subject_without_date() {
        let header = derive_header(&message(Some("Hello"), None)).unwrap();
        assert_eq!(header.basename, "- Hello");
    }

    #[test]
    fn test_missing_date_and_subject() {
        let header = derive_header(&message(None, None)).unwrap();
        assert_eq!(header.basename, "untitled");
        assert_eq!(header.date, "");
    }

    #[test]
    fn test_basename_invariants_hold_for_long_subjects() {
        let subjects = [
            "x".repeat(200),
            format!("{}...", "y".repeat(76)),
            "dots.....................................................................................".to_string(),
            "*?\"<>| weird : name / with \\ everything".to_string(),
        ];
        for subject in subjects {
            let header =
                derive_header(&message(Some(&subject), Some("2024-06-30T23:59:59+02:00"))).unwrap();
            let name = &header.basename;
            assert!(name.chars().count() <= MAX_BASENAME_LEN, "too long: {name}");
            assert!(!name.contains(FORBIDDEN_CHARS), "forbidden char in {name}");
            assert!(!name.ends_with('.'), "trailing dot in {name}");
        }
    }

    #[test]
    fn test_finish_basename_trims_dots_repeatedly() {
        assert_eq!(finish_basename("  report...  "), "report");
        assert_eq!(finish_basename("a/b"), "ab");
    }

    #[test]
    fn test_address_fields() {
        let msg = ParsedMessage {
            from: Some(AddressField::Single(EmailAddress::from_parts(
                Some("Alice"),
                Some("alice@example.com"),
            ))),
            to: Some(AddressField::List(vec![
                EmailAddress::from_parts(None, Some("bob@example.com")),
                EmailAddress::from_parts(Some("Carol"), Some("carol@example.com")),
            ])),
            ..ParsedMessage::default()
        };
        let header = derive_header(&msg).unwrap();
        assert_eq!(header.from, "Alice <alice@example.com>");
        assert_eq!(header.to, "bob@example.com, Carol <carol@example.com>");
        assert_eq!(header.cc, "");
        assert_eq!(header.bcc, "");
    }

    #[test]
    fn test_list_entry_without_display_text_is_fatal() {
        let msg = ParsedMessage {
            subject: Some("Broken".into()),
            cc: Some(AddressField::List(vec![
                EmailAddress::from_parts(None, Some("ok@example.com")),
                EmailAddress::default(),
            ])),
            ..ParsedMessage::default()
        };
        let err = derive_header(&msg).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidAddressList { field: "cc", .. }));
        assert!(err.is_fatal());
    }
}
