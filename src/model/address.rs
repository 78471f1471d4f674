//! Email address fields as exposed by the message parser.

/// A single parsed mailbox.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Default)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`), may be empty.
    pub address: String,
}

impl EmailAddress {
    /// Build from optional name and address parts, trimming both.
    pub fn from_parts(name: Option<&str>, address: Option<&str>) -> Self {
        Self {
            display_name: strip_quotes(name.unwrap_or_default()),
            address: address.unwrap_or_default().trim().to_string(),
        }
    }

    /// Text shown for this mailbox, or `None` when it has neither a name nor an address.
    ///
    /// `"Display Name <address>"`, `"address"` or `"Display Name"`.
    pub fn display_text(&self) -> Option<String> {
        match (self.display_name.is_empty(), self.address.is_empty()) {
            (true, true) => None,
            (true, false) => Some(self.address.clone()),
            (false, true) => Some(self.display_name.clone()),
            (false, false) => Some(format!("{} <{}>", self.display_name, self.address)),
        }
    }
}

/// One address header (`From:`, `To:`, …) after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum AddressField {
    /// The header resolved to exactly one mailbox.
    Single(EmailAddress),
    /// The header resolved to several mailboxes (or a group), in header order.
    List(Vec<EmailAddress>),
}

impl AddressField {
    /// Collapse a list of mailboxes: one entry becomes `Single`.
    pub fn from_vec(mut entries: Vec<EmailAddress>) -> Self {
        if entries.len() == 1 {
            Self::Single(entries.remove(0))
        } else {
            Self::List(entries)
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_text().unwrap_or_default())
    }
}
