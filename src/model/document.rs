//! The indexed email document.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// One indexed message file.
///
/// The file path is the identity used for upserts; the message id is
/// informational only because the same message may be archived under several
/// folders (e.g. Sent and Trash).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmailDocument {
    /// Surrogate row id, `None` until the document has been stored.
    pub id: Option<i64>,

    /// The `Message-ID` header value (without angle brackets).
    pub message_id: String,

    /// Absolute path of the message file.
    pub file_path: PathBuf,

    /// Bare sender address.
    pub from_address: String,

    /// Sender display name (may be empty).
    pub from_name: String,

    /// `To:` addresses in header order.
    pub to_addresses: Vec<String>,

    /// `Cc:` addresses in header order.
    pub cc_addresses: Vec<String>,

    /// `Bcc:` addresses in header order.
    pub bcc_addresses: Vec<String>,

    /// Decoded subject line.
    pub subject: String,

    /// Parsed `Date:` header.
    pub date_sent: Option<DateTime<Utc>>,

    /// Date of the topmost `Received:` header.
    pub date_received: Option<DateTime<Utc>>,

    /// Folder name derived from the archive layout.
    pub folder: String,

    /// Account name derived from the archive layout.
    pub account: String,

    /// Whether the message carries at least one attachment.
    pub has_attachments: bool,

    /// Attachment file names in MIME order.
    pub attachment_names: Vec<String>,

    /// Bounded prefix of the plain-text body.
    pub body_preview: String,

    /// Full plain-text body; only present when content indexing was requested.
    pub body_text: Option<String>,

    /// When the document was written to the index.
    pub indexed_at: DateTime<Utc>,

    /// File mtime at parse time, in nanoseconds since the Unix epoch.
    pub last_modified_ticks: i64,
}

impl EmailDocument {
    /// Create an empty document for `file_path`.
    ///
    /// Parsers fill in the remaining fields; `indexed_at` starts at "now".
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            id: None,
            message_id: String::new(),
            file_path: file_path.into(),
            from_address: String::new(),
            from_name: String::new(),
            to_addresses: Vec::new(),
            cc_addresses: Vec::new(),
            bcc_addresses: Vec::new(),
            subject: String::new(),
            date_sent: None,
            date_received: None,
            folder: String::new(),
            account: String::new(),
            has_attachments: false,
            attachment_names: Vec::new(),
            body_preview: String::new(),
            body_text: None,
            indexed_at: Utc::now(),
            last_modified_ticks: 0,
        }
    }

    /// Format the sender for display: `"Name <address>"` or just `"address"`.
    pub fn from_display(&self) -> String {
        if self.from_name.is_empty() {
            self.from_address.clone()
        } else {
            format!("{} <{}>", self.from_name, self.from_address)
        }
    }

    /// Text used when generating a snippet: the full body when stored,
    /// otherwise the preview.
    pub fn snippet_source(&self) -> Option<&str> {
        match self.body_text.as_deref() {
            Some(body) => Some(body),
            None if self.body_preview.is_empty() => None,
            None => Some(self.body_preview.as_str()),
        }
    }
}

/// Truncate `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_display() {
        let mut doc = EmailDocument::new("/a/b.eml");
        doc.from_address = "alice@example.com".to_string();
        assert_eq!(doc.from_display(), "alice@example.com");
        doc.from_name = "Alice".to_string();
        assert_eq!(doc.from_display(), "Alice <alice@example.com>");
    }

    #[test]
    fn test_snippet_source_prefers_body() {
        let mut doc = EmailDocument::new("/a/b.eml");
        assert_eq!(doc.snippet_source(), None);
        doc.body_preview = "preview".to_string();
        assert_eq!(doc.snippet_source(), Some("preview"));
        doc.body_text = Some("full body".to_string());
        assert_eq!(doc.snippet_source(), Some("full body"));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("café con leña", 4), "café");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
