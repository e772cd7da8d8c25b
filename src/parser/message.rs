//! Default [`MessageParser`] backed by `mail-parser`.

use std::path::Path;

use chrono::{DateTime, Utc};
use mail_parser::{Address, MessageParser as MimeParser};

use crate::error::{MailsiftError, Result};
use crate::model::document::{truncate_chars, EmailDocument};
use crate::parser::{header, mime, MessageParser};
use crate::scanner;

/// Parses RFC 5322 message files (`.eml`, maildir entries).
#[derive(Debug, Clone)]
pub struct MailFileParser {
    preview_length: usize,
}

impl Default for MailFileParser {
    fn default() -> Self {
        Self::new(500)
    }
}

impl MailFileParser {
    /// Create a parser keeping at most `preview_length` body characters in
    /// the preview column.
    pub fn new(preview_length: usize) -> Self {
        Self { preview_length }
    }

    /// Parse raw message bytes into a document for `path`.
    ///
    /// `last_modified_ticks` is left at zero; [`MessageParser::parse`] sets it.
    pub fn parse_bytes(
        &self,
        path: &Path,
        data: &[u8],
        include_full_body: bool,
    ) -> Option<EmailDocument> {
        let data = mime::skip_from_line(data);
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }
        let msg = MimeParser::default().parse(data)?;
        let raw_headers = header::extract_raw_headers(data);

        let mut doc = EmailDocument::new(path);
        doc.message_id = msg.message_id().unwrap_or_default().to_string();

        if let Some((address, name)) = msg.from().and_then(|a| addresses(a).into_iter().next()) {
            doc.from_address = address;
            doc.from_name = name;
        }
        doc.to_addresses = address_list(msg.to());
        doc.cc_addresses = address_list(msg.cc());
        doc.bcc_addresses = address_list(msg.bcc());
        doc.subject = msg.subject().unwrap_or_default().to_string();

        doc.date_sent = sent_date(msg.date(), &raw_headers);
        doc.date_received = header::received_date(&raw_headers);

        doc.attachment_names = mime::attachment_names(&msg);
        doc.has_attachments = !doc.attachment_names.is_empty();

        let body = mime::body_text(&msg).unwrap_or_default();
        doc.body_preview = truncate_chars(body.trim(), self.preview_length).to_string();
        if include_full_body {
            doc.body_text = Some(body);
        }

        Some(doc)
    }
}

impl MessageParser for MailFileParser {
    fn parse(&self, path: &Path, include_full_body: bool) -> Result<Option<EmailDocument>> {
        let ticks = scanner::modified_ticks(path).map_err(|e| MailsiftError::io(path, e))?;
        let data = std::fs::read(path).map_err(|e| MailsiftError::io(path, e))?;

        Ok(self
            .parse_bytes(path, &data, include_full_body)
            .map(|mut doc| {
                doc.last_modified_ticks = ticks;
                doc
            }))
    }
}

/// `(address, display name)` pairs in header order, groups flattened.
fn addresses(addr: &Address<'_>) -> Vec<(String, String)> {
    let list: Vec<&mail_parser::Addr<'_>> = match addr {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };
    list.into_iter()
        .filter_map(|a| {
            let address = a.address.as_deref()?.trim();
            if address.is_empty() {
                return None;
            }
            let name = a.name.as_deref().unwrap_or_default().trim();
            Some((address.to_string(), name.to_string()))
        })
        .collect()
}

/// `Date:` as decoded by `mail-parser`, else the raw header through the
/// tolerant [`header::parse_date`].
fn sent_date(parsed: Option<&mail_parser::DateTime>, raw_headers: &str) -> Option<DateTime<Utc>> {
    parsed
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
        .or_else(|| {
            header::header_value(raw_headers, "date")
                .as_deref()
                .and_then(header::parse_date)
        })
}

fn address_list(addr: Option<&Address<'_>>) -> Vec<String> {
    addr.map(|a| addresses(a).into_iter().map(|(address, _)| address).collect())
        .unwrap_or_default()
}
