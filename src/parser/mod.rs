//! Message parsing: turns one message file into an [`EmailDocument`].
//!
//! The indexer depends only on the [`MessageParser`] trait so callers can
//! plug in their own parser; [`MailFileParser`] is the default, built on
//! `mail-parser`.

pub mod header;
pub mod message;
pub mod mime;

use std::path::Path;

use crate::error::Result;
use crate::model::document::EmailDocument;

pub use message::MailFileParser;

/// Parses a single message file.
pub trait MessageParser {
    /// Parse the file at `path`.
    ///
    /// Returns `Ok(None)` for empty or unparseable content and `Err` only for
    /// I/O failures. `include_full_body` controls whether
    /// [`EmailDocument::body_text`] is populated. Implementations must set
    /// `last_modified_ticks` from the file's mtime at parse time.
    fn parse(&self, path: &Path, include_full_body: bool) -> Result<Option<EmailDocument>>;
}

impl<P: MessageParser + ?Sized> MessageParser for &P {
    fn parse(&self, path: &Path, include_full_body: bool) -> Result<Option<EmailDocument>> {
        (**self).parse(path, include_full_body)
    }
}
