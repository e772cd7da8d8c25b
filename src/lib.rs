//! `mailsift` is a local full-text and structured search index for
//! file-based email archives.
//!
//! The library keeps an SQLite database with an FTS5 shadow table in sync
//! through triggers, compiles filter queries into ranked paginated SQL, and
//! re-indexes archives incrementally by comparing file modification times.

pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod scanner;
pub mod search;
