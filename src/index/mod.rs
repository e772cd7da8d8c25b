//! Persistent search index: SQLite schema, FTS5 shadow, query compilation.

pub mod compile;
pub mod fts;
pub mod schema;
pub mod store;

pub use store::{IndexHit, IndexOptions, SearchIndex};

#[cfg(test)]
mod tests;
