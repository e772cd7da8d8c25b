//! Core data model types for indexed email documents.

pub mod document;
