#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finquery/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Reference-table sources for the query parser.
//!
//! This crate provides implementations of the [`TableSource`] trait from `finquery-core`:
//!
//! - [`BuiltinTables`] - Tables embedded at compile time
//! - [`InMemoryTables`] - Mutable in-memory tables for testing
//! - [`JsonFileTables`] - Tables read from a JSON document
//! - [`SqliteTables`] - Persistent SQLite-backed tables (default, requires `sqlite` feature)

/// Embedded reference tables.
pub mod builtin;
/// JSON-file table source.
pub mod json;
/// In-memory table source.
pub mod memory;

/// SQLite-based table source.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use finquery_core::TableSource;

// Re-export implementations
pub use builtin::BuiltinTables;
pub use json::JsonFileTables;
pub use memory::InMemoryTables;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTables;
