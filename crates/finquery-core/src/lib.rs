#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finquery/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for natural-language financial query parsing.
//!
//! This crate provides the foundational abstractions shared by the parser crates:
//!
//! - [`StructuredQuery`](types::StructuredQuery) - The result of parsing one question
//! - [`PeriodDescriptor`](period::PeriodDescriptor) - Parsed time period
//! - [`Warning`](types::Warning) - Non-fatal parse annotations
//! - [`TableSource`](source::TableSource) - Loading of reference tables
//! - [`text`] - Char-count-preserving folding and tokenization

/// Error types for table loading and configuration.
pub mod error;
/// Period types and descriptors.
pub mod period;
/// Reference-table types and the source trait.
pub mod source;
/// Text folding and tokenization helpers.
pub mod text;
/// Core value types (Ticker, matches, Warning, Intent, StructuredQuery).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{QueryError, Result};
pub use period::{
    Granularity, PeriodDescriptor, PeriodItem, PeriodType, PeriodUnit, RelativeWindow,
};
pub use source::{MetricSynonym, ReferenceTables, TableSource, TickerAlias, TickerOverride};
pub use types::{
    Intent, MatchMethod, MetricId, MetricMatch, StructuredQuery, Ticker, TickerMatch, Warning,
};
