#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finquery/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # Example
//!
//! ```
//! use finquery::{Intent, QueryParser};
//!
//! let parser = QueryParser::builtin().unwrap();
//! let query = parser.parse("revenue 2023");
//!
//! assert_eq!(query.intent, Intent::Lookup);
//! assert_eq!(query.tickers[0].ticker.as_str(), "AAPL");
//! assert!(query.has_warning("default_ticker"));
//! ```

// Core types and traits
pub use finquery_core::*;

// Table sources
#[cfg(feature = "tables-sqlite")]
pub use finquery_tables::SqliteTables;
pub use finquery_tables::{BuiltinTables, InMemoryTables, JsonFileTables};

// Resolvers
pub use finquery_intent::{Classification, Evidence, IntentClassifier, Signals};
pub use finquery_metrics::MetricResolver;
pub use finquery_periods::{
    MAX_RELATIVE_COUNT, PeriodGrammar, fiscal_quarter_of, period_bounds, resolve_items,
};
pub use finquery_tickers::{AliasIndex, FuzzyConfig, TickerResolution, TickerResolver};

mod builder;
mod config;
mod parser;

pub use builder::QueryParserBuilder;
pub use config::{DEFAULT_TICKER, ParserConfig};
pub use parser::{QueryParser, normalize_query};
