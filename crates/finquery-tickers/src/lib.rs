#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finquery/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Fuzzy-matching settings and similarity scoring.
pub mod fuzzy;
/// Alias, override and symbol lookup index.
pub mod index;
/// The resolution pipeline.
pub mod resolver;

pub use fuzzy::FuzzyConfig;
pub use index::AliasIndex;
pub use resolver::{TickerResolution, TickerResolver};
