#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finquery/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Rule-table grammar for period expressions.
pub mod grammar;
/// As-of-date resolution of relative and latest periods.
pub mod resolve;

pub use grammar::{MAX_RELATIVE_COUNT, PeriodGrammar};
pub use resolve::{fiscal_quarter_of, period_bounds, resolve_items};
