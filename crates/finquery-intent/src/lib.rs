#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finquery/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// The rule table and classifier.
pub mod classifier;

pub use classifier::{Classification, Evidence, IntentClassifier, Signals};
