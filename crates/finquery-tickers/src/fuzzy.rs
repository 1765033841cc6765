//! Approximate alias matching.

use finquery_core::{QueryError, Result};
use serde::{Deserialize, Serialize};

/// Settings for the fuzzy fallback strategy.
///
/// Short candidates need a higher similarity: one typo in a five-letter word
/// already costs 0.2, which would let too many ordinary words through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Whether the fuzzy strategy runs at all.
    pub enabled: bool,
    /// Minimum similarity for candidates of at most `short_max_len` chars.
    pub short_threshold: f64,
    /// Minimum similarity for longer candidates.
    pub long_threshold: f64,
    /// Length boundary between short and long candidates.
    pub short_max_len: usize,
    /// Longest multi-word phrase considered as a candidate.
    pub max_phrase_words: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            short_threshold: 0.9,
            long_threshold: 0.8,
            short_max_len: 5,
            max_phrase_words: 3,
        }
    }
}

impl FuzzyConfig {
    /// Returns a config with the fuzzy strategy turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets both thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, short: f64, long: f64) -> Self {
        self.short_threshold = short;
        self.long_threshold = long;
        self
    }

    /// Returns the threshold that applies to a candidate of `len` chars.
    #[must_use]
    pub const fn threshold_for(&self, len: usize) -> f64 {
        if len <= self.short_max_len {
            self.short_threshold
        } else {
            self.long_threshold
        }
    }

    /// Checks that thresholds lie in `0..=1` and the phrase length is usable.
    ///
    /// # Errors
    /// Returns [`QueryError::InvalidParameter`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("short_threshold", self.short_threshold),
            ("long_threshold", self.long_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(QueryError::InvalidParameter(format!(
                    "fuzzy.{name} must be within 0..=1, got {value}"
                )));
            }
        }
        if self.max_phrase_words == 0 {
            return Err(QueryError::InvalidParameter(
                "fuzzy.max_phrase_words must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Similarity of two folded strings in `0.0..=1.0`.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_damerau_levenshtein(a, b)
}
