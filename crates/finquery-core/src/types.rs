//! Core value types for parsed queries.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Ticker`] - Exchange ticker symbol
//! - [`MetricId`] - Canonical financial metric identifier
//! - [`TickerMatch`] - A ticker resolved from query text
//! - [`MetricMatch`] - A metric resolved from query text
//! - [`Warning`] - Non-fatal annotation on a parsed query
//! - [`Intent`] - What the user wants done
//! - [`StructuredQuery`] - The complete parse result

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;
use crate::period::PeriodDescriptor;

/// A trading symbol/ticker.
///
/// Tickers are automatically trimmed and uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Creates a new ticker from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the ticker as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the ticker with share-class punctuation removed (`BRK.B` -> `BRKB`).
    #[must_use]
    pub fn compact(&self) -> String {
        compact_symbol(&self.0)
    }

    /// Returns true if the ticker is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Uppercases a symbol and removes share-class separators.
#[must_use]
pub fn compact_symbol(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '.' | '-' | '/'))
        .flat_map(char::to_uppercase)
        .collect()
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ticker {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Ticker {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Canonical identifier of a financial metric (e.g. `revenue`, `pe_ratio`).
///
/// Identifiers are trimmed and lowercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct MetricId(String);

impl MetricId {
    /// Creates a new metric id, converting to lowercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_lowercase())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MetricId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MetricId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// How a ticker was resolved from the text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// The ticker symbol was written verbatim.
    Exact,
    /// The ticker symbol was written with different share-class punctuation.
    Normalized,
    /// A curated override phrase matched.
    Override,
    /// A company name or alias matched.
    Alias,
    /// An alias matched approximately.
    Fuzzy,
    /// Nothing matched; the configured default was substituted.
    Default,
}

/// A ticker resolved from the query text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickerMatch {
    /// Original-case text fragment that produced the match.
    pub input: String,
    /// Resolved ticker.
    pub ticker: Ticker,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Resolution strategy.
    pub method: MatchMethod,
    /// Character offset of the fragment in the query.
    pub position: usize,
}

impl TickerMatch {
    /// Creates a new ticker match.
    #[must_use]
    pub fn new(
        input: impl Into<String>,
        ticker: Ticker,
        confidence: f64,
        method: MatchMethod,
        position: usize,
    ) -> Self {
        Self {
            input: input.into(),
            ticker,
            confidence,
            method,
            position,
        }
    }

    /// Creates the placeholder match used when no ticker was found.
    #[must_use]
    pub fn default_for(ticker: Ticker) -> Self {
        Self::new("", ticker, 0.0, MatchMethod::Default, 0)
    }
}

/// A metric resolved from the query text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricMatch {
    /// Original-case text fragment that produced the match.
    pub input: String,
    /// Canonical metric id.
    pub metric_id: MetricId,
    /// Character offset of the fragment in the query.
    pub position: usize,
}

/// Non-fatal annotation describing an assumption made while parsing.
///
/// Warnings travel as strings (`missing_ticker`, `default_ticker:AAPL`, ...);
/// [`Warning::code`] returns the bare tag without detail.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Warning {
    /// No ticker could be resolved.
    MissingTicker,
    /// The configured default ticker was substituted.
    DefaultTicker(Ticker),
    /// No metric could be resolved.
    MissingMetric,
    /// A ticker was accepted on approximate string similarity only.
    FuzzyMatch {
        /// Fragment that matched approximately.
        input: String,
        /// Ticker it was mapped to.
        ticker: Ticker,
    },
    /// A two-digit year was read as `20XX`.
    AmbiguousYear(String),
    /// A range whose start equals its end.
    AmbiguousRange(String),
    /// A range whose start is after its end.
    ReversedRange(String),
    /// A range with more than two endpoints.
    MalformedRange(String),
    /// A range mixing fiscal and calendar endpoints.
    MixedRange(String),
}

impl Warning {
    /// Returns the tag of this warning without detail.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingTicker => "missing_ticker",
            Self::DefaultTicker(_) => "default_ticker",
            Self::MissingMetric => "missing_metric",
            Self::FuzzyMatch { .. } => "fuzzy_match",
            Self::AmbiguousYear(_) => "ambiguous_year",
            Self::AmbiguousRange(_) => "ambiguous_range",
            Self::ReversedRange(_) => "reversed_range",
            Self::MalformedRange(_) => "malformed_range",
            Self::MixedRange(_) => "mixed_range",
        }
    }

    /// Returns true for warnings emitted by the time-period grammar.
    #[must_use]
    pub const fn is_period_warning(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousYear(_)
                | Self::AmbiguousRange(_)
                | Self::ReversedRange(_)
                | Self::MalformedRange(_)
                | Self::MixedRange(_)
        )
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTicker | Self::MissingMetric => f.write_str(self.code()),
            Self::DefaultTicker(ticker) => write!(f, "{}:{}", self.code(), ticker),
            Self::FuzzyMatch { input, ticker } => {
                write!(f, "{}:{}->{}", self.code(), input, ticker)
            }
            Self::AmbiguousYear(detail)
            | Self::AmbiguousRange(detail)
            | Self::ReversedRange(detail)
            | Self::MalformedRange(detail)
            | Self::MixedRange(detail) => write!(f, "{}:{}", self.code(), detail),
        }
    }
}

impl FromStr for Warning {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, detail) = match s.split_once(':') {
            Some((code, detail)) => (code, Some(detail)),
            None => (s, None),
        };
        let detail = || {
            detail
                .map(str::to_string)
                .ok_or_else(|| QueryError::Parse(format!("Warning {code} requires detail")))
        };
        match code {
            "missing_ticker" => Ok(Self::MissingTicker),
            "missing_metric" => Ok(Self::MissingMetric),
            "default_ticker" => Ok(Self::DefaultTicker(Ticker::new(detail()?))),
            "fuzzy_match" => {
                let detail = detail()?;
                let (input, ticker) = detail.rsplit_once("->").ok_or_else(|| {
                    QueryError::Parse(format!("Invalid fuzzy_match detail: {detail}"))
                })?;
                Ok(Self::FuzzyMatch {
                    input: input.to_string(),
                    ticker: Ticker::new(ticker),
                })
            }
            "ambiguous_year" => Ok(Self::AmbiguousYear(detail()?)),
            "ambiguous_range" => Ok(Self::AmbiguousRange(detail()?)),
            "reversed_range" => Ok(Self::ReversedRange(detail()?)),
            "malformed_range" => Ok(Self::MalformedRange(detail()?)),
            "mixed_range" => Ok(Self::MixedRange(detail()?)),
            other => Err(QueryError::Parse(format!("Unknown warning: {other}"))),
        }
    }
}

impl TryFrom<String> for Warning {
    type Error = QueryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Warning> for String {
    fn from(w: Warning) -> Self {
        w.to_string()
    }
}

/// The user's goal, as determined by the intent classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Fetch a value.
    #[default]
    Lookup,
    /// Put two or more companies side by side.
    Compare,
    /// Order companies by a metric.
    Rank,
    /// Define or explain a metric.
    ExplainMetric,
    /// Look at change over time.
    Trend,
}

impl Intent {
    /// Returns the wire name of this intent.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Compare => "compare",
            Self::Rank => "rank",
            Self::ExplainMetric => "explain_metric",
            Self::Trend => "trend",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured representation of a free-text financial question.
///
/// Consumed by the analytics and prompt-construction layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Classified intent.
    pub intent: Intent,
    /// Resolved tickers in order of appearance, unique by ticker.
    pub tickers: Vec<TickerMatch>,
    /// Resolved metrics in order of appearance, unique by metric id.
    pub metrics: Vec<MetricMatch>,
    /// Parsed time period.
    pub periods: PeriodDescriptor,
    /// Assumptions and low-confidence decisions, in the order they were made.
    pub warnings: Vec<Warning>,
    /// The input exactly as given.
    pub free_text: String,
    /// The input after NFKC and whitespace collapsing; match positions are
    /// char offsets into it.
    #[serde(default)]
    pub normalized_text: String,
}

impl StructuredQuery {
    /// Returns the resolved tickers without match metadata.
    #[must_use]
    pub fn ticker_symbols(&self) -> Vec<&Ticker> {
        self.tickers.iter().map(|m| &m.ticker).collect()
    }

    /// Returns the resolved metric ids without match metadata.
    #[must_use]
    pub fn metric_ids(&self) -> Vec<&MetricId> {
        self.metrics.iter().map(|m| &m.metric_id).collect()
    }

    /// Returns true if any warning carries the given code.
    #[must_use]
    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code() == code)
    }

    /// Returns true if the ticker list holds only the substituted default.
    #[must_use]
    pub fn used_default_ticker(&self) -> bool {
        self.tickers.iter().any(|m| m.method == MatchMethod::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_creation() {
        assert_eq!(Ticker::new(" aapl ").as_str(), "AAPL");
        assert_eq!(Ticker::new("brk.b").as_str(), "BRK.B");
        assert_eq!(Ticker::new("BRK.B").compact(), "BRKB");
        assert_eq!(compact_symbol("brk-b"), "BRKB");
    }

    #[test]
    fn test_metric_id_lowercased() {
        assert_eq!(MetricId::new("PE_Ratio").as_str(), "pe_ratio");
    }

    #[test]
    fn test_warning_strings() {
        assert_eq!(Warning::MissingTicker.to_string(), "missing_ticker");
        assert_eq!(
            Warning::DefaultTicker(Ticker::new("AAPL")).to_string(),
            "default_ticker:AAPL"
        );
        let fuzzy = Warning::FuzzyMatch {
            input: "microsfot".into(),
            ticker: Ticker::new("MSFT"),
        };
        assert_eq!(fuzzy.to_string(), "fuzzy_match:microsfot->MSFT");
        assert_eq!(fuzzy.code(), "fuzzy_match");
    }

    #[test]
    fn test_warning_parse() {
        let w: Warning = "default_ticker:MSFT".parse().unwrap();
        assert_eq!(w, Warning::DefaultTicker(Ticker::new("MSFT")));

        let w: Warning = "fuzzy_match:tesl a->TSLA".parse().unwrap();
        assert_eq!(w.code(), "fuzzy_match");

        assert!("default_ticker".parse::<Warning>().is_err());
        assert!("no_such_warning".parse::<Warning>().is_err());
    }

    #[test]
    fn test_warning_serde_as_string() {
        let json = serde_json::to_string(&vec![
            Warning::MissingTicker,
            Warning::DefaultTicker(Ticker::new("AAPL")),
        ])
        .unwrap();
        assert_eq!(json, r#"["missing_ticker","default_ticker:AAPL"]"#);

        let back: Vec<Warning> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[1], Warning::DefaultTicker(Ticker::new("AAPL")));
    }

    #[test]
    fn test_intent_wire_names() {
        assert_eq!(Intent::ExplainMetric.to_string(), "explain_metric");
        assert_eq!(
            serde_json::to_string(&Intent::Trend).unwrap(),
            r#""trend""#
        );
    }
}
