//! Reference-table types and the source trait that loads them.
//!
//! This module defines the [`TableSource`] trait that provides a unified
//! interface for loading ticker aliases, ticker overrides and metric synonyms,
//! and [`ReferenceTables`], the bundle every parser is built from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{MetricId, Ticker},
};

/// A free-text name or abbreviation that resolves to a ticker.
///
/// Several aliases may point at one ticker, and one alias text may appear for
/// several tickers; `priority` decides between the latter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerAlias {
    /// Alias text (normalized when indexed).
    pub alias: String,
    /// Canonical ticker.
    pub ticker: Ticker,
    /// Higher wins when one alias text maps to several tickers.
    #[serde(default)]
    pub priority: i32,
}

impl TickerAlias {
    /// Creates a new alias with priority 0.
    #[must_use]
    pub fn new(alias: impl Into<String>, ticker: impl Into<Ticker>) -> Self {
        Self {
            alias: alias.into(),
            ticker: ticker.into(),
            priority: 0,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// A curated phrase for company names that are ambiguous between share classes
/// or corporate entities ("Alphabet Class C", "Berkshire B").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerOverride {
    /// Phrase to look for.
    pub phrase: String,
    /// Ticker the phrase forces.
    pub ticker: Ticker,
    /// Higher wins when several override phrases occur in one query.
    #[serde(default)]
    pub priority: i32,
}

impl TickerOverride {
    /// Creates a new override.
    #[must_use]
    pub fn new(phrase: impl Into<String>, ticker: impl Into<Ticker>, priority: i32) -> Self {
        Self {
            phrase: phrase.into(),
            ticker: ticker.into(),
            priority,
        }
    }
}

/// A surface phrase for a financial metric ("top line" -> `revenue`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSynonym {
    /// Surface phrase.
    pub synonym: String,
    /// Canonical metric id.
    pub metric_id: MetricId,
}

impl MetricSynonym {
    /// Creates a new synonym.
    #[must_use]
    pub fn new(synonym: impl Into<String>, metric_id: impl Into<MetricId>) -> Self {
        Self {
            synonym: synonym.into(),
            metric_id: metric_id.into(),
        }
    }
}

/// The static reference data a query parser is built from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTables {
    /// Company names and abbreviations.
    #[serde(default)]
    pub aliases: Vec<TickerAlias>,
    /// Curated overrides for ambiguous names.
    #[serde(default)]
    pub overrides: Vec<TickerOverride>,
    /// Metric synonyms.
    #[serde(default)]
    pub synonyms: Vec<MetricSynonym>,
}

impl ReferenceTables {
    /// Creates an empty table bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads all three tables from a source.
    ///
    /// # Errors
    /// Returns the first error reported by the source.
    pub async fn load(source: &dyn TableSource) -> Result<Self> {
        Ok(Self {
            aliases: source.ticker_aliases().await?,
            overrides: source.ticker_overrides().await?,
            synonyms: source.metric_synonyms().await?,
        })
    }

    /// Appends another bundle's rows to this one.
    pub fn extend(&mut self, other: Self) {
        self.aliases.extend(other.aliases);
        self.overrides.extend(other.overrides);
        self.synonyms.extend(other.synonyms);
    }

    /// Returns every ticker mentioned by an alias or override.
    #[must_use]
    pub fn known_tickers(&self) -> BTreeSet<Ticker> {
        self.aliases
            .iter()
            .map(|a| a.ticker.clone())
            .chain(self.overrides.iter().map(|o| o.ticker.clone()))
            .collect()
    }

    /// Returns true if all tables are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty() && self.overrides.is_empty() && self.synonyms.is_empty()
    }
}

/// Trait for loading the reference tables a parser consumes.
///
/// Implementations can read from various backends (embedded data, JSON files,
/// SQLite, etc.). Loading happens once, before a parser is constructed; parsing
/// itself never touches a source.
#[async_trait]
pub trait TableSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g., "builtin").
    fn name(&self) -> &str;

    /// Loads the ticker alias table.
    async fn ticker_aliases(&self) -> Result<Vec<TickerAlias>>;

    /// Loads the manual override table.
    ///
    /// Sources without overrides return an empty list.
    async fn ticker_overrides(&self) -> Result<Vec<TickerOverride>> {
        Ok(Vec::new())
    }

    /// Loads the metric synonym table.
    async fn metric_synonyms(&self) -> Result<Vec<MetricSynonym>>;
}
