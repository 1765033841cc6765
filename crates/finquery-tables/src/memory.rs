//! In-memory table source.

use async_trait::async_trait;
use finquery_core::{
    MetricSynonym, ReferenceTables, Result, TableSource, TickerAlias, TickerOverride,
};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Mutable in-memory reference tables.
///
/// Rows are stored behind a `RwLock` and cloned out on every load. Parsers
/// built from this source see a snapshot; later edits only take effect for
/// parsers built afterwards.
#[derive(Debug, Default)]
pub struct InMemoryTables {
    tables: RwLock<ReferenceTables>,
}

impl InMemoryTables {
    /// Create a new empty in-memory source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source pre-filled with the given tables.
    #[must_use]
    pub fn from_tables(tables: ReferenceTables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Add a ticker alias.
    pub async fn add_alias(&self, alias: TickerAlias) {
        debug!(alias = %alias.alias, ticker = %alias.ticker, "Adding ticker alias");
        self.tables.write().await.aliases.push(alias);
    }

    /// Add a ticker override.
    pub async fn add_override(&self, rule: TickerOverride) {
        debug!(phrase = %rule.phrase, ticker = %rule.ticker, "Adding ticker override");
        self.tables.write().await.overrides.push(rule);
    }

    /// Add a metric synonym.
    pub async fn add_synonym(&self, synonym: MetricSynonym) {
        debug!(synonym = %synonym.synonym, metric = %synonym.metric_id, "Adding metric synonym");
        self.tables.write().await.synonyms.push(synonym);
    }

    /// Returns a copy of the current tables.
    pub async fn snapshot(&self) -> ReferenceTables {
        self.tables.read().await.clone()
    }

    /// Removes every row.
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        *self.tables.write().await = ReferenceTables::default();
        debug!("Cleared all in-memory tables");
    }
}

#[async_trait]
impl TableSource for InMemoryTables {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ticker_aliases(&self) -> Result<Vec<TickerAlias>> {
        Ok(self.tables.read().await.aliases.clone())
    }

    async fn ticker_overrides(&self) -> Result<Vec<TickerOverride>> {
        Ok(self.tables.read().await.overrides.clone())
    }

    async fn metric_synonyms(&self) -> Result<Vec<MetricSynonym>> {
        Ok(self.tables.read().await.synonyms.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finquery_core::Ticker;

    #[tokio::test]
    async fn test_memory_tables_roundtrip() {
        let source = InMemoryTables::new();

        // Initially empty
        assert!(source.ticker_aliases().await.unwrap().is_empty());

        source
            .add_alias(TickerAlias::new("apple", "AAPL").with_priority(5))
            .await;
        source
            .add_override(TickerOverride::new("berkshire b", "BRK.B", 20))
            .await;
        source
            .add_synonym(MetricSynonym::new("top line", "revenue"))
            .await;

        let tables = ReferenceTables::load(&source).await.unwrap();
        assert_eq!(tables.aliases.len(), 1);
        assert_eq!(tables.aliases[0].priority, 5);
        assert_eq!(tables.overrides[0].ticker, Ticker::new("BRK.B"));
        assert_eq!(tables.synonyms[0].metric_id.as_str(), "revenue");
    }

    #[tokio::test]
    async fn test_memory_tables_clear() {
        let source = InMemoryTables::from_tables(ReferenceTables {
            aliases: vec![TickerAlias::new("tesla", "TSLA")],
            ..Default::default()
        });
        assert_eq!(source.snapshot().await.aliases.len(), 1);

        source.clear().await;

        assert!(source.snapshot().await.is_empty());
    }
}
