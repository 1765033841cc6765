//! Reference tables embedded at compile time.

use async_trait::async_trait;
use finquery_core::{
    MetricSynonym, QueryError, ReferenceTables, Result, TableSource, TickerAlias, TickerOverride,
};
use tracing::trace;

const REFERENCE_TABLES_JSON: &str = include_str!("../data/reference_tables.json");

/// The reference tables shipped with the crate.
///
/// Covers large US-listed companies, the share-class overrides for Alphabet and
/// Berkshire Hathaway, and the common metric vocabulary. Useful as a default
/// and for tests; production deployments usually load a fuller table set from
/// [`SqliteTables`](crate::SqliteTables) or [`JsonFileTables`](crate::JsonFileTables).
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTables;

impl BuiltinTables {
    /// Create a new builtin source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decodes the embedded tables synchronously.
    ///
    /// # Errors
    /// Returns an error if the embedded JSON is malformed.
    pub fn tables() -> Result<ReferenceTables> {
        serde_json::from_str(REFERENCE_TABLES_JSON)
            .map_err(|e| QueryError::Parse(format!("Embedded reference tables: {e}")))
    }
}

#[async_trait]
impl TableSource for BuiltinTables {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn ticker_aliases(&self) -> Result<Vec<TickerAlias>> {
        let aliases = Self::tables()?.aliases;
        trace!(count = aliases.len(), "BuiltinTables: loaded ticker aliases");
        Ok(aliases)
    }

    async fn ticker_overrides(&self) -> Result<Vec<TickerOverride>> {
        let overrides = Self::tables()?.overrides;
        trace!(count = overrides.len(), "BuiltinTables: loaded ticker overrides");
        Ok(overrides)
    }

    async fn metric_synonyms(&self) -> Result<Vec<MetricSynonym>> {
        let synonyms = Self::tables()?.synonyms;
        trace!(count = synonyms.len(), "BuiltinTables: loaded metric synonyms");
        Ok(synonyms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finquery_core::{MetricId, Ticker};

    #[test]
    fn test_embedded_tables_decode() {
        let tables = BuiltinTables::tables().unwrap();
        assert!(!tables.aliases.is_empty());
        assert!(!tables.overrides.is_empty());
        assert!(!tables.synonyms.is_empty());
    }

    #[test]
    fn test_embedded_tables_cover_core_entries() {
        let tables = BuiltinTables::tables().unwrap();
        assert!(
            tables
                .aliases
                .iter()
                .any(|a| a.alias == "apple" && a.ticker == Ticker::new("AAPL"))
        );
        assert!(
            tables
                .synonyms
                .iter()
                .any(|s| s.synonym == "p/e ratio" && s.metric_id == MetricId::new("pe_ratio"))
        );
        assert!(
            tables
                .overrides
                .iter()
                .any(|o| o.ticker == Ticker::new("GOOG"))
        );
    }

    #[tokio::test]
    async fn test_builtin_source_load() {
        let tables = ReferenceTables::load(&BuiltinTables::new()).await.unwrap();
        assert_eq!(tables, BuiltinTables::tables().unwrap());
    }
}
