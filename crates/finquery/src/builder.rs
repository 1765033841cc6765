//! Builder that merges reference tables from several sources.

use std::sync::Arc;

use tracing::{debug, warn};

use finquery_core::{QueryError, ReferenceTables, Result, TableSource};
use finquery_tables::BuiltinTables;

use crate::config::ParserConfig;
use crate::parser::QueryParser;

/// Builds a [`QueryParser`] from one or more table sources.
///
/// Sources are loaded in registration order and their rows are concatenated,
/// so earlier sources win wherever the resolvers keep the first row seen. A
/// source that fails to load is skipped with a warning; building fails only if
/// every source fails.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use finquery::{JsonFileTables, QueryParserBuilder};
///
/// # async fn run() -> finquery::Result<()> {
/// let parser = QueryParserBuilder::new()
///     .with_source(Arc::new(JsonFileTables::new("local_aliases.json")))
///     .with_builtin()
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct QueryParserBuilder {
    sources: Vec<Arc<dyn TableSource>>,
    config: ParserConfig,
}

impl std::fmt::Debug for QueryParserBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParserBuilder")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}

impl QueryParserBuilder {
    /// Create a builder with no sources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn TableSource>) -> Self {
        debug!(source = source.name(), "Registering table source");
        self.sources.push(source);
        self
    }

    /// Add the embedded tables.
    #[must_use]
    pub fn with_builtin(self) -> Self {
        self.with_source(Arc::new(BuiltinTables::new()))
    }

    /// Set the parser configuration.
    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of registered sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Load every source and build the parser.
    ///
    /// # Errors
    /// Returns [`QueryError::InvalidParameter`] if no source is registered, the
    /// last source error if all of them fail, or any error of
    /// [`QueryParser::new`].
    pub async fn build(self) -> Result<QueryParser> {
        if self.sources.is_empty() {
            return Err(QueryError::InvalidParameter(
                "No table sources registered".to_string(),
            ));
        }

        let mut tables = ReferenceTables::new();
        let mut loaded = 0usize;
        let mut last_error = None;
        for source in &self.sources {
            match ReferenceTables::load(source.as_ref()).await {
                Ok(part) => {
                    debug!(
                        source = source.name(),
                        aliases = part.aliases.len(),
                        overrides = part.overrides.len(),
                        synonyms = part.synonyms.len(),
                        "Loaded reference tables"
                    );
                    tables.extend(part);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(
                        source = source.name(),
                        error = %e,
                        "Table source failed, skipping"
                    );
                    last_error = Some(e);
                }
            }
        }

        if loaded == 0 {
            return Err(last_error
                .unwrap_or_else(|| QueryError::Other("All sources failed with no error".to_string())));
        }
        QueryParser::new(&tables, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finquery_core::{MatchMethod, MetricSynonym, TickerAlias, TickerOverride};
    use finquery_tables::{InMemoryTables, JsonFileTables};

    #[tokio::test]
    async fn test_empty_builder_fails() {
        let result = QueryParserBuilder::new().build().await;
        assert!(matches!(result, Err(QueryError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_builtin_only() {
        let parser = QueryParserBuilder::new().with_builtin().build().await.unwrap();
        let query = parser.parse("Apple revenue 2023");
        assert_eq!(query.tickers[0].ticker.as_str(), "AAPL");
    }

    #[tokio::test]
    async fn test_sources_are_merged() {
        let local = InMemoryTables::new();
        local.add_alias(TickerAlias::new("fruit company", "AAPL")).await;
        local
            .add_override(TickerOverride::new("the search giant", "GOOGL", 50))
            .await;
        local
            .add_synonym(MetricSynonym::new("headcount", "employees"))
            .await;

        let parser = QueryParserBuilder::new()
            .with_source(Arc::new(local))
            .with_builtin()
            .build()
            .await
            .unwrap();

        let query = parser.parse("fruit company headcount vs Microsoft");
        let symbols: Vec<_> = query.tickers.iter().map(|m| m.ticker.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(query.metrics[0].metric_id.as_str(), "employees");

        let query = parser.parse("the search giant revenue");
        assert_eq!(query.tickers[0].ticker.as_str(), "GOOGL");
        assert_eq!(query.tickers[0].method, MatchMethod::Override);
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let parser = QueryParserBuilder::new()
            .with_source(Arc::new(JsonFileTables::new(dir.path().join("missing.json"))))
            .with_builtin()
            .build()
            .await
            .unwrap();
        assert!(!parser.parse("Tesla EPS").used_default_ticker());
    }

    #[tokio::test]
    async fn test_all_sources_failing() {
        let dir = tempfile::tempdir().unwrap();
        let result = QueryParserBuilder::new()
            .with_source(Arc::new(JsonFileTables::new(dir.path().join("a.json"))))
            .with_source(Arc::new(JsonFileTables::new(dir.path().join("b.json"))))
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_is_applied() {
        let parser = QueryParserBuilder::new()
            .with_builtin()
            .with_config(ParserConfig::new().with_default_ticker("QQQ"))
            .build()
            .await
            .unwrap();
        assert_eq!(parser.config().default_ticker.as_str(), "QQQ");
        assert_eq!(parser.parse("revenue").tickers[0].ticker.as_str(), "QQQ");
    }

    #[test]
    fn test_debug_lists_sources() {
        let builder = QueryParserBuilder::new().with_builtin();
        assert_eq!(builder.source_count(), 1);
        assert!(format!("{builder:?}").contains("builtin"));
    }
}
