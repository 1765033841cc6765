//! JSON-file table source.

use async_trait::async_trait;
use finquery_core::{
    MetricSynonym, QueryError, ReferenceTables, Result, TableSource, TickerAlias, TickerOverride,
};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

/// Reference tables stored as one JSON document.
///
/// The document has the shape `{"aliases": [...], "overrides": [...],
/// "synonyms": [...]}`; every key is optional. The file is read once, on the
/// first load, and the decoded tables are kept for later calls.
#[derive(Debug)]
pub struct JsonFileTables {
    path: PathBuf,
    tables: OnceCell<ReferenceTables>,
}

impl JsonFileTables {
    /// Create a source reading from the given path.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            tables: OnceCell::new(),
        }
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes tables to a JSON file, replacing its contents.
    ///
    /// # Errors
    /// Returns an error if encoding or writing fails.
    #[instrument(skip(path, tables), fields(path = %path.as_ref().display()))]
    pub async fn save(path: impl AsRef<Path>, tables: &ReferenceTables) -> Result<()> {
        let json = serde_json::to_string_pretty(tables)
            .map_err(|e| QueryError::Parse(e.to_string()))?;
        tokio::fs::write(path.as_ref(), json)
            .await
            .map_err(|e| QueryError::Io(e.to_string()))?;
        debug!("Wrote reference tables");
        Ok(())
    }

    async fn tables(&self) -> Result<&ReferenceTables> {
        self.tables
            .get_or_try_init(|| async {
                let raw = tokio::fs::read_to_string(&self.path)
                    .await
                    .map_err(|e| QueryError::Io(format!("{}: {e}", self.path.display())))?;
                let tables: ReferenceTables = serde_json::from_str(&raw)
                    .map_err(|e| QueryError::Parse(format!("{}: {e}", self.path.display())))?;
                debug!(
                    path = %self.path.display(),
                    aliases = tables.aliases.len(),
                    overrides = tables.overrides.len(),
                    synonyms = tables.synonyms.len(),
                    "Loaded reference tables from JSON"
                );
                Ok(tables)
            })
            .await
    }
}

#[async_trait]
impl TableSource for JsonFileTables {
    fn name(&self) -> &str {
        "json"
    }

    async fn ticker_aliases(&self) -> Result<Vec<TickerAlias>> {
        Ok(self.tables().await?.aliases.clone())
    }

    async fn ticker_overrides(&self) -> Result<Vec<TickerOverride>> {
        Ok(self.tables().await?.overrides.clone())
    }

    async fn metric_synonyms(&self) -> Result<Vec<MetricSynonym>> {
        Ok(self.tables().await?.synonyms.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_tables_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");

        let tables = ReferenceTables {
            aliases: vec![TickerAlias::new("nvidia", "NVDA")],
            overrides: vec![TickerOverride::new("alphabet class c", "GOOG", 20)],
            synonyms: vec![MetricSynonym::new("eps", "eps")],
        };
        JsonFileTables::save(&path, &tables).await.unwrap();

        let source = JsonFileTables::new(&path);
        let loaded = ReferenceTables::load(&source).await.unwrap();
        assert_eq!(loaded, tables);
    }

    #[tokio::test]
    async fn test_json_tables_partial_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synonyms.json");
        tokio::fs::write(
            &path,
            r#"{"synonyms": [{"synonym": "top line", "metric_id": "revenue"}]}"#,
        )
        .await
        .unwrap();

        let source = JsonFileTables::new(&path);
        assert!(source.ticker_aliases().await.unwrap().is_empty());
        assert_eq!(source.metric_synonyms().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_json_tables_missing_file() {
        let source = JsonFileTables::new("/nonexistent/finquery/tables.json");
        let err = source.ticker_aliases().await.unwrap_err();
        assert!(matches!(err, QueryError::Io(_)));
    }

    #[tokio::test]
    async fn test_json_tables_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = JsonFileTables::new(&path).metric_synonyms().await.unwrap_err();
        assert!(matches!(err, QueryError::Parse(_)));
    }
}
