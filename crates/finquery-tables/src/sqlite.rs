//! SQLite-backed table source.

use async_trait::async_trait;
use finquery_core::{
    MetricId, MetricSynonym, QueryError, ReferenceTables, Result, TableSource, Ticker, TickerAlias,
    TickerOverride,
};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

/// SQLite-backed reference tables.
///
/// Stores aliases, overrides and synonyms in three tables of a SQLite
/// database, so a deployment can curate them without rebuilding. The schema
/// is created on open if it does not exist.
#[derive(Debug)]
pub struct SqliteTables {
    conn: Mutex<Connection>,
}

impl SqliteTables {
    /// Open (or create) a SQLite table store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| QueryError::source("sqlite", e))?;
        let tables = Self {
            conn: Mutex::new(conn),
        };
        tables.initialize_schema()?;
        Ok(tables)
    }

    /// Create an in-memory SQLite table store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| QueryError::source("sqlite", e))?;
        let tables = Self {
            conn: Mutex::new(conn),
        };
        tables.initialize_schema()?;
        Ok(tables)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ticker_aliases (
                alias TEXT NOT NULL,
                ticker TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (alias, ticker)
            )",
            [],
        )
        .map_err(|e| QueryError::source("sqlite", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ticker_overrides (
                phrase TEXT NOT NULL,
                ticker TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (phrase, ticker)
            )",
            [],
        )
        .map_err(|e| QueryError::source("sqlite", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS metric_synonyms (
                synonym TEXT NOT NULL PRIMARY KEY,
                metric_id TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| QueryError::source("sqlite", e))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_ticker_aliases_ticker
             ON ticker_aliases(ticker)",
            [],
        )
        .map_err(|e| QueryError::source("sqlite", e))?;

        debug!("SQLite table schema initialized");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| QueryError::source("sqlite", e))
    }

    /// Insert or replace a ticker alias.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_alias(&self, alias: &TickerAlias) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO ticker_aliases (alias, ticker, priority)
                 VALUES (?1, ?2, ?3)",
                params![alias.alias, alias.ticker.as_str(), alias.priority],
            )
            .map_err(|e| QueryError::source("sqlite", e))?;
        Ok(())
    }

    /// Insert or replace a ticker override.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_override(&self, rule: &TickerOverride) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO ticker_overrides (phrase, ticker, priority)
                 VALUES (?1, ?2, ?3)",
                params![rule.phrase, rule.ticker.as_str(), rule.priority],
            )
            .map_err(|e| QueryError::source("sqlite", e))?;
        Ok(())
    }

    /// Insert or replace a metric synonym.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_synonym(&self, synonym: &MetricSynonym) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO metric_synonyms (synonym, metric_id) VALUES (?1, ?2)",
                params![synonym.synonym, synonym.metric_id.as_str()],
            )
            .map_err(|e| QueryError::source("sqlite", e))?;
        Ok(())
    }

    /// Seed the store with a whole table bundle in one transaction.
    ///
    /// # Errors
    /// Returns an error if any insert fails; nothing is written in that case.
    #[instrument(skip(self, tables), fields(aliases = tables.aliases.len(), synonyms = tables.synonyms.len()))]
    pub fn insert_tables(&self, tables: &ReferenceTables) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| QueryError::source("sqlite", e))?;

        for alias in &tables.aliases {
            tx.execute(
                "INSERT OR REPLACE INTO ticker_aliases (alias, ticker, priority)
                 VALUES (?1, ?2, ?3)",
                params![alias.alias, alias.ticker.as_str(), alias.priority],
            )
            .map_err(|e| QueryError::source("sqlite", e))?;
        }
        for rule in &tables.overrides {
            tx.execute(
                "INSERT OR REPLACE INTO ticker_overrides (phrase, ticker, priority)
                 VALUES (?1, ?2, ?3)",
                params![rule.phrase, rule.ticker.as_str(), rule.priority],
            )
            .map_err(|e| QueryError::source("sqlite", e))?;
        }
        for synonym in &tables.synonyms {
            tx.execute(
                "INSERT OR REPLACE INTO metric_synonyms (synonym, metric_id) VALUES (?1, ?2)",
                params![synonym.synonym, synonym.metric_id.as_str()],
            )
            .map_err(|e| QueryError::source("sqlite", e))?;
        }

        tx.commit().map_err(|e| QueryError::source("sqlite", e))?;
        debug!("Seeded SQLite reference tables");
        Ok(())
    }

    /// Reads `(text, target, priority)` rows, skipping blank ones.
    fn query_rows(&self, sql: &str) -> Result<Vec<(String, String, i32)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| QueryError::source("sqlite", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i32>(2)?,
                ))
            })
            .map_err(|e| QueryError::source("sqlite", e))?;

        let mut out = Vec::new();
        for row in rows {
            let (text, target, priority) = row.map_err(|e| QueryError::source("sqlite", e))?;
            if text.trim().is_empty() || target.trim().is_empty() {
                warn!(text = %text, target = %target, "Skipping blank reference row");
                continue;
            }
            out.push((text, target, priority));
        }
        Ok(out)
    }
}

#[async_trait]
impl TableSource for SqliteTables {
    fn name(&self) -> &str {
        "sqlite"
    }

    #[instrument(skip(self))]
    async fn ticker_aliases(&self) -> Result<Vec<TickerAlias>> {
        let rows = self.query_rows(
            "SELECT alias, ticker, priority FROM ticker_aliases ORDER BY ticker, alias",
        )?;
        debug!(count = rows.len(), "Loaded ticker aliases");
        Ok(rows
            .into_iter()
            .map(|(alias, ticker, priority)| TickerAlias {
                alias,
                ticker: Ticker::new(ticker),
                priority,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn ticker_overrides(&self) -> Result<Vec<TickerOverride>> {
        let rows = self.query_rows(
            "SELECT phrase, ticker, priority FROM ticker_overrides ORDER BY priority DESC, phrase",
        )?;
        debug!(count = rows.len(), "Loaded ticker overrides");
        Ok(rows
            .into_iter()
            .map(|(phrase, ticker, priority)| TickerOverride::new(phrase, ticker, priority))
            .collect())
    }

    #[instrument(skip(self))]
    async fn metric_synonyms(&self) -> Result<Vec<MetricSynonym>> {
        let rows =
            self.query_rows("SELECT synonym, metric_id, 0 FROM metric_synonyms ORDER BY synonym")?;
        debug!(count = rows.len(), "Loaded metric synonyms");
        Ok(rows
            .into_iter()
            .map(|(synonym, metric_id, _)| MetricSynonym {
                synonym,
                metric_id: MetricId::new(metric_id),
            })
            .collect())
    }
}
