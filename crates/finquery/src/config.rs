//! Parser configuration.

use finquery_core::{QueryError, Result, Ticker};
use finquery_tickers::FuzzyConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default ticker substituted when a query names no company.
pub const DEFAULT_TICKER: &str = "AAPL";

/// Configuration for a [`QueryParser`](crate::QueryParser).
///
/// Every field has a default, so a JSON document only needs the keys it
/// changes:
///
/// ```
/// use finquery::ParserConfig;
///
/// let config = ParserConfig::from_json_str(r#"{"default_ticker": "msft"}"#).unwrap();
/// assert_eq!(config.default_ticker.as_str(), "MSFT");
/// assert!(!config.prefer_fiscal);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Ticker used when no company is found in the text.
    pub default_ticker: Ticker,
    /// Read unmarked years and quarters as fiscal periods.
    pub prefer_fiscal: bool,
    /// Fuzzy alias matching.
    pub fuzzy: FuzzyConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_ticker: Ticker::new(DEFAULT_TICKER),
            prefer_fiscal: false,
            fuzzy: FuzzyConfig::default(),
        }
    }
}

impl ParserConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default ticker.
    #[must_use]
    pub fn with_default_ticker(mut self, ticker: impl Into<Ticker>) -> Self {
        self.default_ticker = ticker.into();
        self
    }

    /// Set whether unmarked periods are read as fiscal.
    #[must_use]
    pub const fn with_prefer_fiscal(mut self, prefer_fiscal: bool) -> Self {
        self.prefer_fiscal = prefer_fiscal;
        self
    }

    /// Set the fuzzy matching settings.
    #[must_use]
    pub fn with_fuzzy(mut self, fuzzy: FuzzyConfig) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    /// Returns [`QueryError::InvalidParameter`] for an empty default ticker or
    /// out-of-range fuzzy settings.
    pub fn validate(&self) -> Result<()> {
        if self.default_ticker.is_empty() {
            return Err(QueryError::InvalidParameter(
                "default_ticker must not be empty".to_string(),
            ));
        }
        self.fuzzy.validate()
    }

    /// Decode and validate a JSON config.
    ///
    /// # Errors
    /// Returns [`QueryError::Parse`] for malformed JSON and
    /// [`QueryError::InvalidParameter`] for invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| QueryError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, decode and validate a JSON config file.
    ///
    /// # Errors
    /// Returns [`QueryError::Io`] if the file cannot be read, otherwise as
    /// [`ParserConfig::from_json_str`].
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| QueryError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.default_ticker, Ticker::new("AAPL"));
        assert!(!config.prefer_fiscal);
        assert!(config.fuzzy.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = ParserConfig::new()
            .with_default_ticker("spy")
            .with_prefer_fiscal(true)
            .with_fuzzy(FuzzyConfig::disabled());
        assert_eq!(config.default_ticker.as_str(), "SPY");
        assert!(config.prefer_fiscal);
        assert!(!config.fuzzy.enabled);
    }

    #[test]
    fn test_validate_rejects_empty_ticker() {
        let config = ParserConfig::new().with_default_ticker("  ");
        assert!(matches!(
            config.validate(),
            Err(QueryError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_from_json_str() {
        let config =
            ParserConfig::from_json_str(r#"{"prefer_fiscal": true, "fuzzy": {"long_threshold": 0.85}}"#)
                .unwrap();
        assert!(config.prefer_fiscal);
        assert!((config.fuzzy.long_threshold - 0.85).abs() < f64::EPSILON);
        assert!((config.fuzzy.short_threshold - 0.9).abs() < f64::EPSILON);

        assert!(matches!(
            ParserConfig::from_json_str("{"),
            Err(QueryError::Parse(_))
        ));
        assert!(matches!(
            ParserConfig::from_json_str(r#"{"fuzzy": {"short_threshold": 2.0}}"#),
            Err(QueryError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parser.json");
        tokio::fs::write(&path, r#"{"default_ticker": "MSFT"}"#)
            .await
            .unwrap();

        let config = ParserConfig::from_json_file(&path).await.unwrap();
        assert_eq!(config.default_ticker.as_str(), "MSFT");

        let missing = ParserConfig::from_json_file(dir.path().join("absent.json")).await;
        assert!(matches!(missing, Err(QueryError::Io(_))));
    }
}
