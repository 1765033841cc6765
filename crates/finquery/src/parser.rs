//! The query parser: normalization plus the four resolvers.

use finquery_core::text::collapse_whitespace;
use finquery_core::{
    ReferenceTables, Result, StructuredQuery, TableSource, TickerMatch, Warning,
};
use finquery_intent::{Classification, IntentClassifier, Signals};
use finquery_metrics::MetricResolver;
use finquery_periods::PeriodGrammar;
use finquery_tables::BuiltinTables;
use finquery_tickers::{AliasIndex, TickerResolver};
use tracing::{debug, instrument};
use unicode_normalization::UnicodeNormalization;

use crate::config::ParserConfig;

/// Applies NFKC, collapses whitespace and trims.
///
/// Full-width letters, ligatures and non-breaking spaces become their plain
/// forms, so `ＡＡＰＬ` and `AAPL` parse the same.
#[must_use]
pub fn normalize_query(text: &str) -> String {
    collapse_whitespace(&text.nfkc().collect::<String>())
}

/// Parses free-text financial questions into [`StructuredQuery`] values.
///
/// Built once from reference tables and immutable afterwards; share it
/// behind an `Arc` to parse from many threads.
///
/// # Example
///
/// ```
/// use finquery::{Intent, QueryParser};
///
/// let parser = QueryParser::builtin().unwrap();
/// let query = parser.parse("Compare Apple and Microsoft revenue");
///
/// assert_eq!(query.intent, Intent::Compare);
/// assert_eq!(query.tickers.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct QueryParser {
    config: ParserConfig,
    tickers: TickerResolver,
    metrics: MetricResolver,
    periods: PeriodGrammar,
    intent: IntentClassifier,
}

impl QueryParser {
    /// Builds a parser from reference tables.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or a metric synonym cannot be
    /// compiled.
    pub fn new(tables: &ReferenceTables, config: ParserConfig) -> Result<Self> {
        config.validate()?;
        let tickers = TickerResolver::from_index(AliasIndex::build(tables), config.fuzzy.clone());
        let metrics = MetricResolver::new(&tables.synonyms)?;
        debug!(
            aliases = tickers.index().alias_count(),
            synonyms = metrics.len(),
            default_ticker = %config.default_ticker,
            "Built query parser"
        );
        Ok(Self {
            config,
            tickers,
            metrics,
            periods: PeriodGrammar::new(),
            intent: IntentClassifier::new(),
        })
    }

    /// Builds a parser over the embedded tables with the default config.
    ///
    /// # Errors
    /// Returns an error if the embedded tables cannot be decoded.
    pub fn builtin() -> Result<Self> {
        Self::new(&BuiltinTables::tables()?, ParserConfig::default())
    }

    /// Loads tables from a source and builds a parser from them.
    ///
    /// # Errors
    /// Returns the source's error if loading fails, or any error of
    /// [`QueryParser::new`].
    pub async fn from_source(source: &dyn TableSource, config: ParserConfig) -> Result<Self> {
        debug!(source = source.name(), "Loading reference tables");
        let tables = ReferenceTables::load(source).await?;
        Self::new(&tables, config)
    }

    /// Returns the parser's configuration.
    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses a question using the configured fiscal preference.
    #[must_use]
    pub fn parse(&self, text: &str) -> StructuredQuery {
        self.parse_to_structured(text, self.config.prefer_fiscal)
    }

    /// Parses a question into a structured query.
    ///
    /// Never fails. Missing companies are replaced by the default ticker and
    /// reported as `missing_ticker` followed by `default_ticker:<T>`; missing
    /// metrics are reported as `missing_metric`.
    #[must_use]
    pub fn parse_to_structured(&self, text: &str, prefer_fiscal: bool) -> StructuredQuery {
        self.explain(text, prefer_fiscal).0
    }

    /// Parses a question and also reports why the intent was chosen.
    #[instrument(skip(self), level = "debug")]
    pub fn explain(&self, text: &str, prefer_fiscal: bool) -> (StructuredQuery, Classification) {
        let normalized_text = normalize_query(text);

        let resolution = self.tickers.resolve(&normalized_text);
        let metrics = self.metrics.resolve(&normalized_text);
        let periods = self.periods.parse(&normalized_text, prefer_fiscal);
        let classification = self.intent.classify_with_evidence(
            &normalized_text,
            &Signals {
                tickers: &resolution.matches,
                metrics: &metrics,
                periods: &periods,
            },
        );

        let mut warnings = resolution.warnings;
        let tickers = if resolution.matches.is_empty() {
            let default = self.config.default_ticker.clone();
            warnings.push(Warning::MissingTicker);
            warnings.push(Warning::DefaultTicker(default.clone()));
            vec![TickerMatch::default_for(default)]
        } else {
            resolution.matches
        };
        if metrics.is_empty() {
            warnings.push(Warning::MissingMetric);
        }
        warnings.extend(periods.warnings.iter().cloned());

        debug!(
            intent = %classification.intent,
            tickers = tickers.len(),
            metrics = metrics.len(),
            period_type = %periods.period_type,
            warnings = warnings.len(),
            "Parsed query"
        );

        let query = StructuredQuery {
            intent: classification.intent,
            tickers,
            metrics,
            periods,
            warnings,
            free_text: text.to_string(),
            normalized_text,
        };
        (query, classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finquery_core::{
        Granularity, Intent, MatchMethod, MetricSynonym, PeriodType, Ticker, TickerAlias,
    };
    use finquery_intent::Evidence;
    use finquery_tables::InMemoryTables;
    use finquery_tickers::FuzzyConfig;
    use proptest::prelude::*;
    use std::sync::{Arc, LazyLock};

    static PARSER: LazyLock<QueryParser> = LazyLock::new(|| QueryParser::builtin().unwrap());

    fn symbols(query: &StructuredQuery) -> Vec<&str> {
        query.tickers.iter().map(|m| m.ticker.as_str()).collect()
    }

    fn metric_ids(query: &StructuredQuery) -> Vec<&str> {
        query.metrics.iter().map(|m| m.metric_id.as_str()).collect()
    }

    fn warning_strings(query: &StructuredQuery) -> Vec<String> {
        query.warnings.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_single_company_lookup() {
        let query = PARSER.parse("Apple revenue 2023");
        assert_eq!(symbols(&query), vec!["AAPL"]);
        assert_eq!(metric_ids(&query), vec!["revenue"]);
        assert_eq!(query.periods.period_type, PeriodType::Single);
        assert_eq!(query.periods.granularity, Granularity::CalendarYear);
        assert_eq!(query.intent, Intent::Lookup);
        assert!(query.warnings.is_empty());
    }

    #[test]
    fn test_two_company_compare() {
        let query = PARSER.parse("Compare Apple and Microsoft revenue");
        assert_eq!(symbols(&query), vec!["AAPL", "MSFT"]);
        assert_eq!(metric_ids(&query), vec!["revenue"]);
        assert_eq!(query.intent, Intent::Compare);
    }

    #[test]
    fn test_missing_ticker_uses_default() {
        let query = PARSER.parse("revenue 2023");
        assert_eq!(symbols(&query), vec!["AAPL"]);
        assert_eq!(query.tickers[0].method, MatchMethod::Default);
        assert!(query.used_default_ticker());
        assert_eq!(
            warning_strings(&query),
            vec!["missing_ticker", "default_ticker:AAPL"]
        );
        assert_eq!(metric_ids(&query), vec!["revenue"]);
        assert_eq!(query.periods.period_type, PeriodType::Single);
    }

    #[test]
    fn test_empty_input() {
        let query = PARSER.parse("");
        assert_eq!(symbols(&query), vec!["AAPL"]);
        assert!(query.metrics.is_empty());
        assert_eq!(
            warning_strings(&query),
            vec!["missing_ticker", "default_ticker:AAPL", "missing_metric"]
        );
        assert!(query.periods.is_latest());
        assert_eq!(query.intent, Intent::Lookup);
    }

    #[test]
    fn test_warning_order() {
        let query = PARSER.parse("Microsft FY20-FY20");
        assert_eq!(
            warning_strings(&query),
            vec![
                "fuzzy_match:Microsft->MSFT",
                "missing_metric",
                "ambiguous_year:20",
                "ambiguous_range:FY20-FY20",
            ]
        );
    }

    #[test]
    fn test_grew_fastest_is_trend() {
        let (query, classification) = PARSER.explain("which company grew fastest", false);
        assert_eq!(query.intent, Intent::Trend);
        assert_eq!(classification.evidence, Evidence::Keyword("grew".to_string()));
    }

    #[test]
    fn test_multiple_tickers_force_compare() {
        let query = PARSER.parse("Tesla Nvidia gross margin");
        assert_eq!(symbols(&query), vec!["TSLA", "NVDA"]);
        assert_eq!(query.intent, Intent::Compare);
    }

    #[test]
    fn test_longest_metric_wins() {
        let query = PARSER.parse("P/E ratio of Microsoft");
        assert_eq!(metric_ids(&query), vec!["pe_ratio"]);
        assert_eq!(query.metrics[0].input, "P/E ratio");
    }

    #[test]
    fn test_quarter_range_is_trend() {
        let query = PARSER.parse("Nvidia revenue Q1-Q4 2023");
        assert_eq!(query.periods.period_type, PeriodType::Multi);
        assert_eq!(query.periods.items.len(), 4);
        assert_eq!(query.intent, Intent::Trend);
    }

    #[test]
    fn test_same_endpoint_range_stays_range() {
        let query = PARSER.parse("Apple revenue 2023-2023");
        assert_eq!(query.periods.period_type, PeriodType::Range);
        assert_eq!(query.periods.items.len(), 1);
        assert_eq!(query.intent, Intent::Trend);
        assert_eq!(warning_strings(&query), vec!["ambiguous_range:2023-2023"]);
    }

    #[test]
    fn test_bare_two_digit_year() {
        let query = PARSER.parse("Apple revenue 23");
        assert_eq!(query.periods.period_type, PeriodType::Single);
        assert_eq!(query.periods.items[0].year, 2023);
        assert_eq!(warning_strings(&query), vec!["ambiguous_year:23"]);
    }

    #[test]
    fn test_listed_quarters_compare() {
        let query = PARSER.parse("Apple revenue Q4 2023 vs Q1 2024");
        assert_eq!(query.periods.period_type, PeriodType::Multi);
        assert_eq!(query.periods.items.len(), 2);
    }

    #[test]
    fn test_prefer_fiscal() {
        let query = PARSER.parse_to_structured("Apple revenue 2023", true);
        assert_eq!(query.periods.granularity, Granularity::FiscalYear);
        assert!(query.periods.normalize_to_fiscal);

        let query = PARSER.parse_to_structured("Apple revenue FY2023", false);
        assert_eq!(query.periods.granularity, Granularity::FiscalYear);
    }

    #[test]
    fn test_normalization() {
        let text = "  ＡＡＰＬ\u{00a0}revenue\t 2023 ";
        let query = PARSER.parse(text);
        assert_eq!(query.free_text, text);
        assert_eq!(query.normalized_text, "AAPL revenue 2023");
        assert_eq!(symbols(&query), vec!["AAPL"]);
        assert_eq!(query.metrics[0].position, 5);
    }

    #[test]
    fn test_custom_default_ticker() {
        let parser = QueryParser::new(
            &BuiltinTables::tables().unwrap(),
            ParserConfig::new().with_default_ticker("SPY"),
        )
        .unwrap();
        let query = parser.parse("what is the dividend yield");
        assert_eq!(symbols(&query), vec!["SPY"]);
        assert!(query.has_warning("default_ticker"));
    }

    #[test]
    fn test_fuzzy_can_be_disabled() {
        let parser = QueryParser::new(
            &BuiltinTables::tables().unwrap(),
            ParserConfig::new().with_fuzzy(FuzzyConfig::disabled()),
        )
        .unwrap();
        let query = parser.parse("Microsft revenue");
        assert!(query.used_default_ticker());
        assert!(!query.has_warning("fuzzy_match"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = QueryParser::new(
            &ReferenceTables::new(),
            ParserConfig::new().with_default_ticker(""),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_from_source() {
        let source = InMemoryTables::new();
        source.add_alias(TickerAlias::new("acme", "ACME")).await;
        source
            .add_synonym(MetricSynonym::new("widgets shipped", "units"))
            .await;

        let parser = QueryParser::from_source(&source, ParserConfig::default())
            .await
            .unwrap();
        let query = parser.parse("ACME widgets shipped last 4 quarters");
        assert_eq!(symbols(&query), vec!["ACME"]);
        assert_eq!(metric_ids(&query), vec!["units"]);
        assert_eq!(query.periods.period_type, PeriodType::Relative);
        assert_eq!(query.intent, Intent::Trend);
    }

    #[test]
    fn test_parser_is_shareable() {
        let parser = Arc::new(QueryParser::builtin().unwrap());
        let handles: Vec<_> = ["Apple revenue", "Tesla EPS 2022"]
            .into_iter()
            .map(|text| {
                let parser = Arc::clone(&parser);
                std::thread::spawn(move || parser.parse(text))
            })
            .collect();
        let queries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(queries[1].tickers[0].ticker, Ticker::new("TSLA"));
    }

    #[test]
    fn test_serializes_to_json() {
        let query = PARSER.parse("revenue 2023");
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["intent"], "lookup");
        assert_eq!(json["periods"]["type"], "single");
        assert_eq!(json["warnings"][1], "default_ticker:AAPL");
        let back: StructuredQuery = serde_json::from_value(json).unwrap();
        assert_eq!(back, query);
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(text in "\\PC{0,80}") {
            let _ = PARSER.parse(&text);
        }

        #[test]
        fn prop_parse_is_deterministic(text in "[A-Za-z0-9 $'/&.-]{0,60}") {
            prop_assert_eq!(PARSER.parse(&text), PARSER.parse(&text));
        }

        #[test]
        fn prop_default_ticker_invariant(text in "[a-z0-9 ]{0,40}") {
            let query = PARSER.parse(&text);
            let defaults = query
                .tickers
                .iter()
                .filter(|m| m.method == MatchMethod::Default)
                .count();
            let missing = query.warnings.iter().position(|w| *w == Warning::MissingTicker);
            let substituted = query
                .warnings
                .iter()
                .position(|w| matches!(w, Warning::DefaultTicker(_)));

            if defaults == 0 {
                prop_assert!(missing.is_none() && substituted.is_none());
            } else {
                prop_assert_eq!(defaults, 1);
                prop_assert_eq!(query.tickers.len(), 1);
                prop_assert_eq!(substituted, missing.map(|i| i + 1));
            }
        }

        #[test]
        fn prop_missing_metric_iff_no_metrics(text in "[a-z ]{0,40}") {
            let query = PARSER.parse(&text);
            prop_assert_eq!(query.metrics.is_empty(), query.has_warning("missing_metric"));
        }
    }
}
