//! Immutable lookup structures built from the reference tables.

use finquery_core::text::{normalize_phrase, tokenize};
use finquery_core::types::compact_symbol;
use finquery_core::{ReferenceTables, Ticker};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Words that never start a fuzzy candidate.
///
/// Metric synonym words are added on top of these when the index is built.
const FUZZY_STOPWORDS: &[&str] = &[
    "about", "above", "after", "against", "also", "annual", "annually", "average", "been",
    "being", "best", "beta", "better", "between", "biggest", "both", "calendar", "change",
    "company", "companies", "compare", "compared", "current", "data", "decline", "decrease",
    "define", "definition", "display", "does", "down", "each", "explain", "fastest", "figure",
    "figures", "financial", "financials", "find", "fiscal", "from", "give", "going", "growth",
    "grew", "grow", "grown", "have", "highest", "historical", "history", "increase", "into",
    "largest", "last", "latest", "lately", "least", "like", "list", "lowest", "mean", "meaning",
    "mobile", "more", "most", "much", "number", "over", "past", "performance", "performing",
    "previous", "prior", "quarter", "quarterly", "quarters", "rank", "ranking", "recent",
    "recently", "report", "reported", "show", "slowest", "smallest", "stock", "stocks", "tell",
    "than", "that", "their", "them", "then", "there", "these", "this", "those", "through",
    "time", "trailing", "trend", "under", "value", "versus", "were", "what", "when", "where",
    "which", "while", "will", "with", "worst", "year", "yearly", "years",
];

/// A curated override phrase in token form.
#[derive(Clone, Debug)]
pub(crate) struct OverrideRule {
    pub(crate) tokens: Vec<String>,
    pub(crate) ticker: Ticker,
    pub(crate) priority: i32,
}

/// Lookup index over ticker symbols, overrides and aliases.
///
/// Built once from [`ReferenceTables`] and read-only afterwards, so one index
/// can be shared between threads without locking.
#[derive(Clone, Debug, Default)]
pub struct AliasIndex {
    /// Canonical symbols as written.
    symbols: HashSet<String>,
    /// Compact symbol (`BRKB`) to canonical ticker (`BRK.B`).
    compact_symbols: HashMap<String, Ticker>,
    overrides: Vec<OverrideRule>,
    /// Normalized alias to `(ticker, priority)`; highest priority kept.
    aliases: HashMap<String, (Ticker, i32)>,
    max_alias_words: usize,
    /// Sorted alias vocabulary for fuzzy scoring.
    vocabulary: Vec<(String, Ticker)>,
    stopwords: HashSet<String>,
}

impl AliasIndex {
    /// Builds the index from a table bundle.
    ///
    /// Aliases of two chars or fewer are dropped; when one alias names
    /// several tickers, the highest priority wins (the first row on ties).
    #[must_use]
    pub fn build(tables: &ReferenceTables) -> Self {
        let mut symbols = HashSet::new();
        let mut compact_symbols = HashMap::new();
        for ticker in tables.known_tickers() {
            if ticker.is_empty() {
                continue;
            }
            symbols.insert(ticker.as_str().to_string());
            compact_symbols
                .entry(ticker.compact())
                .or_insert_with(|| ticker.clone());
        }

        let mut overrides: Vec<OverrideRule> = tables
            .overrides
            .iter()
            .filter_map(|rule| {
                let tokens: Vec<String> = tokenize(&rule.phrase).into_iter().map(|t| t.text).collect();
                (!tokens.is_empty() && !rule.ticker.is_empty()).then(|| OverrideRule {
                    tokens,
                    ticker: rule.ticker.clone(),
                    priority: rule.priority,
                })
            })
            .collect();
        overrides.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut aliases: HashMap<String, (Ticker, i32)> = HashMap::new();
        for row in &tables.aliases {
            let alias = normalize_phrase(&row.alias);
            if alias.chars().count() <= 2 || row.ticker.is_empty() {
                continue;
            }
            match aliases.get(&alias) {
                Some((_, priority)) if *priority >= row.priority => {}
                _ => {
                    aliases.insert(alias, (row.ticker.clone(), row.priority));
                }
            }
        }
        let max_alias_words = aliases
            .keys()
            .map(|a| a.split(' ').count())
            .max()
            .unwrap_or(0);

        let vocabulary: Vec<(String, Ticker)> = aliases
            .iter()
            .map(|(alias, (ticker, _))| (alias.clone(), ticker.clone()))
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .collect();

        let mut stopwords: HashSet<String> =
            FUZZY_STOPWORDS.iter().map(|w| (*w).to_string()).collect();
        for synonym in &tables.synonyms {
            stopwords.extend(tokenize(&synonym.synonym).into_iter().map(|t| t.text));
        }

        debug!(
            symbols = symbols.len(),
            overrides = overrides.len(),
            aliases = aliases.len(),
            "Built alias index"
        );

        Self {
            symbols,
            compact_symbols,
            overrides,
            aliases,
            max_alias_words,
            vocabulary,
            stopwords,
        }
    }

    /// Looks up a symbol typed verbatim (already uppercased).
    #[must_use]
    pub fn exact_symbol(&self, symbol: &str) -> Option<Ticker> {
        self.symbols.contains(symbol).then(|| Ticker::new(symbol))
    }

    /// Looks up a symbol after dropping share-class punctuation.
    #[must_use]
    pub fn compact_symbol(&self, symbol: &str) -> Option<&Ticker> {
        self.compact_symbols.get(&compact_symbol(symbol))
    }

    /// Looks up a normalized alias phrase.
    #[must_use]
    pub fn alias(&self, phrase: &str) -> Option<&Ticker> {
        self.aliases.get(phrase).map(|(ticker, _)| ticker)
    }

    /// Number of distinct aliases.
    #[must_use]
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Word count of the longest alias.
    #[must_use]
    pub const fn max_alias_words(&self) -> usize {
        self.max_alias_words
    }

    /// Override rules, highest priority first.
    pub(crate) fn overrides(&self) -> &[OverrideRule] {
        &self.overrides
    }

    /// Alias vocabulary in alias order.
    pub(crate) fn vocabulary(&self) -> &[(String, Ticker)] {
        &self.vocabulary
    }

    /// Whether a folded word is excluded from fuzzy candidates.
    pub(crate) fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }
}
