//! The ticker resolution pipeline.

use crate::fuzzy::{FuzzyConfig, similarity};
use crate::index::AliasIndex;
use finquery_core::text::{Token, char_slice, tokenize};
use finquery_core::{MatchMethod, ReferenceTables, Ticker, TickerMatch, Warning};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, instrument, trace};

const EXACT_CONFIDENCE: f64 = 1.0;
const NORMALIZED_CONFIDENCE: f64 = 0.95;
const OVERRIDE_CONFIDENCE: f64 = 0.98;
const ALIAS_CONFIDENCE: f64 = 0.9;

/// Upper-case abbreviations that look like symbols but are query vocabulary.
const SYMBOL_STOPLIST: &[&str] = &[
    "AI", "CAGR", "CEO", "CFO", "CY", "DE", "EBIT", "EBITDA", "EPS", "ETF", "EV", "FCF",
    "FY", "GAAP", "IPO", "LTM", "MRQ", "NYSE", "OK", "PE", "QOQ", "RD", "ROA", "ROE",
    "ROIC", "SEC", "TTM", "US", "USA", "USD", "VS", "YOY", "YTD",
];

/// `$` cashtag, a 1-5 char symbol, and an optional share-class suffix.
static SYMBOL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\$)?([A-Za-z][A-Za-z0-9]{0,4}(?:[.\-/][A-Za-z]{1,2})?)$")
        .expect("symbol pattern is valid")
});

/// Period shorthands (`Q1`, `H2`, `FY23`) that share the symbol shape.
static PERIOD_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[QH][1-4]|(?:FY|CY)\d+)$")
        .expect("period shorthand pattern is valid")
});

/// Tickers found in one text plus the warnings raised finding them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerResolution {
    /// Matches ordered by position, one per ticker.
    pub matches: Vec<TickerMatch>,
    /// `fuzzy_match` warnings, one per fuzzy hit.
    pub warnings: Vec<Warning>,
}

impl TickerResolution {
    /// Returns true if no ticker was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Returns the resolved tickers in order.
    #[must_use]
    pub fn tickers(&self) -> Vec<&Ticker> {
        self.matches.iter().map(|m| &m.ticker).collect()
    }
}

/// Resolves company names and symbols in free text to tickers.
///
/// # Example
///
/// ```
/// use finquery_core::{ReferenceTables, TickerAlias};
/// use finquery_tickers::TickerResolver;
///
/// let tables = ReferenceTables {
///     aliases: vec![TickerAlias::new("apple", "AAPL")],
///     ..Default::default()
/// };
/// let resolver = TickerResolver::new(&tables);
/// let resolution = resolver.resolve("Apple revenue 2023");
/// assert_eq!(resolution.matches[0].ticker.as_str(), "AAPL");
/// ```
#[derive(Clone, Debug)]
pub struct TickerResolver {
    index: AliasIndex,
    fuzzy: FuzzyConfig,
}

/// Working state for one `resolve` call.
struct Scan<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    matches: Vec<TickerMatch>,
    warnings: Vec<Warning>,
    found: HashSet<Ticker>,
    covered: Vec<(usize, usize)>,
}

impl<'a> Scan<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            tokens: tokenize(text),
            matches: Vec::new(),
            warnings: Vec::new(),
            found: HashSet::new(),
            covered: Vec::new(),
        }
    }

    fn is_covered(&self, start: usize, end: usize) -> bool {
        self.covered.iter().any(|&(a, b)| start < b && a < end)
    }

    fn span_covered(&self, first: usize, count: usize) -> bool {
        let tokens = &self.tokens[first..first + count];
        self.is_covered(tokens[0].start, tokens[count - 1].end)
    }

    fn fragment(&self, first: usize, count: usize) -> (String, usize, usize) {
        let start = self.tokens[first].start;
        let end = self.tokens[first + count - 1].end;
        (char_slice(self.text, start, end), start, end)
    }

    fn phrase(&self, first: usize, count: usize) -> String {
        self.tokens[first..first + count]
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Records a match unless its ticker is already known; the span is
    /// claimed either way.
    fn claim(&mut self, m: TickerMatch, end: usize) -> bool {
        self.covered.push((m.position, end));
        if self.found.insert(m.ticker.clone()) {
            self.matches.push(m);
            true
        } else {
            false
        }
    }
}

impl TickerResolver {
    /// Builds a resolver with default fuzzy settings.
    #[must_use]
    pub fn new(tables: &ReferenceTables) -> Self {
        Self::from_index(AliasIndex::build(tables), FuzzyConfig::default())
    }

    /// Builds a resolver from a prepared index.
    #[must_use]
    pub const fn from_index(index: AliasIndex, fuzzy: FuzzyConfig) -> Self {
        Self { index, fuzzy }
    }

    /// Replaces the fuzzy settings.
    #[must_use]
    pub fn with_fuzzy(mut self, fuzzy: FuzzyConfig) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn index(&self) -> &AliasIndex {
        &self.index
    }

    /// Returns the fuzzy settings.
    #[must_use]
    pub const fn fuzzy(&self) -> &FuzzyConfig {
        &self.fuzzy
    }

    /// Finds every ticker mentioned in `text`.
    ///
    /// Never fails; text without any company reference yields an empty
    /// resolution.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve(&self, text: &str) -> TickerResolution {
        let mut scan = Scan::new(text);

        self.match_symbols(&mut scan);
        self.match_override(&mut scan);
        self.match_aliases(&mut scan);
        if scan.matches.is_empty() && self.fuzzy.enabled {
            self.match_fuzzy(&mut scan);
        }

        let mut matches = scan.matches;
        matches.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(b.confidence.total_cmp(&a.confidence))
        });
        let mut seen = HashSet::new();
        matches.retain(|m| seen.insert(m.ticker.clone()));

        debug!(
            tickers = matches.len(),
            warnings = scan.warnings.len(),
            "Resolved tickers"
        );
        TickerResolution {
            matches,
            warnings: scan.warnings,
        }
    }

    /// Strategy 1: symbols typed in upper case or as cashtags.
    fn match_symbols(&self, scan: &mut Scan<'_>) {
        for (start, word) in words(scan.text) {
            let Some(caps) = SYMBOL_SHAPE.captures(&word) else {
                continue;
            };
            let cashtag = caps.get(1).is_some();
            let Some(raw) = caps.get(2).map(|m| m.as_str()) else {
                continue;
            };
            // Single letters and mixed case only count as cashtags
            if !cashtag && (raw.chars().count() == 1 || raw.chars().any(char::is_lowercase)) {
                continue;
            }
            let symbol = raw.to_uppercase();
            if PERIOD_SHORTHAND.is_match(&symbol)
                || SYMBOL_STOPLIST.contains(&compact(&symbol).as_str())
            {
                continue;
            }

            let (ticker, confidence, method) = if let Some(t) = self.index.exact_symbol(&symbol) {
                (t, EXACT_CONFIDENCE, MatchMethod::Exact)
            } else if let Some(t) = self.index.compact_symbol(&symbol) {
                (t.clone(), NORMALIZED_CONFIDENCE, MatchMethod::Normalized)
            } else {
                continue;
            };

            let end = start + word.chars().count();
            trace!(symbol = %symbol, ticker = %ticker, "Direct symbol match");
            scan.claim(TickerMatch::new(word, ticker, confidence, method, start), end);
        }
    }

    /// Strategy 2: the single best override phrase.
    fn match_override(&self, scan: &mut Scan<'_>) {
        let mut best: Option<(i32, usize, usize, &Ticker)> = None;

        for rule in self.index.overrides() {
            let n = rule.tokens.len();
            if n > scan.tokens.len() {
                continue;
            }
            for i in 0..=scan.tokens.len() - n {
                let hit = scan.tokens[i..i + n]
                    .iter()
                    .zip(&rule.tokens)
                    .all(|(t, r)| t.text == *r);
                if !hit || scan.span_covered(i, n) {
                    continue;
                }
                let better = best.is_none_or(|(priority, first, _, _)| {
                    rule.priority > priority
                        || (rule.priority == priority && scan.tokens[i].start < scan.tokens[first].start)
                });
                if better {
                    best = Some((rule.priority, i, n, &rule.ticker));
                }
            }
        }

        if let Some((priority, first, count, ticker)) = best {
            let (input, start, end) = scan.fragment(first, count);
            debug!(input = %input, ticker = %ticker, priority, "Override fired");
            scan.claim(
                TickerMatch::new(
                    input,
                    ticker.clone(),
                    OVERRIDE_CONFIDENCE,
                    MatchMethod::Override,
                    start,
                ),
                end,
            );
        }
    }

    /// Strategy 3: whole-word aliases, longest first at each position.
    fn match_aliases(&self, scan: &mut Scan<'_>) {
        let max_words = self.index.max_alias_words();
        let mut i = 0;

        while i < scan.tokens.len() {
            let longest = max_words.min(scan.tokens.len() - i);
            let hit = (1..=longest).rev().find_map(|n| {
                if scan.span_covered(i, n) {
                    return None;
                }
                self.index.alias(&scan.phrase(i, n)).map(|t| (n, t.clone()))
            });

            match hit {
                Some((n, ticker)) => {
                    let (input, start, end) = scan.fragment(i, n);
                    trace!(input = %input, ticker = %ticker, "Alias match");
                    scan.claim(
                        TickerMatch::new(input, ticker, ALIAS_CONFIDENCE, MatchMethod::Alias, start),
                        end,
                    );
                    i += n;
                }
                None => i += 1,
            }
        }
    }

    /// Strategy 4: approximate alias matches on otherwise unmatched text.
    fn match_fuzzy(&self, scan: &mut Scan<'_>) {
        let mut candidates: Vec<(f64, usize, usize, Ticker)> = Vec::new();

        for i in 0..scan.tokens.len() {
            let longest = self.fuzzy.max_phrase_words.min(scan.tokens.len() - i);
            for n in 1..=longest {
                if !self.is_fuzzy_candidate(&scan.tokens[i..i + n]) || scan.span_covered(i, n) {
                    break;
                }
                let phrase = scan.phrase(i, n);
                let threshold = self.fuzzy.threshold_for(phrase.chars().count());
                let best = self
                    .index
                    .vocabulary()
                    .iter()
                    .map(|(alias, ticker)| (similarity(&phrase, alias), ticker))
                    .fold(None::<(f64, &Ticker)>, |acc, (score, ticker)| match acc {
                        Some((s, _)) if s >= score => acc,
                        _ => Some((score, ticker)),
                    });
                if let Some((score, ticker)) = best.filter(|(score, _)| *score >= threshold) {
                    candidates.push((score, i, n, ticker.clone()));
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(b.2.cmp(&a.2))
                .then(a.1.cmp(&b.1))
        });

        for (score, first, count, ticker) in candidates {
            if scan.span_covered(first, count) {
                continue;
            }
            let (input, start, end) = scan.fragment(first, count);
            let warning = Warning::FuzzyMatch {
                input: input.clone(),
                ticker: ticker.clone(),
            };
            debug!(input = %input, ticker = %ticker, score, "Fuzzy match");
            if scan.claim(
                TickerMatch::new(input, ticker, score, MatchMethod::Fuzzy, start),
                end,
            ) {
                scan.warnings.push(warning);
            }
        }
    }

    fn is_fuzzy_candidate(&self, tokens: &[Token]) -> bool {
        let single = tokens.len() == 1;
        tokens.iter().all(|t| {
            let len = t.text.chars().count();
            t.text.chars().all(char::is_alphabetic)
                && !self.index.is_stopword(&t.text)
                && if single { len >= 4 } else { len >= 2 }
        })
    }
}

/// Drops share-class separators so `P/E` and `PE` compare equal.
fn compact(symbol: &str) -> String {
    finquery_core::types::compact_symbol(symbol)
}

/// Splits text on whitespace into punctuation-trimmed words with char offsets.
///
/// Leading brackets and quotes, trailing sentence punctuation and a
/// possessive `'s` are removed.
fn words(text: &str) -> Vec<(usize, String)> {
    const LEADING: &[char] = &['(', '[', '{', '"', '\'', '\u{201c}', '\u{2018}'];
    const TRAILING: &[char] = &[
        ',', ';', ':', '!', '?', '.', ')', ']', '}', '"', '\'', '\u{201d}', '\u{2019}',
    ];

    let mut out = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    for (i, c) in text.chars().chain(std::iter::once(' ')).enumerate() {
        if c.is_whitespace() {
            if !current.is_empty() {
                let raw = std::mem::take(&mut current);
                let lead = raw.chars().take_while(|c| LEADING.contains(c)).count();
                let mut word: String = raw.chars().skip(lead).collect();
                for suffix in ["'s", "'S", "\u{2019}s", "\u{2019}S"] {
                    if let Some(stripped) = word.strip_suffix(suffix) {
                        word = stripped.to_string();
                        break;
                    }
                }
                let word = word.trim_end_matches(TRAILING).to_string();
                if !word.is_empty() {
                    out.push((start + lead, word));
                }
            }
        } else {
            if current.is_empty() {
                start = i;
            }
            current.push(c);
        }
    }
    out
}
