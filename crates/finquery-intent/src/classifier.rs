//! Ordered intent rules.

use finquery_core::text::fold_case;
use finquery_core::{Intent, MetricMatch, PeriodDescriptor, PeriodType, Ticker, TickerMatch};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("intent pattern is valid")
}

/// Phrases whose words would otherwise trip a rule ("most recent" is not a ranking).
static NEUTRAL_PHRASES: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?:most\s+recent|top\s+line|at\s+least|at\s+most)\b"));

/// The ordered rule table.
static RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    vec![
        IntentRule {
            intent: Intent::Trend,
            pattern: Some(compile(
                r"\b(?:trends?|trending|growth|grow|grows|grew|grown|growing|increase[sd]?|increasing|decrease[sd]?|decreasing|decline[sd]?|declining|history|historical|historically|over\s+time|lately|recently|change[sd]?|changing|trajectory|yoy|y/y|qoq|year\s+over\s+year|quarter\s+over\s+quarter|cagr)\b|\bq[1-4]\s*-\s*q[1-4]\b|\b\d{4}\s*-\s*\d{4}\b",
            )),
            signal: Some(period_span),
        },
        IntentRule {
            intent: Intent::Compare,
            pattern: Some(compile(
                r"\b(?:compare|compared|comparing|comparison|vs|versus|against|relative\s+to|difference\s+between|which\s+is\s+better)\b",
            )),
            signal: Some(multiple_tickers),
        },
        IntentRule {
            intent: Intent::Rank,
            pattern: Some(compile(
                r"\b(?:which|highest|lowest|top|best|worst|most|least|fastest|slowest|largest|biggest|smallest|rank|ranked|ranking)\b",
            )),
            signal: None,
        },
        IntentRule {
            intent: Intent::ExplainMetric,
            pattern: Some(compile(
                r"\b(?:define|definition|explain|meaning\s+of|what\s+does\s+.+\s+mean|what\s+is\s+meant\s+by|how\s+is\s+.+\s+(?:calculated|measured|computed))\b",
            )),
            signal: None,
        },
        IntentRule {
            intent: Intent::Lookup,
            pattern: Some(compile(
                r"\b(?:show|display|get|find|list|give\s+me|what\s+is|what's|how\s+much)\b",
            )),
            signal: None,
        },
    ]
});

/// Structural facts the classifier reads besides the text.
#[derive(Clone, Copy, Debug)]
pub struct Signals<'a> {
    /// Resolved tickers.
    pub tickers: &'a [TickerMatch],
    /// Resolved metrics.
    pub metrics: &'a [MetricMatch],
    /// Parsed period.
    pub periods: &'a PeriodDescriptor,
}

/// Why a rule fired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum Evidence {
    /// A keyword or surface pattern matched; carries the matched text.
    Keyword(String),
    /// Two or more distinct tickers were resolved.
    MultipleTickers(usize),
    /// The period spans several periods.
    PeriodSpan(PeriodType),
    /// No rule fired.
    Default,
}

/// The result of classifying one query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Chosen intent.
    pub intent: Intent,
    /// What made the rule fire.
    pub evidence: Evidence,
}

struct IntentRule {
    intent: Intent,
    pattern: Option<Regex>,
    signal: Option<fn(&Signals<'_>) -> Option<Evidence>>,
}

fn period_span(signals: &Signals<'_>) -> Option<Evidence> {
    signals
        .periods
        .period_type
        .is_span()
        .then_some(Evidence::PeriodSpan(signals.periods.period_type))
}

fn multiple_tickers(signals: &Signals<'_>) -> Option<Evidence> {
    let distinct: HashSet<&Ticker> = signals.tickers.iter().map(|m| &m.ticker).collect();
    (distinct.len() >= 2).then_some(Evidence::MultipleTickers(distinct.len()))
}

/// Rule-based intent classifier.
///
/// Rules are tried in the order trend, compare, rank, explain_metric, lookup;
/// the first that fires decides. The order matters: "which company grew
/// fastest" is a trend question even though "which" and "fastest" are rank
/// words.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    /// Creates a classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Intents in the order their rules are tried.
    #[must_use]
    pub fn rule_order(&self) -> Vec<Intent> {
        RULES.iter().map(|r| r.intent).collect()
    }

    /// Classifies a query. Total and deterministic.
    #[must_use]
    pub fn classify(
        &self,
        text: &str,
        tickers: &[TickerMatch],
        metrics: &[MetricMatch],
        periods: &PeriodDescriptor,
    ) -> Intent {
        self.classify_with_evidence(
            text,
            &Signals {
                tickers,
                metrics,
                periods,
            },
        )
        .intent
    }

    /// Classifies a query and reports which rule fired and why.
    #[must_use]
    pub fn classify_with_evidence(&self, text: &str, signals: &Signals<'_>) -> Classification {
        let folded = fold_case(text);
        let blanked = NEUTRAL_PHRASES.replace_all(&folded, |caps: &regex::Captures<'_>| {
            " ".repeat(caps[0].len())
        });

        for rule in RULES.iter() {
            let keyword = rule
                .pattern
                .as_ref()
                .and_then(|p| p.find(&blanked))
                .map(|m| Evidence::Keyword(m.as_str().to_string()));
            if let Some(evidence) = keyword.or_else(|| rule.signal.and_then(|s| s(signals))) {
                debug!(intent = %rule.intent, ?evidence, "Intent rule fired");
                return Classification {
                    intent: rule.intent,
                    evidence,
                };
            }
        }

        debug!(metrics = signals.metrics.len(), "No intent rule fired, defaulting to lookup");
        Classification {
            intent: Intent::Lookup,
            evidence: Evidence::Default,
        }
    }
}
