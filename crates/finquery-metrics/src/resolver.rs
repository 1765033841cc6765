//! Longest-first metric synonym matching.

use finquery_core::text::{char_offset, char_slice, collapse_whitespace, fold_case};
use finquery_core::{MetricId, MetricMatch, MetricSynonym, QueryError, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, trace, warn};

/// One synonym compiled for matching.
#[derive(Clone, Debug)]
struct SynonymPattern {
    synonym: String,
    metric_id: MetricId,
    regex: Regex,
}

/// Resolves metric synonyms in free text.
///
/// Synonyms are matched in descending length order. Every occurrence of a
/// synonym masks its span, so a shorter synonym can never match inside a
/// longer one. Matches must sit on word boundaries.
#[derive(Clone, Debug)]
pub struct MetricResolver {
    patterns: Vec<SynonymPattern>,
}

impl MetricResolver {
    /// Compiles a resolver from synonym rows.
    ///
    /// Synonyms are case-folded and whitespace-collapsed; blank rows are
    /// skipped. When the same synonym appears twice, the first row wins.
    ///
    /// # Errors
    /// Returns [`QueryError::Parse`] if a synonym pattern cannot be compiled.
    pub fn new(synonyms: &[MetricSynonym]) -> Result<Self> {
        let mut unique: HashMap<String, MetricId> = HashMap::new();
        for row in synonyms {
            let synonym = collapse_whitespace(&fold_case(&row.synonym));
            if synonym.is_empty() || row.metric_id.as_str().is_empty() {
                warn!(synonym = %row.synonym, "Skipping blank metric synonym");
                continue;
            }
            unique
                .entry(synonym)
                .or_insert_with(|| row.metric_id.clone());
        }

        let mut ordered: Vec<(String, MetricId)> = unique.into_iter().collect();
        ordered.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });

        let patterns = ordered
            .into_iter()
            .map(|(synonym, metric_id)| {
                let pattern = synonym
                    .split(' ')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+");
                let regex = Regex::new(&format!("(?i){pattern}"))
                    .map_err(|e| QueryError::Parse(format!("metric synonym {synonym:?}: {e}")))?;
                Ok(SynonymPattern {
                    synonym,
                    metric_id,
                    regex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(synonyms = patterns.len(), "Compiled metric synonyms");
        Ok(Self { patterns })
    }

    /// Number of distinct synonyms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if the resolver has no synonyms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the canonical metric ids known to the resolver, sorted.
    #[must_use]
    pub fn metric_ids(&self) -> Vec<&MetricId> {
        let mut ids: Vec<&MetricId> = self
            .patterns
            .iter()
            .map(|p| &p.metric_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort();
        ids
    }

    /// Finds every metric mentioned in `text`.
    ///
    /// Returns one match per metric id, ordered by position; `input` is the
    /// original-case text of the leftmost mention.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve(&self, text: &str) -> Vec<MetricMatch> {
        let mut haystack: Vec<char> = fold_case(text).chars().collect();
        let mut claims: Vec<(usize, usize, &MetricId)> = Vec::new();

        for pattern in &self.patterns {
            let spans = find_word_matches(&pattern.regex, &haystack.iter().collect::<String>());
            for (start, end) in spans {
                trace!(synonym = %pattern.synonym, start, "Metric synonym claimed");
                haystack[start..end].fill(' ');
                claims.push((start, end, &pattern.metric_id));
            }
        }

        claims.sort_by_key(|&(start, _, _)| start);
        let mut seen = HashSet::new();
        let matches: Vec<MetricMatch> = claims
            .into_iter()
            .filter(|(_, _, id)| seen.insert(*id))
            .map(|(start, end, id)| MetricMatch {
                input: char_slice(text, start, end),
                metric_id: id.clone(),
                position: start,
            })
            .collect();

        debug!(metrics = matches.len(), "Resolved metrics");
        matches
    }
}

/// Returns char spans of every non-overlapping word-bounded match.
fn find_word_matches(regex: &Regex, haystack: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut at = 0;

    while at <= haystack.len() {
        let Some(m) = regex.find_at(haystack, at) else {
            break;
        };
        let before = haystack[..m.start()].chars().next_back();
        let after = haystack[m.end()..].chars().next();
        let bounded = !before.is_some_and(char::is_alphanumeric)
            && !after.is_some_and(char::is_alphanumeric);

        if bounded && !m.as_str().is_empty() {
            spans.push((char_offset(haystack, m.start()), char_offset(haystack, m.end())));
            at = m.end();
        } else {
            // Retry one char further on
            at = m.start()
                + haystack[m.start()..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use finquery_tables::BuiltinTables;

    fn resolver() -> MetricResolver {
        MetricResolver::new(&BuiltinTables::tables().unwrap().synonyms).unwrap()
    }

    fn ids(matches: &[MetricMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.metric_id.as_str()).collect()
    }

    #[test]
    fn test_simple_match() {
        let matches = resolver().resolve("Apple revenue 2023");
        assert_eq!(ids(&matches), vec!["revenue"]);
        assert_eq!(matches[0].input, "revenue");
        assert_eq!(matches[0].position, 6);
    }

    #[test]
    fn test_longest_synonym_wins() {
        let matches = resolver().resolve("What is the P/E ratio of Apple?");
        assert_eq!(ids(&matches), vec!["pe_ratio"]);
        assert_eq!(matches[0].input, "P/E ratio");

        let matches = resolver().resolve("price to earnings ratio for MSFT");
        assert_eq!(ids(&matches), vec!["pe_ratio"]);
    }

    #[test]
    fn test_dedup_keeps_leftmost_fragment() {
        let matches = resolver().resolve("Sales and revenue for Tesla");
        assert_eq!(ids(&matches), vec!["revenue"]);
        assert_eq!(matches[0].input, "Sales");
        assert_eq!(matches[0].position, 0);
    }

    #[test]
    fn test_multiple_metrics_in_order() {
        let matches = resolver().resolve("gross margin vs net margin and free cash flow");
        assert_eq!(ids(&matches), vec!["gross_margin", "net_margin", "free_cash_flow"]);
    }

    #[test]
    fn test_word_boundaries() {
        assert!(resolver().resolve("the cashier said hello").is_empty());
        let matches = resolver().resolve("cash-rich balance");
        assert_eq!(ids(&matches), vec!["cash"]);
    }

    #[test]
    fn test_whitespace_inside_synonym() {
        let matches = resolver().resolve("TOP   LINE growth");
        assert_eq!(ids(&matches), vec!["revenue"]);
        assert_eq!(matches[0].input, "TOP   LINE");
    }

    #[test]
    fn test_no_metric() {
        assert!(resolver().resolve("").is_empty());
        assert!(resolver().resolve("compare apple and microsoft").is_empty());
    }

    #[test]
    fn test_custom_synonyms() {
        let resolver = MetricResolver::new(&[
            MetricSynonym::new("Book Value", "book_value"),
            MetricSynonym::new("book value", "other"),
            MetricSynonym::new("  ", "blank"),
        ])
        .unwrap();
        assert_eq!(resolver.len(), 1);
        let matches = resolver.resolve("book value per share");
        assert_eq!(ids(&matches), vec!["book_value"]);
    }

    #[test]
    fn test_find_word_matches_retries_after_boundary_failure() {
        let regex = Regex::new("eps").unwrap();
        let spans = find_word_matches(&regex, "steps eps");
        assert_eq!(spans, vec![(6, 9)]);
    }
}
