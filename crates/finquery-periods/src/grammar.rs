//! Ordered rule table for time-period expressions.
//!
//! Each rule pairs one or more patterns with a handler. Rules are tried in
//! table order and, within a rule, every match of every pattern is offered to
//! the handler until one accepts. The first accepted descriptor wins; text
//! that no rule accepts parses as `latest`.

use finquery_core::text::{char_offset, char_slice, fold_case};
use finquery_core::{
    Granularity, PeriodDescriptor, PeriodItem, PeriodType, PeriodUnit, RelativeWindow, Warning,
};
use regex::{Captures, Match, Regex};
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, instrument, trace};

/// A year with an optional fiscal/calendar marker: `2023`, `FY23`, `fiscal year 2023`, `'23`.
const YEAR_TERM: &str = r"(?:\b(?:fy|cy)\s?'?(?:\d{4}|\d{2})\b|\b(?:fiscal|calendar)(?:\s+year)?\s+'?(?:\d{4}|\d{2})\b|'\d{2}\b|\b(?:19|20)\d{2}\b)";

/// Range separator.
const SEP: &str = r"(?:-|–|—|\bto\b|\bthrough\b|\bthru\b|\buntil\b)";

/// Endpoint of a possibly nested range.
const ENDPOINT: &str = r"(?:(?:19|20)\d{2}|fy\s?'?\d{2,4}|cy\s?'?\d{2,4}|q[1-4])";

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
];

const ORDINALS: &[(&str, u8)] = &[
    ("first", 1),
    ("1st", 1),
    ("second", 2),
    ("2nd", 2),
    ("third", 3),
    ("3rd", 3),
    ("fourth", 4),
    ("4th", 4),
];

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("period pattern is valid")
}

static YEAR_TERM_RE: LazyLock<Regex> = LazyLock::new(|| compile(YEAR_TERM));

static TERM_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^(?:(?P<mark>fy|cy|fiscal|calendar)(?:\s+year)?\s*)?'?(?P<year>\d{4}|\d{2})$")
});

static EXPLICIT_FISCAL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?:fy|fiscal)(?:\b|\d|')"));

static EXPLICIT_CALENDAR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?:cy|calendar)(?:\b|\d|')"));

/// Single-quarter forms: `Q1 2024`, `2024 Q1`, `first quarter of 2024`.
static QUARTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compile(&format!(
            r"\bq(?P<q>[1-4])\s*(?:of\s+|in\s+)?(?P<y>{YEAR_TERM}|\d{{2}}\b)"
        )),
        compile(&format!(r"(?P<y>{YEAR_TERM})\s+q(?P<q>[1-4])\b")),
        compile(&format!(
            r"\b(?P<ord>first|second|third|fourth|1st|2nd|3rd|4th)\s+(?P<fq>fiscal\s+)?quarter\s+(?:of\s+|in\s+)?(?P<y>{YEAR_TERM})"
        )),
    ]
});

/// Largest window the `relative` rule accepts.
pub const MAX_RELATIVE_COUNT: u32 = 100;

/// Words after which a bare two-digit number reads as a year.
const SHORT_YEAR_LEADS: &[&str] = &["in", "for", "during", "of", "from", "since"];

/// Words after which a bare two-digit number is a count, not a year.
const COUNT_LEADS: &[&str] = &[
    "top", "bottom", "first", "last", "past", "next", "over", "under", "than", "about",
];

static QUARTER_WORD: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?:quarter|quarters|quarterly|qtr|mrq|q[1-4])\b"));

/// The ordered rule table.
static RULES: LazyLock<Vec<PeriodRule>> = LazyLock::new(|| {
    vec![
        PeriodRule {
            name: "relative",
            patterns: vec![compile(
                r"\b(?:last|past|previous|prior|recent|trailing)\s+(?:(?P<count>\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s+)?(?P<fiscal>fiscal\s+)?(?P<unit>quarter|year)s?\b",
            )],
            handler: relative,
        },
        PeriodRule {
            name: "malformed_range",
            patterns: vec![compile(&format!(
                r"\b{ENDPOINT}\s*{SEP}\s*{ENDPOINT}\s*{SEP}\s*{ENDPOINT}\b"
            ))],
            handler: malformed_range,
        },
        PeriodRule {
            name: "quarter_range",
            patterns: vec![
                compile(&format!(
                    r"\bq(?P<q1>[1-4])\s+(?P<y1>{YEAR_TERM})\s*{SEP}\s*q(?P<q2>[1-4])\s+(?P<y2>{YEAR_TERM})"
                )),
                compile(&format!(
                    r"\bq(?P<q1>[1-4])\s*{SEP}\s*q(?P<q2>[1-4])\s*(?:of\s+|in\s+)?(?P<y>{YEAR_TERM}|\d{{2}}\b)"
                )),
                compile(&format!(
                    r"(?P<y>{YEAR_TERM})\s+q(?P<q1>[1-4])\s*{SEP}\s*q(?P<q2>[1-4])\b"
                )),
            ],
            handler: quarter_range,
        },
        PeriodRule {
            name: "year_range",
            patterns: vec![
                compile(&format!(
                    r"\bbetween\s+(?P<y1>{YEAR_TERM})\s+and\s+(?P<y2>{YEAR_TERM})"
                )),
                compile(&format!(r"(?P<y1>{YEAR_TERM})\s*{SEP}\s*(?P<y2>{YEAR_TERM})")),
            ],
            handler: year_range,
        },
        PeriodRule {
            name: "quarter",
            patterns: QUARTER_PATTERNS.clone(),
            handler: quarters,
        },
        PeriodRule {
            name: "year",
            patterns: vec![compile(YEAR_TERM)],
            handler: years,
        },
        PeriodRule {
            name: "short_year",
            patterns: vec![compile(r"\b\d{2}\b")],
            handler: short_year,
        },
        PeriodRule {
            name: "latest",
            patterns: vec![compile(
                r"\b(?:latest|current|this\s+quarter|this\s+year|most\s+recent|ttm|trailing\s+twelve\s+months|ytd|year\s+to\s+date)\b",
            )],
            handler: latest,
        },
    ]
});

type Handler = fn(&Captures<'_>, &Context<'_>) -> Option<PeriodDescriptor>;

/// One entry of the rule table.
struct PeriodRule {
    name: &'static str,
    patterns: Vec<Regex>,
    handler: Handler,
}

impl fmt::Debug for PeriodRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodRule")
            .field("name", &self.name)
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Marker {
    Fiscal,
    Calendar,
}

#[derive(Clone, Debug)]
struct YearTerm {
    year: i32,
    marker: Option<Marker>,
    /// The two digits of a short year (`23` in `FY23`).
    short: Option<String>,
}

/// Reads one matched year term. Years outside 1900..=2099 are rejected.
fn parse_year_term(s: &str) -> Option<YearTerm> {
    let caps = TERM_PARTS.captures(s.trim())?;
    let digits = caps.name("year")?.as_str();
    let marker = caps.name("mark").map(|m| match m.as_str() {
        "fy" | "fiscal" => Marker::Fiscal,
        _ => Marker::Calendar,
    });

    let value: i32 = digits.parse().ok()?;
    let (year, short) = if digits.len() == 2 {
        (2000 + value, Some(digits.to_string()))
    } else {
        (value, None)
    };
    (1900..=2099)
        .contains(&year)
        .then_some(YearTerm {
            year,
            marker,
            short,
        })
}

/// Combines endpoint markers; `None` when they explicitly disagree.
fn merge_markers(a: Option<Marker>, b: Option<Marker>) -> Option<Option<Marker>> {
    match (a, b) {
        (Some(x), Some(y)) if x != y => None,
        (a, b) => Some(a.or(b)),
    }
}

fn parse_count(s: &str) -> Option<u32> {
    s.parse().ok().or_else(|| {
        NUMBER_WORDS
            .iter()
            .find(|(word, _)| *word == s)
            .map(|(_, n)| *n)
    })
}

fn quarter_item(index: i32) -> PeriodItem {
    // `index.rem_euclid(4)` is always in 0..4
    PeriodItem::quarter(index.div_euclid(4), index.rem_euclid(4) as u8 + 1)
}

/// Per-parse state shared by the handlers.
struct Context<'a> {
    original: &'a str,
    text: String,
    prefer_fiscal: bool,
    /// Fiscal/calendar marker written anywhere in the text, if unambiguous.
    explicit: Option<bool>,
}

impl<'a> Context<'a> {
    fn new(original: &'a str, prefer_fiscal: bool) -> Self {
        let text = fold_case(original);
        let explicit = match (
            EXPLICIT_FISCAL.is_match(&text),
            EXPLICIT_CALENDAR.is_match(&text),
        ) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        };
        Self {
            original,
            text,
            prefer_fiscal,
            explicit,
        }
    }

    fn fiscal_default(&self) -> bool {
        self.explicit.unwrap_or(self.prefer_fiscal)
    }

    fn fiscal_for(&self, marker: Option<Marker>) -> bool {
        match marker {
            Some(Marker::Fiscal) => true,
            Some(Marker::Calendar) => false,
            None => self.fiscal_default(),
        }
    }

    /// Original-case text of a match on the folded text.
    fn fragment(&self, m: Match<'_>) -> String {
        char_slice(
            self.original,
            char_offset(&self.text, m.start()),
            char_offset(&self.text, m.end()),
        )
    }

    fn latest(&self) -> PeriodDescriptor {
        let unit = if QUARTER_WORD.is_match(&self.text) {
            PeriodUnit::Quarter
        } else {
            PeriodUnit::Year
        };
        PeriodDescriptor::latest(
            Granularity::new(unit, self.explicit == Some(true)),
            self.fiscal_default(),
        )
    }
}

fn add_short_year_warnings<'t>(desc: &mut PeriodDescriptor, terms: impl IntoIterator<Item = &'t YearTerm>) {
    for term in terms {
        if let Some(short) = &term.short {
            desc.push_warning(Warning::AmbiguousYear(short.clone()));
        }
    }
}

fn relative(caps: &Captures<'_>, ctx: &Context<'_>) -> Option<PeriodDescriptor> {
    let whole = caps.get(0)?;
    // "most recent quarter" means the latest one, not a window
    if ctx.text[..whole.start()].trim_end().ends_with("most") {
        return None;
    }
    let count = match caps.name("count") {
        Some(c) => parse_count(c.as_str())?,
        None => 1,
    };
    if count == 0 || count > MAX_RELATIVE_COUNT {
        return None;
    }
    let unit = if caps.name("unit")?.as_str() == "quarter" {
        PeriodUnit::Quarter
    } else {
        PeriodUnit::Year
    };
    let fiscal_written = caps.name("fiscal").is_some();

    Some(PeriodDescriptor::relative(
        RelativeWindow { count, unit },
        Granularity::new(unit, fiscal_written),
        fiscal_written || ctx.fiscal_default(),
    ))
}

fn malformed_range(caps: &Captures<'_>, ctx: &Context<'_>) -> Option<PeriodDescriptor> {
    let text = ctx.fragment(caps.get(0)?);
    Some(ctx.latest().with_warning(Warning::MalformedRange(text)))
}

fn quarter_range(caps: &Captures<'_>, ctx: &Context<'_>) -> Option<PeriodDescriptor> {
    let text = ctx.fragment(caps.get(0)?);
    let q1: i32 = caps.name("q1")?.as_str().parse().ok()?;
    let q2: i32 = caps.name("q2")?.as_str().parse().ok()?;
    let (start_term, end_term) = match caps.name("y") {
        Some(y) => {
            let term = parse_year_term(y.as_str())?;
            (term.clone(), term)
        }
        None => (
            parse_year_term(caps.name("y1")?.as_str())?,
            parse_year_term(caps.name("y2")?.as_str())?,
        ),
    };

    let Some(marker) = merge_markers(start_term.marker, end_term.marker) else {
        return Some(ctx.latest().with_warning(Warning::MixedRange(text)));
    };
    let start = start_term.year * 4 + q1 - 1;
    let end = end_term.year * 4 + q2 - 1;
    if start > end {
        return Some(ctx.latest().with_warning(Warning::ReversedRange(text)));
    }

    let mut desc = PeriodDescriptor::absolute(
        PeriodType::Multi,
        Granularity::new(PeriodUnit::Quarter, ctx.fiscal_for(marker)),
        (start..=end).map(quarter_item).collect(),
    );
    add_short_year_warnings(&mut desc, [&start_term, &end_term]);
    if start == end {
        desc.push_warning(Warning::AmbiguousRange(text));
    }
    Some(desc)
}

fn year_range(caps: &Captures<'_>, ctx: &Context<'_>) -> Option<PeriodDescriptor> {
    let text = ctx.fragment(caps.get(0)?);
    let first = parse_year_term(caps.name("y1")?.as_str())?;
    let last = parse_year_term(caps.name("y2")?.as_str())?;

    let Some(marker) = merge_markers(first.marker, last.marker) else {
        return Some(ctx.latest().with_warning(Warning::MixedRange(text)));
    };
    if first.year > last.year {
        return Some(ctx.latest().with_warning(Warning::ReversedRange(text)));
    }

    // A same-endpoint range is still a range, with one item
    let mut desc = PeriodDescriptor::absolute(
        PeriodType::Range,
        Granularity::new(PeriodUnit::Year, ctx.fiscal_for(marker)),
        (first.year..=last.year).map(PeriodItem::year).collect(),
    );
    add_short_year_warnings(&mut desc, [&first, &last]);
    if first.year == last.year {
        desc.push_warning(Warning::AmbiguousRange(text));
    }
    Some(desc)
}

/// Reads one single-quarter match as (item, year term, marker).
fn quarter_mention(caps: &Captures<'_>) -> Option<(PeriodItem, YearTerm, Option<Marker>)> {
    let quarter: u8 = match (caps.name("q"), caps.name("ord")) {
        (Some(q), _) => q.as_str().parse().ok()?,
        (None, Some(ord)) => ORDINALS
            .iter()
            .find(|(word, _)| *word == ord.as_str())
            .map(|(_, q)| *q)?,
        (None, None) => return None,
    };
    let term = parse_year_term(caps.name("y")?.as_str())?;
    let marker = term
        .marker
        .or_else(|| caps.name("fq").map(|_| Marker::Fiscal));
    Some((PeriodItem::quarter(term.year, quarter), term, marker))
}

/// Collects every listed quarter; one gives `single`, several give `multi`.
fn quarters(_caps: &Captures<'_>, ctx: &Context<'_>) -> Option<PeriodDescriptor> {
    let mut found: Vec<(usize, usize, PeriodItem, YearTerm, Option<Marker>)> = Vec::new();
    for pattern in QUARTER_PATTERNS.iter() {
        for caps in pattern.captures_iter(&ctx.text) {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if found.iter().any(|f| start < f.1 && f.0 < end) {
                continue;
            }
            if let Some((item, term, marker)) = quarter_mention(&caps) {
                found.push((start, end, item, term, marker));
            }
        }
    }
    found.sort_by_key(|f| f.0);

    let mut items: Vec<PeriodItem> = Vec::new();
    for (_, _, item, _, _) in &found {
        if !items.contains(item) {
            items.push(*item);
        }
    }
    if items.is_empty() {
        return None;
    }

    let marker = found.iter().find_map(|f| f.4);
    let period_type = if items.len() == 1 {
        PeriodType::Single
    } else {
        PeriodType::Multi
    };
    let mut desc = PeriodDescriptor::absolute(
        period_type,
        Granularity::new(PeriodUnit::Quarter, ctx.fiscal_for(marker)),
        items,
    );
    add_short_year_warnings(&mut desc, found.iter().map(|f| &f.3));
    Some(desc)
}

fn years(_caps: &Captures<'_>, ctx: &Context<'_>) -> Option<PeriodDescriptor> {
    let mut terms: Vec<YearTerm> = Vec::new();
    for m in YEAR_TERM_RE.find_iter(&ctx.text) {
        if let Some(term) = parse_year_term(m.as_str()) {
            if !terms.iter().any(|t| t.year == term.year) {
                terms.push(term);
            }
        }
    }
    if terms.is_empty() {
        return None;
    }

    let marker = terms.iter().find_map(|t| t.marker);
    let granularity = Granularity::new(PeriodUnit::Year, ctx.fiscal_for(marker));
    let period_type = if terms.len() == 1 {
        PeriodType::Single
    } else {
        PeriodType::Multi
    };
    let mut desc = PeriodDescriptor::absolute(
        period_type,
        granularity,
        terms.iter().map(|t| PeriodItem::year(t.year)).collect(),
    );
    add_short_year_warnings(&mut desc, &terms);
    Some(desc)
}

/// A bare two-digit year (`revenue 23`, `in 23`), read as `20XX`.
fn short_year(caps: &Captures<'_>, ctx: &Context<'_>) -> Option<PeriodDescriptor> {
    let whole = caps.get(0)?;
    let before = &ctx.text[..whole.start()];
    let after = &ctx.text[whole.end()..];

    if before.ends_with(['$', '.', ',', '/', ':', '#', '-', '+'])
        || after.starts_with(['%', '/', ':', '$'])
    {
        return None;
    }
    // Decimal or thousands part such as `23.5` or `23,000`
    let mut next = after.chars();
    if matches!(next.next(), Some('.' | ',')) && next.next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }

    let lead = before.split_whitespace().next_back().unwrap_or("");
    if COUNT_LEADS.contains(&lead) {
        return None;
    }
    let tail = after.trim_start();
    let ends_text = tail.is_empty() || tail.starts_with(['?', '!', '.', ',', ';', ')']);
    if !ends_text && !SHORT_YEAR_LEADS.contains(&lead) {
        return None;
    }

    let term = parse_year_term(whole.as_str())?;
    let mut desc = PeriodDescriptor::absolute(
        PeriodType::Single,
        Granularity::new(PeriodUnit::Year, ctx.fiscal_default()),
        vec![PeriodItem::year(term.year)],
    );
    add_short_year_warnings(&mut desc, [&term]);
    Some(desc)
}

fn latest(_caps: &Captures<'_>, ctx: &Context<'_>) -> Option<PeriodDescriptor> {
    Some(ctx.latest())
}

/// Name reported when no rule accepted the text.
pub const FALLBACK_RULE: &str = "fallback";

/// Parser for the time-period part of a query.
///
/// The grammar holds no state of its own; the compiled rule table is shared
/// process-wide and initialised on first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodGrammar;

impl PeriodGrammar {
    /// Creates a grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Names of the rules in the order they are tried.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        RULES.iter().map(|r| r.name).collect()
    }

    /// Parses the period expressed in `text`.
    ///
    /// `prefer_fiscal` picks fiscal granularity for years and quarters that
    /// carry no FY/CY/fiscal/calendar marker; explicit markers always win.
    /// Never fails: text without a period yields `latest`.
    #[must_use]
    pub fn parse(&self, text: &str, prefer_fiscal: bool) -> PeriodDescriptor {
        self.parse_with_rule(text, prefer_fiscal).0
    }

    /// Parses `text` and also returns the name of the rule that fired.
    #[instrument(skip(self), level = "debug")]
    pub fn parse_with_rule(&self, text: &str, prefer_fiscal: bool) -> (PeriodDescriptor, &'static str) {
        let ctx = Context::new(text, prefer_fiscal);

        for rule in RULES.iter() {
            for pattern in &rule.patterns {
                for caps in pattern.captures_iter(&ctx.text) {
                    if let Some(desc) = (rule.handler)(&caps, &ctx) {
                        debug!(
                            rule = rule.name,
                            period_type = %desc.period_type,
                            granularity = %desc.granularity,
                            "Period rule fired"
                        );
                        return (desc, rule.name);
                    }
                    trace!(rule = rule.name, "Rule declined match");
                }
            }
        }

        (ctx.latest(), FALLBACK_RULE)
    }
}
