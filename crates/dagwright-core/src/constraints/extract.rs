//! Free-text constraint extraction.
//!
//! Scans a decision brief with an ordered list of textual patterns and turns
//! every bound it finds into an [`ExtractedConstraint`] with a provisional
//! target id. Patterns run in a fixed order; a span consumed by an earlier
//! pattern is invisible to later ones, so "must not exceed £80k" is read once
//! as a negated bound and never again as a plain comparative.

use super::normalize::{is_stop_word, normalize_id};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

// =============================================================================
// TYPES
// =============================================================================

/// Direction of a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<=")]
    AtMost,
    #[serde(rename = ">=")]
    AtLeast,
}

impl Operator {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::AtMost => "<=",
            Operator::AtLeast => ">=",
        }
    }

    /// Whether `candidate` is a tighter bound than `current`.
    #[must_use]
    pub fn is_stricter(&self, candidate: f64, current: f64) -> bool {
        match self {
            Operator::AtMost => candidate < current,
            Operator::AtLeast => candidate > current,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the brief a constraint was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintProvenance {
    pub source: String,
    pub quote: String,
    /// Byte offsets `[start, end)` into the brief.
    pub span: (usize, usize),
}

/// Extra metadata carried by deadline constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineInfo {
    /// The matched text, e.g. `by Q3 2026`.
    pub raw: String,
    /// ISO date for absolute deadlines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Duration in days for relative deadlines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_days: Option<u32>,
}

/// A bound read from the brief, not yet bound to a graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedConstraint {
    pub target_name: String,
    /// Provisional id: the normalized target name.
    pub target_id: String,
    pub operator: Operator,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub confidence: f64,
    pub provenance: ConstraintProvenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DeadlineInfo>,
}

impl ExtractedConstraint {
    /// Deadline constraints bind to the goal rather than a named node.
    #[must_use]
    pub fn is_temporal(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Target name used for every deadline constraint.
pub const DEADLINE_TARGET: &str = "deadline";

const CONFIDENCE_NEGATED: f64 = 0.9;
const CONFIDENCE_BOUND: f64 = 0.85;
const CONFIDENCE_WITHOUT_EXCEEDING: f64 = 0.85;
const CONFIDENCE_RANGE: f64 = 0.8;
const CONFIDENCE_DEADLINE: f64 = 0.75;

const PROVENANCE_SOURCE: &str = "brief";

// =============================================================================
// PATTERNS
// =============================================================================

/// Amount fragment with group names prefixed by `p`.
fn amount(p: &str) -> String {
    format!(
        r"(?:(?P<{p}pre>gbp|usd|eur)\s*)?(?P<{p}cur>[£$€])?\s*(?P<{p}num>\d{{1,3}}(?:,\d{{3}})+(?:\.\d+)?|\d+(?:\.\d+)?)(?:\s*(?P<{p}suf>%|percent\b|thousand\b|million\b|billion\b|mn\b|bn\b|k\b|m\b|b\b))?(?:\s*(?P<{p}code>gbp|usd|eur)\b)?",
        p = p
    )
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("constraint pattern is a valid regex")
}

static NEGATED: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)\b(?:(?:must|should|can|could|will|shall|may|does|do|is|are)\s*(?:not|n't)\s+|cannot\s+|never\s+)(?:(?P<up>exceed|go\s+(?:over|above|beyond)|be\s+(?:more|greater|higher|over|above)(?:\s+than)?|surpass|top|rise\s+above)|(?P<down>fall\s+below|drop\s+below|go\s+below|dip\s+below|be\s+(?:less|lower|fewer|under|below)(?:\s+than)?))\s+{}",
        amount("a")
    ))
});

static WITHOUT_EXCEEDING: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)\bwithout\s+(?:exceeding|going\s+(?:over|above|beyond)|surpassing|breaking|spending\s+more\s+than)\s+{}",
        amount("a")
    ))
});

static RANGE_BETWEEN: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)\bbetween\s+{}\s+(?:and|to|-)\s+{}",
        amount("lo"),
        amount("hi")
    ))
});

static RANGE_FROM: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)\bfrom\s+{}\s+to\s+{}",
        amount("lo"),
        amount("hi")
    ))
});

static UPPER: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)(?:\b(?:under|below|less\s+than|fewer\s+than|lower\s+than|at\s+most|no\s+more\s+than|not\s+more\s+than|no\s+higher\s+than|a\s+maximum\s+of|maximum\s+of|max|maximum|up\s+to|capped\s+at|within)\s+|(?:<=|≤|<)\s*){}",
        amount("a")
    ))
});

static LOWER: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)(?:\b(?:over|above|more\s+than|greater\s+than|higher\s+than|at\s+least|no\s+less\s+than|not\s+less\s+than|no\s+fewer\s+than|a\s+minimum\s+of|minimum\s+of|min|minimum|exceeds?|exceeding|beyond)\s+|(?:>=|≥|>)\s*){}",
        amount("a")
    ))
});

static ABSOLUTE_DEADLINE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b(?P<prep>by|before|until|no\s+later\s+than|ahead\s+of)\s+(?:the\s+)?(?:end\s+of\s+)?(?:(?P<q>q[1-4])\s*(?:of\s+)?(?P<qy>\d{4})|(?P<mon>january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(?P<my>\d{4})|(?P<y>(?:19|20)\d{2}))\b",
    )
});

static RELATIVE_DEADLINE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b(?:within\s+the\s+next|within|in\s+the\s+next|over\s+the\s+next|inside|in)\s+(?P<n>\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|eighteen)\s+(?P<u>days?|weeks?|months?|quarters?|years?)\b",
    )
});

const TIME_UNITS: &[&str] = &[
    "day", "days", "week", "weeks", "month", "months", "quarter", "quarters", "year", "years",
    "yr", "yrs", "hour", "hours",
];

// =============================================================================
// AMOUNTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scale {
    Percent,
    Multiplier(f64),
}

#[derive(Debug, Clone, Copy)]
struct Amount {
    number: f64,
    scale: Option<Scale>,
    currency: Option<&'static str>,
}

impl Amount {
    fn parse(caps: &Captures<'_>, p: &str) -> Option<Self> {
        let group = |name: &str| caps.name(&format!("{}{}", p, name)).map(|m| m.as_str());
        let number: f64 = group("num")?.replace(',', "").parse().ok()?;
        let scale = group("suf").and_then(|s| match s.to_ascii_lowercase().as_str() {
            "%" | "percent" => Some(Scale::Percent),
            "k" | "thousand" => Some(Scale::Multiplier(1e3)),
            "m" | "mn" | "million" => Some(Scale::Multiplier(1e6)),
            "b" | "bn" | "billion" => Some(Scale::Multiplier(1e9)),
            _ => None,
        });
        let currency = group("cur")
            .and_then(currency_from_symbol)
            .or_else(|| group("pre").and_then(currency_from_code))
            .or_else(|| group("code").and_then(currency_from_code));
        Some(Self {
            number,
            scale,
            currency,
        })
    }

    fn value(&self) -> f64 {
        match self.scale {
            Some(Scale::Percent) => self.number / 100.0,
            Some(Scale::Multiplier(m)) => self.number * m,
            None => self.number,
        }
    }

    fn unit(&self) -> Option<String> {
        match self.scale {
            Some(Scale::Percent) => Some("percent".to_string()),
            Some(Scale::Multiplier(_)) | None => self.currency.map(str::to_string),
        }
    }
}

fn currency_from_symbol(symbol: &str) -> Option<&'static str> {
    match symbol {
        "£" => Some("GBP"),
        "$" => Some("USD"),
        "€" => Some("EUR"),
        _ => None,
    }
}

fn currency_from_code(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "GBP" => Some("GBP"),
        "USD" => Some("USD"),
        "EUR" => Some("EUR"),
        _ => None,
    }
}

// =============================================================================
// CALENDAR
// =============================================================================

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let m = i64::from(month);
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn last_day_of_month(year: i64, month: u32) -> u32 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn month_number(name: &str) -> Option<u32> {
    let lowered = name.to_ascii_lowercase();
    let prefix = lowered.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// A calendar period named in a deadline.
#[derive(Debug, Clone, Copy)]
enum Period {
    Year(i64),
    Quarter(i64, u32),
    Month(i64, u32),
}

impl Period {
    /// The period that ends just before this one starts.
    fn previous(self) -> Self {
        match self {
            Period::Year(y) => Period::Year(y - 1),
            Period::Quarter(y, 1) => Period::Quarter(y - 1, 4),
            Period::Quarter(y, q) => Period::Quarter(y, q - 1),
            Period::Month(y, 1) => Period::Month(y - 1, 12),
            Period::Month(y, m) => Period::Month(y, m - 1),
        }
    }

    /// Last calendar day of the period as `(year, month, day)`.
    fn last_day(self) -> (i64, u32, u32) {
        let (year, month) = match self {
            Period::Year(y) => (y, 12),
            Period::Quarter(y, q) => (y, q * 3),
            Period::Month(y, m) => (y, m),
        };
        (year, month, last_day_of_month(year, month))
    }
}

fn parse_number_word(raw: &str) -> Option<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    let n = match raw.to_ascii_lowercase().as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "eighteen" => 18,
        _ => return None,
    };
    Some(n)
}

fn unit_days(unit: &str) -> u32 {
    let lowered = unit.to_ascii_lowercase();
    match lowered.trim_end_matches('s') {
        "week" => 7,
        "month" => 30,
        "quarter" => 91,
        "year" => 365,
        _ => 1,
    }
}

// =============================================================================
// SCANNER
// =============================================================================

/// Extract every constraint in `brief`.
#[must_use]
pub fn extract_constraints(brief: &str) -> Vec<ExtractedConstraint> {
    let mut scanner = Scanner::new(brief);
    scanner.scan_negated();
    scanner.scan_without_exceeding();
    scanner.scan_ranges();
    scanner.scan_bound(&UPPER, Operator::AtMost);
    scanner.scan_bound(&LOWER, Operator::AtLeast);
    scanner.scan_absolute_deadlines();
    scanner.scan_relative_deadlines();
    let found = scanner.out.len();
    let constraints = dedup_stricter(scanner.out);
    tracing::debug!(
        found,
        kept = constraints.len(),
        "constraint extraction complete"
    );
    constraints
}

struct Scanner<'t> {
    text: &'t str,
    consumed: Vec<(usize, usize)>,
    out: Vec<ExtractedConstraint>,
}

impl<'t> Scanner<'t> {
    fn new(text: &'t str) -> Self {
        Self {
            text,
            consumed: Vec::new(),
            out: Vec::new(),
        }
    }

    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.consumed.iter().any(|&(s, e)| start < e && s < end)
    }

    /// The word right after `end`, lowercased.
    fn next_word(&self, end: usize) -> String {
        self.text
            .get(end..)
            .unwrap_or("")
            .trim_start()
            .chars()
            .take_while(|c| c.is_alphabetic())
            .collect::<String>()
            .to_lowercase()
    }

    fn followed_by_time_unit(&self, end: usize) -> bool {
        TIME_UNITS.contains(&self.next_word(end).as_str())
    }

    fn push(
        &mut self,
        start: usize,
        end: usize,
        target: Vec<String>,
        operator: Operator,
        amount: Amount,
        confidence: f64,
    ) {
        let target_name = target.join(" ");
        self.out.push(ExtractedConstraint {
            target_id: normalize_id(&target_name),
            target_name,
            operator,
            value: amount.value(),
            unit: amount.unit(),
            confidence,
            provenance: self.provenance(start, end),
            deadline: None,
        });
    }

    fn provenance(&self, start: usize, end: usize) -> ConstraintProvenance {
        ConstraintProvenance {
            source: PROVENANCE_SOURCE.to_string(),
            quote: self.text.get(start..end).unwrap_or("").trim().to_string(),
            span: (start, end),
        }
    }

    fn scan_negated(&mut self) {
        let matches: Vec<_> = NEGATED.captures_iter(self.text).collect();
        for caps in matches {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if self.overlaps(start, end) || self.followed_by_time_unit(end) {
                continue;
            }
            let Some(amount) = Amount::parse(&caps, "a") else {
                continue;
            };
            let operator = if caps.name("down").is_some() {
                Operator::AtLeast
            } else {
                Operator::AtMost
            };
            let target = subject_before(self.text, start)
                .or_else(|| subject_after(self.text, end))
                .unwrap_or_default();
            self.consumed.push((start, end));
            self.push(start, end, target, operator, amount, CONFIDENCE_NEGATED);
        }
    }

    fn scan_without_exceeding(&mut self) {
        let matches: Vec<_> = WITHOUT_EXCEEDING.captures_iter(self.text).collect();
        for caps in matches {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if self.overlaps(start, end) || self.followed_by_time_unit(end) {
                continue;
            }
            let Some(amount) = Amount::parse(&caps, "a") else {
                continue;
            };
            // "without exceeding £50k in spend": the noun after the amount is
            // the budgeted quantity, the clause before it is the ambition.
            let target = subject_after(self.text, end)
                .or_else(|| subject_before(self.text, start))
                .unwrap_or_default();
            self.consumed.push((start, end));
            self.push(
                start,
                end,
                target,
                Operator::AtMost,
                amount,
                CONFIDENCE_WITHOUT_EXCEEDING,
            );
        }
    }

    fn scan_ranges(&mut self) {
        for regex in [&*RANGE_BETWEEN, &*RANGE_FROM] {
            let matches: Vec<_> = regex.captures_iter(self.text).collect();
            for caps in matches {
                let Some(whole) = caps.get(0) else { continue };
                let (start, end) = (whole.start(), whole.end());
                if self.overlaps(start, end) || self.followed_by_time_unit(end) {
                    continue;
                }
                let (Some(mut lo), Some(hi)) = (Amount::parse(&caps, "lo"), Amount::parse(&caps, "hi"))
                else {
                    continue;
                };
                if lo.scale.is_none() {
                    lo.scale = hi.scale;
                }
                if lo.currency.is_none() {
                    lo.currency = hi.currency;
                }
                let target = subject_before(self.text, start)
                    .or_else(|| subject_after(self.text, end))
                    .unwrap_or_default();
                self.consumed.push((start, end));
                self.push(
                    start,
                    end,
                    target.clone(),
                    Operator::AtLeast,
                    lo,
                    CONFIDENCE_RANGE,
                );
                self.push(start, end, target, Operator::AtMost, hi, CONFIDENCE_RANGE);
            }
        }
    }

    fn scan_bound(&mut self, regex: &Regex, operator: Operator) {
        let matches: Vec<_> = regex.captures_iter(self.text).collect();
        for caps in matches {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if self.overlaps(start, end) || self.followed_by_time_unit(end) {
                continue;
            }
            let Some(amount) = Amount::parse(&caps, "a") else {
                continue;
            };
            let target = subject_before(self.text, start)
                .or_else(|| subject_after(self.text, end))
                .unwrap_or_default();
            self.consumed.push((start, end));
            self.push(start, end, target, operator, amount, CONFIDENCE_BOUND);
        }
    }

    fn scan_absolute_deadlines(&mut self) {
        let matches: Vec<_> = ABSOLUTE_DEADLINE.captures_iter(self.text).collect();
        for caps in matches {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if self.overlaps(start, end) {
                continue;
            }
            let Some(period) = named_period(&caps) else {
                continue;
            };
            let before = caps.name("prep").is_some_and(|m| {
                let prep = m.as_str().to_ascii_lowercase();
                prep == "before" || prep.starts_with("ahead")
            });
            let period = if before { period.previous() } else { period };
            let (year, month, day) = period.last_day();
            let iso = format!("{:04}-{:02}-{:02}", year, month, day);
            let epoch_days = days_from_civil(year, month, day);

            self.consumed.push((start, end));
            self.out.push(ExtractedConstraint {
                target_name: DEADLINE_TARGET.to_string(),
                target_id: DEADLINE_TARGET.to_string(),
                operator: Operator::AtMost,
                value: epoch_days as f64,
                unit: Some("date".to_string()),
                confidence: CONFIDENCE_DEADLINE,
                provenance: self.provenance(start, end),
                deadline: Some(DeadlineInfo {
                    raw: whole.as_str().to_string(),
                    date: Some(iso),
                    relative_days: None,
                }),
            });
        }
    }

    fn scan_relative_deadlines(&mut self) {
        let matches: Vec<_> = RELATIVE_DEADLINE.captures_iter(self.text).collect();
        for caps in matches {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if self.overlaps(start, end) {
                continue;
            }
            let (Some(n), Some(unit)) = (
                caps.name("n").and_then(|m| parse_number_word(m.as_str())),
                caps.name("u"),
            ) else {
                continue;
            };
            let days = n.saturating_mul(unit_days(unit.as_str()));

            self.consumed.push((start, end));
            self.out.push(ExtractedConstraint {
                target_name: DEADLINE_TARGET.to_string(),
                target_id: DEADLINE_TARGET.to_string(),
                operator: Operator::AtMost,
                value: f64::from(days),
                unit: Some("days".to_string()),
                confidence: CONFIDENCE_DEADLINE,
                provenance: self.provenance(start, end),
                deadline: Some(DeadlineInfo {
                    raw: whole.as_str().to_string(),
                    date: None,
                    relative_days: Some(days),
                }),
            });
        }
    }
}

fn named_period(caps: &Captures<'_>) -> Option<Period> {
    let year = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<i64>().ok());
    if let (Some(q), Some(y)) = (caps.name("q"), year("qy")) {
        let quarter = q.as_str().get(1..)?.parse::<u32>().ok()?;
        return Some(Period::Quarter(y, quarter));
    }
    if let (Some(mon), Some(y)) = (caps.name("mon"), year("my")) {
        return Some(Period::Month(y, month_number(mon.as_str())?));
    }
    year("y").map(Period::Year)
}

// =============================================================================
// SUBJECTS
// =============================================================================

const MAX_SUBJECT_WORDS: usize = 3;
const MAX_LEADING_STOP_WORDS: usize = 4;

/// Start of the clause containing byte offset `at`.
fn clause_start(text: &str, at: usize) -> usize {
    let head = text.get(..at).unwrap_or("");
    let bytes = head.as_bytes();
    let mut boundary = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let next_is_space = bytes.get(i + 1).is_none_or(u8::is_ascii_whitespace);
        let ends_clause = matches!(b, b'.' | b';' | b':' | b'!' | b'?' | b',') && next_is_space;
        if b == b'\n' || ends_clause {
            boundary = i + 1;
        }
    }
    boundary
}

/// End of the clause containing byte offset `at`.
fn clause_end(text: &str, at: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = at;
    while i < bytes.len() {
        let b = bytes[i];
        let next_is_space = bytes.get(i + 1).is_none_or(u8::is_ascii_whitespace);
        if b == b'\n' || (matches!(b, b'.' | b';' | b':' | b'!' | b'?' | b',') && next_is_space) {
            return i;
        }
        i += 1;
    }
    bytes.len()
}

fn collect_subject<'a>(tokens: impl Iterator<Item = &'a str>) -> Option<Vec<String>> {
    let mut collected = Vec::new();
    let mut skipped = 0usize;
    for token in tokens {
        let word = token.trim_matches(|c: char| !c.is_alphanumeric());
        let is_content = word.chars().next().is_some_and(char::is_alphabetic) && !is_stop_word(word);
        if !is_content {
            if !collected.is_empty() {
                break;
            }
            skipped += 1;
            if skipped > MAX_LEADING_STOP_WORDS {
                break;
            }
            continue;
        }
        collected.push(word.to_lowercase());
        if collected.len() == MAX_SUBJECT_WORDS {
            break;
        }
    }
    (!collected.is_empty()).then_some(collected)
}

/// Up to three content words immediately preceding `start` in its clause.
fn subject_before(text: &str, start: usize) -> Option<Vec<String>> {
    let clause = text.get(clause_start(text, start)..start)?;
    let mut words = collect_subject(clause.split_whitespace().rev())?;
    words.reverse();
    Some(words)
}

/// Up to three content words following `end` in its clause.
fn subject_after(text: &str, end: usize) -> Option<Vec<String>> {
    let clause = text.get(end..clause_end(text, end))?;
    collect_subject(clause.split_whitespace())
}

// =============================================================================
// DEDUP
// =============================================================================

/// Keep only the stricter bound per (target, operator).
///
/// Deadlines of different kinds (date vs. duration) are not comparable and
/// are kept apart by unit. Output is in brief order.
fn dedup_stricter(constraints: Vec<ExtractedConstraint>) -> Vec<ExtractedConstraint> {
    let mut best: BTreeMap<(String, Operator, Option<String>), ExtractedConstraint> =
        BTreeMap::new();
    for constraint in constraints {
        let unit_key = constraint
            .is_temporal()
            .then(|| constraint.unit.clone())
            .flatten();
        let key = (constraint.target_id.clone(), constraint.operator, unit_key);
        match best.get(&key) {
            Some(current) if !constraint.operator.is_stricter(constraint.value, current.value) => {}
            _ => {
                best.insert(key, constraint);
            }
        }
    }
    let mut kept: Vec<_> = best.into_values().collect();
    // Within one span (a range) the lower bound comes first.
    kept.sort_by_key(|c| (c.provenance.span.0, c.operator == Operator::AtMost));
    kept
}

// =============================================================================
// TESTS
// =============================================================================
