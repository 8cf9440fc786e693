//! Identifier normalization and stemming.
//!
//! Shared by the resolver, the reconciler's status-quo detection and the
//! integrity sentinel, so a human-readable label and its normalized id always
//! compare equal.

use std::collections::BTreeSet;

/// Normalize free text into an identifier.
///
/// Lowercases, maps every non-alphanumeric run to one `_`, and trims leading
/// and trailing underscores. Normalizing a normalized id returns it unchanged.
#[must_use]
pub fn normalize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Words that never carry a constraint target on their own.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "for", "and", "or", "in", "on", "at", "by", "with", "from",
    "our", "we", "us", "my", "your", "their", "its", "it", "this", "that", "these", "those", "is",
    "are", "be", "been", "being", "was", "were", "will", "would", "can", "could", "should",
    "must", "may", "might", "shall", "not", "no", "do", "does", "than", "as", "so", "per",
    "each", "all", "any", "some", "under", "over", "below", "above", "less", "more", "least",
    "most", "maximum", "minimum", "max", "min", "total", "overall", "without", "within",
    "between", "up", "also", "just", "only", "new", "next", "current", "plan", "target",
    "goal", "limit", "cap",
];

/// Verbs that introduce a constraint rather than name its target.
const VERBS: &[&str] = &[
    "keep", "stay", "remain", "exceed", "exceeding", "ensure", "achieve", "reach", "hit",
    "maintain", "need", "needs", "want", "wants", "get", "make", "go", "going", "have", "has",
    "aim", "hold", "bring", "fall", "drop", "rise", "reduce", "increase", "grow", "cut",
    "deliver", "finish", "complete", "launch", "ship",
];

/// Whether `word` is a stop word or a constraint verb.
#[must_use]
pub fn is_stop_word(word: &str) -> bool {
    let lowered = word.to_ascii_lowercase();
    STOP_WORDS.contains(&lowered.as_str()) || VERBS.contains(&lowered.as_str())
}

/// Crude suffix-stripping stem.
#[must_use]
pub fn stem(word: &str) -> String {
    let w = word.to_lowercase();
    let len = w.chars().count();
    let strip = |suffix: &str, min_len: usize| -> Option<String> {
        (len >= min_len && w.ends_with(suffix)).then(|| w[..w.len() - suffix.len()].to_string())
    };
    if let Some(s) = strip("ies", 5) {
        return format!("{}y", s);
    }
    for (suffix, min_len) in [("ing", 6), ("ment", 7), ("ed", 5)] {
        if let Some(s) = strip(suffix, min_len) {
            return s;
        }
    }
    for suffix in ["ches", "shes", "sses", "xes"] {
        if w.ends_with(suffix) && len > suffix.len() + 1 {
            return w[..w.len() - 2].to_string();
        }
    }
    if len >= 4 && w.ends_with('s') && !w.ends_with("ss") && !w.ends_with("us") {
        return w[..w.len() - 1].to_string();
    }
    w
}

/// Split text into alphanumeric words.
#[must_use]
pub fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Stems of the content words in `text`.
#[must_use]
pub fn content_stems(text: &str) -> BTreeSet<String> {
    words(text)
        .into_iter()
        .filter(|w| !is_stop_word(w))
        .map(stem)
        .collect()
}

/// Concatenated stems of the content words, in order.
///
/// Used to judge whether an identifier says anything at all.
#[must_use]
pub fn substantive_stem(text: &str) -> String {
    words(text)
        .into_iter()
        .filter(|w| !is_stop_word(w))
        .map(stem)
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_basic() {
        assert_eq!(normalize_id("Marketing Spend (£)"), "marketing_spend");
        assert_eq!(normalize_id("  --Status Quo--  "), "status_quo");
        assert_eq!(normalize_id("do-nothing"), "do_nothing");
        assert_eq!(normalize_id("!!!"), "");
    }

    #[test]
    fn normalize_is_fixed_point() {
        for raw in ["Keep Current State", "a__b", "Q3 2026 launch", "ÉTÉ plan"] {
            let once = normalize_id(raw);
            assert_eq!(normalize_id(&once), once);
        }
    }

    #[test]
    fn stemming() {
        assert_eq!(stem("Costs"), "cost");
        assert_eq!(stem("salaries"), "salary");
        assert_eq!(stem("marketing"), "market");
        assert_eq!(stem("churn"), "churn");
        assert_eq!(stem("status"), "status");
        assert_eq!(stem("boxes"), "box");
    }

    #[test]
    fn junk_detection_inputs() {
        assert_eq!(substantive_stem("it"), "");
        assert_eq!(substantive_stem("keep the total"), "");
        assert_eq!(substantive_stem("marketing budget"), "marketbudget");
        assert!(content_stems("Monthly Costs").contains("cost"));
    }
}
