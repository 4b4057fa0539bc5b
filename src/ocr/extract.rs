use regex::Regex;
use std::sync::OnceLock;

/// Shown when no candidate survives filtering.
pub const NO_SCORE_SENTINEL: &str = "No suitable score found.";

/// Pattern to match score-like runs:
/// - Decimal numbers with exactly two fractional digits: 1000.00, 25.00
/// - Bare integers: 603, 4
///
/// The decimal alternative comes first so "1000.00" is not split into "1000" and "00".
const CANDIDATE_PATTERN: &str = r"\b\d+\.\d{2}\b|\b\d+\b";

/// Plausible score lengths, counting the decimal point. "1000.00" is 7.
const MIN_CANDIDATE_LEN: usize = 1;
const MAX_CANDIDATE_LEN: usize = 7;

fn candidate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CANDIDATE_PATTERN).expect("candidate pattern is valid"))
}

/// Number candidates found in one block of OCR text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCandidates<'a> {
    /// Every match of the candidate pattern, in text order
    pub raw: Vec<&'a str>,
    /// Matches within the permitted length window, in text order
    pub filtered: Vec<&'a str>,
}

/// Extracts and length-filters number candidates from OCR text.
pub fn extract_candidates(text: &str) -> ScoreCandidates<'_> {
    let raw: Vec<&str> = candidate_regex()
        .find_iter(text)
        .map(|m| m.as_str())
        .collect();

    let filtered = raw
        .iter()
        .copied()
        .filter(|c| (MIN_CANDIDATE_LEN..=MAX_CANDIDATE_LEN).contains(&c.chars().count()))
        .collect();

    ScoreCandidates { raw, filtered }
}

/// Returns the longest candidate, keeping the first one on ties.
fn longest_first<'a>(candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates.fold(None, |best: Option<&str>, c| match best {
        Some(b) if b.chars().count() >= c.chars().count() => Some(b),
        _ => Some(c),
    })
}

/// Picks the most plausible score from filtered candidates.
///
/// Decimal candidates always beat integers; within a group the longest wins.
pub fn select_score<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    let decimal = longest_first(candidates.iter().copied().filter(|c| c.contains('.')));
    decimal.or_else(|| longest_first(candidates.iter().copied().filter(|c| !c.contains('.'))))
}

/// Extracts the best-guess score from OCR text restricted to digits and '.'.
///
/// Returns None when nothing plausible is present; never fails on malformed input.
pub fn extract_score(text: &str) -> Option<String> {
    let candidates = extract_candidates(text);

    crate::log(&format!("Raw number candidates: {:?}", candidates.raw));

    if candidates.filtered.is_empty() {
        crate::log("No suitable numerical score found after filtering");
        return None;
    }

    crate::log(&format!(
        "Score candidates after filtering: {:?}",
        candidates.filtered
    ));

    select_score(&candidates.filtered).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_digits_returns_none() {
        assert_eq!(extract_score(""), None);
        assert_eq!(extract_score("..."), None);
        assert_eq!(extract_score(" . . "), None);
    }

    #[test]
    fn test_longest_integer_selected() {
        assert_eq!(extract_score("3 40 1000").as_deref(), Some("1000"));
    }

    #[test]
    fn test_decimal_wins_over_integer() {
        assert_eq!(extract_score("603 1000.00").as_deref(), Some("1000.00"));
        // Even when the integer is longer
        assert_eq!(extract_score("1234567 5.00").as_deref(), Some("5.00"));
    }

    #[test]
    fn test_overlong_candidates_excluded() {
        assert_eq!(extract_score("12345678"), None);
        assert_eq!(extract_score("12345678 42").as_deref(), Some("42"));
        // 8 characters including the point
        assert_eq!(extract_score("10000.00 7"), Some("7".to_string()));
    }

    #[test]
    fn test_one_fractional_digit_is_not_decimal() {
        let candidates = extract_candidates("1000.0");
        assert_eq!(candidates.raw, vec!["1000", "0"]);
        assert_eq!(extract_score("1000.0").as_deref(), Some("1000"));
    }

    #[test]
    fn test_three_fractional_digits_is_not_decimal() {
        let candidates = extract_candidates("12.345");
        assert_eq!(candidates.raw, vec!["12", "345"]);
    }

    #[test]
    fn test_decimal_matched_before_integer_prefix() {
        let candidates = extract_candidates("25.00 603");
        assert_eq!(candidates.raw, vec!["25.00", "603"]);
    }

    #[test]
    fn test_ties_keep_first_encountered() {
        assert_eq!(select_score(&["12.50", "99.99"]), Some("12.50"));
        assert_eq!(select_score(&["111", "222", "33"]), Some("111"));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Arabic-Indic digits are two bytes each in UTF-8.
        assert_eq!(select_score(&["\u{661}\u{662}\u{663}", "1234"]), Some("1234"));
        assert_eq!(select_score(&["1234", "\u{661}\u{662}\u{663}\u{664}"]), Some("1234"));
        assert_eq!(
            extract_score("\u{661}\u{662}\u{663} 1234").as_deref(),
            Some("1234")
        );
    }

    #[test]
    fn test_longest_decimal_selected() {
        assert_eq!(
            extract_score("1.50 250.00 12.00").as_deref(),
            Some("250.00")
        );
    }

    #[test]
    fn test_select_score_empty() {
        assert_eq!(select_score(&[]), None);
    }
}
