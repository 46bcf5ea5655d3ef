use anyhow::{Context, Result};
use regex::Regex;

/// `$100`, `₹100`, `100 USD`, `100 INR`, matched leftmost-first.
const MONETARY_PATTERN: &str = r"\$\d+|\d+ USD|₹\d+|\d+ INR";

/// Case-insensitive substring matcher over a fixed keyword list.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    lowered: Vec<String>,
}

impl KeywordMatcher {
    /// Duplicate keywords (ignoring case) are kept once, first spelling wins.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut kept = Vec::new();
        let mut lowered: Vec<String> = Vec::new();
        for kw in keywords {
            let kw: String = kw.into();
            let lower = kw.to_lowercase();
            if !lowered.contains(&lower) {
                lowered.push(lower);
                kept.push(kw);
            }
        }
        Self {
            keywords: kept,
            lowered,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Keywords occurring anywhere in `text`, in keyword-list order.
    pub fn find(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .zip(&self.lowered)
            .filter(|(_, lower)| haystack.contains(lower.as_str()))
            .map(|(kw, _)| kw.clone())
            .collect()
    }
}

/// Pulls currency amounts out of free text.
#[derive(Debug, Clone)]
pub struct MonetaryExtractor {
    pattern: Regex,
}

impl MonetaryExtractor {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(MONETARY_PATTERN).context("Invalid monetary pattern")?;
        Ok(Self { pattern })
    }

    /// Every match in order of appearance, duplicates included.
    pub fn extract(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> KeywordMatcher {
        KeywordMatcher::new(["ICO", "pump and dump", "guaranteed profit", "no risk"])
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let m = matcher();
        assert_eq!(m.find("Join our ICO today"), vec!["ICO"]);
        assert_eq!(m.find("join our ico today"), vec!["ICO"]);
        assert_eq!(m.find("GUARANTEED PROFIT"), vec!["guaranteed profit"]);
    }

    #[test]
    fn test_match_is_substring_based() {
        // "ico" inside "bicolor" still counts, as plain substring matching does.
        assert_eq!(matcher().find("a bicolor flag"), vec!["ICO"]);
    }

    #[test]
    fn test_multiple_keywords_in_list_order() {
        let found = matcher().find("No risk at all! Classic pump and dump via ICO.");
        assert_eq!(found, vec!["ICO", "pump and dump", "no risk"]);
    }

    #[test]
    fn test_no_match_returns_empty() {
        assert!(matcher().find("Let's meet for coffee tomorrow.").is_empty());
    }

    #[test]
    fn test_duplicate_keywords_collapse() {
        let m = KeywordMatcher::new(["urgent", "URGENT", "act now"]);
        assert_eq!(m.keywords(), ["urgent", "act now"]);
        assert_eq!(m.find("URGENT: act now"), vec!["urgent", "act now"]);
    }

    #[test]
    fn test_found_keywords_are_subset_of_list() {
        let m = matcher();
        for kw in m.find("ico pump and dump guaranteed profit no risk") {
            assert!(m.keywords().contains(&kw));
        }
    }

    #[test]
    fn test_extracts_in_order_of_appearance() {
        let ex = MonetaryExtractor::new().unwrap();
        assert_eq!(ex.extract("$100 and 50 USD"), vec!["$100", "50 USD"]);
        assert_eq!(ex.extract("50 USD and $100"), vec!["50 USD", "$100"]);
    }

    #[test]
    fn test_extracts_rupee_forms() {
        let ex = MonetaryExtractor::new().unwrap();
        assert_eq!(ex.extract("pay ₹2500 now, or 3000 INR later"), vec!["₹2500", "3000 INR"]);
    }

    #[test]
    fn test_duplicates_are_retained() {
        let ex = MonetaryExtractor::new().unwrap();
        assert_eq!(ex.extract("$5, then $5 again"), vec!["$5", "$5"]);
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let ex = MonetaryExtractor::new().unwrap();
        let text = "send $500 today, earn 900 USD";
        assert_eq!(ex.extract(text), ex.extract(text));
    }

    #[test]
    fn test_non_matching_amounts_ignored() {
        let ex = MonetaryExtractor::new().unwrap();
        assert!(ex.extract("$ 100, USD100, 100USD, 100 usd").is_empty());
    }
}
