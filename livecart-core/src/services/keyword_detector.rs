//! Purchase-intent extraction from comment text.
//!
//! Pure and stateless: the same text always yields the same matches.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// The trigger word viewers type in front of a product code.
pub const BUY_KEYWORD: &str = "BUY";

// Product codes are ASCII only. Under `(?i)` a Unicode class would also
// accept letters that fold onto ASCII, like U+017F and U+212A.

static BUY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bBUY\s+((?-u:[A-Z0-9])+)\b").expect("static keyword pattern")
});

/// One purchase-intent token found in a comment. Not persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordMatch {
    pub keyword: String,
    /// Uppercase-normalized product code.
    pub product_code: String,
    /// Byte offset of the match within the comment text.
    pub position: usize,
    pub matched_text: String,
}

/// Returns every non-overlapping `BUY <code>` occurrence in `text`, in
/// order of appearance.
pub fn detect_keywords(text: &str) -> Vec<KeywordMatch> {
    BUY_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let code = caps.get(1)?;
            Some(KeywordMatch {
                keyword: BUY_KEYWORD.to_string(),
                product_code: code.as_str().to_uppercase(),
                position: whole.start(),
                matched_text: whole.as_str().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(text: &str) -> Vec<String> {
        detect_keywords(text).into_iter().map(|m| m.product_code).collect()
    }

    #[test]
    fn finds_code_inside_sentence() {
        let matches = detect_keywords("I want this BUY SAR001 now");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].keyword, "BUY");
        assert_eq!(matches[0].product_code, "SAR001");
        assert_eq!(matches[0].position, 12);
        assert_eq!(matches[0].matched_text, "BUY SAR001");
    }

    #[test]
    fn lowercase_is_normalized() {
        assert_eq!(codes("buy sar002 please"), vec!["SAR002"]);
    }

    #[test]
    fn every_letter_case_yields_uppercase_code() {
        for trigger in ["BUY", "buy", "Buy", "bUy", "buY"] {
            for code in ["sar001", "SAR001", "Sar001", "a1", "999"] {
                let text = format!("{} {}", trigger, code);
                assert_eq!(codes(&text), vec![code.to_uppercase()], "text: {}", text);
            }
        }
    }

    #[test]
    fn multiple_occurrences_all_returned_in_order() {
        let matches = detect_keywords("BUY SAR001 and also buy sar002, BUY  X9");
        let got: Vec<_> = matches.iter().map(|m| m.product_code.as_str()).collect();
        assert_eq!(got, vec!["SAR001", "SAR002", "X9"]);
        assert!(matches.windows(2).all(|w| w[0].position < w[1].position));
    }

    #[test]
    fn no_trigger_word_means_no_matches() {
        for text in ["", "hello", "what a lovely saree", "SAR001", "buying SAR001", "BUYSAR001", "BUY"] {
            assert!(detect_keywords(text).is_empty(), "text: {:?}", text);
        }
    }

    #[test]
    fn codes_are_ascii_even_when_case_folding() {
        // U+017F folds to 's' and U+212A folds to 'k' under Unicode rules.
        assert!(detect_keywords("buy \u{17F}ar001").is_empty());
        assert!(detect_keywords("BUY \u{212A}9").is_empty());
        assert!(detect_keywords("buy SAR\u{212A}1").is_empty());
        assert_eq!(codes("buy sar001 buy \u{17F}ar002"), vec!["SAR001"]);
    }

    #[test]
    fn trigger_must_start_on_word_boundary() {
        assert!(detect_keywords("rebuy SAR001").is_empty());
        assert_eq!(codes("(buy SAR003)"), vec!["SAR003"]);
    }

    #[test]
    fn detection_is_deterministic() {
        let text = "buy A1 BUY b2 nothing buy C3";
        let first = detect_keywords(text);
        for _ in 0..10 {
            assert_eq!(detect_keywords(text), first);
        }
    }
}
