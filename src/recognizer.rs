//! # Answer Recognition Module
//!
//! Small matching seams used by prompts: a yes/no recognizer for confirm
//! prompts and a key matcher for choice prompts. Both are traits so richer
//! matching stays a local change.

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

/// Interprets a reply as affirmative or negative
pub trait ConfirmRecognizer: Send + Sync {
    /// `Some(true)` for yes, `Some(false)` for no, `None` when unrecognized
    fn recognize(&self, input: &str) -> Option<bool>;
}

/// Decides whether a reply selects an option key
pub trait KeyMatcher: Send + Sync {
    fn matches(&self, input: &str, key: &str) -> bool;
}

lazy_static! {
    static ref AFFIRMATIVE: Regex =
        Regex::new(r"(?i)^\s*(?:y|yes|yep|yeah|sure|ok|okay|oui|o)\s*[.!]*\s*$")
            .expect("Affirmative pattern should be valid");
    static ref NEGATIVE: Regex = Regex::new(r"(?i)^\s*(?:n|no|nope|nah|non)\s*[.!]*\s*$")
        .expect("Negative pattern should be valid");
}

/// Default recognizer accepting common English and French yes/no answers
#[derive(Debug, Clone, Copy, Default)]
pub struct YesNoRecognizer;

impl ConfirmRecognizer for YesNoRecognizer {
    fn recognize(&self, input: &str) -> Option<bool> {
        let answer = if AFFIRMATIVE.is_match(input) {
            Some(true)
        } else if NEGATIVE.is_match(input) {
            Some(false)
        } else {
            None
        };
        trace!("Confirm answer {:?} recognized as {:?}", input, answer);
        answer
    }
}

/// Raw, case-sensitive key comparison
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactKeyMatcher;

impl KeyMatcher for ExactKeyMatcher {
    fn matches(&self, input: &str, key: &str) -> bool {
        input == key
    }
}

/// Trims surrounding whitespace and ignores ASCII case
#[derive(Debug, Clone, Copy, Default)]
pub struct RelaxedKeyMatcher;

impl KeyMatcher for RelaxedKeyMatcher {
    fn matches(&self, input: &str, key: &str) -> bool {
        input.trim().eq_ignore_ascii_case(key)
    }
}
