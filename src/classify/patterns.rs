//! Regex-based column classification.
//!
//! Each sampled value runs through a priority-ordered chain of heuristics:
//! email, then a capitalized-Cyrillic-name pattern, then a phone-number
//! shape check with normalization. A value is credited to the first matching
//! heuristic only. A column gets a label when that label's hit count
//! strictly exceeds the configured threshold.

use regex::Regex;
use std::sync::LazyLock;

use super::ColumnLabel;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]+[._-])*[A-Za-z0-9]+@[A-Za-z0-9-]+(\.[A-Za-z]{2,})+").unwrap()
});

static FULL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[А-ЯЁ][а-яё]+\s[А-ЯЁ][а-яё]+\b").unwrap());

static PHONE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?\d{1,3}[\s\-]?\(?\d{1,5}\)?[\s\-]?\d{1,4}[\s\-]?\d{1,4}[\s\-]?\d{1,4}")
        .unwrap()
});

/// Strip every character that is not alphanumeric.
pub fn normalize_phone(value: &str) -> String {
    value.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Whether a value looks like a phone number: shape match, then a
/// country-specific length/prefix check on the normalized digits.
pub fn is_phone(value: &str) -> bool {
    if !PHONE_SHAPE.is_match(value) {
        return false;
    }
    let normalized = normalize_phone(value);
    normalized.len() == 11 && (normalized.starts_with('7') || normalized.starts_with('8'))
}

/// Priority-ordered, threshold-voting column classifier.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    threshold: usize,
}

impl PatternClassifier {
    /// Create a classifier that labels a column only when a label's hit
    /// count strictly exceeds `threshold`.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Label a single value by the first matching heuristic, if any.
    pub fn classify_value(&self, value: &str) -> Option<ColumnLabel> {
        if EMAIL.is_match(value) {
            Some(ColumnLabel::Email)
        } else if FULL_NAME.is_match(value) {
            Some(ColumnLabel::FullName)
        } else if is_phone(value) {
            Some(ColumnLabel::Phone)
        } else {
            None
        }
    }

    /// Label a column from a sample of its values.
    ///
    /// Tallies per-label hits across the sample and returns the
    /// highest-priority label whose count clears the threshold, or `None`.
    pub fn classify<'a, I>(&self, sample: I) -> Option<ColumnLabel>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut emails = 0usize;
        let mut names = 0usize;
        let mut phones = 0usize;

        for value in sample {
            match self.classify_value(value) {
                Some(ColumnLabel::Email) => emails += 1,
                Some(ColumnLabel::FullName) => names += 1,
                Some(ColumnLabel::Phone) => phones += 1,
                None => {}
            }
        }

        if emails > self.threshold {
            Some(ColumnLabel::Email)
        } else if names > self.threshold {
            Some(ColumnLabel::FullName)
        } else if phones > self.threshold {
            Some(ColumnLabel::Phone)
        } else {
            None
        }
    }
}
