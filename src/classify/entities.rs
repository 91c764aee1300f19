//! Person-entity recognition for column relabeling.
//!
//! The recognizers stand in for external NLP models and are consumed as
//! black boxes behind the [`PersonRecognizer`] trait. Two script-specific
//! recognizers run independently over every sampled value; a single person
//! hit from either is enough to label the column "name"; there is no
//! threshold and no confidence.

use regex::Regex;
use std::sync::LazyLock;

/// A black-box detector for person-name entities in free text.
pub trait PersonRecognizer: Send + Sync {
    /// Whether the text contains a person-name entity.
    fn recognize(&self, text: &str) -> bool;

    /// Model identifier, for diagnostics.
    fn model(&self) -> &'static str;
}

static LATIN_PERSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+\s[A-Z][a-z]+\b").unwrap());

static CYRILLIC_PERSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[А-ЯЁ][а-яё]+\s[А-ЯЁ][а-яё]+\b").unwrap());

/// Latin-script person recognizer.
pub struct LatinNameRecognizer;

impl PersonRecognizer for LatinNameRecognizer {
    fn recognize(&self, text: &str) -> bool {
        LATIN_PERSON.is_match(text)
    }

    fn model(&self) -> &'static str {
        "latin-person"
    }
}

/// Cyrillic-script person recognizer.
pub struct CyrillicNameRecognizer;

impl PersonRecognizer for CyrillicNameRecognizer {
    fn recognize(&self, text: &str) -> bool {
        CYRILLIC_PERSON.is_match(text)
    }

    fn model(&self) -> &'static str {
        "cyrillic-person"
    }
}

/// Entity-based column classifier running multiple recognizers per value.
pub struct EntityClassifier {
    recognizers: Vec<Box<dyn PersonRecognizer>>,
}

impl Default for EntityClassifier {
    fn default() -> Self {
        Self::with_default_models()
    }
}

impl EntityClassifier {
    /// Build a classifier with the two built-in script models.
    pub fn with_default_models() -> Self {
        Self {
            recognizers: vec![Box::new(LatinNameRecognizer), Box::new(CyrillicNameRecognizer)],
        }
    }

    /// Build a classifier from caller-provided recognizers.
    pub fn new(recognizers: Vec<Box<dyn PersonRecognizer>>) -> Self {
        Self { recognizers }
    }

    /// Whether any sampled value contains a person entity under any model.
    pub fn is_name_column<'a, I>(&self, sample: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        sample
            .into_iter()
            .any(|value| self.recognizers.iter().any(|r| r.recognize(value)))
    }

    /// Positionally rename name columns: the first detected name column
    /// becomes `name`, subsequent ones `name_1`, `name_2`, ... in scan
    /// order. Other columns keep their original identifier.
    pub fn rename_name_columns(
        &self,
        header: &[String],
        column_samples: &[Vec<String>],
    ) -> Vec<String> {
        debug_assert_eq!(header.len(), column_samples.len());

        let mut name_columns = 0usize;
        header
            .iter()
            .zip(column_samples)
            .map(|(original, sample)| {
                if self.is_name_column(sample.iter().map(String::as_str)) {
                    let renamed = if name_columns == 0 {
                        "name".to_string()
                    } else {
                        format!("name_{name_columns}")
                    };
                    name_columns += 1;
                    renamed
                } else {
                    original.clone()
                }
            })
            .collect()
    }
}
