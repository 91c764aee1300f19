//! Heuristic column classification.
//!
//! Two independent classifiers share this module:
//! - [`patterns::PatternClassifier`]: a priority-ordered regex chain with a
//!   per-column hit threshold (email > full name > phone).
//! - [`entities::EntityClassifier`]: person-entity recognition behind the
//!   [`entities::PersonRecognizer`] trait, where a single hit anywhere in the
//!   sample labels the column.
//!
//! Both are pure: they look only at sampled string values and never touch
//! the destination.

pub mod entities;
pub mod patterns;

pub use entities::{EntityClassifier, PersonRecognizer};
pub use patterns::PatternClassifier;

use std::collections::HashMap;

/// Semantic label assigned to a column by the pattern classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnLabel {
    Email,
    FullName,
    Phone,
}

impl ColumnLabel {
    /// Canonical destination column name for this label.
    pub fn canonical_name(self) -> &'static str {
        match self {
            ColumnLabel::Email => "email",
            ColumnLabel::FullName => "full_name",
            ColumnLabel::Phone => "phone_number",
        }
    }
}

/// Destination names for a source header, derived from per-column labels.
///
/// Labeled columns take the label's canonical name; repeated labels get
/// `_1`, `_2`, ... suffixes in scan order; unlabeled columns keep their
/// original identifier.
pub fn rename_columns(header: &[String], labels: &[Option<ColumnLabel>]) -> Vec<String> {
    debug_assert_eq!(header.len(), labels.len());

    let mut used: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .zip(labels)
        .map(|(original, label)| {
            let base = match label {
                Some(label) => label.canonical_name().to_string(),
                None => original.clone(),
            };
            let seen = used.entry(base.clone()).or_insert(0);
            let name = if *seen == 0 {
                base
            } else {
                format!("{base}_{seen}")
            };
            *seen += 1;
            name
        })
        .collect()
}

/// Positional names for a fixed-width destination: `col_1..col_N`.
pub fn positional_columns(width: usize) -> Vec<String> {
    (1..=width).map(|i| format!("col_{i}")).collect()
}
