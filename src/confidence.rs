//! # Confidence Scoring Module
//!
//! Deterministic 0-100 estimate of how complete and well-formed a [`FieldSet`] is.
//! Scores are derived on demand and never persisted.

use crate::field_set::{Field, FieldSet};
use crate::normalization::validate_phone;

/// Weight of each field; the weights sum to 100
pub const FIELD_WEIGHTS: [(Field, f64); 6] = [
    (Field::Code, 20.0),
    (Field::SenderName, 15.0),
    (Field::PhoneNumber, 20.0),
    (Field::Province, 15.0),
    (Field::Price, 15.0),
    (Field::CompanyName, 15.0),
];

/// Share of the weight kept by a present but malformed structured field
const MALFORMED_STRUCTURED_FRACTION: f64 = 0.5;

/// Share of the weight kept by a present but too short free-text field
const MALFORMED_FREE_TEXT_FRACTION: f64 = 0.7;

/// Score a field set
///
/// # Examples
///
/// ```rust
/// use receipt_intake::confidence::score;
/// use receipt_intake::field_set::FieldSet;
///
/// assert_eq!(score(&FieldSet::default()), 0);
/// ```
pub fn score(fields: &FieldSet) -> u8 {
    let total: f64 = FIELD_WEIGHTS
        .iter()
        .map(|(field, weight)| field_score(*field, fields.get(*field), *weight))
        .sum();
    total.round().clamp(0.0, 100.0) as u8
}

fn field_score(field: Field, value: &str, weight: f64) -> f64 {
    if value.is_empty() {
        return 0.0;
    }
    if is_well_formed(field, value) {
        weight
    } else if field.is_free_text() {
        weight * MALFORMED_FREE_TEXT_FRACTION
    } else {
        weight * MALFORMED_STRUCTURED_FRACTION
    }
}

/// Field-specific well-formedness check
pub fn is_well_formed(field: Field, value: &str) -> bool {
    match field {
        Field::Code => value.chars().all(|c| c.is_ascii_digit()),
        Field::PhoneNumber => validate_phone(value),
        Field::Price => {
            let numeric: String = value
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            !numeric.is_empty() && numeric.parse::<f64>().is_ok()
        }
        Field::SenderName | Field::Province | Field::CompanyName => value.chars().count() > 2,
    }
}
