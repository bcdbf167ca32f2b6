//! # Receipt Field Set
//!
//! The six-field record produced for every receipt. Absent values are empty
//! strings, never omitted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six receipt fields, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Code,
    SenderName,
    PhoneNumber,
    Province,
    Price,
    CompanyName,
}

impl Field {
    /// All fields in canonical order
    pub const ALL: [Field; 6] = [
        Field::Code,
        Field::SenderName,
        Field::PhoneNumber,
        Field::Province,
        Field::Price,
        Field::CompanyName,
    ];

    /// The camelCase key used in serialized records
    pub fn key(&self) -> &'static str {
        match self {
            Field::Code => "code",
            Field::SenderName => "senderName",
            Field::PhoneNumber => "phoneNumber",
            Field::Province => "province",
            Field::Price => "price",
            Field::CompanyName => "companyName",
        }
    }

    /// Resolve a fragment key, accepting camelCase and snake_case spellings
    pub fn from_key(key: &str) -> Option<Field> {
        let folded: String = key
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match folded.as_str() {
            "code" => Some(Field::Code),
            "sendername" => Some(Field::SenderName),
            "phonenumber" => Some(Field::PhoneNumber),
            "province" => Some(Field::Province),
            "price" => Some(Field::Price),
            "companyname" => Some(Field::CompanyName),
            _ => None,
        }
    }

    /// Whether the field holds free text rather than a structured value
    pub fn is_free_text(&self) -> bool {
        matches!(
            self,
            Field::SenderName | Field::Province | Field::CompanyName
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Structured record extracted from a receipt
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSet {
    pub code: String,
    pub sender_name: String,
    pub phone_number: String,
    pub province: String,
    pub price: String,
    pub company_name: String,
}

impl FieldSet {
    /// Borrow the value of a field
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Code => &self.code,
            Field::SenderName => &self.sender_name,
            Field::PhoneNumber => &self.phone_number,
            Field::Province => &self.province,
            Field::Price => &self.price,
            Field::CompanyName => &self.company_name,
        }
    }

    /// Replace the value of a field
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match field {
            Field::Code => self.code = value,
            Field::SenderName => self.sender_name = value,
            Field::PhoneNumber => self.phone_number = value,
            Field::Province => self.province = value,
            Field::Price => self.price = value,
            Field::CompanyName => self.company_name = value,
        }
    }

    /// Iterate over (field, value) pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        Field::ALL.iter().map(move |field| (*field, self.get(*field)))
    }

    /// Fields whose value differs between `self` and `other`
    pub fn changed_fields(&self, other: &FieldSet) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| self.get(*field) != other.get(*field))
            .collect()
    }

    /// Number of non-empty fields
    pub fn populated_count(&self) -> usize {
        self.iter().filter(|(_, value)| !value.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_all_six_keys() {
        let fields = FieldSet {
            code: "123".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&fields).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 6);
        for field in Field::ALL {
            assert!(object.contains_key(field.key()), "missing {}", field);
        }
        assert_eq!(object["senderName"], "");
    }

    #[test]
    fn test_missing_keys_deserialize_as_empty() {
        let fields: FieldSet = serde_json::from_str(r#"{"code":"42"}"#).unwrap();
        assert_eq!(fields.code, "42");
        assert_eq!(fields.price, "");
    }

    #[test]
    fn test_from_key_accepts_both_spellings() {
        assert_eq!(Field::from_key("phoneNumber"), Some(Field::PhoneNumber));
        assert_eq!(Field::from_key("phone_number"), Some(Field::PhoneNumber));
        assert_eq!(Field::from_key("COMPANY_NAME"), Some(Field::CompanyName));
        assert_eq!(Field::from_key("address"), None);
    }

    #[test]
    fn test_changed_fields() {
        let before = FieldSet {
            code: "1".to_string(),
            price: "5000".to_string(),
            ..Default::default()
        };
        let mut after = before.clone();
        after.set(Field::Price, "6000");
        assert_eq!(before.changed_fields(&after), vec![Field::Price]);
        assert!(before.changed_fields(&before).is_empty());
    }
}
