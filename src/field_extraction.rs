//! # Field Extraction Module
//!
//! This module turns recognized receipt text into a [`FieldSet`] using ordered
//! pattern cascades.
//!
//! ## Features
//!
//! - Static (field, pattern) rule table evaluated top to bottom, first match wins
//! - Arabic and English label markers (`كود:`, `هاتف:`, `price:` ...)
//! - Company name from the heading line, a company marker word, or a `company:` token
//! - Phone fallback scanning for a bare national mobile number
//! - Province fallback scanning for canonical names, then known cities
//! - Inline `{...}` key-value fragments overriding pattern matches
//!
//! Price is only taken from a labeled match. Unlabeled numbers are never
//! guessed as prices since they are usually codes or phone numbers.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, trace};

use crate::errors::{AppError, AppResult};
use crate::field_set::{Field, FieldSet};
use crate::normalization::{
    find_canonical_province, find_city_province, fold_digits, normalize_phone,
    normalize_price_with_rate, normalize_province, DEFAULT_USD_EXCHANGE_RATE,
};

/// Shape of the value captured after a label
#[derive(Debug, Clone, Copy, PartialEq)]
enum Capture {
    /// The rest of the line
    Line,
    /// A single alphanumeric token
    Token,
    /// A run of digits with phone punctuation
    Phone,
    /// The first amount with an optional unit word, else the rest of the line
    Amount,
}

impl Capture {
    fn pattern(&self) -> &'static str {
        match self {
            Capture::Line => r"([^\s:：=\-–][^\n]*)",
            Capture::Token => r"([A-Za-z0-9][A-Za-z0-9\-/]*)",
            Capture::Phone => r"([+(]?\d[\d \t\-().]{6,}\d)",
            Capture::Amount => {
                r"([$€£]?[ \t]*\d[\d,.]*(?:[ \t]*[^\s\d,.]+)?|[^\s\d:：=\-–][^\n]*)"
            }
        }
    }
}

/// Separator allowed between a label and its value
const LABEL_SEPARATOR: &str = r"[ \t]*[:：=\-–]?[ \t]*";

/// Ordered extraction rules. Order is observable behavior.
const FIELD_RULES: &[(Field, &str, Capture)] = &[
    (
        Field::Code,
        r"رقم[ \t]+(?:الوصل|الشحنة|التتبع|الطلب|الوصولات)",
        Capture::Token,
    ),
    (Field::Code, r"(?:الكود|كود)", Capture::Token),
    (
        Field::Code,
        r"\b(?:tracking(?:[ \t]+(?:number|no\.?|code))?|code|awb|order[ \t]+(?:no\.?|number))#?",
        Capture::Token,
    ),
    (
        Field::SenderName,
        r"اسم[ \t]+(?:المرسل|الزبون|العميل)",
        Capture::Line,
    ),
    (
        Field::SenderName,
        r"(?m)^[ \t]*(?:المرسل|الزبون|العميل)[ \t]*[:：]",
        Capture::Line,
    ),
    (
        Field::SenderName,
        r"\b(?:sender|customer)(?:[ \t]+name)?[ \t]*[:：\-]",
        Capture::Line,
    ),
    (
        Field::SenderName,
        r"(?m)^[ \t]*(?:الاسم|name)[ \t]*[:：]",
        Capture::Line,
    ),
    (
        Field::PhoneNumber,
        r"(?:رقم[ \t]+(?:الهاتف|الموبايل|الجوال|المرسل)|هاتف(?:[ \t]+المرسل)?|الهاتف|الموبايل|موبايل|جوال|تلفون|تليفون)",
        Capture::Phone,
    ),
    (
        Field::PhoneNumber,
        r"\b(?:phone(?:[ \t]+number)?|mobile|tel|cell)\b\.?",
        Capture::Phone,
    ),
    (Field::Province, r"(?:المحافظة|محافظة)", Capture::Line),
    (
        Field::Province,
        r"\b(?:province|governorate)\b",
        Capture::Line,
    ),
    (Field::Province, r"(?:المدينة|مدينة)", Capture::Line),
    (Field::Province, r"\bcity\b", Capture::Line),
    (
        Field::Price,
        r"(?:السعر|سعر|المبلغ|مبلغ|الكلفة|كلفة|المجموع|الإجمالي|الاجمالي)",
        Capture::Amount,
    ),
    (
        Field::Price,
        r"\b(?:price|amount|total|cost)\b",
        Capture::Amount,
    ),
];

lazy_static! {
    static ref COMPILED_RULES: Vec<(Field, Regex)> = FIELD_RULES
        .iter()
        .map(|(field, label, capture)| {
            let pattern = format!(r"(?i){}{}{}", label, LABEL_SEPARATOR, capture.pattern());
            (
                *field,
                Regex::new(&pattern).expect("Field rule pattern should be valid"),
            )
        })
        .collect();

    static ref COMPANY_MARKER: Regex = Regex::new(
        r"(?i)(?:شركة|مؤسسة|مجموعة|مكتب|\bcompany\b|\bfirm\b|\bgroup\b|\boffice\b)[ \t]+([^\n:：]+)"
    )
    .expect("Company marker pattern should be valid");

    static ref COMPANY_TOKEN: Regex = Regex::new(
        r"(?i)(?:اسم[ \t]+الشركة|الشركة|\bcompany)[ \t]*[:：][ \t]*([^\n]+)"
    )
    .expect("Company token pattern should be valid");

    static ref BARE_MOBILE: Regex = Regex::new(r"(?:\+?\b964|\b0|\b)7\d{9}\b")
        .expect("Bare mobile pattern should be valid");

    static ref INLINE_FRAGMENT: Regex = Regex::new(r"\{[^{}]*\}")
        .expect("Inline fragment pattern should be valid");

    static ref LOOSE_PAIR: Regex = Regex::new(
        r#"["']?([A-Za-z_]+)["']?[ \t]*[:=][ \t]*["']?([^"',;}]*)["']?"#
    )
    .expect("Loose pair pattern should be valid");
}

/// Configuration options for field extraction
#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    /// Dinars per dollar for decimal prices below 100
    pub usd_exchange_rate: f64,
    /// Whether to scan unlabeled text for a mobile number
    pub enable_phone_fallback: bool,
    /// Whether to scan unlabeled text for province and city names
    pub enable_province_fallback: bool,
    /// Whether embedded `{...}` fragments are honored
    pub enable_inline_fragments: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            usd_exchange_rate: DEFAULT_USD_EXCHANGE_RATE,
            enable_phone_fallback: true,
            enable_province_fallback: true,
            enable_inline_fragments: true,
        }
    }
}

impl ExtractionConfig {
    /// Validate extraction configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if !self.usd_exchange_rate.is_finite() || self.usd_exchange_rate <= 0.0 {
            return Err(AppError::Config(format!(
                "usd_exchange_rate must be a positive number, got {}",
                self.usd_exchange_rate
            )));
        }
        Ok(())
    }
}

/// Pattern-cascade extractor for receipt fields
pub struct FieldExtractor {
    config: ExtractionConfig,
}

impl FieldExtractor {
    /// Create a new extractor with the default configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use receipt_intake::field_extraction::FieldExtractor;
    ///
    /// let extractor = FieldExtractor::new();
    /// let fields = extractor.extract("كود: 123456\nسعر: 5");
    /// assert_eq!(fields.code, "123456");
    /// assert_eq!(fields.price, "5000");
    /// ```
    pub fn new() -> Self {
        Self::with_config(ExtractionConfig::default())
    }

    /// Create an extractor with custom configuration
    pub fn with_config(config: ExtractionConfig) -> Self {
        info!(
            rules = COMPILED_RULES.len(),
            usd_exchange_rate = config.usd_exchange_rate,
            "Creating FieldExtractor"
        );
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract fields from recognized text
    pub fn extract(&self, text: &str) -> FieldSet {
        self.extract_with_fragment(text, None)
    }

    /// Extract fields, letting a pre-parsed fragment override pattern matches
    ///
    /// Fragment keys outside the six field names are ignored.
    pub fn extract_with_fragment(
        &self,
        text: &str,
        fragment: Option<&HashMap<String, String>>,
    ) -> FieldSet {
        let folded = fold_digits(text);

        let (body, embedded) = if self.config.enable_inline_fragments {
            split_inline_fragment(&folded)
        } else {
            (folded.clone(), None)
        };

        let mut fields = FieldSet::default();
        fields.company_name = extract_company_name(&body).unwrap_or_default();

        for field in [
            Field::Code,
            Field::SenderName,
            Field::PhoneNumber,
            Field::Province,
            Field::Price,
        ] {
            if let Some(value) = first_rule_match(field, &body) {
                let normalized = self.normalize_field(field, &value);
                debug!(field = %field, raw = %value, normalized = %normalized, "Labeled match");
                fields.set(field, normalized);
            }
        }

        if fields.phone_number.is_empty() && self.config.enable_phone_fallback {
            if let Some(found) = BARE_MOBILE.find(&body) {
                debug!(raw = %found.as_str(), "Phone taken from unlabeled text");
                fields.phone_number = normalize_phone(found.as_str());
            }
        }

        if fields.province.is_empty() && self.config.enable_province_fallback {
            if let Some(province) =
                find_canonical_province(&body).or_else(|| find_city_province(&body))
            {
                debug!(province = %province, "Province taken from unlabeled text");
                fields.province = province.to_string();
            }
        }

        if let Some(embedded) = embedded {
            self.apply_fragment(&mut fields, &embedded);
        }
        if let Some(fragment) = fragment {
            self.apply_fragment(&mut fields, fragment);
        }

        trace!(populated = fields.populated_count(), "Extraction finished");
        fields
    }

    fn normalize_field(&self, field: Field, value: &str) -> String {
        let value = value.trim();
        match field {
            Field::PhoneNumber => normalize_phone(value),
            Field::Province => normalize_province(value),
            Field::Price => normalize_price_with_rate(value, self.config.usd_exchange_rate),
            _ => value.to_string(),
        }
    }

    /// Keys are applied in sorted order so spelling variants resolve the same way every run
    fn apply_fragment(&self, fields: &mut FieldSet, fragment: &HashMap<String, String>) {
        let mut entries: Vec<(&String, &String)> = fragment.iter().collect();
        entries.sort();
        for (key, value) in entries {
            let Some(field) = Field::from_key(key) else {
                trace!(key = %key, "Ignoring unrecognized fragment key");
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            let normalized = self.normalize_field(field, value);
            debug!(field = %field, value = %normalized, "Fragment override");
            fields.set(field, normalized);
        }
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// First trimmed capture among the rules for `field`, in table order
fn first_rule_match(field: Field, text: &str) -> Option<String> {
    COMPILED_RULES
        .iter()
        .filter(|(rule_field, _)| *rule_field == field)
        .find_map(|(_, pattern)| {
            pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|value| value.chars().any(char::is_alphanumeric))
        })
}

/// Company name: heading line, then marker word, then `company:` token
fn extract_company_name(text: &str) -> Option<String> {
    let heading = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| is_heading_line(line));
    if let Some(line) = heading {
        return Some(line.to_string());
    }

    [&*COMPANY_MARKER, &*COMPANY_TOKEN].iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// A heading carries no label separator and at least two letters
fn is_heading_line(line: &str) -> bool {
    !line.contains(':')
        && !line.contains('：')
        && line.chars().filter(|c| c.is_alphabetic()).count() >= 2
}

/// Remove the first inline `{...}` fragment from `text` and parse it
///
/// The fragment is read as a JSON object when possible, otherwise as loose
/// `key: value` pairs separated by commas or semicolons. Text without a
/// parseable fragment is returned unchanged.
pub fn split_inline_fragment(text: &str) -> (String, Option<HashMap<String, String>>) {
    let Some(found) = INLINE_FRAGMENT.find(text) else {
        return (text.to_string(), None);
    };

    let Some(parsed) = parse_fragment(found.as_str()) else {
        return (text.to_string(), None);
    };

    let mut body = String::with_capacity(text.len());
    body.push_str(&text[..found.start()]);
    body.push_str(&text[found.end()..]);
    (body, Some(parsed))
}

fn parse_fragment(raw: &str) -> Option<HashMap<String, String>> {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(raw) {
        let parsed: HashMap<String, String> = map
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::String(s) => Some((key, s)),
                serde_json::Value::Number(n) => Some((key, n.to_string())),
                _ => None,
            })
            .collect();
        return Some(parsed);
    }

    let inner = raw.trim_start_matches('{').trim_end_matches('}');
    let parsed: HashMap<String, String> = LOOSE_PAIR
        .captures_iter(inner)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_string();
            let value = caps.get(2)?.as_str().trim().to_string();
            Field::from_key(&key).map(|_| (key, value))
        })
        .collect();

    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}
