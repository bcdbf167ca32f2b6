//! # Field Normalization Module
//!
//! Stateless formatting for the structured receipt fields:
//!
//! - Price: free/delivered keywords, currency stripping, the thousands convention
//!   and foreign-currency conversion
//! - Phone: country code folding and the 11-digit national form
//! - Province: misspellings, synonyms and city names mapped onto the canonical list
//!
//! Normalizers never fail. A value that cannot reach canonical form is returned
//! as given.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::trace;

/// Approximate Iraqi dinars per US dollar, used for small decimal prices
pub const DEFAULT_USD_EXCHANGE_RATE: f64 = 1500.0;

/// Iraqi country calling code
const COUNTRY_CODE: &str = "964";

/// Length of a national mobile number including the leading zero
const NATIONAL_PHONE_LENGTH: usize = 11;

/// Values meaning "nothing to collect"
pub const FREE_PRICE_KEYWORDS: &[&str] = &[
    "free",
    "delivered",
    "paid",
    "zero",
    "none",
    "gratis",
    "مجاني",
    "مجانا",
    "مجاناً",
    "مجانى",
    "واصل",
    "واصلة",
    "مدفوع",
    "مدفوعة",
    "صفر",
    "بلاش",
    "رايگان",
];

/// Canonical provinces, in the order used for full-text scanning
pub const CANONICAL_PROVINCES: &[&str] = &[
    "بغداد",
    "البصرة",
    "الموصل",
    "أربيل",
    "النجف",
    "كربلاء",
    "السليمانية",
    "كركوك",
    "الأنبار",
    "ديالى",
    "بابل",
    "ذي قار",
    "واسط",
    "ميسان",
    "المثنى",
    "القادسية",
    "صلاح الدين",
    "دهوك",
    "حلبجة",
];

/// Spelling variants and English names for each canonical province
const PROVINCE_ALIASES: &[(&str, &[&str])] = &[
    ("بغداد", &["بقداد", "بغدد", "baghdad", "bagdad"]),
    ("البصرة", &["بصرة", "بصره", "basra", "basrah"]),
    ("الموصل", &["موصل", "نينوى", "نينوي", "mosul", "nineveh", "ninawa"]),
    ("أربيل", &["هولير", "erbil", "arbil", "irbil", "hawler"]),
    ("النجف", &["نجف", "النجف الأشرف", "najaf"]),
    ("كربلاء", &["كربلا", "كربلاء المقدسة", "karbala", "kerbala"]),
    ("السليمانية", &["سليمانية", "سليماني", "sulaymaniyah", "sulaimani", "slemani"]),
    ("كركوك", &["kirkuk", "kerkuk"]),
    ("الأنبار", &["انبار", "anbar"]),
    ("ديالى", &["diyala"]),
    ("بابل", &["babil", "babylon"]),
    ("ذي قار", &["ذيقار", "ذى قار", "dhi qar", "thi qar"]),
    ("واسط", &["wasit", "wasset"]),
    ("ميسان", &["maysan", "missan"]),
    ("المثنى", &["مثنى", "muthanna"]),
    ("القادسية", &["قادسية", "qadisiyah", "diwaniyah"]),
    ("صلاح الدين", &["صلاح دين", "salahuddin", "salah al-din", "salah ad din"]),
    ("دهوك", &["duhok", "dohuk", "dahuk"]),
    ("حلبجة", &["halabja"]),
];

/// Cities mapped to their parent province
pub const CITY_PROVINCES: &[(&str, &str)] = &[
    ("الكاظمية", "بغداد"),
    ("الأعظمية", "بغداد"),
    ("الكرادة", "بغداد"),
    ("أبو غريب", "بغداد"),
    ("الزبير", "البصرة"),
    ("أبو الخصيب", "البصرة"),
    ("القرنة", "البصرة"),
    ("تلعفر", "الموصل"),
    ("سنجار", "الموصل"),
    ("الكوفة", "النجف"),
    ("الرمادي", "الأنبار"),
    ("الفلوجة", "الأنبار"),
    ("هيت", "الأنبار"),
    ("بعقوبة", "ديالى"),
    ("الحلة", "بابل"),
    ("المسيب", "بابل"),
    ("الناصرية", "ذي قار"),
    ("الشطرة", "ذي قار"),
    ("الكوت", "واسط"),
    ("العمارة", "ميسان"),
    ("السماوة", "المثنى"),
    ("الديوانية", "القادسية"),
    ("تكريت", "صلاح الدين"),
    ("سامراء", "صلاح الدين"),
    ("بيجي", "صلاح الدين"),
    ("زاخو", "دهوك"),
];

lazy_static! {
    static ref CURRENCY_PATTERN: Regex = Regex::new(
        r"(?i)د\s*\.?\s*ع\.?|دينار|دنانير|دولار|ألف|الف|iqd|usd|us\$|\$|﷼|\bk\b"
    )
    .expect("Currency pattern should be valid");

    /// Accepted surface forms: plain, spaced, dashed, parenthesized, dotted
    static ref PHONE_PATTERNS: Vec<Regex> = [
        r"^(?:\+?964|0)?7\d{9}$",
        r"^(?:\+?964 ?|0)?7\d{2} \d{3} \d{4}$",
        r"^(?:\+?964-?|0)?7\d{2}-\d{3}-\d{4}$",
        r"^\((?:\+?964|0)?7\d{2}\) ?\d{3}[ -]?\d{4}$",
        r"^(?:\+?964\.?|0)?7\d{2}\.\d{3}\.\d{4}$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Phone pattern should be valid"))
    .collect();

    /// Folded spelling -> canonical province
    static ref PROVINCE_LOOKUP: HashMap<String, &'static str> = {
        let mut lookup = HashMap::new();
        for (canonical, aliases) in PROVINCE_ALIASES {
            lookup.insert(province_key(canonical), *canonical);
            for alias in aliases.iter() {
                lookup.insert(province_key(alias), *canonical);
            }
        }
        for (city, province) in CITY_PROVINCES {
            lookup.entry(province_key(city)).or_insert(*province);
        }
        lookup
    };
}

/// Fold Arabic-Indic and Eastern Arabic-Indic digits to ASCII
pub fn fold_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => {
                char::from_digit(c as u32 - 0x0660, 10).unwrap_or(c)
            }
            '\u{06F0}'..='\u{06F9}' => {
                char::from_digit(c as u32 - 0x06F0, 10).unwrap_or(c)
            }
            '\u{066B}' => '.',
            _ => c,
        })
        .collect()
}

fn is_free_price(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    FREE_PRICE_KEYWORDS.iter().any(|keyword| {
        lowered == *keyword || lowered.split_whitespace().any(|token| token == *keyword)
    })
}

/// Normalize a price using the default exchange rate
pub fn normalize_price(raw: &str) -> String {
    normalize_price_with_rate(raw, DEFAULT_USD_EXCHANGE_RATE)
}

/// Normalize a price to a whole number of dinars
///
/// Small integers (1-999) denote thousands. Decimals below 100 are treated as
/// dollar amounts and converted with `usd_exchange_rate`.
pub fn normalize_price_with_rate(raw: &str, usd_exchange_rate: f64) -> String {
    if raw.trim().is_empty() || is_free_price(raw) {
        return "0".to_string();
    }

    let folded = fold_digits(raw).replace([',', '\u{066C}', '\u{060C}'], "");
    let without_currency = CURRENCY_PATTERN.replace_all(&folded, " ");

    let mut cleaned = String::new();
    let mut seen_point = false;
    for c in without_currency.chars() {
        if c.is_ascii_digit() {
            cleaned.push(c);
        } else if c == '.' && !seen_point {
            seen_point = true;
            cleaned.push(c);
        }
    }
    let cleaned = cleaned.trim_end_matches('.').to_string();
    trace!(raw = %raw, cleaned = %cleaned, "Cleaned price value");

    if cleaned.is_empty() || cleaned == "." {
        return "0".to_string();
    }

    if cleaned.contains('.') {
        if let Ok(amount) = cleaned.parse::<f64>() {
            if amount > 0.0 && amount < 100.0 {
                let converted = (amount * usd_exchange_rate).round();
                return format!("{}", converted as u64);
            }
        }
        return cleaned;
    }

    match cleaned.parse::<u64>() {
        Ok(amount) if (1..=999).contains(&amount) => (amount * 1000).to_string(),
        Ok(amount) => amount.to_string(),
        Err(_) => cleaned,
    }
}

/// Normalize a phone number to the 11-digit national form
///
/// Returns `raw` unchanged when the digits cannot be brought to 11.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = fold_digits(raw)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    let international = digits.strip_prefix("00").unwrap_or(&digits);
    let mut candidate = match international.strip_prefix(COUNTRY_CODE) {
        Some(national) => format!("0{}", national.trim_start_matches('0')),
        None => digits.clone(),
    };

    if candidate.len() == NATIONAL_PHONE_LENGTH - 1 && !candidate.starts_with('0') {
        candidate.insert(0, '0');
    }

    if candidate.len() == NATIONAL_PHONE_LENGTH {
        candidate
    } else {
        trace!(raw = %raw, "Phone number left unnormalized");
        raw.to_string()
    }
}

/// Check a phone number against the accepted surface forms
pub fn validate_phone(value: &str) -> bool {
    let folded = fold_digits(value.trim());
    let digit_count = folded.chars().filter(|c| c.is_ascii_digit()).count();
    if digit_count != 10 && digit_count != 11 {
        return false;
    }
    PHONE_PATTERNS.iter().any(|pattern| pattern.is_match(&folded))
}

/// Lookup key tolerant of alef, taa marbuta and yaa spelling variants
fn province_key(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'أ' | 'إ' | 'آ' => 'ا',
            'ة' => 'ه',
            'ى' => 'ي',
            _ => c,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map a province spelling onto the canonical list
pub fn normalize_province(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c == '،' || c == '.');
    let stripped = trimmed
        .strip_prefix("محافظة")
        .map(str::trim)
        .unwrap_or(trimmed);

    match PROVINCE_LOOKUP.get(&province_key(stripped)) {
        Some(canonical) => canonical.to_string(),
        None => raw.to_string(),
    }
}

/// First canonical province name that appears verbatim in `text`
pub fn find_canonical_province(text: &str) -> Option<&'static str> {
    CANONICAL_PROVINCES
        .iter()
        .find(|province| text.contains(*province))
        .copied()
}

/// Parent province of the first known city named in `text`
pub fn find_city_province(text: &str) -> Option<&'static str> {
    CITY_PROVINCES
        .iter()
        .find(|(city, _)| text.contains(*city))
        .map(|(_, province)| *province)
}
