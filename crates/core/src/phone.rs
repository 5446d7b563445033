//! Phone Number Normalization
//!
//! Numbers arrive from CRM records in free-form (`(555) 010-2000`, `+1 555...`).
//! Dialing uses two forms:
//!
//! - the cloud form: digits only, country code preserved
//! - the device form: digits only, with the domestic `1` prefix removed from
//!   11-digit numbers before building a `tel:` link

/// Domestic country-code digit stripped from 11-digit numbers for `tel:` links.
pub const DOMESTIC_COUNTRY_CODE: char = '1';

/// Strip every non-digit character.
pub fn clean_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Number as sent to the cloud dialer: all digits, country code kept.
pub fn cloud_number(raw: &str) -> String {
    clean_number(raw)
}

/// Number as handed to the native dialer.
pub fn device_number(raw: &str) -> String {
    let digits = clean_number(raw);
    if digits.len() == 11 && digits.starts_with(DOMESTIC_COUNTRY_CODE) {
        digits[1..].to_string()
    } else {
        digits
    }
}

/// Build the `tel:` URI for the native dialer.
pub fn tel_uri(raw: &str) -> String {
    format!("tel:{}", device_number(raw))
}

/// Whether the input contains anything dialable.
pub fn is_dialable(raw: &str) -> bool {
    raw.chars().any(|c| c.is_ascii_digit())
}
