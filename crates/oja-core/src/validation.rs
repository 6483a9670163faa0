//! Input normalisation for account and payout fields.

use std::sync::LazyLock;

use regex::Regex;

use crate::CoreError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(\.[a-z0-9\-]+)*\.[a-z]{2,}$").expect("valid regex")
});

// Nigerian mobile numbers: 0 or 234 prefix, then a 7/8/9 network digit, 0/1 and 8 more digits.
static NG_PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+?234|0)([789][01]\d{8})$").expect("valid regex"));

static NUBAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{10}$").expect("valid regex"));

/// Trim and lowercase an email address, rejecting anything that does not look like one.
///
/// # Errors
///
/// Returns [`CoreError::Invalid`] when the address is malformed.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();
    if email.len() > 254 || !EMAIL_RE.is_match(&email) {
        return Err(CoreError::Invalid {
            field: "email",
            reason: format!("'{}' is not a valid email address", raw.trim()),
        });
    }
    Ok(email)
}

/// Normalise a Nigerian mobile number to `+234XXXXXXXXXX`.
///
/// Spaces and dashes are ignored.
///
/// # Errors
///
/// Returns [`CoreError::Invalid`] when the number is not a Nigerian mobile number.
pub fn normalize_ng_phone(raw: &str) -> Result<String, CoreError> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    NG_PHONE_RE
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("+234{}", m.as_str()))
        .ok_or_else(|| CoreError::Invalid {
            field: "phone",
            reason: format!("'{}' is not a Nigerian mobile number", raw.trim()),
        })
}

/// Passwords must be 8–128 characters and contain at least one letter and one digit.
///
/// # Errors
///
/// Returns [`CoreError::Invalid`] describing the first rule that failed.
pub fn validate_password(password: &str) -> Result<(), CoreError> {
    let len = password.chars().count();
    let fail = |reason: &str| {
        Err(CoreError::Invalid {
            field: "password",
            reason: reason.to_string(),
        })
    };
    if len < 8 {
        return fail("must be at least 8 characters");
    }
    if len > 128 {
        return fail("must be at most 128 characters");
    }
    if !password.chars().any(char::is_alphabetic) {
        return fail("must contain a letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return fail("must contain a digit");
    }
    Ok(())
}

/// Nigerian bank account numbers (NUBAN) are exactly ten digits.
///
/// # Errors
///
/// Returns [`CoreError::Invalid`] for anything else.
pub fn validate_account_number(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    if NUBAN_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(CoreError::Invalid {
            field: "account_number",
            reason: "must be a 10-digit NUBAN account number".to_string(),
        })
    }
}
