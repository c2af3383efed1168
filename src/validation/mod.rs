use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::BankDetails;

pub const ASSET_ADDRESS_PREFIX: &str = "lsk";
pub const ASSET_ADDRESS_BODY_LEN: usize = 38;
pub const ACCOUNT_NUMBER_LEN: usize = 10;
pub const BANK_FIELD_MAX_LEN: usize = 100;
pub const BANK_CODE_MAX_LEN: usize = 32;
pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 255;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_SPECIALS: &str = "@$!%*?&";
pub const NOTE_MAX_LEN: usize = 500;
pub const AMOUNT_INPUT_MAX_LEN: usize = 64;
pub const TRANSACTION_TYPES: &[&str] = &["buy", "sell"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// `lsk` followed by exactly 38 ASCII alphanumerics.
pub fn validate_asset_address(field: &'static str, address: &str) -> ValidationResult {
    validate_required(field, address)?;

    let body = address.strip_prefix(ASSET_ADDRESS_PREFIX).ok_or_else(|| {
        ValidationError::new(field, format!("must start with '{}'", ASSET_ADDRESS_PREFIX))
    })?;

    if body.len() != ASSET_ADDRESS_BODY_LEN || !body.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            field,
            format!(
                "must be '{}' followed by {} letters or digits",
                ASSET_ADDRESS_PREFIX, ASSET_ADDRESS_BODY_LEN
            ),
        ));
    }

    Ok(())
}

pub fn validate_account_number(account_number: &str) -> ValidationResult {
    if account_number.len() != ACCOUNT_NUMBER_LEN
        || !account_number.chars().all(|ch| ch.is_ascii_digit())
    {
        return Err(ValidationError::new(
            "bankDetails.accountNumber",
            format!("must be exactly {} digits", ACCOUNT_NUMBER_LEN),
        ));
    }

    Ok(())
}

/// Returns the sanitized details.
pub fn validate_bank_details(details: &BankDetails) -> Result<BankDetails, ValidationError> {
    let account_name = sanitize_string(&details.account_name);
    validate_required("bankDetails.accountName", &account_name)?;
    validate_max_len("bankDetails.accountName", &account_name, BANK_FIELD_MAX_LEN)?;

    let account_number = details.account_number.trim().to_string();
    validate_account_number(&account_number)?;

    let bank_name = sanitize_string(&details.bank_name);
    validate_required("bankDetails.bankName", &bank_name)?;
    validate_max_len("bankDetails.bankName", &bank_name, BANK_FIELD_MAX_LEN)?;

    let optional = |field: &'static str, value: &Option<String>| {
        match value.as_deref().map(sanitize_string) {
            Some(v) if v.is_empty() => Ok(None),
            Some(v) => validate_max_len(field, &v, BANK_CODE_MAX_LEN).map(|_| Some(v)),
            None => Ok(None),
        }
    };

    Ok(BankDetails {
        account_name,
        account_number,
        bank_name,
        branch_code: optional("bankDetails.branchCode", &details.branch_code)?,
        swift_code: optional("bankDetails.swiftCode", &details.swift_code)?,
    })
}

/// Trimmed and lowercased.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_ascii_lowercase();
    validate_required("email", &email)?;
    validate_max_len("email", &email, EMAIL_MAX_LEN)?;

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::new("email", "must be a valid email address"));
    }

    Ok(email)
}

pub fn validate_password(password: &str) -> ValidationResult {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN_LEN),
        ));
    }

    let has_lower = password.chars().any(|ch| ch.is_ascii_lowercase());
    let has_upper = password.chars().any(|ch| ch.is_ascii_uppercase());
    let has_digit = password.chars().any(|ch| ch.is_ascii_digit());
    let has_special = password.chars().any(|ch| PASSWORD_SPECIALS.contains(ch));
    let only_allowed = password
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(ch));

    if !(has_lower && has_upper && has_digit && has_special && only_allowed) {
        return Err(ValidationError::new(
            "password",
            format!(
                "must contain an uppercase letter, a lowercase letter, a digit and one of {}",
                PASSWORD_SPECIALS
            ),
        ));
    }

    Ok(())
}

pub fn validate_person_name(field: &'static str, name: &str) -> Result<String, ValidationError> {
    let name = sanitize_string(name);
    if name.chars().count() < NAME_MIN_LEN {
        return Err(ValidationError::new(
            field,
            format!("must be at least {} characters", NAME_MIN_LEN),
        ));
    }
    validate_max_len(field, &name, NAME_MAX_LEN)?;
    Ok(name)
}

/// Blank notes become `None`.
pub fn validate_note(note: Option<&str>) -> Result<Option<String>, ValidationError> {
    match note.map(sanitize_string) {
        Some(note) if note.is_empty() => Ok(None),
        Some(note) => {
            validate_max_len("note", &note, NOTE_MAX_LEN)?;
            Ok(Some(note))
        }
        None => Ok(None),
    }
}

/// RFC 3339, or a bare `YYYY-MM-DD` taken as the start (or end) of that UTC day.
pub fn parse_date(
    field: &'static str,
    value: &str,
    end_of_day: bool,
) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ValidationError::new(field, "must be an ISO 8601 date (YYYY-MM-DD or RFC 3339)")
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| ValidationError::new(field, "invalid time of day"))?;

    Ok(DateTime::<Utc>::from_naive_utc_and_offset(date.and_time(time), Utc))
}

pub fn validate_date_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> ValidationResult {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ValidationError::new("endDate", "must not be before startDate"));
        }
    }

    Ok(())
}

/// Amounts arrive as JSON numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

pub fn parse_amount(field: &'static str, input: &AmountInput) -> Result<BigDecimal, ValidationError> {
    let raw = match input {
        AmountInput::Number(n) => n.to_string(),
        AmountInput::Text(s) => s.trim().to_string(),
    };
    validate_required(field, &raw)?;
    validate_max_len(field, &raw, AMOUNT_INPUT_MAX_LEN)?;

    let amount = BigDecimal::from_str(&raw)
        .map_err(|_| ValidationError::new(field, "must be a number"))?;
    validate_positive_amount(field, &amount)?;
    Ok(amount)
}

pub fn validate_positive_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}
