// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request body sanitizing and validation.
//!
//! Sanitizing walks an arbitrary JSON object, trims and escapes every string
//! and recurses into nested objects. Validation checks only the fields that
//! are present and stops at the first violation.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

use crate::error::AppError;

// Field limits
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 50;
const MIN_PASSWORD_LENGTH: usize = 6;
const MIN_PRODUCT_NAME_LENGTH: usize = 2;
const MAX_PRODUCT_NAME_LENGTH: usize = 100;
const MAX_CATEGORY_LENGTH: usize = 50;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex"));
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static regex")
});

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Username must be between 3 and 50 characters")]
    UsernameLength,

    #[error("Username can only contain letters, numbers, and underscores")]
    UsernameCharset,

    #[error("Please provide a valid email address")]
    InvalidEmail,

    #[error("Password must be at least 6 characters long")]
    PasswordTooShort,

    #[error("Product name must be between 2 and 100 characters")]
    ProductNameLength,

    #[error("Price must be a positive number")]
    InvalidPrice,

    #[error("Stock must be a non-negative integer")]
    InvalidStock,

    #[error("Category must be less than 50 characters")]
    CategoryTooLong,

    #[error("Request body must be a JSON object")]
    NotAnObject,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Escape markup-significant characters
pub fn sanitize_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}

/// Trim and escape every string of an object, recursing into nested objects.
/// Anything that is not an object is returned unchanged.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sanitize_object(map)),
        other => other,
    }
}

fn sanitize_object(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => Value::String(sanitize_string(s.trim())),
                Value::Object(nested) => Value::Object(sanitize_object(nested)),
                other => other,
            };
            (key, value)
        })
        .collect()
}

/// Validate a username
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(ValidationError::UsernameLength);
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::UsernameCharset);
    }
    Ok(username)
}

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email)
}

/// Validate a password
pub fn validate_password(password: &str) -> ValidationResult<&str> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(password)
}

/// Validate a product name
pub fn validate_product_name(name: &str) -> ValidationResult<&str> {
    let len = name.chars().count();
    if !(MIN_PRODUCT_NAME_LENGTH..=MAX_PRODUCT_NAME_LENGTH).contains(&len) {
        return Err(ValidationError::ProductNameLength);
    }
    Ok(name)
}

/// Validate a price: any finite number >= 0
pub fn validate_price(price: &Value) -> ValidationResult<f64> {
    match price.as_f64() {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(p),
        _ => Err(ValidationError::InvalidPrice),
    }
}

/// Validate a stock count: a JSON integer >= 0 that fits in `u32`
pub fn validate_stock(stock: &Value) -> ValidationResult<u32> {
    stock
        .as_u64()
        .and_then(|s| u32::try_from(s).ok())
        .ok_or(ValidationError::InvalidStock)
}

/// Validate a category
pub fn validate_category(category: &str) -> ValidationResult<&str> {
    if category.chars().count() > MAX_CATEGORY_LENGTH {
        return Err(ValidationError::CategoryTooLong);
    }
    Ok(category)
}

/// Rule sets attachable to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    /// username, email, password (and newPassword)
    Auth,
    /// username format only; a wrong password must reach the credential check
    Login,
    /// name, price, stock, category
    Product,
}

/// A field counts as present when it exists and is not `null`
fn present<'a>(body: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    body.get(field).filter(|v| !v.is_null())
}

/// Present string field; non-strings are reported with `err`
fn present_str<'a>(
    body: &'a Map<String, Value>,
    field: &str,
    err: ValidationError,
) -> ValidationResult<Option<&'a str>> {
    match present(body, field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(err),
    }
}

impl RuleSet {
    /// Check a JSON body against this rule set
    pub fn check_value(&self, body: &Value) -> ValidationResult<()> {
        match body {
            Value::Object(map) => self.check(map),
            _ => Err(ValidationError::NotAnObject),
        }
    }

    /// Check the present fields of an object, first violation wins
    pub fn check(&self, body: &Map<String, Value>) -> ValidationResult<()> {
        match self {
            RuleSet::Auth => {
                if let Some(username) =
                    present_str(body, "username", ValidationError::UsernameLength)?
                {
                    validate_username(username)?;
                }
                if let Some(email) = present_str(body, "email", ValidationError::InvalidEmail)? {
                    validate_email(email)?;
                }
                for field in ["password", "newPassword"] {
                    if let Some(password) =
                        present_str(body, field, ValidationError::PasswordTooShort)?
                    {
                        validate_password(password)?;
                    }
                }
            },
            RuleSet::Login => {
                if let Some(username) =
                    present_str(body, "username", ValidationError::UsernameLength)?
                {
                    validate_username(username)?;
                }
            },
            RuleSet::Product => {
                if let Some(name) = present_str(body, "name", ValidationError::ProductNameLength)? {
                    validate_product_name(name)?;
                }
                if let Some(price) = present(body, "price") {
                    validate_price(price)?;
                }
                if let Some(stock) = present(body, "stock") {
                    validate_stock(stock)?;
                }
                if let Some(category) =
                    present_str(body, "category", ValidationError::CategoryTooLong)?
                {
                    validate_category(category)?;
                }
            },
        }
        Ok(())
    }
}
