//! Request-body validation.
//!
//! Field checks collect into a `Vec<FieldError>` so clients get every
//! problem at once.

use crate::error::{AppError, FieldError};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 120;

/// Loose email shape check: `local@domain.tld`. Deliverability is proven by
/// the verification code, not by parsing.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

fn check_password_pair(password: &str, confirm: &str, errors: &mut Vec<FieldError>) {
    if password.len() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if password != confirm {
        errors.push(FieldError::new(
            "confirmPassword",
            "Passwords do not match",
        ));
    }
}

fn into_result(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: "Validation error".into(),
            errors,
        })
    }
}

/// Validate a registration request.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    } else if name.len() > MAX_NAME_LEN {
        errors.push(FieldError::new("name", "Name is too long"));
    }
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "A valid email is required"));
    }
    check_password_pair(password, confirm, &mut errors);
    into_result(errors)
}

/// Validate a login request.
pub fn validate_login(email: &str, password: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "A valid email is required"));
    }
    if password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    into_result(errors)
}

/// Validate a password-reset request body.
pub fn validate_password_reset(password: &str, confirm: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();
    check_password_pair(password, confirm, &mut errors);
    into_result(errors)
}
