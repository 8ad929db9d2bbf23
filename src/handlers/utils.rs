use std::fmt::Display;

use crate::error::ApiError;

/// Emails are compared trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only: one `@`, non-empty local part, dotted domain, no
/// whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ApiError::invalid_field("email", "Invalid email address"))
    }
}

pub fn validate_password(password: &str, min_length: usize) -> Result<(), ApiError> {
    if password.chars().count() < min_length {
        return Err(ApiError::invalid_field(
            "password",
            format!("Password must be at least {} characters", min_length),
        ));
    }
    Ok(())
}

/// Present and non-blank.
pub fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Log `err` and answer with a route-specific 500.
pub fn internal<E: Display>(message: &'static str) -> impl FnOnce(E) -> ApiError {
    move |err| {
        tracing::error!("{}: {}", message, err);
        ApiError::internal_server_error(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@assembly.gov.za"));
        assert!(!is_valid_email("a.x.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a@@x.com"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(validate_password("Secret123", 8).is_ok());
        assert!(validate_password("short", 8).is_err());
        assert!(validate_password("ñññññññ", 8).is_err());
    }

    #[test]
    fn blank_is_not_provided() {
        assert_eq!(provided(&Some("  ".to_string())), None);
        assert_eq!(provided(&None), None);
        assert_eq!(provided(&Some(" x ".to_string())), Some("x"));
    }
}
