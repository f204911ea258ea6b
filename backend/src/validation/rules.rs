//! Common validation rules shared across request payloads.

use validator::ValidationError;

/// Validates a role or module machine name.
///
/// Requirements:
/// - Lowercase ASCII letters, digits and underscores, starting with a letter
/// - 1-64 characters in length
pub fn validate_role_name(name: &str) -> Result<(), ValidationError> {
    validate_identifier(name).map_err(|code| ValidationError::new(code))
}

/// Same rules as [`validate_role_name`], as a plain check for non-derive call sites.
pub fn validate_identifier(name: &str) -> Result<(), &'static str> {
    if name.is_empty() || name.len() > 64 {
        return Err("identifier_invalid_length");
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return Err("identifier_invalid_start");
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err("identifier_invalid_characters");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rejects_empty() {
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn identifier_rejects_special_chars() {
        assert_eq!(
            validate_identifier("pay-roll"),
            Err("identifier_invalid_characters")
        );
    }

    #[test]
    fn identifier_rejects_leading_digit() {
        assert_eq!(validate_identifier("9lives"), Err("identifier_invalid_start"));
    }

    #[test]
    fn identifier_accepts_valid() {
        assert!(validate_identifier("hr_manager2").is_ok());
        assert!(validate_role_name("payroll").is_ok());
    }
}
