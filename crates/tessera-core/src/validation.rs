//! Model validation before any SQL is issued.

use crate::TesseraError;
use validator::{Validate, ValidationErrors};

/// Extension trait for validation.
pub trait ValidateExt: Validate {
    /// Validates the model and returns `InvalidModel` on failure.
    fn validate_model(&self) -> Result<(), TesseraError> {
        self.validate().map_err(validation_errors_to_tessera_error)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Flattens `validator::ValidationErrors` into a single `InvalidModel` error.
#[must_use]
pub fn validation_errors_to_tessera_error(errors: ValidationErrors) -> TesseraError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let detail = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string);
                format!("{field}: {detail}")
            })
        })
        .collect();
    messages.sort();

    TesseraError::InvalidModel(messages.join("; "))
}

/// Common validation functions.
pub mod rules {
    use validator::ValidationError;

    /// Longest name accepted for nodes, teams and wiki titles.
    pub const MAX_NAME_LENGTH: usize = 256;

    /// Validates that a string is not blank (not empty after trimming).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("not_blank"));
        }
        Ok(())
    }

    /// Entity names: letters, digits, spaces and `_ - . + ( ) '`.
    pub fn valid_entity_name(name: &str) -> Result<(), ValidationError> {
        not_blank(name)?;
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ValidationError::new("name_too_long"));
        }
        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || " _-.+()'".contains(c))
        {
            return Err(ValidationError::new("name_invalid_characters"));
        }
        Ok(())
    }

    /// User names: letters, digits, `_ - .`, at least three characters.
    pub fn valid_user_name(name: &str) -> Result<(), ValidationError> {
        if name.chars().count() < 3 {
            return Err(ValidationError::new("user_name_too_short"));
        }
        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(ValidationError::new("user_name_invalid_characters"));
        }
        Ok(())
    }

    /// Minimal email shape: `local@domain` with a dot in the domain.
    pub fn valid_email(email: &str) -> Result<(), ValidationError> {
        let Some((local, domain)) = email.split_once('@') else {
            return Err(ValidationError::new("email_missing_at"));
        };
        if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
            return Err(ValidationError::new("email_invalid"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::rules::*;
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Named {
        #[validate(custom(function = "valid_entity_name"))]
        name: String,
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("hello").is_ok());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("").is_err());
    }

    #[test]
    fn test_valid_entity_name() {
        assert!(valid_entity_name("My Project (v2)").is_ok());
        assert!(valid_entity_name("data_file-1.csv").is_ok());
        assert!(valid_entity_name("bad/name").is_err());
        assert!(valid_entity_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_valid_user_name() {
        assert!(valid_user_name("jane.doe").is_ok());
        assert!(valid_user_name("ab").is_err());
        assert!(valid_user_name("jane doe").is_err());
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("jane@example.org").is_ok());
        assert!(valid_email("jane.example.org").is_err());
        assert!(valid_email("@example.org").is_err());
        assert!(valid_email("jane@localhost").is_err());
    }

    #[test]
    fn test_validate_model_maps_to_invalid_model() {
        let err = Named {
            name: "  ".to_string(),
        }
        .validate_model()
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_MODEL");
        assert!(err.to_string().contains("name"));
    }
}
