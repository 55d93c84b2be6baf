//! Validation helpers for configuration sections

pub use crate::error::ValidationError;

/// A configuration section that validates and merges itself
pub trait ConfigSection: Default {
    /// Validates the configuration section
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Merges another config section into this one; values from `other` win
    fn merge(&mut self, other: Self);

    /// Returns the section name for error reporting
    fn section_name(&self) -> &'static str;
}

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Validates that a numeric value is within a range
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a string is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    /// Validates that a string starts with `prefix` and has content after it
    pub fn prefixed(value: &str, prefix: &str, field: &str) -> Result<(), ValidationError> {
        if !value.starts_with(prefix) || value.len() <= prefix.len() {
            Err(ValidationError::with_value(
                field,
                format!("must start with '{}' followed by at least one character", prefix),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a string contains none of the given characters
    pub fn no_chars(value: &str, forbidden: &[char], field: &str) -> Result<(), ValidationError> {
        match value.chars().find(|c| forbidden.contains(c)) {
            Some(c) => Err(ValidationError::with_value(
                field,
                format!("must not contain '{}'", c.escape_default()),
                value,
            )),
            None => Ok(()),
        }
    }

    /// Collects multiple validation results into a single result
    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range() {
        assert!(Validator::in_range(500u64, 0, 60_000, "x").is_ok());
        assert!(Validator::in_range(60_001u64, 0, 60_000, "x").is_err());
    }

    #[test]
    fn test_not_empty() {
        assert!(Validator::not_empty("{title}", "x").is_ok());
        assert!(Validator::not_empty("   ", "x").is_err());
    }

    #[test]
    fn test_prefixed() {
        assert!(Validator::prefixed(".folio-move.tmp", ".", "x").is_ok());
        assert!(Validator::prefixed(".", ".", "x").is_err());
        assert!(Validator::prefixed("tmp", ".", "x").is_err());
    }

    #[test]
    fn test_no_chars() {
        assert!(Validator::no_chars(".tmp", &['/', '\\'], "x").is_ok());
        let err = Validator::no_chars(".a/b", &['/', '\\'], "x").unwrap_err();
        assert!(err.message.contains('/'));
    }

    #[test]
    fn test_collect_errors() {
        let results = vec![
            Ok(()),
            Err(ValidationError::new("a", "bad")),
            Err(ValidationError::new("b", "bad")),
        ];
        assert_eq!(Validator::collect_errors(results).unwrap_err().len(), 2);
        assert!(Validator::collect_errors(vec![Ok(())]).is_ok());
    }
}
