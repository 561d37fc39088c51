//! Declarative field rules.
//!
//! [`Validator`] collects every violated rule instead of stopping at the
//! first. The resulting [`FieldErrors`] renders as a human-readable,
//! field-qualified, comma-joined list, which is what clients receive in an
//! `InvalidArgument` error.

use std::fmt;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field-specific validation errors, in the order rules were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
pub struct FieldErrors {
    /// Map of field name to violated rule descriptions.
    pub fields: IndexMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Creates a new empty `FieldErrors`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a violation for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Returns `true` if no rule was violated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of violated rules across all fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{field} {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|_| unreachable!())
    })
}

/// Builder that checks field rules and collects violations.
///
/// # Example
///
/// ```
/// use portico_core::Validator;
///
/// let result = Validator::new()
///     .required("email", "")
///     .length("password", "abc", 8, 72)
///     .finish();
///
/// let errors = result.unwrap_err();
/// assert_eq!(
///     errors.to_string(),
///     "email is required, password must be between 8 and 72 characters"
/// );
/// ```
#[derive(Debug, Default)]
#[must_use]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    /// Creates a validator with no violations.
    pub fn new() -> Self {
        Self::default()
    }

    /// The field must not be empty or whitespace.
    pub fn required(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.errors.add(field, "is required");
        }
        self
    }

    /// The field's character count must lie in `min..=max`.
    pub fn length(mut self, field: &str, value: &str, min: usize, max: usize) -> Self {
        let len = value.chars().count();
        if len < min || len > max {
            self.errors
                .add(field, format!("must be between {min} and {max} characters"));
        }
        self
    }

    /// The field's character count must not exceed `max`.
    pub fn max_length(mut self, field: &str, value: &str, max: usize) -> Self {
        if value.chars().count() > max {
            self.errors
                .add(field, format!("must be at most {max} characters"));
        }
        self
    }

    /// The field must look like an email address. Empty values are left to
    /// [`required`](Self::required).
    pub fn email(mut self, field: &str, value: &str) -> Self {
        if !value.is_empty() && !email_pattern().is_match(value) {
            self.errors.add(field, "must be a valid email address");
        }
        self
    }

    /// The numeric field must be greater than zero.
    pub fn positive(mut self, field: &str, value: u64) -> Self {
        if value == 0 {
            self.errors.add(field, "must be greater than 0");
        }
        self
    }

    /// The numeric field must not exceed `max`.
    pub fn at_most(mut self, field: &str, value: u64, max: u64) -> Self {
        if value > max {
            self.errors.add(field, format!("must be at most {max}"));
        }
        self
    }

    /// Adds a violation when `condition` is false.
    pub fn check(mut self, condition: bool, field: &str, message: &str) -> Self {
        if !condition {
            self.errors.add(field, message);
        }
        self
    }

    /// Returns `Ok(())` when no rule was violated.
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_rules_passes() {
        assert!(Validator::new().finish().is_ok());
    }

    #[test]
    fn test_every_violation_is_listed() {
        let errors = Validator::new()
            .required("email", " ")
            .email("email", "not-an-email")
            .positive("user_id", 0)
            .finish()
            .unwrap_err();

        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.to_string(),
            "email is required, email must be a valid email address, user_id must be greater than 0"
        );
    }

    #[test]
    fn test_email_rule() {
        assert!(Validator::new().email("email", "ann@example.com").finish().is_ok());
        assert!(Validator::new().email("email", "ann@example").finish().is_err());
        assert!(Validator::new().email("email", "").finish().is_ok());
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        assert!(Validator::new().length("name", "ééé", 3, 3).finish().is_ok());
    }

    #[test]
    fn test_check_rule() {
        let errors = Validator::new()
            .check(false, "limit", "must be a multiple of 10")
            .finish()
            .unwrap_err();
        assert_eq!(errors.to_string(), "limit must be a multiple of 10");
    }

    proptest! {
        #[test]
        fn prop_positive_rejects_only_zero(value in any::<u64>()) {
            let result = Validator::new().positive("id", value).finish();
            prop_assert_eq!(result.is_ok(), value > 0);
        }

        #[test]
        fn prop_at_most_is_inclusive(value in 0u64..200, max in 0u64..200) {
            let result = Validator::new().at_most("limit", value, max).finish();
            prop_assert_eq!(result.is_ok(), value <= max);
        }
    }
}
