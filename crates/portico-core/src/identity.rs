//! Caller identity.
//!
//! An [`Identity`] is what the authorization stage injects into the
//! [`CallContext`](crate::CallContext) after a credential verified. It carries
//! the role so authorization never needs a second lookup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller role carried inside a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account.
    #[default]
    Default,
    /// Administrator.
    Admin,
}

impl Role {
    /// Returns the wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Admin => "admin",
        }
    }

    /// Returns `true` for [`Role::Admin`].
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised role name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// A verified caller.
///
/// # Example
///
/// ```
/// use portico_core::{Identity, Role};
///
/// let identity = Identity::new("7", "ann", Role::Default);
/// assert_eq!(identity.log_id(), "user:7");
/// assert!(!identity.role().is_admin());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    subject_id: String,
    display_name: String,
    role: Role,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            display_name: display_name.into(),
            role,
        }
    }

    /// Returns the subject id.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns a string identifier suitable for logging. Never contains secrets.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!("user:{}", self.subject_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::Default, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
    }

    #[test]
    fn test_identity_accessors() {
        let identity = Identity::new("42", "bob", Role::Admin);
        assert_eq!(identity.subject_id(), "42");
        assert_eq!(identity.display_name(), "bob");
        assert!(identity.role().is_admin());
    }
}
