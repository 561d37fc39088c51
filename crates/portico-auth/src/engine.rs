//! The authorization decision.
//!
//! [`AuthorizationEngine::decide`] is a pure function of the route's
//! requirement, the verified identity (if any), the request's owner id and
//! the presented API key. It has one terminal decision per requirement:
//!
//! | Requirement | Allows when |
//! |---|---|
//! | `Public` | always |
//! | `AuthenticatedUser` | a credential verified |
//! | `SelfOnly` | a credential verified and its subject equals the request's user id |
//! | `Admin` | a credential verified with the admin role |
//! | `ApiKey` | the presented key equals the configured key |

use std::fmt;

use portico_core::{GatewayError, Identity};
use subtle::ConstantTimeEq;

use crate::routes::AuthRequirement;

/// Why a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    /// The route is public.
    Public,
    /// A verified credential was present.
    Authenticated,
    /// The caller is the user the request targets.
    OwnerMatch,
    /// The caller has the admin role.
    AdminRole,
    /// The caller presented the configured key.
    ApiKeyMatch,
    /// No verified credential on a protected route.
    MissingCredential,
    /// The caller is not the user the request targets.
    OwnerMismatch,
    /// The caller lacks the admin role.
    NotAdmin,
    /// The presented key is absent or wrong.
    BadApiKey,
}

impl DecisionReason {
    /// Short machine-readable name, used as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Authenticated => "authenticated",
            Self::OwnerMatch => "owner_match",
            Self::AdminRole => "admin_role",
            Self::ApiKeyMatch => "api_key_match",
            Self::MissingCredential => "missing_credential",
            Self::OwnerMismatch => "owner_mismatch",
            Self::NotAdmin => "not_admin",
            Self::BadApiKey => "bad_api_key",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an authorization check. Computed per call, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the call may proceed.
    pub allow: bool,
    /// Why.
    pub reason: DecisionReason,
}

impl Decision {
    const fn allow(reason: DecisionReason) -> Self {
        Self {
            allow: true,
            reason,
        }
    }

    const fn deny(reason: DecisionReason) -> Self {
        Self {
            allow: false,
            reason,
        }
    }

    /// Converts a denial into the matching typed error.
    pub fn into_result(self) -> Result<(), GatewayError> {
        if self.allow {
            return Ok(());
        }
        Err(match self.reason {
            DecisionReason::MissingCredential => {
                GatewayError::unauthenticated("authentication required")
            }
            DecisionReason::OwnerMismatch => {
                GatewayError::permission_denied("callers may only access their own account")
            }
            DecisionReason::NotAdmin => GatewayError::permission_denied("admin role required"),
            DecisionReason::BadApiKey => GatewayError::permission_denied("invalid api key"),
            other => GatewayError::unknown(format!("unexpected denial reason {other}")),
        })
    }
}

/// Everything the engine looks at for one call.
#[derive(Debug, Clone, Copy)]
pub struct AuthInput<'a> {
    /// Route name, for threat logging.
    pub route: &'a str,
    /// The route's requirement.
    pub requirement: AuthRequirement,
    /// The verified caller, if a credential verified.
    pub identity: Option<&'a Identity>,
    /// The user id the request message targets.
    pub owner_id: Option<&'a str>,
    /// The key presented out-of-band, if any.
    pub api_key: Option<&'a str>,
}

/// Decides ALLOW/DENY per route requirement.
#[derive(Clone, Default)]
pub struct AuthorizationEngine {
    api_key: Option<String>,
}

impl fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationEngine")
            .field("api_key_configured", &self.api_key.is_some())
            .finish()
    }
}

impl AuthorizationEngine {
    /// Creates an engine with no API key configured. `ApiKey` routes deny
    /// every caller until a key is set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shared key accepted on `ApiKey` routes. Empty keys are ignored.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    /// Decides whether the call may proceed.
    #[must_use]
    pub fn decide(&self, input: &AuthInput<'_>) -> Decision {
        match input.requirement {
            AuthRequirement::Public => Decision::allow(DecisionReason::Public),
            AuthRequirement::ApiKey => self.check_api_key(input.api_key),
            AuthRequirement::AuthenticatedUser => match input.identity {
                Some(_) => Decision::allow(DecisionReason::Authenticated),
                None => Decision::deny(DecisionReason::MissingCredential),
            },
            AuthRequirement::SelfOnly => match input.identity {
                None => Decision::deny(DecisionReason::MissingCredential),
                Some(identity) if input.owner_id == Some(identity.subject_id()) => {
                    Decision::allow(DecisionReason::OwnerMatch)
                }
                Some(_) => Decision::deny(DecisionReason::OwnerMismatch),
            },
            AuthRequirement::Admin => match input.identity {
                None => Decision::deny(DecisionReason::MissingCredential),
                Some(identity) if identity.role().is_admin() => {
                    Decision::allow(DecisionReason::AdminRole)
                }
                Some(identity) => {
                    tracing::warn!(
                        threat = true,
                        subject = identity.subject_id(),
                        route = input.route,
                        "non-admin caller attempted an admin route"
                    );
                    Decision::deny(DecisionReason::NotAdmin)
                }
            },
        }
    }

    fn check_api_key(&self, presented: Option<&str>) -> Decision {
        let matches = match (self.api_key.as_deref(), presented) {
            (Some(expected), Some(presented)) => {
                bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
            }
            _ => false,
        };
        if matches {
            Decision::allow(DecisionReason::ApiKeyMatch)
        } else {
            Decision::deny(DecisionReason::BadApiKey)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::Role;
    use proptest::prelude::*;

    fn input<'a>(
        requirement: AuthRequirement,
        identity: Option<&'a Identity>,
        owner_id: Option<&'a str>,
    ) -> AuthInput<'a> {
        AuthInput {
            route: "Test",
            requirement,
            identity,
            owner_id,
            api_key: None,
        }
    }

    #[test]
    fn test_public_allows_anonymous() {
        let decision = AuthorizationEngine::new().decide(&input(AuthRequirement::Public, None, None));
        assert!(decision.allow);
        assert_eq!(decision.reason, DecisionReason::Public);
    }

    #[test]
    fn test_authenticated_user_requires_identity() {
        let engine = AuthorizationEngine::new();
        let ann = Identity::new("7", "ann", Role::Default);

        assert!(engine
            .decide(&input(AuthRequirement::AuthenticatedUser, Some(&ann), None))
            .allow);
        let denied = engine.decide(&input(AuthRequirement::AuthenticatedUser, None, None));
        assert_eq!(denied.reason, DecisionReason::MissingCredential);
        assert!(matches!(
            denied.into_result(),
            Err(GatewayError::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_self_route_compares_owner() {
        let engine = AuthorizationEngine::new();
        let ann = Identity::new("7", "ann", Role::Default);

        assert!(engine
            .decide(&input(AuthRequirement::SelfOnly, Some(&ann), Some("7")))
            .allow);

        let other = engine.decide(&input(AuthRequirement::SelfOnly, Some(&ann), Some("8")));
        assert!(matches!(
            other.into_result(),
            Err(GatewayError::PermissionDenied { .. })
        ));

        let missing = engine.decide(&input(AuthRequirement::SelfOnly, Some(&ann), None));
        assert_eq!(missing.reason, DecisionReason::OwnerMismatch);
    }

    #[test]
    fn test_admin_on_self_route_is_still_compared() {
        let root = Identity::new("1", "root", Role::Admin);
        let decision = AuthorizationEngine::new()
            .decide(&input(AuthRequirement::SelfOnly, Some(&root), Some("7")));
        assert!(!decision.allow);
    }

    #[test]
    fn test_admin_route() {
        let engine = AuthorizationEngine::new();
        let root = Identity::new("1", "root", Role::Admin);
        let ann = Identity::new("7", "ann", Role::Default);

        assert!(engine.decide(&input(AuthRequirement::Admin, Some(&root), None)).allow);
        assert_eq!(
            engine.decide(&input(AuthRequirement::Admin, Some(&ann), None)).reason,
            DecisionReason::NotAdmin
        );
        assert_eq!(
            engine.decide(&input(AuthRequirement::Admin, None, None)).reason,
            DecisionReason::MissingCredential
        );
    }

    #[test]
    fn test_api_key_route() {
        let engine = AuthorizationEngine::new().with_api_key("k3y");
        let mut call = input(AuthRequirement::ApiKey, None, None);

        assert_eq!(engine.decide(&call).reason, DecisionReason::BadApiKey);
        call.api_key = Some("wrong");
        assert!(!engine.decide(&call).allow);
        call.api_key = Some("k3y");
        assert!(engine.decide(&call).allow);
    }

    #[test]
    fn test_api_key_route_denies_without_configured_key() {
        let engine = AuthorizationEngine::new().with_api_key("");
        let mut call = input(AuthRequirement::ApiKey, None, None);
        call.api_key = Some("");
        let decision = engine.decide(&call);
        assert!(matches!(
            decision.into_result(),
            Err(GatewayError::PermissionDenied { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_admin_route_rejects_every_default_role(id in "[0-9]{1,8}", owner in proptest::option::of("[0-9]{1,8}")) {
            let identity = Identity::new(id, "user", Role::Default);
            let decision = AuthorizationEngine::new().decide(&input(
                AuthRequirement::Admin,
                Some(&identity),
                owner.as_deref(),
            ));
            prop_assert_eq!(decision.reason, DecisionReason::NotAdmin);
        }

        #[test]
        fn prop_self_route_allows_iff_ids_match(subject in 1u64..50, owner in 1u64..50) {
            let identity = Identity::new(subject.to_string(), "user", Role::Default);
            let owner = owner.to_string();
            let decision = AuthorizationEngine::new().decide(&input(
                AuthRequirement::SelfOnly,
                Some(&identity),
                Some(&owner),
            ));
            prop_assert_eq!(decision.allow, subject.to_string() == owner);
        }
    }
}
