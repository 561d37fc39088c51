//! Credential issuance and verification.
//!
//! Credentials are HS256-signed JWTs carrying the subject id, display name
//! and role, so authorization never needs a second lookup. Verification
//! checks signature, structure and expiry in one pass. Every failure maps to
//! the same `Unauthenticated` error for the caller; the precise reason is
//! only available server-side through [`CredentialError::reason`].

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use portico_core::{GatewayError, Identity, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of the `Authorization` header value.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Message returned to callers for every verification failure.
const UNAUTHENTICATED_MESSAGE: &str = "missing or invalid credential";

/// Credential failures. Only [`CredentialError::Signing`] is a server fault.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No credential was presented.
    #[error("no credential presented")]
    Missing,

    /// The `Authorization` header is not `Bearer <token>`.
    #[error("authorization header is not a bearer token")]
    MalformedBearer,

    /// The signature does not match.
    #[error("credential signature is invalid")]
    BadSignature,

    /// The credential is at or past its expiry.
    #[error("credential expired")]
    Expired,

    /// The token could not be decoded.
    #[error("credential is malformed: {0}")]
    Malformed(String),

    /// The token could not be signed.
    #[error("failed to sign credential: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl CredentialError {
    /// Short machine-readable reason, for logs and metrics only.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::MalformedBearer => "malformed_bearer",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::Malformed(_) => "malformed",
            Self::Signing(_) => "signing",
        }
    }
}

impl From<CredentialError> for GatewayError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Signing(source) => {
                Self::internal_with_source("failed to issue credential", source)
            }
            _ => Self::unauthenticated(UNAUTHENTICATED_MESSAGE),
        }
    }
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id.
    pub sub: String,
    /// Display name.
    pub name: String,
    /// Caller role.
    pub role: Role,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// A verified credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Subject id.
    pub subject_id: String,
    /// Display name.
    pub display_name: String,
    /// Caller role.
    pub role: Role,
    /// When the credential was issued.
    pub issued_at: DateTime<Utc>,
    /// When the credential stops verifying.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// The identity the authorization stage injects into the call context.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(&self.subject_id, &self.display_name, self.role)
    }
}

/// Longest session a codec issues credentials for.
pub const MAX_SESSION_DAYS: u32 = 3650;

/// Issues and verifies credentials with a shared secret.
///
/// # Example
///
/// ```
/// use portico_auth::CredentialCodec;
/// use portico_core::Role;
///
/// let codec = CredentialCodec::new(b"secret", 7);
/// let token = codec.issue("7", "ann", Role::Default)?;
/// let credential = codec.verify(&token)?;
///
/// assert_eq!(credential.subject_id, "7");
/// assert_eq!(credential.role, Role::Default);
/// # Ok::<(), portico_auth::CredentialError>(())
/// ```
#[derive(Clone)]
pub struct CredentialCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    session: Duration,
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl CredentialCodec {
    /// Creates a codec whose credentials live for `session_days` days, capped
    /// at [`MAX_SESSION_DAYS`].
    #[must_use]
    pub fn new(secret: &[u8], session_days: u32) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an injectable clock in `verify_at`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            session: Duration::days(i64::from(session_days.min(MAX_SESSION_DAYS))),
        }
    }

    /// Returns the configured session length.
    #[must_use]
    pub fn session(&self) -> Duration {
        self.session
    }

    /// Issues a credential valid from now.
    pub fn issue(
        &self,
        subject_id: &str,
        display_name: &str,
        role: Role,
    ) -> Result<String, CredentialError> {
        self.issue_at(subject_id, display_name, role, Utc::now())
    }

    /// Issues a credential valid from `now`.
    pub fn issue_at(
        &self,
        subject_id: &str,
        display_name: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let claims = Claims {
            sub: subject_id.to_string(),
            name: display_name.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.session).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(
            |e| {
                tracing::error!(error = %e, subject = subject_id, "credential signing failed");
                CredentialError::Signing(e)
            },
        )
    }

    /// Verifies a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Credential, CredentialError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies a token as of `now`. Fails at and after the expiry instant.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Credential, CredentialError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => CredentialError::BadSignature,
                ErrorKind::ExpiredSignature => CredentialError::Expired,
                _ => CredentialError::Malformed(e.to_string()),
            })?;
        let claims = data.claims;

        if now.timestamp() >= claims.exp {
            return Err(CredentialError::Expired);
        }

        let issued_at = DateTime::from_timestamp(claims.iat, 0)
            .ok_or_else(|| CredentialError::Malformed("iat out of range".to_string()))?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| CredentialError::Malformed("exp out of range".to_string()))?;

        Ok(Credential {
            subject_id: claims.sub,
            display_name: claims.name,
            role: claims.role,
            issued_at,
            expires_at,
        })
    }

    /// Verifies the value of an `Authorization` header.
    pub fn verify_bearer(&self, header: Option<&str>) -> Result<Credential, CredentialError> {
        let token = extract_bearer(header)?;
        self.verify(token)
    }
}

/// Strips the `Bearer ` prefix from an `Authorization` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, CredentialError> {
    let value = header.ok_or(CredentialError::Missing)?;
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or(CredentialError::MalformedBearer)?
        .trim();
    if token.is_empty() {
        return Err(CredentialError::MalformedBearer);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_unauthenticated(err: CredentialError) {
        let gateway = GatewayError::from(err);
        assert!(matches!(gateway, GatewayError::Unauthenticated { .. }));
        assert_eq!(gateway.message(), UNAUTHENTICATED_MESSAGE);
    }

    fn codec() -> CredentialCodec {
        CredentialCodec::new(b"test-secret", 7)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_issue_then_verify_round_trips_claims() {
        let codec = codec();
        let now = at(1_700_000_000);
        let token = codec.issue_at("7", "ann", Role::Default, now).unwrap();
        let credential = codec.verify_at(&token, now).unwrap();

        assert_eq!(credential.subject_id, "7");
        assert_eq!(credential.display_name, "ann");
        assert_eq!(credential.role, Role::Default);
        assert_eq!(credential.issued_at, now);
        assert_eq!(credential.expires_at, now + Duration::days(7));
    }

    #[test]
    fn test_verify_fails_at_and_after_expiry() {
        let codec = codec();
        let now = at(1_700_000_000);
        let token = codec.issue_at("7", "ann", Role::Admin, now).unwrap();
        let expires = now + Duration::days(7);

        assert!(codec.verify_at(&token, expires - Duration::seconds(1)).is_ok());
        assert!(matches!(
            codec.verify_at(&token, expires),
            Err(CredentialError::Expired)
        ));
        assert!(matches!(
            codec.verify_at(&token, expires + Duration::days(1)),
            Err(CredentialError::Expired)
        ));
    }

    #[test]
    fn test_session_length_is_capped() {
        let codec = CredentialCodec::new(b"test-secret", u32::MAX);
        assert_eq!(codec.session(), Duration::days(i64::from(MAX_SESSION_DAYS)));
        assert!(codec.issue("7", "ann", Role::Default).is_ok());
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let token = codec().issue("7", "ann", Role::Default).unwrap();
        let other = CredentialCodec::new(b"other-secret", 7);
        assert!(matches!(
            other.verify(&token),
            Err(CredentialError::BadSignature)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            codec().verify("not.a.token"),
            Err(CredentialError::Malformed(_))
        ));
    }

    #[test]
    fn test_bearer_header_parsing() {
        assert!(matches!(extract_bearer(None), Err(CredentialError::Missing)));
        assert!(matches!(
            extract_bearer(Some("Basic abc")),
            Err(CredentialError::MalformedBearer)
        ));
        assert!(matches!(
            extract_bearer(Some("Bearer   ")),
            Err(CredentialError::MalformedBearer)
        ));
        assert_eq!(extract_bearer(Some("Bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn test_verify_bearer() {
        let codec = codec();
        let token = codec.issue("9", "bob", Role::Default).unwrap();
        let header = format!("Bearer {token}");
        assert_eq!(codec.verify_bearer(Some(&header)).unwrap().subject_id, "9");
    }

    #[test]
    fn test_every_verification_failure_looks_the_same_to_callers() {
        assert_unauthenticated(CredentialError::Missing);
        assert_unauthenticated(CredentialError::MalformedBearer);
        assert_unauthenticated(CredentialError::BadSignature);
        assert_unauthenticated(CredentialError::Expired);
        assert_unauthenticated(CredentialError::Malformed("x".to_string()));
    }

    #[test]
    fn test_credential_identity() {
        let codec = codec();
        let token = codec.issue("3", "cat", Role::Admin).unwrap();
        let identity = codec.verify(&token).unwrap().identity();
        assert_eq!(identity.subject_id(), "3");
        assert!(identity.role().is_admin());
    }

    #[test]
    fn test_debug_does_not_print_secret() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains("test-secret"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_round_trip_before_expiry(
            id in "[0-9]{1,6}",
            name in "[a-z]{1,12}",
            admin in any::<bool>(),
            offset in 0i64..(7 * 86_400),
        ) {
            let codec = codec();
            let role = if admin { Role::Admin } else { Role::Default };
            let now = at(1_700_000_000);
            let token = codec.issue_at(&id, &name, role, now).unwrap();
            let credential = codec.verify_at(&token, now + Duration::seconds(offset)).unwrap();
            prop_assert_eq!(credential.subject_id, id);
            prop_assert_eq!(credential.display_name, name);
            prop_assert_eq!(credential.role, role);
        }
    }
}
