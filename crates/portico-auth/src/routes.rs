//! Route table.
//!
//! Maps a route name (the last segment of an RPC method path) to its
//! [`AuthRequirement`]. The table is built once at startup from service
//! registrations and is read-only afterwards.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

/// Who may call a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthRequirement {
    /// Anyone, with or without a credential.
    Public,
    /// Any caller holding a verified credential.
    AuthenticatedUser,
    /// Only the user the request message targets.
    SelfOnly,
    /// Only callers with the admin role.
    Admin,
    /// Only callers presenting the configured shared key.
    ApiKey,
}

impl AuthRequirement {
    /// Returns the name used for the requirement in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::AuthenticatedUser => "authenticated_user",
            Self::SelfOnly => "self",
            Self::Admin => "admin",
            Self::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for AuthRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building a route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The same route name was registered twice.
    #[error("route {0} registered more than once")]
    Duplicate(String),

    /// A route was registered with an empty name.
    #[error("route name must not be empty")]
    EmptyName,
}

/// Immutable route name to requirement mapping.
///
/// # Example
///
/// ```
/// use portico_auth::{AuthRequirement, RouteTable};
///
/// let routes = RouteTable::from_routes([
///     ("Ping", AuthRequirement::Public),
///     ("ListUsers", AuthRequirement::Admin),
/// ])?;
///
/// assert_eq!(routes.requirement_for("Ping"), AuthRequirement::Public);
/// // Unmapped names fail closed.
/// assert_eq!(routes.requirement_for("DropTables"), AuthRequirement::Admin);
/// # Ok::<(), portico_auth::RouteError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: IndexMap<String, AuthRequirement>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table, rejecting duplicate or empty names.
    pub fn from_routes<I, S>(routes: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = (S, AuthRequirement)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, requirement) in routes {
            table.insert(name, requirement)?;
        }
        Ok(table)
    }

    /// Registers a route.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        requirement: AuthRequirement,
    ) -> Result<(), RouteError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RouteError::EmptyName);
        }
        if self.routes.contains_key(&name) {
            return Err(RouteError::Duplicate(name));
        }
        self.routes.insert(name, requirement);
        Ok(())
    }

    /// Returns the requirement for a route.
    ///
    /// Unmapped names resolve to [`AuthRequirement::Admin`] and are logged as
    /// an anomaly.
    #[must_use]
    pub fn requirement_for(&self, route: &str) -> AuthRequirement {
        match self.routes.get(route) {
            Some(requirement) => *requirement,
            None => {
                tracing::warn!(
                    anomaly = true,
                    route,
                    "route has no auth requirement, treating as admin"
                );
                AuthRequirement::Admin
            }
        }
    }

    /// Returns `true` if the route is registered.
    #[must_use]
    pub fn contains(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterates routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, AuthRequirement)> {
        self.routes.iter().map(|(name, req)| (name.as_str(), *req))
    }
}

/// Extracts the route name from a full RPC method path.
///
/// Returns the segment after the last `/`, or an empty string (logged as an
/// anomaly) when the path has no `/`. Callers deny empty route names.
///
/// ```
/// use portico_auth::route_name_from_rpc_method;
///
/// assert_eq!(route_name_from_rpc_method("/portico.users.v1.Users/GetUser"), "GetUser");
/// assert_eq!(route_name_from_rpc_method("GetUser"), "");
/// ```
#[must_use]
pub fn route_name_from_rpc_method(method: &str) -> &str {
    match method.rsplit_once('/') {
        Some((_, name)) => name,
        None => {
            tracing::warn!(
                anomaly = true,
                method,
                "rpc method path has no route segment"
            );
            ""
        }
    }
}
