use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the marketplace a user belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Driver,
    Shipper,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Shipper => "shipper",
        }
    }

    /// Parse a role exactly as the backend spells it.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "driver" => Some(Role::Driver),
            "shipper" => Some(Role::Shipper),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse authentication status, as seen by screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Checking,
    Unauthenticated,
    Authenticated,
}

/// Who is using the app right now.
///
/// A role only exists inside `AuthenticatedWithRole`, so a role can never be
/// observed without an authenticated status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Checking,
    Unauthenticated,
    AuthenticatedPendingRole,
    AuthenticatedWithRole { role: Role, user_id: String },
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        match self {
            Session::Checking => SessionStatus::Checking,
            Session::Unauthenticated => SessionStatus::Unauthenticated,
            Session::AuthenticatedPendingRole | Session::AuthenticatedWithRole { .. } => {
                SessionStatus::Authenticated
            }
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Session::AuthenticatedWithRole { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Session::AuthenticatedWithRole { user_id, .. } => Some(user_id.as_str()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Checking => f.write_str("checking"),
            Session::Unauthenticated => f.write_str("unauthenticated"),
            Session::AuthenticatedPendingRole => f.write_str("authenticated (role pending)"),
            Session::AuthenticatedWithRole { role, user_id } => {
                write!(f, "authenticated as {} ({})", role, user_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_exact() {
        assert_eq!(Role::parse("driver"), Some(Role::Driver));
        assert_eq!(Role::parse(" shipper "), Some(Role::Shipper));
        assert_eq!(Role::parse("Driver"), None);
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Driver).unwrap(), "\"driver\"");
        let role: Role = serde_json::from_str("\"shipper\"").unwrap();
        assert_eq!(role, Role::Shipper);
    }

    #[test]
    fn test_session_accessors() {
        assert_eq!(Session::default(), Session::Checking);
        assert_eq!(Session::Checking.role(), None);
        assert_eq!(Session::AuthenticatedPendingRole.status(), SessionStatus::Authenticated);
        assert_eq!(Session::AuthenticatedPendingRole.role(), None);

        let session = Session::AuthenticatedWithRole {
            role: Role::Driver,
            user_id: "u1".to_string(),
        };
        assert_eq!(session.status(), SessionStatus::Authenticated);
        assert_eq!(session.role(), Some(Role::Driver));
        assert_eq!(session.user_id(), Some("u1"));
        assert!(!Session::Unauthenticated.is_authenticated());
    }
}
