//! Backend-free identity resolution for development and tests.
//!
//! Mock credentials carry their role in the token text (`mock-access-driver`,
//! `mock-refresh-shipper`), so a restarted app lands in the same section
//! without any server.

use async_trait::async_trait;

use crate::auth::{Credential, Role};

use super::{AuthError, Identity, IdentityResolver, Resolution};

pub const MOCK_USER_ID: &str = "mock-user";

#[derive(Debug, Clone, Copy, Default)]
pub struct MockIdentityResolver;

impl MockIdentityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Role hidden in a piece of text: anything mentioning "driver"
    /// (case-insensitive) is a driver, everything else a shipper.
    pub fn infer_role(text: &str) -> Role {
        if text.to_lowercase().contains("driver") {
            Role::Driver
        } else {
            Role::Shipper
        }
    }

    /// Role for a credential, scanning both tokens.
    pub fn infer_role_from_credential(credential: &Credential) -> Role {
        let refresh = credential.refresh_token.as_deref().unwrap_or_default();
        if Self::infer_role(&credential.access_token) == Role::Driver
            || Self::infer_role(refresh) == Role::Driver
        {
            Role::Driver
        } else {
            Role::Shipper
        }
    }

    pub fn credential_for(role: Role) -> Credential {
        Credential::new(
            format!("mock-access-{}", role),
            Some(format!("mock-refresh-{}", role)),
        )
    }

    pub fn identity_for(role: Role) -> Identity {
        let (email, name) = match role {
            Role::Driver => ("driver@mock.dev", "Mock Driver"),
            Role::Shipper => ("shipper@mock.dev", "Mock Shipper"),
        };
        Identity {
            user_id: MOCK_USER_ID.to_string(),
            role,
            email: Some(email.to_string()),
            name: Some(name.to_string()),
        }
    }
}

#[async_trait]
impl IdentityResolver for MockIdentityResolver {
    async fn resolve(&self, credential: &Credential) -> Result<Resolution, AuthError> {
        credential.validate()?;
        let role = Self::infer_role_from_credential(credential);
        Ok(Resolution::new(Self::identity_for(role)))
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Credential, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.trim().is_empty() {
            return Err(AuthError::Unauthorized);
        }
        Ok(Self::credential_for(Self::infer_role(email)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn role_of(access: &str) -> Result<Role, AuthError> {
        MockIdentityResolver
            .resolve(&Credential::new(access, None))
            .await
            .map(|r| r.identity.role)
    }

    #[tokio::test]
    async fn test_resolve_mock_tokens() {
        assert_eq!(role_of("mock-access-driver").await, Ok(Role::Driver));
        assert_eq!(role_of("mock-access-shipper").await, Ok(Role::Shipper));
        assert_eq!(role_of("mock-access-xyz").await, Ok(Role::Shipper));
        assert_eq!(role_of("").await, Err(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_resolve_is_case_insensitive() {
        assert_eq!(role_of("MOCK-ACCESS-DRIVER").await, Ok(Role::Driver));
        assert_eq!(role_of("Mock-Access-Driver").await, Ok(Role::Driver));
    }

    #[tokio::test]
    async fn test_resolve_scans_refresh_token() {
        let credential = Credential::new("opaque-access", Some("mock-refresh-driver".into()));
        let resolution = MockIdentityResolver.resolve(&credential).await.unwrap();
        assert_eq!(resolution.identity.role, Role::Driver);
        assert_eq!(resolution.identity.user_id, MOCK_USER_ID);
        assert_eq!(resolution.refreshed, None);
    }

    #[tokio::test]
    async fn test_resolve_is_stable() {
        let credential = MockIdentityResolver::credential_for(Role::Driver);
        let first = MockIdentityResolver.resolve(&credential).await.unwrap();
        let second = MockIdentityResolver.resolve(&credential).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_authenticate_infers_role_from_email() {
        let credential = MockIdentityResolver
            .authenticate("Driver@mock.dev", "123456")
            .await
            .unwrap();
        assert_eq!(credential.access_token, "mock-access-driver");
        assert_eq!(credential.refresh_token.as_deref(), Some("mock-refresh-driver"));

        let credential = MockIdentityResolver
            .authenticate("someone@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(credential.access_token, "mock-access-shipper");
    }

    #[tokio::test]
    async fn test_authenticate_requires_email_and_password() {
        assert_eq!(
            MockIdentityResolver.authenticate("", "pw").await,
            Err(AuthError::Unauthorized)
        );
        assert_eq!(
            MockIdentityResolver.authenticate("driver@mock.dev", "  ").await,
            Err(AuthError::Unauthorized)
        );
    }
}
