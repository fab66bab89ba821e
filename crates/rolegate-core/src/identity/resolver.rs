use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::{Credential, Role};

use super::AuthError;

/// The user behind a credential, as reported by the identity endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Result of a successful role resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: Identity,
    /// Replacement credential when the resolver had to refresh the access token.
    pub refreshed: Option<Credential>,
}

impl Resolution {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            refreshed: None,
        }
    }
}

/// Turns a credential into a role.
///
/// Mock and network implementations sit behind this one capability; which one
/// is used is decided once, when the resolver is built from `Config`.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the identity behind `credential`.
    ///
    /// Fails with `Unauthorized` when the credential is rejected (including an
    /// empty access token) and `Unreachable` when the answer could not be
    /// obtained.
    async fn resolve(&self, credential: &Credential) -> Result<Resolution, AuthError>;

    /// Exchange email and password for a credential.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Credential, AuthError>;
}
