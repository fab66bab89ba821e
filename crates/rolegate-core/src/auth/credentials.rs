use std::fmt;
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::identity::AuthError;

const SERVICE_NAME: &str = "rolegate";

/// Both tokens live in one entry so a save replaces them together
const CREDENTIAL_KEY: &str = "auth.credential";

/// Opaque access/refresh token pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    /// Basic shape check performed by resolvers before using a credential.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::Unauthorized);
        }
        if !is_token_shaped(&self.access_token) {
            return Err(AuthError::MalformedCredential(
                "access token contains whitespace or control characters".to_string(),
            ));
        }
        if let Some(ref refresh) = self.refresh_token {
            if refresh.trim().is_empty() || !is_token_shaped(refresh) {
                return Err(AuthError::MalformedCredential(
                    "refresh token is blank or contains whitespace".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn is_token_shaped(token: &str) -> bool {
    !token.chars().any(|c| c.is_whitespace() || c.is_control())
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Durable home of the persisted credential.
///
/// `load` never fails: unreadable storage is logged and reported as absent.
/// `clear` on an empty store is a no-op. No shape validation happens here.
pub trait CredentialStore: Send + Sync {
    fn save(&self, credential: &Credential) -> Result<()>;
    fn load(&self) -> Option<Credential>;
    fn clear(&self) -> Result<()>;
}

/// Credential storage in the OS keychain
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, CREDENTIAL_KEY).context("Failed to create keyring entry")
    }

    fn read(&self) -> Result<Option<Credential>> {
        match self.entry()?.get_password() {
            Ok(raw) => decode_entry(&raw).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }
}

fn decode_entry(raw: &str) -> Result<Credential> {
    serde_json::from_str(raw).context("Failed to parse credential stored in keychain")
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save(&self, credential: &Credential) -> Result<()> {
        let raw = serde_json::to_string(credential)?;
        self.entry()?
            .set_password(&raw)
            .context("Failed to store credential in keychain")
    }

    fn load(&self) -> Option<Credential> {
        match self.read() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Failed to load credential");
                None
            }
        }
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

/// Process-local store. Used when no durable backend is configured and in tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, credential: &Credential) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("credential slot poisoned"))?;
        *slot = Some(credential.clone());
        Ok(())
    }

    fn load(&self) -> Option<Credential> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("credential slot poisoned"))?;
        *slot = None;
        Ok(())
    }
}
