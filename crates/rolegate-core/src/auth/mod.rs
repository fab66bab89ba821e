//! Credential persistence and the session model.
//!
//! This module provides:
//! - `Credential` and the `CredentialStore` capability, with keychain, file,
//!   and in-memory backends
//! - `Session`: the four-state view of who is using the app

pub mod credentials;
pub mod file;
pub mod session;

pub use credentials::{Credential, CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
pub use file::FileCredentialStore;
pub use session::{Role, Session, SessionStatus};
