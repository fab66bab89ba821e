//! Session and role gating for a two-sided (driver / shipper) app.
//!
//! The pieces, leaves first:
//!
//! - [`auth`]: the persisted [`Credential`] and the four-state [`Session`]
//! - [`identity`]: turns a credential into a [`Role`], over the network or
//!   from mock token text
//! - [`controller`]: [`SessionController`], the single writer of the session
//! - [`gate`]: pure per-section decisions and the [`Gatekeeper`] that issues
//!   redirects
//!
//! A typical host bootstraps the controller, hands `controller.subscribe()`
//! to the gatekeeper of the mounted section, and drains background results on
//! its event loop.

pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod identity;
pub mod retry;

pub use auth::{Credential, CredentialStore, Role, Session, SessionStatus};
pub use config::Config;
pub use controller::SessionController;
pub use error::SessionError;
pub use gate::{evaluate, Decision, Gatekeeper, Navigator, Section};
pub use identity::{AuthError, Identity, IdentityResolver, Resolution};
pub use retry::RetryPolicy;
