//! Role resolution for a stored credential.
//!
//! `IdentityResolver` has two implementations: `HttpIdentityResolver` talks
//! to the backend, `MockIdentityResolver` reads the role out of mock token
//! text. `resolver_from_config` picks one at construction time.

pub mod client;
pub mod error;
pub mod mock;
pub mod resolver;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Config;

pub use client::HttpIdentityResolver;
pub use error::AuthError;
pub use mock::MockIdentityResolver;
pub use resolver::{Identity, IdentityResolver, Resolution};

/// Build the resolver selected by `config.mock_auth`.
pub fn resolver_from_config(config: &Config) -> Result<Arc<dyn IdentityResolver>> {
    if config.mock_auth {
        info!("Mock auth enabled, roles are inferred from token text");
        Ok(Arc::new(MockIdentityResolver::new()))
    } else {
        info!(base_url = %config.api_base_url(), "Using network identity resolver");
        Ok(Arc::new(HttpIdentityResolver::new(config)?))
    }
}
