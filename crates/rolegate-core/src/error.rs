use thiserror::Error;

use crate::auth::Session;
use crate::identity::AuthError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{event} is not accepted while {state}")]
    EventRejected { event: &'static str, state: Session },

    #[error("Session already bootstrapped")]
    AlreadyBootstrapped,

    #[error("Sign-in failed: {0}")]
    SignIn(#[from] AuthError),

    #[error("Failed to persist credential: {0}")]
    Persist(String),
}
