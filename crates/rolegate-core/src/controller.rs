//! The session state machine.
//!
//! `SessionController` is the only writer of the shared `Session`. Screens
//! hold a `watch::Receiver<Session>` from `subscribe()` and react to changes.
//!
//! ```text
//!   Checking --bootstrap--> Unauthenticated <----------------------+
//!      |                        |                                  |
//!      | (stored credential)    | login                            | logout / rejected
//!      v                        v                                  |
//!   AuthenticatedPendingRole --resolved--> AuthenticatedWithRole --+
//!      ^          |
//!      +----------+ unreachable (retry with backoff)
//! ```
//!
//! Role resolution runs as a background task and reports back over an MPSC
//! channel. The host drains results with `check_background_tasks` or awaits
//! them with `wait_for_resolution`. Each authenticated episode carries a
//! generation number, so a result that arrives after logout is dropped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{Credential, CredentialStore, Session};
use crate::config::Config;
use crate::error::SessionError;
use crate::identity::{self, AuthError, IdentityResolver, Resolution};
use crate::retry::RetryPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the resolution result channel.
/// At most one resolve task is live per episode; the slack absorbs stale ones.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Result of one background resolve attempt.
#[derive(Debug)]
struct ResolveOutcome {
    generation: u64,
    result: Result<Resolution, AuthError>,
}

pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    resolver: Arc<dyn IdentityResolver>,
    retry: RetryPolicy,

    session_tx: watch::Sender<Session>,

    // Background task channel
    outcome_tx: mpsc::Sender<ResolveOutcome>,
    outcome_rx: mpsc::Receiver<ResolveOutcome>,
    task: Option<JoinHandle<()>>,

    generation: u64,
    /// Credential of the current authenticated episode, kept for retries.
    episode_credential: Option<Credential>,
    /// A resolve for the current generation is scheduled or running.
    awaiting: bool,
    /// Consecutive transient failures in this episode
    failures: u32,
    bootstrapped: bool,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        resolver: Arc<dyn IdentityResolver>,
        retry: RetryPolicy,
    ) -> Self {
        let (session_tx, _) = watch::channel(Session::Checking);
        let (outcome_tx, outcome_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Self {
            store,
            resolver,
            retry,
            session_tx,
            outcome_tx,
            outcome_rx,
            task: None,
            generation: 0,
            episode_credential: None,
            awaiting: false,
            failures: 0,
            bootstrapped: false,
        }
    }

    /// Wire up the store, resolver, and retry policy named by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = config.credential_store()?;
        let resolver = identity::resolver_from_config(config)?;
        Ok(Self::new(store, resolver, RetryPolicy::from(&config.retry)))
    }

    /// Receiver that observes every published session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session_tx.subscribe()
    }

    pub fn session(&self) -> Session {
        self.session_tx.borrow().clone()
    }

    /// Current episode number. Changes on every login, bootstrap with a
    /// stored credential, logout, and rejection.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a role resolution is scheduled or running.
    pub fn is_resolving(&self) -> bool {
        self.awaiting
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Read the stored credential and leave `Checking`. Fires once per process.
    pub fn bootstrap(&mut self) -> Result<(), SessionError> {
        if self.bootstrapped {
            return Err(SessionError::AlreadyBootstrapped);
        }
        self.bootstrapped = true;

        match self.store.load() {
            Some(credential) => {
                debug!("Stored credential found");
                self.begin_episode(credential);
            }
            None => {
                debug!("No stored credential");
                self.transition(Session::Unauthenticated);
            }
        }
        Ok(())
    }

    /// Accept a credential and start resolving its role.
    ///
    /// The credential is persisted first. If that fails the session stays
    /// `Unauthenticated`.
    pub fn login(&mut self, credential: Credential) -> Result<(), SessionError> {
        self.require_unauthenticated("login")?;

        if let Err(e) = self.store.save(&credential) {
            warn!(error = %e, "Failed to persist credential");
            return Err(SessionError::Persist(format!("{:#}", e)));
        }
        self.begin_episode(credential);
        Ok(())
    }

    /// Exchange email and password for a credential, then `login` with it.
    ///
    /// On failure the session stays `Unauthenticated` and the error is returned
    /// for display.
    pub async fn login_with_password(&mut self, email: &str, password: &str) -> Result<(), SessionError> {
        self.require_unauthenticated("login")?;

        let credential = self.resolver.authenticate(email, password).await.map_err(|e| {
            warn!(error = %e, "Sign-in failed");
            SessionError::SignIn(e)
        })?;
        self.login(credential)
    }

    /// Clear the stored credential, then drop to `Unauthenticated`.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        let current = self.session();
        if !current.is_authenticated() {
            return Err(SessionError::EventRejected {
                event: "logout",
                state: current,
            });
        }

        // Credential goes first so nobody sees "authenticated" with nothing stored
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
        self.end_episode();
        self.transition(Session::Unauthenticated);
        Ok(())
    }

    /// Skip the backoff wait and resolve again right away.
    ///
    /// Returns `false` when the session is not waiting on a role.
    pub fn retry_now(&mut self) -> bool {
        if self.session() != Session::AuthenticatedPendingRole {
            return false;
        }
        let Some(credential) = self.episode_credential.clone() else {
            return false;
        };
        debug!(failures = self.failures, "Retrying role resolution now");
        self.spawn_resolve(credential, Duration::ZERO);
        true
    }

    // =========================================================================
    // Background results
    // =========================================================================

    /// Apply every resolution result that has already arrived, without waiting.
    pub fn check_background_tasks(&mut self) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.apply_outcome(outcome);
        }
    }

    /// Wait until the pending role is settled, or nothing more is scheduled.
    ///
    /// Returns immediately when no resolution is in flight. While the identity
    /// endpoint stays unreachable and retries are unbounded this keeps waiting.
    pub async fn wait_for_resolution(&mut self) -> Session {
        while self.awaiting && self.session() == Session::AuthenticatedPendingRole {
            match self.outcome_rx.recv().await {
                Some(outcome) => self.apply_outcome(outcome),
                None => break,
            }
        }
        self.session()
    }

    fn apply_outcome(&mut self, outcome: ResolveOutcome) {
        if outcome.generation != self.generation || self.session() != Session::AuthenticatedPendingRole {
            debug!(
                outcome_generation = outcome.generation,
                generation = self.generation,
                "Discarding stale role resolution"
            );
            return;
        }
        self.awaiting = false;

        match outcome.result {
            Ok(resolution) => {
                if let Some(ref refreshed) = resolution.refreshed {
                    if let Err(e) = self.store.save(refreshed) {
                        warn!(error = %e, "Failed to persist refreshed credential");
                    }
                }
                self.failures = 0;
                self.episode_credential = None;
                self.transition(Session::AuthenticatedWithRole {
                    role: resolution.identity.role,
                    user_id: resolution.identity.user_id,
                });
            }
            Err(e) if e.is_transient() => {
                self.failures = self.failures.saturating_add(1);
                let Some(credential) = self.episode_credential.clone() else {
                    return;
                };
                if self.retry.should_retry(self.failures) {
                    let delay = self.retry.delay_for(self.failures);
                    warn!(
                        error = %e,
                        attempt = self.failures,
                        delay_ms = delay.as_millis() as u64,
                        "Role resolution failed, retrying"
                    );
                    self.spawn_resolve(credential, delay);
                } else {
                    warn!(error = %e, attempts = self.failures, "Role resolution retries exhausted, staying pending");
                }
            }
            Err(e) => {
                info!(error = %e, "Credential rejected, signing out");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear rejected credential");
                }
                self.end_episode();
                self.transition(Session::Unauthenticated);
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_unauthenticated(&self, event: &'static str) -> Result<(), SessionError> {
        let current = self.session();
        if current != Session::Unauthenticated {
            return Err(SessionError::EventRejected { event, state: current });
        }
        Ok(())
    }

    fn begin_episode(&mut self, credential: Credential) {
        self.generation += 1;
        self.failures = 0;
        self.episode_credential = Some(credential.clone());
        self.transition(Session::AuthenticatedPendingRole);
        self.spawn_resolve(credential, Duration::ZERO);
    }

    fn end_episode(&mut self) {
        self.generation += 1;
        self.failures = 0;
        self.awaiting = false;
        self.episode_credential = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn spawn_resolve(&mut self, credential: Credential, delay: Duration) {
        let resolver = Arc::clone(&self.resolver);
        let tx = self.outcome_tx.clone();
        let generation = self.generation;

        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = resolver.resolve(&credential).await;
            if tx.send(ResolveOutcome { generation, result }).await.is_err() {
                debug!("Session controller gone before resolution finished");
            }
        });

        if let Some(previous) = self.task.replace(handle) {
            previous.abort();
        }
        self.awaiting = true;
    }

    fn transition(&self, next: Session) {
        let previous = self.session();
        if previous == next {
            return;
        }
        info!(from = %previous, to = %next, generation = self.generation, "Session transition");
        self.session_tx.send_replace(next);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
