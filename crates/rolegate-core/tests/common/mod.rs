#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rolegate_core::auth::{MemoryCredentialStore, Role};
use rolegate_core::gate::{Navigator, Section};
use rolegate_core::identity::MockIdentityResolver;
use rolegate_core::{AuthError, Credential, CredentialStore, Identity, IdentityResolver, Resolution, Session};
use tokio::sync::{watch, Notify};

pub fn identity(role: Role, user_id: &str) -> Resolution {
    Resolution::new(Identity {
        user_id: user_id.to_string(),
        role,
        email: None,
        name: None,
    })
}

/// Resolver that answers from a script, then from a fallback.
pub struct ScriptedResolver {
    script: Mutex<VecDeque<Result<Resolution, AuthError>>>,
    fallback: Mutex<Result<Resolution, AuthError>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedResolver {
    pub fn new(fallback: Result<Resolution, AuthError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Every resolve blocks until `gate` is notified.
    pub fn gated(fallback: Result<Resolution, AuthError>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(fallback)
        }
    }

    pub fn push(&self, answer: Result<Resolution, AuthError>) {
        self.script.lock().unwrap().push_back(answer);
    }

    pub fn set_fallback(&self, answer: Result<Resolution, AuthError>) {
        *self.fallback.lock().unwrap() = answer;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityResolver for ScriptedResolver {
    async fn resolve(&self, credential: &Credential) -> Result<Resolution, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        credential.validate()?;
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Credential, AuthError> {
        MockIdentityResolver.authenticate(email, password).await
    }
}

/// Memory store that records what the session looked like at each `clear`.
#[derive(Default)]
pub struct WitnessStore {
    inner: MemoryCredentialStore,
    observer: Mutex<Option<watch::Receiver<Session>>>,
    pub seen_at_clear: Mutex<Vec<Session>>,
}

impl WitnessStore {
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            inner: MemoryCredentialStore::with_credential(credential),
            ..Self::default()
        }
    }

    pub fn watch(&self, rx: watch::Receiver<Session>) {
        *self.observer.lock().unwrap() = Some(rx);
    }
}

impl CredentialStore for WitnessStore {
    fn save(&self, credential: &Credential) -> anyhow::Result<()> {
        self.inner.save(credential)
    }

    fn load(&self) -> Option<Credential> {
        self.inner.load()
    }

    fn clear(&self) -> anyhow::Result<()> {
        if let Some(ref rx) = *self.observer.lock().unwrap() {
            self.seen_at_clear.lock().unwrap().push(rx.borrow().clone());
        }
        self.inner.clear()
    }
}

#[derive(Clone, Default)]
pub struct RecordingNavigator {
    redirects: Arc<Mutex<Vec<Section>>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<Section> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to(&self, section: Section) {
        self.redirects.lock().unwrap().push(section);
    }
}
