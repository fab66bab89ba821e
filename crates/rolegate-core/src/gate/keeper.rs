use tokio::sync::watch;
use tracing::debug;

use crate::auth::Session;

use super::policy::{evaluate, Decision, Section};

/// Imperative "go to this section" capability supplied by the host.
///
/// Fire-and-forget: the gatekeeper never waits on or inspects the result.
pub trait Navigator: Send + Sync {
    fn redirect_to(&self, section: Section);
}

/// Applies gate decisions for whichever section is mounted.
///
/// Holds no session state of its own; every call to `observe` is a pure
/// evaluation followed by at most one redirect.
pub struct Gatekeeper<N> {
    mounted: Section,
    navigator: N,
}

impl<N: Navigator> Gatekeeper<N> {
    pub fn new(mounted: Section, navigator: N) -> Self {
        Self { mounted, navigator }
    }

    pub fn mounted(&self) -> Section {
        self.mounted
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Evaluate `session` for the mounted section and carry out a redirect.
    ///
    /// Returns the decision of the section that was mounted when called. After
    /// a redirect the target section is mounted, so observing the same session
    /// again does not redirect a second time.
    pub fn observe(&mut self, session: &Session) -> Decision {
        let decision = evaluate(self.mounted, session);
        if let Decision::RedirectTo(target) = decision {
            if target != self.mounted {
                debug!(from = %self.mounted, to = %target, "Redirecting");
                self.navigator.redirect_to(target);
                self.mounted = target;
            }
        }
        decision
    }

    /// Follow session changes until the mounted section renders.
    ///
    /// Returns the section that rendered, or `None` if the session sender was
    /// dropped first.
    pub async fn run_until_render(&mut self, rx: &mut watch::Receiver<Session>) -> Option<Section> {
        loop {
            let session = rx.borrow_and_update().clone();
            match self.observe(&session) {
                Decision::Render => return Some(self.mounted),
                // Re-evaluate the section we just mounted against the same session
                Decision::RedirectTo(_) => continue,
                Decision::ShowLoading => {}
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }
}
