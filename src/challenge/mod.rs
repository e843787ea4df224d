//! Second-factor challenge coordination
//!
//! A privileged call that hits "step-up required" hands its context to the
//! [`ChallengeCoordinator`] and awaits a [`PendingChallenge`]. The UI side
//! watches [`ChallengeState`], lets the user pick a method, and finishes the
//! session with [`ChallengeCoordinator::complete_challenge`] or
//! [`ChallengeCoordinator::cancel_challenge`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use tokio::sync::{oneshot, watch};

use crate::error::ChallengeError;

pub mod session;
pub mod step_up;

pub use session::{ChallengeContext, ChallengeInput, ChallengeResponse, ChallengeState, MethodKind};
pub use step_up::{Credential, Outcome, run_privileged};

/// The one session a coordinator may hold
struct ActiveSession {
    id: u64,
    context: ChallengeContext,
    selected: MethodKind,
    waiter: oneshot::Sender<Option<ChallengeResponse>>,
}

/// Session slot and observable state, shared with outstanding waiters
struct Shared {
    slot: Mutex<Option<ActiveSession>>,
    state: watch::Sender<ChallengeState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear session `id` if it is still the active one
    fn abandon(&self, id: u64) {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|session| session.id == id) {
            *slot = None;
            self.state.send_replace(ChallengeState::default());
            log::debug!("Challenge abandoned by its caller");
        }
    }
}

/// Owns at most one in-flight challenge.
pub struct ChallengeCoordinator {
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl Default for ChallengeCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeCoordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ChallengeState::default());
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                state,
            }),
            next_id: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.shared.lock()
    }

    /// Begin a session. Fails without touching the current session if one
    /// is already active.
    ///
    /// Dropping the returned [`PendingChallenge`] before it resolves (a
    /// caller-side timeout, an aborted task) ends the session.
    pub fn start_challenge(
        &self,
        context: ChallengeContext,
    ) -> Result<PendingChallenge, ChallengeError> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(ChallengeError::AlreadyActive);
        }
        let selected = *context.methods.first().ok_or(ChallengeError::NoMethods)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (waiter, rx) = oneshot::channel();
        self.shared.state.send_replace(ChallengeState {
            is_challenging: true,
            methods: context.methods.clone(),
            selected_method: Some(selected),
            webauthn: context.webauthn.clone(),
        });
        log::debug!("Challenge started with methods {:?}", context.methods);

        *slot = Some(ActiveSession {
            id,
            context,
            selected,
            waiter,
        });
        Ok(PendingChallenge {
            rx,
            id,
            shared: Arc::downgrade(&self.shared),
        })
    }

    /// Change the method the user intends to answer with
    pub fn select_method(&self, kind: MethodKind) -> Result<(), ChallengeError> {
        let mut slot = self.lock();
        let session = slot.as_mut().ok_or(ChallengeError::NotActive)?;
        if !session.context.methods.contains(&kind) {
            return Err(ChallengeError::MethodUnavailable(kind.to_string()));
        }

        session.selected = kind;
        self.shared.state.send_modify(|s| s.selected_method = Some(kind));
        Ok(())
    }

    /// Resolve the pending caller with the user's answer
    pub fn complete_challenge(&self, input: ChallengeInput) -> Result<(), ChallengeError> {
        let mut slot = self.lock();
        let session = slot.as_ref().ok_or(ChallengeError::NotActive)?;
        if !session.context.methods.contains(&input.kind()) {
            return Err(ChallengeError::MethodUnavailable(input.kind().to_string()));
        }

        let Some(session) = slot.take() else {
            return Err(ChallengeError::NotActive);
        };
        let response = ChallengeResponse::from_input(input, session.context.token);
        self.shared.state.send_replace(ChallengeState::default());
        log::debug!("Challenge completed with {}", response.kind);

        if session.waiter.send(Some(response)).is_err() {
            log::debug!("Challenge caller went away before completion");
        }
        Ok(())
    }

    /// Resolve the pending caller with "declined". Returns false if no
    /// session was active.
    pub fn cancel_challenge(&self) -> bool {
        let Some(session) = self.lock().take() else {
            return false;
        };
        self.shared.state.send_replace(ChallengeState::default());
        log::debug!("Challenge cancelled");

        let _ = session.waiter.send(None);
        true
    }

    /// Current snapshot
    pub fn state(&self) -> ChallengeState {
        self.shared.state.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<ChallengeState> {
        self.shared.state.subscribe()
    }

    pub fn is_challenging(&self) -> bool {
        self.shared.state.borrow().is_challenging
    }

    pub fn selected_method(&self) -> Option<MethodKind> {
        self.shared.state.borrow().selected_method
    }
}

/// Resolves once the active session is completed (`Some`) or cancelled
/// (`None`). No timeout is applied; dropping it gives the session up.
#[derive(Debug)]
pub struct PendingChallenge {
    rx: oneshot::Receiver<Option<ChallengeResponse>>,
    id: u64,
    shared: Weak<Shared>,
}

impl Drop for PendingChallenge {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.abandon(self.id);
        }
    }
}

impl Future for PendingChallenge {
    type Output = Option<ChallengeResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped coordinator counts as a cancellation
        Pin::new(&mut self.rx).poll(cx).map(|r| r.ok().flatten())
    }
}
