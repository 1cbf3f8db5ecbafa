//! # Session Gate
//!
//! The precondition gate requiring an open cash register session before any
//! settlement proceeds.
//!
//! ## Gate States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Checking ──refresh()──► Open(session)   sales surface enabled        │
//! │       │                        ▲                                        │
//! │       │                        │ session opened                         │
//! │       └──refresh()──────► Gated ◄── query error / closed / none        │
//! │                                                                         │
//! │   Gated has exactly one exit: opening a session (host action), then    │
//! │   refresh(). Failure to query is treated as Gated — FAIL CLOSED.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, warn};

use atlas_core::CashRegisterSession;

use crate::error::{CheckoutError, CheckoutResult};
use crate::events::{CheckoutEvent, EventBus};
use crate::repository::RepositoryResult;

// =============================================================================
// Session Provider
// =============================================================================

/// External collaborator answering "is there an open register session?".
///
/// This core never opens or closes sessions; it only reads.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the current session for this terminal, if any.
    async fn current_session(&self) -> RepositoryResult<Option<CashRegisterSession>>;
}

// =============================================================================
// Gate State
// =============================================================================

/// Where the gate currently stands.
#[derive(Debug, Clone)]
pub enum SessionGateState {
    /// Initial state, before the first query resolves.
    Checking,
    /// No open session: the entire sales surface is blocked.
    Gated,
    /// An open session exists; sales may proceed.
    Open(CashRegisterSession),
}

impl SessionGateState {
    /// True when sales may proceed.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionGateState::Open(_))
    }
}

// =============================================================================
// Session Guard
// =============================================================================

/// Fail-closed gate over the [`SessionProvider`].
pub struct SessionGuard {
    provider: Arc<dyn SessionProvider>,
    state: Mutex<SessionGateState>,
    events: EventBus,
}

impl SessionGuard {
    /// Creates a guard in the `Checking` state.
    pub fn new(provider: Arc<dyn SessionProvider>, events: EventBus) -> Self {
        SessionGuard {
            provider,
            state: Mutex::new(SessionGateState::Checking),
            events,
        }
    }

    /// Current gate state (cloned snapshot).
    pub fn state(&self) -> SessionGateState {
        self.state.lock().expect("session gate mutex poisoned").clone()
    }

    /// Re-queries the provider and updates the gate.
    ///
    /// Any query failure gates the surface: a terminal that cannot prove an
    /// open session must not take sales.
    pub async fn refresh(&self) -> SessionGateState {
        let next = match self.provider.current_session().await {
            Ok(Some(session)) if session.is_open() => {
                debug!(session_id = %session.id, "register session open");
                SessionGateState::Open(session)
            }
            Ok(Some(session)) => {
                debug!(session_id = %session.id, "register session is closed; gating");
                SessionGateState::Gated
            }
            Ok(None) => {
                debug!("no register session; gating");
                SessionGateState::Gated
            }
            Err(err) => {
                warn!(error = %err, "session query failed; gating (fail closed)");
                SessionGateState::Gated
            }
        };

        let changed_to_open = {
            let mut state = self.state.lock().expect("session gate mutex poisoned");
            let was_open = state.is_open();
            let is_open = next.is_open();
            *state = next.clone();
            (was_open != is_open).then_some(is_open)
        };

        if let Some(open) = changed_to_open {
            self.events.publish(CheckoutEvent::SessionGateChanged { open });
        }

        next
    }

    /// The settlement precondition: yields the open session or
    /// [`CheckoutError::SessionRequired`].
    ///
    /// A guard still in `Checking` refreshes first rather than guessing.
    pub async fn ensure_open(&self) -> CheckoutResult<CashRegisterSession> {
        if matches!(self.state(), SessionGateState::Checking) {
            self.refresh().await;
        }

        match self.state() {
            SessionGateState::Open(session) => Ok(session),
            _ => Err(CheckoutError::SessionRequired),
        }
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
