use tracing::{debug, info, warn};

use crate::scope::Scope;
use crate::surface::SurfaceCoordinator;

/// A live pipeline service instance bound to exactly one scope.
///
/// The lifecycle owns the single active session for the whole process; no
/// other component keeps a reference past a `refresh` call.
pub trait Session {
    fn scope(&self) -> &Scope;

    /// Tear the session down. Must be safe to call even when the session is
    /// already degraded.
    fn destroy(&mut self);
}

pub trait SessionBackend {
    fn start(&mut self, scope: &Scope) -> Result<Box<dyn Session>, StartError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StartError {
    #[error("a session needs at least a project in its scope; got {scope}")]
    InsufficientScope { scope: Scope },
    #[error("session failed to initialize: {0}")]
    InitFailed(String),
}

enum SessionState {
    Inactive,
    Active(Box<dyn Session>),
    Disabled(String),
}

/// Which branch a `refresh` call took. Tests and logging key off this; the
/// host-facing effect is the session swap plus the surface notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Scope unchanged; the running session was left alone.
    Unchanged,
    Started,
    Disabled,
}

pub struct SessionLifecycle {
    backend: Box<dyn SessionBackend>,
    state: SessionState,
}

impl SessionLifecycle {
    pub fn new(backend: Box<dyn SessionBackend>) -> Self {
        Self {
            backend,
            state: SessionState::Inactive,
        }
    }

    pub fn current_scope(&self) -> Option<&Scope> {
        match &self.state {
            SessionState::Active(session) => Some(session.scope()),
            _ => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.state, SessionState::Disabled(_))
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        match &self.state {
            SessionState::Disabled(reason) => Some(reason),
            _ => None,
        }
    }

    /// Re-point the live session at `new_scope`.
    ///
    /// No-ops when an active session already carries an equal scope; this is
    /// the guard that keeps redundant save/focus events from triggering
    /// expensive restarts. Otherwise the old session is destroyed before a
    /// new one is started; the two are never alive at once.
    pub fn refresh(&mut self, new_scope: Scope, surface: &mut SurfaceCoordinator) -> RefreshOutcome {
        if let SessionState::Active(session) = &self.state
            && session.scope() == &new_scope
        {
            debug!(scope = %new_scope, "scope unchanged; keeping session");
            return RefreshOutcome::Unchanged;
        }

        if let SessionState::Active(session) = &mut self.state {
            info!(scope = %session.scope(), "destroying session");
            session.destroy();
        }
        self.state = SessionState::Inactive;

        match self.backend.start(&new_scope) {
            Ok(session) => {
                info!(scope = %new_scope, "session started");
                self.state = SessionState::Active(session);
                surface.rebuild(&new_scope);
                RefreshOutcome::Started
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(scope = %new_scope, reason, "session start failed; disabling surface");
                self.state = SessionState::Disabled(reason.clone());
                surface.disable(&reason);
                RefreshOutcome::Disabled
            }
        }
    }

    /// Destroy any active session without starting a replacement and without
    /// touching the surface. Used when a prefetch scan ran from a state with
    /// no committed session, and on shutdown.
    pub fn deactivate(&mut self) {
        if let SessionState::Active(session) = &mut self.state {
            info!(scope = %session.scope(), "deactivating session");
            session.destroy();
        }
        self.state = SessionState::Inactive;
    }
}
