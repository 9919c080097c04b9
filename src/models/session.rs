//! Conversation session and its single-flight guard.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::descriptor;

/// Mutable per-session state, only touched under the session lock.
#[derive(Debug, Default)]
struct SessionState {
    /// Whether a query is currently in flight.
    busy: bool,
    /// Descriptor written for the in-flight query, if any.
    descriptor: Option<PathBuf>,
}

/// One logical conversation.
///
/// Owned by whichever component serves the conversation and never shared
/// across conversations. At most one query runs per session at a time; see
/// [`Session::try_begin`].
#[derive(Debug)]
pub struct Session {
    id: String,
    state: Mutex<SessionState>,
}

impl Session {
    /// Create an idle session.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Opaque session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether a query is currently in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    /// Descriptor path of the in-flight query, if one has been materialized.
    #[must_use]
    pub fn descriptor_path(&self) -> Option<PathBuf> {
        self.lock().descriptor.clone()
    }

    /// Mark the session busy and return a guard that releases it.
    ///
    /// Returns `None` when a query is already in flight; the caller drops the
    /// new query rather than queuing it.
    #[must_use]
    pub fn try_begin(&self) -> Option<InFlight<'_>> {
        let mut state = self.lock();
        if state.busy {
            return None;
        }
        state.busy = true;
        Some(InFlight { session: self })
    }

    /// Tear down the session, discarding any descriptor still on disk.
    pub fn close(&self) {
        let leftover = self.lock().descriptor.take();
        if let Some(path) = leftover {
            discard_logged(&self.id, &path);
        }
        debug!(session_id = %self.id, "session closed");
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that the owning session is busy with one query.
///
/// Dropping the guard discards the attached descriptor and clears the busy
/// flag, on every exit path including unwinding.
#[derive(Debug)]
pub struct InFlight<'a> {
    session: &'a Session,
}

impl InFlight<'_> {
    /// Session this query runs for.
    #[must_use]
    pub fn session(&self) -> &Session {
        self.session
    }

    /// Record the descriptor written for this query so it is discarded on release.
    pub fn attach_descriptor(&self, path: PathBuf) {
        self.session.lock().descriptor = Some(path);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        if let Some(path) = state.descriptor.take() {
            discard_logged(&self.session.id, &path);
        }
        state.busy = false;
    }
}

fn discard_logged(session_id: &str, path: &Path) {
    if let Err(err) = descriptor::discard(path) {
        warn!(session_id, path = %path.display(), %err, "failed to discard tool descriptor");
    }
}
