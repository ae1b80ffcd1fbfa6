//! Shared run session and its release discipline.
//!
//! This module provides:
//! - `Session` and `SessionFactory`, the seam for the mandatory shared session
//! - `SessionSlot`, which hands the session out for release exactly once
//! - `WorkspaceSession`, the filesystem-backed session used by the CLI

mod workspace;

pub use workspace::{WorkspaceSession, WorkspaceSessionFactory, LOCK_FILE_NAME};

use crate::context::RunIdentity;
use crate::errors::DevflowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A resource held for the whole run and released at the end.
#[async_trait]
pub trait Session: Send + Sync + Debug {
    /// Short label for logs.
    fn label(&self) -> &str;

    /// Releases the resource.
    async fn release(&self) -> Result<(), DevflowError>;
}

/// Opens the session at the start of a run.
#[async_trait]
pub trait SessionFactory: Send + Sync + Debug {
    /// Opens a session for the run.
    ///
    /// A failure here is fatal for the run.
    async fn open(
        &self,
        identity: &RunIdentity,
        output_dir: &Path,
    ) -> Result<Arc<dyn Session>, DevflowError>;
}

/// Holds the open session until it is released.
///
/// `release` takes the handle out before awaiting, so concurrent or repeated
/// calls find the slot empty and return without touching the session again.
#[derive(Default)]
pub struct SessionSlot {
    session: Mutex<Option<Arc<dyn Session>>>,
}

impl SessionSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session, returning any session it replaced.
    pub fn install(&self, session: Arc<dyn Session>) -> Option<Arc<dyn Session>> {
        self.session.lock().replace(session)
    }

    /// Returns true while a session is held.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Releases the held session, if any.
    ///
    /// Release faults are logged and swallowed. Returns true if a session was
    /// released by this call.
    pub async fn release(&self) -> bool {
        let Some(session) = self.session.lock().take() else {
            debug!("No session to release");
            return false;
        };
        if let Err(e) = session.release().await {
            warn!(session = %session.label(), error = %e, "Session release failed");
        } else {
            debug!(session = %session.label(), "Session released");
        }
        true
    }
}

impl std::fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSlot")
            .field("held", &self.is_held())
            .finish()
    }
}
