//! Controller side of the display remote-control protocol.
//!
//! A controller drives one display by writing partial patches into that
//! display's shared session document and reacting to the snapshots the store
//! pushes back. Ownership is advisory and last-write-wins; ordering between
//! writes is carried by timestamps from [`MonotonicClock`].

use std::sync::Arc;

use shared::{
    domain::{DisplayId, OrganizationId},
    protocol::SessionPatch,
};
use storage::SessionStore;
use tracing::{debug, warn};

pub mod clock;
pub mod config;
mod debounce;
mod dispatcher;
mod freestanding;
mod machine;
mod ownership;
mod strokes;

pub use clock::MonotonicClock;
pub use config::{load_settings, ControllerSettings};
pub use debounce::SettingsDebouncer;
pub use dispatcher::{CommandDispatcher, PendingCommand};
pub use freestanding::FreestandingTimer;
pub use machine::{ControllerAction, ControllerEvent, ControllerView, Selection, SessionViewMachine};
pub use ownership::{ConnectOutcome, OwnershipArbiter, PendingTakeover, Takeover};
pub use strokes::{DrawingStrokeBroadcaster, DEFAULT_STROKE_COLOR};

/// What every component of one controller process shares.
#[derive(Clone)]
pub struct ControllerContext {
    pub organization_id: OrganizationId,
    pub identity: String,
    pub store: Arc<dyn SessionStore>,
    pub clock: Arc<MonotonicClock>,
}

impl ControllerContext {
    pub fn new(
        organization_id: OrganizationId,
        identity: impl Into<String>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            organization_id,
            identity: identity.into(),
            store,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    pub(crate) async fn write(
        &self,
        display_id: &DisplayId,
        patch: SessionPatch,
        what: &'static str,
    ) -> bool {
        match self
            .store
            .patch(&self.organization_id, display_id, patch)
            .await
        {
            Ok(()) => {
                debug!(%display_id, controller = %self.identity, write = what, "session write applied");
                true
            }
            Err(error) => {
                warn!(
                    %display_id,
                    controller = %self.identity,
                    write = what,
                    %error,
                    "dropping failed session write"
                );
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
