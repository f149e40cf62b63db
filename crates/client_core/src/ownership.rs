//! Advisory ownership of a display: read, confirm if someone else holds it,
//! write our name, then ignore foreign names for a grace window while the
//! store catches up with our write.

use std::time::Duration;

use shared::{
    domain::DisplayId,
    error::SyncError,
    protocol::{SessionPatch, SessionState},
};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

use crate::ControllerContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTakeover {
    pub display_id: DisplayId,
    pub current_controller: String,
}

impl PendingTakeover {
    pub fn prompt(&self) -> String {
        format!(
            "{} is already connected. Take over?",
            self.current_controller
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    ConfirmationRequired(PendingTakeover),
}

/// Observed after the fact: someone else wrote their name over ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Takeover {
    pub display_id: DisplayId,
    pub by: String,
}

impl Takeover {
    pub fn message(&self) -> String {
        format!("{} has taken over control of this display", self.by)
    }
}

struct Claim {
    display_id: DisplayId,
    claimed_at: Instant,
}

pub struct OwnershipArbiter {
    ctx: ControllerContext,
    grace_window: Duration,
    claim: Mutex<Option<Claim>>,
}

impl OwnershipArbiter {
    pub fn new(ctx: ControllerContext, grace_window: Duration) -> Self {
        Self {
            ctx,
            grace_window,
            claim: Mutex::new(None),
        }
    }

    pub async fn connect(&self, display_id: &DisplayId) -> Result<ConnectOutcome, SyncError> {
        let current = self
            .ctx
            .store
            .read(&self.ctx.organization_id, display_id)
            .await
            .map_err(|source| SyncError::StoreRead {
                display_id: display_id.clone(),
                source,
            })?;

        match current.and_then(|state| state.controller_name) {
            Some(current_controller) if current_controller != self.ctx.identity => {
                info!(
                    %display_id,
                    controller = %self.ctx.identity,
                    %current_controller,
                    "ownership: display already controlled; confirmation required"
                );
                Ok(ConnectOutcome::ConfirmationRequired(PendingTakeover {
                    display_id: display_id.clone(),
                    current_controller,
                }))
            }
            _ => {
                self.claim(display_id).await?;
                Ok(ConnectOutcome::Connected)
            }
        }
    }

    pub async fn confirm_takeover(&self, pending: &PendingTakeover) -> Result<(), SyncError> {
        info!(
            display_id = %pending.display_id,
            controller = %self.ctx.identity,
            previous = %pending.current_controller,
            "ownership: taking over display"
        );
        self.claim(&pending.display_id).await
    }

    pub fn decline_takeover(&self, pending: &PendingTakeover) {
        info!(
            display_id = %pending.display_id,
            controller = %self.ctx.identity,
            "ownership: takeover declined; nothing written"
        );
    }

    /// Returns a takeover once a foreign controller name shows up after the
    /// grace window. The claim is dropped so it is reported only once.
    pub async fn observe(
        &self,
        display_id: &DisplayId,
        state: Option<&SessionState>,
    ) -> Option<Takeover> {
        let mut claim = self.claim.lock().await;
        let claimed_at = match claim.as_ref() {
            Some(claim) if &claim.display_id == display_id => claim.claimed_at,
            _ => return None,
        };
        let by = state?
            .controller_name
            .as_deref()
            .filter(|name| *name != self.ctx.identity)?
            .to_string();

        if claimed_at.elapsed() < self.grace_window {
            debug!(
                %display_id,
                controller = %self.ctx.identity,
                foreign = %by,
                "ownership: ignoring foreign controller inside grace window"
            );
            return None;
        }

        *claim = None;
        info!(
            %display_id,
            controller = %self.ctx.identity,
            by = %by,
            "ownership: control taken over"
        );
        Some(Takeover {
            display_id: display_id.clone(),
            by,
        })
    }

    pub async fn release(&self) {
        *self.claim.lock().await = None;
    }

    pub async fn claimed_display(&self) -> Option<DisplayId> {
        self.claim
            .lock()
            .await
            .as_ref()
            .map(|claim| claim.display_id.clone())
    }

    async fn claim(&self, display_id: &DisplayId) -> Result<(), SyncError> {
        let now = self.ctx.clock.now();
        self.ctx
            .store
            .patch(
                &self.ctx.organization_id,
                display_id,
                SessionPatch {
                    controller_name: Some(self.ctx.identity.clone()),
                    last_update: Some(now),
                    ..SessionPatch::default()
                },
            )
            .await
            .map_err(|source| SyncError::StoreWrite {
                display_id: display_id.clone(),
                source,
            })?;

        *self.claim.lock().await = Some(Claim {
            display_id: display_id.clone(),
            claimed_at: Instant::now(),
        });
        info!(%display_id, controller = %self.ctx.identity, "ownership: claimed display");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/ownership_tests.rs"]
mod tests;
