//! Discrete writes: timestamped pulse commands and the block/view transitions
//! that carry no command. Everything here is fire-and-forget.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::{
    domain::{BlockId, Command, DisplayId, Timestamp, View, WorkoutId},
    protocol::SessionPatch,
};
use tokio::sync::watch;
use tracing::info;

use crate::ControllerContext;

/// Optimistic "sent" marker shown to the user until it expires on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    pub command: Command,
    pub timestamp: Timestamp,
}

pub struct CommandDispatcher {
    ctx: ControllerContext,
    ack_duration: Duration,
    pending: Arc<watch::Sender<Option<PendingCommand>>>,
    generation: Arc<AtomicU64>,
}

impl CommandDispatcher {
    pub fn new(ctx: ControllerContext, ack_duration: Duration) -> Self {
        let (pending, _) = watch::channel(None);
        Self {
            ctx,
            ack_duration,
            pending: Arc::new(pending),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Writes `command` together with the block it applies to and switches
    /// the display to its timer view. Returns the command timestamp.
    pub async fn send_command(
        &self,
        display_id: &DisplayId,
        active_workout_id: Option<&WorkoutId>,
        command: Command,
        active_block_id: Option<&BlockId>,
    ) -> Timestamp {
        let timestamp = self.ctx.clock.now();
        self.mark_pending(command, timestamp);
        info!(%display_id, command = command.as_str(), %timestamp, "dispatch: sending command");
        self.ctx
            .write(
                display_id,
                SessionPatch {
                    active_workout_id: Some(active_workout_id.cloned()),
                    view: Some(View::Timer),
                    active_block_id: Some(active_block_id.cloned()),
                    command: Some(Some(command)),
                    command_timestamp: Some(timestamp),
                    controller_name: Some(self.ctx.identity.clone()),
                    last_update: Some(timestamp),
                    ..SessionPatch::default()
                },
                "command",
            )
            .await;
        timestamp
    }

    /// A command pulse that leaves view, workout and block untouched.
    pub async fn send_pulse(&self, display_id: &DisplayId, command: Command) -> Timestamp {
        let timestamp = self.ctx.clock.now();
        self.mark_pending(command, timestamp);
        self.ctx
            .write(
                display_id,
                SessionPatch {
                    command: Some(Some(command)),
                    command_timestamp: Some(timestamp),
                    controller_name: Some(self.ctx.identity.clone()),
                    last_update: Some(timestamp),
                    ..SessionPatch::default()
                },
                "pulse",
            )
            .await;
        timestamp
    }

    pub async fn cast_workout(&self, display_id: &DisplayId, workout_id: &WorkoutId) -> bool {
        self.transition(
            display_id,
            SessionPatch {
                active_workout_id: Some(Some(workout_id.clone())),
                view: Some(View::Preview),
                active_block_id: Some(None),
                ..SessionPatch::default()
            },
            "cast_workout",
        )
        .await
    }

    pub async fn load_block(
        &self,
        display_id: &DisplayId,
        workout_id: &WorkoutId,
        block_id: &BlockId,
    ) -> bool {
        self.transition(
            display_id,
            SessionPatch {
                active_workout_id: Some(Some(workout_id.clone())),
                view: Some(View::Timer),
                active_block_id: Some(Some(block_id.clone())),
                ..SessionPatch::default()
            },
            "load_block",
        )
        .await
    }

    pub async fn close_block(
        &self,
        display_id: &DisplayId,
        active_workout_id: Option<&WorkoutId>,
    ) -> bool {
        let patch = match active_workout_id {
            Some(_) => SessionPatch {
                view: Some(View::Preview),
                active_block_id: Some(None),
                ..SessionPatch::default()
            },
            None => SessionPatch {
                view: Some(View::Menu),
                active_block_id: Some(None),
                ..SessionPatch::default()
            },
        };
        self.transition(display_id, patch, "close_block").await
    }

    pub async fn set_view(&self, display_id: &DisplayId, view: View) -> bool {
        self.transition(
            display_id,
            SessionPatch {
                view: Some(view),
                ..SessionPatch::default()
            },
            "set_view",
        )
        .await
    }

    pub fn pending_command(&self) -> Option<PendingCommand> {
        *self.pending.borrow()
    }

    pub fn watch_pending(&self) -> watch::Receiver<Option<PendingCommand>> {
        self.pending.subscribe()
    }

    async fn transition(
        &self,
        display_id: &DisplayId,
        mut patch: SessionPatch,
        what: &'static str,
    ) -> bool {
        patch.last_update = Some(self.ctx.clock.now());
        self.ctx.write(display_id, patch, what).await
    }

    fn mark_pending(&self, command: Command, timestamp: Timestamp) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending
            .send_replace(Some(PendingCommand { command, timestamp }));

        let pending = Arc::clone(&self.pending);
        let current = Arc::clone(&self.generation);
        let ack_duration = self.ack_duration;
        tokio::spawn(async move {
            tokio::time::sleep(ack_duration).await;
            // A newer command owns the flag now.
            if current.load(Ordering::SeqCst) == generation {
                pending.send_replace(None);
            }
        });
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
