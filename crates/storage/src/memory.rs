//! In-process stores: one document per display with change fan-out, and a
//! workout map. Both can be switched offline to exercise failure handling.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use shared::{
    domain::{DisplayId, OrganizationId, WorkoutId},
    protocol::{SessionPatch, SessionState},
    workout::Workout,
};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

use crate::{SessionStore, SessionStream, WorkoutStore};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

type SessionKey = (OrganizationId, DisplayId);

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Patch(SessionPatch),
    Clear,
}

/// One accepted write, in the order the store applied it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreWrite {
    pub organization_id: OrganizationId,
    pub display_id: DisplayId,
    pub op: WriteOp,
}

struct Slot {
    state: Option<SessionState>,
    changes: broadcast::Sender<Option<SessionState>>,
}

impl Slot {
    fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: None,
            changes,
        }
    }

    fn publish(&self) {
        // No subscribers is fine; the document is still updated.
        let _ = self.changes.send(self.state.clone());
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    slots: Mutex<HashMap<SessionKey, Slot>>,
    write_log: Mutex<Vec<StoreWrite>>,
    unavailable: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, reads and writes fail as if the network were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn write_log(&self) -> Vec<StoreWrite> {
        self.write_log.lock().await.clone()
    }

    pub async fn writes_for(&self, display_id: &DisplayId) -> Vec<WriteOp> {
        self.write_log
            .lock()
            .await
            .iter()
            .filter(|write| &write.display_id == display_id)
            .map(|write| write.op.clone())
            .collect()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("session store unavailable");
        }
        Ok(())
    }

    async fn record(&self, organization_id: &OrganizationId, display_id: &DisplayId, op: WriteOp) {
        self.write_log.lock().await.push(StoreWrite {
            organization_id: organization_id.clone(),
            display_id: display_id.clone(),
            op,
        });
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn read(
        &self,
        organization_id: &OrganizationId,
        display_id: &DisplayId,
    ) -> Result<Option<SessionState>> {
        self.ensure_available()?;
        let slots = self.slots.lock().await;
        Ok(slots
            .get(&(organization_id.clone(), display_id.clone()))
            .and_then(|slot| slot.state.clone()))
    }

    async fn patch(
        &self,
        organization_id: &OrganizationId,
        display_id: &DisplayId,
        patch: SessionPatch,
    ) -> Result<()> {
        self.ensure_available()?;
        {
            let mut slots = self.slots.lock().await;
            let slot = slots
                .entry((organization_id.clone(), display_id.clone()))
                .or_insert_with(Slot::new);
            slot.state
                .get_or_insert_with(SessionState::default)
                .apply(&patch);
            slot.publish();
        }
        debug!(%organization_id, %display_id, "session store: applied patch");
        self.record(organization_id, display_id, WriteOp::Patch(patch))
            .await;
        Ok(())
    }

    async fn clear(
        &self,
        organization_id: &OrganizationId,
        display_id: &DisplayId,
    ) -> Result<()> {
        self.ensure_available()?;
        {
            let mut slots = self.slots.lock().await;
            let slot = slots
                .entry((organization_id.clone(), display_id.clone()))
                .or_insert_with(Slot::new);
            slot.state = None;
            slot.publish();
        }
        debug!(%organization_id, %display_id, "session store: cleared session");
        self.record(organization_id, display_id, WriteOp::Clear).await;
        Ok(())
    }

    async fn subscribe(
        &self,
        organization_id: &OrganizationId,
        display_id: &DisplayId,
    ) -> Result<SessionStream> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .entry((organization_id.clone(), display_id.clone()))
            .or_insert_with(Slot::new);
        let current = slot.state.clone();
        let display_id = display_id.clone();
        let changes =
            BroadcastStream::new(slot.changes.subscribe()).filter_map(move |item| {
                let display_id = display_id.clone();
                async move {
                    match item {
                        Ok(state) => Some(state),
                        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                            warn!(%display_id, skipped, "session subscriber lagged; older snapshots dropped");
                            None
                        }
                    }
                }
            });
        Ok(stream::once(async move { current }).chain(changes).boxed())
    }
}

#[derive(Default)]
pub struct MemoryWorkoutStore {
    workouts: Mutex<HashMap<WorkoutId, Workout>>,
    unavailable: AtomicBool,
}

impl MemoryWorkoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn contains(&self, workout_id: &WorkoutId) -> bool {
        self.workouts.lock().await.contains_key(workout_id)
    }

    pub async fn len(&self) -> usize {
        self.workouts.lock().await.len()
    }
}

#[async_trait]
impl WorkoutStore for MemoryWorkoutStore {
    async fn save(&self, workout: &Workout) -> Result<WorkoutId> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("workout store unavailable");
        }
        self.workouts
            .lock()
            .await
            .insert(workout.id.clone(), workout.clone());
        Ok(workout.id.clone())
    }

    async fn load(&self, workout_id: &WorkoutId) -> Result<Option<Workout>> {
        Ok(self.workouts.lock().await.get(workout_id).cloned())
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
