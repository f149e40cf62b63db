//! Slider updates are applied locally at once and written to the store as a
//! single trailing write per debounce window.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use shared::{
    domain::{DisplayId, SettingKey, ViewerSettings},
    protocol::SessionPatch,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info};

use crate::ControllerContext;

#[derive(Clone)]
pub struct SettingsDebouncer {
    inner: Arc<DebouncerInner>,
}

struct DebouncerInner {
    ctx: ControllerContext,
    delay: Duration,
    state: Mutex<DebounceState>,
}

#[derive(Default)]
struct DebounceState {
    local: ViewerSettings,
    remote: ViewerSettings,
    pending: BTreeMap<SettingKey, f64>,
    display_id: Option<DisplayId>,
    timer: Option<JoinHandle<()>>,
}

impl DebounceState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl SettingsDebouncer {
    pub fn new(ctx: ControllerContext, delay: Duration) -> Self {
        Self {
            inner: Arc::new(DebouncerInner {
                ctx,
                delay,
                state: Mutex::new(DebounceState::default()),
            }),
        }
    }

    pub async fn update_setting(&self, display_id: &DisplayId, key: SettingKey, value: f64) {
        let mut state = self.inner.state.lock().await;
        if state.display_id.as_ref() != Some(display_id) && !state.pending.is_empty() {
            info!(%display_id, dropped = state.pending.len(), "settings: display changed; dropping pending values");
            state.pending.clear();
        }
        state.display_id = Some(display_id.clone());
        state.local.set(key, value);
        state.pending.insert(key, value);

        state.cancel_timer();
        let debouncer = self.clone();
        let delay = self.inner.delay;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debouncer.write_pending().await;
        }));
    }

    /// Records the settings last seen in the store. Fields with a pending
    /// local value keep showing the local value.
    pub async fn observe_remote(&self, remote: ViewerSettings) {
        let mut state = self.inner.state.lock().await;
        state.remote = remote;
        let mut local = remote;
        for (key, value) in &state.pending {
            local.set(*key, *value);
        }
        state.local = local;
    }

    /// Writes any pending values now instead of waiting for the timer.
    pub async fn flush(&self) -> bool {
        self.inner.state.lock().await.cancel_timer();
        self.write_pending().await
    }

    /// Drops pending values without writing them; returns how many were dropped.
    pub async fn discard(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        state.cancel_timer();
        let dropped = state.pending.len();
        state.pending.clear();
        if dropped > 0 {
            debug!(dropped, "settings: discarded pending values");
        }
        dropped
    }

    pub async fn local_settings(&self) -> ViewerSettings {
        self.inner.state.lock().await.local
    }

    pub async fn has_pending(&self) -> bool {
        !self.inner.state.lock().await.pending.is_empty()
    }

    async fn write_pending(&self) -> bool {
        let (display_id, merged) = {
            let mut state = self.inner.state.lock().await;
            // Once the values are taken this task must not be aborted by a
            // newer update, or the write would be lost mid-flight.
            state.timer = None;
            if state.pending.is_empty() {
                return false;
            }
            let Some(display_id) = state.display_id.clone() else {
                state.pending.clear();
                return false;
            };
            let mut merged = state.remote;
            for (key, value) in std::mem::take(&mut state.pending) {
                merged.set(key, value);
            }
            state.remote = merged;
            (display_id, merged)
        };

        let ctx = &self.inner.ctx;
        debug!(%display_id, text = merged.text_scale, reps = merged.reps_scale, "settings: writing debounced values");
        ctx.write(
            &display_id,
            SessionPatch {
                viewer_settings: Some(merged),
                last_update: Some(ctx.clock.now()),
                ..SessionPatch::default()
            },
            "viewer_settings",
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
