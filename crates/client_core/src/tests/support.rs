use std::{sync::Arc, time::Duration};

use shared::{
    domain::{DisplayId, OrganizationId},
    workout::{CountDirection, TimerMode, TimerSettings},
};
use storage::MemorySessionStore;

use crate::{ControllerContext, ControllerSettings};

pub(crate) const GRACE: Duration = Duration::from_millis(1000);
pub(crate) const DEBOUNCE: Duration = Duration::from_millis(300);
pub(crate) const ACK: Duration = Duration::from_millis(1500);

pub(crate) fn org() -> OrganizationId {
    OrganizationId::new("gym")
}

pub(crate) fn display() -> DisplayId {
    DisplayId::new("S1")
}

pub(crate) fn context(identity: &str, store: &Arc<MemorySessionStore>) -> ControllerContext {
    ControllerContext::new(org(), identity, store.clone())
}

pub(crate) fn settings() -> ControllerSettings {
    ControllerSettings {
        grace_window_ms: GRACE.as_millis() as u64,
        debounce_ms: DEBOUNCE.as_millis() as u64,
        command_ack_ms: ACK.as_millis() as u64,
        ..ControllerSettings::default()
    }
}

pub(crate) fn emom(minutes: u32) -> TimerSettings {
    TimerSettings {
        mode: TimerMode::Emom,
        work_time_secs: 60,
        rest_time_secs: 0,
        rounds: minutes,
        prepare_time_secs: 10,
        direction: CountDirection::Down,
    }
}
