use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    domain::{BlockId, Command, DisplayId, Stroke, Timestamp, View, ViewerSettings, WorkoutId},
    error::SyncError,
};

/// The single shared document per display. A cleared session is represented
/// by the absence of a document (`Option::<SessionState>::None`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_workout_id: Option<WorkoutId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_block_id: Option<BlockId>,
    #[serde(default)]
    pub view: View,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_name: Option<String>,
    #[serde(default)]
    pub last_update: Timestamp,
    #[serde(default)]
    pub viewer_settings: ViewerSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_stroke: Option<Stroke>,
}

impl SessionState {
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(value) = &patch.active_workout_id {
            self.active_workout_id = value.clone();
        }
        if let Some(value) = &patch.active_block_id {
            self.active_block_id = value.clone();
        }
        if let Some(view) = patch.view {
            self.view = view;
        }
        if let Some(value) = patch.command {
            self.command = value;
        }
        if let Some(value) = patch.command_timestamp {
            self.command_timestamp = Some(value);
        }
        if let Some(value) = &patch.controller_name {
            self.controller_name = Some(value.clone());
        }
        if let Some(value) = patch.last_update {
            self.last_update = value;
        }
        if let Some(value) = patch.viewer_settings {
            self.viewer_settings = value;
        }
        if let Some(value) = &patch.latest_stroke {
            self.latest_stroke = Some(value.clone());
        }
    }

    /// Whether this snapshot names `identity` as its controller.
    pub fn is_controlled_by(&self, identity: &str) -> bool {
        self.controller_name.as_deref() == Some(identity)
    }
}

/// A partial write. `None` leaves a field untouched; for nullable fields
/// `Some(None)` writes an explicit null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub active_workout_id: Option<Option<WorkoutId>>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub active_block_id: Option<Option<BlockId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<View>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub command: Option<Option<Command>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_settings: Option<ViewerSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_stroke: Option<Stroke>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self == &SessionPatch::default()
    }

    /// Whether applying this patch names `workout_id` as the active workout.
    pub fn announces_workout(&self, workout_id: &WorkoutId) -> bool {
        matches!(&self.active_workout_id, Some(Some(id)) if id == workout_id)
    }
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub const DISCOVERY_ACTION_CONTROL: &str = "control";

/// Out-of-band payload (usually a scanned code) that names the display to control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    pub sid: String,
    pub action: String,
}

impl DiscoveryPayload {
    pub fn control(display_id: &DisplayId) -> Self {
        Self {
            sid: display_id.to_string(),
            action: DISCOVERY_ACTION_CONTROL.to_string(),
        }
    }

    pub fn parse(raw: &str) -> Result<DisplayId, SyncError> {
        let payload: DiscoveryPayload = serde_json::from_str(raw.trim())
            .map_err(|err| SyncError::MalformedDiscovery(err.to_string()))?;
        if payload.action != DISCOVERY_ACTION_CONTROL {
            return Err(SyncError::MalformedDiscovery(format!(
                "unsupported action '{}'",
                payload.action
            )));
        }
        let sid = payload.sid.trim();
        if sid.is_empty() {
            return Err(SyncError::MalformedDiscovery("empty display id".into()));
        }
        Ok(DisplayId::new(sid))
    }
}
