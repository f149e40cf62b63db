use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(OrganizationId);
id_newtype!(DisplayId);
id_newtype!(WorkoutId);
id_newtype!(BlockId);

/// Prefix carried by ids of workouts synthesized on the controller for ad-hoc timers.
pub const FREESTANDING_ID_PREFIX: &str = "freestanding-";

impl WorkoutId {
    pub fn freestanding() -> Self {
        Self(format!("{FREESTANDING_ID_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn is_freestanding(&self) -> bool {
        self.0.starts_with(FREESTANDING_ID_PREFIX)
    }
}

/// Milliseconds since the Unix epoch. Ordering between writes is decided by
/// comparing these, never by arrival order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Idle,
    Menu,
    Preview,
    Timer,
    Ideaboard,
}

impl View {
    /// Views in which the display is not running anything a controller drives.
    pub fn is_resting(self) -> bool {
        matches!(self, View::Idle | View::Menu)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Start,
    Pause,
    Resume,
    Reset,
    Finish,
    StartHyrox,
    UndoNote,
    SaveNote,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Reset => "reset",
            Command::Finish => "finish",
            Command::StartHyrox => "start_hyrox",
            Command::UndoNote => "undo_note",
            Command::SaveNote => "save_note",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSettings {
    pub text_scale: f64,
    pub reps_scale: f64,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            text_scale: 1.0,
            reps_scale: 1.0,
        }
    }
}

/// Continuous display-scaling parameters a controller can slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    Text,
    Reps,
}

impl ViewerSettings {
    pub fn get(&self, key: SettingKey) -> f64 {
        match key {
            SettingKey::Text => self.text_scale,
            SettingKey::Reps => self.reps_scale,
        }
    }

    pub fn set(&mut self, key: SettingKey, value: f64) {
        match key {
            SettingKey::Text => self.text_scale = value,
            SettingKey::Reps => self.reps_scale = value,
        }
    }
}

/// A point in normalized canvas space, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn normalized(x: f64, y: f64, width: f64, height: f64) -> Self {
        let scale = |value: f64, extent: f64| {
            if extent <= 0.0 || !value.is_finite() {
                0.0
            } else {
                (value / extent).clamp(0.0, 1.0)
            }
        };
        Self {
            x: scale(x, width),
            y: scale(y, height),
        }
    }
}

/// Color written with a clear marker; receivers never paint it.
pub const CLEAR_STROKE_COLOR: &str = "transparent";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub color: String,
    pub points: Vec<Point>,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub is_clear: bool,
}

impl Stroke {
    pub fn clear(timestamp: Timestamp) -> Self {
        Self {
            color: CLEAR_STROKE_COLOR.to_string(),
            points: Vec::new(),
            timestamp,
            is_clear: true,
        }
    }
}
