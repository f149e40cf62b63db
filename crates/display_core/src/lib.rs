//! Display side of the remote-control protocol. The display never writes;
//! it folds each snapshot of its session document into local render state.

use serde::Serialize;
use shared::{
    domain::{BlockId, Command, DisplayId, Stroke, Timestamp, View, ViewerSettings, WorkoutId},
    protocol::SessionState,
};
use tracing::{debug, info};

mod strokes;

pub use strokes::{SavedNote, StrokeHistory};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// Nothing loaded.
    #[default]
    Idle,
    /// A block is loaded and waiting for `start`.
    Ready,
    Running,
    Paused,
    Finished,
}

impl PlaybackStatus {
    /// Status after `command`. Applying the same command twice lands in the
    /// same status, so a re-delivered pulse cannot flip anything.
    pub fn after(self, command: Command) -> Self {
        match (self, command) {
            (PlaybackStatus::Idle, _) => PlaybackStatus::Idle,
            (_, Command::Start | Command::StartHyrox) => PlaybackStatus::Running,
            (PlaybackStatus::Paused | PlaybackStatus::Running, Command::Resume) => {
                PlaybackStatus::Running
            }
            (PlaybackStatus::Running | PlaybackStatus::Paused, Command::Pause) => {
                PlaybackStatus::Paused
            }
            (_, Command::Reset) => PlaybackStatus::Ready,
            (_, Command::Finish) => PlaybackStatus::Finished,
            (status, _) => status,
        }
    }
}

/// Something the display has to render differently after a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    SessionEnded,
    ControllerChanged(String),
    ViewChanged(View),
    BlockLoaded {
        workout_id: Option<WorkoutId>,
        block_id: Option<BlockId>,
    },
    CommandApplied {
        command: Command,
        timestamp: Timestamp,
    },
    PlaybackChanged(PlaybackStatus),
    SettingsChanged(ViewerSettings),
    StrokeAdded(Stroke),
    DrawingCleared,
    StrokeUndone,
    NoteSaved(SavedNote),
}

#[derive(Debug)]
pub struct DisplayReceiver {
    display_id: DisplayId,
    controller_name: Option<String>,
    view: View,
    active_workout_id: Option<WorkoutId>,
    active_block_id: Option<BlockId>,
    playback: PlaybackStatus,
    viewer_settings: ViewerSettings,
    last_command_at: Option<Timestamp>,
    last_stroke_at: Option<Timestamp>,
    last_clear: Option<Stroke>,
    strokes: StrokeHistory,
}

impl DisplayReceiver {
    pub fn new(display_id: DisplayId) -> Self {
        Self {
            display_id,
            controller_name: None,
            view: View::default(),
            active_workout_id: None,
            active_block_id: None,
            playback: PlaybackStatus::default(),
            viewer_settings: ViewerSettings::default(),
            last_command_at: None,
            last_stroke_at: None,
            last_clear: None,
            strokes: StrokeHistory::default(),
        }
    }

    pub fn display_id(&self) -> &DisplayId {
        &self.display_id
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn controller_name(&self) -> Option<&str> {
        self.controller_name.as_deref()
    }

    pub fn active_workout_id(&self) -> Option<&WorkoutId> {
        self.active_workout_id.as_ref()
    }

    pub fn active_block_id(&self) -> Option<&BlockId> {
        self.active_block_id.as_ref()
    }

    pub fn playback(&self) -> PlaybackStatus {
        self.playback
    }

    pub fn viewer_settings(&self) -> ViewerSettings {
        self.viewer_settings
    }

    pub fn strokes(&self) -> &StrokeHistory {
        &self.strokes
    }

    /// Folds one snapshot into the display state and returns what changed.
    /// `None` is the cleared document: everything resets, stroke history
    /// included.
    pub fn observe(&mut self, state: Option<&SessionState>) -> Vec<DisplayEvent> {
        let Some(state) = state else {
            return self.end_session();
        };
        let mut events = Vec::new();

        if state.controller_name.is_some() && state.controller_name != self.controller_name {
            self.controller_name = state.controller_name.clone();
            if let Some(name) = &self.controller_name {
                info!(display_id = %self.display_id, controller = %name, "display now controlled");
                events.push(DisplayEvent::ControllerChanged(name.clone()));
            }
        }

        if state.view != self.view {
            self.view = state.view;
            events.push(DisplayEvent::ViewChanged(state.view));
        }

        if state.active_workout_id != self.active_workout_id
            || state.active_block_id != self.active_block_id
        {
            self.active_workout_id = state.active_workout_id.clone();
            self.active_block_id = state.active_block_id.clone();
            events.push(DisplayEvent::BlockLoaded {
                workout_id: self.active_workout_id.clone(),
                block_id: self.active_block_id.clone(),
            });
            let status = if self.active_block_id.is_some() {
                PlaybackStatus::Ready
            } else {
                PlaybackStatus::Idle
            };
            self.set_playback(status, &mut events);
        }

        if state.viewer_settings != self.viewer_settings {
            self.viewer_settings = state.viewer_settings;
            events.push(DisplayEvent::SettingsChanged(state.viewer_settings));
        }

        if let Some(stroke) = &state.latest_stroke {
            self.consume_stroke(stroke, &mut events);
        }

        if let (Some(command), Some(timestamp)) = (state.command, state.command_timestamp) {
            self.consume_command(command, timestamp, &mut events);
        }

        events
    }

    fn consume_command(
        &mut self,
        command: Command,
        timestamp: Timestamp,
        events: &mut Vec<DisplayEvent>,
    ) {
        if self.last_command_at.is_some_and(|last| timestamp <= last) {
            return;
        }
        self.last_command_at = Some(timestamp);
        debug!(display_id = %self.display_id, command = command.as_str(), %timestamp, "display: applying command");
        events.push(DisplayEvent::CommandApplied { command, timestamp });

        match command {
            Command::UndoNote => {
                if self.strokes.undo().is_some() {
                    events.push(DisplayEvent::StrokeUndone);
                }
            }
            Command::SaveNote => {
                let note = self.strokes.save(timestamp);
                info!(display_id = %self.display_id, strokes = note.strokes.len(), "display: note saved");
                events.push(DisplayEvent::NoteSaved(note));
            }
            _ => {
                let status = self.playback.after(command);
                self.set_playback(status, events);
            }
        }
    }

    fn consume_stroke(&mut self, stroke: &Stroke, events: &mut Vec<DisplayEvent>) {
        // A clear wins over any ordering ambiguity; only the exact marker already applied is skipped.
        if stroke.is_clear {
            if self.last_clear.as_ref() == Some(stroke) {
                return;
            }
            self.last_clear = Some(stroke.clone());
            self.last_stroke_at = self.last_stroke_at.max(Some(stroke.timestamp));
            self.strokes.clear();
            events.push(DisplayEvent::DrawingCleared);
            return;
        }
        if self
            .last_stroke_at
            .is_some_and(|last| stroke.timestamp <= last)
        {
            return;
        }
        self.last_stroke_at = Some(stroke.timestamp);
        self.strokes.push(stroke.clone());
        events.push(DisplayEvent::StrokeAdded(stroke.clone()));
    }

    fn set_playback(&mut self, status: PlaybackStatus, events: &mut Vec<DisplayEvent>) {
        if status != self.playback {
            self.playback = status;
            events.push(DisplayEvent::PlaybackChanged(status));
        }
    }

    fn end_session(&mut self) -> Vec<DisplayEvent> {
        let fresh = Self::new(self.display_id.clone());
        let was_active = self.controller_name.is_some()
            || self.active_workout_id.is_some()
            || self.view != fresh.view
            || !self.strokes.is_empty();
        *self = fresh;
        if was_active {
            info!(display_id = %self.display_id, "display: session ended");
            vec![DisplayEvent::SessionEnded]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
