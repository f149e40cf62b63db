use serde::Serialize;
use shared::domain::{Stroke, Timestamp};

/// A snapshot of the board taken by a save pulse.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedNote {
    pub saved_at: Timestamp,
    pub strokes: Vec<Stroke>,
}

/// Strokes drawn on one display, in drawing order. Shared by every
/// controller of the session; undo removes the newest stroke whoever drew it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeHistory {
    strokes: Vec<Stroke>,
    saved: Vec<SavedNote>,
}

impl StrokeHistory {
    pub fn push(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    pub fn undo(&mut self) -> Option<Stroke> {
        self.strokes.pop()
    }

    /// Wipes the board. Saved notes are kept.
    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    pub fn save(&mut self, saved_at: Timestamp) -> SavedNote {
        let note = SavedNote {
            saved_at,
            strokes: self.strokes.clone(),
        };
        self.saved.push(note.clone());
        note
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn saved(&self) -> &[SavedNote] {
        &self.saved
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}
