//! Freehand drawing for the display's idea board. One write per gesture; undo
//! and save are pulses and the display keeps the stroke history.

use std::sync::Arc;

use shared::{
    domain::{Command, DisplayId, Point, Stroke, Timestamp},
    protocol::SessionPatch,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{CommandDispatcher, ControllerContext};

pub const DEFAULT_STROKE_COLOR: &str = "#ff3b30";

pub struct DrawingStrokeBroadcaster {
    ctx: ControllerContext,
    dispatcher: Arc<CommandDispatcher>,
    gesture: Mutex<Option<Vec<Point>>>,
    color: Mutex<String>,
}

impl DrawingStrokeBroadcaster {
    pub fn new(ctx: ControllerContext, dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            ctx,
            dispatcher,
            gesture: Mutex::new(None),
            color: Mutex::new(DEFAULT_STROKE_COLOR.to_string()),
        }
    }

    pub async fn set_color(&self, color: impl Into<String>) {
        *self.color.lock().await = color.into();
    }

    /// Starts a gesture; an unfinished previous gesture is abandoned.
    pub async fn pointer_down(&self, point: Point) {
        *self.gesture.lock().await = Some(vec![clamp(point)]);
    }

    pub async fn pointer_move(&self, point: Point) {
        if let Some(points) = self.gesture.lock().await.as_mut() {
            points.push(clamp(point));
        }
    }

    pub async fn is_drawing(&self) -> bool {
        self.gesture.lock().await.is_some()
    }

    /// Ends the gesture and writes it as the latest stroke. Nothing is written
    /// when no gesture was in progress.
    pub async fn pointer_up(&self, display_id: &DisplayId) -> Option<Stroke> {
        let points = self.gesture.lock().await.take()?;
        let timestamp = self.ctx.clock.now();
        let stroke = Stroke {
            color: self.color.lock().await.clone(),
            points,
            timestamp,
            is_clear: false,
        };
        debug!(%display_id, points = stroke.points.len(), "strokes: sending gesture");
        self.write_stroke(display_id, stroke.clone(), timestamp).await;
        Some(stroke)
    }

    pub async fn clear(&self, display_id: &DisplayId) -> Stroke {
        *self.gesture.lock().await = None;
        let timestamp = self.ctx.clock.now();
        let stroke = Stroke::clear(timestamp);
        self.write_stroke(display_id, stroke.clone(), timestamp).await;
        stroke
    }

    pub async fn undo(&self, display_id: &DisplayId) -> Timestamp {
        self.dispatcher
            .send_pulse(display_id, Command::UndoNote)
            .await
    }

    pub async fn save(&self, display_id: &DisplayId) -> Timestamp {
        self.dispatcher
            .send_pulse(display_id, Command::SaveNote)
            .await
    }

    async fn write_stroke(&self, display_id: &DisplayId, stroke: Stroke, timestamp: Timestamp) {
        self.ctx
            .write(
                display_id,
                SessionPatch {
                    latest_stroke: Some(stroke),
                    last_update: Some(timestamp),
                    ..SessionPatch::default()
                },
                "latest_stroke",
            )
            .await;
    }
}

fn clamp(point: Point) -> Point {
    let unit = |value: f64| {
        if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        }
    };
    Point {
        x: unit(point.x),
        y: unit(point.y),
    }
}

#[cfg(test)]
#[path = "tests/strokes_tests.rs"]
mod tests;
