//! Pointer input for freehand strokes.

use crate::surface::Surface;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Pointer event over the drawing surface, in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up,
    Leave,
}

/// Turns pointer events into stroke segments on a [`Surface`].
#[derive(Debug, Clone, Default)]
pub struct StrokeInput {
    drawing: bool,
}

impl StrokeInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a stroke is in progress.
    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Start a stroke at the client-space `point`.
    pub fn on_pointer_down(&mut self, surface: &mut Surface, point: Point) {
        self.drawing = true;
        let local = surface.to_local(point);
        surface.begin_stroke(local);
    }

    /// Extend the current stroke; ignored unless drawing.
    pub fn on_pointer_move(&mut self, surface: &mut Surface, point: Point) {
        if !self.drawing {
            return;
        }
        let local = surface.to_local(point);
        surface.extend_stroke(local);
    }

    /// End the stroke. Wired to both release and leaving the surface.
    pub fn on_pointer_up_or_leave(&mut self) {
        self.drawing = false;
    }

    /// Dispatch a [`PointerEvent`].
    pub fn handle_event(&mut self, surface: &mut Surface, event: PointerEvent) {
        match event {
            PointerEvent::Down { x, y } => self.on_pointer_down(surface, Point::new(x, y)),
            PointerEvent::Move { x, y } => self.on_pointer_move(surface, Point::new(x, y)),
            PointerEvent::Up | PointerEvent::Leave => self.on_pointer_up_or_leave(),
        }
    }
}
