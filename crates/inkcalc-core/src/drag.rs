//! Dragging annotations with the pointer.

use crate::annotation::{AnnotationId, AnnotationStore};
use kurbo::{Point, Vec2};

/// Moves at most one annotation at a time.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    active: Option<AnnotationId>,
    grab_offset: Vec2,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The annotation being dragged, if any.
    pub fn active(&self) -> Option<AnnotationId> {
        self.active
    }

    /// Grab annotation `id` at the client-space `pointer`.
    ///
    /// The grab offset is measured from the annotation's on-screen top-left
    /// (`surface_origin + position`), so it does not jump on the first move.
    /// A drag already in progress is replaced. Unknown ids end any drag and
    /// return false.
    pub fn on_drag_start(
        &mut self,
        store: &AnnotationStore,
        id: AnnotationId,
        pointer: Point,
        surface_origin: Point,
    ) -> bool {
        let Some(annotation) = store.get(id) else {
            self.active = None;
            return false;
        };
        let top_left = surface_origin + annotation.position().to_vec2();
        self.grab_offset = pointer - top_left;
        self.active = Some(id);
        true
    }

    /// Move the grabbed annotation so it follows `pointer`.
    pub fn on_drag_move(
        &mut self,
        store: &mut AnnotationStore,
        pointer: Point,
        surface_origin: Point,
    ) {
        let Some(id) = self.active else {
            return;
        };
        let position = pointer - surface_origin.to_vec2() - self.grab_offset;
        if !store.update_position(id, position) {
            // Removed by a reset mid-drag.
            self.active = None;
        }
    }

    /// Release the grabbed annotation.
    pub fn on_drag_end(&mut self) {
        self.active = None;
    }
}
