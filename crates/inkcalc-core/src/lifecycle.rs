//! Reset of the whole board as one unit.

use crate::annotation::AnnotationStore;
use crate::drag::DragController;
use crate::session::RecognitionSession;
use crate::surface::Surface;

/// Clear the surface, the annotations and the variable bindings together.
///
/// Allowed in any session state. A request in flight is not cancelled; see
/// [`RecognitionSession::reset`] for what happens to its response.
pub fn reset(
    surface: &mut Surface,
    annotations: &mut AnnotationStore,
    drag: &mut DragController,
    session: &mut RecognitionSession,
) {
    log::info!(
        "Reset in state {:?} ({} annotations, {} bindings)",
        session.state(),
        annotations.len(),
        session.bindings().len()
    );
    surface.clear();
    annotations.clear();
    drag.on_drag_end();
    session.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalcConfig;
    use kurbo::Point;

    #[test]
    fn test_reset_is_idempotent() {
        let mut surface = Surface::initialize(100.0, 100.0, 1.0).unwrap();
        let mut annotations = AnnotationStore::new();
        let mut drag = DragController::new();
        let mut session = RecognitionSession::new(&CalcConfig::default());

        surface.begin_stroke(Point::new(1.0, 1.0));
        surface.extend_stroke(Point::new(20.0, 20.0));
        let a = annotations.add("\\(1 = 1\\)", Point::ZERO);
        drag.on_drag_start(&annotations, a.id(), Point::ZERO, Point::ZERO);

        reset(&mut surface, &mut annotations, &mut drag, &mut session);
        assert!(surface.is_blank());
        assert!(annotations.is_empty());
        assert!(session.bindings().is_empty());
        assert_eq!(drag.active(), None);

        reset(&mut surface, &mut annotations, &mut drag, &mut session);
        assert!(surface.is_blank());
        assert!(annotations.is_empty());
        assert!(session.bindings().is_empty());
    }
}
