//! The board: surface, annotations and recognition session behind one event-loop API.

use crate::annotation::{Annotation, AnnotationId, AnnotationStore};
use crate::backend::{RecognitionBackend, RecognitionResult};
use crate::config::{CalcConfig, ViewportConfig};
use crate::drag::DragController;
use crate::error::{CalcError, CalcResult};
use crate::input::{PointerEvent, StrokeInput};
use crate::lifecycle;
use crate::notice::NoticeBoard;
use crate::session::{Completion, PendingRequest, RecognitionSession, SessionState, TickReport};
use crate::style::{SerializableColor, parse_css_color};
use crate::surface::Surface;
use crate::typeset::TypesetTrigger;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

/// Serializable view of the board for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub state: SessionState,
    pub annotations: Vec<Annotation>,
    pub variables: BTreeMap<String, String>,
}

/// Single-threaded drawing board driven by the host's event loop.
///
/// Pointer handlers are synchronous. Calculation is split into
/// [`Board::begin_calculate`] and [`Board::finish_calculate`] so the host can
/// keep dispatching drags and resets while the request is in flight;
/// [`Board::calculate`] does both for hosts that can simply await.
#[derive(Debug)]
pub struct Board {
    id: Uuid,
    surface: Surface,
    input: StrokeInput,
    annotations: AnnotationStore,
    drag: DragController,
    session: RecognitionSession,
    typesetter: TypesetTrigger,
    notices: NoticeBoard,
}

impl Board {
    /// Create a board for `viewport`.
    pub fn new(config: &CalcConfig, viewport: &ViewportConfig) -> CalcResult<Self> {
        let board = Self {
            id: Uuid::new_v4(),
            surface: Surface::from_viewport(viewport)?,
            input: StrokeInput::new(),
            annotations: AnnotationStore::new(),
            drag: DragController::new(),
            session: RecognitionSession::new(config),
            typesetter: TypesetTrigger::headless(),
            notices: NoticeBoard::new(),
        };
        log::info!("Board {} ready ({}x{} css)", board.id, viewport.width, viewport.height);
        Ok(board)
    }

    /// Use `typesetter` for re-render triggers.
    pub fn with_typesetter(mut self, typesetter: TypesetTrigger) -> Self {
        self.typesetter = typesetter;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.annotations.all()
    }

    pub fn session(&self) -> &RecognitionSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_idle(&self) -> bool {
        self.session.state() == SessionState::Idle
    }

    pub fn typesetter(&self) -> &TypesetTrigger {
        &self.typesetter
    }

    /// Deferred tasks still queued.
    pub fn pending_tasks(&self) -> usize {
        self.session.pending_tasks()
    }

    /// When [`Board::tick`] next has work to do.
    pub fn next_due(&self) -> Option<Instant> {
        self.session.next_due()
    }

    /// The most recently presented `(expr, result)` pair.
    pub fn latest_result(&self) -> Option<(&str, &str)> {
        self.session.latest_result()
    }

    /// Visible notice text at `now`.
    pub fn notice(&self, now: Instant) -> Option<&str> {
        self.notices.current(now)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            state: self.session.state(),
            annotations: self.annotations.all().to_vec(),
            variables: self.session.bindings().as_map().clone(),
        }
    }

    // --- Drawing ---

    /// Select the stroke color for subsequent segments.
    ///
    /// Accepts a [`SerializableColor`] or a `peniko::Color`.
    pub fn set_color(&mut self, color: impl Into<SerializableColor>) {
        self.surface.set_stroke_color(color.into());
    }

    /// Select the stroke color from a CSS color string such as a swatch.
    pub fn set_color_css(&mut self, color: &str) -> CalcResult<()> {
        let parsed = parse_css_color(color)
            .ok_or_else(|| CalcError::Config(format!("unrecognized color {:?}", color)))?;
        self.set_color(parsed);
        Ok(())
    }

    /// Move the surface's bounding rectangle (client coordinates).
    pub fn set_surface_origin(&mut self, origin: Point) {
        self.surface.set_origin(origin);
    }

    pub fn pointer_down(&mut self, client: Point) {
        self.input.on_pointer_down(&mut self.surface, client);
    }

    pub fn pointer_move(&mut self, client: Point) {
        self.input.on_pointer_move(&mut self.surface, client);
    }

    /// Pointer released or left the surface.
    pub fn pointer_up(&mut self) {
        self.input.on_pointer_up_or_leave();
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.input.handle_event(&mut self.surface, event);
    }

    // --- Dragging ---

    /// Grab annotation `id` at client-space `pointer`.
    pub fn drag_start(&mut self, id: AnnotationId, pointer: Point) -> bool {
        let origin = self.surface.origin();
        self.drag.on_drag_start(&self.annotations, id, pointer, origin)
    }

    pub fn drag_move(&mut self, pointer: Point) {
        let origin = self.surface.origin();
        self.drag.on_drag_move(&mut self.annotations, pointer, origin);
    }

    pub fn drag_end(&mut self) {
        self.drag.on_drag_end();
    }

    // --- Calculation ---

    /// Accept a calculation request and return what to send.
    ///
    /// Rejections are shown as a notice and returned.
    pub fn begin_calculate(&mut self, now: Instant) -> CalcResult<PendingRequest> {
        self.session
            .begin_submit(&self.surface)
            .inspect_err(|e| self.notices.show(e.notice_text(), now))
    }

    /// Apply the backend outcome for `pending`, received at `now`.
    pub fn finish_calculate(
        &mut self,
        pending: PendingRequest,
        outcome: CalcResult<Vec<RecognitionResult>>,
        now: Instant,
    ) -> CalcResult<Completion> {
        let completion = self
            .session
            .complete_submit(&mut self.surface, pending, outcome, now)
            .inspect_err(|e| self.notices.show(e.notice_text(), now))?;
        self.tick(now);
        Ok(completion)
    }

    /// Submit the drawing to `backend` and ingest the answer.
    ///
    /// Staged annotations still need [`Board::tick`] to appear.
    pub async fn calculate<B>(&mut self, backend: &B) -> CalcResult<Completion>
    where
        B: RecognitionBackend + ?Sized,
    {
        let pending = self.begin_calculate(Instant::now())?;
        let outcome = backend.calculate(&pending.request).await;
        self.finish_calculate(pending, outcome, Instant::now())
    }

    /// Run deferred work due at `now` and expire old notices.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.notices.expire(now);
        self.session.tick(now, &mut self.annotations, &mut self.typesetter)
    }

    /// Clear drawing, annotations and bindings. Allowed at any time.
    pub fn reset(&mut self) {
        lifecycle::reset(
            &mut self.surface,
            &mut self.annotations,
            &mut self.drag,
            &mut self.session,
        );
    }
}
