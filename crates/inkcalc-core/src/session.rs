//! Recognition session: submission, staged result presentation and variable bindings.
//!
//! ```text
//! Idle --submit--> Submitting --response--> PresentingResults --last insertion--> Idle
//!                      |
//!                      +--failure--> Idle
//! ```
//!
//! A response is ingested in two passes. Assignments are folded into the
//! bindings right away; then one annotation per result is staged 200ms apart
//! and the surface is cleared immediately. Each insertion asks the typesetter
//! to run 100ms later.

use crate::annotation::{AnnotationId, AnnotationStore, format_equation};
use crate::backend::{CalculateRequest, RecognitionResult};
use crate::config::{CalcConfig, CancelPolicy};
use crate::error::{CalcError, CalcResult};
use crate::schedule::{Generation, Scheduler};
use crate::surface::Surface;
use crate::typeset::{OVERLAY_REGION, TypesetTrigger};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Delay between consecutive annotation insertions.
pub const STAGGER_DELAY: Duration = Duration::from_millis(200);
/// Vertical spacing between consecutive annotations, in CSS pixels.
pub const ANNOTATION_SPACING: f64 = 40.0;
/// Delay between an insertion and its typeset trigger.
pub const TYPESET_DELAY: Duration = Duration::from_millis(100);

/// Where the session is in the calculate cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    Submitting,
    PresentingResults,
}

/// Symbol name to resolved value, accumulated across calculations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableBindings(BTreeMap<String, String>);

impl VariableBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or overwrite a binding.
    pub fn bind(&mut self, symbol: impl Into<String>, value: impl Into<String>) {
        self.0.insert(symbol.into(), value.into());
    }

    /// Fold every `assign` result in order; later assignments win.
    pub fn fold(&mut self, results: &[RecognitionResult]) -> usize {
        let mut folded = 0;
        for result in results.iter().filter(|r| r.assign) {
            self.bind(result.expr.clone(), result.result.clone());
            folded += 1;
        }
        folded
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.0.get(symbol).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// An accepted submission waiting for the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    generation: Generation,
    /// Body to send.
    pub request: CalculateRequest,
}

impl PendingRequest {
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// How a backend response was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Results were ingested and `staged` annotations scheduled.
    Presented { staged: usize, assigned: usize },
    /// The board was reset while the request was in flight; nothing was applied.
    Discarded,
}

/// Deferred work owned by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionTask {
    /// Insert one annotation and remember its source pair.
    Insert {
        content: String,
        position: Point,
        expr: String,
        result: String,
    },
    /// Ask the typesetting engine to re-render the overlay.
    Typeset,
    /// Presentation is over; return to idle.
    Finish,
}

/// What a call to [`RecognitionSession::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub inserted: Vec<AnnotationId>,
    pub typeset: usize,
    pub skipped: usize,
    pub finished: bool,
}

/// Orchestrates snapshot → backend → staged annotations.
#[derive(Debug)]
pub struct RecognitionSession {
    state: SessionState,
    bindings: VariableBindings,
    generation: Generation,
    scheduler: Scheduler<SessionTask>,
    cancel_policy: CancelPolicy,
    annotate_assignments: bool,
    latest: Option<(String, String)>,
}

impl RecognitionSession {
    pub fn new(config: &CalcConfig) -> Self {
        Self {
            state: SessionState::Idle,
            bindings: VariableBindings::new(),
            generation: Generation::default(),
            scheduler: Scheduler::new(),
            cancel_policy: config.cancel_policy,
            annotate_assignments: config.annotate_assignments,
            latest: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bindings(&self) -> &VariableBindings {
        &self.bindings
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The most recently presented `(expr, result)` pair.
    pub fn latest_result(&self) -> Option<(&str, &str)> {
        self.latest.as_ref().map(|(e, r)| (e.as_str(), r.as_str()))
    }

    /// Number of deferred tasks still queued.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// When the next deferred task is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.scheduler.next_due()
    }

    /// Accept a submission: capture the snapshot and enter `Submitting`.
    ///
    /// Rejected with [`CalcError::SessionBusy`] unless idle, and with
    /// [`CalcError::EmptyCanvas`] when nothing has been drawn. Neither
    /// rejection changes any state.
    pub fn begin_submit(&mut self, surface: &Surface) -> CalcResult<PendingRequest> {
        if self.state != SessionState::Idle {
            log::debug!("Submit rejected in state {:?}", self.state);
            return Err(CalcError::SessionBusy);
        }
        if surface.is_blank() {
            return Err(CalcError::EmptyCanvas);
        }

        let image = surface.export_snapshot()?;
        self.generation = self.generation.next();
        self.state = SessionState::Submitting;
        log::info!(
            "Submitting snapshot (generation {}, {} bindings)",
            self.generation.value(),
            self.bindings.len()
        );

        Ok(PendingRequest {
            generation: self.generation,
            request: CalculateRequest {
                image,
                dict_of_vars: self.bindings.as_map().clone(),
            },
        })
    }

    /// Apply the backend outcome for `pending`, received at `now`.
    ///
    /// On failure the session goes back to `Idle` and nothing else changes.
    /// On success assignments are folded, annotations are staged, and the
    /// surface is cleared.
    pub fn complete_submit(
        &mut self,
        surface: &mut Surface,
        pending: PendingRequest,
        outcome: CalcResult<Vec<RecognitionResult>>,
        now: Instant,
    ) -> CalcResult<Completion> {
        if self.state == SessionState::Submitting {
            self.state = SessionState::Idle;
        }

        let results = match outcome {
            Ok(results) => results,
            Err(e) => {
                log::warn!("Calculation failed: {}", e);
                return Err(e);
            }
        };

        if pending.generation != self.generation && self.cancel_policy == CancelPolicy::DropStale {
            log::info!(
                "Discarding {} results for stale generation {}",
                results.len(),
                pending.generation.value()
            );
            return Ok(Completion::Discarded);
        }

        let assigned = self.bindings.fold(&results);

        let visible: Vec<&RecognitionResult> = results
            .iter()
            .filter(|r| self.annotate_assignments || !r.assign)
            .collect();
        let center = surface.center();
        let mut last_due = None;
        for (index, result) in visible.iter().enumerate() {
            let due = now + STAGGER_DELAY * index as u32;
            let position = center + Vec2::new(0.0, ANNOTATION_SPACING * index as f64);
            self.scheduler.schedule(
                due,
                Some(pending.generation),
                SessionTask::Insert {
                    content: format_equation(&result.expr, &result.result),
                    position,
                    expr: result.expr.clone(),
                    result: result.result.clone(),
                },
            );
            last_due = Some(due);
        }

        if let Some(due) = last_due {
            self.scheduler.schedule(due, Some(pending.generation), SessionTask::Finish);
            self.state = SessionState::PresentingResults;
        }

        surface.clear();
        log::info!(
            "Ingested {} results ({} assignments, {} staged)",
            results.len(),
            assigned,
            visible.len()
        );

        Ok(Completion::Presented {
            staged: visible.len(),
            assigned,
        })
    }

    /// Run every task due at or before `now`.
    pub fn tick(
        &mut self,
        now: Instant,
        annotations: &mut AnnotationStore,
        typesetter: &mut TypesetTrigger,
    ) -> TickReport {
        let mut report = TickReport::default();

        while let Some(due) = self.scheduler.pop_due(now) {
            let stale = due.generation.is_some_and(|generation| generation != self.generation);
            if stale && self.cancel_policy == CancelPolicy::DropStale {
                report.skipped += 1;
                continue;
            }

            match due.task {
                SessionTask::Insert {
                    content,
                    position,
                    expr,
                    result,
                } => {
                    let annotation = annotations.add(content, position);
                    log::debug!("Inserted annotation {} at {:?}", annotation.id(), position);
                    self.latest = Some((expr, result));
                    self.scheduler.schedule(due.due + TYPESET_DELAY, None, SessionTask::Typeset);
                    report.inserted.push(annotation.id());
                }
                SessionTask::Typeset => {
                    typesetter.trigger(OVERLAY_REGION);
                    report.typeset += 1;
                }
                SessionTask::Finish => {
                    if self.state == SessionState::PresentingResults {
                        self.state = SessionState::Idle;
                    }
                    report.finished = true;
                }
            }
        }

        report
    }

    /// Clear bindings and start a new generation.
    ///
    /// With [`CancelPolicy::DropStale`] staged insertions are dropped and a
    /// presentation in progress ends. A request in flight keeps the session
    /// `Submitting` until its response arrives.
    pub fn reset(&mut self) {
        self.bindings.clear();
        self.latest = None;
        self.generation = self.generation.next();

        if self.cancel_policy == CancelPolicy::DropStale {
            let dropped = self.scheduler.cancel_stale(self.generation);
            if dropped > 0 {
                log::debug!("Reset dropped {} staged tasks", dropped);
            }
            if self.state == SessionState::PresentingResults {
                self.state = SessionState::Idle;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn drawn_surface() -> Surface {
        let mut surface = Surface::initialize(400.0, 300.0, 1.0).unwrap();
        surface.begin_stroke(Point::new(10.0, 10.0));
        surface.extend_stroke(Point::new(50.0, 50.0));
        surface
    }

    fn sample_results() -> Vec<RecognitionResult> {
        vec![
            RecognitionResult::new("x", "5", true),
            RecognitionResult::new("x+2", "7", false),
        ]
    }

    struct Fixture {
        session: RecognitionSession,
        surface: Surface,
        annotations: AnnotationStore,
        typesetter: TypesetTrigger,
    }

    impl Fixture {
        fn new(config: CalcConfig) -> Self {
            Self {
                session: RecognitionSession::new(&config),
                surface: drawn_surface(),
                annotations: AnnotationStore::new(),
                typesetter: TypesetTrigger::headless(),
            }
        }

        fn tick(&mut self, now: Instant) -> TickReport {
            self.session.tick(now, &mut self.annotations, &mut self.typesetter)
        }
    }

    #[test]
    fn test_blank_surface_rejected() {
        let mut session = RecognitionSession::new(&CalcConfig::default());
        let surface = Surface::initialize(100.0, 100.0, 1.0).unwrap();
        assert_eq!(session.begin_submit(&surface), Err(CalcError::EmptyCanvas));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.generation(), Generation::default());
    }

    #[test]
    fn test_busy_rejected() {
        let mut f = Fixture::new(CalcConfig::default());
        let pending = f.session.begin_submit(&f.surface).unwrap();
        assert_eq!(f.session.state(), SessionState::Submitting);
        assert_eq!(f.session.begin_submit(&f.surface), Err(CalcError::SessionBusy));
        assert_eq!(f.session.generation(), pending.generation());
    }

    #[test]
    fn test_request_carries_snapshot_and_bindings() {
        let mut f = Fixture::new(CalcConfig::default());
        f.session.bindings.bind("y", "3");
        let pending = f.session.begin_submit(&f.surface).unwrap();
        assert!(pending.request.image.starts_with("data:image/png;base64,"));
        assert_eq!(pending.request.dict_of_vars.get("y").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_staged_presentation() {
        let mut f = Fixture::new(CalcConfig::default());
        let t0 = Instant::now();
        let pending = f.session.begin_submit(&f.surface).unwrap();
        let completion = f
            .session
            .complete_submit(&mut f.surface, pending, Ok(sample_results()), t0)
            .unwrap();

        assert_eq!(completion, Completion::Presented { staged: 2, assigned: 1 });
        assert_eq!(f.session.bindings().get("x"), Some("5"));
        assert_eq!(f.session.state(), SessionState::PresentingResults);
        // Strokes vanish before the annotations appear.
        assert!(f.surface.is_blank());
        assert!(f.annotations.is_empty());

        let report = f.tick(t0);
        assert_eq!(report.inserted.len(), 1);
        assert_eq!(f.session.state(), SessionState::PresentingResults);

        let report = f.tick(t0 + ms(199));
        assert!(report.inserted.is_empty());
        assert_eq!(report.typeset, 1);

        let report = f.tick(t0 + ms(200));
        assert_eq!(report.inserted.len(), 1);
        assert!(report.finished);
        assert_eq!(f.session.state(), SessionState::Idle);

        let report = f.tick(t0 + ms(300));
        assert_eq!(report.typeset, 1);
        assert_eq!(f.session.pending_tasks(), 0);

        let all = f.annotations.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content(), "\\(x = 5\\)");
        assert_eq!(all[1].content(), "\\(x+2 = 7\\)");
        assert_eq!(all[0].position(), Point::new(200.0, 150.0));
        assert_eq!(all[1].position(), Point::new(200.0, 190.0));
        assert_eq!(f.session.latest_result(), Some(("x+2", "7")));
        assert_eq!(f.typesetter.trigger_count(), 2);
    }

    #[test]
    fn test_failure_returns_to_idle_untouched() {
        let mut f = Fixture::new(CalcConfig::default());
        f.session.bindings.bind("a", "1");
        let pending = f.session.begin_submit(&f.surface).unwrap();
        let err = f
            .session
            .complete_submit(
                &mut f.surface,
                pending,
                Err(CalcError::backend("boom")),
                Instant::now(),
            )
            .unwrap_err();
        assert_eq!(err, CalcError::backend("boom"));
        assert_eq!(f.session.state(), SessionState::Idle);
        assert_eq!(f.session.bindings().len(), 1);
        assert!(!f.surface.is_blank());
        assert_eq!(f.session.pending_tasks(), 0);
    }

    #[test]
    fn test_empty_results_go_idle_and_clear() {
        let mut f = Fixture::new(CalcConfig::default());
        let pending = f.session.begin_submit(&f.surface).unwrap();
        let completion = f
            .session
            .complete_submit(&mut f.surface, pending, Ok(Vec::new()), Instant::now())
            .unwrap();
        assert_eq!(completion, Completion::Presented { staged: 0, assigned: 0 });
        assert_eq!(f.session.state(), SessionState::Idle);
        assert!(f.surface.is_blank());
    }

    #[test]
    fn test_later_assignment_overwrites() {
        let mut bindings = VariableBindings::new();
        bindings.fold(&[
            RecognitionResult::new("x", "1", true),
            RecognitionResult::new("y", "2", true),
            RecognitionResult::new("x", "3", true),
            RecognitionResult::new("x", "9", false),
        ]);
        assert_eq!(bindings.get("x"), Some("3"));
        assert_eq!(bindings.get("y"), Some("2"));
    }

    #[test]
    fn test_hidden_assignments() {
        let config = CalcConfig {
            annotate_assignments: false,
            ..CalcConfig::default()
        };
        let mut f = Fixture::new(config);
        let t0 = Instant::now();
        let pending = f.session.begin_submit(&f.surface).unwrap();
        f.session
            .complete_submit(&mut f.surface, pending, Ok(sample_results()), t0)
            .unwrap();
        f.tick(t0 + ms(1000));
        assert_eq!(f.annotations.len(), 1);
        assert_eq!(f.annotations.all()[0].position(), Point::new(200.0, 150.0));
        assert_eq!(f.session.bindings().get("x"), Some("5"));
    }

    #[test]
    fn test_reset_during_presentation_drops_insertions() {
        let mut f = Fixture::new(CalcConfig::default());
        let t0 = Instant::now();
        let pending = f.session.begin_submit(&f.surface).unwrap();
        f.session
            .complete_submit(&mut f.surface, pending, Ok(sample_results()), t0)
            .unwrap();
        f.tick(t0);
        assert_eq!(f.annotations.len(), 1);

        f.session.reset();
        f.annotations.clear();
        assert_eq!(f.session.state(), SessionState::Idle);

        let report = f.tick(t0 + ms(1000));
        assert!(report.inserted.is_empty());
        assert!(f.annotations.is_empty());
        assert!(f.session.bindings().is_empty());
    }

    #[test]
    fn test_reset_while_submitting_discards_response() {
        let mut f = Fixture::new(CalcConfig::default());
        let t0 = Instant::now();
        let pending = f.session.begin_submit(&f.surface).unwrap();
        f.session.reset();
        assert_eq!(f.session.state(), SessionState::Submitting);
        assert_eq!(f.session.begin_submit(&f.surface), Err(CalcError::SessionBusy));

        let completion = f
            .session
            .complete_submit(&mut f.surface, pending, Ok(sample_results()), t0)
            .unwrap();
        assert_eq!(completion, Completion::Discarded);
        assert_eq!(f.session.state(), SessionState::Idle);
        assert!(f.session.bindings().is_empty());
        assert!(!f.surface.is_blank());
        assert_eq!(f.session.pending_tasks(), 0);
    }

    #[test]
    fn test_preserve_policy_lets_stale_insertions_land() {
        let config = CalcConfig {
            cancel_policy: CancelPolicy::Preserve,
            ..CalcConfig::default()
        };
        let mut f = Fixture::new(config);
        let t0 = Instant::now();
        let pending = f.session.begin_submit(&f.surface).unwrap();
        f.session
            .complete_submit(&mut f.surface, pending, Ok(sample_results()), t0)
            .unwrap();
        f.session.reset();
        f.annotations.clear();

        f.tick(t0 + ms(1000));
        assert_eq!(f.annotations.len(), 2);
        assert_eq!(f.session.state(), SessionState::Idle);
    }
}
