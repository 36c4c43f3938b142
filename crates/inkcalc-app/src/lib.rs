//! InkCalc Application
//!
//! Headless host for the board: loads a recorded pointer script, replays it,
//! runs calculations and drives deferred work until the board settles.

use inkcalc_core::{
    AnnotationId, Board, BoardSnapshot, CalcConfig, CalcError, PointerEvent, RecognitionBackend,
    ViewportConfig,
};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

/// Errors that stop a script run.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid script: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Calc(#[from] CalcError),
}

/// One recorded step. Coordinates are client coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up,
    Leave,
    /// Select a stroke color (CSS string, e.g. a swatch).
    Color { value: String },
    /// Press Calculate and wait for the presentation to finish.
    Calculate,
    /// Press Reset.
    Reset,
    /// Drag annotation `annotation` from one client point to another.
    Drag {
        annotation: u64,
        from: Point,
        to: Point,
    },
}

/// A recorded session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub viewport: ViewportConfig,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Outcome of a script run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub board: BoardSnapshot,
    /// Notices shown along the way, oldest first.
    pub notices: Vec<String>,
}

/// Wait for every deferred task on `board` to run.
pub async fn settle(board: &mut Board) {
    while let Some(due) = board.next_due() {
        tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await;
        board.tick(Instant::now());
    }
}

/// Replay `script` on a fresh board, calculating against `backend`.
pub async fn run_script<B>(
    config: &CalcConfig,
    script: &Script,
    backend: &B,
) -> Result<RunReport, AppError>
where
    B: RecognitionBackend + ?Sized,
{
    let mut board = Board::new(config, &script.viewport)?;
    let mut notices = Vec::new();

    for step in &script.steps {
        match step {
            Step::Down { x, y } => board.handle_pointer(PointerEvent::Down { x: *x, y: *y }),
            Step::Move { x, y } => board.handle_pointer(PointerEvent::Move { x: *x, y: *y }),
            Step::Up => board.handle_pointer(PointerEvent::Up),
            Step::Leave => board.handle_pointer(PointerEvent::Leave),
            Step::Color { value } => board.set_color_css(value)?,
            Step::Calculate => {
                if let Err(e) = board.calculate(backend).await {
                    log::warn!("Calculate failed: {}", e);
                    notices.push(e.notice_text());
                }
                settle(&mut board).await;
            }
            Step::Reset => board.reset(),
            Step::Drag { annotation, from, to } => {
                if board.drag_start(AnnotationId(*annotation), *from) {
                    board.drag_move(*to);
                } else {
                    log::warn!("No annotation {} to drag", AnnotationId(*annotation));
                }
                board.drag_end();
            }
        }
    }

    Ok(RunReport {
        board: board.snapshot(),
        notices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkcalc_core::{RecognitionResult, SessionState, StaticBackend};

    const SCRIPT: &str = r#"{
        "viewport": { "width": 400, "height": 300, "device_pixel_ratio": 1.0 },
        "steps": [
            { "type": "color", "value": "rgb(0,0,255)" },
            { "type": "down", "x": 10, "y": 10 },
            { "type": "move", "x": 80, "y": 40 },
            { "type": "up" },
            { "type": "calculate" },
            {
                "type": "drag",
                "annotation": 1,
                "from": { "x": 205, "y": 155 },
                "to": { "x": 105, "y": 55 }
            }
        ]
    }"#;

    fn backend() -> StaticBackend {
        StaticBackend::new(vec![
            RecognitionResult::new("x", "5", true),
            RecognitionResult::new("x+2", "7", false),
        ])
    }

    #[test]
    fn test_parse_script() {
        let script = Script::from_json(SCRIPT).unwrap();
        assert_eq!(script.viewport.width, 400.0);
        assert_eq!(script.viewport.origin_x, 0.0);
        assert_eq!(script.steps.len(), 6);
        assert_eq!(script.steps[4], Step::Calculate);
    }

    #[test]
    fn test_load_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, SCRIPT).unwrap();
        assert_eq!(Script::load(&path).unwrap(), Script::from_json(SCRIPT).unwrap());

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Script::load(&path), Err(AppError::Json(_))));
    }

    #[tokio::test]
    async fn test_run_script() {
        let script = Script::from_json(SCRIPT).unwrap();
        let report = run_script(&CalcConfig::default(), &script, &backend()).await.unwrap();

        assert!(report.notices.is_empty());
        assert_eq!(report.board.state, SessionState::Idle);
        assert_eq!(report.board.variables.get("x").map(String::as_str), Some("5"));
        let annotations = &report.board.annotations;
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].position(), Point::new(100.0, 50.0));
        assert_eq!(annotations[1].position(), Point::new(200.0, 190.0));
    }

    #[tokio::test]
    async fn test_empty_calculate_is_a_notice() {
        let script = Script {
            steps: vec![Step::Calculate, Step::Reset],
            ..Script::default()
        };
        let backend = backend();
        let report = run_script(&CalcConfig::default(), &script, &backend).await.unwrap();
        assert_eq!(report.notices, vec!["Canvas is empty. Please draw something first."]);
        assert_eq!(backend.calls(), 0);
        assert!(report.board.annotations.is_empty());
    }

    #[tokio::test]
    async fn test_bad_color_stops_run() {
        let script = Script {
            steps: vec![Step::Color { value: "mauve-ish".into() }],
            ..Script::default()
        };
        let result = run_script(&CalcConfig::default(), &script, &backend()).await;
        assert!(matches!(result, Err(AppError::Calc(CalcError::Config(_)))));
    }
}
