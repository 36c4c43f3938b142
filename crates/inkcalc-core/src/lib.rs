//! InkCalc Core Library
//!
//! Platform-agnostic drawing surface, annotation overlay and recognition session
//! for the InkCalc handwritten-math board.

pub mod annotation;
pub mod backend;
pub mod board;
pub mod config;
pub mod drag;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod notice;
pub mod schedule;
pub mod session;
pub mod style;
pub mod surface;
pub mod typeset;

pub use annotation::{Annotation, AnnotationId, AnnotationStore, format_equation};
pub use backend::{
    CalculateRequest, CalculateResponse, HttpBackend, RecognitionBackend, RecognitionResult,
    StaticBackend,
};
pub use board::{Board, BoardSnapshot};
pub use config::{CalcConfig, CancelPolicy, ViewportConfig};
pub use drag::DragController;
pub use error::{CalcError, CalcResult};
pub use input::{PointerEvent, StrokeInput};
pub use notice::NoticeBoard;
pub use schedule::{Generation, Scheduler};
pub use session::{Completion, PendingRequest, RecognitionSession, SessionState, VariableBindings};
pub use style::{SWATCHES, SerializableColor, StrokeStyle, parse_css_color};
pub use surface::Surface;
pub use typeset::{TypesetEngine, TypesetTrigger};
