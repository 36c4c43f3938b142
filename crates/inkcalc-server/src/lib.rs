//! InkCalc stub recognition service
//!
//! Implements the recognition HTTP contract without recognizing anything, for
//! local runs and end-to-end tests.
//!
//! ## Protocol
//!
//! ```json
//! POST /calculate
//! { "image": "data:image/png;base64,...", "dict_of_vars": { "x": "5" } }
//!
//! 200 { "message": "Image processed", "status": "success",
//!       "data": [{ "expr": "x", "result": "5", "assign": true }] }
//! 400 { "detail": "Invalid Drawing data: ..." }
//! 500 { "detail": "Error processing Drawing" }
//! ```
//!
//! Answers come from a canned list when one is configured; otherwise the
//! service reports how much ink the drawing contains.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use inkcalc_core::{CalculateRequest, CalculateResponse, RecognitionResult, parse_css_color};
use serde_json::json;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Environment variable holding the listen address.
pub const ENV_SERVER_ADDR: &str = "INKCALC_SERVER_ADDR";
/// Environment variable holding the canned responses file.
pub const ENV_STUB_RESPONSES: &str = "INKCALC_STUB_RESPONSES";
/// Default listen address (the recognition service's usual port).
pub const DEFAULT_ADDR: &str = "0.0.0.0:8900";

/// Variable the client may set to tell the service its stroke color.
const STROKE_COLOR_VAR: &str = "strokeColor";

/// Errors returned to clients as `{ "detail": ... }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid Drawing data: {0}")]
    InvalidDrawing(String),
    #[error("{0}")]
    Malformed(String),
    #[error("Error processing Drawing")]
    Processing,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidDrawing(_) => StatusCode::BAD_REQUEST,
            ApiError::Malformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Processing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("Request failed: {}", self);
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Errors while starting the service.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid INKCALC_SERVER_ADDR {0:?}")]
    Addr(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid responses file {path}: {source}")]
    Responses {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub responses_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup(ENV_SERVER_ADDR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw.trim().parse().map_err(|_| ServerError::Addr(raw.clone()))?;
        let responses_path = lookup(ENV_STUB_RESPONSES)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Ok(Self { addr, responses_path })
    }
}

/// Shared application state
#[derive(Debug, Default)]
pub struct AppState {
    /// Canned answers; `None` means summarize the ink instead.
    responses: Option<Vec<RecognitionResult>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<RecognitionResult>) -> Self {
        Self {
            responses: Some(responses),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        match &config.responses_path {
            Some(path) => Ok(Self::with_responses(load_responses(path)?)),
            None => Ok(Self::new()),
        }
    }
}

/// Read a JSON array of results.
pub fn load_responses(path: &Path) -> Result<Vec<RecognitionResult>, ServerError> {
    let json = std::fs::read_to_string(path).map_err(|source| ServerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let responses: Vec<RecognitionResult> =
        serde_json::from_str(&json).map_err(|source| ServerError::Responses {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Loaded {} canned responses from {}", responses.len(), path.display());
    Ok(responses)
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/calculate", post(calculate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "InkCalc stub recognition service - POST drawings to /calculate"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

async fn calculate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::Malformed(rejection.body_text()))?;
    info!(
        "Calculate request ({} bytes image, {} variables)",
        request.image.len(),
        request.dict_of_vars.len()
    );

    let background = match request.dict_of_vars.get(STROKE_COLOR_VAR) {
        Some(color) => {
            let stroke = parse_css_color(color).ok_or_else(|| {
                ApiError::InvalidDrawing(format!("unrecognized stroke color {:?}", color))
            })?;
            background_for([stroke.r, stroke.g, stroke.b])
        }
        None => WHITE,
    };
    let drawing = Drawing::decode(&request.image)?.flatten(background);

    let data = match &state.responses {
        Some(responses) => responses.clone(),
        None => summarize(&drawing, background),
    };
    if data.is_empty() {
        return Err(ApiError::Processing);
    }

    info!("Answering with {} results", data.len());
    Ok(Json(CalculateResponse {
        data,
        message: Some("Image processed".to_string()),
        status: Some("success".to_string()),
    }))
}

const WHITE: [u8; 3] = [255, 255, 255];
const BLACK: [u8; 3] = [0, 0, 0];

/// Light strokes are shown on black, dark strokes on white.
fn background_for(stroke: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = stroke.map(f64::from);
    if r * 0.299 + g * 0.587 + b * 0.114 > 186.0 { BLACK } else { WHITE }
}

/// A decoded drawing as RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Drawing {
    /// Decode a PNG given as a data URI or bare base64.
    pub fn decode(image: &str) -> Result<Self, ApiError> {
        let b64 = image.split_once(',').map_or(image, |(_, data)| data);
        let bytes = STANDARD
            .decode(b64.trim())
            .map_err(|e| ApiError::InvalidDrawing(e.to_string()))?;
        Self::decode_png(&bytes).map_err(ApiError::InvalidDrawing)
    }

    fn decode_png(bytes: &[u8]) -> Result<Self, String> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info().map_err(|e| e.to_string())?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).map_err(|e| e.to_string())?;
        let data = &buf[..info.buffer_size()];

        let pixels = match info.color_type {
            png::ColorType::Rgba => data.to_vec(),
            png::ColorType::Rgb => {
                data.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect()
            }
            png::ColorType::GrayscaleAlpha => {
                data.chunks_exact(2).flat_map(|p| [p[0], p[0], p[0], p[1]]).collect()
            }
            png::ColorType::Grayscale => data.iter().flat_map(|&v| [v, v, v, 255]).collect(),
            png::ColorType::Indexed => return Err("unexpanded palette image".to_string()),
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            pixels,
        })
    }

    /// Composite onto an opaque `background`.
    pub fn flatten(mut self, background: [u8; 3]) -> Self {
        for pixel in self.pixels.chunks_exact_mut(4) {
            let alpha = u32::from(pixel[3]);
            for (channel, bg) in pixel[..3].iter_mut().zip(background) {
                let mixed = u32::from(*channel) * alpha + u32::from(bg) * (255 - alpha);
                *channel = ((mixed + 127) / 255) as u8;
            }
            pixel[3] = 255;
        }
        self
    }

    /// Number of pixels that differ from `background`.
    pub fn ink_pixels(&self, background: [u8; 3]) -> usize {
        self.pixels
            .chunks_exact(4)
            .filter(|pixel| pixel[..3] != background)
            .count()
    }
}

/// Describe the ink in a flattened drawing; empty when there is none.
fn summarize(drawing: &Drawing, background: [u8; 3]) -> Vec<RecognitionResult> {
    let ink = drawing.ink_pixels(background);
    if ink == 0 {
        return Vec::new();
    }
    vec![RecognitionResult::new(
        "ink",
        format!("{} px of {}x{}", ink, drawing.width, drawing.height),
        false,
    )]
}
