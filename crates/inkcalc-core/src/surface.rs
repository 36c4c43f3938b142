//! Drawing surface: device-scaled pixel buffer plus stroke rendering.
//!
//! Callers work in CSS pixels relative to the surface's top-left corner. The
//! surface owns the logical-to-device transform (`Affine::scale(dpr)`) and maps
//! every stroke through it before touching the buffer, so a stroke drawn at
//! `(10, 10)` on a 2x display lands on device pixel `(20, 20)`.
//!
//! Known limitation: the buffer is sized once; viewport resizes are not handled.

use crate::config::ViewportConfig;
use crate::error::{CalcError, CalcResult};
use crate::style::{LineCap, SerializableColor, StrokeStyle};
use base64::Engine;
use kurbo::{Affine, Point, Size, Vec2};
use peniko::color::Rgba8;

/// Bytes per RGBA8 pixel.
const BYTES_PER_PIXEL: usize = 4;

/// Largest buffer side in device pixels.
pub const MAX_DIMENSION_PX: u32 = 16_384;

/// Prefix of the snapshot data URI.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// A freehand drawing surface backed by an RGBA8 buffer (straight alpha).
#[derive(Debug, Clone)]
pub struct Surface {
    /// Viewport size in CSS pixels.
    size: Size,
    /// Device pixel ratio.
    scale: f64,
    /// Buffer width in device pixels.
    width_px: u32,
    /// Buffer height in device pixels.
    height_px: u32,
    /// CSS-pixel to device-pixel transform.
    transform: Affine,
    /// Top-left of the surface's bounding rectangle, in client coordinates.
    origin: Point,
    /// Pixel data, row-major RGBA8.
    pixels: Vec<u8>,
    /// Style for subsequent segments.
    style: StrokeStyle,
    /// Current path position in CSS pixels.
    cursor: Option<Point>,
}

impl Surface {
    /// Allocate a surface of `width × height` CSS pixels at the given device pixel ratio.
    ///
    /// The buffer is `floor(width·dpr) × floor(height·dpr)` device pixels, fully
    /// transparent, with the default stroke style (width 3, square caps, black).
    pub fn initialize(width: f64, height: f64, device_pixel_ratio: f64) -> CalcResult<Self> {
        if !(device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0) {
            return Err(CalcError::Config(format!(
                "device pixel ratio must be positive, got {}",
                device_pixel_ratio
            )));
        }
        if !(width.is_finite() && height.is_finite() && width >= 1.0 && height >= 1.0) {
            return Err(CalcError::Config(format!(
                "viewport must be at least 1x1, got {}x{}",
                width, height
            )));
        }

        let width_f = (width * device_pixel_ratio).floor().max(1.0);
        let height_f = (height * device_pixel_ratio).floor().max(1.0);
        let limit = f64::from(MAX_DIMENSION_PX);
        if width_f > limit || height_f > limit {
            return Err(CalcError::Config(format!(
                "surface {}x{} px exceeds the {} px limit",
                width_f, height_f, MAX_DIMENSION_PX
            )));
        }
        let width_px = width_f as u32;
        let height_px = height_f as u32;
        let len = (width_px as usize)
            .checked_mul(height_px as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| {
                CalcError::Config(format!("surface {}x{} px is too large", width_px, height_px))
            })?;
        log::debug!(
            "Surface {}x{} css @ {}x -> {}x{} px",
            width,
            height,
            device_pixel_ratio,
            width_px,
            height_px
        );

        Ok(Self {
            size: Size::new(width, height),
            scale: device_pixel_ratio,
            width_px,
            height_px,
            transform: Affine::scale(device_pixel_ratio),
            origin: Point::ZERO,
            pixels: vec![0; len],
            style: StrokeStyle::default(),
            cursor: None,
        })
    }

    /// Create a surface from a viewport description.
    pub fn from_viewport(viewport: &ViewportConfig) -> CalcResult<Self> {
        let mut surface =
            Self::initialize(viewport.width, viewport.height, viewport.device_pixel_ratio)?;
        surface.set_origin(Point::new(viewport.origin_x, viewport.origin_y));
        Ok(surface)
    }

    /// Viewport size in CSS pixels.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Device pixel ratio.
    pub fn device_pixel_ratio(&self) -> f64 {
        self.scale
    }

    /// Buffer size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width_px, self.height_px)
    }

    /// Top-left of the bounding rectangle in client coordinates.
    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Move the bounding rectangle (e.g. after the host lays out the page).
    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    /// Map a client-space pointer position to canvas-local CSS pixels.
    pub fn to_local(&self, client: Point) -> Point {
        client - self.origin.to_vec2()
    }

    /// Visual center of the surface in canvas-local CSS pixels.
    pub fn center(&self) -> Point {
        Point::new(self.size.width / 2.0, self.size.height / 2.0)
    }

    /// Current stroke style.
    pub fn stroke_style(&self) -> StrokeStyle {
        self.style
    }

    /// Change the stroke color for segments painted from now on.
    pub fn set_stroke_color(&mut self, color: SerializableColor) {
        self.style.color = color;
    }

    /// Start a new path at `point` (canvas-local CSS pixels). Paints nothing.
    pub fn begin_stroke(&mut self, point: Point) {
        self.cursor = Some(point);
    }

    /// Paint a segment from the current path position to `point` and advance.
    ///
    /// Without a current position this only moves the path to `point`.
    pub fn extend_stroke(&mut self, point: Point) {
        if let Some(from) = self.cursor {
            self.paint_segment(from, point);
        }
        self.cursor = Some(point);
    }

    /// Erase the buffer to transparent and restore default width and cap.
    ///
    /// The current color is kept; the open path is dropped.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
        self.style = StrokeStyle::with_color(self.style.color);
        self.cursor = None;
    }

    /// True iff every pixel has zero alpha.
    pub fn is_blank(&self) -> bool {
        self.pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .all(|px| px[3] == 0)
    }

    /// RGBA value of a device pixel, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width_px || y >= self.height_px {
            return None;
        }
        let i = self.index(x, y);
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    /// Raw RGBA8 buffer.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Encode the buffer as PNG bytes.
    pub fn encode_png(&self) -> CalcResult<Vec<u8>> {
        let mut data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut data, self.width_px, self.height_px);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| CalcError::Encode(e.to_string()))?;
            writer
                .write_image_data(&self.pixels)
                .map_err(|e| CalcError::Encode(e.to_string()))?;
            writer.finish().map_err(|e| CalcError::Encode(e.to_string()))?;
        }
        Ok(data)
    }

    /// Serialize the buffer as a `data:image/png;base64,…` URI.
    pub fn export_snapshot(&self) -> CalcResult<String> {
        let png = self.encode_png()?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
        Ok(format!("{}{}", PNG_DATA_URI_PREFIX, encoded))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width_px as usize + x as usize) * BYTES_PER_PIXEL
    }

    /// Rasterize one segment (CSS pixels) into the device buffer.
    fn paint_segment(&mut self, from: Point, to: Point) {
        let a = self.transform * from;
        let b = self.transform * to;
        let half = self.style.width * self.scale / 2.0;
        if half <= 0.0 {
            return;
        }
        let cap = self.style.cap;
        let color = self.style.stroke().to_rgba8();

        // Square-cap corners reach half·√2 past the endpoints.
        let pad = half * std::f64::consts::SQRT_2 + 1.0;
        let x0 = (a.x.min(b.x) - pad).floor().max(0.0);
        let y0 = (a.y.min(b.y) - pad).floor().max(0.0);
        let x1 = (a.x.max(b.x) + pad).ceil().min(self.width_px as f64);
        let y1 = (a.y.max(b.y) + pad).ceil().min(self.height_px as f64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let d = b - a;
        for py in y0 as u32..y1 as u32 {
            for px in x0 as u32..x1 as u32 {
                let center = Point::new(px as f64 + 0.5, py as f64 + 0.5);
                if covers(center, a, d, half, cap) {
                    self.blend(px, py, color);
                }
            }
        }
    }

    /// Source-over blend of `color` onto one pixel.
    fn blend(&mut self, x: u32, y: u32, color: Rgba8) {
        let i = self.index(x, y);
        if color.a == 255 {
            self.pixels[i..i + BYTES_PER_PIXEL].copy_from_slice(&[color.r, color.g, color.b, 255]);
            return;
        }

        let sa = color.a as f64 / 255.0;
        let da = self.pixels[i + 3] as f64 / 255.0;
        let out_a = sa + da * (1.0 - sa);
        if out_a <= 0.0 {
            return;
        }
        let src = [color.r, color.g, color.b];
        for (c, &s) in src.iter().enumerate() {
            let d = self.pixels[i + c] as f64;
            let v = (s as f64 * sa + d * da * (1.0 - sa)) / out_a;
            self.pixels[i + c] = v.round().clamp(0.0, 255.0) as u8;
        }
        self.pixels[i + 3] = (out_a * 255.0).round() as u8;
    }
}

/// Whether device point `p` lies inside the stroked segment `a → a + d`.
fn covers(p: Point, a: Point, d: Vec2, half: f64, cap: LineCap) -> bool {
    let v = p - a;
    let len = d.hypot();
    if len < f64::EPSILON {
        return match cap {
            LineCap::Butt => false,
            LineCap::Round => v.hypot() <= half,
            LineCap::Square => v.x.abs() <= half && v.y.abs() <= half,
        };
    }

    let dir = d / len;
    let along = v.dot(dir);
    let across = v.cross(dir).abs();
    if across > half {
        return false;
    }
    match cap {
        LineCap::Butt => (0.0..=len).contains(&along),
        LineCap::Square => (-half..=len + half).contains(&along),
        LineCap::Round => {
            if along < 0.0 {
                v.hypot() <= half
            } else if along > len {
                (v - d).hypot() <= half
            } else {
                true
            }
        }
    }
}
