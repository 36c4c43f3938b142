//! Stroke style, colors and the swatch palette.

use peniko::Color;
use serde::{Deserialize, Serialize};

/// Default stroke width in CSS pixels.
pub const DEFAULT_STROKE_WIDTH: f64 = 3.0;

/// Palette offered to the user, as CSS color strings.
pub const SWATCHES: [&str; 5] = [
    "rgb(0,0,0)",
    "rgb(255,0,0)",
    "rgb(0,128,0)",
    "rgb(0,0,255)",
    "rgb(255,165,0)",
];

/// Serializable color representation (RGBA8, straight alpha).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

}

impl Default for SerializableColor {
    fn default() -> Self {
        Self::black()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Line cap style used when stroking segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineCap {
    Butt,
    Round,
    #[default]
    Square,
}

/// The style applied to stroke segments as they are painted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    /// Stroke color.
    pub color: SerializableColor,
    /// Stroke width in CSS pixels.
    pub width: f64,
    /// Cap style at segment ends.
    pub cap: LineCap,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self::with_color(SerializableColor::black())
    }
}

impl StrokeStyle {
    /// Default width and cap with the given color.
    pub fn with_color(color: SerializableColor) -> Self {
        Self {
            color,
            width: DEFAULT_STROKE_WIDTH,
            cap: LineCap::Square,
        }
    }

    /// The stroke color as a peniko Color, as painted.
    pub fn stroke(&self) -> Color {
        self.color.into()
    }
}

/// Parse a CSS color of the form `rgb(r,g,b)`, `rgba(r,g,b,a)` or `#rrggbb`.
pub fn parse_css_color(input: &str) -> Option<SerializableColor> {
    let s = input.trim();
    if let Some(hex) = s.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(SerializableColor::new(channel(0)?, channel(2)?, channel(4)?, 255));
    }

    let (inner, has_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
        (rest.strip_suffix(')')?, true)
    } else {
        (s.strip_prefix("rgb(")?.strip_suffix(')')?, false)
    };

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let expected = if has_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }

    let r = parts[0].parse::<u8>().ok()?;
    let g = parts[1].parse::<u8>().ok()?;
    let b = parts[2].parse::<u8>().ok()?;
    let a = if has_alpha {
        let alpha = parts[3].parse::<f64>().ok()?;
        if !(0.0..=1.0).contains(&alpha) {
            return None;
        }
        (alpha * 255.0).round() as u8
    } else {
        255
    };
    Some(SerializableColor::new(r, g, b, a))
}
