//! Canvas configuration: fixed geometry, background fill, font size.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canvas width in logical px.
pub const CANVAS_WIDTH: u32 = 360;
/// Height of the editing viewport used for layout and overflow.
pub const LAYOUT_HEIGHT: u32 = 480;
/// Height of the exported raster.
pub const EXPORT_HEIGHT: u32 = 640;
/// Padding on every side of the content box.
pub const CONTENT_PADDING: u32 = 55;

pub const MIN_FONT_SIZE_PX: u32 = 12;
pub const MAX_FONT_SIZE_PX: u32 = 32;
pub const FONT_SIZE_STEP_PX: u32 = 2;
pub const DEFAULT_FONT_SIZE_PX: u32 = 18;

/// Body text color (`#111827`).
pub const DEFAULT_TEXT_COLOR: Rgb = Rgb::new(0x11, 0x18, 0x27);
pub const DEFAULT_FONT_FAMILY: &str =
    "Inter, ui-sans-serif, system-ui, -apple-system, 'Segoe UI', Roboto, 'Helvetica Neue', Arial";

/// Gradient presets offered by the background picker. Index 0 is the default.
pub const BACKGROUND_PRESETS: [&str; 6] = [
    "linear-gradient(180deg,#fff,#f8fafc)",
    "linear-gradient(180deg,#fde68a,#fca5a5)",
    "linear-gradient(180deg,#d8b4fe,#93c5fd)",
    "linear-gradient(180deg,#bbf7d0,#86efac)",
    "linear-gradient(180deg,#fef3c7,#fed7aa)",
    "linear-gradient(180deg,#f0abfc,#c4b5fd)",
];

/// 8-bit sRGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rgb` or `#rrggbb`.
    pub fn parse_hex(input: &str) -> Option<Self> {
        let hex = input.trim().strip_prefix('#')?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |idx: usize| u8::from_str_radix(&hex[idx..idx + 1], 16).ok();
        let byte = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
        match hex.len() {
            3 => Some(Self::new(
                nibble(0)? * 0x11,
                nibble(1)? * 0x11,
                nibble(2)? * 0x11,
            )),
            6 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?)),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Linear interpolation, `t` clamped to `0..=1`.
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Color stop of a linear gradient; `position` is a fraction of the
/// gradient line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub color: Rgb,
    pub position: f32,
}

/// Background fill.
///
/// Serialized as its CSS string, e.g. `linear-gradient(180deg,#fff,#f8fafc)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Background {
    Solid(Rgb),
    LinearGradient {
        /// CSS angle: 0 points up, 90 right, 180 down.
        angle_deg: f32,
        stops: Vec<GradientStop>,
    },
}

/// CSS background string that is neither a hex color nor a linear gradient.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unsupported background `{0}`")]
pub struct BackgroundParseError(pub String);

impl Default for Background {
    fn default() -> Self {
        Self::preset(0).unwrap_or(Background::Solid(Rgb::WHITE))
    }
}

impl Background {
    pub fn preset(index: usize) -> Option<Self> {
        BACKGROUND_PRESETS
            .get(index)
            .and_then(|css| Self::parse_css(css).ok())
    }

    pub fn parse_css(input: &str) -> Result<Self, BackgroundParseError> {
        let trimmed = input.trim();
        let err = || BackgroundParseError(trimmed.to_string());
        if let Some(color) = Rgb::parse_hex(trimmed) {
            return Ok(Background::Solid(color));
        }
        let args = trimmed
            .strip_prefix("linear-gradient(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(err)?;
        let mut parts = args.split(',').map(str::trim).peekable();
        let angle_deg = match parts.peek().copied().and_then(parse_angle) {
            Some(angle) => {
                parts.next();
                angle
            }
            None => 180.0,
        };

        let mut raw: Vec<(Rgb, Option<f32>)> = Vec::new();
        for part in parts {
            let mut tokens = part.split_whitespace();
            let color = tokens.next().and_then(Rgb::parse_hex).ok_or_else(err)?;
            let position = match tokens.next() {
                Some(token) => Some(
                    token
                        .strip_suffix('%')
                        .and_then(|pct| pct.parse::<f32>().ok())
                        .ok_or_else(err)?
                        / 100.0,
                ),
                None => None,
            };
            raw.push((color, position));
        }
        if raw.is_empty() {
            return Err(err());
        }
        if raw.len() == 1 {
            return Ok(Background::Solid(raw[0].0));
        }
        let last = (raw.len() - 1) as f32;
        let stops = raw
            .into_iter()
            .enumerate()
            .map(|(idx, (color, position))| GradientStop {
                color,
                position: position.unwrap_or(idx as f32 / last),
            })
            .collect();
        Ok(Background::LinearGradient { angle_deg, stops })
    }

    pub fn to_css(&self) -> String {
        match self {
            Background::Solid(color) => color.to_hex(),
            Background::LinearGradient { angle_deg, stops } => {
                let last = stops.len().saturating_sub(1).max(1) as f32;
                let mut out = format!("linear-gradient({}deg", trim_float(*angle_deg));
                for (idx, stop) in stops.iter().enumerate() {
                    out.push(',');
                    out.push_str(&stop.color.to_hex());
                    if (stop.position - idx as f32 / last).abs() > f32::EPSILON {
                        out.push(' ');
                        out.push_str(&trim_float(stop.position * 100.0));
                        out.push('%');
                    }
                }
                out.push(')');
                out
            }
        }
    }

    /// Color at pixel center `(x, y)` of a `width` x `height` surface.
    pub fn color_at(&self, x: f32, y: f32, width: f32, height: f32) -> Rgb {
        match self {
            Background::Solid(color) => *color,
            Background::LinearGradient { angle_deg, stops } => {
                let rad = angle_deg.to_radians();
                let (dx, dy) = (rad.sin(), -rad.cos());
                let line = (width * dx).abs() + (height * dy).abs();
                if line <= f32::EPSILON {
                    return stops.first().map(|stop| stop.color).unwrap_or(Rgb::WHITE);
                }
                let t = ((x - width / 2.0) * dx + (y - height / 2.0) * dy) / line + 0.5;
                sample_stops(stops, t)
            }
        }
    }
}

fn parse_angle(token: &str) -> Option<f32> {
    if let Some(deg) = token.strip_suffix("deg") {
        return deg.trim().parse().ok();
    }
    match token {
        "to top" => Some(0.0),
        "to right" => Some(90.0),
        "to bottom" => Some(180.0),
        "to left" => Some(270.0),
        _ => None,
    }
}

fn sample_stops(stops: &[GradientStop], t: f32) -> Rgb {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Rgb::WHITE;
    };
    if t <= first.position {
        return first.color;
    }
    if t >= last.position {
        return last.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.position {
            let span = b.position - a.position;
            if span <= f32::EPSILON {
                return b.color;
            }
            return a.color.lerp(b.color, (t - a.position) / span);
        }
    }
    last.color
}

fn trim_float(value: f32) -> String {
    if value.fract().abs() < 1e-4 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value}")
    }
}

impl From<Background> for String {
    fn from(value: Background) -> Self {
        value.to_css()
    }
}

impl TryFrom<String> for Background {
    type Error = BackgroundParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Background::parse_css(&value)
    }
}

/// Body font size in px, clamped to `12..=32` and snapped to the 2 px step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct FontSize(u32);

impl FontSize {
    pub fn new(px: u32) -> Self {
        let clamped = px.clamp(MIN_FONT_SIZE_PX, MAX_FONT_SIZE_PX);
        Self(MIN_FONT_SIZE_PX + (clamped - MIN_FONT_SIZE_PX) / FONT_SIZE_STEP_PX * FONT_SIZE_STEP_PX)
    }

    pub fn px(self) -> u32 {
        self.0
    }

    pub fn increase(self) -> Self {
        Self::new(self.0 + FONT_SIZE_STEP_PX)
    }

    pub fn decrease(self) -> Self {
        Self::new(self.0.saturating_sub(FONT_SIZE_STEP_PX))
    }

    pub fn can_increase(self) -> bool {
        self.0 < MAX_FONT_SIZE_PX
    }

    pub fn can_decrease(self) -> bool {
        self.0 > MIN_FONT_SIZE_PX
    }
}

impl Default for FontSize {
    fn default() -> Self {
        Self(DEFAULT_FONT_SIZE_PX)
    }
}

impl From<u32> for FontSize {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<FontSize> for u32 {
    fn from(value: FontSize) -> Self {
        value.0
    }
}

/// Session-scoped canvas settings.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasConfig {
    /// Canvas width in px, shared by layout and export.
    pub width: u32,
    /// Visible editing height; content beyond it overflows.
    pub layout_height: u32,
    /// Exported raster height.
    pub export_height: u32,
    /// Content padding on every side.
    pub padding: u32,
    pub background: Background,
    pub font_size: FontSize,
    pub text_color: Rgb,
    pub font_family: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            layout_height: LAYOUT_HEIGHT,
            export_height: EXPORT_HEIGHT,
            padding: CONTENT_PADDING,
            background: Background::default(),
            font_size: FontSize::default(),
            text_color: DEFAULT_TEXT_COLOR,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

impl CanvasConfig {
    /// The fixed 360x480 portrait canvas.
    pub fn portrait() -> Self {
        Self::default()
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_font_size(mut self, font_size: FontSize) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_text_color(mut self, color: Rgb) -> Self {
        self.text_color = color;
        self
    }

    pub fn content_width(&self) -> u32 {
        self.width.saturating_sub(self.padding * 2)
    }

    pub fn visible_height(&self) -> f32 {
        self.layout_height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_parse_as_vertical_gradients() {
        for idx in 0..BACKGROUND_PRESETS.len() {
            let bg = Background::preset(idx).expect("preset parses");
            match bg {
                Background::LinearGradient { angle_deg, ref stops } => {
                    assert_eq!(angle_deg, 180.0);
                    assert_eq!(stops.len(), 2);
                }
                Background::Solid(_) => panic!("preset {idx} parsed as solid"),
            }
            assert_eq!(bg.to_css(), BACKGROUND_PRESETS[idx].replace("#fff,", "#ffffff,"));
        }
        assert!(Background::preset(6).is_none());
    }

    #[test]
    fn gradient_samples_top_and_bottom_stops() {
        let bg = Background::preset(1).expect("preset");
        let top = bg.color_at(180.0, 0.0, 360.0, 640.0);
        let bottom = bg.color_at(180.0, 640.0, 360.0, 640.0);
        assert_eq!(top, Rgb::parse_hex("#fde68a").expect("hex"));
        assert_eq!(bottom, Rgb::parse_hex("#fca5a5").expect("hex"));
        let mid = bg.color_at(180.0, 320.0, 360.0, 640.0);
        assert_ne!(mid, top);
        assert_ne!(mid, bottom);
    }

    #[test]
    fn custom_picker_color_is_solid() {
        let bg = Background::parse_css("#3366cc").expect("color");
        assert_eq!(bg, Background::Solid(Rgb::new(0x33, 0x66, 0xcc)));
        assert_eq!(bg.color_at(10.0, 10.0, 360.0, 640.0), Rgb::new(0x33, 0x66, 0xcc));
    }

    #[test]
    fn explicit_stop_positions_survive_printing() {
        let bg = Background::parse_css("linear-gradient(90deg, #000 10%, #fff 90%)").expect("parse");
        assert_eq!(bg.to_css(), "linear-gradient(90deg,#000000 10%,#ffffff 90%)");
    }

    #[test]
    fn rejects_unknown_css() {
        assert!(Background::parse_css("url(x.png)").is_err());
        assert!(Background::parse_css("linear-gradient(180deg)").is_err());
        assert!(Rgb::parse_hex("#12345").is_none());
    }

    #[test]
    fn background_serializes_as_css_string() {
        let json = serde_json::to_string(&Background::default()).expect("serialize");
        assert_eq!(json, "\"linear-gradient(180deg,#ffffff,#f8fafc)\"");
        let back: Background = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Background::default());
    }

    #[test]
    fn font_size_clamps_and_steps() {
        assert_eq!(FontSize::default().px(), 18);
        assert_eq!(FontSize::new(5).px(), 12);
        assert_eq!(FontSize::new(99).px(), 32);
        assert_eq!(FontSize::new(19).px(), 18);
        assert_eq!(FontSize::new(32).increase().px(), 32);
        assert_eq!(FontSize::new(12).decrease().px(), 12);
        assert!(!FontSize::new(32).can_increase());
        assert_eq!(FontSize::default().increase().px(), 20);
    }

    #[test]
    fn portrait_content_box() {
        let canvas = CanvasConfig::portrait();
        assert_eq!(canvas.content_width(), 250);
        assert_eq!(canvas.visible_height(), 480.0);
        assert_eq!(canvas.export_height, 640);
    }
}
