use std::sync::Arc;

use crate::{Color, Error, Result};

/// Compositing mode of fills, strokes and image draws.
///
/// The non-separable CSS modes (`hue`, `saturation`, `color`, `luminosity`)
/// and `hardMix` are rejected by [`BlendMode::from_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Add,
}

impl BlendMode {
    /// Parses a script-facing mode name.
    ///
    /// # Errors
    ///
    /// Unknown names and the documented rejected modes fail with
    /// [`Error::UnsupportedBlendMode`].
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "normal" | "srcOver" => Ok(Self::Normal),
            "multiply" => Ok(Self::Multiply),
            "screen" => Ok(Self::Screen),
            "overlay" => Ok(Self::Overlay),
            "darken" => Ok(Self::Darken),
            "lighten" => Ok(Self::Lighten),
            "colorDodge" => Ok(Self::ColorDodge),
            "colorBurn" => Ok(Self::ColorBurn),
            "hardLight" => Ok(Self::HardLight),
            "softLight" => Ok(Self::SoftLight),
            "difference" => Ok(Self::Difference),
            "exclusion" => Ok(Self::Exclusion),
            "add" => Ok(Self::Add),
            other => Err(Error::UnsupportedBlendMode(other.to_string())),
        }
    }

    pub(crate) fn to_skia(self) -> tiny_skia::BlendMode {
        match self {
            Self::Normal => tiny_skia::BlendMode::SourceOver,
            Self::Multiply => tiny_skia::BlendMode::Multiply,
            Self::Screen => tiny_skia::BlendMode::Screen,
            Self::Overlay => tiny_skia::BlendMode::Overlay,
            Self::Darken => tiny_skia::BlendMode::Darken,
            Self::Lighten => tiny_skia::BlendMode::Lighten,
            Self::ColorDodge => tiny_skia::BlendMode::ColorDodge,
            Self::ColorBurn => tiny_skia::BlendMode::ColorBurn,
            Self::HardLight => tiny_skia::BlendMode::HardLight,
            Self::SoftLight => tiny_skia::BlendMode::SoftLight,
            Self::Difference => tiny_skia::BlendMode::Difference,
            Self::Exclusion => tiny_skia::BlendMode::Exclusion,
            Self::Add => tiny_skia::BlendMode::Plus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "miter" => Some(Self::Miter),
            "round" => Some(Self::Round),
            "bevel" => Some(Self::Bevel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "butt" => Some(Self::Butt),
            "round" => Some(Self::Round),
            "square" => Some(Self::Square),
            _ => None,
        }
    }
}

/// Stroke parameters, part of the drawing state.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub width: f32,
    pub join: LineJoin,
    pub cap: LineCap,
    pub miter_limit: f32,
    /// Empty = solid.
    pub dash: Vec<f32>,
    pub dash_offset: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: 1.0,
            join: LineJoin::Miter,
            cap: LineCap::Butt,
            miter_limit: 10.0,
            dash: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpreadMode {
    #[default]
    Pad,
    Repeat,
    Reflect,
}

impl SpreadMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pad" => Some(Self::Pad),
            "repeat" => Some(Self::Repeat),
            "reflect" => Some(Self::Reflect),
            _ => None,
        }
    }

    pub(crate) fn to_skia(self) -> tiny_skia::SpreadMode {
        match self {
            Self::Pad => tiny_skia::SpreadMode::Pad,
            Self::Repeat => tiny_skia::SpreadMode::Repeat,
            Self::Reflect => tiny_skia::SpreadMode::Reflect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Position in `[0, 1]`.
    pub offset: f32,
    /// Straight-alpha ARGB.
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientKind {
    Linear { from: (f32, f32), to: (f32, f32) },
    Radial { center: (f32, f32), radius: f32 },
}

/// A gradient paint object, bound to the fill or stroke source through its
/// registry handle.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientPaint {
    pub kind: GradientKind,
    pub stops: Vec<GradientStop>,
    pub spread: SpreadMode,
}

impl GradientPaint {
    /// Validates stop offsets and sorts them ascending (stable).
    ///
    /// # Errors
    ///
    /// Fails when any offset is outside `[0, 1]` or not finite, or when no
    /// stops were provided.
    pub fn new(kind: GradientKind, mut stops: Vec<GradientStop>, spread: SpreadMode) -> Result<Self> {
        if stops.is_empty() {
            return Err(Error::BadGradientStop(f32::NAN));
        }
        for stop in &stops {
            if !stop.offset.is_finite() || !(0.0..=1.0).contains(&stop.offset) {
                return Err(Error::BadGradientStop(stop.offset));
            }
        }
        stops.sort_by(|x, y| x.offset.partial_cmp(&y.offset).unwrap());
        Ok(Self {
            kind,
            stops,
            spread,
        })
    }
}

/// Fill or stroke source: a solid color or a bound paint object.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintSource {
    Solid(Color),
    Gradient(Arc<GradientPaint>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    /// Alias of `left` in the runtime's left-to-right-only layout.
    Start,
    /// Alias of `right` in the runtime's left-to-right-only layout.
    End,
}

impl TextAlign {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            "start" => Some(Self::Start),
            "end" => Some(Self::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    Top,
    Middle,
    #[default]
    Alphabetic,
    Bottom,
}

impl TextBaseline {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "top" => Some(Self::Top),
            "middle" => Some(Self::Middle),
            "alphabetic" => Some(Self::Alphabetic),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_mode_aliases_and_rejection() {
        assert_eq!(BlendMode::from_name("srcOver").unwrap(), BlendMode::Normal);
        assert_eq!(BlendMode::from_name("add").unwrap(), BlendMode::Add);
        for rejected in ["hue", "saturation", "color", "luminosity", "hardMix", "bogus"] {
            assert!(matches!(
                BlendMode::from_name(rejected),
                Err(Error::UnsupportedBlendMode(_))
            ));
        }
    }

    #[test]
    fn gradient_stops_validate_and_sort() {
        let stops = vec![
            GradientStop { offset: 0.9, color: Color::WHITE },
            GradientStop { offset: 0.1, color: Color::BLACK },
        ];
        let paint = GradientPaint::new(
            GradientKind::Linear { from: (0.0, 0.0), to: (1.0, 0.0) },
            stops,
            SpreadMode::Pad,
        )
        .unwrap();
        assert_eq!(paint.stops[0].offset, 0.1);

        assert!(GradientPaint::new(
            GradientKind::Radial { center: (0.0, 0.0), radius: 4.0 },
            vec![GradientStop { offset: 1.5, color: Color::WHITE }],
            SpreadMode::Pad,
        )
        .is_err());
    }
}
