//! Font loading, measurement and glyph layout.
//!
//! Measurement and drawing share one metrics source (the fontdue font and
//! its per-size line metrics), so `measureText` agrees with `fillText`
//! positioning by construction. Layout is a plain left-to-right advance
//! walk with pair kerning; complex shaping is out of scope.

use crate::{Error, Result};

/// What `gfx.measureText` reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f32,
    pub height: f32,
    pub ascent: f32,
    /// Negative below the baseline.
    pub descent: f32,
    pub line_height: f32,
}

/// A parsed font face, shared by the state stack and the command buffer.
pub struct FontResource {
    font: fontdue::Font,
}

/// One positioned glyph produced by [`FontResource::layout`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlacedGlyph {
    pub ch: char,
    /// Pen x offset from the text origin, pre-alignment.
    pub x: f32,
}

impl FontResource {
    /// Parses TTF/OTF bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|err| Error::FontDecode(err.to_string()))?;
        Ok(Self { font })
    }

    pub(crate) fn font(&self) -> &fontdue::Font {
        &self.font
    }

    /// Vertical metrics at a pixel size. Fonts without horizontal line
    /// metrics fall back to size-derived estimates.
    pub fn line_metrics(&self, px: f32) -> (f32, f32, f32) {
        match self.font.horizontal_line_metrics(px) {
            Some(metrics) => (metrics.ascent, metrics.descent, metrics.new_line_size),
            None => (px * 0.8, -px * 0.2, px * 1.2),
        }
    }

    /// Advance-walk layout: per-glyph pen positions plus the total width.
    pub(crate) fn layout(&self, text: &str, px: f32) -> (Vec<PlacedGlyph>, f32) {
        let mut glyphs = Vec::with_capacity(text.chars().count());
        let mut pen = 0.0_f32;
        let mut prev: Option<char> = None;
        for ch in text.chars() {
            if let Some(prev) = prev {
                if let Some(kern) = self.font.horizontal_kern(prev, ch, px) {
                    pen += kern;
                }
            }
            glyphs.push(PlacedGlyph { ch, x: pen });
            pen += self.font.metrics(ch, px).advance_width;
            prev = Some(ch);
        }
        (glyphs, pen)
    }

    /// Measures a string the same way drawing lays it out.
    pub fn measure(&self, text: &str, px: f32) -> TextMetrics {
        let (_, width) = self.layout(text, px);
        let (ascent, descent, line_height) = self.line_metrics(px);
        TextMetrics {
            width,
            height: ascent - descent,
            ascent,
            descent,
            line_height,
        }
    }
}

impl std::fmt::Debug for FontResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FontResource")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noto() -> FontResource {
        FontResource::from_bytes(ttf_noto_sans::REGULAR).unwrap()
    }

    #[test]
    fn garbage_is_not_a_font() {
        assert!(matches!(
            FontResource::from_bytes(b"not a font"),
            Err(Error::FontDecode(_))
        ));
    }

    #[test]
    fn measure_tracks_layout() {
        let font = noto();
        let metrics = font.measure("Hello", 16.0);
        assert!(metrics.width > 0.0);
        assert!(metrics.ascent > 0.0);
        assert!(metrics.descent < 0.0);
        assert!((metrics.height - (metrics.ascent - metrics.descent)).abs() < 1e-4);

        // The reported width is exactly the final pen position of layout.
        let (glyphs, width) = font.layout("Hello", 16.0);
        assert_eq!(metrics.width, width);
        assert_eq!(glyphs.len(), 5);
        // Pen positions are monotonically non-decreasing left to right.
        for pair in glyphs.windows(2) {
            assert!(pair[1].x >= pair[0].x);
        }
    }

    #[test]
    fn measure_scales_with_size() {
        let font = noto();
        let small = font.measure("mm", 12.0);
        let large = font.measure("mm", 24.0);
        assert!(large.width > small.width * 1.5);
        assert!(font.measure("", 16.0).width == 0.0);
    }
}
