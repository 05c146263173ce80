//! Record-time command validation and budgets.

use std::sync::Arc;

use crate::style::{
    BlendMode, GradientPaint, LineCap, LineJoin, PaintSource, TextAlign, TextBaseline,
};
use crate::surface::CanvasImage;
use crate::text::FontResource;
use crate::transform::Transform2D;
use crate::{Color, Command, Error, Result};

/// Per-frame canvas budgets, projected from the effective policy.
#[derive(Debug, Clone)]
pub struct CanvasLimits {
    pub path_segments_soft: u32,
    pub path_segments_hard: u32,
    pub save_stack_depth: u32,
}

impl Default for CanvasLimits {
    fn default() -> Self {
        Self {
            path_segments_soft: 100_000,
            path_segments_hard: 250_000,
            save_stack_depth: 64,
        }
    }
}

/// Appends validated commands to the per-frame buffer.
///
/// The recorder mirrors just enough state (stack depth, segment counts) to
/// make every script-visible failure happen synchronously inside the
/// recording call, the way the bindings need it.
pub struct Recorder {
    commands: Vec<Command>,
    limits: CanvasLimits,
    stack_depth: u32,
    segments: u32,
    soft_reported: bool,
    hard_reached: bool,
}

impl Recorder {
    pub fn new(limits: CanvasLimits) -> Self {
        Self {
            commands: Vec::new(),
            limits,
            stack_depth: 0,
            segments: 0,
            soft_reported: false,
            hard_reached: false,
        }
    }

    /// Clears the buffer for the next frame. Budgets reset with it.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.stack_depth = 0;
        self.segments = 0;
        self.soft_reported = false;
        self.hard_reached = false;
    }

    /// The recorded commands, for the executor.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// True exactly once, the first time the soft segment budget is
    /// crossed; the caller logs the warning.
    pub fn take_soft_budget_warning(&mut self) -> bool {
        if !self.soft_reported && self.segments > self.limits.path_segments_soft {
            self.soft_reported = true;
            true
        } else {
            false
        }
    }

    pub fn segment_count(&self) -> u32 {
        self.segments
    }

    // --- state stack ---

    pub fn save(&mut self) -> Result<()> {
        if self.stack_depth >= self.limits.save_stack_depth {
            return Err(Error::StackOverflow(self.limits.save_stack_depth));
        }
        self.stack_depth += 1;
        self.commands.push(Command::Save);
        Ok(())
    }

    pub fn restore(&mut self) -> Result<()> {
        if self.stack_depth == 0 {
            return Err(Error::StackUnderflow);
        }
        self.stack_depth -= 1;
        self.commands.push(Command::Restore);
        Ok(())
    }

    // --- transforms ---

    pub fn translate(&mut self, x: f32, y: f32) -> Result<()> {
        finite2(x, y, "translation")?;
        self.commands.push(Command::Translate(x, y));
        Ok(())
    }

    pub fn rotate(&mut self, radians: f32) -> Result<()> {
        finite(radians, "angle")?;
        self.commands.push(Command::Rotate(radians));
        Ok(())
    }

    pub fn scale(&mut self, x: f32, y: f32) -> Result<()> {
        finite2(x, y, "scale")?;
        self.commands.push(Command::Scale(x, y));
        Ok(())
    }

    pub fn set_transform(&mut self, transform: Transform2D) -> Result<()> {
        for value in [
            transform.a,
            transform.b,
            transform.c,
            transform.d,
            transform.e,
            transform.f,
        ] {
            finite(value, "transform element")?;
        }
        self.commands.push(Command::SetTransform(transform));
        Ok(())
    }

    pub fn reset_transform(&mut self) {
        self.commands.push(Command::ResetTransform);
    }

    // --- styles ---

    pub fn set_global_alpha(&mut self, alpha: f32) -> Result<()> {
        finite(alpha, "alpha")?;
        self.commands
            .push(Command::SetGlobalAlpha(alpha.clamp(0.0, 1.0)));
        Ok(())
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.commands.push(Command::SetBlendMode(mode));
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.commands
            .push(Command::SetFillSource(PaintSource::Solid(color)));
    }

    pub fn set_fill_paint(&mut self, paint: Option<Arc<GradientPaint>>) {
        let source = match paint {
            Some(paint) => PaintSource::Gradient(paint),
            // Clearing a paint reverts to the default fill color.
            None => PaintSource::Solid(Color::WHITE),
        };
        self.commands.push(Command::SetFillSource(source));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.commands
            .push(Command::SetStrokeSource(PaintSource::Solid(color)));
    }

    pub fn set_stroke_paint(&mut self, paint: Option<Arc<GradientPaint>>) {
        let source = match paint {
            Some(paint) => PaintSource::Gradient(paint),
            None => PaintSource::Solid(Color::BLACK),
        };
        self.commands.push(Command::SetStrokeSource(source));
    }

    pub fn set_line_width(&mut self, width: f32) -> Result<()> {
        finite(width, "line width")?;
        if width <= 0.0 {
            return Err(Error::OutOfRange { what: "line width" });
        }
        self.commands.push(Command::SetLineWidth(width));
        Ok(())
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.commands.push(Command::SetLineJoin(join));
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.commands.push(Command::SetLineCap(cap));
    }

    pub fn set_miter_limit(&mut self, limit: f32) -> Result<()> {
        finite(limit, "miter limit")?;
        self.commands.push(Command::SetMiterLimit(limit.max(1.0)));
        Ok(())
    }

    pub fn set_line_dash(&mut self, dash: Vec<f32>, offset: f32) -> Result<()> {
        finite(offset, "dash offset")?;
        for value in &dash {
            finite(*value, "dash interval")?;
        }
        self.commands.push(Command::SetLineDash(dash, offset));
        Ok(())
    }

    pub fn set_font(&mut self, font: Option<Arc<FontResource>>, px: f32) -> Result<()> {
        finite(px, "font size")?;
        self.commands.push(Command::SetFont(font, px.max(1.0)));
        Ok(())
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.commands.push(Command::SetTextAlign(align));
    }

    pub fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.commands.push(Command::SetTextBaseline(baseline));
    }

    // --- paths ---

    pub fn begin_path(&mut self) {
        self.commands.push(Command::BeginPath);
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> Result<()> {
        finite2(x, y, "point")?;
        self.charge_segments(1)?;
        self.commands.push(Command::MoveTo(x, y));
        Ok(())
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> Result<()> {
        finite2(x, y, "point")?;
        self.charge_segments(1)?;
        self.commands.push(Command::LineTo(x, y));
        Ok(())
    }

    /// Records a quadratic segment; the executor promotes it to a cubic
    /// with the `P0 + 2/3 (P1 - P0)` control rule.
    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) -> Result<()> {
        finite2(cx, cy, "control point")?;
        finite2(x, y, "point")?;
        self.charge_segments(1)?;
        self.commands.push(Command::QuadTo { cx, cy, x, y });
        Ok(())
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) -> Result<()> {
        finite2(c1x, c1y, "control point")?;
        finite2(c2x, c2y, "control point")?;
        finite2(x, y, "point")?;
        self.charge_segments(1)?;
        self.commands.push(Command::CubicTo {
            c1x,
            c1y,
            c2x,
            c2y,
            x,
            y,
        });
        Ok(())
    }

    /// Canvas-convention arc. `r <= 0` is a validation failure the binding
    /// surfaces as a safe no-op plus last error.
    pub fn arc(&mut self, cx: f32, cy: f32, radius: f32, start: f32, end: f32, ccw: bool) -> Result<()> {
        finite2(cx, cy, "center")?;
        finite(radius, "radius")?;
        finite(start, "angle")?;
        finite(end, "angle")?;
        if radius <= 0.0 {
            return Err(Error::OutOfRange { what: "radius" });
        }
        // Roughly one cubic per quarter turn.
        let sweep = (end - start).abs().min(std::f32::consts::TAU);
        let segments = (sweep / std::f32::consts::FRAC_PI_2).ceil().max(1.0) as u32;
        self.charge_segments(segments)?;
        self.commands.push(Command::Arc {
            cx,
            cy,
            radius,
            start,
            end,
            ccw,
        });
        Ok(())
    }

    /// Appends a closed rectangle subpath. Negative sizes are a validation
    /// failure surfaced as a safe no-op plus last error.
    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Result<()> {
        finite2(x, y, "point")?;
        finite2(w, h, "size")?;
        if w < 0.0 || h < 0.0 {
            return Err(Error::OutOfRange { what: "rect size" });
        }
        self.charge_segments(5)?;
        self.commands.push(Command::Rect { x, y, w, h });
        Ok(())
    }

    pub fn close_path(&mut self) -> Result<()> {
        self.charge_segments(1)?;
        self.commands.push(Command::ClosePath);
        Ok(())
    }

    // --- draws ---

    pub fn clear(&mut self, color: Color) {
        self.commands.push(Command::Clear(color));
    }

    pub fn fill(&mut self) {
        self.commands.push(Command::Fill);
    }

    pub fn stroke(&mut self) {
        self.commands.push(Command::Stroke);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Result<()> {
        finite2(x, y, "point")?;
        finite2(w, h, "size")?;
        if w < 0.0 || h < 0.0 {
            return Err(Error::OutOfRange { what: "rect size" });
        }
        self.commands.push(Command::FillRect { x, y, w, h });
        Ok(())
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Result<()> {
        finite2(x, y, "point")?;
        finite2(w, h, "size")?;
        if w < 0.0 || h < 0.0 {
            return Err(Error::OutOfRange { what: "rect size" });
        }
        self.commands.push(Command::StrokeRect { x, y, w, h });
        Ok(())
    }

    pub fn clip(&mut self) {
        self.commands.push(Command::Clip);
    }

    pub fn reset_clip(&mut self) {
        self.commands.push(Command::ResetClip);
    }

    pub fn draw_image(
        &mut self,
        image: Arc<CanvasImage>,
        src: Option<(f32, f32, f32, f32)>,
        dst: (f32, f32, f32, f32),
    ) -> Result<()> {
        finite2(dst.0, dst.1, "point")?;
        finite2(dst.2, dst.3, "size")?;
        if let Some((sx, sy, sw, sh)) = src {
            finite2(sx, sy, "point")?;
            finite2(sw, sh, "size")?;
            if sw <= 0.0 || sh <= 0.0 {
                return Err(Error::OutOfRange { what: "source size" });
            }
        }
        self.commands.push(Command::DrawImage { image, src, dst });
        Ok(())
    }

    pub fn fill_text(&mut self, text: String, x: f32, y: f32, max_width: Option<f32>) -> Result<()> {
        finite2(x, y, "point")?;
        self.commands.push(Command::FillText {
            text,
            x,
            y,
            max_width,
        });
        Ok(())
    }

    pub fn stroke_text(&mut self, text: String, x: f32, y: f32, max_width: Option<f32>) -> Result<()> {
        finite2(x, y, "point")?;
        self.commands.push(Command::StrokeText {
            text,
            x,
            y,
            max_width,
        });
        Ok(())
    }

    // --- targets ---

    pub fn set_target(&mut self, surface: i64) {
        self.commands.push(Command::SetTarget(surface));
    }

    pub fn reset_target(&mut self) {
        self.commands.push(Command::ResetTarget);
    }

    fn charge_segments(&mut self, count: u32) -> Result<()> {
        if self.hard_reached || self.segments + count > self.limits.path_segments_hard {
            self.hard_reached = true;
            return Err(Error::SegmentBudget(self.limits.path_segments_hard));
        }
        self.segments += count;
        Ok(())
    }
}

fn finite(value: f32, what: &'static str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::NonFinite { what })
    }
}

fn finite2(x: f32, y: f32, what: &'static str) -> Result<()> {
    finite(x, what)?;
    finite(y, what)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> Recorder {
        Recorder::new(CanvasLimits::default())
    }

    #[test]
    fn save_restore_depth_is_bounded() {
        let mut rec = Recorder::new(CanvasLimits {
            save_stack_depth: 2,
            ..CanvasLimits::default()
        });
        rec.save().unwrap();
        rec.save().unwrap();
        assert!(matches!(rec.save(), Err(Error::StackOverflow(2))));
        rec.restore().unwrap();
        rec.restore().unwrap();
        assert!(matches!(rec.restore(), Err(Error::StackUnderflow)));
        // Failed calls record nothing.
        assert_eq!(rec.len(), 4);
    }

    #[test]
    fn degenerate_shapes_are_rejected_without_recording() {
        let mut rec = recorder();
        assert!(rec.arc(0.0, 0.0, 0.0, 0.0, 1.0, false).is_err());
        assert!(rec.arc(0.0, 0.0, -3.0, 0.0, 1.0, false).is_err());
        assert!(rec.rect(0.0, 0.0, -1.0, 5.0).is_err());
        assert!(rec.fill_rect(0.0, 0.0, 5.0, -1.0).is_err());
        assert!(rec.move_to(f32::NAN, 0.0).is_err());
        assert!(rec.is_empty());
    }

    #[test]
    fn hard_segment_budget_freezes_path_recording() {
        let mut rec = Recorder::new(CanvasLimits {
            path_segments_soft: 4,
            path_segments_hard: 6,
            save_stack_depth: 64,
        });
        for i in 0..6 {
            rec.line_to(i as f32, 0.0).unwrap();
        }
        assert!(matches!(rec.line_to(7.0, 0.0), Err(Error::SegmentBudget(6))));
        // Frozen for the rest of the frame, even for cheap ops.
        assert!(rec.move_to(0.0, 0.0).is_err());
        // Non-path commands still record.
        rec.fill();
        assert_eq!(rec.len(), 7);

        // clear() lifts the freeze for the next frame.
        rec.clear();
        assert!(rec.line_to(0.0, 0.0).is_ok());
    }

    #[test]
    fn soft_budget_warns_once() {
        let mut rec = Recorder::new(CanvasLimits {
            path_segments_soft: 2,
            path_segments_hard: 100,
            save_stack_depth: 64,
        });
        rec.line_to(0.0, 0.0).unwrap();
        assert!(!rec.take_soft_budget_warning());
        rec.line_to(1.0, 0.0).unwrap();
        rec.line_to(2.0, 0.0).unwrap();
        assert!(rec.take_soft_budget_warning());
        assert!(!rec.take_soft_budget_warning());
    }
}
