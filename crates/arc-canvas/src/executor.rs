//! Replays a recorded command buffer onto a CPU surface.

use std::sync::Arc;

use tiny_skia::{
    FillRule, LinearGradient, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, Point,
    RadialGradient, Shader, Stroke, StrokeDash,
};

use crate::style::{
    BlendMode, LineCap, LineJoin, PaintSource, StrokeStyle, TextAlign, TextBaseline,
};
use crate::text::FontResource;
use crate::transform::Transform2D;
use crate::{Color, Command, Surface};

/// One level of the drawing state stack.
#[derive(Clone)]
struct DrawState {
    transform: Transform2D,
    global_alpha: f32,
    blend: BlendMode,
    fill: PaintSource,
    stroke: PaintSource,
    stroke_style: StrokeStyle,
    font: Option<(Arc<FontResource>, f32)>,
    text_align: TextAlign,
    text_baseline: TextBaseline,
    clip: Option<Arc<Mask>>,
}

impl DrawState {
    /// The documented default state on binding a target.
    fn new() -> Self {
        Self {
            transform: Transform2D::IDENTITY,
            global_alpha: 1.0,
            blend: BlendMode::Normal,
            fill: PaintSource::Solid(Color::WHITE),
            stroke: PaintSource::Solid(Color::BLACK),
            stroke_style: StrokeStyle::default(),
            font: None,
            text_align: TextAlign::Left,
            text_baseline: TextBaseline::Alphabetic,
            clip: None,
        }
    }
}

/// Executes a command run against one bound target.
///
/// Target-switch commands must have been split out by the caller; they are
/// ignored here. Invalid intermediate states cannot occur: the recorder
/// rejected them at record time.
pub fn execute(commands: &[Command], target: &mut Surface) {
    let mut executor = Executor {
        state: DrawState::new(),
        stack: Vec::new(),
        path: PathBuilder::new(),
        last_point: None,
    };
    for command in commands {
        executor.apply(command, target.pixmap_mut());
    }
}

struct Executor {
    state: DrawState,
    stack: Vec<DrawState>,
    path: PathBuilder,
    /// Current point in user space, for quad promotion.
    last_point: Option<(f32, f32)>,
}

impl Executor {
    fn apply(&mut self, command: &Command, pixmap: &mut Pixmap) {
        match command {
            Command::Save => self.stack.push(self.state.clone()),
            Command::Restore => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }

            Command::Translate(x, y) => {
                self.state.transform = self.state.transform.translate(*x, *y);
            }
            Command::Rotate(radians) => {
                self.state.transform = self.state.transform.rotate(*radians);
            }
            Command::Scale(x, y) => {
                self.state.transform = self.state.transform.scale(*x, *y);
            }
            Command::SetTransform(transform) => self.state.transform = *transform,
            Command::ResetTransform => self.state.transform = Transform2D::IDENTITY,

            Command::SetGlobalAlpha(alpha) => self.state.global_alpha = *alpha,
            Command::SetBlendMode(mode) => self.state.blend = *mode,
            Command::SetFillSource(source) => self.state.fill = source.clone(),
            Command::SetStrokeSource(source) => self.state.stroke = source.clone(),
            Command::SetLineWidth(width) => self.state.stroke_style.width = *width,
            Command::SetLineJoin(join) => self.state.stroke_style.join = *join,
            Command::SetLineCap(cap) => self.state.stroke_style.cap = *cap,
            Command::SetMiterLimit(limit) => self.state.stroke_style.miter_limit = *limit,
            Command::SetLineDash(dash, offset) => {
                self.state.stroke_style.dash = dash.clone();
                self.state.stroke_style.dash_offset = *offset;
            }
            Command::SetFont(font, px) => {
                self.state.font = font.as_ref().map(|font| (font.clone(), *px));
            }
            Command::SetTextAlign(align) => self.state.text_align = *align,
            Command::SetTextBaseline(baseline) => self.state.text_baseline = *baseline,

            Command::BeginPath => {
                self.path = PathBuilder::new();
                self.last_point = None;
            }
            Command::MoveTo(x, y) => {
                self.path.move_to(*x, *y);
                self.last_point = Some((*x, *y));
            }
            Command::LineTo(x, y) => {
                self.ensure_start(*x, *y);
                self.path.line_to(*x, *y);
                self.last_point = Some((*x, *y));
            }
            Command::QuadTo { cx, cy, x, y } => {
                self.ensure_start(*cx, *cy);
                let (px, py) = self.last_point.unwrap_or((*cx, *cy));
                // P0 + 2/3 (P1 - P0) and P3 + 2/3 (P1 - P3).
                let c1x = px + 2.0 / 3.0 * (cx - px);
                let c1y = py + 2.0 / 3.0 * (cy - py);
                let c2x = x + 2.0 / 3.0 * (cx - x);
                let c2y = y + 2.0 / 3.0 * (cy - y);
                self.path.cubic_to(c1x, c1y, c2x, c2y, *x, *y);
                self.last_point = Some((*x, *y));
            }
            Command::CubicTo {
                c1x,
                c1y,
                c2x,
                c2y,
                x,
                y,
            } => {
                self.ensure_start(*c1x, *c1y);
                self.path.cubic_to(*c1x, *c1y, *c2x, *c2y, *x, *y);
                self.last_point = Some((*x, *y));
            }
            Command::Arc {
                cx,
                cy,
                radius,
                start,
                end,
                ccw,
            } => self.append_arc(*cx, *cy, *radius, *start, *end, *ccw),
            Command::Rect { x, y, w, h } => {
                self.path.move_to(*x, *y);
                self.path.line_to(x + w, *y);
                self.path.line_to(x + w, y + h);
                self.path.line_to(*x, y + h);
                self.path.close();
                self.last_point = Some((*x, *y));
            }
            Command::ClosePath => self.path.close(),

            Command::Clear(color) => {
                pixmap.fill(color.to_skia(1.0));
            }
            Command::Fill => self.fill_current_path(pixmap),
            Command::Stroke => self.stroke_current_path(pixmap),
            Command::FillRect { x, y, w, h } => {
                if let Some(path) = rect_path(*x, *y, *w, *h) {
                    self.fill_path(pixmap, &path);
                }
            }
            Command::StrokeRect { x, y, w, h } => {
                if let Some(path) = rect_path(*x, *y, *w, *h) {
                    self.stroke_path(pixmap, &path);
                }
            }
            Command::Clip => self.intersect_clip(pixmap),
            Command::ResetClip => self.state.clip = None,
            Command::DrawImage { image, src, dst } => self.draw_image(pixmap, image, *src, *dst),
            Command::FillText {
                text,
                x,
                y,
                max_width,
            } => self.draw_text(pixmap, text, *x, *y, *max_width, false),
            Command::StrokeText {
                text,
                x,
                y,
                max_width,
            } => self.draw_text(pixmap, text, *x, *y, *max_width, true),

            Command::SetTarget(_) | Command::ResetTarget => {}
        }
    }

    /// Canvas semantics: a drawing verb with no current point starts one.
    fn ensure_start(&mut self, x: f32, y: f32) {
        if self.last_point.is_none() {
            self.path.move_to(x, y);
            self.last_point = Some((x, y));
        }
    }

    /// Canvas-convention arc: angles are clockwise from +x in a y-down
    /// space; `ccw = false` sweeps clockwise (increasing angle).
    fn append_arc(&mut self, cx: f32, cy: f32, radius: f32, start: f32, end: f32, ccw: bool) {
        use std::f32::consts::TAU;

        let mut sweep = end - start;
        if !ccw {
            if sweep < 0.0 {
                sweep = sweep.rem_euclid(TAU);
            }
            sweep = sweep.min(TAU);
        } else {
            if sweep > 0.0 {
                sweep = -((-sweep).rem_euclid(TAU));
            }
            sweep = sweep.max(-TAU);
        }

        let point_at = |angle: f32| (cx + radius * angle.cos(), cy + radius * angle.sin());

        let (sx, sy) = point_at(start);
        if self.last_point.is_some() {
            self.path.line_to(sx, sy);
        } else {
            self.path.move_to(sx, sy);
        }

        // One cubic per quarter-turn chunk, the standard unit-arc fit.
        let segments = ((sweep.abs() / (TAU / 4.0)).ceil() as u32).max(1);
        let step = sweep / segments as f32;
        let k = 4.0 / 3.0 * (step / 4.0).tan();
        let mut angle = start;
        for _ in 0..segments {
            let next = angle + step;
            let (x0, y0) = point_at(angle);
            let (x1, y1) = point_at(next);
            let (t0x, t0y) = (-angle.sin(), angle.cos());
            let (t1x, t1y) = (-next.sin(), next.cos());
            self.path.cubic_to(
                x0 + k * radius * t0x,
                y0 + k * radius * t0y,
                x1 - k * radius * t1x,
                y1 - k * radius * t1y,
                x1,
                y1,
            );
            angle = next;
        }
        self.last_point = Some(point_at(start + sweep));
    }

    fn fill_current_path(&mut self, pixmap: &mut Pixmap) {
        if let Some(path) = self.path.clone().finish() {
            self.fill_path(pixmap, &path);
        }
    }

    fn stroke_current_path(&mut self, pixmap: &mut Pixmap) {
        if let Some(path) = self.path.clone().finish() {
            self.stroke_path(pixmap, &path);
        }
    }

    fn fill_path(&self, pixmap: &mut Pixmap, path: &tiny_skia::Path) {
        let paint = self.paint(&self.state.fill);
        pixmap.fill_path(
            path,
            &paint,
            FillRule::Winding,
            self.state.transform.to_skia(),
            self.state.clip.as_deref(),
        );
    }

    fn stroke_path(&self, pixmap: &mut Pixmap, path: &tiny_skia::Path) {
        let paint = self.paint(&self.state.stroke);
        let style = &self.state.stroke_style;
        let stroke = Stroke {
            width: style.width,
            miter_limit: style.miter_limit,
            line_cap: match style.cap {
                LineCap::Butt => tiny_skia::LineCap::Butt,
                LineCap::Round => tiny_skia::LineCap::Round,
                LineCap::Square => tiny_skia::LineCap::Square,
            },
            line_join: match style.join {
                LineJoin::Miter => tiny_skia::LineJoin::Miter,
                LineJoin::Round => tiny_skia::LineJoin::Round,
                LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
            },
            dash: if style.dash.is_empty() {
                None
            } else {
                StrokeDash::new(style.dash.clone(), style.dash_offset)
            },
        };
        pixmap.stroke_path(
            path,
            &paint,
            &stroke,
            self.state.transform.to_skia(),
            self.state.clip.as_deref(),
        );
    }

    fn paint(&self, source: &PaintSource) -> Paint<'static> {
        let mut paint = Paint {
            anti_alias: true,
            blend_mode: self.state.blend.to_skia(),
            ..Paint::default()
        };
        match source {
            PaintSource::Solid(color) => {
                paint.set_color(color.to_skia(self.state.global_alpha));
            }
            PaintSource::Gradient(gradient) => {
                let stops: Vec<tiny_skia::GradientStop> = gradient
                    .stops
                    .iter()
                    .map(|stop| {
                        tiny_skia::GradientStop::new(
                            stop.offset,
                            stop.color.to_skia(self.state.global_alpha),
                        )
                    })
                    .collect();
                // Gradient geometry lives in user space; hand the shader the
                // canvas transform so it follows the path.
                let shader = match gradient.kind {
                    crate::style::GradientKind::Linear { from, to } => LinearGradient::new(
                        Point::from_xy(from.0, from.1),
                        Point::from_xy(to.0, to.1),
                        stops,
                        gradient.spread.to_skia(),
                        tiny_skia::Transform::identity(),
                    ),
                    crate::style::GradientKind::Radial { center, radius } => RadialGradient::new(
                        Point::from_xy(center.0, center.1),
                        Point::from_xy(center.0, center.1),
                        radius,
                        stops,
                        gradient.spread.to_skia(),
                        tiny_skia::Transform::identity(),
                    ),
                };
                paint.shader = shader.unwrap_or(Shader::SolidColor(tiny_skia::Color::TRANSPARENT));
            }
        }
        paint
    }

    fn intersect_clip(&mut self, pixmap: &Pixmap) {
        let Some(path) = self.path.clone().finish() else {
            return;
        };
        let mut mask = match self.state.clip.as_deref() {
            Some(existing) => existing.clone(),
            None => {
                let mut mask = Mask::new(pixmap.width(), pixmap.height())
                    .expect("target surface dimensions are validated nonzero");
                mask.fill_path(
                    &path,
                    FillRule::Winding,
                    true,
                    self.state.transform.to_skia(),
                );
                self.state.clip = Some(Arc::new(mask));
                return;
            }
        };
        mask.intersect_path(
            &path,
            FillRule::Winding,
            true,
            self.state.transform.to_skia(),
        );
        self.state.clip = Some(Arc::new(mask));
    }

    fn draw_image(
        &self,
        pixmap: &mut Pixmap,
        image: &crate::CanvasImage,
        src: Option<(f32, f32, f32, f32)>,
        dst: (f32, f32, f32, f32),
    ) {
        let source;
        let source_ref = match src {
            Some((sx, sy, sw, sh)) => {
                let rect = tiny_skia::IntRect::from_xywh(
                    sx.floor() as i32,
                    sy.floor() as i32,
                    (sw.ceil() as u32).max(1),
                    (sh.ceil() as u32).max(1),
                );
                let Some(rect) = rect else { return };
                let Some(cropped) = image.pixmap().clone_rect(rect) else {
                    return;
                };
                source = cropped;
                source.as_ref()
            }
            None => image.pixmap().as_ref(),
        };

        let (dx, dy, dw, dh) = dst;
        if dw <= 0.0 || dh <= 0.0 {
            return;
        }
        let scale_x = dw / source_ref.width() as f32;
        let scale_y = dh / source_ref.height() as f32;
        let transform = self
            .state
            .transform
            .translate(dx, dy)
            .scale(scale_x, scale_y)
            .to_skia();

        let paint = PixmapPaint {
            opacity: self.state.global_alpha,
            blend_mode: self.state.blend.to_skia(),
            quality: tiny_skia::FilterQuality::Bilinear,
        };
        pixmap.draw_pixmap(0, 0, source_ref, &paint, transform, self.state.clip.as_deref());
    }

    fn draw_text(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        y: f32,
        max_width: Option<f32>,
        use_stroke_source: bool,
    ) {
        // Drawing without an active font is a safe no-op.
        let Some((font, px)) = self.state.font.clone() else {
            return;
        };
        let (glyphs, width) = font.layout(text, px);
        if glyphs.is_empty() {
            return;
        }

        let (ascent, descent, _) = font.line_metrics(px);
        let align_dx = match self.state.text_align {
            TextAlign::Left | TextAlign::Start => 0.0,
            TextAlign::Center => -width / 2.0,
            TextAlign::Right | TextAlign::End => -width,
        };
        let baseline_dy = match self.state.text_baseline {
            TextBaseline::Top => ascent,
            TextBaseline::Middle => (ascent + descent) / 2.0,
            TextBaseline::Alphabetic => 0.0,
            TextBaseline::Bottom => descent,
        };
        // An overlong line compresses horizontally to honor maxWidth.
        let squeeze = match max_width {
            Some(max) if width > max && max > 0.0 => max / width,
            _ => 1.0,
        };

        // Stroke text shares the geometry of fill text and takes its color
        // from the stroke source.
        let source = if use_stroke_source {
            &self.state.stroke
        } else {
            &self.state.fill
        };
        let color = match source {
            PaintSource::Solid(color) => color.to_skia(self.state.global_alpha),
            PaintSource::Gradient(gradient) => gradient
                .stops
                .first()
                .map(|stop| stop.color.to_skia(self.state.global_alpha))
                .unwrap_or(tiny_skia::Color::WHITE),
        };

        let paint = PixmapPaint {
            opacity: 1.0,
            blend_mode: self.state.blend.to_skia(),
            quality: tiny_skia::FilterQuality::Nearest,
        };

        for glyph in &glyphs {
            let (metrics, coverage) = font.font().rasterize(glyph.ch, px);
            if metrics.width == 0 || metrics.height == 0 {
                continue;
            }
            let Some(glyph_pixmap) = colored_glyph(&metrics, &coverage, color) else {
                continue;
            };
            let pen_x = x + (glyph.x + align_dx) * squeeze + metrics.xmin as f32;
            let pen_y = y + baseline_dy - metrics.ymin as f32 - metrics.height as f32;
            let transform = self.state.transform.translate(pen_x, pen_y).to_skia();
            pixmap.draw_pixmap(
                0,
                0,
                glyph_pixmap.as_ref(),
                &paint,
                transform,
                self.state.clip.as_deref(),
            );
        }
    }
}

/// A glyph coverage mask colored with the current source, premultiplied.
fn colored_glyph(
    metrics: &fontdue::Metrics,
    coverage: &[u8],
    color: tiny_skia::Color,
) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(metrics.width as u32, metrics.height as u32)?;
    let (r, g, b, a) = (color.red(), color.green(), color.blue(), color.alpha());
    for (pixel, cov) in pixmap.pixels_mut().iter_mut().zip(coverage.iter()) {
        let alpha = f32::from(*cov) / 255.0 * a;
        *pixel = tiny_skia::PremultipliedColorU8::from_rgba(
            (r * alpha * 255.0) as u8,
            (g * alpha * 255.0) as u8,
            (b * alpha * 255.0) as u8,
            (alpha * 255.0) as u8,
        )
        .unwrap_or(tiny_skia::PremultipliedColorU8::TRANSPARENT);
    }
    Some(pixmap)
}

fn rect_path(x: f32, y: f32, w: f32, h: f32) -> Option<tiny_skia::Path> {
    tiny_skia::Rect::from_xywh(x, y, w, h).map(PathBuilder::from_rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CanvasLimits, Recorder};

    fn run(record: impl FnOnce(&mut Recorder)) -> Surface {
        let mut recorder = Recorder::new(CanvasLimits::default());
        record(&mut recorder);
        let mut surface = Surface::new(64, 64, 4096).unwrap();
        execute(recorder.commands(), &mut surface);
        surface
    }

    fn pixel(surface: &Surface, x: u32, y: u32) -> tiny_skia::PremultipliedColorU8 {
        surface.pixmap().pixels()[(y * surface.width() + x) as usize]
    }

    #[test]
    fn fill_rect_covers_exactly_its_area() {
        let surface = run(|rec| {
            rec.set_fill_color(Color(0xFFFF_0000));
            rec.fill_rect(8.0, 8.0, 16.0, 16.0).unwrap();
        });
        assert_eq!(pixel(&surface, 16, 16).red(), 255);
        assert_eq!(pixel(&surface, 40, 40).alpha(), 0);
    }

    #[test]
    fn save_restore_round_trips_the_transform() {
        let surface = run(|rec| {
            rec.set_fill_color(Color(0xFF00_FF00));
            rec.save().unwrap();
            rec.translate(32.0, 0.0).unwrap();
            rec.restore().unwrap();
            // After restore the translation is gone; this lands at origin.
            rec.fill_rect(0.0, 0.0, 4.0, 4.0).unwrap();
        });
        assert_eq!(pixel(&surface, 1, 1).green(), 255);
        assert_eq!(pixel(&surface, 33, 1).alpha(), 0);
    }

    #[test]
    fn transforms_post_multiply() {
        let surface = run(|rec| {
            rec.set_fill_color(Color(0xFFFF_FFFF));
            rec.translate(16.0, 16.0).unwrap();
            rec.scale(2.0, 2.0).unwrap();
            // A 4x4 rect at origin lands at (16,16)-(24,24).
            rec.fill_rect(0.0, 0.0, 4.0, 4.0).unwrap();
        });
        assert_eq!(pixel(&surface, 20, 20).alpha(), 255);
        assert_eq!(pixel(&surface, 12, 12).alpha(), 0);
    }

    #[test]
    fn clip_masks_fills() {
        let surface = run(|rec| {
            rec.set_fill_color(Color(0xFFFF_FFFF));
            rec.begin_path();
            rec.rect(0.0, 0.0, 8.0, 8.0).unwrap();
            rec.clip();
            rec.fill_rect(0.0, 0.0, 64.0, 64.0).unwrap();
        });
        assert_eq!(pixel(&surface, 4, 4).alpha(), 255);
        assert_eq!(pixel(&surface, 20, 20).alpha(), 0);
    }

    #[test]
    fn clip_participates_in_save_restore() {
        let surface = run(|rec| {
            rec.set_fill_color(Color(0xFFFF_FFFF));
            rec.save().unwrap();
            rec.begin_path();
            rec.rect(0.0, 0.0, 8.0, 8.0).unwrap();
            rec.clip();
            rec.restore().unwrap();
            // Clip was scoped to the saved level; this fill is unclipped.
            rec.fill_rect(30.0, 30.0, 4.0, 4.0).unwrap();
        });
        assert_eq!(pixel(&surface, 31, 31).alpha(), 255);
    }

    #[test]
    fn nonzero_winding_fills_self_intersections() {
        let surface = run(|rec| {
            rec.set_fill_color(Color(0xFFFF_FFFF));
            rec.begin_path();
            // Two nested same-direction rects: nonzero keeps the hole filled.
            rec.rect(8.0, 8.0, 48.0, 48.0).unwrap();
            rec.rect(24.0, 24.0, 16.0, 16.0).unwrap();
            rec.fill();
        });
        assert_eq!(pixel(&surface, 32, 32).alpha(), 255);
    }

    #[test]
    fn global_alpha_scales_output() {
        let surface = run(|rec| {
            rec.set_fill_color(Color(0xFFFF_FFFF));
            rec.set_global_alpha(0.5).unwrap();
            rec.fill_rect(0.0, 0.0, 64.0, 64.0).unwrap();
        });
        let alpha = pixel(&surface, 32, 32).alpha();
        assert!((120..=135).contains(&alpha), "alpha = {}", alpha);
    }

    #[test]
    fn stroke_uses_stroke_source() {
        let surface = run(|rec| {
            rec.set_stroke_color(Color(0xFF00_00FF));
            rec.set_line_width(4.0).unwrap();
            rec.begin_path();
            rec.move_to(8.0, 32.0).unwrap();
            rec.line_to(56.0, 32.0).unwrap();
            rec.stroke();
        });
        assert_eq!(pixel(&surface, 32, 32).blue(), 255);
        assert_eq!(pixel(&surface, 32, 8).alpha(), 0);
    }

    #[test]
    fn text_draws_with_an_active_font_and_noops_without() {
        let font = Arc::new(FontResource::from_bytes(ttf_noto_sans::REGULAR).unwrap());

        let without = run(|rec| {
            rec.set_fill_color(Color(0xFFFF_FFFF));
            rec.fill_text("Hi".to_string(), 4.0, 40.0, None).unwrap();
        });
        assert!(without.pixmap().pixels().iter().all(|p| p.alpha() == 0));

        let with = run(move |rec| {
            rec.set_fill_color(Color(0xFFFF_FFFF));
            rec.set_font(Some(font), 24.0).unwrap();
            rec.fill_text("Hi".to_string(), 4.0, 40.0, None).unwrap();
        });
        assert!(with.pixmap().pixels().iter().any(|p| p.alpha() > 0));
    }

    #[test]
    fn arc_with_full_sweep_draws_a_ring() {
        let surface = run(|rec| {
            rec.set_stroke_color(Color(0xFFFF_FFFF));
            rec.set_line_width(2.0).unwrap();
            rec.begin_path();
            rec.arc(32.0, 32.0, 20.0, 0.0, std::f32::consts::TAU, false)
                .unwrap();
            rec.stroke();
        });
        // A point on the circle is covered, the center is not.
        assert!(pixel(&surface, 52, 32).alpha() > 0);
        assert_eq!(pixel(&surface, 32, 32).alpha(), 0);
    }
}
