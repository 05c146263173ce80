use std::sync::Arc;

use crate::style::{
    BlendMode, GradientPaint, LineCap, LineJoin, PaintSource, TextAlign, TextBaseline,
};
use crate::surface::CanvasImage;
use crate::text::FontResource;
use crate::transform::Transform2D;
use crate::Color;

/// One recorded drawing operation.
///
/// The buffer only ever contains executable commands: record-time
/// validation (stack depth, budgets, degenerate shapes) happens in the
/// [`crate::Recorder`], and curve promotion (`quadTo` to a cubic) happens
/// before recording too.
#[derive(Debug, Clone)]
pub enum Command {
    // State stack.
    Save,
    Restore,

    // Transform ops.
    Translate(f32, f32),
    Rotate(f32),
    Scale(f32, f32),
    SetTransform(Transform2D),
    ResetTransform,

    // Style ops.
    SetGlobalAlpha(f32),
    SetBlendMode(BlendMode),
    SetFillSource(PaintSource),
    SetStrokeSource(PaintSource),
    SetLineWidth(f32),
    SetLineJoin(LineJoin),
    SetLineCap(LineCap),
    SetMiterLimit(f32),
    SetLineDash(Vec<f32>, f32),
    SetFont(Option<Arc<FontResource>>, f32),
    SetTextAlign(TextAlign),
    SetTextBaseline(TextBaseline),

    // Path ops.
    BeginPath,
    MoveTo(f32, f32),
    LineTo(f32, f32),
    /// Promoted to a cubic by the executor with the `P0 + 2/3 (P1 - P0)`
    /// rule; the current point is only known at execute time.
    QuadTo {
        cx: f32,
        cy: f32,
        x: f32,
        y: f32,
    },
    CubicTo {
        c1x: f32,
        c1y: f32,
        c2x: f32,
        c2y: f32,
        x: f32,
        y: f32,
    },
    Arc {
        cx: f32,
        cy: f32,
        radius: f32,
        start: f32,
        end: f32,
        ccw: bool,
    },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
    ClosePath,

    // Draw ops.
    Clear(Color),
    Fill,
    Stroke,
    FillRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
    StrokeRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
    Clip,
    ResetClip,
    DrawImage {
        image: Arc<CanvasImage>,
        /// Source sub-rectangle in image pixels.
        src: Option<(f32, f32, f32, f32)>,
        /// Destination rectangle in user space.
        dst: (f32, f32, f32, f32),
    },
    FillText {
        text: String,
        x: f32,
        y: f32,
        max_width: Option<f32>,
    },
    StrokeText {
        text: String,
        x: f32,
        y: f32,
        max_width: Option<f32>,
    },

    // Target ops. The runtime splits the buffer into runs at these
    // boundaries and hands each run to the executor with its target bound;
    // the executor itself never sees one.
    SetTarget(i64),
    ResetTarget,
}
