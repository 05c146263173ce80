//! `gfx` namespace: surfaces, state, paths, styles, images, gradients and
//! text over the retained 2D command buffer.
//!
//! Numeric parameters accept both script ints and floats and are checked
//! finite; record-time validation in the canvas recorder covers stack
//! depth, budgets and degenerate shapes.

use std::sync::Arc;

use rhai::{Dynamic, Module};

use arc_canvas::{
    BlendMode, CanvasImage, Color, FontResource, GradientKind, GradientPaint, GradientStop,
    LineCap, LineJoin, SpreadMode, Surface, TextAlign, TextBaseline, Transform2D,
};
use arc_registry::Handle;

use super::native;
use crate::services::{as_finite_f32, fail, Shared};

/// Pulls finite f32 arguments out of script numbers (int or float) or
/// fails the binding with the documented value.
macro_rules! floats {
    ($s:expr, $func:literal, $failure:expr, [$($arg:ident),+]) => {
        [$(
            match as_finite_f32(&$arg) {
                Some(value) => value,
                None => {
                    return Ok(fail(
                        $s.dev_mode,
                        $func,
                        "arguments must be finite numbers",
                        $failure,
                    ))
                }
            }
        ),+]
    };
}

/// Reports a recorder result as bool + last error.
fn record(s: &crate::services::Services, func: &'static str, result: arc_canvas::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => fail(s.dev_mode, func, err, false),
    }
}

pub fn module(services: &Shared) -> Module {
    let mut module = Module::new();

    // --- surfaces & targets ---

    native!(module, services, "createSurface", |s, w: i64, h: i64| {
        let (Ok(w), Ok(h)) = (u32::try_from(w), u32::try_from(h)) else {
            return Ok(fail(s.dev_mode, "gfx.createSurface", "size must be positive", 0_i64));
        };
        let max_dim = s.policy.max_surface_dim;
        let surface = match Surface::new(w, h, max_dim) {
            Ok(surface) => surface,
            Err(err) => return Ok(fail(s.dev_mode, "gfx.createSurface", err, 0_i64)),
        };
        if let Err(err) = s.resources.surface_pixels.charge(surface.pixel_count()) {
            return Ok(fail(s.dev_mode, "gfx.createSurface", err, 0_i64));
        }
        let owner = s.cartridge_id.clone();
        match s.resources.surfaces.allocate(&owner, surface) {
            Ok(handle) => handle.as_raw(),
            Err(err) => {
                let pixels = u64::from(w) * u64::from(h);
                s.resources.surface_pixels.release(pixels);
                fail(s.dev_mode, "gfx.createSurface", err, 0_i64)
            }
        }
    });

    native!(module, services, "freeSurface", |s, handle: i64| {
        if let Some(surface) = s.resources.surfaces.free(Handle::from_raw(handle)) {
            s.resources.surface_pixels.release(surface.pixel_count());
        }
    });

    native!(module, services, "setTarget", |s, handle: i64| {
        let owner = s.cartridge_id.clone();
        if s.resources.surfaces.get(Handle::<Surface>::from_raw(handle), &owner).is_err() {
            return Ok(fail(s.dev_mode, "gfx.setTarget", "invalid surface handle", false));
        }
        s.recorder.set_target(handle);
        true
    });

    native!(module, services, "resetTarget", |s| s.recorder.reset_target());

    // --- state stack ---

    native!(module, services, "save", |s| {
        let result = s.recorder.save();
        record(&s, "gfx.save", result)
    });
    native!(module, services, "restore", |s| {
        let result = s.recorder.restore();
        record(&s, "gfx.restore", result)
    });

    // --- transforms ---

    native!(module, services, "translate", |s, x: Dynamic, y: Dynamic| {
        let [x, y] = floats!(s, "gfx.translate", false, [x, y]);
        let result = s.recorder.translate(x, y);
        record(&s, "gfx.translate", result)
    });
    native!(module, services, "rotate", |s, radians: Dynamic| {
        let [radians] = floats!(s, "gfx.rotate", false, [radians]);
        let result = s.recorder.rotate(radians);
        record(&s, "gfx.rotate", result)
    });
    native!(module, services, "scale", |s, x: Dynamic, y: Dynamic| {
        let [x, y] = floats!(s, "gfx.scale", false, [x, y]);
        let result = s.recorder.scale(x, y);
        record(&s, "gfx.scale", result)
    });
    native!(
        module,
        services,
        "setTransform",
        |s, a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic, e: Dynamic, f: Dynamic| {
            let [a, b, c, d, e, f] = floats!(s, "gfx.setTransform", false, [a, b, c, d, e, f]);
            let result = s.recorder.set_transform(Transform2D::new(a, b, c, d, e, f));
            record(&s, "gfx.setTransform", result)
        }
    );
    native!(module, services, "resetTransform", |s| s.recorder.reset_transform());

    // --- styles ---

    native!(module, services, "setGlobalAlpha", |s, alpha: Dynamic| {
        let [alpha] = floats!(s, "gfx.setGlobalAlpha", false, [alpha]);
        let result = s.recorder.set_global_alpha(alpha);
        record(&s, "gfx.setGlobalAlpha", result)
    });

    native!(module, services, "setBlendMode", |s, name: &str| {
        match BlendMode::from_name(name) {
            Ok(mode) => {
                s.recorder.set_blend_mode(mode);
                true
            }
            Err(err) => fail(s.dev_mode, "gfx.setBlendMode", err, false),
        }
    });

    native!(module, services, "setFillColor", |s, argb: i64| {
        s.recorder.set_fill_color(Color(argb as u32));
    });
    native!(module, services, "setStrokeColor", |s, argb: i64| {
        s.recorder.set_stroke_color(Color(argb as u32));
    });

    native!(module, services, "setLineWidth", |s, width: Dynamic| {
        let [width] = floats!(s, "gfx.setLineWidth", false, [width]);
        let result = s.recorder.set_line_width(width);
        record(&s, "gfx.setLineWidth", result)
    });
    native!(module, services, "setLineJoin", |s, name: &str| {
        match LineJoin::from_name(name) {
            Some(join) => {
                s.recorder.set_line_join(join);
                true
            }
            None => fail(s.dev_mode, "gfx.setLineJoin", format!("unknown join {:?}", name), false),
        }
    });
    native!(module, services, "setLineCap", |s, name: &str| {
        match LineCap::from_name(name) {
            Some(cap) => {
                s.recorder.set_line_cap(cap);
                true
            }
            None => fail(s.dev_mode, "gfx.setLineCap", format!("unknown cap {:?}", name), false),
        }
    });
    native!(module, services, "setMiterLimit", |s, limit: Dynamic| {
        let [limit] = floats!(s, "gfx.setMiterLimit", false, [limit]);
        let result = s.recorder.set_miter_limit(limit);
        record(&s, "gfx.setMiterLimit", result)
    });
    native!(module, services, "setLineDash", |s, dash: rhai::Array, offset: Dynamic| {
        let [offset] = floats!(s, "gfx.setLineDash", false, [offset]);
        let mut intervals = Vec::with_capacity(dash.len());
        for value in &dash {
            match as_finite_f32(value) {
                Some(value) if value >= 0.0 => intervals.push(value),
                _ => {
                    return Ok(fail(
                        s.dev_mode,
                        "gfx.setLineDash",
                        "dash intervals must be finite and non-negative",
                        false,
                    ))
                }
            }
        }
        let result = s.recorder.set_line_dash(intervals, offset);
        record(&s, "gfx.setLineDash", result)
    });

    // --- gradients / paints ---

    native!(
        module,
        services,
        "createLinearGradient",
        |s, x0: Dynamic, y0: Dynamic, x1: Dynamic, y1: Dynamic, stops: rhai::Array, spread: &str| {
            let [x0, y0, x1, y1] = floats!(s, "gfx.createLinearGradient", 0_i64, [x0, y0, x1, y1]);
            make_gradient(
                &mut s,
                "gfx.createLinearGradient",
                GradientKind::Linear { from: (x0, y0), to: (x1, y1) },
                &stops,
                spread,
            )
        }
    );
    native!(
        module,
        services,
        "createRadialGradient",
        |s, cx: Dynamic, cy: Dynamic, radius: Dynamic, stops: rhai::Array, spread: &str| {
            let [cx, cy, radius] = floats!(s, "gfx.createRadialGradient", 0_i64, [cx, cy, radius]);
            if radius <= 0.0 {
                return Ok(fail(s.dev_mode, "gfx.createRadialGradient", "radius must be positive", 0_i64));
            }
            make_gradient(
                &mut s,
                "gfx.createRadialGradient",
                GradientKind::Radial { center: (cx, cy), radius },
                &stops,
                spread,
            )
        }
    );
    native!(module, services, "freePaint", |s, handle: i64| {
        s.resources.paints.free(Handle::from_raw(handle));
    });
    native!(module, services, "setFillPaint", |s, handle: i64| {
        set_paint(&mut s, "gfx.setFillPaint", handle, true)
    });
    native!(module, services, "setStrokePaint", |s, handle: i64| {
        set_paint(&mut s, "gfx.setStrokePaint", handle, false)
    });

    // --- paths ---

    native!(module, services, "beginPath", |s| s.recorder.begin_path());
    native!(module, services, "moveTo", |s, x: Dynamic, y: Dynamic| {
        let [x, y] = floats!(s, "gfx.moveTo", false, [x, y]);
        let result = s.recorder.move_to(x, y);
        record(&s, "gfx.moveTo", result)
    });
    native!(module, services, "lineTo", |s, x: Dynamic, y: Dynamic| {
        let [x, y] = floats!(s, "gfx.lineTo", false, [x, y]);
        let result = s.recorder.line_to(x, y);
        record(&s, "gfx.lineTo", result)
    });
    native!(module, services, "quadTo", |s, cx: Dynamic, cy: Dynamic, x: Dynamic, y: Dynamic| {
        let [cx, cy, x, y] = floats!(s, "gfx.quadTo", false, [cx, cy, x, y]);
        let result = s.recorder.quad_to(cx, cy, x, y);
        record(&s, "gfx.quadTo", result)
    });
    native!(
        module,
        services,
        "cubicTo",
        |s, c1x: Dynamic, c1y: Dynamic, c2x: Dynamic, c2y: Dynamic, x: Dynamic, y: Dynamic| {
            let [c1x, c1y, c2x, c2y, x, y] =
                floats!(s, "gfx.cubicTo", false, [c1x, c1y, c2x, c2y, x, y]);
            let result = s.recorder.cubic_to(c1x, c1y, c2x, c2y, x, y);
            record(&s, "gfx.cubicTo", result)
        }
    );
    native!(
        module,
        services,
        "arc",
        |s, cx: Dynamic, cy: Dynamic, radius: Dynamic, start: Dynamic, end: Dynamic, ccw: bool| {
            let [cx, cy, radius, start, end] =
                floats!(s, "gfx.arc", false, [cx, cy, radius, start, end]);
            let result = s.recorder.arc(cx, cy, radius, start, end, ccw);
            record(&s, "gfx.arc", result)
        }
    );
    native!(module, services, "rect", |s, x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| {
        let [x, y, w, h] = floats!(s, "gfx.rect", false, [x, y, w, h]);
        let result = s.recorder.rect(x, y, w, h);
        record(&s, "gfx.rect", result)
    });
    native!(module, services, "closePath", |s| {
        let result = s.recorder.close_path();
        record(&s, "gfx.closePath", result)
    });

    // --- draws ---

    native!(module, services, "clear", |s, argb: i64| {
        s.recorder.clear(Color(argb as u32));
    });
    native!(module, services, "fill", |s| s.recorder.fill());
    native!(module, services, "stroke", |s| s.recorder.stroke());
    native!(module, services, "fillRect", |s, x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| {
        let [x, y, w, h] = floats!(s, "gfx.fillRect", false, [x, y, w, h]);
        let result = s.recorder.fill_rect(x, y, w, h);
        record(&s, "gfx.fillRect", result)
    });
    native!(module, services, "strokeRect", |s, x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| {
        let [x, y, w, h] = floats!(s, "gfx.strokeRect", false, [x, y, w, h]);
        let result = s.recorder.stroke_rect(x, y, w, h);
        record(&s, "gfx.strokeRect", result)
    });
    native!(module, services, "clip", |s| s.recorder.clip());
    native!(module, services, "resetClip", |s| s.recorder.reset_clip());

    // --- images ---

    native!(module, services, "loadImage", |s, path: &str| {
        let bytes = match s.vfs.read_bytes(path) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(fail(s.dev_mode, "gfx.loadImage", err, 0_i64)),
        };
        let image = match CanvasImage::decode(&bytes) {
            Ok(image) => Arc::new(image),
            Err(err) => return Ok(fail(s.dev_mode, "gfx.loadImage", err, 0_i64)),
        };
        if let Err(err) = s.resources.texture_memory.charge(image.byte_size()) {
            return Ok(fail(s.dev_mode, "gfx.loadImage", err, 0_i64));
        }
        let owner = s.cartridge_id.clone();
        match s.resources.images.allocate(&owner, image.clone()) {
            Ok(handle) => handle.as_raw(),
            Err(err) => {
                s.resources.texture_memory.release(image.byte_size());
                fail(s.dev_mode, "gfx.loadImage", err, 0_i64)
            }
        }
    });
    native!(module, services, "freeImage", |s, handle: i64| {
        if let Some(image) = s.resources.images.free(Handle::from_raw(handle)) {
            s.resources.texture_memory.release(image.byte_size());
        }
    });
    native!(module, services, "imageSize", |s, handle: i64| {
        let owner = s.cartridge_id.clone();
        match s.resources.images.get(Handle::<Arc<CanvasImage>>::from_raw(handle), &owner) {
            Ok(image) => {
                let mut map = rhai::Map::new();
                map.insert("w".into(), Dynamic::from(i64::from(image.width())));
                map.insert("h".into(), Dynamic::from(i64::from(image.height())));
                Dynamic::from_map(map)
            }
            Err(err) => fail(s.dev_mode, "gfx.imageSize", err, Dynamic::UNIT),
        }
    });
    native!(module, services, "drawImage", |s, handle: i64, x: Dynamic, y: Dynamic| {
        let [x, y] = floats!(s, "gfx.drawImage", false, [x, y]);
        draw_image(&mut s, handle, None, (x, y, -1.0, -1.0), true)
    });
    native!(
        module,
        services,
        "drawImageScaled",
        |s, handle: i64, x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| {
            let [x, y, w, h] = floats!(s, "gfx.drawImageScaled", false, [x, y, w, h]);
            draw_image(&mut s, handle, None, (x, y, w, h), false)
        }
    );
    native!(
        module,
        services,
        "drawImageRect",
        |s,
         handle: i64,
         sx: Dynamic,
         sy: Dynamic,
         sw: Dynamic,
         sh: Dynamic,
         dx: Dynamic,
         dy: Dynamic,
         dw: Dynamic,
         dh: Dynamic| {
            let [sx, sy, sw, sh, dx, dy, dw, dh] =
                floats!(s, "gfx.drawImageRect", false, [sx, sy, sw, sh, dx, dy, dw, dh]);
            draw_image(&mut s, handle, Some((sx, sy, sw, sh)), (dx, dy, dw, dh), false)
        }
    );
    native!(module, services, "drawSurface", |s, handle: i64, x: Dynamic, y: Dynamic| {
        let [x, y] = floats!(s, "gfx.drawSurface", false, [x, y]);
        let owner = s.cartridge_id.clone();
        let snapshot = match s.resources.surfaces.get(Handle::<Surface>::from_raw(handle), &owner) {
            Ok(surface) => Arc::new(surface.snapshot()),
            Err(err) => return Ok(fail(s.dev_mode, "gfx.drawSurface", err, false)),
        };
        let (w, h) = (snapshot.width() as f32, snapshot.height() as f32);
        let result = s.recorder.draw_image(snapshot, None, (x, y, w, h));
        record(&s, "gfx.drawSurface", result)
    });

    // --- text ---

    native!(module, services, "loadFont", |s, path: &str| {
        let bytes = match s.vfs.read_bytes(path) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(fail(s.dev_mode, "gfx.loadFont", err, 0_i64)),
        };
        let font = match FontResource::from_bytes(&bytes) {
            Ok(font) => Arc::new(font),
            Err(err) => return Ok(fail(s.dev_mode, "gfx.loadFont", err, 0_i64)),
        };
        let owner = s.cartridge_id.clone();
        match s.resources.fonts.allocate(&owner, font) {
            Ok(handle) => handle.as_raw(),
            Err(err) => fail(s.dev_mode, "gfx.loadFont", err, 0_i64),
        }
    });
    native!(module, services, "freeFont", |s, handle: i64| {
        // Commands already recorded this frame keep drawing through their
        // Arc; only the mirror for future calls is dropped.
        if let Some(freed) = s.resources.fonts.free(Handle::from_raw(handle)) {
            if let Some((current, _)) = &s.gfx_font {
                if Arc::ptr_eq(current, &freed) {
                    s.gfx_font = None;
                }
            }
        }
    });
    native!(module, services, "setFont", |s, handle: i64, px: Dynamic| {
        let [px] = floats!(s, "gfx.setFont", false, [px]);
        if px <= 0.0 {
            return Ok(fail(s.dev_mode, "gfx.setFont", "size must be positive", false));
        }
        let owner = s.cartridge_id.clone();
        let font = match s.resources.fonts.get(Handle::<Arc<FontResource>>::from_raw(handle), &owner) {
            Ok(font) => font.clone(),
            Err(err) => return Ok(fail(s.dev_mode, "gfx.setFont", err, false)),
        };
        s.gfx_font = Some((font.clone(), px));
        let result = s.recorder.set_font(Some(font), px);
        record(&s, "gfx.setFont", result)
    });
    native!(module, services, "setTextAlign", |s, name: &str| {
        match TextAlign::from_name(name) {
            Some(align) => {
                s.recorder.set_text_align(align);
                true
            }
            None => fail(s.dev_mode, "gfx.setTextAlign", format!("unknown align {:?}", name), false),
        }
    });
    native!(module, services, "setTextBaseline", |s, name: &str| {
        match TextBaseline::from_name(name) {
            Some(baseline) => {
                s.recorder.set_text_baseline(baseline);
                true
            }
            None => fail(
                s.dev_mode,
                "gfx.setTextBaseline",
                format!("unknown baseline {:?}", name),
                false,
            ),
        }
    });
    native!(module, services, "fillText", |s, text: &str, x: Dynamic, y: Dynamic| {
        let [x, y] = floats!(s, "gfx.fillText", false, [x, y]);
        let result = s.recorder.fill_text(text.to_string(), x, y, None);
        record(&s, "gfx.fillText", result)
    });
    native!(
        module,
        services,
        "fillTextMax",
        |s, text: &str, x: Dynamic, y: Dynamic, max_width: Dynamic| {
            let [x, y, max_width] = floats!(s, "gfx.fillTextMax", false, [x, y, max_width]);
            let result = s.recorder.fill_text(text.to_string(), x, y, Some(max_width));
            record(&s, "gfx.fillTextMax", result)
        }
    );
    native!(module, services, "strokeText", |s, text: &str, x: Dynamic, y: Dynamic| {
        let [x, y] = floats!(s, "gfx.strokeText", false, [x, y]);
        let result = s.recorder.stroke_text(text.to_string(), x, y, None);
        record(&s, "gfx.strokeText", result)
    });
    native!(module, services, "measureText", |s, text: &str| {
        let Some((font, px)) = s.gfx_font.clone() else {
            return Ok(fail(s.dev_mode, "gfx.measureText", "no active font", Dynamic::UNIT));
        };
        let metrics = font.measure(text, px);
        let mut map = rhai::Map::new();
        map.insert("width".into(), Dynamic::from(f64::from(metrics.width)));
        map.insert("height".into(), Dynamic::from(f64::from(metrics.height)));
        map.insert("ascent".into(), Dynamic::from(f64::from(metrics.ascent)));
        map.insert("descent".into(), Dynamic::from(f64::from(metrics.descent)));
        map.insert(
            "lineHeight".into(),
            Dynamic::from(f64::from(metrics.line_height)),
        );
        Dynamic::from_map(map)
    });

    module
}

fn make_gradient(
    s: &mut crate::services::Services,
    func: &'static str,
    kind: GradientKind,
    stops: &rhai::Array,
    spread: &str,
) -> i64 {
    let Some(spread) = SpreadMode::from_name(spread) else {
        return fail(s.dev_mode, func, "unknown spread mode", 0_i64);
    };
    let mut parsed = Vec::with_capacity(stops.len());
    for stop in stops {
        let Some(map) = stop.read_lock::<rhai::Map>() else {
            return fail(s.dev_mode, func, "stops must be maps {offset, color}", 0_i64);
        };
        let offset = map.get("offset").and_then(as_finite_f32);
        let color = map.get("color").and_then(|value| value.as_int().ok());
        match (offset, color) {
            (Some(offset), Some(color)) => parsed.push(GradientStop {
                offset,
                color: Color(color as u32),
            }),
            _ => return fail(s.dev_mode, func, "stops must be maps {offset, color}", 0_i64),
        }
    }
    let paint = match GradientPaint::new(kind, parsed, spread) {
        Ok(paint) => Arc::new(paint),
        Err(err) => return fail(s.dev_mode, func, err, 0_i64),
    };
    let owner = s.cartridge_id.clone();
    match s.resources.paints.allocate(&owner, paint) {
        Ok(handle) => handle.as_raw(),
        Err(err) => fail(s.dev_mode, func, err, 0_i64),
    }
}

fn set_paint(
    s: &mut crate::services::Services,
    func: &'static str,
    handle: i64,
    is_fill: bool,
) -> bool {
    let paint = if handle == 0 {
        None
    } else {
        let owner = s.cartridge_id.clone();
        match s
            .resources
            .paints
            .get(Handle::<Arc<GradientPaint>>::from_raw(handle), &owner)
        {
            Ok(paint) => Some(paint.clone()),
            Err(err) => return fail(s.dev_mode, func, err, false),
        }
    };
    if is_fill {
        s.recorder.set_fill_paint(paint);
    } else {
        s.recorder.set_stroke_paint(paint);
    }
    true
}

fn draw_image(
    s: &mut crate::services::Services,
    handle: i64,
    src: Option<(f32, f32, f32, f32)>,
    dst: (f32, f32, f32, f32),
    natural_size: bool,
) -> bool {
    let owner = s.cartridge_id.clone();
    let image = match s
        .resources
        .images
        .get(Handle::<Arc<CanvasImage>>::from_raw(handle), &owner)
    {
        Ok(image) => image.clone(),
        Err(err) => return fail(s.dev_mode, "gfx.drawImage", err, false),
    };
    let dst = if natural_size {
        (dst.0, dst.1, image.width() as f32, image.height() as f32)
    } else {
        dst
    };
    let result = s.recorder.draw_image(image, src, dst);
    record(s, "gfx.drawImage", result)
}
