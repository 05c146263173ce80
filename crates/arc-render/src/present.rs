//! Present-mode viewport math.
//!
//! Pure functions mapping the console framebuffer onto the backbuffer.
//! Pixel-aligned integer results; stable across backends by construction.

use arc_cartridge::ScalingMode;

/// Pixel-aligned viewport in backbuffer space. `x`/`y` can be negative in
/// `fill` mode, where the viewport extends past the backbuffer and the
/// scissor crops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    /// The mode that actually applied (`integer_nearest` degrades to `fit`
    /// when even 1x does not fit).
    pub mode: ScalingMode,
}

impl Viewport {
    /// Nearest sampling is mandatory for integer scaling; everything else
    /// filters linearly.
    pub fn wants_nearest(&self) -> bool {
        self.mode == ScalingMode::IntegerNearest
    }
}

/// Computes the viewport for a backbuffer of `bw x bh` and a console
/// framebuffer of `cw x ch` under the given mode.
pub fn compute_viewport(mode: ScalingMode, bw: u32, bh: u32, cw: u32, ch: u32) -> Viewport {
    if bw == 0 || bh == 0 || cw == 0 || ch == 0 {
        return Viewport {
            x: 0,
            y: 0,
            w: bw,
            h: bh,
            mode: ScalingMode::Stretch,
        };
    }
    match mode {
        ScalingMode::Fit => fit(bw, bh, cw, ch),
        ScalingMode::IntegerNearest => {
            let k = (bw / cw).min(bh / ch);
            if k < 1 {
                // Degrade to fit for this frame; the window is smaller than
                // one integer scale step.
                fit(bw, bh, cw, ch)
            } else {
                let w = cw * k;
                let h = ch * k;
                Viewport {
                    x: ((bw - w) / 2) as i32,
                    y: ((bh - h) / 2) as i32,
                    w,
                    h,
                    mode: ScalingMode::IntegerNearest,
                }
            }
        }
        ScalingMode::Fill => {
            let scale = (f64::from(bw) / f64::from(cw)).max(f64::from(bh) / f64::from(ch));
            let w = (f64::from(cw) * scale).ceil() as u32;
            let h = (f64::from(ch) * scale).ceil() as u32;
            Viewport {
                x: (i64::from(bw) - i64::from(w)) as i32 / 2,
                y: (i64::from(bh) - i64::from(h)) as i32 / 2,
                w,
                h,
                mode: ScalingMode::Fill,
            }
        }
        ScalingMode::Stretch => Viewport {
            x: 0,
            y: 0,
            w: bw,
            h: bh,
            mode: ScalingMode::Stretch,
        },
    }
}

fn fit(bw: u32, bh: u32, cw: u32, ch: u32) -> Viewport {
    let scale = (f64::from(bw) / f64::from(cw)).min(f64::from(bh) / f64::from(ch));
    let w = (f64::from(cw) * scale).floor() as u32;
    let h = (f64::from(ch) * scale).floor() as u32;
    Viewport {
        x: ((bw - w) / 2) as i32,
        y: ((bh - h) / 2) as i32,
        w,
        h,
        mode: ScalingMode::Fit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_nearest_viewports() {
        // 480x270 console, 1920x1200 backbuffer: k = 4, centered letterbox.
        let vp = compute_viewport(ScalingMode::IntegerNearest, 1920, 1200, 480, 270);
        assert_eq!((vp.x, vp.y, vp.w, vp.h), (0, 60, 1920, 1080));
        assert!(vp.wants_nearest());

        // 1600x900: k = 3.
        let vp = compute_viewport(ScalingMode::IntegerNearest, 1600, 900, 480, 270);
        assert_eq!((vp.x, vp.y, vp.w, vp.h), (80, 45, 1440, 810));

        // 300x300 cannot hold even 1x 480x270: degrade to fit.
        let vp = compute_viewport(ScalingMode::IntegerNearest, 300, 300, 480, 270);
        assert_eq!(vp.mode, ScalingMode::Fit);
        assert!(!vp.wants_nearest());
        assert_eq!(vp.w, 300);
    }

    #[test]
    fn fit_letterboxes_and_centers() {
        let vp = compute_viewport(ScalingMode::Fit, 1920, 1200, 480, 270);
        // s = 4.0 exactly (width-limited): 1920x1080 centered.
        assert_eq!((vp.x, vp.y, vp.w, vp.h), (0, 60, 1920, 1080));

        let vp = compute_viewport(ScalingMode::Fit, 1000, 1000, 480, 270);
        // s = 1000/480; vh = floor(270 * s) = 562.
        assert_eq!((vp.w, vp.h), (1000, 562));
        assert_eq!(vp.y, 219);
    }

    #[test]
    fn fill_covers_and_crops() {
        let vp = compute_viewport(ScalingMode::Fill, 1000, 1000, 480, 270);
        // s = 1000/270; vw = ceil(480 * s) = 1778, sticking out on x.
        assert_eq!(vp.h, 1000);
        assert_eq!(vp.w, 1778);
        assert_eq!(vp.x, -389);
        assert_eq!(vp.y, 0);
    }

    #[test]
    fn stretch_ignores_aspect() {
        let vp = compute_viewport(ScalingMode::Stretch, 1234, 555, 480, 270);
        assert_eq!((vp.x, vp.y, vp.w, vp.h), (0, 0, 1234, 555));
    }

    #[test]
    fn degenerate_sizes_do_not_divide_by_zero() {
        let vp = compute_viewport(ScalingMode::Fit, 0, 0, 480, 270);
        assert_eq!((vp.w, vp.h), (0, 0));
    }
}
