//! Display-space to console-space mouse mapping.

use arc_cartridge::ScalingMode;

/// The present viewport as computed by the render pipeline, in physical
/// backbuffer pixels. `x`/`y` may be negative in `fill` mode where the
/// viewport extends past the backbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportRect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

/// Everything the mapping needs from the presenter, captured per frame.
#[derive(Debug, Clone, Copy)]
pub struct MouseMapping {
    pub viewport: ViewportRect,
    pub console: (u32, u32),
    pub mode: ScalingMode,
}

/// Maps a display-space cursor position into console space.
///
/// Returns `None` when the cursor does not land on a console pixel: outside
/// the letterboxed viewport for `fit`/`integer_nearest`, or outside the
/// visible crop for `fill`.
pub fn map_to_console(mapping: &MouseMapping, mx: f64, my: f64) -> Option<(f64, f64)> {
    let ViewportRect { x, y, w, h } = mapping.viewport;
    let (cw, ch) = mapping.console;
    if w == 0 || h == 0 || cw == 0 || ch == 0 {
        return None;
    }

    match mapping.mode {
        ScalingMode::Fit | ScalingMode::IntegerNearest => {
            let inside = mx >= f64::from(x)
                && mx < f64::from(x) + f64::from(w)
                && my >= f64::from(y)
                && my < f64::from(y) + f64::from(h);
            if !inside {
                return None;
            }
        }
        ScalingMode::Fill | ScalingMode::Stretch => {}
    }

    let cx = (mx - f64::from(x)) * f64::from(cw) / f64::from(w);
    let cy = (my - f64::from(y)) * f64::from(ch) / f64::from(h);

    if cx >= 0.0 && cx < f64::from(cw) && cy >= 0.0 && cy < f64::from(ch) {
        Some((cx, cy))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(viewport: (i32, i32, u32, u32), console: (u32, u32), mode: ScalingMode) -> MouseMapping {
        MouseMapping {
            viewport: ViewportRect {
                x: viewport.0,
                y: viewport.1,
                w: viewport.2,
                h: viewport.3,
            },
            console,
            mode,
        }
    }

    #[test]
    fn letterboxed_outside_is_none() {
        // 480x270 console presented 4x on a 1920x1200 backbuffer.
        let m = mapping((0, 60, 1920, 1080), (480, 270), ScalingMode::IntegerNearest);
        assert_eq!(map_to_console(&m, 10.0, 10.0), None);
        assert_eq!(map_to_console(&m, 0.0, 60.0), Some((0.0, 0.0)));

        let (cx, cy) = map_to_console(&m, 960.0, 600.0).unwrap();
        assert_eq!((cx, cy), (240.0, 135.0));

        // The right/bottom edges are exclusive.
        assert_eq!(map_to_console(&m, 1920.0, 600.0), None);
        assert_eq!(map_to_console(&m, 100.0, 1140.0), None);
    }

    #[test]
    fn stretch_maps_the_whole_backbuffer() {
        let m = mapping((0, 0, 1000, 500), (480, 270), ScalingMode::Stretch);
        let (cx, cy) = map_to_console(&m, 500.0, 250.0).unwrap();
        assert_eq!((cx, cy), (240.0, 135.0));
    }

    #[test]
    fn fill_inverts_the_crop() {
        // Console 480x270 filling a 1000x1000 backbuffer: s = max(1000/480,
        // 1000/270) ≈ 3.7; viewport 1778x1000 centered → x = -389.
        let m = mapping((-389, 0, 1778, 1000), (480, 270), ScalingMode::Fill);
        // The backbuffer center hits the console center.
        let (cx, cy) = map_to_console(&m, 500.0, 500.0).unwrap();
        assert!((cx - 240.0).abs() < 1.0);
        assert!((cy - 135.0).abs() < 1.0);
        // The left edge of the backbuffer lands inside the console because
        // the crop pushed the console's left edge off screen.
        let (cx, _) = map_to_console(&m, 0.0, 500.0).unwrap();
        assert!(cx > 0.0 && cx < 240.0);
    }

    #[test]
    fn degenerate_viewport_is_none() {
        let m = mapping((0, 0, 0, 0), (480, 270), ScalingMode::Fit);
        assert_eq!(map_to_console(&m, 0.0, 0.0), None);
    }
}
