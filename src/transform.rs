//! Coordinate transforms between guest virtual pixels and host logical
//! units.
//!
//! Three coordinate spaces are involved:
//!
//! 1. *Physical*: raw pixels of the display device.
//! 2. *Virtual*: what guest clients see. Derived from the physical space by
//!    the user's `--scale` factor.
//! 3. *Host logical*: what the host compositor lays windows out in, as
//!    reported through xdg_output, toplevel configure events and pointer
//!    coordinates.
//!
//! In the default mode a single context-wide scale forms the
//! virtual-to-logical ratio. In direct-scale mode each axis carries its own
//! ratio, derived from the internal output's virtual and logical
//! dimensions, and individual surfaces may carry overriding ratios found by
//! [`try_window_scale`] when the global factors do not round-trip a
//! window's size exactly.
//!
//! Every transform exists in both directions; guest-to-host divides by the
//! scale, host-to-guest multiplies. Sizes round outward (ceil toward the
//! host, floor toward the guest) under `--stable-scaling`, positions
//! truncate toward zero unless a per-surface round flag was recorded by the
//! window-size probe.

use crate::output::OutputMetrics;

/// Context-wide scale factors. Owned by the context; the virtual and xdg
/// factors are refreshed whenever the internal output recomputes.
#[derive(Debug, Clone)]
pub struct ScaleState {
    /// The user's virtual↔logical scale.
    pub scale: f64,
    /// Use per-axis xdg scales instead of `scale`.
    pub direct_scale: bool,
    /// Round outward so repeated transforms cannot drift.
    pub stable_scaling: bool,
    /// Per-axis virtual↔logical ratio of the internal output.
    pub xdg_scale_x: f64,
    /// See [`ScaleState::xdg_scale_x`].
    pub xdg_scale_y: f64,
    /// Per-axis physical↔virtual ratio of the internal output.
    pub virt_scale_x: f64,
    /// See [`ScaleState::virt_scale_x`].
    pub virt_scale_y: f64,
}

impl ScaleState {
    /// Initial state before any output has been seen.
    pub fn new(scale: f64, direct_scale: bool, stable_scaling: bool) -> Self {
        ScaleState {
            scale,
            direct_scale,
            stable_scaling,
            xdg_scale_x: 1.0,
            xdg_scale_y: 1.0,
            virt_scale_x: 1.0,
            virt_scale_y: 1.0,
        }
    }
}

/// Scale factors of one surface, flattened from the surface, its window
/// and its cached output at call time so the transforms never chase stale
/// references.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurfaceScale {
    /// A window-size probe recorded per-surface factors.
    pub has_own_scale: bool,
    /// Per-surface virtual↔logical ratio (valid when `has_own_scale`).
    pub xdg_scale_x: f64,
    /// See [`SurfaceScale::xdg_scale_x`].
    pub xdg_scale_y: f64,
    /// Round to nearest instead of truncating on the X axis.
    pub round_on_x: bool,
    /// Round to nearest instead of truncating on the Y axis.
    pub round_on_y: bool,
    /// xdg scales of the output the surface was last seen on.
    pub output_xdg_scale: Option<(f64, f64)>,
    /// Pointer coordinates are additionally multiplied by this factor while
    /// the surface's window is resized through a viewport override.
    pub viewport_pointer_scale: Option<f64>,
}

/// Vertical axis specifier, following `wl_pointer::axis`.
pub const AXIS_VERTICAL: u32 = 0;
/// Horizontal axis specifier, following `wl_pointer::axis`.
pub const AXIS_HORIZONTAL: u32 = 1;

fn stable_host_to_guest(value: i64, scale: f64) -> i64 {
    (value as f64 * scale).ceil() as i64
}

fn stable_size_host_to_guest(value: i32, scale: f64) -> i32 {
    (value as f64 * scale).floor() as i32
}

fn stable_guest_to_host(value: i64, scale: f64) -> i64 {
    (value as f64 / scale).floor() as i64
}

fn stable_size_guest_to_host(value: i32, scale: f64) -> i32 {
    (value as f64 / scale).ceil() as i32
}

fn scale_factors(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
) -> (f64, f64) {
    match surface {
        Some(s) if scale.direct_scale && s.has_own_scale => (s.xdg_scale_x, s.xdg_scale_y),
        Some(SurfaceScale { output_xdg_scale: Some(output_scale), .. }) => *output_scale,
        _ => (scale.xdg_scale_x, scale.xdg_scale_y),
    }
}

fn direct_axis_scale(scale: &ScaleState, surface: Option<&SurfaceScale>, axis: u32) -> f64 {
    let (sx, sy) = scale_factors(scale, surface);
    if axis == AXIS_VERTICAL {
        sy
    } else {
        sx
    }
}

fn direct_to_guest(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    x: &mut i32,
    y: &mut i32,
) {
    let (sx, sy) = scale_factors(scale, surface);
    if scale.stable_scaling {
        *x = stable_host_to_guest(*x as i64, sx) as i32;
        *y = stable_host_to_guest(*y as i64, sy) as i32;
    } else {
        let ix = *x as f64 * sx;
        let iy = *y as f64 * sy;
        *x = if surface.is_some_and(|s| s.round_on_x) {
            ix.round() as i32
        } else {
            ix.trunc() as i32
        };
        *y = if surface.is_some_and(|s| s.round_on_y) {
            iy.round() as i32
        } else {
            iy.trunc() as i32
        };
    }
}

fn direct_to_host(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    x: &mut i32,
    y: &mut i32,
) {
    let (sx, sy) = scale_factors(scale, surface);
    if scale.stable_scaling {
        *x = stable_guest_to_host(*x as i64, sx) as i32;
        *y = stable_guest_to_host(*y as i64, sy) as i32;
    } else {
        *x = (*x as f64 / sx).trunc() as i32;
        *y = (*y as f64 / sy).trunc() as i32;
    }
}

/// Transform a host size or offset to guest virtual pixels.
pub fn host_to_guest(scale: &ScaleState, surface: Option<&SurfaceScale>, x: &mut i32, y: &mut i32) {
    if scale.direct_scale {
        direct_to_guest(scale, surface, x, y);
    } else if scale.stable_scaling {
        *x = stable_host_to_guest(*x as i64, scale.scale) as i32;
        *y = stable_host_to_guest(*y as i64, scale.scale) as i32;
    } else {
        *x = (*x as f64 * scale.scale) as i32;
        *y = (*y as f64 * scale.scale) as i32;
    }
}

/// Transform host fixed-point coordinates to guest virtual pixels.
pub fn host_to_guest_fixed(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    x: &mut f64,
    y: &mut f64,
) {
    if scale.direct_scale {
        let (sx, sy) = scale_factors(scale, surface);
        *x *= sx;
        *y *= sy;
    } else {
        *x *= scale.scale;
        *y *= scale.scale;
    }
}

/// Transform one host fixed-point coordinate along `axis`.
pub fn host_to_guest_fixed_axis(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    coord: &mut f64,
    axis: u32,
) {
    if scale.direct_scale {
        *coord *= direct_axis_scale(scale, surface, axis);
    } else {
        *coord *= scale.scale;
    }
}

/// Transform host pointer coordinates to the guest, additionally applying
/// the window's viewport pointer scale so the cursor stays registered on
/// the pixel the user sees.
pub fn pointer(scale: &ScaleState, surface: Option<&SurfaceScale>, x: &mut f64, y: &mut f64) {
    host_to_guest_fixed(scale, surface, x, y);
    if let Some(factor) = surface.and_then(|s| s.viewport_pointer_scale) {
        *x *= factor;
        *y *= factor;
    }
}

/// Transform a guest size or offset to host logical units.
pub fn guest_to_host(scale: &ScaleState, surface: Option<&SurfaceScale>, x: &mut i32, y: &mut i32) {
    if scale.direct_scale {
        direct_to_host(scale, surface, x, y);
    } else if scale.stable_scaling {
        *x = stable_guest_to_host(*x as i64, scale.scale) as i32;
        *y = stable_guest_to_host(*y as i64, scale.scale) as i32;
    } else {
        *x = (*x as f64 / scale.scale) as i32;
        *y = (*y as f64 / scale.scale) as i32;
    }
}

/// Transform guest fixed-point coordinates to host logical units.
pub fn guest_to_host_fixed(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    x: &mut f64,
    y: &mut f64,
) {
    if scale.direct_scale {
        let (sx, sy) = scale_factors(scale, surface);
        *x /= sx;
        *y /= sy;
    } else {
        *x /= scale.scale;
        *y /= scale.scale;
    }
}

/// Transform one guest fixed-point coordinate along `axis`.
pub fn guest_to_host_fixed_axis(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    coord: &mut f64,
    axis: u32,
) {
    if scale.direct_scale {
        *coord /= direct_axis_scale(scale, surface, axis);
    } else {
        *coord /= scale.scale;
    }
}

/// Result of a viewport decision for a commit, see [`viewport_scale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportDestination {
    /// Logical width to pass to `wp_viewport.set_destination`.
    pub width: i32,
    /// Logical height to pass to `wp_viewport.set_destination`.
    pub height: i32,
}

/// Compute the viewport destination for committed contents of
/// `width`×`height` pixels.
///
/// A window with an active viewport override (set when resizing a
/// non-resizable window) dictates the destination directly; otherwise the
/// pixel size is transformed to logical units. Logical dimensions are
/// clamped to at least one so very small surfaces stay valid for the
/// viewporter interface.
pub fn viewport_scale(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    viewport_override: Option<(i32, i32)>,
    contents_scale: f64,
    width: &mut i32,
    height: &mut i32,
) -> ViewportDestination {
    if let Some((w, h)) = viewport_override {
        *width = w;
        *height = h;
    } else if scale.direct_scale {
        direct_to_host(scale, surface, width, height);
        if *width <= 0 {
            *width = 1;
        }
        if *height <= 0 {
            *height = 1;
        }
    } else {
        let combined = scale.scale * contents_scale;
        if scale.stable_scaling {
            *width = stable_size_guest_to_host(*width, combined);
            *height = stable_size_guest_to_host(*height, combined);
        } else {
            *width = (*width as f64 / combined).ceil() as i32;
            *height = (*height as f64 / combined).ceil() as i32;
        }
    }
    ViewportDestination { width: *width, height: *height }
}

const DAMAGE_MIN: i64 = 0;
const DAMAGE_MAX: i64 = i32::MAX as i64;

/// Transform one damage rectangle from buffer pixels to host units.
///
/// The rectangle is outset by one pixel on every side before scaling to
/// absorb filtering at the edges.
pub fn damage_coord(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    buffer_scale_x: f64,
    buffer_scale_y: f64,
    x1: &mut i64,
    y1: &mut i64,
    x2: &mut i64,
    y2: &mut i64,
) {
    if scale.direct_scale {
        let (mut sx, mut sy) = scale_factors(scale, surface);
        sx *= buffer_scale_x;
        sy *= buffer_scale_y;
        if scale.stable_scaling {
            *x1 = stable_guest_to_host(*x1, sx);
            *y1 = stable_guest_to_host(*y1, sy);
            *x2 = stable_guest_to_host(*x2, sx);
            *y2 = stable_guest_to_host(*y2, sy);
        } else {
            *x1 = (*x1 as f64 / sx).trunc() as i64;
            *y1 = (*y1 as f64 / sy).trunc() as i64;
            *x2 = (*x2 as f64 / sx).trunc() as i64;
            *y2 = (*y2 as f64 / sy).trunc() as i64;
        }
    } else {
        let sx = buffer_scale_x * scale.scale;
        let sy = buffer_scale_y * scale.scale;
        *x1 = ((*x1 - 1).max(DAMAGE_MIN) as f64 / sx) as i64;
        *y1 = ((*y1 - 1).max(DAMAGE_MIN) as f64 / sy) as i64;
        *x2 = ((*x2 + 1).min(DAMAGE_MAX) as f64 / sx).ceil() as i64;
        *y2 = ((*y2 + 1).min(DAMAGE_MAX) as f64 / sy).ceil() as i64;
    }
}

/// Physical-to-virtual transform for output dimensions.
pub fn output_dimensions(scale: &ScaleState, width: &mut i32, height: &mut i32) {
    if scale.stable_scaling {
        *width = stable_size_host_to_guest(*width, scale.scale);
        *height = stable_size_host_to_guest(*height, scale.scale);
    } else {
        *width = (*width as f64 * scale.scale) as i32;
        *height = (*height as f64 * scale.scale) as i32;
    }
}

/// Find the output containing the virtual X coordinate, or the nearest one
/// when the coordinate is out of bounds. Outputs form a single horizontal
/// row in virtual space, so the Y coordinate never matters.
pub fn infer_output_for_guest_position(outputs: &[&OutputMetrics], virt_x: i32) -> Option<usize> {
    for (i, output) in outputs.iter().enumerate() {
        if virt_x >= output.virt_x && virt_x < output.virt_x + output.width {
            return Some(i);
        }
    }
    match outputs.first() {
        Some(first) if virt_x < first.virt_x => Some(0),
        _ => {
            if outputs.is_empty() {
                None
            } else {
                Some(outputs.len() - 1)
            }
        }
    }
}

/// Find the output containing, or Manhattan-closest to, the host logical
/// position.
pub fn infer_output_for_host_position(
    outputs: &[&OutputMetrics],
    host_x: i32,
    host_y: i32,
) -> Option<usize> {
    let mut closest = None;
    let mut closest_distance = i32::MAX;

    for (i, output) in outputs.iter().enumerate() {
        let x_distance = if host_x < output.x {
            output.x - host_x
        } else if host_x < output.x + output.width {
            0
        } else {
            host_x - (output.x + output.width)
        };
        let y_distance = if host_y < output.y {
            output.y - host_y
        } else if host_y < output.y + output.height {
            0
        } else {
            host_y - (output.y + output.height)
        };
        if x_distance + y_distance < closest_distance {
            closest = Some(i);
            closest_distance = x_distance + y_distance;
            if closest_distance == 0 {
                break;
            }
        }
    }
    closest
}

/// Transform a global guest position to a global host position. Returns the
/// index of the output the position falls on.
pub fn guest_position_to_host_position(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    outputs: &[&OutputMetrics],
    x: &mut i32,
    y: &mut i32,
) -> Option<usize> {
    let index = infer_output_for_guest_position(outputs, *x)?;
    let output = outputs[index];

    // Global guest to output-relative guest, then to host logical, then to
    // global host.
    *x -= output.virt_x;
    guest_to_host(scale, surface, x, y);
    *x += output.x;
    *y += output.y;

    Some(index)
}

/// Transform a global host position to a global guest position. Returns the
/// index of the output the position falls on.
pub fn host_position_to_guest_position(
    scale: &ScaleState,
    surface: Option<&SurfaceScale>,
    outputs: &[&OutputMetrics],
    x: &mut i32,
    y: &mut i32,
) -> Option<usize> {
    let index = infer_output_for_host_position(outputs, *x, *y)?;
    let output = outputs[index];

    *x -= output.x;
    *y -= output.y;
    host_to_guest(scale, surface, x, y);
    *x += output.virt_x;

    Some(index)
}

/// Outcome of the window-size probe, to be stored on the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowScale {
    /// The probe found that the global factors do not round-trip; the
    /// remaining fields are valid.
    pub has_own_scale: bool,
    /// Per-surface virtual↔logical ratio on X.
    pub xdg_scale_x: f64,
    /// Per-surface virtual↔logical ratio on Y.
    pub xdg_scale_y: f64,
    /// Force round-to-nearest on X so the round trip recovers exactly.
    pub round_on_x: bool,
    /// Force round-to-nearest on Y so the round trip recovers exactly.
    pub round_on_y: bool,
    /// Logical width the probe used, cached to detect host-side resizes.
    pub cached_logical_width: i32,
    /// Logical height the probe used, cached to detect host-side resizes.
    pub cached_logical_height: i32,
}

/// Probe whether a window of `width`×`height` virtual pixels survives a
/// guest→host→guest round trip with the global scale factors, and derive
/// per-surface factors when it does not.
///
/// Only meaningful in direct-scale mode; otherwise the default (no own
/// scale) is returned.
pub fn try_window_scale(
    scale: &ScaleState,
    surface_output: Option<(f64, f64)>,
    width_in_pixels: i32,
    height_in_pixels: i32,
) -> WindowScale {
    let mut result = WindowScale::default();
    if !scale.direct_scale {
        return result;
    }

    // Probe with any previous per-surface factors cleared.
    let probe = SurfaceScale { output_xdg_scale: surface_output, ..Default::default() };

    let mut reverse_width = width_in_pixels;
    let mut reverse_height = height_in_pixels;
    guest_to_host(scale, Some(&probe), &mut reverse_width, &mut reverse_height);

    let logical_width = reverse_width;
    let logical_height = reverse_height;

    host_to_guest(scale, Some(&probe), &mut reverse_width, &mut reverse_height);

    if (reverse_width != width_in_pixels || reverse_height != height_in_pixels)
        && logical_width > 0
        && logical_height > 0
    {
        result.has_own_scale = true;
        result.xdg_scale_x = width_in_pixels as f64 / logical_width as f64;
        result.xdg_scale_y = height_in_pixels as f64 / logical_height as f64;
        result.cached_logical_width = logical_width;
        result.cached_logical_height = logical_height;

        // One more full cycle with the derived factors; when truncation
        // still loses a pixel the conversion to the guest must round up.
        let own = SurfaceScale {
            has_own_scale: true,
            xdg_scale_x: result.xdg_scale_x,
            xdg_scale_y: result.xdg_scale_y,
            ..Default::default()
        };
        let mut reverse_width = width_in_pixels;
        let mut reverse_height = height_in_pixels;
        guest_to_host(scale, Some(&own), &mut reverse_width, &mut reverse_height);
        host_to_guest(scale, Some(&own), &mut reverse_width, &mut reverse_height);

        if reverse_width != width_in_pixels {
            result.round_on_x = true;
        }
        if reverse_height != height_in_pixels {
            result.round_on_y = true;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale(s: f64) -> ScaleState {
        ScaleState::new(s, false, false)
    }

    fn direct(xdg_x: f64, xdg_y: f64) -> ScaleState {
        let mut s = ScaleState::new(1.0, true, false);
        s.xdg_scale_x = xdg_x;
        s.xdg_scale_y = xdg_y;
        s
    }

    fn output(x: i32, width: i32, virt_x: i32, virt_width: i32) -> OutputMetrics {
        OutputMetrics {
            x,
            width,
            height: 1080,
            virt_x,
            virt_width,
            virt_rotated_width: virt_width,
            virt_rotated_height: 1080,
            ..Default::default()
        }
    }

    #[test]
    fn identity_scale_is_identity() {
        let s = scale(1.0);
        let (mut x, mut y) = (123, 456);
        guest_to_host(&s, None, &mut x, &mut y);
        assert_eq!((x, y), (123, 456));
        host_to_guest(&s, None, &mut x, &mut y);
        assert_eq!((x, y), (123, 456));
    }

    #[test]
    fn round_trip_preserves_positions() {
        // Positive rational scales must round-trip every position.
        for s in [0.5, 1.0, 2.0] {
            let st = scale(s);
            for v in [0, 1, 7, 100, 1279, 8192] {
                let (mut x, mut y) = (v, v);
                guest_to_host(&st, None, &mut x, &mut y);
                host_to_guest(&st, None, &mut x, &mut y);
                assert_eq!((x, y), (v, v), "scale {}", s);
            }
        }
    }

    #[test]
    fn sizes_never_shrink_through_stable_round_trip() {
        let mut st = scale(1.0 / 1.5);
        st.stable_scaling = true;
        for v in [1, 2, 3, 99, 100, 101, 1080] {
            let (mut w, mut h) = (v, v);
            host_to_guest(&st, None, &mut w, &mut h);
            let (mut rw, mut rh) = (w, h);
            guest_to_host(&st, None, &mut rw, &mut rh);
            assert!(rw >= w && rh >= h);
        }
    }

    #[test]
    fn fixed_point_scales_symmetrically() {
        let st = scale(0.5);
        let (mut x, mut y) = (640.0, 360.0);
        host_to_guest_fixed(&st, None, &mut x, &mut y);
        assert_eq!((x, y), (320.0, 180.0));
        guest_to_host_fixed(&st, None, &mut x, &mut y);
        assert_eq!((x, y), (640.0, 360.0));
    }

    #[test]
    fn direct_scale_uses_per_axis_factors() {
        let st = direct(2.0, 0.5);
        let (mut x, mut y) = (100, 100);
        host_to_guest(&st, None, &mut x, &mut y);
        assert_eq!((x, y), (200, 50));
    }

    #[test]
    fn per_surface_scale_wins_over_context() {
        let st = direct(1.0, 1.0);
        let own = SurfaceScale {
            has_own_scale: true,
            xdg_scale_x: 2.0,
            xdg_scale_y: 2.0,
            ..Default::default()
        };
        let (mut x, mut y) = (10, 10);
        host_to_guest(&st, Some(&own), &mut x, &mut y);
        assert_eq!((x, y), (20, 20));
    }

    #[test]
    fn output_scale_wins_over_context_without_own_scale() {
        let st = direct(1.0, 1.0);
        let s = SurfaceScale { output_xdg_scale: Some((3.0, 3.0)), ..Default::default() };
        let (mut x, mut y) = (10, 10);
        host_to_guest(&st, Some(&s), &mut x, &mut y);
        assert_eq!((x, y), (30, 30));
    }

    #[test]
    fn pointer_applies_viewport_scale() {
        let st = scale(1.0);
        let s = SurfaceScale { viewport_pointer_scale: Some(1.25), ..Default::default() };
        let (mut x, mut y) = (100.0, 80.0);
        pointer(&st, Some(&s), &mut x, &mut y);
        assert_eq!((x, y), (125.0, 100.0));
    }

    #[test]
    fn pointer_events_scale_up_with_virtual_space() {
        // With 1.5 virtual pixels per logical unit, a host pointer event at
        // (640,360) lands at guest (960,540).
        let st = scale(1.5);
        let (mut x, mut y) = (640.0, 360.0);
        host_to_guest_fixed(&st, None, &mut x, &mut y);
        assert_eq!((x, y), (960.0, 540.0));
    }

    #[test]
    fn viewport_override_dictates_destination() {
        let st = scale(1.0);
        let (mut w, mut h) = (1920, 1080);
        let dest = viewport_scale(&st, None, Some((1393, 784)), 1.0, &mut w, &mut h);
        assert_eq!(dest, ViewportDestination { width: 1393, height: 784 });
    }

    #[test]
    fn viewport_scales_and_clamps_to_one() {
        let st = direct(8.0, 8.0);
        let (mut w, mut h) = (4, 4);
        let dest = viewport_scale(&st, None, None, 1.0, &mut w, &mut h);
        assert_eq!(dest, ViewportDestination { width: 1, height: 1 });
    }

    #[test]
    fn damage_outsets_by_one_pixel() {
        let st = scale(1.0);
        let (mut x1, mut y1, mut x2, mut y2) = (10i64, 10i64, 20i64, 20i64);
        damage_coord(&st, None, 1.0, 1.0, &mut x1, &mut y1, &mut x2, &mut y2);
        assert_eq!((x1, y1, x2, y2), (9, 9, 21, 21));
    }

    #[test]
    fn damage_clamps_at_origin() {
        let st = scale(1.0);
        let (mut x1, mut y1, mut x2, mut y2) = (0i64, 0i64, 5i64, 5i64);
        damage_coord(&st, None, 1.0, 1.0, &mut x1, &mut y1, &mut x2, &mut y2);
        assert_eq!((x1, y1), (0, 0));
        assert_eq!((x2, y2), (6, 6));
    }

    #[test]
    fn positions_translate_between_output_rows() {
        // Host: output A at x=0 (1920 wide), output B at x=1920.
        // Virtual: A at 0, B at 1920 (scale 1).
        let a = output(0, 1920, 0, 1920);
        let b = output(1920, 1920, 1920, 1920);
        let outputs = [&a, &b];
        let st = scale(1.0);

        let (mut x, mut y) = (2000, 500);
        let index = host_position_to_guest_position(&st, None, &outputs, &mut x, &mut y);
        assert_eq!(index, Some(1));
        assert_eq!((x, y), (2000, 500));
    }

    #[test]
    fn host_output_offsets_do_not_leak_into_virtual_space() {
        // Host places B at a negative position; virtually it is still the
        // right neighbour of A.
        let a = output(0, 1920, 0, 1920);
        let b = output(-3840, 1920, 1920, 1920);
        // host_outputs are ordered by host x.
        let outputs = [&b, &a];
        let st = scale(1.0);

        let (mut x, mut y) = (-3840 + 100, 50);
        host_position_to_guest_position(&st, None, &outputs, &mut x, &mut y);
        assert_eq!((x, y), (1920 + 100, 50));

        let (mut x, mut y) = (1920 + 100, 50);
        guest_position_to_host_position(&st, None, &outputs, &mut x, &mut y);
        assert_eq!((x, y), (-3840 + 100, 50));
    }

    #[test]
    fn probe_finds_no_own_scale_when_round_trip_matches() {
        let st = direct(1.0, 1.0);
        let result = try_window_scale(&st, None, 1920, 1080);
        assert!(!result.has_own_scale);
    }

    #[test]
    fn probe_derives_exact_factors_when_truncation_loses_pixels() {
        // 1.5 logical-per-virtual: 1001 px -> 667 logical -> 1000 px.
        let st = direct(1.0 / 1.5, 1.0 / 1.5);
        let result = try_window_scale(&st, None, 1001, 1080);
        assert!(result.has_own_scale);
        let own = SurfaceScale {
            has_own_scale: true,
            xdg_scale_x: result.xdg_scale_x,
            xdg_scale_y: result.xdg_scale_y,
            round_on_x: result.round_on_x,
            round_on_y: result.round_on_y,
            ..Default::default()
        };
        let (mut w, mut h) = (1001, 1080);
        guest_to_host(&st, Some(&own), &mut w, &mut h);
        host_to_guest(&st, Some(&own), &mut w, &mut h);
        assert_eq!((w, h), (1001, 1080));
    }
}
