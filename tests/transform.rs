//! Coordinate transform contracts that hold for any surface without a
//! per-surface override.

use sommelier::transform::{
    self, damage_coord, guest_to_host, guest_to_host_fixed, host_to_guest, host_to_guest_fixed,
    ScaleState, SurfaceScale,
};

fn scale(s: f64) -> ScaleState {
    ScaleState::new(s, false, false)
}

#[test]
fn positions_round_trip_for_positive_rational_scales() {
    for s in [0.25, 0.5, 1.0, 2.0, 4.0] {
        let st = scale(s);
        for v in (0..=8192).step_by(17) {
            let (mut x, mut y) = (v, 8192 - v);
            guest_to_host(&st, None, &mut x, &mut y);
            host_to_guest(&st, None, &mut x, &mut y);
            assert_eq!((x, y), (v, 8192 - v), "scale {}", s);
        }
    }
}

#[test]
fn sizes_never_shrink_below_original_with_stable_scaling() {
    for s in [1.0 / 1.5, 1.25, 2.0 / 3.0] {
        let mut st = scale(s);
        st.stable_scaling = true;
        for v in (1..=4096).step_by(13) {
            let (mut w, mut h) = (v, v);
            // A host size mapped into the guest and back may grow but must
            // never shrink below the guest-visible size.
            host_to_guest(&st, None, &mut w, &mut h);
            let (guest_w, guest_h) = (w, h);
            guest_to_host(&st, None, &mut w, &mut h);
            host_to_guest(&st, None, &mut w, &mut h);
            assert!(w >= guest_w && h >= guest_h, "scale {} size {}", s, v);
        }
    }
}

#[test]
fn pointer_coordinates_scale_with_the_virtual_space() {
    let st = scale(1.5);
    let (mut x, mut y) = (640.0, 360.0);
    host_to_guest_fixed(&st, None, &mut x, &mut y);
    assert_eq!((x, y), (960.0, 540.0));
    guest_to_host_fixed(&st, None, &mut x, &mut y);
    assert_eq!((x, y), (640.0, 360.0));
}

#[test]
fn per_surface_overrides_take_priority_in_direct_mode() {
    let mut st = ScaleState::new(1.0, true, false);
    st.xdg_scale_x = 1.0;
    st.xdg_scale_y = 1.0;
    let own = SurfaceScale {
        has_own_scale: true,
        xdg_scale_x: 1.25,
        xdg_scale_y: 1.25,
        ..Default::default()
    };
    let (mut w, mut h) = (1536, 864);
    host_to_guest(&st, Some(&own), &mut w, &mut h);
    assert_eq!((w, h), (1920, 1080));
}

#[test]
fn damage_rectangles_are_outset_before_scaling() {
    let st = scale(1.0);
    let (mut x1, mut y1, mut x2, mut y2) = (100i64, 100i64, 200i64, 200i64);
    damage_coord(&st, None, 1.0, 1.0, &mut x1, &mut y1, &mut x2, &mut y2);
    assert!(x1 <= 99 && y1 <= 99);
    assert!(x2 >= 201 && y2 >= 201);
}

#[test]
fn window_scale_probe_recovers_exact_round_trips() {
    // 1.5 logical units per virtual pixel loses a pixel on odd sizes;
    // the probe must derive factors that round-trip exactly.
    let mut st = ScaleState::new(1.0, true, false);
    st.xdg_scale_x = 1.0 / 1.5;
    st.xdg_scale_y = 1.0 / 1.5;

    for (w, h) in [(1001, 731), (1920, 1080), (641, 479)] {
        let result = transform::try_window_scale(&st, None, w, h);
        let own = SurfaceScale {
            has_own_scale: result.has_own_scale,
            xdg_scale_x: result.xdg_scale_x,
            xdg_scale_y: result.xdg_scale_y,
            round_on_x: result.round_on_x,
            round_on_y: result.round_on_y,
            ..Default::default()
        };
        let surface = result.has_own_scale.then_some(&own);
        let (mut rw, mut rh) = (w, h);
        guest_to_host(&st, surface, &mut rw, &mut rh);
        host_to_guest(&st, surface, &mut rw, &mut rh);
        assert_eq!((rw, rh), (w, h), "probe failed for {}x{}", w, h);
    }
}
