//! Window configure reconciliation seen from the outside: viewport
//! overrides, the configure event barrier and the X11 side effects.

use sommelier::output::OutputMetrics;
use sommelier::transform::ScaleState;
use sommelier::xwm::atoms::Atoms;
use sommelier::xwm::window::{
    ConfigureContext, ConfigureFlow, Window, WindowConfig, XDG_TOPLEVEL_STATE_ACTIVATED,
    XDG_TOPLEVEL_STATE_FULLSCREEN,
};
use sommelier::xwm::xshim::{FakeXConn, XCall};

fn atoms() -> Atoms {
    Atoms {
        WM_S0: 1,
        WM_PROTOCOLS: 2,
        WM_STATE: 3,
        WM_CHANGE_STATE: 4,
        WM_DELETE_WINDOW: 5,
        WM_TAKE_FOCUS: 6,
        WM_CLIENT_LEADER: 7,
        WL_SURFACE_ID: 8,
        _NET_WM_SURFACE_ID: 9,
        UTF8_STRING: 10,
        MOTIF_WM_HINTS: 11,
        TEXT: 12,
        INCR: 13,
        TARGETS: 14,
        TIMESTAMP: 15,
        CLIPBOARD: 16,
        CLIPBOARD_MANAGER: 17,
        WL_SELECTION: 18,
        _NET_ACTIVE_WINDOW: 19,
        _NET_FRAME_EXTENTS: 20,
        _NET_STARTUP_ID: 21,
        _NET_SUPPORTED: 22,
        _NET_SUPPORTING_WM_CHECK: 23,
        _NET_WM_NAME: 24,
        _NET_WM_MOVERESIZE: 25,
        _NET_WM_STATE: 26,
        _NET_WM_STATE_FULLSCREEN: 27,
        _NET_WM_STATE_MAXIMIZED_VERT: 28,
        _NET_WM_STATE_MAXIMIZED_HORZ: 29,
        _NET_WM_STATE_FOCUSED: 30,
        _NET_WM_WINDOW_TYPE: 31,
        _NET_WM_WINDOW_TYPE_NORMAL: 32,
        _NET_WM_PID: 33,
        _GTK_THEME_VARIANT: 34,
        _XWAYLAND_RANDR_EMU_MONITOR_RECTS: 35,
        STEAM_GAME: 36,
    }
}

fn game_window() -> Window {
    let mut window = Window::new(0x400, 0, 0, 1920, 1080, 0);
    window.managed = true;
    window.frame_id = 0x500;
    window.steam_game_id = Some(570);
    window.window_type = Some(atoms()._NET_WM_WINDOW_TYPE_NORMAL);
    window
}

fn direct_scale() -> ScaleState {
    let mut scale = ScaleState::new(1.0, true, false);
    scale.xdg_scale_x = 1.25;
    scale.xdg_scale_y = 1.25;
    scale
}

fn output() -> OutputMetrics {
    OutputMetrics {
        width: 1920,
        height: 1080,
        logical_width: 1536,
        logical_height: 864,
        virt_width: 1920,
        virt_height: 1080,
        virt_rotated_width: 1920,
        virt_rotated_height: 1080,
        xdg_scale_x: 1.25,
        xdg_scale_y: 1.25,
        ..Default::default()
    }
}

#[test]
fn containerized_game_keeps_its_size_and_scales_in_a_viewport() {
    // The game insists on 1920x1080; the host grants 1536x784 logical.
    // The window keeps its size, the viewport preserves the aspect ratio
    // and the pointer scale maps host space back onto it.
    let atoms = atoms();
    let scale = direct_scale();
    let output = output();
    let mut window = game_window();
    window.fullscreen = true;

    let flags = ConfigureContext { containerized: true, ..Default::default() };
    window.toplevel_configure(
        &scale,
        None,
        Some(&output),
        &atoms,
        &flags,
        None,
        1536,
        784,
        &[XDG_TOPLEVEL_STATE_FULLSCREEN],
    );

    assert_eq!((window.width, window.height), (1920, 1080));
    assert!(window.viewport_override);
    assert_eq!((window.viewport_width, window.viewport_height), (1393, 784));
    assert!((window.viewport_pointer_scale - 1536.0 / 1393.0).abs() < 1e-6);

    // A follow-up configure matching the aspect ratio clears the override.
    window.fullscreen = false;
    window.decorated = true;
    window.toplevel_configure(
        &scale,
        None,
        Some(&output),
        &atoms,
        &flags,
        None,
        1536,
        864,
        &[],
    );
    assert!(!window.viewport_override);
}

#[test]
fn containerized_fullscreen_ignores_host_unfullscreen() {
    let atoms = atoms();
    let scale = direct_scale();
    let output = output();
    let mut window = game_window();
    window.fullscreen = true;

    let flags = ConfigureContext { containerized: true, ..Default::default() };
    // Host configure without the fullscreen state.
    window.toplevel_configure(
        &scale,
        None,
        Some(&output),
        &atoms,
        &flags,
        None,
        1536,
        864,
        &[XDG_TOPLEVEL_STATE_ACTIVATED],
    );

    assert!(window.fullscreen, "client fullscreen must stick");
    assert!(window.next_config.states.contains(&atoms._NET_WM_STATE_FULLSCREEN));
}

#[test]
fn barrier_applies_only_the_newest_configure() {
    let mut window = game_window();

    window.barrier_active = true;
    assert_eq!(window.flow(), ConfigureFlow::AwaitingBarrier);

    // Two configures arrive while the barrier is up; the stale one must
    // never surface.
    window.next_config.x = Some(50);
    window.next_config.y = Some(60);
    assert!(!window.receive_xdg_configure(21));
    window.next_config.x = Some(300);
    window.next_config.y = Some(200);
    assert!(!window.receive_xdg_configure(22));

    assert_eq!(window.configure_barrier_done(), Some(22));
    assert_eq!((window.next_config.x, window.next_config.y), (Some(300), Some(200)));
    assert_eq!(window.coalesced_next_config, WindowConfig::default());
}

#[test]
fn coalesced_origin_is_not_applied_until_barrier_done() {
    let mut window = game_window();
    window.barrier_active = true;
    window.coalesced_origin = Some((50, 60));
    // Barrier resolution hands back the origin exactly once.
    assert_eq!(window.configure_barrier_done(), None);
    assert_eq!(window.coalesced_origin.take(), Some((50, 60)));
}

#[test]
fn applying_a_config_reconfigures_frame_then_client() {
    let atoms = atoms();
    let x = FakeXConn::default();
    let mut window = game_window();
    window.next_config = WindowConfig {
        serial: 31,
        x: Some(10),
        y: Some(20),
        width: Some(1280),
        height: Some(720),
        border_width: Some(0),
        states: vec![atoms._NET_WM_STATE_FOCUSED],
    };

    window.configure_window(&x, &atoms);
    let calls = x.take_calls();

    let frame_configs: Vec<_> = calls
        .iter()
        .filter(|c| matches!(c, XCall::ConfigureWindow { window: w, .. } if *w == window.frame_id))
        .collect();
    assert_eq!(frame_configs.len(), 1);
    assert!(calls.iter().any(
        |c| matches!(c, XCall::ConfigureWindow { window: w, x: Some(0), y: Some(0), .. } if *w == window.id)
    ));
    assert_eq!(window.flow(), ConfigureFlow::AwaitingAck);
    assert!(window.pending_config_ackable(false, 1280, 720));
    assert!(!window.pending_config_ackable(false, 1920, 1080));
}
