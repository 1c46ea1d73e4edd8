//! X11 window state and configure reconciliation.
//!
//! Two authorities emit configure information: the X11 client via
//! ConfigureRequest, and the host via xdg/aura toplevel configure events.
//! The window reconciles them through three config slots:
//!
//! - `next_config` holds the values of the most recent host configure,
//!   waiting for its `xdg_surface.configure` serial;
//! - `pending_config` is a config that has been applied to the X11 side
//!   and is waiting for the client to commit matching contents before the
//!   serial is acked;
//! - `coalesced_next_config` collects configures arriving while a
//!   configure event barrier is active (after `set_window_bounds`); only
//!   the newest survives.
//!
//! Seen as a state machine per window the flow is Idle → AwaitingAck on
//! apply, and AwaitingBarrier while a barrier is outstanding, with the
//! barrier's `done` re-injecting the last coalesced configure.

use wayland_server::backend::ObjectId;
use x11rb::protocol::xproto::{
    ClientMessageData, ClientMessageEvent, ConfigureNotifyEvent, ConfigureWindowAux, EventMask,
    Window as XWindow, CLIENT_MESSAGE_EVENT, CONFIGURE_NOTIFY_EVENT,
};

use exo_protocols::aura_shell::v38::client::zaura_surface::ZauraSurface as CZauraSurface;
use exo_protocols::aura_shell::v38::client::zaura_toplevel::ZauraToplevel as CZauraToplevel;
use wayland_client::protocol::wl_callback::WlCallback as CWlCallback;
use wayland_protocols::xdg::shell::client::xdg_popup::XdgPopup as CXdgPopup;
use wayland_protocols::xdg::shell::client::xdg_surface::XdgSurface as CXdgSurface;
use wayland_protocols::xdg::shell::client::xdg_toplevel::XdgToplevel as CXdgToplevel;

use crate::output::OutputMetrics;
use crate::transform::{self, ScaleState, SurfaceScale};
use crate::xwm::atoms::Atoms;
use crate::xwm::xshim::XConn;

bitflags::bitflags! {
    /// WM_NORMAL_HINTS flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SizeFlags: u32 {
        const US_POSITION = 1 << 0;
        const US_SIZE = 1 << 1;
        const P_POSITION = 1 << 2;
        const P_SIZE = 1 << 3;
        const P_MIN_SIZE = 1 << 4;
        const P_MAX_SIZE = 1 << 5;
        const P_RESIZE_INC = 1 << 6;
        const P_ASPECT = 1 << 7;
        const P_BASE_SIZE = 1 << 8;
        const P_WIN_GRAVITY = 1 << 9;
    }
}

/// `_NET_WM_STATE` client message actions.
pub const NET_WM_STATE_REMOVE: u32 = 0;
/// See [`NET_WM_STATE_REMOVE`].
pub const NET_WM_STATE_ADD: u32 = 1;
/// See [`NET_WM_STATE_REMOVE`].
pub const NET_WM_STATE_TOGGLE: u32 = 2;

/// ICCCM WM_STATE values.
pub const WM_STATE_WITHDRAWN: u32 = 0;
/// See [`WM_STATE_WITHDRAWN`].
pub const WM_STATE_NORMAL: u32 = 1;
/// See [`WM_STATE_WITHDRAWN`].
pub const WM_STATE_ICONIC: u32 = 3;

/// One configure slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowConfig {
    /// xdg_surface.configure serial; zero means the slot is empty.
    pub serial: u32,
    /// New X position, root-relative virtual coordinates.
    pub x: Option<i32>,
    /// New Y position.
    pub y: Option<i32>,
    /// New width in virtual pixels.
    pub width: Option<u32>,
    /// New height in virtual pixels.
    pub height: Option<u32>,
    /// New border width.
    pub border_width: Option<u32>,
    /// `_NET_WM_STATE` atoms to set.
    pub states: Vec<u32>,
}

impl WindowConfig {
    /// Whether any geometry field is set.
    pub fn has_geometry(&self) -> bool {
        self.x.is_some()
            || self.y.is_some()
            || self.width.is_some()
            || self.height.is_some()
            || self.border_width.is_some()
    }

    fn clear(&mut self) {
        *self = WindowConfig::default();
    }
}

/// Observable state of the configure flow, for assertions and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureFlow {
    /// Nothing outstanding.
    Idle,
    /// A config was applied; waiting for matching contents to ack.
    AwaitingAck,
    /// A configure event barrier is active; incoming configures coalesce.
    AwaitingBarrier,
}

/// Emulated screen rectangle set by Xwayland.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulatedRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Host-facing side effects computed by a toplevel configure, applied by
/// the caller that owns the wayland proxies.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigureActions {
    /// Call zaura_surface.set_aspect_ratio with these values.
    pub aspect_ratio: Option<(i32, i32)>,
    /// Call xdg_toplevel.set_min_size.
    pub set_min_size: Option<(i32, i32)>,
    /// Call xdg_toplevel.set_max_size.
    pub set_max_size: Option<(i32, i32)>,
    /// Force a normal frame on the aura surface.
    pub set_frame_normal: bool,
    /// The activated state changed to this value.
    pub activated: Option<bool>,
}

/// An X11 toplevel (or override-redirect) window and its host pairing.
#[derive(Debug)]
pub struct Window {
    /// X11 window id.
    pub id: XWindow,
    /// Frame window created for reparenting, if any.
    pub frame_id: XWindow,
    /// Guest wl_surface protocol id from the surface-id client message.
    pub host_surface_id: u32,
    /// Root-relative position in virtual coordinates.
    pub x: i32,
    /// See [`Window::x`].
    pub y: i32,
    /// Size in virtual pixels.
    pub width: u32,
    /// See [`Window::width`].
    pub height: u32,
    /// Border width requested by the client.
    pub border_width: u32,
    /// Window depth.
    pub depth: u8,
    /// A MapRequest has been seen and the window is managed.
    pub managed: bool,
    /// The window has a mapped host toplevel.
    pub realized: bool,
    /// Host reports the window as activated.
    pub activated: bool,
    /// The X11 client asked for fullscreen.
    pub fullscreen: bool,
    /// The host put the window into fullscreen.
    pub compositor_fullscreen: bool,
    /// The X11 client asked for maximized.
    pub maximized: bool,
    /// Window is iconified; host state changes are deferred.
    pub iconified: bool,
    /// Fullscreen change arrived while iconified.
    pub pending_fullscreen_change: bool,
    /// Maximize change arrived while iconified.
    pub pending_maximized_change: bool,
    /// Host-driven resizes may be forwarded.
    pub allow_resize: bool,
    /// WM_TRANSIENT_FOR target.
    pub transient_for: XWindow,
    /// WM_CLIENT_LEADER window.
    pub client_leader: XWindow,
    /// The window wants decorations.
    pub decorated: bool,
    /// Window title.
    pub name: Option<String>,
    /// `_NET_WM_NAME` takes precedence over WM_NAME.
    pub has_net_wm_name: bool,
    /// WM_CLASS instance class.
    pub clazz: Option<String>,
    /// Startup notification id.
    pub startup_id: Option<String>,
    /// Steam game id property.
    pub steam_game_id: Option<u32>,
    /// Value of the configured application-id property.
    pub app_id_property: Option<String>,
    /// Dark frame requested through _GTK_THEME_VARIANT.
    pub dark_frame: bool,
    /// WM_NORMAL_HINTS flags.
    pub size_flags: SizeFlags,
    /// WM_PROTOCOLS contains WM_TAKE_FOCUS.
    pub focus_model_take_focus: bool,
    /// Minimum size hint.
    pub min_width: u32,
    /// See [`Window::min_width`].
    pub min_height: u32,
    /// Maximum size hint; zero means unbounded.
    pub max_width: u32,
    /// See [`Window::max_width`].
    pub max_height: u32,
    /// `_NET_WM_WINDOW_TYPE` value.
    pub window_type: Option<u32>,
    /// `_NET_WM_PID` value.
    pub pid: u32,
    /// The process behind the window does not look like a launcher or
    /// anti-cheat helper.
    pub should_be_containerized_from_pid: bool,
    /// Emulated rect installed by Xwayland randr emulation.
    pub emulated: Option<EmulatedRect>,
    /// The viewport destination is overridden.
    pub viewport_override: bool,
    /// Pointer scale to apply while the override is active.
    pub viewport_pointer_scale: f64,
    /// Overridden viewport destination.
    pub viewport_width: i32,
    /// See [`Window::viewport_width`].
    pub viewport_height: i32,
    /// Destination last realised by a commit.
    pub viewport_width_realized: i32,
    /// See [`Window::viewport_width_realized`].
    pub viewport_height_realized: i32,
    /// Promote borderless windows to fullscreen on the next commit check.
    pub maybe_promote_to_fullscreen: bool,
    /// Most recent host configure, waiting for its serial.
    pub next_config: WindowConfig,
    /// Config applied to X11, waiting for matching contents.
    pub pending_config: WindowConfig,
    /// Newest config received while the barrier was active.
    pub coalesced_next_config: WindowConfig,
    /// A configure event barrier is outstanding.
    pub barrier_active: bool,
    /// The sync callback acting as configure event barrier.
    pub configure_event_barrier: Option<CWlCallback>,
    /// Newest origin_change received while the barrier was active.
    pub coalesced_origin: Option<(i32, i32)>,
    /// Host xdg surface.
    pub xdg_surface: Option<CXdgSurface>,
    /// Host xdg toplevel.
    pub xdg_toplevel: Option<CXdgToplevel>,
    /// Host xdg popup (override-redirect windows).
    pub xdg_popup: Option<CXdgPopup>,
    /// Host aura surface.
    pub aura_surface: Option<CZauraSurface>,
    /// Host aura toplevel.
    pub aura_toplevel: Option<CZauraToplevel>,
    /// Paired guest surface.
    pub paired_surface: Option<ObjectId>,
}

impl Window {
    /// A window as first seen by CreateNotify.
    pub fn new(id: XWindow, x: i32, y: i32, width: u32, height: u32, border_width: u32) -> Self {
        Window {
            id,
            frame_id: x11rb::NONE,
            host_surface_id: 0,
            x,
            y,
            width,
            height,
            border_width,
            depth: 0,
            managed: false,
            realized: false,
            activated: false,
            fullscreen: false,
            compositor_fullscreen: false,
            maximized: false,
            iconified: false,
            pending_fullscreen_change: false,
            pending_maximized_change: false,
            allow_resize: true,
            transient_for: x11rb::NONE,
            client_leader: x11rb::NONE,
            decorated: false,
            name: None,
            has_net_wm_name: false,
            clazz: None,
            startup_id: None,
            steam_game_id: None,
            app_id_property: None,
            dark_frame: false,
            size_flags: SizeFlags::P_POSITION,
            focus_model_take_focus: false,
            min_width: 0,
            min_height: 0,
            max_width: 0,
            max_height: 0,
            window_type: None,
            pid: 0,
            should_be_containerized_from_pid: true,
            emulated: None,
            viewport_override: false,
            viewport_pointer_scale: 0.0,
            viewport_width: -1,
            viewport_height: -1,
            viewport_width_realized: -1,
            viewport_height_realized: -1,
            maybe_promote_to_fullscreen: true,
            next_config: WindowConfig::default(),
            pending_config: WindowConfig::default(),
            coalesced_next_config: WindowConfig::default(),
            barrier_active: false,
            configure_event_barrier: None,
            coalesced_origin: None,
            xdg_surface: None,
            xdg_toplevel: None,
            xdg_popup: None,
            aura_surface: None,
            aura_toplevel: None,
            paired_surface: None,
        }
    }

    /// Current configure-flow state.
    pub fn flow(&self) -> ConfigureFlow {
        if self.barrier_active {
            ConfigureFlow::AwaitingBarrier
        } else if self.pending_config.serial != 0 {
            ConfigureFlow::AwaitingAck
        } else {
            ConfigureFlow::Idle
        }
    }

    /// The window position, honoring an active emulated rect.
    pub fn get_x_y(&self) -> (i32, i32) {
        match &self.emulated {
            Some(rect) => (rect.x, rect.y),
            None => (self.x, self.y),
        }
    }

    /// The window size, honoring an active emulated rect.
    pub fn get_width_height(&self) -> (u32, u32) {
        match &self.emulated {
            Some(rect) => (rect.width, rect.height),
            None => (self.width, self.height),
        }
    }

    /// The client explicitly positions this window.
    pub fn is_client_positioned(&self, enable_x11_move_windows: bool) -> bool {
        enable_x11_move_windows
            || self
                .size_flags
                .intersects(SizeFlags::US_POSITION | SizeFlags::P_POSITION)
    }

    /// Game-oriented containerised windowing applies to this window.
    pub fn is_containerized(&self, containerize_windows: bool, atoms: &Atoms) -> bool {
        containerize_windows
            && self.steam_game_id.is_some()
            && self.window_type == Some(atoms._NET_WM_WINDOW_TYPE_NORMAL)
            && self.should_be_containerized_from_pid
            && (self.max_width + self.max_height == 0
                || self.max_width + self.max_height >= 400)
    }

    /// Drop the viewport override; the destination resets on the next
    /// commit.
    pub fn reset_viewport(&mut self) {
        self.viewport_width = -1;
        self.viewport_height = -1;
        self.viewport_override = false;
    }

    /// Mark a process name as disqualifying the window from
    /// containerisation.
    pub fn update_containerized_from_process_name(&mut self, process_name: &str) {
        let name = process_name.to_lowercase();
        self.should_be_containerized_from_pid = !(name.contains("launcher")
            || name.contains("easyanticheat")
            || name.contains("battleeye")
            || name.contains("nprotect"));
    }

    /// Record an xdg_surface.configure serial.
    ///
    /// While a barrier is active the configure is coalesced; only the
    /// newest is kept. Returns true when the caller should apply
    /// `next_config` now (no barrier, no outstanding ack).
    pub fn receive_xdg_configure(&mut self, serial: u32) -> bool {
        self.next_config.serial = serial;
        if self.barrier_active {
            self.coalesced_next_config = std::mem::take(&mut self.next_config);
            false
        } else {
            self.pending_config.serial == 0
        }
    }

    /// The barrier's done event fired; returns the serial of the coalesced
    /// configure to re-inject, if one arrived while the barrier was up.
    pub fn configure_barrier_done(&mut self) -> Option<u32> {
        self.barrier_active = false;
        self.configure_event_barrier = None;
        if self.coalesced_next_config.serial != 0 {
            self.next_config = std::mem::take(&mut self.coalesced_next_config);
            Some(self.next_config.serial)
        } else {
            None
        }
    }

    /// Apply `next_config` to the X11 side: reconfigure the frame and the
    /// client window, replace `_NET_WM_STATE` and synthesise a
    /// ConfigureNotify when the position moved. The config moves to the
    /// pending slot until matching contents are committed.
    pub fn configure_window(&mut self, x: &dyn XConn, atoms: &Atoms) {
        debug_assert_eq!(self.pending_config.serial, 0);

        if self.next_config.has_geometry() {
            let mut frame_values = ConfigureWindowAux::new();
            frame_values.x = self.next_config.x;
            frame_values.y = self.next_config.y;
            frame_values.width = self.next_config.width;
            frame_values.height = self.next_config.height;
            frame_values.border_width = self.next_config.border_width;
            x.configure_window(self.frame_id, &frame_values);

            let moved_x = self.next_config.x.unwrap_or(self.x);
            let moved_y = self.next_config.y.unwrap_or(self.y);
            if let Some(width) = self.next_config.width {
                self.width = width;
            }
            if let Some(height) = self.next_config.height {
                self.height = height;
            }
            if let Some(border_width) = self.next_config.border_width {
                self.border_width = border_width;
            }

            // The client window keeps a zero offset from its frame.
            let (width, height) = self.get_width_height();
            x.configure_window(
                self.id,
                &ConfigureWindowAux::new()
                    .x(0)
                    .y(0)
                    .width(width)
                    .height(height)
                    .border_width(self.border_width),
            );

            if moved_x != self.x || moved_y != self.y {
                self.x = moved_x;
                self.y = moved_y;
                self.send_configure_notify(x);
            }
        }

        if self.managed {
            x.change_property32(
                self.id,
                atoms._NET_WM_STATE,
                x11rb::protocol::xproto::AtomEnum::ATOM.into(),
                &self.next_config.states,
            );
        }

        self.pending_config = std::mem::take(&mut self.next_config);
    }

    /// Send a synthetic ConfigureNotify with root-relative coordinates,
    /// per ICCCM.
    pub fn send_configure_notify(&self, x: &dyn XConn) {
        let (wx, wy) = self.get_x_y();
        let (width, height) = self.get_width_height();
        x.send_configure_notify(&ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: self.id,
            window: self.id,
            above_sibling: x11rb::NONE,
            x: wx as i16,
            y: wy as i16,
            width: width as u16,
            height: height as u16,
            border_width: self.border_width as u16,
            override_redirect: false,
        });
    }

    /// Update the ICCCM WM_STATE property.
    pub fn set_wm_state(&self, x: &dyn XConn, atoms: &Atoms, state: u32) {
        x.change_property32(self.id, atoms.WM_STATE, atoms.WM_STATE, &[state, x11rb::NONE]);
    }

    /// Whether the pending config can be acked given freshly committed
    /// contents of the paired surface.
    pub fn pending_config_ackable(
        &self,
        containerized: bool,
        contents_width: u32,
        contents_height: u32,
    ) -> bool {
        if self.pending_config.serial == 0 {
            return false;
        }
        if self.managed {
            if self.viewport_override {
                // Only the viewport size matters for containerised
                // windows; the window size is decoupled from it.
                if containerized
                    && (self.viewport_height != self.viewport_height_realized
                        || self.viewport_width != self.viewport_width_realized)
                {
                    return false;
                }
            } else {
                let width = self.width + self.border_width * 2;
                let height = self.height + self.border_width * 2;
                if width != contents_width || height != contents_height {
                    return false;
                }
            }
        }
        true
    }

    /// Ack bookkeeping once the serial went to the host: clear pending and
    /// report whether a deferred `next_config` should be applied.
    pub fn pending_config_acked(&mut self) -> bool {
        self.pending_config.serial = 0;
        self.next_config.serial != 0
    }

    /// Handle a `_NET_WM_STATE` fullscreen change from the X11 client.
    /// Returns the host call to make, if any.
    pub fn fullscreen_change(&mut self, add: bool) -> Option<FullscreenAction> {
        if add {
            if self.fullscreen {
                return None;
            }
            self.fullscreen = true;
            if self.xdg_toplevel.is_some() && !self.iconified {
                Some(FullscreenAction::Set)
            } else {
                self.pending_fullscreen_change = true;
                None
            }
        } else {
            if !self.fullscreen {
                return None;
            }
            // Ask the host to unfullscreen, then re-promote during commit
            // once all states have settled if the client turns out to be
            // borderless-fullscreen.
            self.maybe_promote_to_fullscreen = true;
            self.fullscreen = false;
            if self.xdg_toplevel.is_some() && !self.iconified {
                Some(FullscreenAction::Unset)
            } else {
                self.pending_fullscreen_change = true;
                None
            }
        }
    }

    /// Handle a `_NET_WM_STATE` maximize change from the X11 client.
    pub fn maximize_change(&mut self, add: bool) -> Option<MaximizeAction> {
        self.maximized = add;
        if self.xdg_toplevel.is_some() && !self.iconified {
            Some(if add { MaximizeAction::Set } else { MaximizeAction::Unset })
        } else {
            self.pending_maximized_change = true;
            None
        }
    }

    /// Clamp the window into the output, used before mapping windows that
    /// did not pick their own position.
    pub fn adjust_size_for_screen(&mut self, output: Option<&OutputMetrics>) {
        let Some(output) = output else { return };
        let max_width = output.virt_rotated_width.max(1) as u32;
        let max_height = output.virt_rotated_height.max(1) as u32;
        if self.width > max_width {
            self.width = max_width;
        }
        if self.height > max_height {
            self.height = max_height;
        }
    }

    /// Center the window on the output.
    pub fn adjust_position_for_screen(&mut self, output: Option<&OutputMetrics>) {
        let Some(output) = output else { return };
        self.x = output.virt_x + (output.virt_rotated_width - self.width as i32) / 2;
        self.y = output.virt_y + (output.virt_rotated_height - self.height as i32) / 2;
    }

    /// Handle a host toplevel configure. `x`/`y` are host logical
    /// coordinates (None for plain xdg toplevels), `host_width`/`height`
    /// host logical size. Fills `next_config` and returns the host-facing
    /// side effects to apply.
    #[allow(clippy::too_many_arguments)]
    pub fn toplevel_configure(
        &mut self,
        scale: &ScaleState,
        surface: Option<&SurfaceScale>,
        output: Option<&OutputMetrics>,
        atoms: &Atoms,
        flags: &ConfigureContext,
        position: Option<(i32, i32)>,
        host_width: i32,
        host_height: i32,
        states: &[u32],
    ) -> ConfigureActions {
        let mut actions = ConfigureActions::default();
        if !self.managed || (flags.ignore_stateless_toplevel_configure && states.is_empty()) {
            return actions;
        }

        let containerized = flags.containerized;
        if containerized {
            // States first, so sizing can depend on the resolved state.
            self.configure_state_containerized(atoms, states, &mut actions);
        }

        if host_width > 0 && host_height > 0 {
            let mut width_in_pixels = host_width;
            let mut height_in_pixels = host_height;
            transform::host_to_guest(
                scale,
                surface,
                &mut width_in_pixels,
                &mut height_in_pixels,
            );

            self.next_config.x = None;
            self.next_config.y = None;
            self.next_config.width = None;
            self.next_config.height = None;
            self.next_config.border_width = None;

            self.configure_position(scale, surface, output, flags, position, width_in_pixels, height_in_pixels);

            if containerized {
                self.configure_size_containerized(
                    scale,
                    surface,
                    output,
                    host_width,
                    host_height,
                    width_in_pixels,
                    height_in_pixels,
                    &mut actions,
                );
            } else {
                self.configure_size(
                    scale,
                    surface,
                    flags,
                    host_width,
                    host_height,
                    width_in_pixels,
                    height_in_pixels,
                );
            }
        }

        if !containerized {
            self.configure_state(atoms, flags, states, &mut actions);
        }
        actions
    }

    #[allow(clippy::too_many_arguments)]
    fn configure_position(
        &mut self,
        scale: &ScaleState,
        surface: Option<&SurfaceScale>,
        output: Option<&OutputMetrics>,
        flags: &ConfigureContext,
        position: Option<(i32, i32)>,
        width_in_pixels: i32,
        height_in_pixels: i32,
    ) {
        if let Some(rect) = &self.emulated {
            // Emulation owns the coordinates the client sees.
            self.next_config.x = Some(rect.x);
            self.next_config.y = Some(rect.y);
        } else if let Some((host_x, host_y)) = position {
            let (mut guest_x, mut guest_y) = (host_x, host_y);
            if let Some(outputs) = flags.outputs {
                transform::host_position_to_guest_position(
                    scale,
                    surface,
                    outputs,
                    &mut guest_x,
                    &mut guest_y,
                );
            }
            self.next_config.x = Some(guest_x);
            self.next_config.y = Some(guest_y);
        } else if !self
            .size_flags
            .intersects(SizeFlags::US_POSITION | SizeFlags::P_POSITION)
        {
            if let Some(output) = output {
                if flags.containerized
                    && self.viewport_override
                    && self.fullscreen
                    && !self.compositor_fullscreen
                {
                    self.next_config.x = Some(output.virt_x);
                    self.next_config.y = Some(output.virt_y);
                } else {
                    self.next_config.x = Some(
                        output.virt_x + (output.virt_rotated_width - width_in_pixels) / 2,
                    );
                    self.next_config.y =
                        Some((output.virt_rotated_height - height_in_pixels) / 2);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn configure_size_containerized(
        &mut self,
        scale: &ScaleState,
        surface: Option<&SurfaceScale>,
        output: Option<&OutputMetrics>,
        host_width: i32,
        host_height: i32,
        width_in_pixels: i32,
        height_in_pixels: i32,
        actions: &mut ConfigureActions,
    ) {
        // A windowed, decorated game that declared the requested size
        // acceptable just gets resized; min and max sizes are strictly
        // client-authoritative.
        let windowed_and_resizable = !self.fullscreen
            && self.decorated
            && (self.max_width >= width_in_pixels as u32 || self.max_width == 0)
            && self.min_width <= width_in_pixels as u32
            && (self.max_height >= height_in_pixels as u32 || self.max_height == 0)
            && self.min_height <= height_in_pixels as u32;

        if windowed_and_resizable && self.emulated.is_none() {
            actions.aspect_ratio = Some((-1, -1));
            self.reset_viewport();
            self.next_config.width = Some(width_in_pixels as u32);
            self.next_config.height = Some(height_in_pixels as u32);
            self.next_config.border_width = Some(0);
            return;
        }

        let (output_width, output_height, output_logical_width, output_logical_height) =
            match output {
                Some(o) => {
                    let (lw, lh) = if o.logical_width > 0 {
                        (o.logical_width, o.logical_height)
                    } else {
                        (o.width, o.height)
                    };
                    (o.virt_rotated_width, o.virt_rotated_height, lw, lh)
                }
                None => (width_in_pixels, height_in_pixels, host_width, host_height),
            };

        // Maximise within the client's declared range, then scale down in
        // the viewport. Screen-size emulation takes priority over hints.
        let mut safe_window_width =
            if self.max_width != 0 { self.max_width as i32 } else { self.min_width as i32 };
        let mut safe_window_height =
            if self.max_height != 0 { self.max_height as i32 } else { self.min_height as i32 };
        if let Some(rect) = &self.emulated {
            safe_window_width = rect.width as i32;
            safe_window_height = rect.height as i32;
        } else if safe_window_width == 0
            || safe_window_height == 0
            || self.max_width as i32 > output_width
            || self.max_height as i32 > output_height
            || self.fullscreen
        {
            safe_window_width = output_width;
            safe_window_height = output_height;
        }

        self.next_config.width = Some(safe_window_width as u32);
        self.next_config.height = Some(safe_window_height as u32);
        self.next_config.border_width = Some(0);

        if self.emulated.is_some() && self.compositor_fullscreen {
            // Fullscreen-in-compositor emulation needs no override; the
            // viewport set up by Xwayland already matches.
            self.reset_viewport();
            return;
        }

        self.viewport_override = true;

        let mut safe_window_width_in_wl = safe_window_width;
        let mut safe_window_height_in_wl = safe_window_height;
        transform::guest_to_host(
            scale,
            surface,
            &mut safe_window_width_in_wl,
            &mut safe_window_height_in_wl,
        );

        // Shrink whichever side got proportionally larger, so the window
        // never exceeds the bounds the host granted.
        let width_ratio = safe_window_width as f32 / width_in_pixels as f32;
        let height_ratio = safe_window_height as f32 / height_in_pixels as f32;
        if (width_ratio - height_ratio).abs() < 0.005 {
            self.viewport_width = host_width;
            self.viewport_height = host_height;
        } else if width_ratio < height_ratio {
            self.viewport_width =
                ((safe_window_width as f32 * host_height as f32) / safe_window_height as f32) as i32;
            self.viewport_height = host_height;
        } else {
            self.viewport_height =
                ((safe_window_height as f32 * host_width as f32) / safe_window_width as f32) as i32;
            self.viewport_width = host_width;
        }

        actions.aspect_ratio = Some((
            self.viewport_width,
            self.viewport_height + if self.compositor_fullscreen { 0 } else { 32 },
        ));

        self.viewport_pointer_scale = if self.emulated.is_some() {
            // Xwayland scales pointer movement assuming a screen-sized
            // viewport; map from ours to the logical screen width.
            output_logical_width as f64 / self.viewport_width as f64
        } else {
            safe_window_width_in_wl as f64 / self.viewport_width as f64
        };

        if self.xdg_toplevel.is_some() {
            // Override the client's min/max hints relative to the screen
            // so the user can still resize within sane bounds.
            actions.set_max_size = Some((
                (output_logical_width as f64 * 0.8) as i32,
                (output_logical_height as f64 * 0.8) as i32,
            ));
            actions.set_min_size = Some((
                (output_logical_width as f64 * 0.4) as i32,
                (output_logical_height as f64 * 0.4) as i32,
            ));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn configure_size(
        &mut self,
        scale: &ScaleState,
        surface: Option<&SurfaceScale>,
        flags: &ConfigureContext,
        host_width: i32,
        host_height: i32,
        width_in_pixels: i32,
        height_in_pixels: i32,
    ) {
        let exceeds_hints = (self.max_width != 0 && width_in_pixels as u32 > self.max_width)
            || (self.min_width != 0 && (width_in_pixels as u32) < self.min_width)
            || (self.max_height != 0 && height_in_pixels as u32 > self.max_height)
            || (self.min_height != 0 && (height_in_pixels as u32) < self.min_height);

        if flags.viewport_resize && exceeds_hints {
            // The host wants a size the client refuses; keep the client
            // size and scale the result in a viewport instead.
            self.viewport_override = true;
            let width_ratio = self.width as f32 / width_in_pixels as f32;
            let height_ratio = self.height as f32 / height_in_pixels as f32;
            if (width_ratio - height_ratio).abs() < 0.01 {
                self.viewport_width = host_width;
                self.viewport_height = host_height;
            } else if width_ratio < height_ratio {
                self.viewport_width =
                    ((self.width as f32 * host_height as f32) / self.height as f32) as i32;
                self.viewport_height = host_height;
            } else {
                self.viewport_height =
                    ((self.height as f32 * host_width as f32) / self.width as f32) as i32;
                self.viewport_width = host_width;
            }

            let mut window_width = self.width as i32;
            let mut window_height = self.height as i32;
            transform::guest_to_host(scale, surface, &mut window_width, &mut window_height);
            self.viewport_pointer_scale = window_width as f64 / self.viewport_width as f64;
        } else if self.viewport_override {
            self.reset_viewport();
        }

        if self.viewport_override {
            self.next_config.width = Some(self.width);
            self.next_config.height = Some(self.height);
        } else if let Some(rect) = &self.emulated {
            self.next_config.width = Some(rect.width);
            self.next_config.height = Some(rect.height);
        } else {
            self.next_config.width = Some(width_in_pixels as u32);
            self.next_config.height = Some(height_in_pixels as u32);
        }
        self.next_config.border_width = Some(0);
    }

    fn configure_state(
        &mut self,
        atoms: &Atoms,
        flags: &ConfigureContext,
        states: &[u32],
        actions: &mut ConfigureActions,
    ) {
        // No states means windowed, unfocused and freely resizable.
        let mut activated = false;
        self.allow_resize = true;
        self.compositor_fullscreen = false;
        self.next_config.states.clear();

        if flags.only_client_can_exit_fullscreen && self.fullscreen {
            // Many games only handle fullscreen toggles through their own
            // UI; never let the host revert the state behind their back.
            self.next_config.states.push(atoms._NET_WM_STATE_FULLSCREEN);
            self.allow_resize = false;
        }

        for &state in states {
            if state == XDG_TOPLEVEL_STATE_FULLSCREEN {
                if self.next_config.states.is_empty() {
                    self.next_config.states.push(atoms._NET_WM_STATE_FULLSCREEN);
                }
                self.allow_resize = false;
                self.compositor_fullscreen = true;
            }
            if state == XDG_TOPLEVEL_STATE_MAXIMIZED {
                self.allow_resize = false;
                self.next_config.states.push(atoms._NET_WM_STATE_MAXIMIZED_VERT);
                self.next_config.states.push(atoms._NET_WM_STATE_MAXIMIZED_HORZ);
            }
            if state == XDG_TOPLEVEL_STATE_ACTIVATED {
                activated = true;
                self.next_config.states.push(atoms._NET_WM_STATE_FOCUSED);
            }
            if state == XDG_TOPLEVEL_STATE_RESIZING {
                self.allow_resize = false;
            }
        }

        if activated != self.activated {
            self.activated = activated;
            actions.activated = Some(activated);
        }
    }

    fn configure_state_containerized(
        &mut self,
        atoms: &Atoms,
        states: &[u32],
        actions: &mut ConfigureActions,
    ) {
        let mut activated = false;
        self.allow_resize = true;
        self.compositor_fullscreen = false;
        self.next_config.states.clear();

        // Fullscreen and maximize are client-authoritative for games; the
        // host's opinion is recorded but never overrides them.
        if self.fullscreen {
            self.allow_resize = false;
            self.next_config.states.push(atoms._NET_WM_STATE_FULLSCREEN);
        }
        if self.maximized {
            self.allow_resize = false;
            self.next_config.states.push(atoms._NET_WM_STATE_MAXIMIZED_VERT);
            self.next_config.states.push(atoms._NET_WM_STATE_MAXIMIZED_HORZ);
        }

        for &state in states {
            if state == XDG_TOPLEVEL_STATE_FULLSCREEN {
                self.compositor_fullscreen = true;
            }
            if state == XDG_TOPLEVEL_STATE_ACTIVATED {
                activated = true;
                self.next_config.states.push(atoms._NET_WM_STATE_FOCUSED);
            }
            if state == XDG_TOPLEVEL_STATE_RESIZING {
                self.allow_resize = false;
            }
        }

        if activated != self.activated {
            self.activated = activated;
            actions.activated = Some(activated);
        }

        if !self.compositor_fullscreen {
            // Ignore the client's decoration settings; a windowed game
            // surface always gets a frame from the host.
            actions.set_frame_normal = true;
        }
    }

    /// Send a synthetic WM_DELETE_WINDOW client message, used when the
    /// host closes the toplevel.
    pub fn send_close(&self, x: &dyn XConn, atoms: &Atoms) {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: self.id,
            type_: atoms.WM_PROTOCOLS,
            data: ClientMessageData::from([
                atoms.WM_DELETE_WINDOW,
                x11rb::CURRENT_TIME,
                0,
                0,
                0,
            ]),
        };
        x.send_client_message(self.id, &event, EventMask::NO_EVENT);
    }
}

/// Raw values of xdg_toplevel.state.
pub const XDG_TOPLEVEL_STATE_MAXIMIZED: u32 = 1;
/// See [`XDG_TOPLEVEL_STATE_MAXIMIZED`].
pub const XDG_TOPLEVEL_STATE_FULLSCREEN: u32 = 2;
/// See [`XDG_TOPLEVEL_STATE_MAXIMIZED`].
pub const XDG_TOPLEVEL_STATE_RESIZING: u32 = 3;
/// See [`XDG_TOPLEVEL_STATE_MAXIMIZED`].
pub const XDG_TOPLEVEL_STATE_ACTIVATED: u32 = 4;

/// Host call to make after a fullscreen client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenAction {
    /// xdg_toplevel.set_fullscreen
    Set,
    /// xdg_toplevel.unset_fullscreen
    Unset,
}

/// Host call to make after a maximize client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaximizeAction {
    /// xdg_toplevel.set_maximized
    Set,
    /// xdg_toplevel.unset_maximized
    Unset,
}

/// Context flags a toplevel configure depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigureContext<'a> {
    /// The window is containerised right now.
    pub containerized: bool,
    /// `--ignore-stateless-toplevel-configure`.
    pub ignore_stateless_toplevel_configure: bool,
    /// `--viewport-resize`.
    pub viewport_resize: bool,
    /// `--only-client-can-exit-fullscreen`.
    pub only_client_can_exit_fullscreen: bool,
    /// Output metrics in host-X order, for position translation.
    pub outputs: Option<&'a [&'a OutputMetrics]>,
}

/// Pick the emulated rect matching the output the window is on. Rects come
/// in (x, y, width, height) quadruples of virtual coordinates.
pub fn select_emulated_rect(rects: &[u32], output: &OutputMetrics) -> Option<EmulatedRect> {
    rects.chunks_exact(4).find_map(|chunk| {
        if chunk[0] as i32 == output.virt_x && chunk[1] as i32 == output.virt_y {
            Some(EmulatedRect {
                x: chunk[0] as i32,
                y: chunk[1] as i32,
                width: chunk[2],
                height: chunk[3],
            })
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xwm::xshim::{FakeXConn, XCall};

    fn atoms() -> Atoms {
        // Distinct placeholder values; the logic only compares them.
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
        let mut window = Window::new(0x200, 0, 0, 1920, 1080, 0);
        window.managed = true;
        window.frame_id = 0x300;
        window.steam_game_id = Some(620);
        window.window_type = Some(atoms()._NET_WM_WINDOW_TYPE_NORMAL);
        window
    }

    fn direct_scale() -> ScaleState {
        let mut scale = ScaleState::new(1.0, true, false);
        // 1920x1080 virtual over a 1536x864 logical screen.
        scale.xdg_scale_x = 1.25;
        scale.xdg_scale_y = 1.25;
        scale
    }

    fn output_1536_864() -> OutputMetrics {
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
    fn containerization_requires_game_markers() {
        let atoms = atoms();
        let mut window = game_window();
        assert!(window.is_containerized(true, &atoms));
        assert!(!window.is_containerized(false, &atoms));

        window.steam_game_id = None;
        assert!(!window.is_containerized(true, &atoms));

        let mut window = game_window();
        window.window_type = Some(999);
        assert!(!window.is_containerized(true, &atoms));

        let mut window = game_window();
        window.update_containerized_from_process_name("GameLauncher.exe");
        assert!(!window.is_containerized(true, &atoms));

        let mut window = game_window();
        window.max_width = 100;
        window.max_height = 100;
        assert!(!window.is_containerized(true, &atoms));
    }

    #[test]
    fn containerized_configure_preserves_aspect_ratio() {
        // The host grants 1536x784 logical while the game insists on
        // 1920x1080: the viewport shrinks the wider side and the pointer
        // scale maps host space back onto it.
        let atoms = atoms();
        let scale = direct_scale();
        let output = output_1536_864();
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

        assert!(window.viewport_override);
        assert_eq!(window.viewport_width, 1393);
        assert_eq!(window.viewport_height, 784);
        assert!((window.viewport_pointer_scale - 1.1026).abs() < 0.001);
        assert_eq!(window.next_config.width, Some(1920));
        assert_eq!(window.next_config.height, Some(1080));
    }

    #[test]
    fn matching_aspect_clears_the_override() {
        let atoms = atoms();
        let scale = direct_scale();
        let output = output_1536_864();
        let mut window = game_window();
        window.decorated = true;
        window.viewport_override = true;
        window.viewport_width = 1393;
        window.viewport_height = 784;

        let flags = ConfigureContext { containerized: true, ..Default::default() };
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
        assert_eq!(window.viewport_width, -1);
        assert_eq!(window.viewport_height, -1);
    }

    #[test]
    fn containerized_fullscreen_survives_host_unfullscreen() {
        // The host sends a configure without the fullscreen state; a
        // containerised client that asked for fullscreen keeps it.
        let atoms = atoms();
        let scale = direct_scale();
        let output = output_1536_864();
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
            864,
            &[XDG_TOPLEVEL_STATE_ACTIVATED],
        );

        assert!(window.fullscreen);
        assert!(!window.compositor_fullscreen);
        assert!(window.next_config.states.contains(&atoms._NET_WM_STATE_FULLSCREEN));
    }

    #[test]
    fn host_fullscreen_is_not_sticky_without_containerization() {
        let atoms = atoms();
        let scale = direct_scale();
        let mut window = game_window();

        let flags = ConfigureContext::default();
        window.toplevel_configure(
            &scale,
            None,
            None,
            &atoms,
            &flags,
            None,
            1536,
            864,
            &[XDG_TOPLEVEL_STATE_FULLSCREEN],
        );
        assert!(window.compositor_fullscreen);
        assert!(window.next_config.states.contains(&atoms._NET_WM_STATE_FULLSCREEN));

        window.toplevel_configure(&scale, None, None, &atoms, &flags, None, 1536, 864, &[]);
        assert!(!window.compositor_fullscreen);
        assert!(!window.next_config.states.contains(&atoms._NET_WM_STATE_FULLSCREEN));
    }

    #[test]
    fn fullscreen_client_message_drives_host_calls() {
        let mut window = game_window();
        // Without a toplevel the change is deferred.
        assert_eq!(window.fullscreen_change(true), None);
        assert!(window.fullscreen && window.pending_fullscreen_change);
    }

    #[test]
    fn barrier_coalesces_configures_and_applies_only_the_newest() {
        let mut window = game_window();
        assert_eq!(window.flow(), ConfigureFlow::Idle);

        window.barrier_active = true;
        assert_eq!(window.flow(), ConfigureFlow::AwaitingBarrier);

        window.next_config.width = Some(640);
        assert!(!window.receive_xdg_configure(11));
        window.next_config.width = Some(800);
        assert!(!window.receive_xdg_configure(12));

        // Only the newest coalesced configure survives the barrier.
        assert_eq!(window.configure_barrier_done(), Some(12));
        assert_eq!(window.next_config.serial, 12);
        assert_eq!(window.next_config.width, Some(800));
        assert_eq!(window.coalesced_next_config, WindowConfig::default());
        assert_eq!(window.flow(), ConfigureFlow::Idle);
    }

    #[test]
    fn barrier_without_coalesced_configure_is_a_no_op() {
        let mut window = game_window();
        window.barrier_active = true;
        assert_eq!(window.configure_barrier_done(), None);
        assert_eq!(window.flow(), ConfigureFlow::Idle);
    }

    #[test]
    fn configure_without_barrier_applies_when_no_ack_outstanding() {
        let mut window = game_window();
        assert!(window.receive_xdg_configure(3));
        window.pending_config.serial = 3;
        assert!(!window.receive_xdg_configure(4));
    }

    #[test]
    fn viewport_ack_gates_on_realized_viewport() {
        let mut window = game_window();
        window.pending_config.serial = 7;
        window.viewport_override = true;
        window.viewport_width = 1393;
        window.viewport_height = 784;
        window.viewport_width_realized = -1;
        window.viewport_height_realized = -1;
        assert!(!window.pending_config_ackable(true, 1920, 1080));

        window.viewport_width_realized = 1393;
        window.viewport_height_realized = 784;
        assert!(window.pending_config_ackable(true, 1920, 1080));
    }

    #[test]
    fn plain_ack_gates_on_contents_size() {
        let mut window = game_window();
        window.pending_config.serial = 9;
        assert!(!window.pending_config_ackable(false, 1280, 720));
        assert!(window.pending_config_ackable(false, 1920, 1080));
    }

    #[test]
    fn configure_window_reconfigures_frame_and_client() {
        let atoms = atoms();
        let x = FakeXConn::default();
        let mut window = game_window();
        window.next_config = WindowConfig {
            serial: 5,
            x: Some(100),
            y: Some(50),
            width: Some(800),
            height: Some(600),
            border_width: Some(0),
            states: vec![atoms._NET_WM_STATE_FOCUSED],
        };

        window.configure_window(&x, &atoms);

        assert_eq!(window.pending_config.serial, 5);
        assert_eq!(window.next_config.serial, 0);
        assert_eq!((window.width, window.height), (800, 600));
        assert_eq!((window.x, window.y), (100, 50));
        assert_eq!(window.flow(), ConfigureFlow::AwaitingAck);

        let calls = x.take_calls();
        assert_eq!(
            calls[0],
            XCall::ConfigureWindow {
                window: window.frame_id,
                x: Some(100),
                y: Some(50),
                width: Some(800),
                height: Some(600),
                border_width: Some(0),
            }
        );
        // Client window stays at zero offset within the frame.
        assert_eq!(
            calls[1],
            XCall::ConfigureWindow {
                window: window.id,
                x: Some(0),
                y: Some(0),
                width: Some(800),
                height: Some(600),
                border_width: Some(0),
            }
        );
        assert!(calls.contains(&XCall::ConfigureNotify {
            window: window.id,
            x: 100,
            y: 50,
            width: 800,
            height: 600,
        }));
        assert!(calls.contains(&XCall::ChangeProperty32 {
            window: window.id,
            property: atoms._NET_WM_STATE,
            data: vec![atoms._NET_WM_STATE_FOCUSED],
        }));
    }

    #[test]
    fn emulated_rect_matches_output_origin() {
        let mut output = output_1536_864();
        output.virt_x = 1920;
        let rects = [0, 0, 1280, 720, 1920, 0, 800, 600];
        let rect = select_emulated_rect(&rects, &output);
        assert_eq!(rect, Some(EmulatedRect { x: 1920, y: 0, width: 800, height: 600 }));
        assert_eq!(select_emulated_rect(&rects[..4], &output), None);
    }

    #[test]
    fn emulated_rect_overrides_reported_geometry() {
        let mut window = game_window();
        window.emulated =
            Some(EmulatedRect { x: 10, y: 20, width: 640, height: 480 });
        assert_eq!(window.get_x_y(), (10, 20));
        assert_eq!(window.get_width_height(), (640, 480));
    }

    #[test]
    fn stateless_configures_can_be_ignored() {
        let atoms = atoms();
        let scale = direct_scale();
        let mut window = game_window();
        let flags = ConfigureContext {
            ignore_stateless_toplevel_configure: true,
            ..Default::default()
        };
        window.toplevel_configure(&scale, None, None, &atoms, &flags, None, 1536, 864, &[]);
        assert_eq!(window.next_config, WindowConfig::default());
    }

    #[test]
    fn only_client_can_exit_fullscreen_pins_the_state() {
        let atoms = atoms();
        let scale = direct_scale();
        let mut window = game_window();
        window.fullscreen = true;
        let flags = ConfigureContext {
            only_client_can_exit_fullscreen: true,
            ..Default::default()
        };
        window.toplevel_configure(&scale, None, None, &atoms, &flags, None, 1536, 864, &[]);
        assert!(window.next_config.states.contains(&atoms._NET_WM_STATE_FULLSCREEN));
        assert!(!window.allow_resize);
    }
}
