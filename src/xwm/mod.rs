//! X11 window management.
//!
//! Sommelier owns the WM selection on the X server spawned for its guests
//! (a rootless Xwayland), reparents every managed window into a frame of
//! matching depth, and pairs each X11 toplevel with an xdg/aura toplevel
//! on the host. X11 state changes and host configure events meet in the
//! per-window reconciliation logic of [`window`]; the clipboard bridge
//! lives in [`selection`].

pub mod atoms;
pub mod selection;
pub mod window;
pub mod xshim;

use std::process::Child;

use wayland_client::protocol::wl_callback::{self as c_wl_callback, WlCallback as CWlCallback};
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle};
use wayland_server::backend::ObjectId;
use wayland_server::Resource;
use x11rb::connection::Connection as X11Connection;
use x11rb::protocol::xfixes::{self, ConnectionExt as XfixesConnectionExt};
use x11rb::protocol::xproto::{
    Atom, ChangeWindowAttributesAux, ClientMessageEvent, ColormapAlloc, ConfigureWindowAux,
    ConnectionExt, CreateWindowAux, EventMask, MapNotifyEvent, PropMode, StackMode,
    Window as XWindow, WindowClass, CLIENT_MESSAGE_EVENT, MAP_NOTIFY_EVENT,
};
use x11rb::protocol::Event as X11Event;
use x11rb::rust_connection::RustConnection;

use exo_protocols::aura_shell::v38::client::zaura_surface as c_aura_surface;
use exo_protocols::aura_shell::v38::client::zaura_toplevel::{
    self as c_aura_toplevel, ZauraToplevel as CZauraToplevel,
};
use wayland_protocols::xdg::shell::client::xdg_surface::{
    self as c_xdg_surface, XdgSurface as CXdgSurface,
};
use wayland_protocols::xdg::shell::client::xdg_toplevel::{
    self as c_xdg_toplevel, XdgToplevel as CXdgToplevel,
};

use crate::config::FullscreenMode;
use crate::context::Context;
use crate::transform;
use crate::xwm::atoms::Atoms;
use crate::xwm::window::{
    select_emulated_rect, ConfigureContext, FullscreenAction, MaximizeAction, SizeFlags, Window,
    WindowConfig, NET_WM_STATE_ADD, NET_WM_STATE_REMOVE, NET_WM_STATE_TOGGLE, WM_STATE_ICONIC,
    WM_STATE_NORMAL, WM_STATE_WITHDRAWN,
};
use crate::xwm::xshim::XConn;

/// `_NET_WM_MOVERESIZE` directions.
const NET_WM_MOVERESIZE_SIZE_TOPLEFT: u32 = 0;
const NET_WM_MOVERESIZE_SIZE_TOP: u32 = 1;
const NET_WM_MOVERESIZE_SIZE_TOPRIGHT: u32 = 2;
const NET_WM_MOVERESIZE_SIZE_RIGHT: u32 = 3;
const NET_WM_MOVERESIZE_SIZE_BOTTOMRIGHT: u32 = 4;
const NET_WM_MOVERESIZE_SIZE_BOTTOM: u32 = 5;
const NET_WM_MOVERESIZE_SIZE_BOTTOMLEFT: u32 = 6;
const NET_WM_MOVERESIZE_SIZE_LEFT: u32 = 7;
const NET_WM_MOVERESIZE_MOVE: u32 = 8;

/// Root window geometry and visual information.
#[derive(Debug, Clone)]
pub struct Screen {
    /// Root window.
    pub root: XWindow,
    /// Width of the root in pixels.
    pub width_in_pixels: u16,
    /// Height of the root in pixels.
    pub height_in_pixels: u16,
    /// Depth of the root.
    pub root_depth: u8,
    /// Visual of the root.
    pub root_visual: u32,
    /// Black pixel of the root.
    pub black_pixel: u32,
    /// (depth, visual, colormap) triples usable for frame windows.
    pub visuals: Vec<(u8, u32, u32)>,
}

impl Screen {
    fn visual_and_colormap(&self, depth: u8) -> (u8, u32, u32) {
        self.visuals
            .iter()
            .find(|(d, _, _)| *d == depth)
            .copied()
            .unwrap_or((self.root_depth, self.root_visual, 0))
    }
}

/// The X11 window manager.
pub struct Xwm {
    /// The X11 connection.
    pub conn: RustConnection,
    /// Root screen info.
    pub screen: Screen,
    /// Interned atom table.
    pub atoms: Atoms,
    /// Our own window, owning WM_S0 and the selections.
    pub wm_window: XWindow,
    /// Managed (paired) windows.
    pub windows: Vec<Window>,
    /// Windows that have not yet been paired with a surface.
    pub unpaired_windows: Vec<Window>,
    /// X11 side of the clipboard bridge.
    pub selection: selection::X11Selection,
    /// The Xwayland child process.
    pub xwayland: Option<Child>,
}

impl std::fmt::Debug for Xwm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Xwm")
            .field("wm_window", &self.wm_window)
            .field("windows", &self.windows.len())
            .field("unpaired_windows", &self.unpaired_windows.len())
            .finish_non_exhaustive()
    }
}

impl Xwm {
    /// Connect to the X server, intern atoms, claim the WM selection and
    /// advertise `_NET_SUPPORTED`.
    pub fn connect(display: &str) -> anyhow::Result<Xwm> {
        let (conn, screen_num) = x11rb::rust_connection::RustConnection::connect(Some(display))?;
        let setup_screen = &conn.setup().roots[screen_num];

        let mut visuals = Vec::new();
        for depth in &setup_screen.allowed_depths {
            if let Some(visual) = depth.visuals.first() {
                let colormap = x11rb::connection::Connection::generate_id(&conn)?;
                conn.create_colormap(
                    ColormapAlloc::NONE,
                    colormap,
                    setup_screen.root,
                    visual.visual_id,
                )?;
                visuals.push((depth.depth, visual.visual_id, colormap));
            }
        }

        let screen = Screen {
            root: setup_screen.root,
            width_in_pixels: setup_screen.width_in_pixels,
            height_in_pixels: setup_screen.height_in_pixels,
            root_depth: setup_screen.root_depth,
            root_visual: setup_screen.root_visual,
            black_pixel: setup_screen.black_pixel,
            visuals,
        };

        let atoms = Atoms::new(&conn)?.reply()?;

        conn.change_window_attributes(
            screen.root,
            &ChangeWindowAttributesAux::new().event_mask(
                EventMask::SUBSTRUCTURE_REDIRECT
                    | EventMask::SUBSTRUCTURE_NOTIFY
                    | EventMask::PROPERTY_CHANGE
                    | EventMask::FOCUS_CHANGE,
            ),
        )?;

        let wm_window = x11rb::connection::Connection::generate_id(&conn)?;
        x11rb::protocol::xproto::ConnectionExt::create_window(
            &conn,
            0,
            wm_window,
            screen.root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?;
        conn.set_selection_owner(wm_window, atoms.WM_S0, x11rb::CURRENT_TIME)?;

        x11rb::wrapper::ConnectionExt::change_property32(
            &conn,
            PropMode::REPLACE,
            screen.root,
            atoms._NET_SUPPORTED,
            x11rb::protocol::xproto::AtomEnum::ATOM,
            &atoms.net_supported(),
        )?;
        x11rb::wrapper::ConnectionExt::change_property32(
            &conn,
            PropMode::REPLACE,
            screen.root,
            atoms._NET_SUPPORTING_WM_CHECK,
            x11rb::protocol::xproto::AtomEnum::WINDOW,
            &[wm_window],
        )?;

        // Clipboard ownership changes arrive through xfixes.
        conn.xfixes_query_version(5, 0)?;
        conn.xfixes_select_selection_input(
            wm_window,
            atoms.CLIPBOARD,
            xfixes::SelectionEventMask::SET_SELECTION_OWNER
                | xfixes::SelectionEventMask::SELECTION_WINDOW_DESTROY
                | xfixes::SelectionEventMask::SELECTION_CLIENT_CLOSE,
        )?;

        x11rb::connection::Connection::flush(&conn)?;

        Ok(Xwm {
            conn,
            screen,
            atoms,
            wm_window,
            windows: Vec::new(),
            unpaired_windows: Vec::new(),
            selection: selection::X11Selection::new(wm_window),
            xwayland: None,
        })
    }

    /// Look up a window in either list.
    pub fn find_window(&self, id: XWindow) -> Option<&Window> {
        self.windows
            .iter()
            .chain(self.unpaired_windows.iter())
            .find(|w| w.id == id)
    }

    /// Mutable window lookup.
    pub fn find_window_mut(&mut self, id: XWindow) -> Option<&mut Window> {
        self.windows
            .iter_mut()
            .chain(self.unpaired_windows.iter_mut())
            .find(|w| w.id == id)
    }

    /// The window paired with the guest surface of this protocol id.
    pub fn window_by_surface_protocol_id(&self, protocol_id: u32) -> Option<&Window> {
        self.windows.iter().find(|w| w.host_surface_id == protocol_id)
    }

    fn is_our_window(&self, id: XWindow) -> bool {
        id == self.wm_window
            || self
                .windows
                .iter()
                .chain(self.unpaired_windows.iter())
                .any(|w| w.frame_id == id)
    }
}

/// Barrier-callback user data: the window it guards.
#[derive(Debug, Clone, Copy)]
pub struct BarrierKey(pub XWindow);

// Field-level window lookup, so the borrow of the window lists stays
// disjoint from the connection and atom fields.
macro_rules! window_mut {
    ($xwm:expr, $id:expr) => {
        $xwm.windows
            .iter_mut()
            .chain($xwm.unpaired_windows.iter_mut())
            .find(|w| w.id == $id)
    };
}

/// Drain and handle all pending X11 events. Returns an error when the
/// connection died, which is fatal.
pub fn dispatch_x11_events(ctx: &mut Context) -> anyhow::Result<()> {
    loop {
        let event = {
            let Some(xwm) = ctx.xwm.as_mut() else { return Ok(()) };
            xwm.conn.poll_for_event()?
        };
        let Some(event) = event else { break };
        handle_x11_event(ctx, event);
    }
    apply_input_focus(ctx);
    if let Some(xwm) = ctx.xwm.as_ref() {
        XConn::flush(&xwm.conn);
    }
    ctx.flush();
    Ok(())
}

fn handle_x11_event(ctx: &mut Context, event: X11Event) {
    match event {
        X11Event::CreateNotify(event) => {
            let Some(xwm) = ctx.xwm.as_mut() else { return };
            if xwm.is_our_window(event.window) {
                return;
            }
            let mut window = Window::new(
                event.window,
                event.x as i32,
                event.y as i32,
                event.width as u32,
                event.height as u32,
                event.border_width as u32,
            );
            window.size_flags = SizeFlags::P_POSITION;
            xwm.unpaired_windows.push(window);
        }
        X11Event::DestroyNotify(event) => {
            let Some(xwm) = ctx.xwm.as_mut() else { return };
            let removed = remove_window(xwm, event.window);
            if let Some(window) = removed {
                if ctx.host_focus_window == Some(window.id) {
                    ctx.host_focus_window = None;
                    ctx.needs_set_input_focus = true;
                }
                if let Some(surface_id) = window.paired_surface {
                    if let Some(surface) = ctx.surfaces.get_mut(&surface_id) {
                        surface.window = None;
                    }
                }
            }
        }
        X11Event::ReparentNotify(event) => {
            let Some(xwm) = ctx.xwm.as_mut() else { return };
            if event.parent == xwm.screen.root {
                if xwm.find_window(event.window).is_none() {
                    xwm.unpaired_windows
                        .push(Window::new(event.window, event.x as i32, event.y as i32, 1, 1, 0));
                }
            } else if !xwm.is_our_window(event.parent) {
                remove_window(xwm, event.window);
            }
        }
        X11Event::MapRequest(event) => handle_map_request(ctx, event.window),
        X11Event::MapNotify(_) => {}
        X11Event::UnmapNotify(event) => handle_unmap_notify(ctx, event.window),
        X11Event::ConfigureRequest(event) => handle_configure_request(ctx, event),
        X11Event::ConfigureNotify(event) => {
            let Some(xwm) = ctx.xwm.as_mut() else { return };
            if xwm.is_our_window(event.window) {
                return;
            }
            if let Some(window) = window_mut!(xwm, event.window) {
                if !window.managed {
                    // Override-redirect windows move themselves.
                    window.x = event.x as i32;
                    window.y = event.y as i32;
                    window.width = event.width as u32;
                    window.height = event.height as u32;
                }
            }
        }
        X11Event::ClientMessage(event) => handle_client_message(ctx, event),
        X11Event::FocusIn(event) => handle_focus_in(ctx, event.event),
        X11Event::FocusOut(_) => {}
        X11Event::PropertyNotify(event) => handle_property_notify(ctx, event),
        X11Event::SelectionNotify(event) => selection::handle_selection_notify(ctx, event),
        X11Event::SelectionRequest(event) => selection::handle_selection_request(ctx, event),
        X11Event::XfixesSelectionNotify(event) => {
            selection::handle_xfixes_selection_notify(ctx, event)
        }
        X11Event::Error(err) => {
            log::debug!("x11 error: {:?}", err);
        }
        _ => {}
    }
}

fn remove_window(xwm: &mut Xwm, id: XWindow) -> Option<Window> {
    if let Some(index) = xwm.windows.iter().position(|w| w.id == id) {
        return Some(xwm.windows.remove(index));
    }
    if let Some(index) = xwm.unpaired_windows.iter().position(|w| w.id == id) {
        return Some(xwm.unpaired_windows.remove(index));
    }
    None
}

fn read_property_string(xwm: &Xwm, window: XWindow, property: Atom) -> Option<String> {
    let reply = xwm
        .conn
        .get_property(false, window, property, x11rb::protocol::xproto::AtomEnum::ANY, 0, 2048)
        .ok()?
        .reply()
        .ok()?;
    if reply.type_ == x11rb::NONE {
        return None;
    }
    Some(String::from_utf8_lossy(&reply.value).trim_end_matches('\0').to_owned())
}

fn read_property_u32s(xwm: &Xwm, window: XWindow, property: Atom) -> Option<Vec<u32>> {
    let reply = xwm
        .conn
        .get_property(false, window, property, x11rb::protocol::xproto::AtomEnum::ANY, 0, 2048)
        .ok()?
        .reply()
        .ok()?;
    if reply.type_ == x11rb::NONE {
        return None;
    }
    let values = reply.value32()?.collect();
    Some(values)
}

/// Decode WM_CLASS: two NUL-terminated strings, instance then class.
fn decode_wm_class(value: &str) -> Option<String> {
    value.split('\0').nth(1).map(|s| s.to_owned()).filter(|s| !s.is_empty()).or_else(|| {
        value.split('\0').next().map(|s| s.to_owned()).filter(|s| !s.is_empty())
    })
}

const MWM_HINTS_DECORATIONS: u32 = 1 << 1;
const MWM_DECOR_ALL: u32 = 1 << 0;
const MWM_DECOR_TITLE: u32 = 1 << 3;

fn decorated_from_motif(hints: &[u32]) -> Option<bool> {
    let (flags, decorations) = (hints.first()?, hints.get(2)?);
    if flags & MWM_HINTS_DECORATIONS == 0 {
        return None;
    }
    Some(if decorations & MWM_DECOR_ALL != 0 {
        !decorations & MWM_DECOR_TITLE != 0
    } else {
        decorations & MWM_DECOR_TITLE != 0
    })
}

fn handle_map_request(ctx: &mut Context, id: XWindow) {
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    if xwm.is_our_window(id) || xwm.find_window(id).is_none() {
        return;
    }

    // Re-read every property that affects management decisions; the
    // values may predate our interest in the window.
    let geometry = xwm.conn.get_geometry(id).ok().and_then(|c| c.reply().ok());
    let name = read_property_string(xwm, id, xwm.atoms._NET_WM_NAME)
        .map(|name| (name, true))
        .or_else(|| {
            read_property_string(xwm, id, x11rb::protocol::xproto::AtomEnum::WM_NAME.into())
                .map(|name| (name, false))
        });
    let clazz = read_property_string(xwm, id, x11rb::protocol::xproto::AtomEnum::WM_CLASS.into())
        .and_then(|v| decode_wm_class(&v));
    let transient_for =
        read_property_u32s(xwm, id, x11rb::protocol::xproto::AtomEnum::WM_TRANSIENT_FOR.into())
            .and_then(|v| v.first().copied());
    let normal_hints =
        read_property_u32s(xwm, id, x11rb::protocol::xproto::AtomEnum::WM_NORMAL_HINTS.into());
    let client_leader = read_property_u32s(xwm, id, xwm.atoms.WM_CLIENT_LEADER)
        .and_then(|v| v.first().copied());
    let protocols = read_property_u32s(xwm, id, xwm.atoms.WM_PROTOCOLS);
    let motif_hints = read_property_u32s(xwm, id, xwm.atoms.MOTIF_WM_HINTS);
    let startup_id = read_property_string(xwm, id, xwm.atoms._NET_STARTUP_ID);
    let net_wm_state = read_property_u32s(xwm, id, xwm.atoms._NET_WM_STATE);
    let dark_frame = read_property_string(xwm, id, xwm.atoms._GTK_THEME_VARIANT)
        .map(|v| v == "dark");
    let steam_game = read_property_u32s(xwm, id, xwm.atoms.STEAM_GAME)
        .and_then(|v| v.first().copied());
    let window_type = read_property_u32s(xwm, id, xwm.atoms._NET_WM_WINDOW_TYPE)
        .and_then(|v| v.first().copied());
    let pid = read_property_u32s(xwm, id, xwm.atoms._NET_WM_PID)
        .and_then(|v| v.first().copied());
    let app_id_property = ctx
        .config
        .application_id_x11_property
        .as_deref()
        .and_then(|name| {
            let atom = xwm.conn.intern_atom(false, name.as_bytes()).ok()?.reply().ok()?.atom;
            read_property_u32s(xwm, id, atom)
        })
        .and_then(|v| v.first().map(|v| v.to_string()));

    let atoms = xwm.atoms;
    let Some(window) = window_mut!(xwm, id) else { return };
    window.managed = true;
    if window.frame_id == x11rb::NONE {
        if let Some(geometry) = &geometry {
            window.x = geometry.x as i32;
            window.y = geometry.y as i32;
            window.width = geometry.width as u32;
            window.height = geometry.height as u32;
            window.depth = geometry.depth;
        }
    }

    window.name = None;
    window.has_net_wm_name = false;
    if let Some((name, net)) = name {
        window.name = Some(name);
        window.has_net_wm_name = net;
    }
    window.clazz = clazz;
    window.startup_id = startup_id;
    window.transient_for = transient_for.unwrap_or(x11rb::NONE);
    window.client_leader = client_leader.unwrap_or(x11rb::NONE);
    window.decorated = true;
    window.size_flags = SizeFlags::empty();
    window.dark_frame = dark_frame.unwrap_or(false);
    window.steam_game_id = steam_game;
    window.window_type = window_type;
    window.app_id_property = app_id_property;
    if let Some(pid) = pid {
        window.pid = pid;
        if let Ok(process_name) = std::fs::read_to_string(format!("/proc/{}/comm", pid)) {
            window.update_containerized_from_process_name(process_name.trim());
        }
    }
    if let Some(hints) = &motif_hints {
        if let Some(decorated) = decorated_from_motif(hints) {
            window.decorated = decorated;
        }
    }
    window.focus_model_take_focus = protocols
        .as_deref()
        .is_some_and(|p| p.contains(&atoms.WM_TAKE_FOCUS));

    if let Some(states) = &net_wm_state {
        let maximize_h = states.contains(&atoms._NET_WM_STATE_MAXIMIZED_HORZ);
        let maximize_v = states.contains(&atoms._NET_WM_STATE_MAXIMIZED_VERT);
        // 1D maximizing has no wayland equivalent; only both count.
        window.maximized = maximize_h && maximize_v;
        window.fullscreen = states.contains(&atoms._NET_WM_STATE_FULLSCREEN);
    }

    if let Some(hints) = &normal_hints {
        apply_normal_hints(window, hints);
    }
    // Allow client positioning for transients and explicitly positioned
    // windows.
    if window.transient_for == x11rb::NONE
        && !ctx.config.enable_x11_move_windows
    {
        window.size_flags -= SizeFlags::US_POSITION | SizeFlags::P_POSITION;
    }

    window.border_width = 0;
    let output_metrics = ctx
        .outputs
        .first()
        .map(|o| o.metrics.clone());
    window.adjust_size_for_screen(output_metrics.as_ref());
    if !window.size_flags.intersects(SizeFlags::US_POSITION | SizeFlags::P_POSITION) {
        window.adjust_position_for_screen(output_metrics.as_ref());
    }

    let conn: &dyn XConn = &xwm.conn;
    let (width, height) = window.get_width_height();
    conn.configure_window(
        window.id,
        &ConfigureWindowAux::new().width(width).height(height).border_width(0),
    );
    // Must match the frame extents of the reparenting frame or clients get
    // confused; the host-side frame can differ.
    conn.change_property32(
        window.id,
        atoms._NET_FRAME_EXTENTS,
        x11rb::protocol::xproto::AtomEnum::CARDINAL.into(),
        &[0, 0, 0, 0],
    );

    if window.frame_id == x11rb::NONE {
        let depth = if window.depth != 0 { window.depth } else { xwm.screen.root_depth };
        let (depth, visual, colormap) = xwm.screen.visual_and_colormap(depth);
        window.frame_id = conn.generate_id();
        conn.create_window(
            depth,
            window.frame_id,
            xwm.screen.root,
            window.x as i16,
            window.y as i16,
            window.width as u16,
            window.height as u16,
            visual,
            &CreateWindowAux::new()
                .border_pixel(xwm.screen.black_pixel)
                .event_mask(EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT)
                .colormap(colormap),
        );
        conn.configure_window(
            window.frame_id,
            &ConfigureWindowAux::new().stack_mode(StackMode::BELOW),
        );
        conn.reparent_window(window.id, window.frame_id, 0, 0);
    } else {
        let (x, y) = window.get_x_y();
        conn.configure_window(
            window.frame_id,
            &ConfigureWindowAux::new()
                .x(x)
                .y(y)
                .width(width)
                .height(height)
                .stack_mode(StackMode::BELOW),
        );
    }

    window.set_wm_state(conn, &atoms, WM_STATE_NORMAL);
    window.send_configure_notify(conn);
    conn.map_window(window.id);
    conn.map_window(window.frame_id);
}

fn apply_normal_hints(window: &mut Window, hints: &[u32]) {
    // WM_NORMAL_HINTS layout: flags, pad x4, min w/h, max w/h, inc w/h,
    // min/max aspect, base w/h, gravity.
    let Some(&flags) = hints.first() else { return };
    let flags = SizeFlags::from_bits_truncate(flags);
    window.size_flags |= flags & (SizeFlags::US_POSITION
        | SizeFlags::P_POSITION
        | SizeFlags::P_MIN_SIZE
        | SizeFlags::P_MAX_SIZE);
    if flags.contains(SizeFlags::P_MIN_SIZE) {
        window.min_width = hints.get(5).copied().unwrap_or(0);
        window.min_height = hints.get(6).copied().unwrap_or(0);
    }
    if flags.contains(SizeFlags::P_MAX_SIZE) {
        let max_width = hints.get(7).copied().unwrap_or(0);
        let max_height = hints.get(8).copied().unwrap_or(0);
        window.max_width = if max_width == i32::MAX as u32 { 0 } else { max_width };
        window.max_height = if max_height == i32::MAX as u32 { 0 } else { max_height };
    }
}

fn handle_unmap_notify(ctx: &mut Context, id: XWindow) {
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    if xwm.is_our_window(id) {
        return;
    }
    if ctx.host_focus_window == Some(id) {
        ctx.host_focus_window = None;
        ctx.needs_set_input_focus = true;
    }
    let atoms = xwm.atoms;
    let Some(window) = window_mut!(xwm, id) else { return };
    window.host_surface_id = 0;
    window.set_wm_state(&xwm.conn, &atoms, WM_STATE_WITHDRAWN);

    if window.frame_id != x11rb::NONE {
        let (x, y) = (window.x as i16, window.y as i16);
        let frame = window.frame_id;
        let root = xwm.screen.root;
        let conn: &dyn XConn = &xwm.conn;
        conn.reparent_window(window.id, root, x, y);
        conn.destroy_window(frame);
        window.frame_id = x11rb::NONE;
    }

    // Back to unmanaged, in case the window becomes override-redirect.
    window.managed = false;
    window.decorated = false;
    window.size_flags = SizeFlags::P_POSITION;
    update_window_pairing(ctx, id);
}

fn handle_configure_request(
    ctx: &mut Context,
    event: x11rb::protocol::xproto::ConfigureRequestEvent,
) {
    let enable_x11_move_windows = ctx.config.enable_x11_move_windows;
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    if xwm.is_our_window(event.window) {
        return;
    }
    let Some(window) = window_mut!(xwm, event.window) else { return };
    let mask = event.value_mask;
    use x11rb::protocol::xproto::ConfigWindow;

    if !window.managed {
        let mut aux = ConfigureWindowAux::new();
        if mask.contains(ConfigWindow::X) {
            aux = aux.x(event.x as i32);
        }
        if mask.contains(ConfigWindow::Y) {
            aux = aux.y(event.y as i32);
        }
        if mask.contains(ConfigWindow::WIDTH) {
            aux = aux.width(event.width as u32);
        }
        if mask.contains(ConfigWindow::HEIGHT) {
            aux = aux.height(event.height as u32);
        }
        if mask.contains(ConfigWindow::BORDER_WIDTH) {
            aux = aux.border_width(event.border_width as u32);
        }
        if mask.contains(ConfigWindow::SIBLING) {
            aux = aux.sibling(event.sibling);
        }
        if mask.contains(ConfigWindow::STACK_MODE) {
            aux = aux.stack_mode(event.stack_mode);
        }
        XConn::configure_window(&xwm.conn, window.id, &aux);
        return;
    }

    // Satisfying the request voids the guarantee that matching contents
    // will arrive, so ack everything outstanding up front.
    if window.xdg_toplevel.is_some() {
        if window.pending_config.serial != 0 {
            if let Some(xdg_surface) = &window.xdg_surface {
                xdg_surface.ack_configure(window.pending_config.serial);
            }
            window.pending_config = WindowConfig::default();
        }
        if window.next_config.serial != 0 {
            if let Some(xdg_surface) = &window.xdg_surface {
                xdg_surface.ack_configure(window.next_config.serial);
            }
            window.next_config = WindowConfig::default();
        }
    }

    let old_width = window.width;
    let old_height = window.height;
    if mask.contains(ConfigWindow::X) {
        window.x = event.x as i32;
    }
    if mask.contains(ConfigWindow::Y) {
        window.y = event.y as i32;
    }
    if window.allow_resize {
        if mask.contains(ConfigWindow::WIDTH) {
            window.width = event.width as u32;
        }
        if mask.contains(ConfigWindow::HEIGHT) {
            window.height = event.height as u32;
        }
    }

    let (x, y) = window.get_x_y();
    let (width, height) = window.get_width_height();
    let conn: &dyn XConn = &xwm.conn;
    conn.configure_window(
        window.frame_id,
        &ConfigureWindowAux::new().x(x).y(y).width(width).height(height),
    );
    if old_width != window.width || old_height != window.height || window.border_width != 0 {
        conn.configure_window(
            window.id,
            &ConfigureWindowAux::new().width(width).height(height).border_width(0),
        );
        window.border_width = 0;
    } else {
        window.send_configure_notify(conn);
    }

    // A requested location change is forwarded to the host; position is
    // otherwise host-authoritative so dragging works.
    if mask.intersects(ConfigWindow::X | ConfigWindow::Y) {
        let id = event.window;
        send_window_bounds_to_host(ctx, id, enable_x11_move_windows);
    }
}

/// Forward the window's desired bounds via zaura_toplevel.set_window_bounds
/// and install the configure event barrier.
pub fn send_window_bounds_to_host(ctx: &mut Context, id: XWindow, enable_x11_move_windows: bool) {
    let aura_supported = ctx
        .aura_shell
        .as_ref()
        .is_some_and(|(_, version)| *version >= 17);
    let metrics = ctx.output_metrics().iter().map(|m| (*m).clone()).collect::<Vec<_>>();
    let metric_refs: Vec<&crate::output::OutputMetrics> = metrics.iter().collect();
    let scale = ctx.scale.clone();
    let qh = ctx.qh.clone();
    let sync_callback = ctx.connection.display();

    let surface_view = ctx
        .xwm
        .as_ref()
        .and_then(|x| x.find_window(id))
        .and_then(|w| w.paired_surface.clone())
        .map(|sid| ctx.surface_scale_view(&sid));

    let outputs_hosts: Vec<_> = ctx.outputs.iter().map(|o| o.host.clone()).collect();

    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let Some(window) = window_mut!(xwm, id) else { return };
    if !window.allow_resize
        || !window.is_client_positioned(enable_x11_move_windows)
        || !aura_supported
        || window.aura_toplevel.is_none()
    {
        return;
    }

    let mut x = window.x;
    let mut y = window.y;
    let mut w = window.width as i32;
    let mut h = window.height as i32;
    if window.size_flags.contains(SizeFlags::P_MIN_SIZE) {
        w = w.max(window.min_width as i32);
        h = h.max(window.min_height as i32);
    }
    if window.size_flags.contains(SizeFlags::P_MAX_SIZE) {
        if window.max_width != 0 {
            w = w.min(window.max_width as i32);
        }
        if window.max_height != 0 {
            h = h.min(window.max_height as i32);
        }
    }

    let view = surface_view.unwrap_or_default();
    let output_index = transform::guest_position_to_host_position(
        &scale,
        Some(&view),
        &metric_refs,
        &mut x,
        &mut y,
    );
    let (mut wv, mut hv) = (w, h);
    transform::guest_to_host(&scale, Some(&view), &mut wv, &mut hv);

    let Some(aura_toplevel) = &window.aura_toplevel else { return };
    let host_output = output_index.and_then(|i| outputs_hosts.get(i));
    aura_toplevel.set_window_bounds(x, y, wv, hv, host_output);

    // Any host configure sent before this sync returns reflects a stale
    // position; coalesce until done. A superseded barrier is simply
    // replaced, its done event ignored through the active flag.
    window.configure_event_barrier = None;
    window.barrier_active = true;
    window.configure_event_barrier = Some(sync_callback.sync(&qh, BarrierKey(id)));
}

fn handle_focus_in(ctx: &mut Context, id: XWindow) {
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let transient_parent = xwm
        .find_window(id)
        .filter(|w| w.transient_for != x11rb::NONE)
        .and_then(|w| xwm.find_window(w.transient_for))
        .and_then(|p| p.xdg_toplevel.clone());
    let atoms = xwm.atoms;
    let Some(window) = window_mut!(xwm, id) else { return };

    if let (Some(parent), Some(toplevel)) = (&transient_parent, &window.xdg_toplevel) {
        toplevel.set_parent(Some(parent));
    }
    if let Some(toplevel) = &window.xdg_toplevel {
        if window.pending_fullscreen_change {
            if window.fullscreen {
                toplevel.set_fullscreen(None);
            } else {
                toplevel.unset_fullscreen();
            }
            window.pending_fullscreen_change = false;
        }
        if window.pending_maximized_change {
            if window.maximized {
                toplevel.set_maximized();
            } else {
                toplevel.unset_maximized();
            }
            window.pending_maximized_change = false;
        }
    }
    if window.iconified {
        // Remap the iconified window upon gaining focus.
        let conn: &dyn XConn = &xwm.conn;
        conn.send_map_notify(&MapNotifyEvent {
            response_type: MAP_NOTIFY_EVENT,
            sequence: 0,
            event: window.id,
            window: window.id,
            override_redirect: false,
        });
        window.send_configure_notify(conn);
        window.set_wm_state(conn, &atoms, WM_STATE_NORMAL);
        window.send_configure_notify(conn);
        window.iconified = false;
    }
}

fn handle_client_message(ctx: &mut Context, event: ClientMessageEvent) {
    let serial = ctx.last_seat_serial();
    let host_seat = ctx.seats.first().map(|s| s.host.clone());
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;
    let data = event.data.as_data32();

    if event.type_ == atoms.WL_SURFACE_ID || event.type_ == atoms._NET_WM_SURFACE_ID {
        if let Some(window) = xwm.unpaired_windows.iter_mut().find(|w| w.id == event.window) {
            window.host_surface_id = data[0];
            update_window_pairing(ctx, event.window);
        }
    } else if event.type_ == atoms._NET_ACTIVE_WINDOW {
        if let Some(window) = xwm.find_window(event.window) {
            if let Some(aura_surface) = &window.aura_surface {
                if aura_surface.version() >= 22 {
                    aura_surface.activate();
                }
            }
        }
    } else if event.type_ == atoms._NET_WM_MOVERESIZE {
        let Some(window) = xwm.find_window(event.window) else { return };
        let (Some(toplevel), Some(seat)) = (&window.xdg_toplevel, host_seat) else {
            return;
        };
        if data[2] == NET_WM_MOVERESIZE_MOVE {
            toplevel._move(&seat, serial);
        } else if let Some(edge) = resize_edge(data[2]) {
            toplevel.resize(&seat, serial, edge);
        }
    } else if event.type_ == atoms._NET_WM_STATE {
        let action = data[0];
        let fullscreen_changed = data[1] == atoms._NET_WM_STATE_FULLSCREEN
            || data[2] == atoms._NET_WM_STATE_FULLSCREEN;
        let maximized_changed = (data[1] == atoms._NET_WM_STATE_MAXIMIZED_VERT
            || data[2] == atoms._NET_WM_STATE_MAXIMIZED_VERT)
            && (data[1] == atoms._NET_WM_STATE_MAXIMIZED_HORZ
                || data[2] == atoms._NET_WM_STATE_MAXIMIZED_HORZ);
        let Some(window) = window_mut!(xwm, event.window) else { return };

        if fullscreen_changed {
            let add = match action {
                NET_WM_STATE_ADD => Some(true),
                NET_WM_STATE_REMOVE => Some(false),
                NET_WM_STATE_TOGGLE => Some(!window.fullscreen),
                _ => None,
            };
            if let Some(add) = add {
                match window.fullscreen_change(add) {
                    Some(FullscreenAction::Set) => {
                        if let Some(toplevel) = &window.xdg_toplevel {
                            toplevel.set_fullscreen(None);
                        }
                    }
                    Some(FullscreenAction::Unset) => {
                        if let Some(toplevel) = &window.xdg_toplevel {
                            toplevel.unset_fullscreen();
                        }
                    }
                    None => {}
                }
            }
        }
        if maximized_changed {
            let add = match action {
                NET_WM_STATE_ADD => Some(true),
                NET_WM_STATE_REMOVE => Some(false),
                NET_WM_STATE_TOGGLE => Some(!window.maximized),
                _ => None,
            };
            if let Some(add) = add {
                match window.maximize_change(add) {
                    Some(MaximizeAction::Set) => {
                        if let Some(toplevel) = &window.xdg_toplevel {
                            toplevel.set_maximized();
                        }
                    }
                    Some(MaximizeAction::Unset) => {
                        if let Some(toplevel) = &window.xdg_toplevel {
                            toplevel.unset_maximized();
                        }
                    }
                    None => {}
                }
            }
        }
    } else if event.type_ == atoms.WM_CHANGE_STATE && data[0] == WM_STATE_ICONIC {
        let Some(window) = window_mut!(xwm, event.window) else { return };
        if let Some(toplevel) = &window.xdg_toplevel {
            toplevel.set_minimized();
            window.iconified = true;
        }
    }
}

fn resize_edge(direction: u32) -> Option<c_xdg_toplevel::ResizeEdge> {
    use c_xdg_toplevel::ResizeEdge;
    Some(match direction {
        NET_WM_MOVERESIZE_SIZE_TOPLEFT => ResizeEdge::TopLeft,
        NET_WM_MOVERESIZE_SIZE_TOP => ResizeEdge::Top,
        NET_WM_MOVERESIZE_SIZE_TOPRIGHT => ResizeEdge::TopRight,
        NET_WM_MOVERESIZE_SIZE_RIGHT => ResizeEdge::Right,
        NET_WM_MOVERESIZE_SIZE_BOTTOMRIGHT => ResizeEdge::BottomRight,
        NET_WM_MOVERESIZE_SIZE_BOTTOM => ResizeEdge::Bottom,
        NET_WM_MOVERESIZE_SIZE_BOTTOMLEFT => ResizeEdge::BottomLeft,
        NET_WM_MOVERESIZE_SIZE_LEFT => ResizeEdge::Left,
        _ => return None,
    })
}

fn handle_property_notify(ctx: &mut Context, event: x11rb::protocol::xproto::PropertyNotifyEvent) {
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;
    let deleted = event.state == x11rb::protocol::xproto::Property::DELETE;
    let wm_name_atom: Atom = x11rb::protocol::xproto::AtomEnum::WM_NAME.into();

    if event.atom == wm_name_atom || event.atom == atoms._NET_WM_NAME {
        let is_net_wm_name = event.atom == atoms._NET_WM_NAME;
        let name = if deleted {
            if is_net_wm_name {
                read_property_string(xwm, event.window, wm_name_atom).map(|n| (n, false))
            } else {
                None
            }
        } else {
            read_property_string(xwm, event.window, event.atom).map(|n| (n, is_net_wm_name))
        };
        let Some(window) = window_mut!(xwm, event.window) else { return };
        if !is_net_wm_name && window.has_net_wm_name {
            // _NET_WM_NAME wins over WM_NAME.
            return;
        }
        match name {
            Some((name, net)) => {
                window.name = Some(name);
                window.has_net_wm_name = net;
            }
            None => {
                window.name = None;
                window.has_net_wm_name = false;
            }
        }
        if let Some(toplevel) = &window.xdg_toplevel {
            toplevel.set_title(window.name.clone().unwrap_or_default());
        }
    } else if event.atom == x11rb::protocol::xproto::AtomEnum::WM_CLASS.into() {
        if deleted {
            return;
        }
        let clazz =
            read_property_string(xwm, event.window, x11rb::protocol::xproto::AtomEnum::WM_CLASS.into())
                .and_then(|v| decode_wm_class(&v));
        if let Some(window) = window_mut!(xwm, event.window) {
            window.clazz = clazz;
        }
        update_application_id(ctx, event.window);
    } else if event.atom == atoms.STEAM_GAME {
        let value = read_property_u32s(xwm, event.window, atoms.STEAM_GAME)
            .and_then(|v| v.first().copied());
        if let Some(window) = window_mut!(xwm, event.window) {
            window.steam_game_id = value;
        }
    } else if event.atom == x11rb::protocol::xproto::AtomEnum::WM_NORMAL_HINTS.into() {
        let hints = if deleted {
            None
        } else {
            read_property_u32s(
                xwm,
                event.window,
                x11rb::protocol::xproto::AtomEnum::WM_NORMAL_HINTS.into(),
            )
        };
        let scale = ctx.scale.clone();
        let Some(window) = window_mut!(xwm, event.window) else { return };
        window.size_flags -= SizeFlags::P_MIN_SIZE | SizeFlags::P_MAX_SIZE;
        if let Some(hints) = &hints {
            apply_normal_hints(window, hints);
        }
        if let Some(toplevel) = &window.xdg_toplevel {
            if window.size_flags.contains(SizeFlags::P_MIN_SIZE) {
                let (mut w, mut h) = (window.min_width as i32, window.min_height as i32);
                transform::guest_to_host(&scale, None, &mut w, &mut h);
                toplevel.set_min_size(w, h);
            } else {
                toplevel.set_min_size(0, 0);
            }
            if window.size_flags.contains(SizeFlags::P_MAX_SIZE) {
                let (mut w, mut h) = (window.max_width as i32, window.max_height as i32);
                transform::guest_to_host(&scale, None, &mut w, &mut h);
                toplevel.set_max_size(w, h);
            } else {
                toplevel.set_max_size(0, 0);
            }
        }
    } else if event.atom == atoms.MOTIF_WM_HINTS {
        let hints = if deleted { None } else { read_property_u32s(xwm, event.window, event.atom) };
        if let Some(window) = window_mut!(xwm, event.window) {
            window.decorated = hints
                .as_deref()
                .and_then(decorated_from_motif)
                .unwrap_or(window.managed);
        }
    } else if event.atom == atoms._XWAYLAND_RANDR_EMU_MONITOR_RECTS {
        if !ctx.config.allow_xwayland_emulate_screen_pos_size {
            return;
        }
        let rects = if deleted { None } else { read_property_u32s(xwm, event.window, event.atom) };
        let window_output = xwm
            .find_window(event.window)
            .and_then(|w| w.paired_surface.clone())
            .and_then(|sid| ctx.surfaces.get(&sid))
            .and_then(|s| s.output)
            .and_then(|name| ctx.outputs.iter().find(|o| o.name == name))
            .or(ctx.outputs.first())
            .map(|o| o.metrics.clone());
        if let Some(window) = window_mut!(xwm, event.window) {
            window.emulated = match (&rects, &window_output) {
                (Some(rects), Some(output)) => select_emulated_rect(rects, output),
                _ => None,
            };
        }
    } else if event.atom == atoms.WL_SELECTION || event.atom == xwm.selection.request_property() {
        selection::handle_selection_property_notify(ctx, event);
    } else if let Some(property_name) = ctx.config.application_id_x11_property.clone() {
        let atom = xwm
            .conn
            .intern_atom(false, property_name.as_bytes())
            .ok()
            .and_then(|c| c.reply().ok())
            .map(|r| r.atom);
        if atom == Some(event.atom) && !deleted {
            let value = read_property_u32s(xwm, event.window, event.atom)
                .and_then(|v| v.first().map(|v| v.to_string()));
            if let Some(window) = window_mut!(xwm, event.window) {
                window.app_id_property = value;
            }
            update_application_id(ctx, event.window);
        }
    }
}

/// Pair or unpair a window with its guest surface after the surface-id
/// changed, and (re)build the host-side objects.
pub fn update_window_pairing(ctx: &mut Context, id: XWindow) {
    // Resolve the surface first so list membership matches pairing.
    let protocol_id = ctx
        .xwm
        .as_ref()
        .and_then(|x| x.find_window(id))
        .map(|w| w.host_surface_id)
        .unwrap_or(0);
    let surface_id = if protocol_id != 0 {
        ctx.surface_by_protocol_id(protocol_id).cloned()
    } else {
        None
    };
    let Some(xwm) = ctx.xwm.as_mut() else { return };

    match surface_id {
        Some(surface_id) => {
            if let Some(index) = xwm.unpaired_windows.iter().position(|w| w.id == id) {
                let mut window = xwm.unpaired_windows.remove(index);
                window.paired_surface = Some(surface_id.clone());
                xwm.windows.push(window);
            } else if let Some(window) = xwm.windows.iter_mut().find(|w| w.id == id) {
                window.paired_surface = Some(surface_id.clone());
            }
            if let Some(surface) = ctx.surfaces.get_mut(&surface_id) {
                surface.window = Some(id);
            }
            let (width, height) = match ctx.xwm.as_ref().and_then(|x| x.find_window(id)) {
                Some(w) => (w.width as i32, w.height as i32),
                None => return,
            };
            let view = ctx.surface_scale_view(&surface_id);
            let probe =
                transform::try_window_scale(&ctx.scale, view.output_xdg_scale, width, height);
            if let Some(surface) = ctx.surfaces.get_mut(&surface_id) {
                surface.scale = probe;
            }
            realize_window(ctx, id);
        }
        None => {
            if let Some(index) = xwm.windows.iter().position(|w| w.id == id) {
                let mut window = xwm.windows.remove(index);
                if let Some(surface_id) = window.paired_surface.take() {
                    if let Some(surface) = ctx.surfaces.get_mut(&surface_id) {
                        surface.window = None;
                    }
                }
                destroy_host_objects(&mut window);
                window.realized = false;
                xwm.unpaired_windows.push(window);
            }
        }
    }
}

fn destroy_host_objects(window: &mut Window) {
    if let Some(aura_toplevel) = window.aura_toplevel.take() {
        drop(aura_toplevel);
    }
    if let Some(aura_surface) = window.aura_surface.take() {
        drop(aura_surface);
    }
    if let Some(toplevel) = window.xdg_toplevel.take() {
        toplevel.destroy();
    }
    if let Some(popup) = window.xdg_popup.take() {
        popup.destroy();
    }
    if let Some(xdg_surface) = window.xdg_surface.take() {
        xdg_surface.destroy();
    }
    window.next_config = WindowConfig::default();
    window.pending_config = WindowConfig::default();
    window.coalesced_next_config = WindowConfig::default();
    window.barrier_active = false;
    window.configure_event_barrier = None;
}

/// Create the xdg and aura objects backing a freshly paired window.
pub fn realize_window(ctx: &mut Context, id: XWindow) {
    let qh = ctx.qh.clone();
    let scale = ctx.scale.clone();
    let fullscreen_mode = ctx.config.fullscreen_mode;
    let frame_color = ctx.config.frame_color;
    let dark_frame_color = ctx.config.dark_frame_color;
    let xdg_wm_base = ctx.xdg_wm_base.clone();
    let aura_shell = ctx.aura_shell.clone();
    let application_id = derive_application_id(ctx, id);

    let host_surface = ctx
        .xwm
        .as_ref()
        .and_then(|x| x.find_window(id))
        .and_then(|w| w.paired_surface.clone())
        .and_then(|sid| ctx.surfaces.get(&sid))
        .map(|s| s.host.clone());
    let Some(host_surface) = host_surface else { return };

    let transient_parent_toplevel = ctx.xwm.as_ref().and_then(|x| {
        let window = x.find_window(id)?;
        if window.transient_for == x11rb::NONE {
            return None;
        }
        x.find_window(window.transient_for)?.xdg_toplevel.clone()
    });

    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let Some(window) = xwm.windows.iter_mut().find(|w| w.id == id) else { return };
    let Some((xdg_wm_base, _)) = &xdg_wm_base else { return };

    if let Some(surface) = ctx.surfaces.values_mut().find(|s| {
        wayland_client::Proxy::id(&s.host) == wayland_client::Proxy::id(&host_surface)
    }) {
        surface.has_role = true;
    }

    if window.xdg_surface.is_none() {
        window.xdg_surface = Some(xdg_wm_base.get_xdg_surface(&host_surface, &qh, id));
    }
    if let Some((aura_shell, version)) = &aura_shell {
        if window.aura_surface.is_none() {
            let aura_surface = aura_shell.get_aura_surface(&host_surface, &qh, ());
            aura_surface.set_frame(if window.managed && window.decorated {
                c_aura_surface::FrameType::Normal
            } else if window.managed {
                c_aura_surface::FrameType::Shadow
            } else {
                c_aura_surface::FrameType::None
            });
            if *version >= 3 {
                aura_surface.set_frame_colors(
                    if window.dark_frame { dark_frame_color } else { frame_color },
                    dark_frame_color,
                );
            }
            if *version >= 4 {
                if let Some(startup_id) = &window.startup_id {
                    aura_surface.set_startup_id(Some(startup_id.clone()));
                }
            }
            if *version >= 5 {
                aura_surface.set_application_id(Some(application_id.clone()));
            }
            if *version >= 6 {
                aura_surface.set_fullscreen_mode(match fullscreen_mode {
                    FullscreenMode::Immersive => c_aura_surface::FullscreenMode::Immersive,
                    FullscreenMode::Plain => c_aura_surface::FullscreenMode::Plain,
                });
            }
            window.aura_surface = Some(aura_surface);
        }
    }
    if window.xdg_toplevel.is_none() {
        if let Some(xdg_surface) = &window.xdg_surface {
            let toplevel = xdg_surface.get_toplevel(&qh, id);
            if let Some(name) = &window.name {
                toplevel.set_title(name.clone());
            }
            toplevel.set_app_id(application_id.clone());
            if let Some(parent) = &transient_parent_toplevel {
                toplevel.set_parent(Some(parent));
            }
            if window.size_flags.contains(SizeFlags::P_MIN_SIZE) {
                let (mut w, mut h) = (window.min_width as i32, window.min_height as i32);
                transform::guest_to_host(&scale, None, &mut w, &mut h);
                toplevel.set_min_size(w, h);
            }
            if window.size_flags.contains(SizeFlags::P_MAX_SIZE) {
                let (mut w, mut h) = (window.max_width as i32, window.max_height as i32);
                transform::guest_to_host(&scale, None, &mut w, &mut h);
                toplevel.set_max_size(w, h);
            }
            if window.fullscreen {
                toplevel.set_fullscreen(None);
            }
            if window.maximized {
                toplevel.set_maximized();
            }
            window.xdg_toplevel = Some(toplevel);
        }
    }
    if let Some((aura_shell, version)) = &aura_shell {
        if window.aura_toplevel.is_none() && *version >= 16 {
            let aura_toplevel = aura_shell.get_aura_toplevel(&host_surface, &qh, id);
            aura_toplevel.set_supports_screen_coordinates();
            window.aura_toplevel = Some(aura_toplevel);
        }
    }
    window.realized = true;
}

/// Application-id derivation, most specific source first.
pub fn derive_application_id(ctx: &Context, id: XWindow) -> String {
    if let Some(application_id) = &ctx.config.application_id {
        return application_id.clone();
    }
    let vm = &ctx.config.vm_identifier;
    let prefix = format!("org.chromium.guest_os.{}", vm);
    let Some(window) = ctx.xwm.as_ref().and_then(|x| x.find_window(id)) else {
        return format!("{}.xid.{}", prefix, id);
    };
    if let Some(value) = &window.app_id_property {
        format!("{}.xprop.{}", prefix, value)
    } else if let Some(clazz) = &window.clazz {
        format!("{}.wmclass.{}", prefix, clazz)
    } else if window.client_leader != x11rb::NONE {
        format!("{}.wmclientleader.{}", prefix, window.client_leader)
    } else {
        format!("{}.xid.{}", prefix, window.id)
    }
}

fn update_application_id(ctx: &mut Context, id: XWindow) {
    let application_id = derive_application_id(ctx, id);
    let Some(xwm) = ctx.xwm.as_ref() else { return };
    let Some(window) = xwm.find_window(id) else { return };
    // Skip override-redirect windows so they never show up in the shelf.
    if !window.managed {
        return;
    }
    if let Some(aura_surface) = &window.aura_surface {
        if aura_surface.version() >= 5 {
            aura_surface.set_application_id(Some(application_id));
        }
    }
}

fn apply_input_focus(ctx: &mut Context) {
    if !ctx.needs_set_input_focus {
        return;
    }
    ctx.needs_set_input_focus = false;
    let Some(xwm) = ctx.xwm.as_ref() else { return };
    let focus = ctx.host_focus_window.and_then(|id| xwm.find_window(id));
    match focus {
        Some(window) => {
            let conn: &dyn XConn = &xwm.conn;
            conn.set_input_focus(window.id);
            if window.focus_model_take_focus {
                let event = ClientMessageEvent {
                    response_type: CLIENT_MESSAGE_EVENT,
                    format: 32,
                    sequence: 0,
                    window: window.id,
                    type_: xwm.atoms.WM_PROTOCOLS,
                    data: [xwm.atoms.WM_TAKE_FOCUS, x11rb::CURRENT_TIME, 0, 0, 0].into(),
                };
                conn.send_client_message(window.id, &event, EventMask::NO_EVENT);
            }
        }
        None => {
            let conn: &dyn XConn = &xwm.conn;
            conn.set_input_focus(x11rb::NONE);
        }
    }
}

// Hooks called by the commit pipeline.

/// The paired surface was destroyed; unpair and tear down host objects.
pub fn surface_destroyed(ctx: &mut Context, window_id: XWindow) {
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    if let Some(window) = window_mut!(xwm, window_id) {
        window.host_surface_id = 0;
        window.paired_surface = None;
    }
    update_window_pairing(ctx, window_id);
}

/// The paired surface moved to another output; re-derive its per-surface
/// scale factors against the new output's ratios.
pub fn surface_entered_output(ctx: &mut Context, window_id: XWindow, surface_id: &ObjectId) {
    let (width, height) = match ctx.xwm.as_ref().and_then(|x| x.find_window(window_id)) {
        Some(w) => (w.width as i32, w.height as i32),
        None => return,
    };
    let view = ctx.surface_scale_view(surface_id);
    let probe = transform::try_window_scale(&ctx.scale, view.output_xdg_scale, width, height);
    if let Some(surface) = ctx.surfaces.get_mut(surface_id) {
        surface.scale = probe;
    }
}

/// A commit realised this viewport destination.
pub fn viewport_realized(ctx: &mut Context, window_id: XWindow, width: i32, height: i32) {
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    if let Some(window) = window_mut!(xwm, window_id) {
        window.viewport_width_realized = width;
        window.viewport_height_realized = height;
    }
}

/// Ack the pending configure when the committed contents match it.
pub fn process_surface_commit(ctx: &mut Context, window_id: XWindow, surface_id: ObjectId) {
    let containerize = ctx.config.containerize_windows;
    let contents = ctx
        .surfaces
        .get(&surface_id)
        .map(|s| (s.contents_width as u32, s.contents_height as u32))
        .unwrap_or((0, 0));
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;
    let Some(window) = xwm.windows.iter_mut().find(|w| w.id == window_id) else { return };

    let containerized = window.is_containerized(containerize, &atoms);
    if !window.pending_config_ackable(containerized, contents.0, contents.1) {
        return;
    }
    let serial = window.pending_config.serial;
    if let Some(xdg_surface) = &window.xdg_surface {
        xdg_surface.ack_configure(serial);
    }
    if window.pending_config_acked() {
        window.configure_window(&xwm.conn, &atoms);
    }
}

// Host event dispatch for window-owned objects (user data: X11 window id).

impl ClientDispatch<CXdgSurface, XWindow> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CXdgSurface,
        event: c_xdg_surface::Event,
        data: &XWindow,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_xdg_surface::Event::Configure { serial } = event {
            xdg_surface_configure(state, *data, serial);
        }
    }
}

fn xdg_surface_configure(ctx: &mut Context, id: XWindow, serial: u32) {
    let contents = ctx
        .xwm
        .as_ref()
        .and_then(|x| x.find_window(id))
        .and_then(|w| w.paired_surface.clone())
        .and_then(|sid| ctx.surfaces.get(&sid))
        .map(|s| (s.contents_width as u32, s.contents_height as u32, s.host.clone()));
    let containerize = ctx.config.containerize_windows;
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;
    let Some(window) = window_mut!(xwm, id) else { return };

    if window.receive_xdg_configure(serial) {
        window.configure_window(&xwm.conn, &atoms);
        // Commit immediately when the already-committed contents satisfy
        // the new config.
        let containerized = window.is_containerized(containerize, &atoms);
        if let Some((width, height, host_surface)) = contents {
            if window.pending_config_ackable(containerized, width, height) {
                let serial = window.pending_config.serial;
                if let Some(xdg_surface) = &window.xdg_surface {
                    xdg_surface.ack_configure(serial);
                }
                if window.pending_config_acked() {
                    window.configure_window(&xwm.conn, &atoms);
                }
                host_surface.commit();
            }
        }
    }
}

impl ClientDispatch<CXdgToplevel, XWindow> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CXdgToplevel,
        event: c_xdg_toplevel::Event,
        data: &XWindow,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            c_xdg_toplevel::Event::Configure { width, height, states } => {
                let states: Vec<u32> = states
                    .chunks_exact(4)
                    .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                toplevel_configure(state, *data, None, width, height, &states);
            }
            c_xdg_toplevel::Event::Close => {
                let Some(xwm) = state.xwm.as_ref() else { return };
                if let Some(window) = xwm.find_window(*data) {
                    window.send_close(&xwm.conn, &xwm.atoms);
                }
            }
            _ => {}
        }
    }
}

impl ClientDispatch<CZauraToplevel, XWindow> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CZauraToplevel,
        event: c_aura_toplevel::Event,
        data: &XWindow,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            c_aura_toplevel::Event::Configure { x, y, width, height, states } => {
                let states: Vec<u32> = states
                    .chunks_exact(4)
                    .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                toplevel_configure(state, *data, Some((x, y)), width, height, &states);
            }
            c_aura_toplevel::Event::OriginChange { x, y } => {
                origin_change(state, *data, x, y);
            }
            _ => {}
        }
    }
}

/// Shared handling of xdg and aura toplevel configures.
fn toplevel_configure(
    ctx: &mut Context,
    id: XWindow,
    position: Option<(i32, i32)>,
    host_width: i32,
    host_height: i32,
    states: &[u32],
) {
    let scale = ctx.scale.clone();
    let containerize = ctx.config.containerize_windows;
    let flags_ignore_stateless = ctx.config.ignore_stateless_toplevel_configure;
    let viewport_resize = ctx.config.viewport_resize;
    let only_client = ctx.config.only_client_can_exit_fullscreen;

    // A host-side resize invalidates cached per-surface factors; re-probe
    // against the window's own size before using them.
    let surface_id = ctx
        .xwm
        .as_ref()
        .and_then(|x| x.find_window(id))
        .and_then(|w| w.paired_surface.clone());
    if let Some(surface_id) = &surface_id {
        let (window_width, window_height) = ctx
            .xwm
            .as_ref()
            .and_then(|x| x.find_window(id))
            .map(|w| (w.width as i32, w.height as i32))
            .unwrap_or((0, 0));
        let needs_reprobe = ctx
            .surfaces
            .get(surface_id)
            .map(|s| {
                s.scale.has_own_scale
                    && (host_width != s.scale.cached_logical_width
                        || host_height != s.scale.cached_logical_height)
            })
            .unwrap_or(false);
        if needs_reprobe {
            let view = ctx.surface_scale_view(surface_id);
            let probe = transform::try_window_scale(
                &scale,
                view.output_xdg_scale,
                window_width,
                window_height,
            );
            if let Some(surface) = ctx.surfaces.get_mut(surface_id) {
                surface.scale = probe;
            }
        }
    }

    let view = surface_id.as_ref().map(|sid| ctx.surface_scale_view(sid));
    let metrics: Vec<crate::output::OutputMetrics> =
        ctx.outputs.iter().map(|o| o.metrics.clone()).collect();
    let metric_refs: Vec<&crate::output::OutputMetrics> = metrics.iter().collect();
    let window_output = surface_id
        .as_ref()
        .and_then(|sid| ctx.surfaces.get(sid))
        .and_then(|s| s.output)
        .and_then(|name| ctx.outputs.iter().find(|o| o.name == name))
        .map(|o| o.metrics.clone())
        .or_else(|| metrics.first().cloned());

    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;
    let Some(window) = window_mut!(xwm, id) else { return };

    let containerized = window.is_containerized(containerize, &atoms);
    let flags = ConfigureContext {
        containerized,
        ignore_stateless_toplevel_configure: flags_ignore_stateless,
        viewport_resize,
        only_client_can_exit_fullscreen: only_client,
        outputs: Some(&metric_refs),
    };
    let actions = window.toplevel_configure(
        &scale,
        view.as_ref(),
        window_output.as_ref(),
        &atoms,
        &flags,
        position,
        host_width,
        host_height,
        states,
    );

    if let Some((w, h)) = actions.aspect_ratio {
        if let Some(aura_surface) = &window.aura_surface {
            if aura_surface.version() >= 25 {
                aura_surface.set_aspect_ratio(w, h);
            }
        }
    }
    if actions.set_frame_normal {
        if let Some(aura_surface) = &window.aura_surface {
            aura_surface.set_frame(c_aura_surface::FrameType::Normal);
        }
    }
    if let Some(toplevel) = &window.xdg_toplevel {
        if let Some((w, h)) = actions.set_min_size {
            toplevel.set_min_size(w, h);
        }
        if let Some((w, h)) = actions.set_max_size {
            toplevel.set_max_size(w, h);
        }
    }
    if let Some(activated) = actions.activated {
        let focus = if activated { Some(id) } else { None };
        if ctx.host_focus_window != focus {
            ctx.host_focus_window = focus;
            ctx.needs_set_input_focus = true;
        }
    }
}

/// Apply a host origin change immediately, or coalesce it while a barrier
/// is outstanding.
fn origin_change(ctx: &mut Context, id: XWindow, x: i32, y: i32) {
    let scale = ctx.scale.clone();
    let metrics: Vec<crate::output::OutputMetrics> =
        ctx.outputs.iter().map(|o| o.metrics.clone()).collect();
    let metric_refs: Vec<&crate::output::OutputMetrics> = metrics.iter().collect();
    let view = ctx
        .xwm
        .as_ref()
        .and_then(|x| x.find_window(id))
        .and_then(|w| w.paired_surface.clone())
        .map(|sid| ctx.surface_scale_view(&sid));

    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let Some(window) = window_mut!(xwm, id) else { return };

    if window.barrier_active {
        // Coalesce; the barrier's done applies only the newest origin.
        window.coalesced_origin = Some((x, y));
        return;
    }

    let (mut guest_x, mut guest_y) = (x, y);
    transform::host_position_to_guest_position(
        &scale,
        view.as_ref(),
        &metric_refs,
        &mut guest_x,
        &mut guest_y,
    );
    window.x = guest_x;
    window.y = guest_y;

    let (wx, wy) = window.get_x_y();
    XConn::configure_window(
        &xwm.conn,
        window.frame_id,
        &ConfigureWindowAux::new().x(wx).y(wy),
    );
}

impl ClientDispatch<CWlCallback, BarrierKey> for Context {
    fn event(
        state: &mut Self,
        proxy: &CWlCallback,
        event: c_wl_callback::Event,
        data: &BarrierKey,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_wl_callback::Event::Done { .. } = event {
            let id = data.0;
            let (serial, origin) = {
                let Some(xwm) = state.xwm.as_mut() else { return };
                let Some(window) = window_mut!(xwm, id) else { return };
                // A superseded barrier's done is stale; only the current
                // callback resolves the coalesced state.
                if window.configure_event_barrier.as_ref().map(Proxy::id)
                    != Some(Proxy::id(proxy))
                {
                    return;
                }
                let serial = window.configure_barrier_done();
                let origin = window.coalesced_origin.take();
                (serial, origin)
            };
            if let Some((x, y)) = origin {
                origin_change(state, id, x, y);
            }
            if let Some(serial) = serial {
                xdg_surface_configure(state, id, serial);
            }
        }
    }
}
