//! xdg_wm_base adaptors for Wayland-native guest clients.
//!
//! X11 windows get their xdg objects from the window manager; this module
//! covers guest clients that speak xdg-shell themselves. Sizes and
//! positions are translated between virtual and logical space on the way
//! through; configure serials pass through untouched so acks stay
//! correlated.

use wayland_client::protocol::wl_seat::WlSeat as CWlSeat;
use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle};
use wayland_protocols::xdg::shell::client::xdg_popup::{self as c_popup, XdgPopup as CXdgPopup};
use wayland_protocols::xdg::shell::client::xdg_positioner::XdgPositioner as CXdgPositioner;
use wayland_protocols::xdg::shell::client::xdg_surface::{
    self as c_xdg_surface, XdgSurface as CXdgSurface,
};
use wayland_protocols::xdg::shell::client::xdg_toplevel::{
    self as c_toplevel, XdgToplevel as CXdgToplevel,
};
use wayland_protocols::xdg::shell::client::xdg_wm_base::{self as c_wm_base, XdgWmBase as CXdgWmBase};
use wayland_protocols::xdg::shell::server::xdg_popup::{self as s_popup, XdgPopup as SXdgPopup};
use wayland_protocols::xdg::shell::server::xdg_positioner::{
    self as s_positioner, XdgPositioner as SXdgPositioner,
};
use wayland_protocols::xdg::shell::server::xdg_surface::{
    self as s_xdg_surface, XdgSurface as SXdgSurface,
};
use wayland_protocols::xdg::shell::server::xdg_toplevel::{
    self as s_toplevel, XdgToplevel as SXdgToplevel,
};
use wayland_protocols::xdg::shell::server::xdg_wm_base::{self as s_wm_base, XdgWmBase as SXdgWmBase};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::{Context, Paired};
use crate::globals::{allowed_for_client, GlobalData};
use crate::transform;

impl GlobalDispatch<SXdgWmBase, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SXdgWmBase>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SXdgWmBase, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &SXdgWmBase,
        request: s_wm_base::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let Some((host_base, _)) = &state.xdg_wm_base else {
            return;
        };
        match request {
            s_wm_base::Request::CreatePositioner { id } => {
                let host = host_base.create_positioner(&state.qh, ());
                data_init.init(id, host);
            }
            s_wm_base::Request::GetXdgSurface { id, surface } => {
                let Some(host_surface) = surface.data::<CWlSurface>() else {
                    resource.post_error(
                        s_wm_base::Error::InvalidSurfaceState,
                        "surface already destroyed".to_owned(),
                    );
                    return;
                };
                let paired: Paired<SXdgSurface> = Paired::default();
                let host = host_base.get_xdg_surface(host_surface, &state.qh, paired.clone());
                let created = data_init.init(id, host);
                let _ = paired.set(created);
                if let Some(s) = state.surfaces.get_mut(&surface.id()) {
                    s.has_role = true;
                }
            }
            s_wm_base::Request::Pong { .. } => {
                // Host pings are answered at the proxy; guest liveness is
                // the server library's concern.
            }
            s_wm_base::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<SXdgPositioner, CXdgPositioner> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &SXdgPositioner,
        request: s_positioner::Request,
        host: &CXdgPositioner,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_positioner::Request::SetSize { width, height } => {
                if width < 1 || height < 1 {
                    resource.post_error(
                        s_positioner::Error::InvalidInput,
                        "width and height must be positive".to_owned(),
                    );
                    return;
                }
                let (mut w, mut h) = (width, height);
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                host.set_size(w.max(1), h.max(1));
            }
            s_positioner::Request::SetAnchorRect { x, y, width, height } => {
                let (mut x, mut y) = (x, y);
                let (mut w, mut h) = (width, height);
                transform::guest_to_host(&state.scale, None, &mut x, &mut y);
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                host.set_anchor_rect(x, y, w, h);
            }
            s_positioner::Request::SetAnchor { anchor } => {
                if let wayland_server::WEnum::Value(anchor) = anchor {
                    if let Ok(anchor) =
                        wayland_protocols::xdg::shell::client::xdg_positioner::Anchor::try_from(
                            anchor as u32,
                        )
                    {
                        host.set_anchor(anchor);
                    }
                }
            }
            s_positioner::Request::SetGravity { gravity } => {
                if let wayland_server::WEnum::Value(gravity) = gravity {
                    if let Ok(gravity) =
                        wayland_protocols::xdg::shell::client::xdg_positioner::Gravity::try_from(
                            gravity as u32,
                        )
                    {
                        host.set_gravity(gravity);
                    }
                }
            }
            s_positioner::Request::SetConstraintAdjustment { constraint_adjustment } => {
                let raw = match constraint_adjustment {
                    wayland_server::WEnum::Value(c) => c.bits(),
                    wayland_server::WEnum::Unknown(v) => v,
                };
                host.set_constraint_adjustment(
                    wayland_protocols::xdg::shell::client::xdg_positioner::ConstraintAdjustment::from_bits_truncate(raw),
                );
            }
            s_positioner::Request::SetOffset { x, y } => {
                let (mut x, mut y) = (x, y);
                transform::guest_to_host(&state.scale, None, &mut x, &mut y);
                host.set_offset(x, y);
            }
            s_positioner::Request::SetReactive => host.set_reactive(),
            s_positioner::Request::SetParentSize { parent_width, parent_height } => {
                let (mut w, mut h) = (parent_width, parent_height);
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                host.set_parent_size(w, h);
            }
            s_positioner::Request::SetParentConfigure { serial } => {
                host.set_parent_configure(serial);
            }
            s_positioner::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SXdgPositioner,
        host: &CXdgPositioner,
    ) {
        host.destroy();
    }
}

impl Dispatch<SXdgSurface, CXdgSurface> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SXdgSurface,
        request: s_xdg_surface::Request,
        host: &CXdgSurface,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_xdg_surface::Request::GetToplevel { id } => {
                let paired: Paired<SXdgToplevel> = Paired::default();
                let host_toplevel = host.get_toplevel(&state.qh, paired.clone());
                let created = data_init.init(id, host_toplevel);
                let _ = paired.set(created);
            }
            s_xdg_surface::Request::GetPopup { id, parent, positioner } => {
                let host_parent = parent.as_ref().and_then(|p| p.data::<CXdgSurface>());
                let Some(host_positioner) = positioner.data::<CXdgPositioner>() else {
                    return;
                };
                let paired: Paired<SXdgPopup> = Paired::default();
                let host_popup =
                    host.get_popup(host_parent, host_positioner, &state.qh, paired.clone());
                let created = data_init.init(id, host_popup);
                let _ = paired.set(created);
            }
            s_xdg_surface::Request::SetWindowGeometry { x, y, width, height } => {
                let (mut x, mut y) = (x, y);
                let (mut w, mut h) = (width, height);
                transform::guest_to_host(&state.scale, None, &mut x, &mut y);
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                host.set_window_geometry(x, y, w.max(1), h.max(1));
            }
            s_xdg_surface::Request::AckConfigure { serial } => host.ack_configure(serial),
            s_xdg_surface::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SXdgSurface,
        host: &CXdgSurface,
    ) {
        host.destroy();
    }
}

impl Dispatch<SXdgToplevel, CXdgToplevel> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SXdgToplevel,
        request: s_toplevel::Request,
        host: &CXdgToplevel,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_toplevel::Request::SetParent { parent } => {
                host.set_parent(parent.as_ref().and_then(|p| p.data::<CXdgToplevel>()));
            }
            s_toplevel::Request::SetTitle { title } => host.set_title(title),
            s_toplevel::Request::SetAppId { app_id } => host.set_app_id(app_id),
            s_toplevel::Request::ShowWindowMenu { seat, serial, x, y } => {
                let Some(host_seat) = crate::seat::host_seat(state, &seat) else {
                    return;
                };
                let (mut x, mut y) = (x, y);
                transform::guest_to_host(&state.scale, None, &mut x, &mut y);
                host.show_window_menu(host_seat, serial, x, y);
            }
            s_toplevel::Request::Move { seat, serial } => {
                if let Some(host_seat) = crate::seat::host_seat(state, &seat) {
                    host._move(host_seat, serial);
                }
            }
            s_toplevel::Request::Resize { seat, serial, edges } => {
                let Some(host_seat) = crate::seat::host_seat(state, &seat) else {
                    return;
                };
                let raw = match edges {
                    wayland_server::WEnum::Value(e) => e as u32,
                    wayland_server::WEnum::Unknown(v) => v,
                };
                if let Ok(edges) = c_toplevel::ResizeEdge::try_from(raw) {
                    host.resize(host_seat, serial, edges);
                }
            }
            s_toplevel::Request::SetMaxSize { width, height } => {
                let (mut w, mut h) = (width, height);
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                host.set_max_size(w, h);
            }
            s_toplevel::Request::SetMinSize { width, height } => {
                let (mut w, mut h) = (width, height);
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                host.set_min_size(w, h);
            }
            s_toplevel::Request::SetMaximized => host.set_maximized(),
            s_toplevel::Request::UnsetMaximized => host.unset_maximized(),
            s_toplevel::Request::SetFullscreen { output } => {
                let host_output = output.as_ref().and_then(|o| {
                    let name = o.data::<u32>()?;
                    state.outputs.iter().find(|out| out.name == *name).map(|out| &out.host)
                });
                host.set_fullscreen(host_output);
            }
            s_toplevel::Request::UnsetFullscreen => host.unset_fullscreen(),
            s_toplevel::Request::SetMinimized => host.set_minimized(),
            s_toplevel::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SXdgToplevel,
        host: &CXdgToplevel,
    ) {
        host.destroy();
    }
}

impl Dispatch<SXdgPopup, CXdgPopup> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SXdgPopup,
        request: s_popup::Request,
        host: &CXdgPopup,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_popup::Request::Grab { seat, serial } => {
                if let Some(host_seat) = crate::seat::host_seat(state, &seat) {
                    host.grab(host_seat, serial);
                }
            }
            s_popup::Request::Reposition { positioner, token } => {
                if let Some(host_positioner) = positioner.data::<CXdgPositioner>() {
                    host.reposition(host_positioner, token);
                }
            }
            s_popup::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SXdgPopup,
        host: &CXdgPopup,
    ) {
        host.destroy();
    }
}

// Host event side.

impl ClientDispatch<CXdgWmBase, ()> for Context {
    fn event(
        _state: &mut Self,
        proxy: &CXdgWmBase,
        event: c_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_wm_base::Event::Ping { serial } = event {
            proxy.pong(serial);
        }
    }
}

impl ClientDispatch<CXdgSurface, Paired<SXdgSurface>> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &CXdgSurface,
        event: c_xdg_surface::Event,
        data: &Paired<SXdgSurface>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_xdg_surface::Event::Configure { serial } = event {
            if let Some(resource) = data.get().filter(|r| r.is_alive()) {
                resource.configure(serial);
            }
        }
    }
}

impl ClientDispatch<CXdgToplevel, Paired<SXdgToplevel>> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CXdgToplevel,
        event: c_toplevel::Event,
        data: &Paired<SXdgToplevel>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_toplevel::Event::Configure { width, height, states } => {
                let (mut w, mut h) = (width, height);
                if w > 0 && h > 0 {
                    transform::host_to_guest(&state.scale, None, &mut w, &mut h);
                }
                resource.configure(w, h, states);
            }
            c_toplevel::Event::Close => resource.close(),
            c_toplevel::Event::ConfigureBounds { width, height } => {
                if resource.version() >= 4 {
                    let (mut w, mut h) = (width, height);
                    if w > 0 && h > 0 {
                        transform::host_to_guest(&state.scale, None, &mut w, &mut h);
                    }
                    resource.configure_bounds(w, h);
                }
            }
            c_toplevel::Event::WmCapabilities { capabilities } => {
                if resource.version() >= 5 {
                    resource.wm_capabilities(capabilities);
                }
            }
            _ => {}
        }
    }
}

impl ClientDispatch<CXdgPopup, Paired<SXdgPopup>> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CXdgPopup,
        event: c_popup::Event,
        data: &Paired<SXdgPopup>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_popup::Event::Configure { x, y, width, height } => {
                let (mut x, mut y) = (x, y);
                let (mut w, mut h) = (width, height);
                transform::host_to_guest(&state.scale, None, &mut x, &mut y);
                transform::host_to_guest(&state.scale, None, &mut w, &mut h);
                resource.configure(x, y, w, h);
            }
            c_popup::Event::PopupDone => resource.popup_done(),
            c_popup::Event::Repositioned { token } => {
                if resource.version() >= 3 {
                    resource.repositioned(token);
                }
            }
            _ => {}
        }
    }
}

wayland_client::delegate_noop!(Context: ignore CXdgPositioner);
