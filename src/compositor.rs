//! wl_compositor, wl_surface and wl_region adaptors.
//!
//! Every guest surface owns a paired host surface plus, when the host has
//! wp_viewporter, a viewport used to map the surface's pixel contents into
//! host logical space. Guest requests are forwarded after argument
//! translation; host events (enter/leave, frame callbacks, buffer
//! releases) travel back through the user data of the host proxies, which
//! holds the paired guest resource and is liveness-checked on every
//! dispatch.

use wayland_client::protocol::wl_callback as c_wl_callback;
use wayland_client::protocol::wl_region::WlRegion as CWlRegion;
use wayland_client::protocol::wl_surface::{self as c_wl_surface, WlSurface as CWlSurface};
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle};
use wayland_protocols::wp::viewporter::client::wp_viewport::WpViewport as CWpViewport;
use wayland_server::protocol::wl_callback::WlCallback as SWlCallback;
use wayland_server::protocol::wl_compositor::{self as s_wl_compositor, WlCompositor as SWlCompositor};
use wayland_server::protocol::wl_region::{self as s_wl_region, WlRegion as SWlRegion};
use wayland_server::protocol::wl_surface::{self as s_wl_surface, WlSurface as SWlSurface};
use wayland_server::backend::ObjectId;
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::Context;
use crate::globals::{allowed_for_client, GlobalData};
use crate::shm::BufferData;
use crate::transform::{self, WindowScale};

/// State of one guest `wl_surface`.
#[derive(Debug)]
pub struct Surface {
    /// Guest resource.
    pub resource: SWlSurface,
    /// Paired host surface.
    pub host: CWlSurface,
    /// Host viewport mapping pixels to logical space.
    pub viewport: Option<CWpViewport>,
    /// Pixel size of the last committed contents.
    pub contents_width: i32,
    /// Pixel size of the last committed contents.
    pub contents_height: i32,
    /// Guest buffer scale.
    pub contents_scale: i32,
    /// Size of the currently attached (not yet committed) buffer.
    pub pending_size: Option<(i32, i32)>,
    /// Destination requested through the guest's wp_viewport shim, in
    /// virtual coordinates.
    pub guest_viewport_dest: Option<(i32, i32)>,
    /// The surface has been given a role.
    pub has_role: bool,
    /// Paired X11 window, if any.
    pub window: Option<u32>,
    /// Host output the surface was last seen on, by registry name.
    pub output: Option<u32>,
    /// Per-surface scale override from the window-size probe.
    pub scale: WindowScale,
    /// Serial of the last input event delivered to this surface.
    pub last_event_serial: u32,
}

impl GlobalDispatch<SWlCompositor, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SWlCompositor>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SWlCompositor, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SWlCompositor,
        request: s_wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_compositor::Request::CreateSurface { id } => {
                let Some((host_compositor, _)) = &state.compositor else {
                    return;
                };
                let qh = state.qh.clone();
                // Host events find the guest surface through the context's
                // surface map, keyed by this proxy.
                let host = host_compositor.create_surface(&qh, ());
                let resource = data_init.init(id, host.clone());
                let viewport = state
                    .viewporter
                    .as_ref()
                    .map(|viewporter| viewporter.get_viewport(&host, &qh, ()));
                state.surfaces.insert(
                    resource.id(),
                    Surface {
                        resource,
                        host,
                        viewport,
                        contents_width: 0,
                        contents_height: 0,
                        contents_scale: 1,
                        pending_size: None,
                        guest_viewport_dest: None,
                        has_role: false,
                        window: None,
                        output: None,
                        scale: WindowScale::default(),
                        last_event_serial: 0,
                    },
                );
            }
            s_wl_compositor::Request::CreateRegion { id } => {
                let Some((host_compositor, _)) = &state.compositor else {
                    return;
                };
                let host = host_compositor.create_region(&state.qh, ());
                data_init.init(id, host);
            }
            _ => {}
        }
    }
}

impl Dispatch<SWlRegion, CWlRegion> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SWlRegion,
        request: s_wl_region::Request,
        data: &CWlRegion,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_region::Request::Add { x, y, width, height } => {
                let (mut x, mut y) = (x, y);
                let (mut w, mut h) = (width, height);
                transform::guest_to_host(&state.scale, None, &mut x, &mut y);
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                data.add(x, y, w.max(1), h.max(1));
            }
            s_wl_region::Request::Subtract { x, y, width, height } => {
                let (mut x, mut y) = (x, y);
                let (mut w, mut h) = (width, height);
                transform::guest_to_host(&state.scale, None, &mut x, &mut y);
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                data.subtract(x, y, w.max(1), h.max(1));
            }
            s_wl_region::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SWlRegion,
        data: &CWlRegion,
    ) {
        data.destroy();
    }
}

impl Dispatch<SWlSurface, CWlSurface> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &SWlSurface,
        request: s_wl_surface::Request,
        host: &CWlSurface,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_surface::Request::Attach { buffer, x, y } => {
                let (mut x, mut y) = (x, y);
                transform::guest_to_host(&state.scale, None, &mut x, &mut y);
                match buffer {
                    Some(buffer) => {
                        let data = buffer.data::<BufferData>();
                        if let Some(surface) = state.surfaces.get_mut(&resource.id()) {
                            surface.pending_size = data.map(|d| (d.width, d.height));
                        }
                        host.attach(data.map(|d| &d.host), x, y);
                    }
                    None => {
                        if let Some(surface) = state.surfaces.get_mut(&resource.id()) {
                            surface.pending_size = Some((0, 0));
                        }
                        host.attach(None, x, y);
                    }
                }
            }
            s_wl_surface::Request::Damage { x, y, width, height } => {
                let view = state.surface_scale_view(&resource.id());
                let (mut x1, mut y1) = (x as i64, y as i64);
                let (mut x2, mut y2) = ((x + width) as i64, (y + height) as i64);
                transform::damage_coord(
                    &state.scale,
                    Some(&view),
                    1.0,
                    1.0,
                    &mut x1,
                    &mut y1,
                    &mut x2,
                    &mut y2,
                );
                host.damage(
                    x1 as i32,
                    y1 as i32,
                    (x2 - x1).max(1) as i32,
                    (y2 - y1).max(1) as i32,
                );
            }
            s_wl_surface::Request::DamageBuffer { x, y, width, height } => {
                // Buffer damage stays in pixel coordinates on both sides.
                host.damage_buffer(x, y, width, height);
            }
            s_wl_surface::Request::Frame { callback } => {
                let server_callback: SWlCallback = data_init.init(callback, ());
                host.frame(&state.qh, server_callback);
            }
            s_wl_surface::Request::SetOpaqueRegion { region } => {
                host.set_opaque_region(region.as_ref().and_then(|r| r.data::<CWlRegion>()));
            }
            s_wl_surface::Request::SetInputRegion { region } => {
                host.set_input_region(region.as_ref().and_then(|r| r.data::<CWlRegion>()));
            }
            s_wl_surface::Request::SetBufferTransform { transform } => {
                // Guests never see rotated outputs, so a non-normal buffer
                // transform passes through untouched.
                if let wayland_server::WEnum::Value(value) = transform {
                    let raw: u32 = value.into();
                    if let Ok(host_transform) =
                        wayland_client::protocol::wl_output::Transform::try_from(raw)
                    {
                        host.set_buffer_transform(host_transform);
                    }
                }
            }
            s_wl_surface::Request::SetBufferScale { scale } => {
                // Folded into the viewport destination at commit time; the
                // host always composites the buffer at scale 1.
                if let Some(surface) = state.surfaces.get_mut(&resource.id()) {
                    surface.contents_scale = scale.max(1);
                }
            }
            s_wl_surface::Request::Commit => {
                commit(state, resource.id());
            }
            s_wl_surface::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: wayland_server::backend::ClientId,
        resource: &SWlSurface,
        _host: &CWlSurface,
    ) {
        if let Some(surface) = state.surfaces.remove(&resource.id()) {
            if let Some(window_id) = surface.window {
                crate::xwm::surface_destroyed(state, window_id);
            }
            if let Some(viewport) = surface.viewport {
                viewport.destroy();
            }
            surface.host.destroy();
        }
    }
}

/// Apply a guest commit: ack matching window configures, realise the
/// viewport destination and commit the host surface.
pub fn commit(state: &mut Context, surface_id: ObjectId) {
    let Some(surface) = state.surfaces.get_mut(&surface_id) else {
        return;
    };

    if let Some((width, height)) = surface.pending_size.take() {
        surface.contents_width = width;
        surface.contents_height = height;
    }

    let (contents_width, contents_height, contents_scale) =
        (surface.contents_width, surface.contents_height, surface.contents_scale);
    let window_id = surface.window;
    let guest_dest = surface.guest_viewport_dest;
    let host = surface.host.clone();
    let viewport = surface.viewport.clone();

    // Viewport decision: a viewport override installed by the window
    // manager wins; otherwise map the pixel size to logical units.
    let viewport_override = window_id
        .and_then(|id| state.xwm.as_ref()?.find_window(id))
        .filter(|w| w.viewport_override)
        .map(|w| (w.viewport_width, w.viewport_height));

    if let Some(viewport) = &viewport {
        if contents_width > 0 && contents_height > 0 {
            let view = state.surface_scale_view(&surface_id);
            // Precedence: window-manager override, then the guest's own
            // viewport shim, then the plain pixel size.
            let dest = if viewport_override.is_none() && guest_dest.is_some() {
                let (mut width, mut height) = guest_dest.unwrap_or((1, 1));
                transform::guest_to_host(&state.scale, Some(&view), &mut width, &mut height);
                transform::ViewportDestination { width: width.max(1), height: height.max(1) }
            } else {
                let (mut width, mut height) = (contents_width, contents_height);
                transform::viewport_scale(
                    &state.scale,
                    Some(&view),
                    viewport_override,
                    contents_scale as f64,
                    &mut width,
                    &mut height,
                )
            };
            viewport.set_destination(dest.width, dest.height);
            if let Some(window_id) = window_id {
                crate::xwm::viewport_realized(state, window_id, dest.width, dest.height);
            }
        } else if contents_width == 0 && contents_height == 0 {
            // Detaching contents turns viewport scaling off.
            viewport.set_destination(-1, -1);
        }
    }

    if let Some(window_id) = window_id {
        crate::xwm::process_surface_commit(state, window_id, surface_id);
    }

    host.commit();
}

impl ClientDispatch<CWlSurface, ()> for Context {
    fn event(
        state: &mut Self,
        proxy: &CWlSurface,
        event: c_wl_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        // Re-resolve the paired guest surface through the current map; the
        // guest side may already be gone.
        let Some((surface_id, surface)) = state
            .surfaces
            .iter_mut()
            .find(|(_, s)| s.host.id() == proxy.id())
            .map(|(id, s)| (id.clone(), s))
        else {
            return;
        };
        match event {
            c_wl_surface::Event::Enter { output } => {
                let Some(host_output) = state.outputs.iter().find(|o| o.host.id() == output.id())
                else {
                    return;
                };
                surface.output = Some(host_output.name);
                let client = surface.resource.client();
                if let Some(binding) = host_output.bindings.iter().find(|b| {
                    b.client().map(|c| c.id()) == client.as_ref().map(|c| c.id())
                }) {
                    surface.resource.enter(binding);
                }
                if let Some(window_id) = surface.window {
                    crate::xwm::surface_entered_output(state, window_id, &surface_id);
                }
            }
            c_wl_surface::Event::Leave { output } => {
                let Some(host_output) = state.outputs.iter().find(|o| o.host.id() == output.id())
                else {
                    return;
                };
                if surface.output == Some(host_output.name) {
                    surface.output = None;
                }
                let client = surface.resource.client();
                if let Some(binding) = host_output.bindings.iter().find(|b| {
                    b.client().map(|c| c.id()) == client.as_ref().map(|c| c.id())
                }) {
                    surface.resource.leave(binding);
                }
            }
            _ => {}
        }
    }
}

impl ClientDispatch<c_wl_callback::WlCallback, SWlCallback> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &c_wl_callback::WlCallback,
        event: c_wl_callback::Event,
        data: &SWlCallback,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_wl_callback::Event::Done { callback_data } = event {
            if data.is_alive() {
                data.done(callback_data);
            }
        }
    }
}

impl Dispatch<SWlCallback, ()> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SWlCallback,
        request: wayland_server::protocol::wl_callback::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            _ => {}
        }
    }
}

wayland_client::delegate_noop!(Context: ignore CWlRegion);
wayland_client::delegate_noop!(Context: ignore CWpViewport);
