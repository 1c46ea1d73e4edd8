//! wl_subcompositor and wl_subsurface adaptors.

use wayland_client::protocol::wl_subsurface::WlSubsurface as CWlSubsurface;
use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_server::protocol::wl_subcompositor::{
    self as s_wl_subcompositor, WlSubcompositor as SWlSubcompositor,
};
use wayland_server::protocol::wl_subsurface::{self as s_wl_subsurface, WlSubsurface as SWlSubsurface};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::Context;
use crate::globals::{allowed_for_client, GlobalData};
use crate::transform;

impl GlobalDispatch<SWlSubcompositor, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SWlSubcompositor>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SWlSubcompositor, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &SWlSubcompositor,
        request: s_wl_subcompositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_subcompositor::Request::GetSubsurface { id, surface, parent } => {
                let Some(host_subcompositor) = &state.subcompositor else {
                    return;
                };
                let (Some(host_surface), Some(host_parent)) =
                    (surface.data::<CWlSurface>(), parent.data::<CWlSurface>())
                else {
                    resource.post_error(
                        s_wl_subcompositor::Error::BadSurface,
                        "surface already destroyed".to_owned(),
                    );
                    return;
                };
                let host = host_subcompositor.get_subsurface(
                    host_surface,
                    host_parent,
                    &state.qh,
                    (),
                );
                data_init.init(id, host);
                if let Some(s) = state.surfaces.get_mut(&surface.id()) {
                    s.has_role = true;
                }
            }
            s_wl_subcompositor::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<SWlSubsurface, CWlSubsurface> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SWlSubsurface,
        request: s_wl_subsurface::Request,
        host: &CWlSubsurface,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_subsurface::Request::SetPosition { x, y } => {
                let (mut x, mut y) = (x, y);
                transform::guest_to_host(&state.scale, None, &mut x, &mut y);
                host.set_position(x, y);
            }
            s_wl_subsurface::Request::PlaceAbove { sibling } => {
                if let Some(host_sibling) = sibling.data::<CWlSurface>() {
                    host.place_above(host_sibling);
                }
            }
            s_wl_subsurface::Request::PlaceBelow { sibling } => {
                if let Some(host_sibling) = sibling.data::<CWlSurface>() {
                    host.place_below(host_sibling);
                }
            }
            s_wl_subsurface::Request::SetSync => host.set_sync(),
            s_wl_subsurface::Request::SetDesync => host.set_desync(),
            s_wl_subsurface::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SWlSubsurface,
        host: &CWlSubsurface,
    ) {
        host.destroy();
    }
}

wayland_client::delegate_noop!(Context: ignore CWlSubsurface);
