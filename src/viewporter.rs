//! wp_viewporter adaptor.
//!
//! Sommelier already owns one host viewport per surface for its own
//! scaling, and the viewporter protocol forbids a second one. Guest
//! viewports are therefore shims: the requested destination is recorded on
//! the surface in virtual coordinates and folded into the host viewport at
//! commit time, while source rectangles (buffer coordinates on both sides)
//! pass through directly.

use wayland_protocols::wp::viewporter::server::wp_viewport::{self as s_wp_viewport, WpViewport as SWpViewport};
use wayland_protocols::wp::viewporter::server::wp_viewporter::{
    self as s_wp_viewporter, WpViewporter as SWpViewporter,
};
use wayland_server::backend::ObjectId;
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::Context;
use crate::globals::{allowed_for_client, GlobalData};

impl GlobalDispatch<SWpViewporter, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SWpViewporter>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SWpViewporter, ()> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SWpViewporter,
        request: s_wp_viewporter::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wp_viewporter::Request::GetViewport { id, surface } => {
                data_init.init(id, surface.id());
            }
            s_wp_viewporter::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<SWpViewport, ObjectId> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &SWpViewport,
        request: s_wp_viewport::Request,
        surface_id: &ObjectId,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wp_viewport::Request::SetDestination { width, height } => {
                let Some(surface) = state.surfaces.get_mut(surface_id) else {
                    return;
                };
                if width == -1 && height == -1 {
                    surface.guest_viewport_dest = None;
                } else if width <= 0 || height <= 0 {
                    resource.post_error(
                        s_wp_viewport::Error::BadValue,
                        "destination size must be positive".to_owned(),
                    );
                } else {
                    surface.guest_viewport_dest = Some((width, height));
                }
            }
            s_wp_viewport::Request::SetSource { x, y, width, height } => {
                let Some(surface) = state.surfaces.get(surface_id) else {
                    return;
                };
                if let Some(viewport) = &surface.viewport {
                    viewport.set_source(x, y, width, height);
                }
            }
            s_wp_viewport::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SWpViewport,
        surface_id: &ObjectId,
    ) {
        if let Some(surface) = state.surfaces.get_mut(surface_id) {
            surface.guest_viewport_dest = None;
        }
    }
}
