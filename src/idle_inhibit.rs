//! zwp_idle_inhibit_manager_v1 adaptor. Pure passthrough; an inhibitor on
//! a guest surface becomes an inhibitor on the paired host surface.

use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_protocols::wp::idle_inhibit::zv1::client::zwp_idle_inhibitor_v1::ZwpIdleInhibitorV1 as CIdleInhibitor;
use wayland_protocols::wp::idle_inhibit::zv1::server::zwp_idle_inhibit_manager_v1::{
    self as s_manager, ZwpIdleInhibitManagerV1 as SIdleInhibitManager,
};
use wayland_protocols::wp::idle_inhibit::zv1::server::zwp_idle_inhibitor_v1::{
    self as s_inhibitor, ZwpIdleInhibitorV1 as SIdleInhibitor,
};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::Context;
use crate::globals::{allowed_for_client, GlobalData};

impl GlobalDispatch<SIdleInhibitManager, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SIdleInhibitManager>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SIdleInhibitManager, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SIdleInhibitManager,
        request: s_manager::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_manager::Request::CreateInhibitor { id, surface } => {
                let Some(manager) = &state.idle_inhibit_manager else {
                    return;
                };
                let Some(host_surface) = surface.data::<CWlSurface>() else {
                    return;
                };
                let host = manager.create_inhibitor(host_surface, &state.qh, ());
                data_init.init(id, host);
            }
            s_manager::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<SIdleInhibitor, CIdleInhibitor> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SIdleInhibitor,
        request: s_inhibitor::Request,
        _host: &CIdleInhibitor,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_inhibitor::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SIdleInhibitor,
        host: &CIdleInhibitor,
    ) {
        host.destroy();
    }
}

wayland_client::delegate_noop!(Context: ignore CIdleInhibitor);
