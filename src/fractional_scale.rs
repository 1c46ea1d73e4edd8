//! wp_fractional_scale_manager_v1 adaptor. The preferred-scale events of
//! the host pass through to the guest unchanged.

use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_client::{Connection, Dispatch as ClientDispatch, QueueHandle};
use wayland_protocols::wp::fractional_scale::v1::client::wp_fractional_scale_v1::{
    self as c_fractional, WpFractionalScaleV1 as CFractionalScale,
};
use wayland_protocols::wp::fractional_scale::v1::server::wp_fractional_scale_manager_v1::{
    self as s_manager, WpFractionalScaleManagerV1 as SFractionalScaleManager,
};
use wayland_protocols::wp::fractional_scale::v1::server::wp_fractional_scale_v1::{
    self as s_fractional, WpFractionalScaleV1 as SFractionalScale,
};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::{Context, Paired};
use crate::globals::{allowed_for_client, GlobalData};

impl GlobalDispatch<SFractionalScaleManager, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SFractionalScaleManager>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SFractionalScaleManager, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SFractionalScaleManager,
        request: s_manager::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_manager::Request::GetFractionalScale { id, surface } => {
                let Some(manager) = &state.fractional_scale_manager else {
                    return;
                };
                let Some(host_surface) = surface.data::<CWlSurface>() else {
                    return;
                };
                let paired: Paired<SFractionalScale> = Paired::default();
                let host = manager.get_fractional_scale(host_surface, &state.qh, paired.clone());
                let resource = data_init.init(id, host);
                let _ = paired.set(resource);
            }
            s_manager::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<SFractionalScale, CFractionalScale> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SFractionalScale,
        request: s_fractional::Request,
        _host: &CFractionalScale,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_fractional::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SFractionalScale,
        host: &CFractionalScale,
    ) {
        host.destroy();
    }
}

impl ClientDispatch<CFractionalScale, Paired<SFractionalScale>> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &CFractionalScale,
        event: c_fractional::Event,
        data: &Paired<SFractionalScale>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_fractional::Event::PreferredScale { scale } = event {
            if let Some(resource) = data.get() {
                if resource.is_alive() {
                    resource.preferred_scale(scale);
                }
            }
        }
    }
}
