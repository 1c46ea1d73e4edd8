//! zwp_linux_explicit_synchronization_v1 adaptor. Fence fds pass through
//! untouched in both directions.

use std::os::fd::AsFd;

use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_client::{Connection, Dispatch as ClientDispatch, QueueHandle};
use wayland_protocols::wp::linux_explicit_synchronization::zv1::client::zwp_linux_buffer_release_v1::{
    self as c_release, ZwpLinuxBufferReleaseV1 as CBufferRelease,
};
use wayland_protocols::wp::linux_explicit_synchronization::zv1::client::zwp_linux_surface_synchronization_v1::ZwpLinuxSurfaceSynchronizationV1 as CSurfaceSync;
use wayland_protocols::wp::linux_explicit_synchronization::zv1::server::zwp_linux_buffer_release_v1::ZwpLinuxBufferReleaseV1 as SBufferRelease;
use wayland_protocols::wp::linux_explicit_synchronization::zv1::server::zwp_linux_explicit_synchronization_v1::{
    self as s_sync, ZwpLinuxExplicitSynchronizationV1 as SExplicitSync,
};
use wayland_protocols::wp::linux_explicit_synchronization::zv1::server::zwp_linux_surface_synchronization_v1::{
    self as s_surface_sync, ZwpLinuxSurfaceSynchronizationV1 as SSurfaceSync,
};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::{Context, Paired};
use crate::globals::{allowed_for_client, GlobalData};

impl GlobalDispatch<SExplicitSync, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SExplicitSync>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SExplicitSync, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SExplicitSync,
        request: s_sync::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_sync::Request::GetSynchronization { id, surface } => {
                let Some(explicit_sync) = &state.explicit_sync else {
                    return;
                };
                let Some(host_surface) = surface.data::<CWlSurface>() else {
                    return;
                };
                let host = explicit_sync.get_synchronization(host_surface, &state.qh, ());
                data_init.init(id, host);
            }
            s_sync::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<SSurfaceSync, CSurfaceSync> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SSurfaceSync,
        request: s_surface_sync::Request,
        host: &CSurfaceSync,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_surface_sync::Request::SetAcquireFence { fd } => {
                host.set_acquire_fence(fd.as_fd());
            }
            s_surface_sync::Request::GetRelease { release } => {
                let paired: Paired<SBufferRelease> = Paired::default();
                let host_release = host.get_release(&state.qh, paired.clone());
                let created = data_init.init(release, host_release);
                let _ = paired.set(created);
            }
            s_surface_sync::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SSurfaceSync,
        host: &CSurfaceSync,
    ) {
        host.destroy();
    }
}

impl Dispatch<SBufferRelease, CBufferRelease> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SBufferRelease,
        request: wayland_protocols::wp::linux_explicit_synchronization::zv1::server::zwp_linux_buffer_release_v1::Request,
        _host: &CBufferRelease,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            _ => {}
        }
    }
}

impl ClientDispatch<CBufferRelease, Paired<SBufferRelease>> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &CBufferRelease,
        event: c_release::Event,
        data: &Paired<SBufferRelease>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_release::Event::FencedRelease { fence } => resource.fenced_release(fence.as_fd()),
            c_release::Event::ImmediateRelease => resource.immediate_release(),
            _ => {}
        }
    }
}

wayland_client::delegate_noop!(Context: ignore CSurfaceSync);
