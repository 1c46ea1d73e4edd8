//! zwp_pointer_constraints_v1 adaptor.

use wayland_client::protocol::wl_region::WlRegion as CWlRegion;
use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_client::{Connection, Dispatch as ClientDispatch, QueueHandle};
use wayland_protocols::wp::pointer_constraints::zv1::client::zwp_confined_pointer_v1::{
    self as c_confined, ZwpConfinedPointerV1 as CConfinedPointer,
};
use wayland_protocols::wp::pointer_constraints::zv1::client::zwp_locked_pointer_v1::{
    self as c_locked, ZwpLockedPointerV1 as CLockedPointer,
};
use wayland_protocols::wp::pointer_constraints::zv1::client::zwp_pointer_constraints_v1::Lifetime as CLifetime;
use wayland_protocols::wp::pointer_constraints::zv1::server::zwp_confined_pointer_v1::{
    self as s_confined, ZwpConfinedPointerV1 as SConfinedPointer,
};
use wayland_protocols::wp::pointer_constraints::zv1::server::zwp_locked_pointer_v1::{
    self as s_locked, ZwpLockedPointerV1 as SLockedPointer,
};
use wayland_protocols::wp::pointer_constraints::zv1::server::zwp_pointer_constraints_v1::{
    self as s_constraints, ZwpPointerConstraintsV1 as SPointerConstraints,
};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::{Context, Paired};
use crate::globals::{allowed_for_client, GlobalData};
use crate::transform;

impl GlobalDispatch<SPointerConstraints, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SPointerConstraints>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

fn host_lifetime(lifetime: wayland_server::WEnum<s_constraints::Lifetime>) -> CLifetime {
    match lifetime {
        wayland_server::WEnum::Value(s_constraints::Lifetime::Persistent) => {
            CLifetime::Persistent
        }
        _ => CLifetime::Oneshot,
    }
}

impl Dispatch<SPointerConstraints, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SPointerConstraints,
        request: s_constraints::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_constraints::Request::LockPointer { id, surface, pointer, region, lifetime } => {
                let Some(constraints) = &state.pointer_constraints else {
                    return;
                };
                let (Some(host_surface), Some(host_pointer)) = (
                    surface.data::<CWlSurface>(),
                    crate::seat::host_pointer(state, &pointer),
                ) else {
                    return;
                };
                let paired: Paired<SLockedPointer> = Paired::default();
                let host = constraints.lock_pointer(
                    host_surface,
                    host_pointer,
                    region.as_ref().and_then(|r| r.data::<CWlRegion>()),
                    host_lifetime(lifetime),
                    &state.qh,
                    paired.clone(),
                );
                let resource = data_init.init(id, host);
                let _ = paired.set(resource);
            }
            s_constraints::Request::ConfinePointer { id, surface, pointer, region, lifetime } => {
                let Some(constraints) = &state.pointer_constraints else {
                    return;
                };
                let (Some(host_surface), Some(host_pointer)) = (
                    surface.data::<CWlSurface>(),
                    crate::seat::host_pointer(state, &pointer),
                ) else {
                    return;
                };
                let paired: Paired<SConfinedPointer> = Paired::default();
                let host = constraints.confine_pointer(
                    host_surface,
                    host_pointer,
                    region.as_ref().and_then(|r| r.data::<CWlRegion>()),
                    host_lifetime(lifetime),
                    &state.qh,
                    paired.clone(),
                );
                let resource = data_init.init(id, host);
                let _ = paired.set(resource);
            }
            s_constraints::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<SLockedPointer, CLockedPointer> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SLockedPointer,
        request: s_locked::Request,
        host: &CLockedPointer,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_locked::Request::SetCursorPositionHint { surface_x, surface_y } => {
                let (mut x, mut y) = (surface_x, surface_y);
                transform::guest_to_host_fixed(&state.scale, None, &mut x, &mut y);
                host.set_cursor_position_hint(x, y);
            }
            s_locked::Request::SetRegion { region } => {
                host.set_region(region.as_ref().and_then(|r| r.data::<CWlRegion>()));
            }
            s_locked::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SLockedPointer,
        host: &CLockedPointer,
    ) {
        host.destroy();
    }
}

impl Dispatch<SConfinedPointer, CConfinedPointer> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SConfinedPointer,
        request: s_confined::Request,
        host: &CConfinedPointer,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_confined::Request::SetRegion { region } => {
                host.set_region(region.as_ref().and_then(|r| r.data::<CWlRegion>()));
            }
            s_confined::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SConfinedPointer,
        host: &CConfinedPointer,
    ) {
        host.destroy();
    }
}

impl ClientDispatch<CLockedPointer, Paired<SLockedPointer>> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &CLockedPointer,
        event: c_locked::Event,
        data: &Paired<SLockedPointer>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_locked::Event::Locked => resource.locked(),
            c_locked::Event::Unlocked => resource.unlocked(),
            _ => {}
        }
    }
}

impl ClientDispatch<CConfinedPointer, Paired<SConfinedPointer>> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &CConfinedPointer,
        event: c_confined::Event,
        data: &Paired<SConfinedPointer>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_confined::Event::Confined => resource.confined(),
            c_confined::Event::Unconfined => resource.unconfined(),
            _ => {}
        }
    }
}
