//! zwp_relative_pointer_manager_v1 adaptor.
//!
//! Deltas pass through unscaled; they are relative measurements in the
//! device domain rather than positions. For X11 clients the unaccelerated
//! deltas are rounded away from zero, because many X11 toolkits truncate
//! RawMotion events and would otherwise drop sub-pixel movement entirely.

use wayland_client::{Connection, Dispatch as ClientDispatch, QueueHandle};
use wayland_protocols::wp::relative_pointer::zv1::client::zwp_relative_pointer_v1::{
    self as c_relative, ZwpRelativePointerV1 as CRelativePointer,
};
use wayland_protocols::wp::relative_pointer::zv1::server::zwp_relative_pointer_manager_v1::{
    self as s_manager, ZwpRelativePointerManagerV1 as SRelativePointerManager,
};
use wayland_protocols::wp::relative_pointer::zv1::server::zwp_relative_pointer_v1::{
    self as s_relative, ZwpRelativePointerV1 as SRelativePointer,
};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::{Context, Paired};
use crate::globals::{allowed_for_client, GlobalData};

/// Like `ceil()`, but strictly increasing the magnitude of the value.
fn magnitude_ceil(value: f64) -> f64 {
    if value >= 0.0 {
        value.ceil().max(1.0)
    } else {
        value.floor().min(-1.0)
    }
}

impl GlobalDispatch<SRelativePointerManager, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SRelativePointerManager>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SRelativePointerManager, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SRelativePointerManager,
        request: s_manager::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_manager::Request::GetRelativePointer { id, pointer } => {
                let Some(manager) = &state.relative_pointer_manager else {
                    return;
                };
                let Some(host_pointer) = crate::seat::host_pointer(state, &pointer) else {
                    return;
                };
                let paired: Paired<SRelativePointer> = Paired::default();
                let host = manager.get_relative_pointer(host_pointer, &state.qh, paired.clone());
                let resource = data_init.init(id, host);
                let _ = paired.set(resource);
            }
            s_manager::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<SRelativePointer, CRelativePointer> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SRelativePointer,
        request: s_relative::Request,
        _host: &CRelativePointer,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_relative::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SRelativePointer,
        host: &CRelativePointer,
    ) {
        host.destroy();
    }
}

impl ClientDispatch<CRelativePointer, Paired<SRelativePointer>> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CRelativePointer,
        event: c_relative::Event,
        data: &Paired<SRelativePointer>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_relative::Event::RelativeMotion {
            utime_hi,
            utime_lo,
            dx,
            dy,
            mut dx_unaccel,
            mut dy_unaccel,
        } = event
        {
            if state.config.x11 {
                if dx_unaccel != 0.0 {
                    dx_unaccel = magnitude_ceil(dx_unaccel);
                }
                if dy_unaccel != 0.0 {
                    dy_unaccel = magnitude_ceil(dy_unaccel);
                }
            }
            if let Some(resource) = data.get() {
                if resource.is_alive() {
                    resource.relative_motion(utime_hi, utime_lo, dx, dy, dx_unaccel, dy_unaccel);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_ceil_rounds_away_from_zero() {
        assert_eq!(magnitude_ceil(0.25), 1.0);
        assert_eq!(magnitude_ceil(1.0), 1.0);
        assert_eq!(magnitude_ceil(1.5), 2.0);
        assert_eq!(magnitude_ceil(-0.25), -1.0);
        assert_eq!(magnitude_ceil(-2.5), -3.0);
    }
}
