//! wl_data_device_manager adaptors and the internal selection objects.
//!
//! Two kinds of objects share these interfaces: pass-through pairs created
//! on behalf of guest clients, and the internal data device sommelier
//! itself owns for the X11 clipboard bridge. The two are told apart by the
//! user data of the host proxies.

use std::collections::VecDeque;
use std::os::fd::{AsFd, OwnedFd};

use wayland_client::protocol::wl_data_device::{self as c_device, WlDataDevice as CWlDataDevice};
use wayland_client::protocol::wl_data_device_manager::DndAction as CDndAction;
use wayland_client::protocol::wl_data_offer::{self as c_offer, WlDataOffer as CWlDataOffer};
use wayland_client::protocol::wl_data_source::{self as c_source, WlDataSource as CWlDataSource};
use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle};
use wayland_server::protocol::wl_data_device::{self as s_device, WlDataDevice as SWlDataDevice};
use wayland_server::protocol::wl_data_device_manager::{
    self as s_manager, WlDataDeviceManager as SWlDataDeviceManager,
};
use wayland_server::protocol::wl_data_offer::{self as s_offer, WlDataOffer as SWlDataOffer};
use wayland_server::protocol::wl_data_source::{self as s_source, WlDataSource as SWlDataSource};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::{Context, Paired};
use crate::globals::{allowed_for_client, GlobalData};
use crate::transform;

/// Marker user data of the internal selection objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Internal;

/// A host selection offer tracked for the X11 bridge.
#[derive(Debug)]
pub struct SelectionOffer {
    /// The host offer.
    pub offer: CWlDataOffer,
    /// Mime types announced so far.
    pub mime_types: Vec<String>,
}

/// Wayland-side state of the clipboard bridge.
#[derive(Debug, Default)]
pub struct SelectionState {
    /// Internal data device on the default seat.
    pub data_device: Option<CWlDataDevice>,
    /// Offer being introduced but not yet the selection.
    pub incoming: Option<SelectionOffer>,
    /// The current host selection offer.
    pub offer: Option<SelectionOffer>,
    /// Our data source advertising the X11 selection to the host.
    pub source: Option<CWlDataSource>,
    /// Queued `wl_data_source.send` requests while one transfer is in
    /// flight.
    pub pending_sends: VecDeque<(String, OwnedFd)>,
}

/// Create the internal data device once both the manager and a seat exist.
pub fn ensure_selection_data_device(state: &mut Context) {
    if state.selection.data_device.is_some() || !state.config.x11 {
        return;
    }
    let (Some((manager, _)), Some(seat)) = (&state.data_device_manager, state.seats.first())
    else {
        return;
    };
    let device = manager.get_data_device(&seat.host, &state.qh, Internal);
    state.selection.data_device = Some(device);
}

impl GlobalDispatch<SWlDataDeviceManager, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SWlDataDeviceManager>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

fn dnd_actions(actions: wayland_server::WEnum<s_manager::DndAction>) -> CDndAction {
    CDndAction::from_bits_truncate(match actions {
        wayland_server::WEnum::Value(a) => a.bits(),
        wayland_server::WEnum::Unknown(v) => v,
    })
}

impl Dispatch<SWlDataDeviceManager, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SWlDataDeviceManager,
        request: s_manager::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let Some((manager, _)) = &state.data_device_manager else {
            return;
        };
        match request {
            s_manager::Request::CreateDataSource { id } => {
                let paired: Paired<SWlDataSource> = Paired::default();
                let host = manager.create_data_source(&state.qh, paired.clone());
                let resource = data_init.init(id, host);
                let _ = paired.set(resource);
            }
            s_manager::Request::GetDataDevice { id, seat } => {
                let Some(host_seat) = crate::seat::host_seat(state, &seat) else {
                    return;
                };
                let paired: Paired<SWlDataDevice> = Paired::default();
                let host = manager.get_data_device(host_seat, &state.qh, paired.clone());
                let resource = data_init.init(id, host);
                let _ = paired.set(resource);
            }
            _ => {}
        }
    }
}

impl Dispatch<SWlDataSource, CWlDataSource> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SWlDataSource,
        request: s_source::Request,
        host: &CWlDataSource,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_source::Request::Offer { mime_type } => host.offer(mime_type),
            s_source::Request::SetActions { dnd_actions: actions } => {
                host.set_actions(dnd_actions(actions));
            }
            s_source::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SWlDataSource,
        host: &CWlDataSource,
    ) {
        host.destroy();
    }
}

impl Dispatch<SWlDataDevice, CWlDataDevice> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SWlDataDevice,
        request: s_device::Request,
        host: &CWlDataDevice,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_device::Request::StartDrag { source, origin, icon, serial } => {
                let host_source = source.as_ref().and_then(|s| s.data::<CWlDataSource>());
                let Some(host_origin) = origin.data::<CWlSurface>() else {
                    return;
                };
                let host_icon = icon.as_ref().and_then(|s| s.data::<CWlSurface>());
                if let Some(icon) = &icon {
                    if let Some(s) = state.surfaces.get_mut(&icon.id()) {
                        s.has_role = true;
                    }
                }
                host.start_drag(host_source, host_origin, host_icon, serial);
            }
            s_device::Request::SetSelection { source, serial } => {
                let host_source = source.as_ref().and_then(|s| s.data::<CWlDataSource>());
                host.set_selection(host_source, serial);
            }
            s_device::Request::Release => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SWlDataDevice,
        host: &CWlDataDevice,
    ) {
        if host.version() >= 2 {
            host.release();
        }
    }
}

impl Dispatch<SWlDataOffer, CWlDataOffer> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SWlDataOffer,
        request: s_offer::Request,
        host: &CWlDataOffer,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_offer::Request::Accept { serial, mime_type } => host.accept(serial, mime_type),
            s_offer::Request::Receive { mime_type, fd } => host.receive(mime_type, fd.as_fd()),
            s_offer::Request::Finish => host.finish(),
            s_offer::Request::SetActions { dnd_actions: actions, preferred_action } => {
                let preferred = CDndAction::from_bits_truncate(match preferred_action {
                    wayland_server::WEnum::Value(a) => a.bits(),
                    wayland_server::WEnum::Unknown(v) => v,
                });
                host.set_actions(dnd_actions(actions), preferred);
            }
            s_offer::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SWlDataOffer,
        host: &CWlDataOffer,
    ) {
        host.destroy();
    }
}

// Pass-through client side.

impl ClientDispatch<CWlDataSource, Paired<SWlDataSource>> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &CWlDataSource,
        event: c_source::Event,
        data: &Paired<SWlDataSource>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_source::Event::Target { mime_type } => resource.target(mime_type),
            c_source::Event::Send { mime_type, fd } => resource.send(mime_type, fd.as_fd()),
            c_source::Event::Cancelled => resource.cancelled(),
            c_source::Event::DndDropPerformed => {
                if resource.version() >= 3 {
                    resource.dnd_drop_performed();
                }
            }
            c_source::Event::DndFinished => {
                if resource.version() >= 3 {
                    resource.dnd_finished();
                }
            }
            c_source::Event::Action { dnd_action } => {
                if resource.version() >= 3 {
                    let raw = match dnd_action {
                        wayland_client::WEnum::Value(a) => a.bits(),
                        wayland_client::WEnum::Unknown(v) => v,
                    };
                    resource.action(
                        wayland_server::protocol::wl_data_device_manager::DndAction::
                            from_bits_truncate(raw),
                    );
                }
            }
            _ => {}
        }
    }
}

impl ClientDispatch<CWlDataDevice, Paired<SWlDataDevice>> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CWlDataDevice,
        event: c_device::Event,
        data: &Paired<SWlDataDevice>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_device::Event::DataOffer { id } => {
                // Introduce a server-created offer to the guest and pair
                // the two before any mime types arrive.
                let Some(client) = resource.client() else {
                    return;
                };
                match client.create_resource::<SWlDataOffer, CWlDataOffer, Context>(
                    &state.display_handle,
                    resource.version(),
                    id.clone(),
                ) {
                    Ok(guest_offer) => {
                        if let Some(cell) = id.data::<Paired<SWlDataOffer>>() {
                            let _ = cell.set(guest_offer.clone());
                        }
                        resource.data_offer(&guest_offer);
                    }
                    Err(err) => log::warn!("creating guest data offer failed: {}", err),
                }
            }
            c_device::Event::Enter { serial, surface, x, y, id } => {
                let Some((_, guest_surface)) =
                    state.surfaces.iter().find(|(_, s)| s.host.id() == surface.id())
                else {
                    return;
                };
                let guest_offer = id
                    .as_ref()
                    .and_then(|o| o.data::<Paired<SWlDataOffer>>())
                    .and_then(|cell| cell.get());
                let view = state.surface_scale_view(&guest_surface.resource.id());
                let (mut x, mut y) = (x, y);
                transform::host_to_guest_fixed(&state.scale, Some(&view), &mut x, &mut y);
                resource.enter(serial, &guest_surface.resource, x, y, guest_offer);
            }
            c_device::Event::Leave => resource.leave(),
            c_device::Event::Motion { time, x, y } => {
                let (mut x, mut y) = (x, y);
                transform::host_to_guest_fixed(&state.scale, None, &mut x, &mut y);
                resource.motion(time, x, y);
            }
            c_device::Event::Drop => resource.drop(),
            c_device::Event::Selection { id } => {
                let guest_offer = id
                    .as_ref()
                    .and_then(|o| o.data::<Paired<SWlDataOffer>>())
                    .and_then(|cell| cell.get());
                resource.selection(guest_offer);
            }
            _ => {}
        }
    }

    wayland_client::event_created_child!(Context, CWlDataDevice, [
        c_device::EVT_DATA_OFFER_OPCODE => (CWlDataOffer, Paired::<SWlDataOffer>::default()),
    ]);
}

impl ClientDispatch<CWlDataOffer, Paired<SWlDataOffer>> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &CWlDataOffer,
        event: c_offer::Event,
        data: &Paired<SWlDataOffer>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_offer::Event::Offer { mime_type } => resource.offer(mime_type),
            c_offer::Event::SourceActions { source_actions } => {
                if resource.version() >= 3 {
                    let raw = match source_actions {
                        wayland_client::WEnum::Value(a) => a.bits(),
                        wayland_client::WEnum::Unknown(v) => v,
                    };
                    resource.source_actions(
                        wayland_server::protocol::wl_data_device_manager::DndAction::
                            from_bits_truncate(raw),
                    );
                }
            }
            c_offer::Event::Action { dnd_action } => {
                if resource.version() >= 3 {
                    let raw = match dnd_action {
                        wayland_client::WEnum::Value(a) => a.bits(),
                        wayland_client::WEnum::Unknown(v) => v,
                    };
                    resource.action(
                        wayland_server::protocol::wl_data_device_manager::DndAction::
                            from_bits_truncate(raw),
                    );
                }
            }
            _ => {}
        }
    }
}

// Internal selection side.

impl ClientDispatch<CWlDataDevice, Internal> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CWlDataDevice,
        event: c_device::Event,
        _data: &Internal,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            c_device::Event::DataOffer { id } => {
                state.selection.incoming =
                    Some(SelectionOffer { offer: id, mime_types: Vec::new() });
            }
            c_device::Event::Selection { id } => {
                if let Some(old) = state.selection.offer.take() {
                    old.offer.destroy();
                }
                match id {
                    Some(offer) => {
                        let incoming = state
                            .selection
                            .incoming
                            .take()
                            .filter(|o| o.offer.id() == offer.id());
                        state.selection.offer = incoming;
                    }
                    None => {
                        if let Some(incoming) = state.selection.incoming.take() {
                            incoming.offer.destroy();
                        }
                    }
                }
                crate::xwm::selection::host_selection_changed(state);
            }
            _ => {}
        }
    }

    wayland_client::event_created_child!(Context, CWlDataDevice, [
        c_device::EVT_DATA_OFFER_OPCODE => (CWlDataOffer, Internal),
    ]);
}

impl ClientDispatch<CWlDataOffer, Internal> for Context {
    fn event(
        state: &mut Self,
        proxy: &CWlDataOffer,
        event: c_offer::Event,
        _data: &Internal,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_offer::Event::Offer { mime_type } = event {
            for offer in [state.selection.incoming.as_mut(), state.selection.offer.as_mut()]
                .into_iter()
                .flatten()
            {
                if offer.offer.id() == proxy.id() {
                    offer.mime_types.push(mime_type);
                    break;
                }
            }
        }
    }
}

impl ClientDispatch<CWlDataSource, Internal> for Context {
    fn event(
        state: &mut Self,
        proxy: &CWlDataSource,
        event: c_source::Event,
        _data: &Internal,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            c_source::Event::Send { mime_type, fd } => {
                crate::xwm::selection::host_wants_selection_data(state, mime_type, fd);
            }
            c_source::Event::Cancelled => {
                if state
                    .selection
                    .source
                    .as_ref()
                    .is_some_and(|s| s.id() == proxy.id())
                {
                    state.selection.source = None;
                }
                proxy.destroy();
            }
            _ => {}
        }
    }
}
