//! zwp_linux_dmabuf_v1 adaptor.
//!
//! Formats and modifiers recorded from the host are replayed to each guest
//! binding; buffer params pass through, including the dmabuf fds
//! themselves. Buffers created asynchronously by the host come back as
//! server-created wl_buffer resources on the guest side.

use std::os::fd::AsFd;
use std::sync::{Arc, Mutex, OnceLock};

use wayland_client::protocol::wl_buffer::WlBuffer as CWlBuffer;
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle};
use wayland_protocols::wp::linux_dmabuf::zv1::client::zwp_linux_buffer_params_v1::{
    self as c_params, ZwpLinuxBufferParamsV1 as CParams,
};
use wayland_protocols::wp::linux_dmabuf::zv1::client::zwp_linux_dmabuf_v1::{
    self as c_dmabuf, ZwpLinuxDmabufV1 as CLinuxDmabuf,
};
use wayland_protocols::wp::linux_dmabuf::zv1::server::zwp_linux_buffer_params_v1::{
    self as s_params, ZwpLinuxBufferParamsV1 as SParams,
};
use wayland_protocols::wp::linux_dmabuf::zv1::server::zwp_linux_dmabuf_v1::{
    self as s_dmabuf, ZwpLinuxDmabufV1 as SLinuxDmabuf,
};
use wayland_server::protocol::wl_buffer::WlBuffer as SWlBuffer;
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::Context;
use crate::globals::{allowed_for_client, GlobalData};
use crate::shm::{BufferData, PairedBuffer};

/// The implicit modifier announced through plain `format` events.
pub const MOD_INVALID: u64 = 0x00ff_ffff_ffff_ffff;

/// Shared state of one buffer-params pair.
#[derive(Debug, Default)]
pub struct ParamsState {
    /// Guest resource, filled once initialised.
    pub resource: OnceLock<SParams>,
    /// Size passed to `create`, consumed when the host answers.
    pub pending_size: Mutex<(i32, i32)>,
}

impl GlobalDispatch<SLinuxDmabuf, GlobalData> for Context {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SLinuxDmabuf>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let dmabuf = data_init.init(resource, ());
        for &(format, modifier) in &state.dmabuf_formats {
            if dmabuf.version() >= 3 {
                dmabuf.modifier(format, (modifier >> 32) as u32, modifier as u32);
            } else if modifier == MOD_INVALID {
                dmabuf.format(format);
            }
        }
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SLinuxDmabuf, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SLinuxDmabuf,
        request: s_dmabuf::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_dmabuf::Request::CreateParams { params_id } => {
                let Some((host_dmabuf, _)) = &state.linux_dmabuf else {
                    return;
                };
                let shared = Arc::new(ParamsState::default());
                let host = host_dmabuf.create_params(&state.qh, shared.clone());
                let resource = data_init.init(params_id, host);
                let _ = shared.resource.set(resource);
            }
            s_dmabuf::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<SParams, CParams> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SParams,
        request: s_params::Request,
        host: &CParams,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_params::Request::Add { fd, plane_idx, offset, stride, modifier_hi, modifier_lo } => {
                host.add(fd.as_fd(), plane_idx, offset, stride, modifier_hi, modifier_lo);
            }
            s_params::Request::Create { width, height, format, flags } => {
                let flags = c_params::Flags::from_bits_truncate(match flags {
                    wayland_server::WEnum::Value(f) => f.bits(),
                    wayland_server::WEnum::Unknown(v) => v,
                });
                if let Some(shared) = host.data::<Arc<ParamsState>>() {
                    if let Ok(mut size) = shared.pending_size.lock() {
                        *size = (width, height);
                    }
                }
                host.create(width, height, format, flags);
            }
            s_params::Request::CreateImmed { buffer_id, width, height, format, flags } => {
                let flags = c_params::Flags::from_bits_truncate(match flags {
                    wayland_server::WEnum::Value(f) => f.bits(),
                    wayland_server::WEnum::Unknown(v) => v,
                });
                let paired = PairedBuffer::default();
                let host_buffer =
                    host.create_immed(width, height, format, flags, &state.qh, paired.clone());
                let buffer =
                    data_init.init(buffer_id, BufferData { host: host_buffer, width, height });
                let _ = paired.set(buffer);
            }
            s_params::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SParams,
        host: &CParams,
    ) {
        host.destroy();
    }
}

impl ClientDispatch<CLinuxDmabuf, ()> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CLinuxDmabuf,
        event: c_dmabuf::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            c_dmabuf::Event::Format { format } => {
                if !state.dmabuf_formats.contains(&(format, MOD_INVALID)) {
                    state.dmabuf_formats.push((format, MOD_INVALID));
                }
            }
            c_dmabuf::Event::Modifier { format, modifier_hi, modifier_lo } => {
                let modifier = ((modifier_hi as u64) << 32) | modifier_lo as u64;
                if !state.dmabuf_formats.contains(&(format, modifier)) {
                    state.dmabuf_formats.push((format, modifier));
                }
            }
            _ => {}
        }
    }
}

impl ClientDispatch<CParams, Arc<ParamsState>> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CParams,
        event: c_params::Event,
        data: &Arc<ParamsState>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.resource.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_params::Event::Created { buffer } => {
                // Hand the host-created buffer to the guest as a
                // server-created object.
                let Some(client) = resource.client() else {
                    buffer.destroy();
                    return;
                };
                let (width, height) = data.pending_size.lock().map(|s| *s).unwrap_or((0, 0));
                match client.create_resource::<SWlBuffer, BufferData, Context>(
                    &state.display_handle,
                    1,
                    BufferData { host: buffer.clone(), width, height },
                ) {
                    Ok(guest_buffer) => {
                        if let Some(cell) = buffer.data::<PairedBuffer>() {
                            let _ = cell.set(guest_buffer.clone());
                        }
                        resource.created(&guest_buffer);
                    }
                    Err(err) => {
                        log::warn!("creating guest dmabuf buffer failed: {}", err);
                        buffer.destroy();
                        resource.failed();
                    }
                }
            }
            c_params::Event::Failed => {
                resource.failed();
            }
            _ => {}
        }
    }

    wayland_client::event_created_child!(Context, CParams, [
        c_params::EVT_CREATED_OPCODE => (CWlBuffer, PairedBuffer::default()),
    ]);
}
