//! wl_shm, wl_shm_pool and wl_buffer adaptors.
//!
//! Pool fds pass straight through to the host; the host maps the guest's
//! memory itself. Each guest buffer owns a paired host buffer, and a host
//! `wl_buffer.release` is forwarded to the guest buffer as soon as it
//! arrives, which keeps the guest's busy/free accounting in lockstep with
//! the host's.

use std::os::fd::AsFd;
use std::sync::{Arc, OnceLock};

use wayland_client::protocol::wl_buffer::{self as c_wl_buffer, WlBuffer as CWlBuffer};
use wayland_client::protocol::wl_shm::{self as c_wl_shm, WlShm as CWlShm};
use wayland_client::protocol::wl_shm_pool::WlShmPool as CWlShmPool;
use wayland_client::{Connection, Dispatch as ClientDispatch, QueueHandle, WEnum};
use wayland_server::protocol::wl_buffer::{self as s_wl_buffer, WlBuffer as SWlBuffer};
use wayland_server::protocol::wl_shm::{self as s_wl_shm, WlShm as SWlShm};
use wayland_server::protocol::wl_shm_pool::{self as s_wl_shm_pool, WlShmPool as SWlShmPool};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::context::Context;
use crate::globals::{allowed_for_client, GlobalData};

/// Pairing cell from a host buffer back to the guest buffer. Filled right
/// after both halves exist; checked for liveness on every release.
pub type PairedBuffer = Arc<OnceLock<SWlBuffer>>;

/// Guest buffer state: the paired host buffer and the pixel size, which
/// the commit pipeline uses for viewport and ack decisions.
#[derive(Debug)]
pub struct BufferData {
    /// Paired host buffer.
    pub host: CWlBuffer,
    /// Pixel width.
    pub width: i32,
    /// Pixel height.
    pub height: i32,
}

impl GlobalDispatch<SWlShm, GlobalData> for Context {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SWlShm>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let shm = data_init.init(resource, ());
        for &format in &state.shm_formats {
            if let Ok(format) = s_wl_shm::Format::try_from(format) {
                shm.format(format);
            }
        }
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SWlShm, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &SWlShm,
        request: s_wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_shm::Request::CreatePool { id, fd, size } => {
                let Some(host_shm) = &state.shm else {
                    return;
                };
                if size <= 0 {
                    resource.post_error(
                        s_wl_shm::Error::InvalidStride,
                        "invalid pool size".to_owned(),
                    );
                    return;
                }
                let host = host_shm.create_pool(fd.as_fd(), size, &state.qh, ());
                data_init.init(id, host);
            }
            _ => {}
        }
    }
}

impl Dispatch<SWlShmPool, CWlShmPool> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &SWlShmPool,
        request: s_wl_shm_pool::Request,
        host_pool: &CWlShmPool,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_shm_pool::Request::CreateBuffer {
                id,
                offset,
                width,
                height,
                stride,
                format,
            } => {
                let raw_format = match format {
                    WEnum::Value(f) => f as u32,
                    WEnum::Unknown(v) => v,
                };
                let Ok(host_format) = c_wl_shm::Format::try_from(raw_format) else {
                    resource.post_error(
                        s_wl_shm::Error::InvalidFormat,
                        format!("unknown format 0x{:x}", raw_format),
                    );
                    return;
                };
                let paired: PairedBuffer = Arc::new(OnceLock::new());
                let host = host_pool.create_buffer(
                    offset,
                    width,
                    height,
                    stride,
                    host_format,
                    &state.qh,
                    paired.clone(),
                );
                let buffer = data_init.init(id, BufferData { host, width, height });
                let _ = paired.set(buffer);
            }
            s_wl_shm_pool::Request::Resize { size } => {
                host_pool.resize(size);
            }
            s_wl_shm_pool::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SWlShmPool,
        host_pool: &CWlShmPool,
    ) {
        host_pool.destroy();
    }
}

impl Dispatch<SWlBuffer, BufferData> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SWlBuffer,
        request: s_wl_buffer::Request,
        _data: &BufferData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_buffer::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        _state: &mut Self,
        _client: wayland_server::backend::ClientId,
        _resource: &SWlBuffer,
        data: &BufferData,
    ) {
        data.host.destroy();
    }
}

impl ClientDispatch<CWlShm, ()> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CWlShm,
        event: c_wl_shm::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_wl_shm::Event::Format { format } = event {
            let raw = match format {
                WEnum::Value(f) => f as u32,
                WEnum::Unknown(v) => v,
            };
            if !state.shm_formats.contains(&raw) {
                state.shm_formats.push(raw);
            }
        }
    }
}

impl ClientDispatch<CWlBuffer, PairedBuffer> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &CWlBuffer,
        event: c_wl_buffer::Event,
        data: &PairedBuffer,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let c_wl_buffer::Event::Release = event {
            if let Some(buffer) = data.get() {
                if buffer.is_alive() {
                    buffer.release();
                }
            }
        }
    }
}

wayland_client::delegate_noop!(Context: ignore CWlShmPool);
