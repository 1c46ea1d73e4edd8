//! Synthesised wl_drm global.
//!
//! EGL inside the guest probes wl_drm before it trusts linux-dmabuf, so a
//! shim is always advertised when the host supports dmabuf import. PRIME
//! fd buffers are rewrapped as single-plane dmabuf buffers; flink names
//! have no equivalent on the host and are refused.

use std::os::fd::AsFd;
use std::path::PathBuf;

use wayland_protocols::wp::linux_dmabuf::zv1::client::zwp_linux_buffer_params_v1::Flags as DmabufFlags;
use wayland_server::protocol::wl_buffer::WlBuffer as SWlBuffer;
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};
use wl_drm::server::wl_drm::{self as s_wl_drm, WlDrm as SWlDrm};

use crate::context::Context;
use crate::globals::{allowed_for_client, GlobalData};
use crate::linux_dmabuf::MOD_INVALID;
use crate::shm::{BufferData, PairedBuffer};

const DEFAULT_RENDER_NODE: &str = "/dev/dri/renderD128";

/// The render node reported through wl_drm.device.
pub fn render_node(state: &Context) -> PathBuf {
    state
        .config
        .force_drm_device
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RENDER_NODE))
}

impl GlobalDispatch<SWlDrm, GlobalData> for Context {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SWlDrm>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let drm = data_init.init(resource, ());
        drm.device(render_node(state).to_string_lossy().into_owned());
        for &(format, _) in &state.dmabuf_formats {
            drm.format(format);
        }
        if drm.version() >= 2 {
            drm.capabilities(s_wl_drm::Capability::Prime.bits());
        }
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SWlDrm, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &SWlDrm,
        request: s_wl_drm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_drm::Request::Authenticate { .. } => {
                // Render nodes need no authentication.
                resource.authenticated();
            }
            s_wl_drm::Request::CreateBuffer { id, .. }
            | s_wl_drm::Request::CreatePlanarBuffer { id, .. } => {
                let _ = id;
                resource.post_error(
                    s_wl_drm::Error::InvalidName,
                    "flink names are not supported".to_owned(),
                );
            }
            s_wl_drm::Request::CreatePrimeBuffer {
                id,
                name,
                width,
                height,
                format,
                offset0,
                stride0,
                ..
            } => {
                let Some((host_dmabuf, version)) = &state.linux_dmabuf else {
                    resource.post_error(
                        s_wl_drm::Error::InvalidName,
                        "no dmabuf support on host".to_owned(),
                    );
                    return;
                };
                if *version < 2 {
                    resource.post_error(
                        s_wl_drm::Error::InvalidName,
                        "host cannot import prime buffers".to_owned(),
                    );
                    return;
                }
                let params = host_dmabuf.create_params(
                    &state.qh,
                    std::sync::Arc::new(crate::linux_dmabuf::ParamsState::default()),
                );
                params.add(
                    name.as_fd(),
                    0,
                    offset0 as u32,
                    stride0 as u32,
                    (MOD_INVALID >> 32) as u32,
                    MOD_INVALID as u32,
                );
                let paired = PairedBuffer::default();
                let host_buffer = params.create_immed(
                    width,
                    height,
                    format,
                    DmabufFlags::empty(),
                    &state.qh,
                    paired.clone(),
                );
                params.destroy();
                let buffer: SWlBuffer =
                    data_init.init(id, BufferData { host: host_buffer, width, height });
                let _ = paired.set(buffer);
            }
            _ => {}
        }
    }
}
