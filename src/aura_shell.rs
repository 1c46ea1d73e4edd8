//! zaura_shell adaptors for guest clients.
//!
//! Guest applications that know about the aura extension (e.g. Chromium
//! inside the VM) can label and decorate their surfaces directly; requests
//! pass through, and per-output scale information flows back so guests see
//! the same zoom the host applies.

use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_client::{Connection, Dispatch as ClientDispatch, QueueHandle};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use exo_protocols::aura_shell::v38::client::zaura_surface::ZauraSurface as CZauraSurface;
use exo_protocols::aura_shell::v38::client::zaura_toplevel::{
    self as c_aura_toplevel, ZauraToplevel as CZauraToplevel,
};
use exo_protocols::aura_shell::v38::server::zaura_output::ZauraOutput as SZauraOutput;
use exo_protocols::aura_shell::v38::server::zaura_shell::{
    self as s_aura_shell, ZauraShell as SZauraShell,
};
use exo_protocols::aura_shell::v38::server::zaura_surface::{
    self as s_aura_surface, ZauraSurface as SZauraSurface,
};
use exo_protocols::aura_shell::v38::server::zaura_toplevel::{
    self as s_aura_toplevel, ZauraToplevel as SZauraToplevel,
};

use crate::context::{Context, Paired};
use crate::globals::{allowed_for_client, GlobalData};
use crate::transform;

impl GlobalDispatch<SZauraShell, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SZauraShell>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

impl Dispatch<SZauraShell, ()> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SZauraShell,
        request: s_aura_shell::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let Some((aura_shell, _)) = &state.aura_shell else {
            return;
        };
        match request {
            s_aura_shell::Request::GetAuraSurface { id, surface } => {
                let Some(host_surface) = surface.data::<CWlSurface>() else {
                    return;
                };
                let host = aura_shell.get_aura_surface(host_surface, &state.qh, ());
                data_init.init(id, host);
            }
            s_aura_shell::Request::GetAuraOutput { id, output } => {
                let Some(name) = output.data::<u32>().copied() else {
                    return;
                };
                let binding = data_init.init(id, name);
                if let Some(output) = state.outputs.iter_mut().find(|o| o.name == name) {
                    send_aura_output_state(&binding, &output.metrics);
                    output.aura_bindings.push(binding);
                }
            }
            s_aura_shell::Request::GetAuraToplevel { id, surface } => {
                let Some(host_surface) = surface.data::<CWlSurface>() else {
                    return;
                };
                let paired: Paired<SZauraToplevel> = Paired::default();
                let host =
                    aura_shell.get_aura_toplevel(host_surface, &state.qh, paired.clone());
                let created = data_init.init(id, host);
                let _ = paired.set(created);
            }
            _ => {}
        }
    }
}

/// Replay the known aura state of an output to a fresh binding.
pub fn send_aura_output_state(binding: &SZauraOutput, metrics: &crate::output::OutputMetrics) {
    use exo_protocols::aura_shell::v38::server::zaura_output as s_aura_output;
    if let Ok(scale) = s_aura_output::ScaleFactor::try_from(metrics.current_scale) {
        binding.scale(s_aura_output::ScaleProperty::Current, scale);
    }
    if binding.version() >= 2 {
        binding.connection(if metrics.internal {
            s_aura_output::ConnectionType::Internal
        } else {
            s_aura_output::ConnectionType::Unknown
        });
        if let Ok(scale) = s_aura_output::ScaleFactor::try_from(metrics.device_scale_factor) {
            binding.device_scale_factor(scale);
        }
    }
}

impl Dispatch<SZauraSurface, CZauraSurface> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SZauraSurface,
        request: s_aura_surface::Request,
        host: &CZauraSurface,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        use exo_protocols::aura_shell::v38::client::zaura_surface as c_aura_surface;
        match request {
            s_aura_surface::Request::SetFrame { _type } => {
                let raw = match _type {
                    wayland_server::WEnum::Value(t) => t as u32,
                    wayland_server::WEnum::Unknown(v) => v,
                };
                if let Ok(frame) = c_aura_surface::FrameType::try_from(raw) {
                    host.set_frame(frame);
                }
            }
            s_aura_surface::Request::SetFrameColors { active_color, inactive_color } => {
                host.set_frame_colors(active_color, inactive_color);
            }
            s_aura_surface::Request::SetStartupId { startup_id } => {
                host.set_startup_id(startup_id);
            }
            s_aura_surface::Request::SetApplicationId { application_id } => {
                host.set_application_id(application_id);
            }
            s_aura_surface::Request::SetFullscreenMode { mode } => {
                let raw = match mode {
                    wayland_server::WEnum::Value(m) => m as u32,
                    wayland_server::WEnum::Unknown(v) => v,
                };
                if let Ok(mode) = c_aura_surface::FullscreenMode::try_from(raw) {
                    host.set_fullscreen_mode(mode);
                }
            }
            s_aura_surface::Request::Activate => host.activate(),
            s_aura_surface::Request::DrawAttention => host.draw_attention(),
            s_aura_surface::Request::SetAspectRatio { width, height } => {
                host.set_aspect_ratio(width, height);
            }
            _ => {}
        }
    }
}

impl Dispatch<SZauraOutput, u32> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SZauraOutput,
        request: exo_protocols::aura_shell::v38::server::zaura_output::Request,
        _data: &u32,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            _ => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: wayland_server::backend::ClientId,
        resource: &SZauraOutput,
        data: &u32,
    ) {
        if let Some(output) = state.outputs.iter_mut().find(|o| o.name == *data) {
            output.aura_bindings.retain(|b| b.id() != resource.id());
        }
    }
}

impl Dispatch<SZauraToplevel, CZauraToplevel> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SZauraToplevel,
        request: s_aura_toplevel::Request,
        host: &CZauraToplevel,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_aura_toplevel::Request::SetSupportsScreenCoordinates => {
                host.set_supports_screen_coordinates();
            }
            s_aura_toplevel::Request::SetWindowBounds { x, y, width, height, output } => {
                let metrics = state.output_metrics();
                let (mut x, mut y) = (x, y);
                let (mut w, mut h) = (width, height);
                let index = transform::guest_position_to_host_position(
                    &state.scale,
                    None,
                    &metrics,
                    &mut x,
                    &mut y,
                );
                transform::guest_to_host(&state.scale, None, &mut w, &mut h);
                let host_output = output
                    .as_ref()
                    .and_then(|o| o.data::<u32>())
                    .and_then(|name| state.outputs.iter().find(|out| out.name == *name))
                    .or_else(|| index.and_then(|i| state.outputs.get(i)))
                    .map(|o| &o.host);
                host.set_window_bounds(x, y, w, h, host_output);
            }
            _ => {}
        }
    }
}

impl ClientDispatch<CZauraToplevel, Paired<SZauraToplevel>> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CZauraToplevel,
        event: c_aura_toplevel::Event,
        data: &Paired<SZauraToplevel>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(resource) = data.get().filter(|r| r.is_alive()) else {
            return;
        };
        match event {
            c_aura_toplevel::Event::Configure { x, y, width, height, states } => {
                let metrics = state.output_metrics();
                let (mut x, mut y) = (x, y);
                let (mut w, mut h) = (width, height);
                transform::host_position_to_guest_position(
                    &state.scale,
                    None,
                    &metrics,
                    &mut x,
                    &mut y,
                );
                if w > 0 && h > 0 {
                    transform::host_to_guest(&state.scale, None, &mut w, &mut h);
                }
                resource.configure(x, y, w, h, states);
            }
            c_aura_toplevel::Event::OriginChange { x, y } => {
                let metrics = state.output_metrics();
                let (mut x, mut y) = (x, y);
                transform::host_position_to_guest_position(
                    &state.scale,
                    None,
                    &metrics,
                    &mut x,
                    &mut y,
                );
                resource.origin_change(x, y);
            }
            _ => {}
        }
    }
}

wayland_client::delegate_noop!(Context: ignore CZauraSurface);
