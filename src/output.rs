//! Host output tracking and virtual output geometry.
//!
//! One [`Output`] exists per host `wl_output`. Every host event
//! (wl_output, zaura_output, zxdg_output_v1) updates the output's
//! [`OutputMetrics`]; the host's `done` event triggers a recompute of the
//! virtual dimensions, a reflow of the virtual row and a push of the new
//! state to every guest binding.
//!
//! Outputs are kept sorted by host X position. In virtual space they form
//! one contiguous left-to-right row starting at 0, regardless of how the
//! host arranges them, because X11 clients deal poorly with sparse
//! layouts.

use wayland_client::protocol::wl_output::{self as c_wl_output, WlOutput as CWlOutput};
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle, WEnum};
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_v1::{
    self as c_xdg_output, ZxdgOutputV1,
};
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_manager_v1::ZxdgOutputManagerV1;
use wayland_server::backend::GlobalId;
use wayland_server::protocol::wl_output::{self as s_wl_output, WlOutput as SWlOutput};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use exo_protocols::aura_shell::v38::client::zaura_output::{self, ZauraOutput};

use crate::context::Context;
use crate::transform::{self, ScaleState};

/// Maximum wl_output version advertised to guests.
pub const WL_OUTPUT_VERSION: u32 = 3;

const MAX_OUTPUT_SCALE: i32 = 2;
const INCH_IN_MM: f64 = 25.4;

// Legacy X11 applications use DPI to decide on their scale. This value is
// the convention for a "normal" scale: the DPI of a typical monitor circa
// ~2005, i.e. 20" 1080p.
const DEFACTO_DPI: f64 = 96.0;

/// Aura scale factors are enums holding the scale multiplied by 1000;
/// e.g. 1250 means 1.25.
pub fn aura_scale_factor_to_f64(scale_factor: u32) -> f64 {
    scale_factor as f64 / 1000.0
}

fn dpi_to_physical_mm(dpi: f64, px: i32) -> i32 {
    (px as f64 * (INCH_IN_MM / dpi)) as i32
}

/// Swap width and height when the output transform rotates by a quarter
/// turn.
pub fn apply_rotation(transform: u32, width: i32, height: i32) -> (i32, i32) {
    // Raw codes of wl_output.transform: normal=0, 90=1, 180=2, 270=3,
    // flipped=4, flipped_90=5, flipped_180=6, flipped_270=7.
    match transform {
        0 | 2 | 4 | 6 => (width, height),
        _ => (height, width),
    }
}

/// Numeric state of one host output plus everything derived from it.
#[derive(Debug, Clone)]
pub struct OutputMetrics {
    /// Host logical X position.
    pub x: i32,
    /// Host logical Y position.
    pub y: i32,
    /// Physical width in millimeters, as announced by the host.
    pub physical_width: i32,
    /// Physical height in millimeters, as announced by the host.
    pub physical_height: i32,
    /// Raw wl_output.subpixel code.
    pub subpixel: u32,
    /// Output manufacturer.
    pub make: String,
    /// Output model.
    pub model: String,
    /// Raw wl_output.transform code.
    pub transform: u32,
    /// Raw flags of the current mode.
    pub mode_flags: u32,
    /// Pixel width of the current mode.
    pub width: i32,
    /// Pixel height of the current mode.
    pub height: i32,
    /// Refresh rate in mHz.
    pub refresh: i32,
    /// Host wl_output.scale.
    pub scale_factor: i32,
    /// Aura device scale factor ×1000.
    pub device_scale_factor: u32,
    /// Aura current scale ×1000 (the user's zoom level).
    pub current_scale: u32,
    /// Aura preferred scale ×1000.
    pub preferred_scale: u32,
    /// xdg_output logical width.
    pub logical_width: i32,
    /// xdg_output logical height.
    pub logical_height: i32,
    /// This is the internal display. The first output is assumed internal
    /// until aura says otherwise.
    pub internal: bool,
    /// Position in the virtual row.
    pub virt_x: i32,
    /// Virtual Y position; the row is flat.
    pub virt_y: i32,
    /// Virtual (guest-visible) mode width.
    pub virt_width: i32,
    /// Virtual (guest-visible) mode height.
    pub virt_height: i32,
    /// Virtual width after applying the output transform.
    pub virt_rotated_width: i32,
    /// Virtual height after applying the output transform.
    pub virt_rotated_height: i32,
    /// Synthesised physical width in millimeters.
    pub virt_physical_width: i32,
    /// Synthesised physical height in millimeters.
    pub virt_physical_height: i32,
    /// Physical↔virtual ratio on X.
    pub virt_scale_x: f64,
    /// Physical↔virtual ratio on Y.
    pub virt_scale_y: f64,
    /// Virtual↔logical ratio on X.
    pub xdg_scale_x: f64,
    /// Virtual↔logical ratio on Y.
    pub xdg_scale_y: f64,
    /// State changed since it was last pushed to guests.
    pub needs_update: bool,
}

impl Default for OutputMetrics {
    fn default() -> Self {
        OutputMetrics {
            x: 0,
            y: 0,
            physical_width: 0,
            physical_height: 0,
            subpixel: 0,
            make: String::new(),
            model: String::new(),
            transform: 0,
            mode_flags: 0,
            width: 0,
            height: 0,
            refresh: 60_000,
            scale_factor: 1,
            device_scale_factor: 1000,
            current_scale: 1000,
            preferred_scale: 1000,
            logical_width: 0,
            logical_height: 0,
            internal: false,
            virt_x: 0,
            virt_y: 0,
            virt_width: 0,
            virt_height: 0,
            virt_rotated_width: 0,
            virt_rotated_height: 0,
            virt_physical_width: 0,
            virt_physical_height: 0,
            virt_scale_x: 1.0,
            virt_scale_y: 1.0,
            xdg_scale_x: 1.0,
            xdg_scale_y: 1.0,
            needs_update: false,
        }
    }
}

/// One host output together with its guest-facing global and bindings.
#[derive(Debug)]
pub struct Output {
    /// Host registry name.
    pub name: u32,
    /// Host-side proxy.
    pub host: CWlOutput,
    /// Aura extension object, when the host has aura shell.
    pub aura: Option<ZauraOutput>,
    /// xdg_output extension object, when the host has the manager.
    pub xdg: Option<ZxdgOutputV1>,
    /// The global advertised to guest clients for this output.
    pub global: Option<GlobalId>,
    /// Guest resources bound to the global.
    pub bindings: Vec<SWlOutput>,
    /// Guest aura-output resources for this output.
    pub aura_bindings: Vec<exo_protocols::aura_shell::v38::server::zaura_output::ZauraOutput>,
    /// Numeric state.
    pub metrics: OutputMetrics,
}

/// Compute the guest-visible mode and physical size of an output in the
/// single-scale mode.
///
/// Returns `(scale, physical_width, physical_height, width, height)`.
fn host_output_state(
    metrics: &OutputMetrics,
    ctx_scale: f64,
    xwayland: bool,
    aura_available: bool,
    dpi_buckets: &[i32],
) -> (i32, i32, i32, i32, i32) {
    // The user's chosen zoom level, and the scale applied to the screen at
    // default zoom. The product is what the host is really applying; when
    // there is no aura shell fall back to the advertised wl_output scale.
    let current_scale = aura_scale_factor_to_f64(metrics.current_scale);
    let device_scale_factor = aura_scale_factor_to_f64(metrics.device_scale_factor);
    let mut applied_scale = device_scale_factor * current_scale;
    if !aura_available {
        applied_scale = metrics.scale_factor as f64;
    }

    let (scale, mut physical_width, mut physical_height, width, height, target_dpi);
    if xwayland {
        // X11 clients can't deal with scale, so report scale 1 and instead
        // adjust the resolution and the physical size so that X
        // applications derive a matching DPI.
        scale = 1;
        width = (metrics.width as f64 * ctx_scale / applied_scale) as i32;
        height = (metrics.height as f64 * ctx_scale / applied_scale) as i32;
        target_dpi = DEFACTO_DPI * device_scale_factor;
        physical_width = dpi_to_physical_mm(target_dpi, width);
        physical_height = dpi_to_physical_mm(target_dpi, height);
    } else {
        let s = ((applied_scale / ctx_scale).ceil() as i32).min(MAX_OUTPUT_SCALE).max(1);
        scale = s;
        physical_width = metrics.physical_width;
        physical_height = metrics.physical_height;
        width = (metrics.width as f64 * ctx_scale * s as f64 / applied_scale) as i32;
        height = (metrics.height as f64 * ctx_scale * s as f64 / applied_scale) as i32;
        target_dpi = if physical_width > 0 {
            width as f64 * INCH_IN_MM / physical_width as f64
        } else {
            DEFACTO_DPI
        };
    }

    if let Some(&first) = dpi_buckets.first() {
        // Choose the bucket closest to the target DPI.
        let mut adjusted_dpi = first;
        for &dpi in dpi_buckets {
            if (dpi as f64 - target_dpi).abs() < (adjusted_dpi as f64 - target_dpi).abs() {
                adjusted_dpi = dpi;
            }
        }
        physical_width = dpi_to_physical_mm(adjusted_dpi as f64, width);
        physical_height = dpi_to_physical_mm(adjusted_dpi as f64, height);
    }

    (scale, physical_width, physical_height, width, height)
}

/// The logical dimensions of the output, optionally undoing the output
/// transform. Buffers submitted by applications are not rotated, so scale
/// factor derivation needs the unrotated logical dimensions.
fn logical_dimensions(metrics: &OutputMetrics, rotated: bool) -> (i32, i32) {
    if rotated {
        (metrics.logical_width, metrics.logical_height)
    } else {
        apply_rotation(metrics.transform, metrics.logical_width, metrics.logical_height)
    }
}

fn init_dimensions_direct(scale: &mut ScaleState, metrics: &mut OutputMetrics) {
    let mut virtual_width = metrics.width;
    let mut virtual_height = metrics.height;
    transform::output_dimensions(scale, &mut virtual_width, &mut virtual_height);

    metrics.virt_scale_x = if metrics.width > 0 {
        virtual_width as f64 / metrics.width as f64
    } else {
        1.0
    };
    metrics.virt_scale_y = if metrics.height > 0 {
        virtual_height as f64 / metrics.height as f64
    } else {
        1.0
    };

    metrics.virt_width = virtual_width;
    metrics.virt_height = virtual_height;
    // The guest is told scale 1; all scaling happens through viewports.
    metrics.scale_factor = 1;
    metrics.virt_physical_width = metrics.physical_width;
    metrics.virt_physical_height = metrics.physical_height;

    let (logical_width, logical_height) = logical_dimensions(metrics, false);
    if logical_width > 0 && logical_height > 0 {
        metrics.xdg_scale_x = virtual_width as f64 / logical_width as f64;
        metrics.xdg_scale_y = virtual_height as f64 / logical_height as f64;
    }

    if metrics.internal {
        scale.virt_scale_x = metrics.virt_scale_x;
        scale.virt_scale_y = metrics.virt_scale_y;
        scale.xdg_scale_x = metrics.xdg_scale_x;
        scale.xdg_scale_y = metrics.xdg_scale_y;
    }
}

/// Recompute the virtual dimensions of `metrics` after host state changed.
///
/// `internal` is the internal display, used to reuse its density for every
/// X11 output: X11 clients typically lack support for per-output density
/// changes.
pub fn calculate_virtual_dimensions(
    scale: &mut ScaleState,
    xwayland: bool,
    aura_available: bool,
    dpi_buckets: &[i32],
    metrics: &mut OutputMetrics,
    internal: Option<&OutputMetrics>,
) {
    if scale.direct_scale {
        init_dimensions_direct(scale, metrics);
    } else {
        let (out_scale, mut physical_width, mut physical_height, width, height) =
            host_output_state(metrics, scale.scale, xwayland, aura_available, dpi_buckets);

        if xwayland {
            if let Some(internal) = internal.filter(|m| !std::ptr::eq(*m, metrics)) {
                let (_, int_pw, int_ph, int_w, int_h) = host_output_state(
                    internal,
                    scale.scale,
                    xwayland,
                    aura_available,
                    dpi_buckets,
                );
                if int_w > 0 && int_h > 0 {
                    physical_width = int_pw * width / int_w;
                    physical_height = int_ph * height / int_h;
                }
            }
        }

        metrics.scale_factor = out_scale;
        metrics.virt_width = width;
        metrics.virt_height = height;
        metrics.virt_physical_width = physical_width;
        metrics.virt_physical_height = physical_height;
    }

    let (rw, rh) = apply_rotation(metrics.transform, metrics.virt_width, metrics.virt_height);
    metrics.virt_rotated_width = rw;
    metrics.virt_rotated_height = rh;
    metrics.needs_update = true;
}

/// Reflow the virtual row: assign each output the prefix sum of the
/// rotated virtual widths preceding it, in host-X order.
pub fn reflow_row<'a>(outputs: impl Iterator<Item = &'a mut OutputMetrics>) {
    let mut next_output_x = 0;
    for metrics in outputs {
        if metrics.virt_x != next_output_x {
            metrics.virt_x = next_output_x;
            metrics.needs_update = true;
        }
        next_output_x += metrics.virt_rotated_width;
    }
}

impl Output {
    /// Push the current state to every guest binding, if it changed.
    pub fn send_host_output_state(&mut self) {
        if !self.metrics.needs_update {
            return;
        }
        let m = &self.metrics;
        let subpixel = s_wl_output::Subpixel::try_from(m.subpixel)
            .unwrap_or(s_wl_output::Subpixel::Unknown);
        let transform = s_wl_output::Transform::try_from(m.transform)
            .unwrap_or(s_wl_output::Transform::Normal);
        let mode_flags = s_wl_output::Mode::from_bits_truncate(m.mode_flags)
            | s_wl_output::Mode::Current;
        for binding in self.bindings.iter().filter(|b| b.is_alive()) {
            binding.geometry(
                m.virt_x,
                0,
                m.virt_physical_width,
                m.virt_physical_height,
                subpixel,
                m.make.clone(),
                m.model.clone(),
                transform,
            );
            binding.mode(mode_flags, m.virt_width, m.virt_height, m.refresh);
            if binding.version() >= 2 {
                binding.scale(m.scale_factor);
                binding.done();
            }
        }
        self.metrics.needs_update = false;
    }
}

impl Context {
    /// Recompute an output after its host state changed, reflow the row and
    /// notify guests of everything that moved.
    pub fn recompute_outputs(&mut self, changed_name: u32) {
        let internal = self
            .outputs
            .iter()
            .find(|o| o.metrics.internal)
            .map(|o| o.metrics.clone());
        if let Some(output) = self.outputs.iter_mut().find(|o| o.name == changed_name) {
            calculate_virtual_dimensions(
                &mut self.scale,
                self.config.x11,
                self.aura_shell.is_some(),
                &self.config.dpi,
                &mut output.metrics,
                internal.as_ref(),
            );
        }
        reflow_row(self.outputs.iter_mut().map(|o| &mut o.metrics));
        for output in &mut self.outputs {
            output.send_host_output_state();
        }
    }

    /// Keep `outputs` sorted by host X after a geometry change.
    fn resort_outputs(&mut self) {
        self.outputs.sort_by_key(|o| o.metrics.x);
    }

    /// A host output disappeared: drop its guest global and reflow the
    /// row, shifting everything to its right.
    pub fn remove_output(&mut self, name: u32) {
        if let Some(index) = self.outputs.iter().position(|o| o.name == name) {
            let output = self.outputs.remove(index);
            if let Some(global) = output.global {
                self.display_handle.remove_global::<Context>(global);
            }
            if let Some(xdg) = &output.xdg {
                xdg.destroy();
            }
            if output.host.version() >= 3 {
                output.host.release();
            }
            reflow_row(self.outputs.iter_mut().map(|o| &mut o.metrics));
            for output in &mut self.outputs {
                output.send_host_output_state();
            }
        }
    }

    /// Give an output the aura and xdg extension objects once the managers
    /// are known.
    pub fn extend_output(&mut self, index: usize, qh: &QueueHandle<Context>) {
        let name = self.outputs[index].name;
        if self.outputs[index].aura.is_none() {
            if let Some((aura_shell, version)) = &self.aura_shell {
                if *version >= 2 {
                    let aura = aura_shell.get_aura_output(&self.outputs[index].host, qh, name);
                    self.outputs[index].aura = Some(aura);
                    // Aura tells us which output is really internal.
                    self.outputs[index].metrics.internal = false;
                }
            }
        }
        if self.outputs[index].xdg.is_none() {
            if let Some(manager) = &self.xdg_output_manager {
                let xdg = manager.get_xdg_output(&self.outputs[index].host, qh, name);
                self.outputs[index].xdg = Some(xdg);
            }
        }
    }
}

/// Guest global data: which host output this global represents.
#[derive(Debug, Clone, Copy)]
pub struct OutputGlobalData {
    /// Host registry name of the output.
    pub name: u32,
}

impl GlobalDispatch<SWlOutput, OutputGlobalData> for Context {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SWlOutput>,
        global_data: &OutputGlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let binding = data_init.init(resource, global_data.name);
        if let Some(output) = state.outputs.iter_mut().find(|o| o.name == global_data.name) {
            output.bindings.push(binding);
            output.metrics.needs_update = true;
            output.send_host_output_state();
        }
    }

    fn can_view(client: Client, _global_data: &OutputGlobalData) -> bool {
        crate::globals::allowed_for_client(&client, false)
    }
}

impl Dispatch<SWlOutput, u32> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SWlOutput,
        request: s_wl_output::Request,
        _data: &u32,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_output::Request::Release => {}
            _ => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: wayland_server::backend::ClientId,
        resource: &SWlOutput,
        data: &u32,
    ) {
        if let Some(output) = state.outputs.iter_mut().find(|o| o.name == *data) {
            output.bindings.retain(|b| b.id() != resource.id());
        }
    }
}

impl ClientDispatch<CWlOutput, u32> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CWlOutput,
        event: c_wl_output::Event,
        data: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let name = *data;
        let Some(output) = state.outputs.iter_mut().find(|o| o.name == name) else {
            return;
        };
        match event {
            c_wl_output::Event::Geometry {
                x,
                y,
                physical_width,
                physical_height,
                subpixel,
                make,
                model,
                transform,
            } => {
                let m = &mut output.metrics;
                m.x = x;
                m.y = y;
                m.physical_width = physical_width;
                m.physical_height = physical_height;
                m.subpixel = weenum_raw(subpixel);
                m.make = make;
                m.model = model;
                m.transform = weenum_raw(transform);
                m.needs_update = true;
                state.resort_outputs();
            }
            c_wl_output::Event::Mode { flags, width, height, refresh } => {
                let raw_flags = weenum_raw(flags);
                if raw_flags & c_wl_output::Mode::Current.bits() != 0 {
                    let m = &mut output.metrics;
                    m.mode_flags = raw_flags;
                    m.width = width;
                    m.height = height;
                    m.refresh = refresh;
                    m.needs_update = true;
                }
            }
            c_wl_output::Event::Scale { factor } => {
                output.metrics.scale_factor = factor;
                output.metrics.needs_update = true;
            }
            c_wl_output::Event::Done => {
                state.recompute_outputs(name);
            }
            _ => {}
        }
    }
}

fn weenum_raw<T: Into<u32> + Copy>(value: WEnum<T>) -> u32 {
    match value {
        WEnum::Value(v) => v.into(),
        WEnum::Unknown(v) => v,
    }
}

impl ClientDispatch<ZauraOutput, u32> for Context {
    fn event(
        state: &mut Self,
        _proxy: &ZauraOutput,
        event: zaura_output::Event,
        data: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let name = *data;
        let Some(output) = state.outputs.iter_mut().find(|o| o.name == name) else {
            return;
        };
        use exo_protocols::aura_shell::v38::server::zaura_output as s_aura_output;
        match event {
            zaura_output::Event::Scale { flags, scale } => {
                let flags = weenum_raw(flags);
                let scale = weenum_raw(scale);
                if flags & zaura_output::ScaleProperty::Current.bits() != 0 {
                    output.metrics.current_scale = scale;
                }
                if flags & zaura_output::ScaleProperty::Preferred.bits() != 0 {
                    output.metrics.preferred_scale = scale;
                }
                output.metrics.needs_update = true;
                if let (Some(flags), Ok(scale)) = (
                    s_aura_output::ScaleProperty::from_bits(flags),
                    s_aura_output::ScaleFactor::try_from(scale),
                ) {
                    for binding in &output.aura_bindings {
                        binding.scale(flags, scale);
                    }
                }
                state.recompute_outputs(name);
            }
            zaura_output::Event::Connection { connection } => {
                let internal =
                    weenum_raw(connection) == zaura_output::ConnectionType::Internal as u32;
                output.metrics.internal = internal;
                output.metrics.needs_update = true;
                for binding in output.aura_bindings.iter().filter(|b| b.version() >= 2) {
                    binding.connection(if internal {
                        s_aura_output::ConnectionType::Internal
                    } else {
                        s_aura_output::ConnectionType::Unknown
                    });
                }
                state.recompute_outputs(name);
            }
            zaura_output::Event::DeviceScaleFactor { scale } => {
                let scale = weenum_raw(scale);
                output.metrics.device_scale_factor = scale;
                output.metrics.needs_update = true;
                if let Ok(scale) = s_aura_output::ScaleFactor::try_from(scale) {
                    for binding in output.aura_bindings.iter().filter(|b| b.version() >= 2) {
                        binding.device_scale_factor(scale);
                    }
                }
                state.recompute_outputs(name);
            }
            _ => {}
        }
    }
}

impl ClientDispatch<ZxdgOutputV1, u32> for Context {
    fn event(
        state: &mut Self,
        _proxy: &ZxdgOutputV1,
        event: c_xdg_output::Event,
        data: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(output) = state.outputs.iter_mut().find(|o| o.name == *data) else {
            return;
        };
        match event {
            c_xdg_output::Event::LogicalPosition { x, y } => {
                output.metrics.x = x;
                output.metrics.y = y;
                output.metrics.needs_update = true;
                state.resort_outputs();
            }
            c_xdg_output::Event::LogicalSize { width, height } => {
                output.metrics.logical_width = width;
                output.metrics.logical_height = height;
                output.metrics.needs_update = true;
            }
            _ => {}
        }
    }
}

wayland_client::delegate_noop!(Context: ignore ZxdgOutputManagerV1);

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(width: i32, virt_rotated_width: i32) -> OutputMetrics {
        OutputMetrics {
            width,
            height: 1080,
            virt_width: virt_rotated_width,
            virt_height: 1080,
            virt_rotated_width,
            virt_rotated_height: 1080,
            ..Default::default()
        }
    }

    #[test]
    fn aura_scale_enum_is_milli_scale() {
        assert_eq!(aura_scale_factor_to_f64(1000), 1.0);
        assert_eq!(aura_scale_factor_to_f64(1250), 1.25);
        assert_eq!(aura_scale_factor_to_f64(500), 0.5);
    }

    #[test]
    fn quarter_turn_transforms_swap_dimensions() {
        assert_eq!(apply_rotation(0, 1920, 1080), (1920, 1080));
        assert_eq!(apply_rotation(2, 1920, 1080), (1920, 1080));
        assert_eq!(apply_rotation(1, 1920, 1080), (1080, 1920));
        assert_eq!(apply_rotation(3, 1920, 1080), (1080, 1920));
        assert_eq!(apply_rotation(5, 1920, 1080), (1080, 1920));
    }

    #[test]
    fn row_is_prefix_sum_of_rotated_widths() {
        let mut outputs = vec![sized(1920, 1920), sized(2560, 2560), sized(800, 800)];
        reflow_row(outputs.iter_mut());
        assert_eq!(outputs[0].virt_x, 0);
        assert_eq!(outputs[1].virt_x, 1920);
        assert_eq!(outputs[2].virt_x, 1920 + 2560);
    }

    #[test]
    fn removal_reflows_remaining_outputs() {
        let mut outputs = vec![sized(1920, 1920), sized(2560, 2560), sized(800, 800)];
        reflow_row(outputs.iter_mut());
        outputs.remove(1);
        reflow_row(outputs.iter_mut());
        assert_eq!(outputs[0].virt_x, 0);
        assert_eq!(outputs[1].virt_x, 1920);
        assert!(outputs[1].needs_update);
    }

    #[test]
    fn unchanged_outputs_are_not_marked() {
        let mut outputs = vec![sized(1920, 1920), sized(800, 800)];
        reflow_row(outputs.iter_mut());
        for o in &mut outputs {
            o.needs_update = false;
        }
        reflow_row(outputs.iter_mut());
        assert!(outputs.iter().all(|o| !o.needs_update));
    }

    #[test]
    fn wayland_mode_applies_combined_scale() {
        // 1920x1080 at aura current scale 1.5, device scale 1.0,
        // ctx scale 1.0: guests see 1280x720 with output scale 1... the
        // host applies 1.5, so s = min(ceil(1.5), 2) = 2 and the mode is
        // upscaled accordingly.
        let metrics = OutputMetrics {
            width: 1920,
            height: 1080,
            physical_width: 500,
            physical_height: 280,
            current_scale: 1500,
            ..Default::default()
        };
        let (scale, _, _, w, h) = host_output_state(&metrics, 1.0, false, true, &[]);
        assert_eq!(scale, 2);
        assert_eq!((w, h), (2560, 1440));
    }

    #[test]
    fn x11_mode_reports_scale_one_and_synthesises_density() {
        let metrics = OutputMetrics {
            width: 1920,
            height: 1080,
            physical_width: 500,
            physical_height: 280,
            device_scale_factor: 1250,
            current_scale: 1000,
            ..Default::default()
        };
        let (scale, pw, ph, w, h) = host_output_state(&metrics, 1.0, true, true, &[]);
        assert_eq!(scale, 1);
        assert_eq!((w, h), (1536, 864));
        // 96 * 1.25 = 120 dpi target.
        assert_eq!(pw, dpi_to_physical_mm(120.0, w));
        assert_eq!(ph, dpi_to_physical_mm(120.0, h));
    }

    #[test]
    fn nearest_dpi_bucket_wins() {
        let metrics = OutputMetrics {
            width: 1920,
            height: 1080,
            physical_width: 480,
            physical_height: 270,
            ..Default::default()
        };
        // Target dpi is 1920*25.4/480 ≈ 101.6; nearest of the buckets is 96.
        let (_, pw, _, w, _) = host_output_state(&metrics, 1.0, false, false, &[72, 96, 160]);
        assert_eq!(pw, dpi_to_physical_mm(96.0, w));
    }

    #[test]
    fn direct_mode_scales_follow_internal_output() {
        let mut scale = ScaleState::new(0.5, true, false);
        let mut metrics = OutputMetrics {
            width: 3840,
            height: 2160,
            logical_width: 1600,
            logical_height: 900,
            internal: true,
            ..Default::default()
        };
        calculate_virtual_dimensions(&mut scale, false, true, &[], &mut metrics, None);
        assert_eq!((metrics.virt_width, metrics.virt_height), (1920, 1080));
        assert_eq!(metrics.virt_scale_x, 0.5);
        assert_eq!(metrics.xdg_scale_x, 1920.0 / 1600.0);
        assert_eq!(scale.xdg_scale_x, metrics.xdg_scale_x);
        assert_eq!(scale.virt_scale_y, metrics.virt_scale_y);
    }
}
