//! Process-wide state.
//!
//! [`Context`] owns both protocol connections, every proxied entity and the
//! configuration. It is the dispatch state type for the host event queue,
//! the guest display and every calloop source, so all mutation happens from
//! event-loop callbacks on the single thread running the loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use calloop::LoopHandle;
use wayland_client::protocol::wl_compositor::WlCompositor;
use wayland_client::protocol::wl_data_device_manager::WlDataDeviceManager;
use wayland_client::protocol::wl_registry::WlRegistry;
use wayland_client::protocol::wl_shm::WlShm;
use wayland_client::protocol::wl_subcompositor::WlSubcompositor;
use wayland_client::{Connection, QueueHandle};
use wayland_protocols::wp::fractional_scale::v1::client::wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1;
use wayland_protocols::wp::idle_inhibit::zv1::client::zwp_idle_inhibit_manager_v1::ZwpIdleInhibitManagerV1;
use wayland_protocols::wp::linux_dmabuf::zv1::client::zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1;
use wayland_protocols::wp::linux_explicit_synchronization::zv1::client::zwp_linux_explicit_synchronization_v1::ZwpLinuxExplicitSynchronizationV1;
use wayland_protocols::wp::pointer_constraints::zv1::client::zwp_pointer_constraints_v1::ZwpPointerConstraintsV1;
use wayland_protocols::wp::relative_pointer::zv1::client::zwp_relative_pointer_manager_v1::ZwpRelativePointerManagerV1;
use wayland_protocols::wp::text_input::zv1::client::zwp_text_input_manager_v1::ZwpTextInputManagerV1;
use wayland_protocols::wp::viewporter::client::wp_viewporter::WpViewporter;
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase;
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_manager_v1::ZxdgOutputManagerV1;
use wayland_server::backend::{ClientData, ClientId, DisconnectReason, GlobalId, ObjectId};
use wayland_server::DisplayHandle;

use exo_protocols::aura_shell::v38::client::zaura_shell::ZauraShell;
use exo_protocols::keyboard_extension::v1::client::zcr_keyboard_extension_v1::ZcrKeyboardExtensionV1;
use exo_protocols::stylus::v2::client::zcr_stylus_v2::ZcrStylusV2;

use crate::compositor::Surface;
use crate::config::Config;
use crate::data_device::SelectionState;
use crate::output::Output;
use crate::seat::Seat;
use crate::transform::{ScaleState, SurfaceScale};
use crate::xwm::Xwm;

/// Pairing cell from a host-side object back to its guest resource.
///
/// Filled right after both halves of the pair exist; every event dispatch
/// re-checks liveness through it instead of holding a raw reference.
pub type Paired<T> = Arc<std::sync::OnceLock<T>>;

/// A global advertised by the host registry.
#[derive(Debug, Clone)]
pub struct HostGlobal {
    /// Registry name.
    pub name: u32,
    /// Interface name.
    pub interface: String,
    /// Advertised version.
    pub version: u32,
}

/// Per-client data attached to every guest client.
///
/// Auxiliary clients are connections sommelier creates itself (e.g. to give
/// an X11 input-method library a Wayland connection); they only see a
/// minimal subset of globals.
#[derive(Debug, Default)]
pub struct GuestClient {
    /// Restrict the registry to the input-method subset.
    pub auxiliary: bool,
}

impl ClientData for GuestClient {
    fn initialized(&self, _client_id: ClientId) {}
    fn disconnected(&self, _client_id: ClientId, _reason: DisconnectReason) {}
}

/// Process-wide state; the dispatch target of every callback.
pub struct Context {
    /// Validated configuration.
    pub config: Config,
    /// Context-level scale factors.
    pub scale: ScaleState,

    /// Connection to the host compositor.
    pub connection: Connection,
    /// Handle of the host event queue.
    pub qh: QueueHandle<Context>,
    /// Handle of the guest-facing display.
    pub display_handle: DisplayHandle,
    /// Handle of the event loop, used to register pipe and timer sources
    /// from within callbacks.
    pub loop_handle: LoopHandle<'static, Context>,

    /// Host registry proxy.
    pub registry: Option<WlRegistry>,
    /// Globals the host has advertised.
    pub host_globals: Vec<HostGlobal>,
    /// Guest-facing globals created so far, by interface name.
    pub guest_globals: HashMap<String, GlobalId>,

    /// Host wl_compositor and its bound version.
    pub compositor: Option<(WlCompositor, u32)>,
    /// Host wl_subcompositor.
    pub subcompositor: Option<WlSubcompositor>,
    /// Host wl_shm.
    pub shm: Option<WlShm>,
    /// Formats announced by host wl_shm.
    pub shm_formats: Vec<u32>,
    /// Host data device manager and its bound version.
    pub data_device_manager: Option<(WlDataDeviceManager, u32)>,
    /// Host xdg_wm_base and its bound version.
    pub xdg_wm_base: Option<(XdgWmBase, u32)>,
    /// Host viewporter.
    pub viewporter: Option<WpViewporter>,
    /// Host aura shell and its bound version.
    pub aura_shell: Option<(ZauraShell, u32)>,
    /// Host xdg output manager.
    pub xdg_output_manager: Option<ZxdgOutputManagerV1>,
    /// Host linux-dmabuf and its bound version.
    pub linux_dmabuf: Option<(ZwpLinuxDmabufV1, u32)>,
    /// Format/modifier pairs announced by host linux-dmabuf.
    pub dmabuf_formats: Vec<(u32, u64)>,
    /// Host relative pointer manager.
    pub relative_pointer_manager: Option<ZwpRelativePointerManagerV1>,
    /// Host pointer constraints.
    pub pointer_constraints: Option<ZwpPointerConstraintsV1>,
    /// Host idle inhibit manager.
    pub idle_inhibit_manager: Option<ZwpIdleInhibitManagerV1>,
    /// Host fractional scale manager.
    pub fractional_scale_manager: Option<WpFractionalScaleManagerV1>,
    /// Host explicit synchronization.
    pub explicit_sync: Option<ZwpLinuxExplicitSynchronizationV1>,
    /// Host text input manager.
    pub text_input_manager: Option<ZwpTextInputManagerV1>,
    /// Host stylus manager.
    pub stylus_manager: Option<ZcrStylusV2>,
    /// Host keyboard extension.
    pub keyboard_extension: Option<ZcrKeyboardExtensionV1>,

    /// Host outputs, sorted by host X position.
    pub outputs: Vec<Output>,
    /// Host seats.
    pub seats: Vec<Seat>,
    /// Guest surfaces by resource id.
    pub surfaces: HashMap<ObjectId, Surface>,

    /// Clipboard bridge state on the Wayland side.
    pub selection: SelectionState,

    /// xkb context used to compile host keymaps.
    pub xkb_context: xkbcommon::xkb::Context,

    /// X11 window manager, present in X11 mode once Xwayland is up.
    pub xwm: Option<Xwm>,
    /// X11 window holding host focus.
    pub host_focus_window: Option<u32>,
    /// The X11 input focus must be updated on the next chance.
    pub needs_set_input_focus: bool,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("outputs", &self.outputs.len())
            .field("seats", &self.seats.len())
            .field("surfaces", &self.surfaces.len())
            .field("x11", &self.xwm.is_some())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create the context around freshly opened connections. Registry
    /// population and global advertisement happen on the first roundtrip.
    pub fn new(
        config: Config,
        connection: Connection,
        qh: QueueHandle<Context>,
        display_handle: DisplayHandle,
        loop_handle: LoopHandle<'static, Context>,
    ) -> Context {
        let scale = ScaleState::new(config.scale, config.direct_scale, config.stable_scaling);
        Context {
            config,
            scale,
            connection,
            qh,
            display_handle,
            loop_handle,
            registry: None,
            host_globals: Vec::new(),
            guest_globals: HashMap::new(),
            compositor: None,
            subcompositor: None,
            shm: None,
            shm_formats: Vec::new(),
            data_device_manager: None,
            xdg_wm_base: None,
            viewporter: None,
            aura_shell: None,
            xdg_output_manager: None,
            linux_dmabuf: None,
            dmabuf_formats: Vec::new(),
            relative_pointer_manager: None,
            pointer_constraints: None,
            idle_inhibit_manager: None,
            fractional_scale_manager: None,
            explicit_sync: None,
            text_input_manager: None,
            stylus_manager: None,
            keyboard_extension: None,
            outputs: Vec::new(),
            seats: Vec::new(),
            surfaces: HashMap::new(),
            selection: SelectionState::default(),
            xkb_context: xkbcommon::xkb::Context::new(xkbcommon::xkb::CONTEXT_NO_FLAGS),
            xwm: None,
            host_focus_window: None,
            needs_set_input_focus: false,
        }
    }

    /// Flush both directions of the proxy.
    pub fn flush(&mut self) {
        if let Err(err) = self.connection.flush() {
            log::warn!("flushing host connection failed: {}", err);
        }
        self.display_handle.flush_clients().ok();
    }

    /// Flatten the scale factors relevant for `surface` into a by-value
    /// view, resolving the cached output and the window viewport override
    /// through the current lists rather than stored pointers.
    pub fn surface_scale_view(&self, surface_id: &ObjectId) -> SurfaceScale {
        let Some(surface) = self.surfaces.get(surface_id) else {
            return SurfaceScale::default();
        };
        let output_xdg_scale = surface
            .output
            .and_then(|name| self.outputs.iter().find(|o| o.name == name))
            .map(|o| (o.metrics.xdg_scale_x, o.metrics.xdg_scale_y));
        let viewport_pointer_scale = surface
            .window
            .and_then(|wid| self.xwm.as_ref()?.find_window(wid))
            .filter(|w| w.viewport_override)
            .map(|w| w.viewport_pointer_scale);
        SurfaceScale {
            has_own_scale: surface.scale.has_own_scale,
            xdg_scale_x: surface.scale.xdg_scale_x,
            xdg_scale_y: surface.scale.xdg_scale_y,
            round_on_x: surface.scale.round_on_x,
            round_on_y: surface.scale.round_on_y,
            output_xdg_scale,
            viewport_pointer_scale,
        }
    }

    /// Look up a guest surface owned by the Xwayland client by protocol id,
    /// as carried in `_NET_WM_SURFACE_ID` client messages.
    pub fn surface_by_protocol_id(&self, protocol_id: u32) -> Option<&ObjectId> {
        self.surfaces
            .iter()
            .find(|(id, _)| id.protocol_id() == protocol_id)
            .map(|(id, _)| id)
    }

    /// The serial of the most recent input event on any seat, used when
    /// issuing host requests that demand one.
    pub fn last_seat_serial(&self) -> u32 {
        self.seats.iter().map(|s| s.last_serial).max().unwrap_or(0)
    }

    /// Metric views of all outputs in host-X order, for position
    /// transforms.
    pub fn output_metrics(&self) -> Vec<&crate::output::OutputMetrics> {
        self.outputs.iter().map(|o| &o.metrics).collect()
    }
}

/// Create the client data for a regular guest client.
pub fn guest_client_data() -> Arc<GuestClient> {
    Arc::new(GuestClient::default())
}
