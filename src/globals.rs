//! Host registry tracking and guest global advertisement.
//!
//! Every interesting host global is bound on appearance; the corresponding
//! guest-facing global is advertised with version
//! `min(host_version, sommelier_supported)`. wayland-server further clamps
//! each binding to the version the client requested.
//!
//! Auxiliary guest clients (connections sommelier creates itself, e.g. for
//! an X11 input-method library) only see the input-method subset of
//! globals; everything else is filtered from their registry.

use wayland_client::protocol::wl_compositor::WlCompositor as CWlCompositor;
use wayland_client::protocol::wl_data_device_manager::WlDataDeviceManager as CWlDataDeviceManager;
use wayland_client::protocol::wl_registry::{self, WlRegistry};
use wayland_client::protocol::wl_seat::WlSeat as CWlSeat;
use wayland_client::protocol::wl_shm::WlShm as CWlShm;
use wayland_client::protocol::wl_subcompositor::WlSubcompositor as CWlSubcompositor;
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle};
use wayland_server::{Client, Resource};

use wayland_protocols::wp::fractional_scale::v1::client::wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1 as CFractionalScaleManager;
use wayland_protocols::wp::idle_inhibit::zv1::client::zwp_idle_inhibit_manager_v1::ZwpIdleInhibitManagerV1 as CIdleInhibitManager;
use wayland_protocols::wp::linux_dmabuf::zv1::client::zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1 as CLinuxDmabuf;
use wayland_protocols::wp::linux_explicit_synchronization::zv1::client::zwp_linux_explicit_synchronization_v1::ZwpLinuxExplicitSynchronizationV1 as CExplicitSync;
use wayland_protocols::wp::pointer_constraints::zv1::client::zwp_pointer_constraints_v1::ZwpPointerConstraintsV1 as CPointerConstraints;
use wayland_protocols::wp::relative_pointer::zv1::client::zwp_relative_pointer_manager_v1::ZwpRelativePointerManagerV1 as CRelativePointerManager;
use wayland_protocols::wp::text_input::zv1::client::zwp_text_input_manager_v1::ZwpTextInputManagerV1 as CTextInputManager;
use wayland_protocols::wp::viewporter::client::wp_viewporter::WpViewporter as CWpViewporter;
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase as CXdgWmBase;
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_manager_v1::ZxdgOutputManagerV1 as CXdgOutputManager;

use exo_protocols::aura_shell::v38::client::zaura_shell::ZauraShell as CZauraShell;
use exo_protocols::keyboard_extension::v1::client::zcr_keyboard_extension_v1::ZcrKeyboardExtensionV1 as CKeyboardExtension;
use exo_protocols::stylus::v2::client::zcr_stylus_v2::ZcrStylusV2 as CStylus;

use crate::context::{Context, GuestClient, HostGlobal};
use crate::output::{Output, OutputMetrics};

/// Highest wl_compositor version advertised to guests.
pub const WL_COMPOSITOR_VERSION: u32 = 3;
/// Highest wl_seat version advertised to guests.
pub const WL_SEAT_VERSION: u32 = 5;
/// Highest xdg_wm_base version advertised to guests.
pub const XDG_WM_BASE_VERSION: u32 = 3;
/// Highest zwp_linux_dmabuf version advertised to guests.
pub const LINUX_DMABUF_VERSION: u32 = 3;
/// Highest zaura_shell version bound on the host.
pub const AURA_SHELL_VERSION: u32 = 38;
/// Highest wl_data_device_manager version advertised to guests.
pub const DATA_DEVICE_MANAGER_VERSION: u32 = 3;
/// Highest wl_drm version of the synthesised shim global.
pub const WL_DRM_VERSION: u32 = 2;

/// Interfaces visible to auxiliary clients.
const AUX_GLOBAL_ALLOWLIST: &[&str] = &[
    "wl_seat",
    "zwp_text_input_manager_v1",
    "zcr_text_input_extension_v1",
    "zcr_text_input_crostini_manager_v1",
    "zcr_text_input_x11_v1",
];

/// Per-global data of guest-facing globals.
#[derive(Debug, Clone, Copy)]
pub struct GlobalData {
    /// Visible to auxiliary clients.
    pub aux_visible: bool,
}

impl GlobalData {
    /// Data for an interface, consulting the auxiliary allowlist.
    pub fn for_interface(interface: &str) -> GlobalData {
        GlobalData { aux_visible: AUX_GLOBAL_ALLOWLIST.contains(&interface) }
    }
}

/// Global filter shared by every guest-facing global.
pub fn allowed_for_client(client: &Client, aux_visible: bool) -> bool {
    if aux_visible {
        return true;
    }
    !client.get_data::<GuestClient>().is_some_and(|d| d.auxiliary)
}

impl Context {
    fn advertise<I>(&mut self, interface: &str, version: u32)
    where
        I: Resource + 'static,
        Context: wayland_server::GlobalDispatch<I, GlobalData>,
    {
        if self.guest_globals.contains_key(interface) {
            return;
        }
        let data = GlobalData::for_interface(interface);
        let id = self.display_handle.create_global::<Context, I, GlobalData>(version, data);
        self.guest_globals.insert(interface.to_owned(), id);
    }

    /// Bind a host global of interest and mirror it to guests.
    fn host_global(&mut self, registry: &WlRegistry, name: u32, interface: &str, version: u32) {
        use wayland_server::protocol as s;

        let qh = self.qh.clone();
        match interface {
            "wl_compositor" => {
                let bound = version.min(4);
                let proxy = registry.bind::<CWlCompositor, _, Context>(name, bound, &qh, ());
                self.compositor = Some((proxy, bound));
                self.advertise::<s::wl_compositor::WlCompositor>(
                    "wl_compositor",
                    version.min(WL_COMPOSITOR_VERSION),
                );
            }
            "wl_subcompositor" => {
                let proxy = registry.bind::<CWlSubcompositor, _, Context>(name, 1, &qh, ());
                self.subcompositor = Some(proxy);
                self.advertise::<s::wl_subcompositor::WlSubcompositor>("wl_subcompositor", 1);
            }
            "wl_shm" => {
                let proxy = registry.bind::<CWlShm, _, Context>(name, 1, &qh, ());
                self.shm = Some(proxy);
                self.advertise::<s::wl_shm::WlShm>("wl_shm", 1);
            }
            "wl_seat" => {
                let bound = version.min(WL_SEAT_VERSION);
                let proxy = registry.bind::<CWlSeat, _, Context>(name, bound, &qh, name);
                crate::seat::add_seat(self, name, proxy, bound);
            }
            "wl_output" => {
                let bound = version.min(crate::output::WL_OUTPUT_VERSION);
                let proxy = registry.bind::<wayland_client::protocol::wl_output::WlOutput, _, Context>(
                    name, bound, &qh, name,
                );
                let internal = self.outputs.is_empty();
                let metrics = OutputMetrics { internal, ..Default::default() };
                let global = self.display_handle.create_global::<Context, s::wl_output::WlOutput, _>(
                    bound,
                    crate::output::OutputGlobalData { name },
                );
                self.outputs.push(Output {
                    name,
                    host: proxy,
                    aura: None,
                    xdg: None,
                    global: Some(global),
                    bindings: Vec::new(),
                    aura_bindings: Vec::new(),
                    metrics,
                });
                let index = self.outputs.len() - 1;
                self.extend_output(index, &qh);
            }
            "xdg_wm_base" => {
                let bound = version.min(XDG_WM_BASE_VERSION);
                let proxy = registry.bind::<CXdgWmBase, _, Context>(name, bound, &qh, ());
                self.xdg_wm_base = Some((proxy, bound));
                self.advertise::<wayland_protocols::xdg::shell::server::xdg_wm_base::XdgWmBase>(
                    "xdg_wm_base",
                    bound,
                );
            }
            "wp_viewporter" => {
                let proxy = registry.bind::<CWpViewporter, _, Context>(name, 1, &qh, ());
                self.viewporter = Some(proxy);
                self.advertise::<wayland_protocols::wp::viewporter::server::wp_viewporter::WpViewporter>(
                    "wp_viewporter",
                    1,
                );
            }
            "zaura_shell" => {
                let bound = version.min(AURA_SHELL_VERSION);
                let proxy = registry.bind::<CZauraShell, _, Context>(name, bound, &qh, ());
                self.aura_shell = Some((proxy, bound));
                for index in 0..self.outputs.len() {
                    self.extend_output(index, &qh);
                }
                self.advertise::<exo_protocols::aura_shell::v38::server::zaura_shell::ZauraShell>(
                    "zaura_shell",
                    bound,
                );
            }
            "zxdg_output_manager_v1" => {
                let bound = version.min(3);
                let proxy = registry.bind::<CXdgOutputManager, _, Context>(name, bound, &qh, ());
                self.xdg_output_manager = Some(proxy);
                for index in 0..self.outputs.len() {
                    self.extend_output(index, &qh);
                }
            }
            "wl_data_device_manager" => {
                let bound = version.min(DATA_DEVICE_MANAGER_VERSION);
                let proxy = registry.bind::<CWlDataDeviceManager, _, Context>(name, bound, &qh, ());
                self.data_device_manager = Some((proxy, bound));
                self.advertise::<s::wl_data_device_manager::WlDataDeviceManager>(
                    "wl_data_device_manager",
                    bound,
                );
                crate::data_device::ensure_selection_data_device(self);
            }
            "zwp_linux_dmabuf_v1" => {
                let bound = version.min(LINUX_DMABUF_VERSION);
                let proxy = registry.bind::<CLinuxDmabuf, _, Context>(name, bound, &qh, ());
                self.linux_dmabuf = Some((proxy, bound));
                if self.config.enable_linux_dmabuf {
                    self.advertise::<wayland_protocols::wp::linux_dmabuf::zv1::server::zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1>(
                        "zwp_linux_dmabuf_v1",
                        bound,
                    );
                    // The wl_drm shim rides on dmabuf support.
                    self.advertise::<wl_drm::server::wl_drm::WlDrm>("wl_drm", WL_DRM_VERSION);
                }
            }
            "zwp_relative_pointer_manager_v1" => {
                let proxy = registry.bind::<CRelativePointerManager, _, Context>(name, 1, &qh, ());
                self.relative_pointer_manager = Some(proxy);
                self.advertise::<wayland_protocols::wp::relative_pointer::zv1::server::zwp_relative_pointer_manager_v1::ZwpRelativePointerManagerV1>(
                    "zwp_relative_pointer_manager_v1",
                    1,
                );
            }
            "zwp_pointer_constraints_v1" => {
                let proxy = registry.bind::<CPointerConstraints, _, Context>(name, 1, &qh, ());
                self.pointer_constraints = Some(proxy);
                self.advertise::<wayland_protocols::wp::pointer_constraints::zv1::server::zwp_pointer_constraints_v1::ZwpPointerConstraintsV1>(
                    "zwp_pointer_constraints_v1",
                    1,
                );
            }
            "zwp_idle_inhibit_manager_v1" => {
                let proxy = registry.bind::<CIdleInhibitManager, _, Context>(name, 1, &qh, ());
                self.idle_inhibit_manager = Some(proxy);
                self.advertise::<wayland_protocols::wp::idle_inhibit::zv1::server::zwp_idle_inhibit_manager_v1::ZwpIdleInhibitManagerV1>(
                    "zwp_idle_inhibit_manager_v1",
                    1,
                );
            }
            "wp_fractional_scale_manager_v1" => {
                let proxy = registry.bind::<CFractionalScaleManager, _, Context>(name, 1, &qh, ());
                self.fractional_scale_manager = Some(proxy);
                self.advertise::<wayland_protocols::wp::fractional_scale::v1::server::wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1>(
                    "wp_fractional_scale_manager_v1",
                    1,
                );
            }
            "zwp_linux_explicit_synchronization_v1" => {
                let bound = version.min(2);
                let proxy = registry.bind::<CExplicitSync, _, Context>(name, bound, &qh, ());
                self.explicit_sync = Some(proxy);
                self.advertise::<wayland_protocols::wp::linux_explicit_synchronization::zv1::server::zwp_linux_explicit_synchronization_v1::ZwpLinuxExplicitSynchronizationV1>(
                    "zwp_linux_explicit_synchronization_v1",
                    bound,
                );
            }
            "zwp_text_input_manager_v1" => {
                let proxy = registry.bind::<CTextInputManager, _, Context>(name, 1, &qh, ());
                self.text_input_manager = Some(proxy);
                self.advertise::<wayland_protocols::wp::text_input::zv1::server::zwp_text_input_manager_v1::ZwpTextInputManagerV1>(
                    "zwp_text_input_manager_v1",
                    1,
                );
            }
            "zcr_stylus_v2" => {
                let bound = version.min(2);
                let proxy = registry.bind::<CStylus, _, Context>(name, bound, &qh, ());
                self.stylus_manager = Some(proxy);
                // Guests see pen input through the standard tablet protocol.
                self.advertise::<wayland_protocols::wp::tablet::zv2::server::zwp_tablet_manager_v2::ZwpTabletManagerV2>(
                    "zwp_tablet_manager_v2",
                    1,
                );
            }
            "zcr_keyboard_extension_v1" => {
                let proxy = registry.bind::<CKeyboardExtension, _, Context>(name, 1, &qh, ());
                self.keyboard_extension = Some(proxy);
            }
            _ => {}
        }
    }
}

impl ClientDispatch<WlRegistry, ()> for Context {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global { name, interface, version } => {
                log::debug!("host global {} v{} ({})", interface, version, name);
                state.host_globals.push(HostGlobal {
                    name,
                    interface: interface.clone(),
                    version,
                });
                state.host_global(registry, name, &interface, version);
            }
            wl_registry::Event::GlobalRemove { name } => {
                let Some(index) = state.host_globals.iter().position(|g| g.name == name) else {
                    return;
                };
                let global = state.host_globals.remove(index);
                log::debug!("host global removed: {} ({})", global.interface, name);
                match global.interface.as_str() {
                    "wl_output" => state.remove_output(name),
                    "wl_seat" => crate::seat::remove_seat(state, name),
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

// Host-side managers without events.
wayland_client::delegate_noop!(Context: ignore CWlCompositor);
wayland_client::delegate_noop!(Context: ignore CWlSubcompositor);
wayland_client::delegate_noop!(Context: ignore CWpViewporter);
wayland_client::delegate_noop!(Context: ignore CZauraShell);
wayland_client::delegate_noop!(Context: ignore CWlDataDeviceManager);
wayland_client::delegate_noop!(Context: ignore CRelativePointerManager);
wayland_client::delegate_noop!(Context: ignore CPointerConstraints);
wayland_client::delegate_noop!(Context: ignore CIdleInhibitManager);
wayland_client::delegate_noop!(Context: ignore CFractionalScaleManager);
wayland_client::delegate_noop!(Context: ignore CExplicitSync);
wayland_client::delegate_noop!(Context: ignore CTextInputManager);
wayland_client::delegate_noop!(Context: ignore CStylus);
wayland_client::delegate_noop!(Context: ignore CKeyboardExtension);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aux_allowlist_covers_input_methods_only() {
        assert!(GlobalData::for_interface("wl_seat").aux_visible);
        assert!(GlobalData::for_interface("zwp_text_input_manager_v1").aux_visible);
        assert!(GlobalData::for_interface("zcr_text_input_x11_v1").aux_visible);
        assert!(!GlobalData::for_interface("wl_compositor").aux_visible);
        assert!(!GlobalData::for_interface("wl_output").aux_visible);
        assert!(!GlobalData::for_interface("xdg_wm_base").aux_visible);
    }
}
