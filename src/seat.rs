//! wl_seat, wl_pointer, wl_keyboard and wl_touch adaptors.
//!
//! Pointer coordinates are translated into virtual space on the way to the
//! guest. Scroll deltas are accumulated per frame and bumped to the
//! discrete-scroll unit for X11 clients. The keyboard applies the host
//! keymap through xkb, deduplicates key state and swallows reserved
//! accelerator chords. Touch events are buffered in a recorder so whole
//! frames can be re-routed to the tablet protocol when a stylus is in
//! use.

use std::fmt;
use std::os::fd::AsFd;

use wayland_client::protocol::wl_keyboard::{self as c_wl_keyboard, WlKeyboard as CWlKeyboard};
use wayland_client::protocol::wl_pointer::{self as c_wl_pointer, WlPointer as CWlPointer};
use wayland_client::protocol::wl_seat::{self as c_wl_seat, WlSeat as CWlSeat};
use wayland_client::protocol::wl_surface::WlSurface as CWlSurface;
use wayland_client::protocol::wl_touch::{self as c_wl_touch, WlTouch as CWlTouch};
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle};
use wayland_server::backend::{ClientId, GlobalId, ObjectId};
use wayland_server::protocol::wl_keyboard::{self as s_wl_keyboard, WlKeyboard as SWlKeyboard};
use wayland_server::protocol::wl_pointer::{self as s_wl_pointer, WlPointer as SWlPointer};
use wayland_server::protocol::wl_seat::{self as s_wl_seat, WlSeat as SWlSeat};
use wayland_server::protocol::wl_touch::{self as s_wl_touch, WlTouch as SWlTouch};
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};
use xkbcommon::xkb;

use exo_protocols::keyboard_extension::v1::client::zcr_extended_keyboard_v1::{
    self as c_extended_keyboard, ZcrExtendedKeyboardV1 as CExtendedKeyboard,
};
use exo_protocols::stylus::v2::client::zcr_touch_stylus_v2::ZcrTouchStylusV2 as CTouchStylus;

use crate::config::{canonical_keysym, Accelerator, Modifiers};
use crate::context::Context;
use crate::touch_recorder::TouchRecorder;
use crate::transform;

/// Smooth-scroll units per discrete scroll tick in the X smooth scrolling
/// extension. Many X toolkits discard smaller deltas entirely.
pub const DISCRETE_SCROLL_UNIT: f64 = 5.0;

/// One guest pointer paired with a host pointer.
#[derive(Debug)]
pub struct Pointer {
    /// Guest resource.
    pub resource: SWlPointer,
    /// Host proxy.
    pub host: CWlPointer,
    /// Focused guest surface.
    pub focus_surface: Option<ObjectId>,
    /// Serial of the focus-changing event.
    pub focus_serial: u32,
    /// Timestamp of the last axis event.
    pub time: u32,
    /// Accumulated axis deltas, indexed by wl_pointer axis.
    pub axis_delta: [f64; 2],
    /// Accumulated discrete steps, indexed by wl_pointer axis.
    pub axis_discrete: [i32; 2],
}

/// One guest keyboard paired with a host keyboard.
pub struct Keyboard {
    /// Guest resource.
    pub resource: SWlKeyboard,
    /// Host proxy.
    pub host: CWlKeyboard,
    /// Extended-keyboard object for key acks, when negotiated.
    pub extended: Option<CExtendedKeyboard>,
    /// Focused guest surface.
    pub focus_surface: Option<ObjectId>,
    /// Compiled host keymap.
    pub keymap: Option<xkb::Keymap>,
    /// xkb state fed from modifier events.
    pub state: Option<xkb::State>,
    control_mask: xkb::ModMask,
    alt_mask: xkb::ModMask,
    shift_mask: xkb::ModMask,
    /// Current modifier set, cached for accelerator comparison.
    pub modifiers: Modifiers,
    /// Pressed-key set, deduplicating presses and orphan releases.
    pub pressed_keys: PressedKeys,
}

impl fmt::Debug for Keyboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyboard")
            .field("resource", &self.resource)
            .field("modifiers", &self.modifiers)
            .field("pressed_keys", &self.pressed_keys)
            .finish_non_exhaustive()
    }
}

/// One guest touch paired with a host touch.
#[derive(Debug)]
pub struct Touch {
    /// Guest resource.
    pub resource: SWlTouch,
    /// Host proxy.
    pub host: CWlTouch,
    /// Stylus extension object, when the host has one.
    pub stylus: Option<CTouchStylus>,
    /// Recorder buffering events until the next frame, keyed by host
    /// surface ids.
    pub recorder: TouchRecorder<wayland_client::backend::ObjectId>,
    /// Tool type per touch id, from stylus events.
    pub tools: Vec<(i32, crate::stylus::Tool)>,
    /// Latest force per touch id.
    pub force: Vec<(i32, f64)>,
    /// Focused guest surface (of the most recent down).
    pub focus_surface: Option<ObjectId>,
}

/// One host seat with everything derived from it.
#[derive(Debug)]
pub struct Seat {
    /// Host registry name.
    pub name: u32,
    /// Host proxy.
    pub host: CWlSeat,
    /// Bound host version.
    pub version: u32,
    /// Guest-facing global.
    pub global: Option<GlobalId>,
    /// Guest seat resources.
    pub bindings: Vec<SWlSeat>,
    /// Raw capability bits announced by the host.
    pub capabilities: u32,
    /// Serial of the most recent input event.
    pub last_serial: u32,
    /// Guest pointers.
    pub pointers: Vec<Pointer>,
    /// Guest keyboards.
    pub keyboards: Vec<Keyboard>,
    /// Guest touches.
    pub touches: Vec<Touch>,
    /// Tablet emulation state for this seat.
    pub stylus_tablet: Option<crate::stylus::StylusTablet>,
}

/// Pressed-key set. Presses of an already pressed key and releases of an
/// unpressed key are dropped so the guest never sees unbalanced state.
#[derive(Debug, Default)]
pub struct PressedKeys(Vec<u32>);

impl PressedKeys {
    /// Record a press; false if the key was already down.
    pub fn press(&mut self, key: u32) -> bool {
        if self.0.contains(&key) {
            return false;
        }
        self.0.push(key);
        true
    }

    /// Record a release; false if the key was not down.
    pub fn release(&mut self, key: u32) -> bool {
        match self.0.iter().position(|&k| k == key) {
            Some(index) => {
                self.0.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Replace the whole set, as on keyboard enter.
    pub fn reset(&mut self, keys: impl IntoIterator<Item = u32>) {
        self.0.clear();
        self.0.extend(keys);
    }

    /// Whether the key is currently down.
    pub fn contains(&self, key: u32) -> bool {
        self.0.contains(&key)
    }
}

/// Whether a key press with the given modifier state and keysym matches a
/// reserved accelerator chord.
pub fn matches_accelerator(
    accelerators: &[Accelerator],
    modifiers: Modifiers,
    symbol: xkb::Keysym,
) -> bool {
    let lowered = canonical_keysym(symbol);
    accelerators.iter().any(|a| a.modifiers == modifiers && a.symbol == lowered)
}

/// Bump a per-frame scroll delta to the discrete unit for X11 clients, so
/// toolkits that round to scroll ticks never see a scroll go missing.
pub fn bump_axis_delta(delta: f64, discrete: i32, x11: bool) -> f64 {
    if discrete != 0 && x11 && delta.abs() < DISCRETE_SCROLL_UNIT {
        DISCRETE_SCROLL_UNIT.copysign(delta)
    } else {
        delta
    }
}

/// Per-global data of the guest seat global.
#[derive(Debug, Clone, Copy)]
pub struct SeatGlobalData {
    /// Host registry name of the seat.
    pub name: u32,
}

/// Track a new host seat and advertise it to guests.
pub fn add_seat(state: &mut Context, name: u32, host: CWlSeat, version: u32) {
    let global = state
        .display_handle
        .create_global::<Context, SWlSeat, _>(version, SeatGlobalData { name });
    push_seat(state, name, host, version, global);
    crate::data_device::ensure_selection_data_device(state);
}

fn push_seat(state: &mut Context, name: u32, host: CWlSeat, version: u32, global: GlobalId) {
    state.seats.push(Seat {
        name,
        host,
        version,
        global: Some(global),
        bindings: Vec::new(),
        capabilities: 0,
        last_serial: 0,
        pointers: Vec::new(),
        keyboards: Vec::new(),
        touches: Vec::new(),
        stylus_tablet: None,
    });
}

/// A host seat disappeared.
pub fn remove_seat(state: &mut Context, name: u32) {
    if let Some(index) = state.seats.iter().position(|s| s.name == name) {
        let seat = state.seats.remove(index);
        if let Some(global) = seat.global {
            state.display_handle.remove_global::<Context>(global);
        }
        if seat.host.version() >= 5 {
            seat.host.release();
        }
    }
}

fn seat_mut<'a>(state: &'a mut Context, name: u32) -> Option<&'a mut Seat> {
    state.seats.iter_mut().find(|s| s.name == name)
}

/// The host pointer paired with a guest pointer resource.
pub fn host_pointer<'a>(state: &'a Context, resource: &SWlPointer) -> Option<&'a CWlPointer> {
    state
        .seats
        .iter()
        .flat_map(|s| s.pointers.iter())
        .find(|p| p.resource.id() == resource.id())
        .map(|p| &p.host)
}

/// The host seat paired with a guest seat resource.
pub fn host_seat<'a>(state: &'a Context, resource: &SWlSeat) -> Option<&'a CWlSeat> {
    let name = resource.data::<u32>()?;
    state.seats.iter().find(|s| s.name == *name).map(|s| &s.host)
}

fn mod_mask(keymap: &xkb::Keymap, name: &str) -> xkb::ModMask {
    // XKB_MOD_INVALID, when the keymap lacks the modifier.
    let index = keymap.mod_get_index(name);
    if index == u32::MAX {
        0
    } else {
        1 << index
    }
}

fn capability_bits(capabilities: u32) -> s_wl_seat::Capability {
    s_wl_seat::Capability::from_bits_truncate(capabilities)
}

impl GlobalDispatch<SWlSeat, SeatGlobalData> for Context {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<SWlSeat>,
        global_data: &SeatGlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let seat_resource = data_init.init(resource, global_data.name);
        if let Some(seat) = seat_mut(state, global_data.name) {
            seat_resource.capabilities(capability_bits(seat.capabilities));
            if seat_resource.version() >= 2 {
                seat_resource.name("default".to_owned());
            }
            seat.bindings.push(seat_resource);
        }
    }
}

impl Dispatch<SWlSeat, u32> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &SWlSeat,
        request: s_wl_seat::Request,
        data: &u32,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        let name = *data;
        let qh = state.qh.clone();
        let stylus_manager = state.stylus_manager.clone();
        let keyboard_extension = state.keyboard_extension.clone();
        let Some(seat) = seat_mut(state, name) else {
            return;
        };
        match request {
            s_wl_seat::Request::GetPointer { id } => {
                let resource = data_init.init(id, name);
                let host = seat.host.get_pointer(&qh, resource.clone());
                seat.pointers.push(Pointer {
                    resource,
                    host,
                    focus_surface: None,
                    focus_serial: 0,
                    time: 0,
                    axis_delta: [0.0; 2],
                    axis_discrete: [0; 2],
                });
            }
            s_wl_seat::Request::GetKeyboard { id } => {
                let resource = data_init.init(id, name);
                let host = seat.host.get_keyboard(&qh, resource.clone());
                let extended = keyboard_extension
                    .as_ref()
                    .map(|ext| ext.get_extended_keyboard(&host, &qh, ()));
                seat.keyboards.push(Keyboard {
                    resource,
                    host,
                    extended,
                    focus_surface: None,
                    keymap: None,
                    state: None,
                    control_mask: 0,
                    alt_mask: 0,
                    shift_mask: 0,
                    modifiers: Modifiers::empty(),
                    pressed_keys: PressedKeys::default(),
                });
            }
            s_wl_seat::Request::GetTouch { id } => {
                let resource = data_init.init(id, name);
                let host = seat.host.get_touch(&qh, resource.clone());
                let stylus = stylus_manager
                    .as_ref()
                    .map(|mgr| mgr.get_touch_stylus(&host, &qh, resource.clone()));
                seat.touches.push(Touch {
                    resource,
                    host,
                    stylus,
                    recorder: TouchRecorder::default(),
                    tools: Vec::new(),
                    force: Vec::new(),
                    focus_surface: None,
                });
            }
            s_wl_seat::Request::Release => {}
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &SWlSeat, data: &u32) {
        if let Some(seat) = seat_mut(state, *data) {
            seat.bindings.retain(|b| b.id() != resource.id());
        }
    }
}

impl Dispatch<SWlPointer, u32> for Context {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &SWlPointer,
        request: s_wl_pointer::Request,
        _data: &u32,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_pointer::Request::SetCursor { serial, surface, hotspot_x, hotspot_y } => {
                let (mut hx, mut hy) = (hotspot_x, hotspot_y);
                transform::guest_to_host(&state.scale, None, &mut hx, &mut hy);
                let host_surface = surface.as_ref().and_then(|s| s.data::<CWlSurface>());
                if let Some(surface) = &surface {
                    if let Some(s) = state.surfaces.get_mut(&surface.id()) {
                        s.has_role = true;
                    }
                }
                if let Some(pointer) = state
                    .seats
                    .iter()
                    .flat_map(|s| s.pointers.iter())
                    .find(|p| p.resource.id() == resource.id())
                {
                    pointer.host.set_cursor(serial, host_surface, hx, hy);
                }
            }
            s_wl_pointer::Request::Release => {}
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &SWlPointer, data: &u32) {
        if let Some(seat) = seat_mut(state, *data) {
            if let Some(index) =
                seat.pointers.iter().position(|p| p.resource.id() == resource.id())
            {
                let pointer = seat.pointers.remove(index);
                if pointer.host.version() >= 3 {
                    pointer.host.release();
                }
            }
        }
    }
}

impl Dispatch<SWlKeyboard, u32> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SWlKeyboard,
        request: s_wl_keyboard::Request,
        _data: &u32,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_keyboard::Request::Release => {}
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &SWlKeyboard, data: &u32) {
        if let Some(seat) = seat_mut(state, *data) {
            if let Some(index) =
                seat.keyboards.iter().position(|k| k.resource.id() == resource.id())
            {
                let keyboard = seat.keyboards.remove(index);
                if let Some(extended) = keyboard.extended {
                    extended.destroy();
                }
                if keyboard.host.version() >= 3 {
                    keyboard.host.release();
                }
            }
        }
    }
}

impl Dispatch<SWlTouch, u32> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &SWlTouch,
        request: s_wl_touch::Request,
        _data: &u32,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_wl_touch::Request::Release => {}
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, resource: &SWlTouch, data: &u32) {
        if let Some(seat) = seat_mut(state, *data) {
            if let Some(index) =
                seat.touches.iter().position(|t| t.resource.id() == resource.id())
            {
                let touch = seat.touches.remove(index);
                if let Some(stylus) = touch.stylus {
                    stylus.destroy();
                }
                if touch.host.version() >= 3 {
                    touch.host.release();
                }
            }
        }
    }
}

impl ClientDispatch<CWlSeat, u32> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CWlSeat,
        event: c_wl_seat::Event,
        data: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(seat) = seat_mut(state, *data) else {
            return;
        };
        match event {
            c_wl_seat::Event::Capabilities { capabilities } => {
                let raw = match capabilities {
                    wayland_client::WEnum::Value(c) => c.bits(),
                    wayland_client::WEnum::Unknown(v) => v,
                };
                seat.capabilities = raw;
                for binding in &seat.bindings {
                    binding.capabilities(capability_bits(raw));
                }
            }
            c_wl_seat::Event::Name { name } => {
                for binding in seat.bindings.iter().filter(|b| b.version() >= 2) {
                    binding.name(name.clone());
                }
            }
            _ => {}
        }
    }
}

fn guest_surface_for_host(state: &Context, host: &CWlSurface) -> Option<ObjectId> {
    state
        .surfaces
        .iter()
        .find(|(_, s)| s.host.id() == host.id())
        .map(|(id, _)| id.clone())
}

fn note_event_serial(state: &mut Context, surface_id: &ObjectId, serial: u32) {
    if let Some(surface) = state.surfaces.get_mut(surface_id) {
        surface.last_event_serial = serial;
    }
}

impl ClientDispatch<CWlPointer, SWlPointer> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CWlPointer,
        event: c_wl_pointer::Event,
        data: &SWlPointer,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let seat_name = data.data::<u32>().copied().unwrap_or(0);
        match event {
            c_wl_pointer::Event::Enter { serial, surface, surface_x, surface_y } => {
                let Some(surface_id) = guest_surface_for_host(state, &surface) else {
                    return;
                };
                let view = state.surface_scale_view(&surface_id);
                let (mut x, mut y) = (surface_x, surface_y);
                transform::host_to_guest_fixed(&state.scale, Some(&view), &mut x, &mut y);
                let guest_surface =
                    state.surfaces.get(&surface_id).map(|s| s.resource.clone());
                let Some(guest_surface) = guest_surface else { return };
                if data.is_alive() {
                    data.enter(serial, &guest_surface, x, y);
                }
                note_event_serial(state, &surface_id, serial);
                if let Some(seat) = seat_mut(state, seat_name) {
                    seat.last_serial = serial;
                    if let Some(pointer) =
                        seat.pointers.iter_mut().find(|p| p.resource.id() == data.id())
                    {
                        pointer.focus_surface = Some(surface_id);
                        pointer.focus_serial = serial;
                    }
                }
            }
            c_wl_pointer::Event::Leave { serial, surface } => {
                if let Some(surface_id) = guest_surface_for_host(state, &surface) {
                    if let Some(guest_surface) =
                        state.surfaces.get(&surface_id).map(|s| s.resource.clone())
                    {
                        if data.is_alive() {
                            data.leave(serial, &guest_surface);
                        }
                    }
                }
                if let Some(seat) = seat_mut(state, seat_name) {
                    if let Some(pointer) =
                        seat.pointers.iter_mut().find(|p| p.resource.id() == data.id())
                    {
                        pointer.focus_surface = None;
                    }
                }
            }
            c_wl_pointer::Event::Motion { time, surface_x, surface_y } => {
                let focus = seat_mut(state, seat_name)
                    .and_then(|s| {
                        s.pointers.iter().find(|p| p.resource.id() == data.id())
                    })
                    .and_then(|p| p.focus_surface.clone());
                let view = focus
                    .as_ref()
                    .map(|id| state.surface_scale_view(id))
                    .unwrap_or_default();
                let (mut x, mut y) = (surface_x, surface_y);
                transform::pointer(&state.scale, Some(&view), &mut x, &mut y);
                if data.is_alive() {
                    data.motion(time, x, y);
                }
            }
            c_wl_pointer::Event::Button { serial, time, button, state: button_state } => {
                let raw_state = match button_state {
                    wayland_client::WEnum::Value(s) => s as u32,
                    wayland_client::WEnum::Unknown(v) => v,
                };
                if let Ok(button_state) = s_wl_pointer::ButtonState::try_from(raw_state) {
                    if data.is_alive() {
                        data.button(serial, time, button, button_state);
                    }
                }
                if let Some(seat) = seat_mut(state, seat_name) {
                    seat.last_serial = serial;
                    if let Some(pointer) =
                        seat.pointers.iter().find(|p| p.resource.id() == data.id())
                    {
                        if let Some(focus) = pointer.focus_surface.clone() {
                            note_event_serial(state, &focus, serial);
                        }
                    }
                }
            }
            c_wl_pointer::Event::Axis { time, axis, value } => {
                let axis_index = match axis {
                    wayland_client::WEnum::Value(c_wl_pointer::Axis::VerticalScroll) => 0,
                    wayland_client::WEnum::Value(c_wl_pointer::Axis::HorizontalScroll) => 1,
                    _ => return,
                };
                let mut value = value;
                transform::host_to_guest_fixed_axis(
                    &state.scale,
                    None,
                    &mut value,
                    axis_index as u32,
                );
                if let Some(seat) = seat_mut(state, seat_name) {
                    if let Some(pointer) =
                        seat.pointers.iter_mut().find(|p| p.resource.id() == data.id())
                    {
                        pointer.time = time;
                        pointer.axis_delta[axis_index] += value;
                    }
                }
            }
            c_wl_pointer::Event::AxisDiscrete { axis, discrete } => {
                let axis_index = match axis {
                    wayland_client::WEnum::Value(c_wl_pointer::Axis::VerticalScroll) => 0,
                    wayland_client::WEnum::Value(c_wl_pointer::Axis::HorizontalScroll) => 1,
                    _ => return,
                };
                if let Some(seat) = seat_mut(state, seat_name) {
                    if let Some(pointer) =
                        seat.pointers.iter_mut().find(|p| p.resource.id() == data.id())
                    {
                        pointer.axis_discrete[axis_index] += discrete;
                    }
                }
            }
            c_wl_pointer::Event::AxisSource { axis_source } => {
                let raw = match axis_source {
                    wayland_client::WEnum::Value(s) => s as u32,
                    wayland_client::WEnum::Unknown(v) => v,
                };
                if data.is_alive() && data.version() >= 5 {
                    if let Ok(source) = s_wl_pointer::AxisSource::try_from(raw) {
                        data.axis_source(source);
                    }
                }
            }
            c_wl_pointer::Event::AxisStop { time, axis } => {
                let raw = match axis {
                    wayland_client::WEnum::Value(a) => a as u32,
                    wayland_client::WEnum::Unknown(v) => v,
                };
                if data.is_alive() && data.version() >= 5 {
                    if let Ok(axis) = s_wl_pointer::Axis::try_from(raw) {
                        data.axis_stop(time, axis);
                    }
                }
            }
            c_wl_pointer::Event::Frame => {
                let x11 = state.config.x11;
                let Some(seat) = seat_mut(state, seat_name) else { return };
                let Some(pointer) =
                    seat.pointers.iter_mut().find(|p| p.resource.id() == data.id())
                else {
                    return;
                };
                for axis_index in 0..2 {
                    let axis = if axis_index == 0 {
                        s_wl_pointer::Axis::VerticalScroll
                    } else {
                        s_wl_pointer::Axis::HorizontalScroll
                    };
                    let discrete = pointer.axis_discrete[axis_index];
                    if discrete != 0 && pointer.resource.version() >= 5 {
                        pointer.resource.axis_discrete(axis, discrete);
                    }
                    let delta =
                        bump_axis_delta(pointer.axis_delta[axis_index], discrete, x11);
                    if delta != 0.0 {
                        pointer.resource.axis(pointer.time, axis, delta);
                    }
                    pointer.axis_delta[axis_index] = 0.0;
                    pointer.axis_discrete[axis_index] = 0;
                }
                if pointer.resource.version() >= 5 {
                    pointer.resource.frame();
                }
            }
            _ => {}
        }
    }
}

impl ClientDispatch<CWlKeyboard, SWlKeyboard> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CWlKeyboard,
        event: c_wl_keyboard::Event,
        data: &SWlKeyboard,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let seat_name = data.data::<u32>().copied().unwrap_or(0);
        match event {
            c_wl_keyboard::Event::Keymap { format, fd, size } => {
                let raw_format = match format {
                    wayland_client::WEnum::Value(f) => f as u32,
                    wayland_client::WEnum::Unknown(v) => v,
                };
                if data.is_alive() {
                    if let Ok(server_format) = s_wl_keyboard::KeymapFormat::try_from(raw_format)
                    {
                        data.keymap(server_format, fd.as_fd(), size);
                    }
                }
                if raw_format != c_wl_keyboard::KeymapFormat::XkbV1 as u32 {
                    return;
                }
                // Compile the keymap for accelerator matching. The mapping
                // is unmapped again as soon as compilation is done.
                let keymap = unsafe {
                    memmap2::MmapOptions::new()
                        .len(size as usize)
                        .map_copy_read_only(&fd)
                }
                .ok()
                .and_then(|mapping| {
                    let text = std::str::from_utf8(&mapping[..]).ok()?;
                    let text = text.trim_end_matches('\0');
                    xkb::Keymap::new_from_string(
                        &state.xkb_context,
                        text.to_owned(),
                        xkb::KEYMAP_FORMAT_TEXT_V1,
                        xkb::KEYMAP_COMPILE_NO_FLAGS,
                    )
                });
                let Some(keymap) = keymap else {
                    log::warn!("failed to compile host keymap");
                    return;
                };
                let Some(seat) = seat_mut(state, seat_name) else { return };
                let Some(keyboard) =
                    seat.keyboards.iter_mut().find(|k| k.resource.id() == data.id())
                else {
                    return;
                };
                keyboard.control_mask = mod_mask(&keymap, xkb::MOD_NAME_CTRL);
                keyboard.alt_mask = mod_mask(&keymap, xkb::MOD_NAME_ALT);
                keyboard.shift_mask = mod_mask(&keymap, xkb::MOD_NAME_SHIFT);
                keyboard.state = Some(xkb::State::new(&keymap));
                keyboard.keymap = Some(keymap);
            }
            c_wl_keyboard::Event::Enter { serial, surface, keys } => {
                let Some(surface_id) = guest_surface_for_host(state, &surface) else {
                    return;
                };
                let pressed: Vec<u32> = keys
                    .chunks_exact(4)
                    .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                let guest_surface =
                    state.surfaces.get(&surface_id).map(|s| s.resource.clone());
                let Some(guest_surface) = guest_surface else { return };
                if data.is_alive() {
                    data.enter(serial, &guest_surface, keys);
                }
                note_event_serial(state, &surface_id, serial);
                if let Some(seat) = seat_mut(state, seat_name) {
                    seat.last_serial = serial;
                    if let Some(keyboard) =
                        seat.keyboards.iter_mut().find(|k| k.resource.id() == data.id())
                    {
                        keyboard.focus_surface = Some(surface_id);
                        keyboard.pressed_keys.reset(pressed);
                    }
                }
            }
            c_wl_keyboard::Event::Leave { serial, surface } => {
                if let Some(surface_id) = guest_surface_for_host(state, &surface) {
                    if let Some(guest_surface) =
                        state.surfaces.get(&surface_id).map(|s| s.resource.clone())
                    {
                        if data.is_alive() {
                            data.leave(serial, &guest_surface);
                        }
                    }
                }
                if let Some(seat) = seat_mut(state, seat_name) {
                    if let Some(keyboard) =
                        seat.keyboards.iter_mut().find(|k| k.resource.id() == data.id())
                    {
                        keyboard.focus_surface = None;
                        keyboard.pressed_keys.reset([]);
                    }
                }
            }
            c_wl_keyboard::Event::Key { serial, time, key, state: key_state } => {
                handle_key(state, data, seat_name, serial, time, key, key_state);
            }
            c_wl_keyboard::Event::Modifiers {
                serial,
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
            } => {
                if data.is_alive() {
                    data.modifiers(serial, mods_depressed, mods_latched, mods_locked, group);
                }
                let Some(seat) = seat_mut(state, seat_name) else { return };
                seat.last_serial = serial;
                let Some(keyboard) =
                    seat.keyboards.iter_mut().find(|k| k.resource.id() == data.id())
                else {
                    return;
                };
                let Some(xkb_state) = keyboard.state.as_mut() else { return };
                xkb_state.update_mask(mods_depressed, mods_latched, mods_locked, 0, 0, group);
                let mask = xkb_state
                    .serialize_mods(xkb::STATE_MODS_DEPRESSED | xkb::STATE_MODS_LATCHED);
                let mut modifiers = Modifiers::empty();
                if mask & keyboard.control_mask != 0 {
                    modifiers |= Modifiers::CONTROL;
                }
                if mask & keyboard.alt_mask != 0 {
                    modifiers |= Modifiers::ALT;
                }
                if mask & keyboard.shift_mask != 0 {
                    modifiers |= Modifiers::SHIFT;
                }
                keyboard.modifiers = modifiers;
            }
            c_wl_keyboard::Event::RepeatInfo { rate, delay } => {
                if data.is_alive() && data.version() >= 4 {
                    data.repeat_info(rate, delay);
                }
            }
            _ => {}
        }
    }
}

fn handle_key(
    state: &mut Context,
    data: &SWlKeyboard,
    seat_name: u32,
    serial: u32,
    time: u32,
    key: u32,
    key_state: wayland_client::WEnum<c_wl_keyboard::KeyState>,
) {
    let pressed = matches!(
        key_state,
        wayland_client::WEnum::Value(c_wl_keyboard::KeyState::Pressed)
    );

    // An accelerator only swallows the event when the focused window is
    // not fullscreen; windowed accelerators never apply to fullscreen
    // windows either.
    let focus_fullscreen = state
        .host_focus_window
        .and_then(|id| state.xwm.as_ref()?.find_window(id))
        .map(|w| w.fullscreen || w.compositor_fullscreen)
        .unwrap_or(false);
    let accelerators = &state.config.accelerators;
    let windowed_accelerators = &state.config.windowed_accelerators;

    let mut handled = true;
    let mut focus_surface = None;

    if let Some(seat) = state.seats.iter_mut().find(|s| s.name == seat_name) {
        if let Some(keyboard) =
            seat.keyboards.iter_mut().find(|k| k.resource.id() == data.id())
        {
            if pressed {
                if let Some(xkb_state) = keyboard.state.as_ref() {
                    let symbol = xkb_state.key_get_one_sym((key + 8).into());
                    if matches_accelerator(accelerators, keyboard.modifiers, symbol) {
                        handled = false;
                    }
                    if !focus_fullscreen
                        && matches_accelerator(
                            windowed_accelerators,
                            keyboard.modifiers,
                            symbol,
                        )
                    {
                        handled = false;
                    }
                }
                if handled {
                    if keyboard.pressed_keys.press(key) && keyboard.resource.is_alive() {
                        keyboard.resource.key(
                            serial,
                            time,
                            key,
                            s_wl_keyboard::KeyState::Pressed,
                        );
                    }
                }
            } else {
                handled = keyboard.pressed_keys.release(key);
                if handled && keyboard.resource.is_alive() {
                    keyboard.resource.key(serial, time, key, s_wl_keyboard::KeyState::Released);
                }
            }
            if let Some(extended) = &keyboard.extended {
                let ack = if handled {
                    c_extended_keyboard::HandledState::Handled
                } else {
                    c_extended_keyboard::HandledState::NotHandled
                };
                extended.ack_key(serial, ack);
            }
            focus_surface = keyboard.focus_surface.clone();
        }
        seat.last_serial = serial;
    }

    if let Some(focus) = focus_surface {
        note_event_serial(state, &focus, serial);
    }
}

wayland_client::delegate_noop!(Context: ignore CExtendedKeyboard);
