//! Stylus-to-tablet translation.
//!
//! The host reports pen input as wl_touch sequences annotated through the
//! stylus extension. Guests expect pens on the standard tablet protocol,
//! so a tablet seat with one pen and one eraser tool is synthesised for
//! them, and every recorded touch frame that turns out to belong to a pen
//! is replayed on the matching tool instead of the guest wl_touch.

use wayland_client::protocol::wl_touch::{self as c_wl_touch, WlTouch as CWlTouch};
use wayland_client::{Connection, Dispatch as ClientDispatch, Proxy, QueueHandle};
use wayland_protocols::wp::tablet::zv2::server::zwp_tablet_manager_v2::{
    self as s_tablet_manager, ZwpTabletManagerV2 as STabletManager,
};
use wayland_protocols::wp::tablet::zv2::server::zwp_tablet_seat_v2::{
    self as s_tablet_seat, ZwpTabletSeatV2 as STabletSeat,
};
use wayland_protocols::wp::tablet::zv2::server::zwp_tablet_tool_v2::{
    self as s_tablet_tool, ZwpTabletToolV2 as STabletTool,
};
use wayland_protocols::wp::tablet::zv2::server::zwp_tablet_v2::{
    self as s_tablet, ZwpTabletV2 as STablet,
};
use wayland_client::backend::ObjectId as CObjectId;
use wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use exo_protocols::stylus::v2::client::zcr_touch_stylus_v2::{
    self as c_touch_stylus, ZcrTouchStylusV2 as CTouchStylus,
};

use crate::context::Context;
use crate::globals::{allowed_for_client, GlobalData};
use crate::seat::Seat;
use crate::touch_recorder::{FrameKind, TouchEvent, TouchEventKind};
use crate::transform;

/// Tool type of a touch sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Plain finger.
    #[default]
    Touch,
    /// Pen tip.
    Pen,
    /// Eraser end.
    Eraser,
}

/// Guest-facing tablet objects of one seat.
#[derive(Debug)]
pub struct StylusTablet {
    /// The tablet seat resource.
    pub seat: STabletSeat,
    /// The synthesised tablet.
    pub tablet: STablet,
    /// Pen tool.
    pub pen: STabletTool,
    /// Eraser tool.
    pub eraser: STabletTool,
}

impl StylusTablet {
    fn tool(&self, tool: Tool) -> Option<&STabletTool> {
        match tool {
            Tool::Pen => Some(&self.pen),
            Tool::Eraser => Some(&self.eraser),
            Tool::Touch => None,
        }
    }
}

const PRESSURE_MAX: f64 = 65535.0;

impl GlobalDispatch<STabletManager, GlobalData> for Context {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<STabletManager>,
        _global_data: &GlobalData,
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &GlobalData) -> bool {
        allowed_for_client(&client, global_data.aux_visible)
    }
}

fn synthesize_tool(
    client: &Client,
    dh: &DisplayHandle,
    seat: &STabletSeat,
    tool_type: s_tablet_tool::Type,
) -> Result<STabletTool, wayland_server::backend::InvalidId> {
    let tool = client.create_resource::<STabletTool, (), Context>(dh, seat.version(), ())?;
    seat.tool_added(&tool);
    tool._type(tool_type);
    tool.capability(s_tablet_tool::Capability::Pressure);
    tool.capability(s_tablet_tool::Capability::Tilt);
    tool.done();
    Ok(tool)
}

impl Dispatch<STabletManager, ()> for Context {
    fn request(
        state: &mut Self,
        client: &Client,
        _resource: &STabletManager,
        request: s_tablet_manager::Request,
        _data: &(),
        dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_tablet_manager::Request::GetTabletSeat { tablet_seat, seat } => {
                let Some(name) = seat.data::<u32>().copied() else {
                    return;
                };
                let seat_resource = data_init.init(tablet_seat, name);

                // Announce one tablet with a pen and an eraser. The
                // objects are server-created, like a physical hotplug.
                let tablet = match client.create_resource::<STablet, (), Context>(
                    dhandle,
                    seat_resource.version(),
                    (),
                ) {
                    Ok(tablet) => tablet,
                    Err(err) => {
                        log::warn!("creating guest tablet failed: {}", err);
                        return;
                    }
                };
                seat_resource.tablet_added(&tablet);
                tablet.name("virtual stylus".to_owned());
                tablet.done();

                let pen = synthesize_tool(client, dhandle, &seat_resource, s_tablet_tool::Type::Pen);
                let eraser =
                    synthesize_tool(client, dhandle, &seat_resource, s_tablet_tool::Type::Eraser);
                let (Ok(pen), Ok(eraser)) = (pen, eraser) else {
                    return;
                };

                if let Some(seat) = state.seats.iter_mut().find(|s| s.name == name) {
                    seat.stylus_tablet =
                        Some(StylusTablet { seat: seat_resource, tablet, pen, eraser });
                }
            }
            s_tablet_manager::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<STabletSeat, u32> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &STabletSeat,
        request: s_tablet_seat::Request,
        _data: &u32,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_tablet_seat::Request::Destroy => {}
            _ => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: wayland_server::backend::ClientId,
        resource: &STabletSeat,
        data: &u32,
    ) {
        if let Some(seat) = state.seats.iter_mut().find(|s| s.name == *data) {
            if seat
                .stylus_tablet
                .as_ref()
                .is_some_and(|t| t.seat.id() == resource.id())
            {
                seat.stylus_tablet = None;
            }
        }
    }
}

impl Dispatch<STablet, ()> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &STablet,
        request: s_tablet::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            s_tablet::Request::Destroy => {}
            _ => {}
        }
    }
}

impl Dispatch<STabletTool, ()> for Context {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &STabletTool,
        request: s_tablet_tool::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            // Cursor surfaces for tools are not mapped back to the host;
            // the host keeps drawing the pen cursor itself.
            s_tablet_tool::Request::SetCursor { .. } => {}
            s_tablet_tool::Request::Destroy => {}
            _ => {}
        }
    }
}

impl ClientDispatch<CWlTouch, wayland_server::protocol::wl_touch::WlTouch> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CWlTouch,
        event: c_wl_touch::Event,
        data: &wayland_server::protocol::wl_touch::WlTouch,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let seat_name = data.data::<u32>().copied().unwrap_or(0);
        let Some(seat) = state.seats.iter_mut().find(|s| s.name == seat_name) else {
            return;
        };
        let Some(touch) = seat.touches.iter_mut().find(|t| t.resource.id() == data.id()) else {
            return;
        };
        match event {
            c_wl_touch::Event::Down { serial, time, surface, id, x, y } => {
                touch.recorder.down(serial, time, surface.id(), id, x, y);
                seat.last_serial = serial;
            }
            c_wl_touch::Event::Up { serial, time, id } => {
                touch.recorder.up(serial, time, id);
                seat.last_serial = serial;
            }
            c_wl_touch::Event::Motion { time, id, x, y } => {
                touch.recorder.motion(time, id, x, y);
            }
            c_wl_touch::Event::Frame => {
                let (kind, events) = touch.recorder.finish(FrameKind::Frame);
                route_touch_frame(state, seat_name, data, kind, events);
            }
            c_wl_touch::Event::Cancel => {
                let (kind, events) = touch.recorder.finish(FrameKind::Cancel);
                route_touch_frame(state, seat_name, data, kind, events);
            }
            _ => {}
        }
    }
}

impl ClientDispatch<CTouchStylus, wayland_server::protocol::wl_touch::WlTouch> for Context {
    fn event(
        state: &mut Self,
        _proxy: &CTouchStylus,
        event: c_touch_stylus::Event,
        data: &wayland_server::protocol::wl_touch::WlTouch,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let seat_name = data.data::<u32>().copied().unwrap_or(0);
        let Some(seat) = state.seats.iter_mut().find(|s| s.name == seat_name) else {
            return;
        };
        let Some(touch) = seat.touches.iter_mut().find(|t| t.resource.id() == data.id()) else {
            return;
        };
        match event {
            c_touch_stylus::Event::Tool { id, _type } => {
                let tool = match _type {
                    wayland_client::WEnum::Value(c_touch_stylus::ToolType::Pen) => Tool::Pen,
                    wayland_client::WEnum::Value(c_touch_stylus::ToolType::Eraser) => {
                        Tool::Eraser
                    }
                    _ => Tool::Touch,
                };
                touch.tools.retain(|(tid, _)| *tid != id as i32);
                touch.tools.push((id as i32, tool));
            }
            c_touch_stylus::Event::Force { id, force, .. } => {
                touch.force.retain(|(fid, _)| *fid != id as i32);
                touch.force.push((id as i32, force));
            }
            c_touch_stylus::Event::Tilt { .. } => {}
            _ => {}
        }
    }
}

/// Split a finished touch frame between the guest touch resource and the
/// tablet tools, dropping the touch events of every pen id.
fn route_touch_frame(
    state: &mut Context,
    seat_name: u32,
    touch_resource: &wayland_server::protocol::wl_touch::WlTouch,
    kind: FrameKind,
    events: Vec<TouchEvent<CObjectId>>,
) {
    let scale = state.scale.clone();
    let Some(seat_index) = state.seats.iter().position(|s| s.name == seat_name) else {
        return;
    };

    let tools: Vec<(i32, Tool)>;
    let forces: Vec<(i32, f64)>;
    {
        let seat: &Seat = &state.seats[seat_index];
        let Some(touch) = seat.touches.iter().find(|t| t.resource.id() == touch_resource.id())
        else {
            return;
        };
        tools = touch.tools.clone();
        forces = touch.force.clone();
    }

    let tool_for = |id: i32| {
        tools.iter().find(|(tid, _)| *tid == id).map(|(_, t)| *t).unwrap_or_default()
    };

    let mut touch_events_sent = false;

    for event in &events {
        match event.kind {
            TouchEventKind::None => {}
            TouchEventKind::Down => {
                let Some(surface_id) = event
                    .surface
                    .as_ref()
                    .and_then(|host_id| guest_surface_for_host_id(state, host_id))
                else {
                    continue;
                };
                let view = state.surface_scale_view(&surface_id);
                let (mut x, mut y) = (event.x, event.y);
                transform::host_to_guest_fixed(&scale, Some(&view), &mut x, &mut y);
                let Some(guest_surface) =
                    state.surfaces.get(&surface_id).map(|s| s.resource.clone())
                else {
                    continue;
                };
                match tool_for(event.id) {
                    Tool::Touch => {
                        if touch_resource.is_alive() {
                            touch_resource.down(
                                event.serial,
                                event.time,
                                &guest_surface,
                                event.id,
                                x,
                                y,
                            );
                            touch_events_sent = true;
                        }
                    }
                    tool => {
                        if let Some(tablet) = &state.seats[seat_index].stylus_tablet {
                            if let Some(tool) = tablet.tool(tool) {
                                tool.proximity_in(event.serial, &tablet.tablet, &guest_surface);
                                tool.down(event.serial);
                                tool.motion(x, y);
                                let pressure = forces
                                    .iter()
                                    .find(|(fid, _)| *fid == event.id)
                                    .map(|(_, f)| (*f * PRESSURE_MAX) as u32)
                                    .unwrap_or(0);
                                tool.pressure(pressure.min(PRESSURE_MAX as u32));
                                tool.frame(event.time);
                            }
                        }
                    }
                }
                if let Some(touch) = state.seats[seat_index]
                    .touches
                    .iter_mut()
                    .find(|t| t.resource.id() == touch_resource.id())
                {
                    touch.focus_surface = Some(surface_id);
                }
            }
            TouchEventKind::Motion => {
                let focus = state.seats[seat_index]
                    .touches
                    .iter()
                    .find(|t| t.resource.id() == touch_resource.id())
                    .and_then(|t| t.focus_surface.clone());
                let view = focus
                    .as_ref()
                    .map(|id| state.surface_scale_view(id))
                    .unwrap_or_default();
                let (mut x, mut y) = (event.x, event.y);
                transform::host_to_guest_fixed(&scale, Some(&view), &mut x, &mut y);
                match tool_for(event.id) {
                    Tool::Touch => {
                        if touch_resource.is_alive() {
                            touch_resource.motion(event.time, event.id, x, y);
                            touch_events_sent = true;
                        }
                    }
                    tool => {
                        if let Some(tablet) = &state.seats[seat_index].stylus_tablet {
                            if let Some(tool) = tablet.tool(tool) {
                                tool.motion(x, y);
                                tool.frame(event.time);
                            }
                        }
                    }
                }
            }
            TouchEventKind::Up => match tool_for(event.id) {
                Tool::Touch => {
                    if touch_resource.is_alive() {
                        touch_resource.up(event.serial, event.time, event.id);
                        touch_events_sent = true;
                    }
                }
                tool => {
                    if let Some(tablet) = &state.seats[seat_index].stylus_tablet {
                        if let Some(tool) = tablet.tool(tool) {
                            tool.up();
                            tool.proximity_out();
                            tool.frame(event.time);
                        }
                    }
                    // The sequence ended; forget its tool type.
                    if let Some(touch) = state.seats[seat_index]
                        .touches
                        .iter_mut()
                        .find(|t| t.resource.id() == touch_resource.id())
                    {
                        touch.tools.retain(|(tid, _)| *tid != event.id);
                        touch.force.retain(|(fid, _)| *fid != event.id);
                    }
                }
            },
        }
    }

    if touch_resource.is_alive() && (touch_events_sent || kind == FrameKind::Cancel) {
        match kind {
            FrameKind::Frame => touch_resource.frame(),
            FrameKind::Cancel => touch_resource.cancel(),
        }
    }
}

fn guest_surface_for_host_id(
    state: &Context,
    host_id: &CObjectId,
) -> Option<wayland_server::backend::ObjectId> {
    state
        .surfaces
        .iter()
        .find(|(_, s)| wayland_client::Proxy::id(&s.host) == *host_id)
        .map(|(id, _)| id.clone())
}
