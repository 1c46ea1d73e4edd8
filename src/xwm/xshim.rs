//! Narrow shim over the X11 connection.
//!
//! Window-management logic goes through this trait instead of the
//! connection directly, so it can run against a recording fake in tests.
//! Errors are logged and swallowed here; a dead X11 connection is detected
//! (and fatal) in the event loop, not in individual requests.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, ClientMessageEvent, ConfigureNotifyEvent, ConfigureWindowAux, ConnectionExt,
    CreateWindowAux, EventMask, InputFocus, MapNotifyEvent, PropMode, Window as XWindow,
    WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperConnectionExt;

/// The subset of xcb traffic issued by the window manager.
pub trait XConn {
    /// Allocate an X resource id.
    fn generate_id(&self) -> XWindow;
    /// xcb configure_window.
    fn configure_window(&self, window: XWindow, values: &ConfigureWindowAux);
    /// Replace a 32-bit property.
    fn change_property32(&self, window: XWindow, property: Atom, ty: Atom, data: &[u32]);
    /// Replace an 8-bit property.
    fn change_property8(&self, window: XWindow, property: Atom, ty: Atom, data: &[u8]);
    /// Delete a property.
    fn delete_property(&self, window: XWindow, property: Atom);
    /// Send a synthetic ConfigureNotify to the window itself.
    fn send_configure_notify(&self, event: &ConfigureNotifyEvent);
    /// Send a synthetic MapNotify to the window itself.
    fn send_map_notify(&self, event: &MapNotifyEvent);
    /// Send a client message.
    fn send_client_message(&self, window: XWindow, event: &ClientMessageEvent, mask: EventMask);
    /// Create an InputOutput window.
    #[allow(clippy::too_many_arguments)]
    fn create_window(
        &self,
        depth: u8,
        window: XWindow,
        parent: XWindow,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        visual: u32,
        values: &CreateWindowAux,
    );
    /// Reparent a window.
    fn reparent_window(&self, window: XWindow, parent: XWindow, x: i16, y: i16);
    /// Map a window.
    fn map_window(&self, window: XWindow);
    /// Unmap a window.
    fn unmap_window(&self, window: XWindow);
    /// Destroy a window.
    fn destroy_window(&self, window: XWindow);
    /// Give a window the input focus.
    fn set_input_focus(&self, window: XWindow);
    /// Flush the connection.
    fn flush(&self);
}

macro_rules! log_on_err {
    ($result:expr, $what:literal) => {
        if let Err(err) = $result {
            log::warn!(concat!($what, " failed: {}"), err);
        }
    };
}

impl XConn for RustConnection {
    fn generate_id(&self) -> XWindow {
        Connection::generate_id(self).unwrap_or(x11rb::NONE)
    }

    fn configure_window(&self, window: XWindow, values: &ConfigureWindowAux) {
        log_on_err!(ConnectionExt::configure_window(self, window, values), "ConfigureWindow");
    }

    fn change_property32(&self, window: XWindow, property: Atom, ty: Atom, data: &[u32]) {
        log_on_err!(
            WrapperConnectionExt::change_property32(self, PropMode::REPLACE, window, property, ty, data),
            "ChangeProperty"
        );
    }

    fn change_property8(&self, window: XWindow, property: Atom, ty: Atom, data: &[u8]) {
        log_on_err!(
            WrapperConnectionExt::change_property8(self, PropMode::REPLACE, window, property, ty, data),
            "ChangeProperty"
        );
    }

    fn delete_property(&self, window: XWindow, property: Atom) {
        log_on_err!(ConnectionExt::delete_property(self, window, property), "DeleteProperty");
    }

    fn send_configure_notify(&self, event: &ConfigureNotifyEvent) {
        log_on_err!(
            self.send_event(false, event.window, EventMask::STRUCTURE_NOTIFY, event),
            "SendEvent"
        );
    }

    fn send_map_notify(&self, event: &MapNotifyEvent) {
        log_on_err!(
            self.send_event(false, event.window, EventMask::STRUCTURE_NOTIFY, event),
            "SendEvent"
        );
    }

    fn send_client_message(&self, window: XWindow, event: &ClientMessageEvent, mask: EventMask) {
        log_on_err!(self.send_event(false, window, mask, event), "SendEvent");
    }

    fn create_window(
        &self,
        depth: u8,
        window: XWindow,
        parent: XWindow,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        visual: u32,
        values: &CreateWindowAux,
    ) {
        log_on_err!(
            ConnectionExt::create_window(
                self,
                depth,
                window,
                parent,
                x,
                y,
                width,
                height,
                0,
                WindowClass::INPUT_OUTPUT,
                visual,
                values,
            ),
            "CreateWindow"
        );
    }

    fn reparent_window(&self, window: XWindow, parent: XWindow, x: i16, y: i16) {
        log_on_err!(ConnectionExt::reparent_window(self, window, parent, x, y), "ReparentWindow");
    }

    fn map_window(&self, window: XWindow) {
        log_on_err!(ConnectionExt::map_window(self, window), "MapWindow");
    }

    fn unmap_window(&self, window: XWindow) {
        log_on_err!(ConnectionExt::unmap_window(self, window), "UnmapWindow");
    }

    fn destroy_window(&self, window: XWindow) {
        log_on_err!(ConnectionExt::destroy_window(self, window), "DestroyWindow");
    }

    fn set_input_focus(&self, window: XWindow) {
        log_on_err!(
            ConnectionExt::set_input_focus(self, InputFocus::NONE, window, x11rb::CURRENT_TIME),
            "SetInputFocus"
        );
    }

    fn flush(&self) {
        log_on_err!(Connection::flush(self), "flush");
    }
}

/// One recorded call on the [`FakeXConn`].
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum XCall {
    ConfigureWindow { window: XWindow, x: Option<i32>, y: Option<i32>, width: Option<u32>, height: Option<u32>, border_width: Option<u32> },
    ChangeProperty32 { window: XWindow, property: Atom, data: Vec<u32> },
    ChangeProperty8 { window: XWindow, property: Atom, data: Vec<u8> },
    DeleteProperty { window: XWindow, property: Atom },
    ConfigureNotify { window: XWindow, x: i16, y: i16, width: u16, height: u16 },
    MapNotify { window: XWindow },
    ClientMessage { window: XWindow, ty: Atom },
    CreateWindow { window: XWindow, parent: XWindow, x: i16, y: i16, width: u16, height: u16 },
    ReparentWindow { window: XWindow, parent: XWindow },
    MapWindow { window: XWindow },
    UnmapWindow { window: XWindow },
    DestroyWindow { window: XWindow },
    SetInputFocus { window: XWindow },
}

/// Recording fake used by the window-manager tests.
#[derive(Debug, Default)]
pub struct FakeXConn {
    /// Recorded calls, in order.
    pub calls: std::cell::RefCell<Vec<XCall>>,
    next_id: std::cell::Cell<XWindow>,
}

impl FakeXConn {
    /// Take the recorded calls, leaving the log empty.
    pub fn take_calls(&self) -> Vec<XCall> {
        self.calls.take()
    }
}

impl XConn for FakeXConn {
    fn generate_id(&self) -> XWindow {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        0x0100_0000 + id
    }

    fn configure_window(&self, window: XWindow, values: &ConfigureWindowAux) {
        self.calls.borrow_mut().push(XCall::ConfigureWindow {
            window,
            x: values.x,
            y: values.y,
            width: values.width,
            height: values.height,
            border_width: values.border_width,
        });
    }

    fn change_property32(&self, window: XWindow, property: Atom, _ty: Atom, data: &[u32]) {
        self.calls.borrow_mut().push(XCall::ChangeProperty32 {
            window,
            property,
            data: data.to_vec(),
        });
    }

    fn change_property8(&self, window: XWindow, property: Atom, _ty: Atom, data: &[u8]) {
        self.calls.borrow_mut().push(XCall::ChangeProperty8 {
            window,
            property,
            data: data.to_vec(),
        });
    }

    fn delete_property(&self, window: XWindow, property: Atom) {
        self.calls.borrow_mut().push(XCall::DeleteProperty { window, property });
    }

    fn send_configure_notify(&self, event: &ConfigureNotifyEvent) {
        self.calls.borrow_mut().push(XCall::ConfigureNotify {
            window: event.window,
            x: event.x,
            y: event.y,
            width: event.width,
            height: event.height,
        });
    }

    fn send_map_notify(&self, event: &MapNotifyEvent) {
        self.calls.borrow_mut().push(XCall::MapNotify { window: event.window });
    }

    fn send_client_message(&self, window: XWindow, event: &ClientMessageEvent, _mask: EventMask) {
        self.calls.borrow_mut().push(XCall::ClientMessage { window, ty: event.type_ });
    }

    fn create_window(
        &self,
        _depth: u8,
        window: XWindow,
        parent: XWindow,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        _visual: u32,
        _values: &CreateWindowAux,
    ) {
        self.calls.borrow_mut().push(XCall::CreateWindow { window, parent, x, y, width, height });
    }

    fn reparent_window(&self, window: XWindow, parent: XWindow, _x: i16, _y: i16) {
        self.calls.borrow_mut().push(XCall::ReparentWindow { window, parent });
    }

    fn map_window(&self, window: XWindow) {
        self.calls.borrow_mut().push(XCall::MapWindow { window });
    }

    fn unmap_window(&self, window: XWindow) {
        self.calls.borrow_mut().push(XCall::UnmapWindow { window });
    }

    fn destroy_window(&self, window: XWindow) {
        self.calls.borrow_mut().push(XCall::DestroyWindow { window });
    }

    fn set_input_focus(&self, window: XWindow) {
        self.calls.borrow_mut().push(XCall::SetInputFocus { window });
    }

    fn flush(&self) {}
}
