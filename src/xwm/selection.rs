//! X11 selection ↔ host clipboard bridge.
//!
//! Host to X11: when the host sets a selection, sommelier claims the X11
//! CLIPBOARD selection. X11 requestors get the mime list as TARGETS and
//! each conversion is served by reading from a `wl_data_offer.receive`
//! pipe; anything that does not fit the 64 KiB chunk switches to the INCR
//! protocol.
//!
//! X11 to host: when an X11 client takes selection ownership, its TARGETS
//! are converted to mime types on a `wl_data_source`. Host reads trigger
//! `ConvertSelection` and the resulting property bytes are pumped into the
//! host's pipe, honoring INCR properties from the X11 owner.
//!
//! Transfers never block: both pipe ends are non-blocking and registered
//! as event-loop sources for exactly as long as a transfer is in flight.

use std::os::fd::{AsFd, OwnedFd};

use calloop::generic::Generic;
use calloop::{Interest, Mode, PostAction, RegistrationToken};
use x11rb::connection::Connection as X11Connection;
use x11rb::protocol::xfixes::SelectionNotifyEvent as XfixesSelectionNotifyEvent;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ConnectionExt, EventMask, PropMode, Property, PropertyNotifyEvent,
    SelectionNotifyEvent, SelectionRequestEvent, Window as XWindow, SELECTION_NOTIFY_EVENT,
};

use crate::context::Context;
use crate::data_device::Internal;

/// INCR chunk size. The value is observable on the wire, so it is part of
/// the contract rather than a tunable.
pub const INCR_CHUNK_SIZE: usize = 64 * 1024;

/// X11-side state of the clipboard bridge.
#[derive(Debug)]
pub struct X11Selection {
    /// Our selection window (the WM window).
    pub window: XWindow,
    /// Current CLIPBOARD owner.
    pub owner: XWindow,
    /// Timestamp of our own ownership.
    pub timestamp: u32,
    /// Atoms offered to X11 requestors (TARGETS, TIMESTAMP, mimes).
    pub offer_atoms: Vec<Atom>,
    /// Mime name per offered atom, parallel to `offer_atoms`.
    pub offer_mime_types: Vec<String>,

    /// X11 request currently being served (host → X11).
    pub request: Option<SelectionRequestEvent>,
    /// The transfer switched to INCR.
    pub incremental: bool,
    /// Buffered selection bytes; at most one chunk.
    pub data: Vec<u8>,
    /// Type atom of the data being sent.
    pub data_type: Atom,
    /// A property chunk is waiting for the requestor's delete.
    pub data_ack_pending: bool,
    /// Event-loop source of the offer read pipe.
    pub read_source: Option<RegistrationToken>,
    /// The offer pipe reached end of data.
    pub read_eof: bool,
    /// The zero-length INCR terminator has been written.
    pub terminator_sent: bool,

    /// An X11→host conversion is in flight.
    pub send_in_flight: bool,
    /// Bytes of the current property reply and the write offset.
    pub send_data: Option<(Vec<u8>, usize)>,
    /// Event-loop source of the host write pipe.
    pub write_source: Option<RegistrationToken>,
    /// The X11 owner uses INCR for this transfer.
    pub send_incremental: bool,
}

impl X11Selection {
    /// Fresh state owning no selection.
    pub fn new(window: XWindow) -> X11Selection {
        X11Selection {
            window,
            owner: x11rb::NONE,
            timestamp: x11rb::CURRENT_TIME,
            offer_atoms: Vec::new(),
            offer_mime_types: Vec::new(),
            request: None,
            incremental: false,
            data: Vec::new(),
            data_type: x11rb::NONE,
            data_ack_pending: false,
            read_source: None,
            read_eof: false,
            terminator_sent: false,
            send_in_flight: false,
            send_data: None,
            write_source: None,
            send_incremental: false,
        }
    }

    /// Property of the in-flight X11 request, for property-notify routing.
    pub fn request_property(&self) -> Atom {
        self.request.map(|r| r.property).unwrap_or(x11rb::NONE)
    }
}

fn send_selection_notify(ctx: &Context, property: Atom) {
    let Some(xwm) = ctx.xwm.as_ref() else { return };
    let Some(request) = xwm.selection.request else { return };
    let event = SelectionNotifyEvent {
        response_type: SELECTION_NOTIFY_EVENT,
        sequence: 0,
        time: request.time,
        requestor: request.requestor,
        selection: request.selection,
        target: request.target,
        property,
    };
    if let Err(err) = xwm.conn.send_event(false, request.requestor, EventMask::NO_EVENT, event) {
        log::warn!("SelectionNotify failed: {}", err);
    }
}

/// The host selection changed: claim or release the X11 CLIPBOARD.
pub fn host_selection_changed(ctx: &mut Context) {
    let mime_types = ctx.selection.offer.as_ref().map(|o| o.mime_types.clone());
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;

    match mime_types {
        None => {
            if xwm.selection.owner == xwm.selection.window {
                let timestamp = xwm.selection.timestamp;
                if let Err(err) =
                    xwm.conn.set_selection_owner(x11rb::NONE, atoms.CLIPBOARD, timestamp)
                {
                    log::warn!("releasing CLIPBOARD failed: {}", err);
                }
            }
            xwm.selection.offer_atoms.clear();
            xwm.selection.offer_mime_types.clear();
        }
        Some(mime_types) => {
            // Intern every mime type in one batch; none of the requests
            // depend on each other.
            let cookies: Vec<_> = mime_types
                .iter()
                .map(|mime| xwm.conn.intern_atom(false, mime.as_bytes()))
                .collect();
            let mut offer_atoms = vec![atoms.TARGETS, atoms.TIMESTAMP];
            let mut offer_mime_types = vec![String::new(), String::new()];
            for (cookie, mime) in cookies.into_iter().zip(mime_types) {
                let Ok(cookie) = cookie else { continue };
                let Ok(reply) = cookie.reply() else { continue };
                offer_atoms.push(reply.atom);
                offer_mime_types.push(mime);
            }
            xwm.selection.offer_atoms = offer_atoms;
            xwm.selection.offer_mime_types = offer_mime_types;
            if let Err(err) = xwm.conn.set_selection_owner(
                xwm.selection.window,
                atoms.CLIPBOARD,
                x11rb::CURRENT_TIME,
            ) {
                log::warn!("claiming CLIPBOARD failed: {}", err);
            }
        }
    }
    let _ = xwm.conn.flush();
}

/// X11 selection ownership changed.
pub fn handle_xfixes_selection_notify(ctx: &mut Context, event: XfixesSelectionNotifyEvent) {
    let serial = ctx.last_seat_serial();
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;
    if event.selection != atoms.CLIPBOARD {
        return;
    }

    if event.owner == x11rb::NONE {
        // The X11 selection is gone; withdraw ours from the host unless we
        // were the owner ourselves.
        if xwm.selection.owner != xwm.selection.window {
            if let Some(device) = &ctx.selection.data_device {
                device.set_selection(None, serial);
            }
        }
        xwm.selection.owner = x11rb::NONE;
        return;
    }

    xwm.selection.owner = event.owner;
    if event.owner == xwm.selection.window {
        xwm.selection.timestamp = event.timestamp;
        return;
    }

    // A real X11 client took the selection; ask for its targets.
    xwm.selection.send_incremental = false;
    if let Err(err) = xwm.conn.convert_selection(
        xwm.selection.window,
        atoms.CLIPBOARD,
        atoms.TARGETS,
        atoms.WL_SELECTION,
        event.timestamp,
    ) {
        log::warn!("ConvertSelection failed: {}", err);
    }
    let _ = xwm.conn.flush();
}

/// The X server answered one of our ConvertSelection calls.
pub fn handle_selection_notify(ctx: &mut Context, event: SelectionNotifyEvent) {
    if event.property == x11rb::NONE {
        return;
    }
    let targets = {
        let Some(xwm) = ctx.xwm.as_ref() else { return };
        event.target == xwm.atoms.TARGETS
    };
    if targets {
        get_selection_targets(ctx);
    } else {
        get_selection_data(ctx);
    }
}

/// Read the TARGETS list and advertise it to the host as a data source.
fn get_selection_targets(ctx: &mut Context) {
    let serial = ctx.last_seat_serial();
    let qh = ctx.qh.clone();
    let manager = ctx.data_device_manager.clone();
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;

    let reply = xwm
        .conn
        .get_property(true, xwm.selection.window, atoms.WL_SELECTION, AtomEnum::ANY, 0, 1024)
        .ok()
        .and_then(|c| c.reply().ok());
    let Some(reply) = reply else { return };
    if reply.type_ != Atom::from(AtomEnum::ATOM) {
        return;
    }
    let target_atoms: Vec<Atom> = reply.value32().map(|v| v.collect()).unwrap_or_default();

    let Some((manager, _)) = manager else { return };

    // Converting each atom to its name costs one round trip; batch the
    // requests, then the replies.
    let cookies: Vec<_> =
        target_atoms.iter().map(|&atom| xwm.conn.get_atom_name(atom)).collect();
    let mut mime_types = Vec::new();
    for cookie in cookies {
        let Ok(cookie) = cookie else { continue };
        let Ok(reply) = cookie.reply() else { continue };
        if let Ok(name) = String::from_utf8(reply.name) {
            mime_types.push(name);
        }
    }

    let source = manager.create_data_source(&qh, Internal);
    for mime in &mime_types {
        source.offer(mime.clone());
    }
    if let Some(device) = &ctx.selection.data_device {
        device.set_selection(Some(&source), serial);
    }
    if let Some(old) = ctx.selection.source.replace(source) {
        old.destroy();
    }
}

/// Read the converted selection data property and pump it into the host's
/// pipe.
fn get_selection_data(ctx: &mut Context) {
    let value = {
        let Some(xwm) = ctx.xwm.as_mut() else { return };
        let atoms = xwm.atoms;
        let reply = xwm
            .conn
            .get_property(
                true,
                xwm.selection.window,
                atoms.WL_SELECTION,
                AtomEnum::ANY,
                0,
                0x1fffffff,
            )
            .ok()
            .and_then(|c| c.reply().ok());
        let Some(reply) = reply else { return };
        if reply.type_ == atoms.INCR {
            xwm.selection.send_incremental = true;
            None
        } else {
            xwm.selection.send_incremental = false;
            Some(reply.value)
        }
    };
    if let Some(value) = value {
        write_selection_property(ctx, value);
    }
}

/// Stage property bytes for the host pipe and drain as much as possible,
/// registering a writable source for the remainder.
fn write_selection_property(ctx: &mut Context, bytes: Vec<u8>) {
    if let Some(xwm) = ctx.xwm.as_mut() {
        xwm.selection.send_data = Some((bytes, 0));
    }
    drain_send_data(ctx);
}

fn drain_send_data(ctx: &mut Context) {
    let finished = {
        let Some(xwm) = ctx.xwm.as_mut() else { return };
        let Some((bytes, offset)) = xwm.selection.send_data.as_mut() else { return };
        let Some(fd) = ctx.selection.pending_sends.front().map(|(_, fd)| fd.as_fd()) else {
            xwm.selection.send_data = None;
            return;
        };
        loop {
            if *offset >= bytes.len() {
                break true;
            }
            match rustix::io::write(fd, &bytes[*offset..]) {
                Ok(written) => *offset += written,
                Err(rustix::io::Errno::AGAIN) => break false,
                Err(err) => {
                    log::warn!("writing selection to host failed: {}", err);
                    break true;
                }
            }
        }
    };

    if finished {
        finish_host_send(ctx);
    } else {
        register_write_source(ctx);
    }
}

fn register_write_source(ctx: &mut Context) {
    if ctx.xwm.as_ref().is_some_and(|x| x.selection.write_source.is_some()) {
        return;
    }
    // The event source owns its own duplicate of the fd; the queue keeps
    // the original for writing.
    let Some(fd) = ctx
        .selection
        .pending_sends
        .front()
        .and_then(|(_, fd)| fd.try_clone().ok())
    else {
        return;
    };
    let source = Generic::new(fd, Interest::WRITE, Mode::Level);
    let token = ctx.loop_handle.insert_source(source, |_, _, ctx: &mut Context| {
        drain_send_data(ctx);
        let done = ctx.xwm.as_ref().map(|x| x.selection.send_data.is_none()).unwrap_or(true);
        if done {
            if let Some(xwm) = ctx.xwm.as_mut() {
                xwm.selection.write_source = None;
            }
            Ok(PostAction::Remove)
        } else {
            Ok(PostAction::Continue)
        }
    });
    match token {
        Ok(token) => {
            if let Some(xwm) = ctx.xwm.as_mut() {
                xwm.selection.write_source = Some(token);
            }
        }
        Err(err) => log::warn!("registering selection write source failed: {}", err),
    }
}

/// One property's worth of data reached the host. For INCR transfers the
/// chunk property is deleted to ask the owner for more; otherwise the
/// transfer is complete.
fn finish_host_send(ctx: &mut Context) {
    let incremental = {
        let Some(xwm) = ctx.xwm.as_mut() else { return };
        xwm.selection.send_data = None;
        xwm.selection.send_incremental
    };
    if incremental {
        let Some(xwm) = ctx.xwm.as_ref() else { return };
        let atoms = xwm.atoms;
        let _ = xwm.conn.delete_property(xwm.selection.window, atoms.WL_SELECTION);
        let _ = xwm.conn.flush();
    } else {
        complete_host_send(ctx);
    }
}

/// Close the host pipe and start the next queued send, if any.
fn complete_host_send(ctx: &mut Context) {
    if let Some(xwm) = ctx.xwm.as_mut() {
        xwm.selection.send_in_flight = false;
        if let Some(token) = xwm.selection.write_source.take() {
            ctx.loop_handle.remove(token);
        }
    }
    ctx.selection.pending_sends.pop_front();
    if !ctx.selection.pending_sends.is_empty() {
        begin_host_send(ctx);
    }
}

/// The host asked for selection data in `mime_type`, to be written to
/// `fd`. At most one conversion runs at a time; the rest queue.
pub fn host_wants_selection_data(ctx: &mut Context, mime_type: String, fd: OwnedFd) {
    if let Err(err) = rustix::fs::fcntl_setfl(&fd, rustix::fs::OFlags::NONBLOCK) {
        log::warn!("making selection pipe non-blocking failed: {}", err);
    }
    ctx.selection.pending_sends.push_back((mime_type, fd));
    let in_flight = ctx.xwm.as_ref().is_some_and(|x| x.selection.send_in_flight);
    if !in_flight {
        begin_host_send(ctx);
    }
}

fn begin_host_send(ctx: &mut Context) {
    let Some((mime_type, _)) = ctx.selection.pending_sends.front() else { return };
    let mime_type = mime_type.clone();
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;
    xwm.selection.send_in_flight = true;
    xwm.selection.send_incremental = false;

    let atom = xwm
        .conn
        .intern_atom(false, mime_type.as_bytes())
        .ok()
        .and_then(|c| c.reply().ok())
        .map(|r| r.atom);
    let Some(atom) = atom else {
        xwm.selection.send_in_flight = false;
        ctx.selection.pending_sends.pop_front();
        return;
    };
    if let Err(err) = xwm.conn.convert_selection(
        xwm.selection.window,
        atoms.CLIPBOARD,
        atom,
        atoms.WL_SELECTION,
        x11rb::CURRENT_TIME,
    ) {
        log::warn!("ConvertSelection failed: {}", err);
    }
    let _ = xwm.conn.flush();
}

/// An X11 client asked us (the selection owner) for data.
pub fn handle_selection_request(ctx: &mut Context, event: SelectionRequestEvent) {
    let (atoms, is_manager) = {
        let Some(xwm) = ctx.xwm.as_mut() else { return };
        xwm.selection.request = Some(event);
        xwm.selection.incremental = false;
        xwm.selection.data_ack_pending = false;
        (xwm.atoms, event.selection == xwm.atoms.CLIPBOARD_MANAGER)
    };

    if is_manager {
        send_selection_notify(ctx, event.property);
    } else if event.target == atoms.TARGETS {
        send_targets(ctx);
    } else if event.target == atoms.TIMESTAMP {
        send_timestamp(ctx);
    } else {
        let offered = ctx
            .xwm
            .as_ref()
            .is_some_and(|x| x.selection.offer_atoms.contains(&event.target));
        if offered {
            send_data(ctx, event.target);
        } else {
            send_selection_notify(ctx, x11rb::NONE);
        }
    }
    if let Some(xwm) = ctx.xwm.as_ref() {
        let _ = xwm.conn.flush();
    }
}

fn send_targets(ctx: &mut Context) {
    let Some(xwm) = ctx.xwm.as_ref() else { return };
    let Some(request) = xwm.selection.request else { return };
    if let Err(err) = x11rb::wrapper::ConnectionExt::change_property32(
        &xwm.conn,
        PropMode::REPLACE,
        request.requestor,
        request.property,
        AtomEnum::ATOM,
        &xwm.selection.offer_atoms,
    ) {
        log::warn!("replying TARGETS failed: {}", err);
    }
    send_selection_notify(ctx, request.property);
}

fn send_timestamp(ctx: &mut Context) {
    let Some(xwm) = ctx.xwm.as_ref() else { return };
    let Some(request) = xwm.selection.request else { return };
    if let Err(err) = x11rb::wrapper::ConnectionExt::change_property32(
        &xwm.conn,
        PropMode::REPLACE,
        request.requestor,
        request.property,
        AtomEnum::INTEGER,
        &[xwm.selection.timestamp],
    ) {
        log::warn!("replying TIMESTAMP failed: {}", err);
    }
    send_selection_notify(ctx, request.property);
}

/// Ask the host for the offered mime type behind `target` and stream it to
/// the X11 requestor.
fn send_data(ctx: &mut Context, target: Atom) {
    let mime_type = {
        let Some(xwm) = ctx.xwm.as_ref() else { return };
        xwm.selection
            .offer_atoms
            .iter()
            .position(|&a| a == target)
            .map(|i| xwm.selection.offer_mime_types[i].clone())
    };
    let Some(mime_type) = mime_type else {
        send_selection_notify(ctx, x11rb::NONE);
        return;
    };

    if ctx.xwm.as_ref().is_some_and(|x| x.selection.read_source.is_some()) {
        log::warn!("selection transfer already pending");
        send_selection_notify(ctx, x11rb::NONE);
        return;
    }

    let Some(offer) = ctx.selection.offer.as_ref().map(|o| o.offer.clone()) else {
        send_selection_notify(ctx, x11rb::NONE);
        return;
    };

    let (read_fd, write_fd) = match rustix::pipe::pipe_with(
        rustix::pipe::PipeFlags::CLOEXEC | rustix::pipe::PipeFlags::NONBLOCK,
    ) {
        Ok(fds) => fds,
        Err(err) => {
            log::warn!("creating selection pipe failed: {}", err);
            send_selection_notify(ctx, x11rb::NONE);
            return;
        }
    };

    offer.receive(mime_type, write_fd.as_fd());
    drop(write_fd);
    ctx.flush();

    if let Some(xwm) = ctx.xwm.as_mut() {
        xwm.selection.data.clear();
        xwm.selection.data_type = target;
        xwm.selection.data_ack_pending = false;
        xwm.selection.read_eof = false;
        xwm.selection.terminator_sent = false;
    }

    let source = Generic::new(read_fd, Interest::READ, Mode::Level);
    let token = ctx.loop_handle.insert_source(source, |_, fd, ctx: &mut Context| {
        Ok(selection_fd_readable(ctx, fd.as_fd()))
    });
    match token {
        Ok(token) => {
            if let Some(xwm) = ctx.xwm.as_mut() {
                xwm.selection.read_source = Some(token);
            }
        }
        Err(err) => {
            log::warn!("registering selection read source failed: {}", err);
            send_selection_notify(ctx, x11rb::NONE);
        }
    }
}

/// Pump bytes from the host offer pipe towards the X11 requestor,
/// deciding between one-shot and INCR once the first chunk fills up.
fn selection_fd_readable(ctx: &mut Context, fd: std::os::fd::BorrowedFd<'_>) -> PostAction {
    let mut buffer = [0u8; 4096];
    loop {
        let room = {
            let Some(xwm) = ctx.xwm.as_ref() else { return PostAction::Remove };
            INCR_CHUNK_SIZE.saturating_sub(xwm.selection.data.len())
        };
        if room == 0 {
            // A full chunk is buffered; hand it to the requestor and pause
            // reading until the chunk property is consumed.
            let switch_to_incr = {
                let Some(xwm) = ctx.xwm.as_mut() else { return PostAction::Remove };
                if !xwm.selection.incremental {
                    xwm.selection.incremental = true;
                    true
                } else {
                    false
                }
            };
            if switch_to_incr {
                announce_incr(ctx);
                send_selection_notify(
                    ctx,
                    ctx.xwm.as_ref().map(|x| x.selection.request_property()).unwrap_or(x11rb::NONE),
                );
            } else if !ctx.xwm.as_ref().is_some_and(|x| x.selection.data_ack_pending) {
                send_selection_data(ctx);
            }
            return PostAction::Disable;
        }

        let chunk_len = room.min(buffer.len());
        match rustix::io::read(fd, &mut buffer[..chunk_len]) {
            Ok(0) => {
                end_of_selection_data(ctx);
                return PostAction::Remove;
            }
            Ok(read) => {
                let Some(xwm) = ctx.xwm.as_mut() else { return PostAction::Remove };
                xwm.selection.data.extend_from_slice(&buffer[..read]);
            }
            Err(rustix::io::Errno::AGAIN) => return PostAction::Continue,
            Err(err) => {
                log::warn!("reading selection from host failed: {}", err);
                send_selection_notify(ctx, x11rb::NONE);
                if let Some(xwm) = ctx.xwm.as_mut() {
                    xwm.selection.request = None;
                    xwm.selection.read_source = None;
                    xwm.selection.data = Vec::new();
                }
                return PostAction::Remove;
            }
        }
    }
}

fn announce_incr(ctx: &mut Context) {
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    let atoms = xwm.atoms;
    let Some(request) = xwm.selection.request else { return };
    if let Err(err) = x11rb::wrapper::ConnectionExt::change_property32(
        &xwm.conn,
        PropMode::REPLACE,
        request.requestor,
        request.property,
        atoms.INCR,
        &[INCR_CHUNK_SIZE as u32],
    ) {
        log::warn!("announcing INCR failed: {}", err);
    }
    xwm.selection.data_ack_pending = true;
}

fn end_of_selection_data(ctx: &mut Context) {
    let (incremental, ack_pending) = {
        let Some(xwm) = ctx.xwm.as_mut() else { return };
        xwm.selection.read_source = None;
        xwm.selection.read_eof = true;
        (xwm.selection.incremental, xwm.selection.data_ack_pending)
    };
    if !ack_pending {
        // For a one-shot transfer this is the whole payload; for INCR it
        // is the final (possibly empty) chunk.
        send_selection_data(ctx);
    }
    if !incremental {
        let property = ctx.xwm.as_ref().map(|x| x.selection.request_property());
        send_selection_notify(ctx, property.unwrap_or(x11rb::NONE));
        if let Some(xwm) = ctx.xwm.as_mut() {
            xwm.selection.request = None;
            xwm.selection.data = Vec::new();
        }
    }
    if let Some(xwm) = ctx.xwm.as_ref() {
        let _ = xwm.conn.flush();
    }
}

/// Flush the buffered chunk into the requestor's property.
fn send_selection_data(ctx: &mut Context) {
    let Some(xwm) = ctx.xwm.as_mut() else { return };
    debug_assert!(!xwm.selection.data_ack_pending);
    let Some(request) = xwm.selection.request else { return };
    let data_type = xwm.selection.data_type;
    let data = std::mem::take(&mut xwm.selection.data);
    if let Err(err) = x11rb::wrapper::ConnectionExt::change_property8(
        &xwm.conn,
        PropMode::REPLACE,
        request.requestor,
        request.property,
        data_type,
        &data,
    ) {
        log::warn!("writing selection property failed: {}", err);
    }
    xwm.selection.data_ack_pending = true;
    let _ = xwm.conn.flush();
}

/// Property notifications that drive in-flight transfers.
pub fn handle_selection_property_notify(ctx: &mut Context, event: PropertyNotifyEvent) {
    enum What {
        HostChunk(Option<Vec<u8>>),
        RequestorConsumed { had_data: bool, eof: bool },
        Nothing,
    }

    let what = {
        let Some(xwm) = ctx.xwm.as_mut() else { return };
        let atoms = xwm.atoms;
        if event.atom == atoms.WL_SELECTION
            && event.window == xwm.selection.window
            && event.state == Property::NEW_VALUE
            && xwm.selection.send_incremental
        {
            // The X11 owner posted the next INCR chunk for the host.
            let reply = xwm
                .conn
                .get_property(
                    true,
                    xwm.selection.window,
                    atoms.WL_SELECTION,
                    AtomEnum::ANY,
                    0,
                    0x1fffffff,
                )
                .ok()
                .and_then(|c| c.reply().ok());
            match reply {
                Some(reply) if !reply.value.is_empty() => What::HostChunk(Some(reply.value)),
                Some(_) => What::HostChunk(None),
                None => What::Nothing,
            }
        } else if Some(event.atom) == xwm.selection.request.map(|r| r.property)
            && xwm.selection.request.map(|r| r.requestor) == Some(event.window)
            && event.state == Property::DELETE
            && xwm.selection.incremental
        {
            xwm.selection.data_ack_pending = false;
            What::RequestorConsumed {
                had_data: !xwm.selection.data.is_empty(),
                eof: xwm.selection.read_eof,
            }
        } else {
            What::Nothing
        }
    };

    match what {
        What::HostChunk(Some(bytes)) => write_selection_property(ctx, bytes),
        // A zero-length chunk terminates the INCR transfer.
        What::HostChunk(None) => complete_host_send(ctx),
        What::RequestorConsumed { had_data, eof } => {
            if had_data {
                send_selection_data(ctx);
            } else if eof {
                let terminated =
                    ctx.xwm.as_ref().is_some_and(|x| x.selection.terminator_sent);
                if terminated {
                    // The empty terminator was consumed; done.
                    if let Some(xwm) = ctx.xwm.as_mut() {
                        xwm.selection.request = None;
                        xwm.selection.incremental = false;
                        xwm.selection.read_eof = false;
                        xwm.selection.terminator_sent = false;
                    }
                } else {
                    // A zero-length property ends the INCR transfer.
                    send_selection_data(ctx);
                    if let Some(xwm) = ctx.xwm.as_mut() {
                        xwm.selection.terminator_sent = true;
                    }
                }
            }
            if !eof {
                // Resume draining the host pipe.
                if let Some(token) = ctx.xwm.as_ref().and_then(|x| x.selection.read_source) {
                    ctx.loop_handle.enable(&token).ok();
                }
            }
        }
        What::Nothing => {}
    }
}
