//! Bounded recorder for wl_touch event frames.
//!
//! Touch events arrive one at a time but only make sense as frames. The
//! recorder buffers everything up to the next `frame` or `cancel`, at
//! which point the whole batch is handed back to the caller for routing,
//! either to the guest touch resource or to the tablet emulation when the
//! frame turns out to belong to a pen.
//!
//! The buffer is bounded; once it is full only a terminating `frame` or
//! `cancel` is still recorded in the reserved last slot, so a runaway
//! host cannot grow the buffer and a frame boundary is never lost.

use smallvec::SmallVec;

/// Capacity of the recorder, including the reserved terminator slot.
pub const CAPACITY: usize = 32;

/// Kind of a recorded touch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEventKind {
    /// Slot voided by [`TouchRecorder::purge_id`].
    None,
    /// wl_touch.down
    Down,
    /// wl_touch.up
    Up,
    /// wl_touch.motion
    Motion,
}

/// One recorded touch event. `S` identifies the surface of down events;
/// the proxy fabric uses host surface ids here.
#[derive(Debug, Clone)]
pub struct TouchEvent<S> {
    /// Event kind.
    pub kind: TouchEventKind,
    /// Protocol serial (down/up only).
    pub serial: u32,
    /// Timestamp in milliseconds.
    pub time: u32,
    /// Surface entered by a down event.
    pub surface: Option<S>,
    /// Touch point id.
    pub id: i32,
    /// Surface-local X.
    pub x: f64,
    /// Surface-local Y.
    pub y: f64,
}

/// How a batch was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Terminated by wl_touch.frame.
    Frame,
    /// Terminated by wl_touch.cancel.
    Cancel,
}

/// The recorder itself.
#[derive(Debug)]
pub struct TouchRecorder<S> {
    events: SmallVec<[TouchEvent<S>; CAPACITY]>,
}

impl<S> Default for TouchRecorder<S> {
    fn default() -> Self {
        TouchRecorder { events: SmallVec::new() }
    }
}

impl<S: Clone> TouchRecorder<S> {
    /// Record a non-terminating event. Dropped silently when the buffer is
    /// full (the last slot stays reserved for the terminator).
    pub fn record(&mut self, event: TouchEvent<S>) {
        if self.events.len() < CAPACITY - 1 {
            self.events.push(event);
        }
    }

    /// Record a down event.
    pub fn down(&mut self, serial: u32, time: u32, surface: S, id: i32, x: f64, y: f64) {
        self.record(TouchEvent {
            kind: TouchEventKind::Down,
            serial,
            time,
            surface: Some(surface),
            id,
            x,
            y,
        });
    }

    /// Record an up event.
    pub fn up(&mut self, serial: u32, time: u32, id: i32) {
        self.record(TouchEvent {
            kind: TouchEventKind::Up,
            serial,
            time,
            surface: None,
            id,
            x: 0.0,
            y: 0.0,
        });
    }

    /// Record a motion event.
    pub fn motion(&mut self, time: u32, id: i32, x: f64, y: f64) {
        self.record(TouchEvent {
            kind: TouchEventKind::Motion,
            serial: 0,
            time,
            surface: None,
            id,
            x,
            y,
        });
    }

    /// Terminate the batch, returning the buffered events for replay.
    pub fn finish(&mut self, kind: FrameKind) -> (FrameKind, Vec<TouchEvent<S>>) {
        let events = self.events.drain(..).collect();
        (kind, events)
    }

    /// Void every buffered event of one touch id, used when a frame is
    /// re-routed to the tablet protocol.
    pub fn purge_id(&mut self, id: i32) {
        for event in &mut self.events {
            if event.id == id {
                event.kind = TouchEventKind::None;
            }
        }
    }

    /// Touch ids present in the buffer.
    pub fn ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .events
            .iter()
            .filter(|e| e.kind != TouchEventKind::None)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> TouchRecorder<u32> {
        TouchRecorder::default()
    }

    #[test]
    fn frame_returns_buffered_events_in_order() {
        let mut r = recorder();
        r.down(1, 10, 7, 0, 1.0, 2.0);
        r.motion(11, 0, 3.0, 4.0);
        r.up(2, 12, 0);
        let (kind, events) = r.finish(FrameKind::Frame);
        assert_eq!(kind, FrameKind::Frame);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, TouchEventKind::Down);
        assert_eq!(events[0].surface, Some(7));
        assert_eq!(events[2].kind, TouchEventKind::Up);
        assert!(r.finish(FrameKind::Frame).1.is_empty());
    }

    #[test]
    fn overflow_drops_events_but_keeps_frame_boundary() {
        let mut r = recorder();
        for i in 0..(CAPACITY as i32 * 2) {
            r.motion(i as u32, 0, i as f64, 0.0);
        }
        let (_, events) = r.finish(FrameKind::Frame);
        assert_eq!(events.len(), CAPACITY - 1);
    }

    #[test]
    fn purge_voids_only_matching_id() {
        let mut r = recorder();
        r.down(1, 10, 7, 0, 1.0, 2.0);
        r.down(2, 10, 7, 1, 5.0, 6.0);
        r.motion(11, 0, 3.0, 4.0);
        r.purge_id(0);
        assert_eq!(r.ids(), vec![1]);
        let (_, events) = r.finish(FrameKind::Cancel);
        let live: Vec<_> =
            events.iter().filter(|e| e.kind != TouchEventKind::None).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, 1);
    }
}
