// src/display/messages.rs
//! Notifications delivered by the compositor, as one event type.
//!
//! The platform glue translates each native callback into a `DisplayEvent`
//! and hands it to an `EventHandler`; the core context implements the
//! handler. One dispatch pass delivers events strictly in arrival order.

use crate::display::pool::BufferId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// Surface geometry acknowledged by the compositor.
    Configure { serial: u32 },

    /// The armed frame callback fired.
    FrameDone { time: u32 },

    /// The compositor stopped reading a buffer.
    BufferReleased(BufferId),

    /// Keyboard key transition. Only presses update the pending key.
    Key {
        serial: u32,
        time: u32,
        key: u32,
        pressed: bool,
    },

    /// Seat capabilities changed.
    SeatCapabilities { keyboard: bool },

    /// The user asked to close the window.
    Close,
}

pub trait EventHandler {
    fn on_configure(&mut self, serial: u32);
    fn on_frame_done(&mut self, time: u32);
    fn on_buffer_released(&mut self, id: BufferId);
    fn on_key(&mut self, serial: u32, time: u32, key: u32, pressed: bool);
    fn on_seat_capabilities(&mut self, keyboard: bool);
    fn on_close(&mut self);

    fn handle(&mut self, event: DisplayEvent) {
        match event {
            DisplayEvent::Configure { serial } => self.on_configure(serial),
            DisplayEvent::FrameDone { time } => self.on_frame_done(time),
            DisplayEvent::BufferReleased(id) => self.on_buffer_released(id),
            DisplayEvent::Key {
                serial,
                time,
                key,
                pressed,
            } => self.on_key(serial, time, key, pressed),
            DisplayEvent::SeatCapabilities { keyboard } => self.on_seat_capabilities(keyboard),
            DisplayEvent::Close => self.on_close(),
        }
    }
}
