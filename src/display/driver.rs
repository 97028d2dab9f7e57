// src/display/driver.rs
//! Presenter trait - the compositor-side requests the core issues.
//!
//! The core never talks to a display server directly. Everything it needs to
//! put a frame on screen goes through these primitives; the Wayland glue
//! implements them over `wl_surface` and `wl_shm_pool`, and tests implement
//! them with a recorder.
//!
//! ## Submission order
//! `request_frame` → `damage` → `attach` → `commit` → `flush`

use crate::display::pool::BufferId;
use crate::error::DisplayError;

pub trait Presenter {
    /// Presentation handle bound to the shared pixel region.
    type Buffer;

    /// Creates a handle over the whole surface at offset 0. `id` must come
    /// back in the release notification for this handle.
    fn create_buffer(&mut self, id: BufferId) -> Result<Self::Buffer, DisplayError>;

    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    /// Arms a one-shot frame-done notification.
    fn request_frame(&mut self) -> Result<(), DisplayError>;

    fn damage(&mut self, width: u32, height: u32);

    fn attach(&mut self, buffer: &Self::Buffer);

    fn commit(&mut self);

    fn flush(&mut self) -> Result<(), DisplayError>;
}
