// src/display/mod.rs
//! Collaborator-neutral presentation core.
//!
//! - Presenter: compositor-side requests (implemented per platform)
//! - DisplayContext: pool + frame gate + connection flags, the event handler
//! - Messages: the single notification type and its handler trait

pub mod driver;
pub mod manager;
pub mod messages;
pub mod pool;
pub mod sync;

#[cfg(test)]
pub mod mock;

pub use driver::Presenter;
pub use manager::DisplayContext;
pub use messages::{DisplayEvent, EventHandler};
pub use pool::{BufferId, BufferPool, BufferState};
pub use sync::{DrawStatus, FramePhase, FrameSync};
