// src/platform/mod.rs
//
// Compositor-specific glue. Only Wayland is supported.

pub mod keywait;
pub mod wayland;

pub use keywait::KeyWait;
pub use wayland::WaylandDisplay;
