// src/error.rs

//! Error taxonomy for the display core.
//!
//! `DisplayError` is fatal: it unwinds to the single teardown path.
//! `Anomaly` is a consistency problem that is logged and counted, never
//! propagated.

use crate::display::pool::BufferId;
use thiserror::Error;
use wayland_client::backend::WaylandError;
use wayland_client::{ConnectError, DispatchError};

#[derive(Error, Debug)]
pub enum DisplayError {
    /// Backing store or protocol object could not be created.
    #[error("allocation failed: {0}")]
    Allocation(String),
    /// A required call into the compositor reported failure.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("compositor does not advertise required global `{0}`")]
    MissingGlobal(&'static str),
    #[error("failed to connect to the Wayland display: {0}")]
    Connect(#[from] ConnectError),
    #[error("Wayland dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Wayland connection error: {0}")]
    Backend(#[from] WaylandError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    #[error("unknown buffer {0:?} released")]
    UnknownBufferReleased(BufferId),
    #[error("buffer {0:?} released while already unused")]
    BufferReleasedTwice(BufferId),
    #[error("glyph {code:#04x}: run-length stream ended mid-run ({consumed} of {len} bytes)")]
    TruncatedGlyphStream { code: u8, consumed: usize, len: usize },
}
