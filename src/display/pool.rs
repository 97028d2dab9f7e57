// src/display/pool.rs

//! Pool of presentable buffers.
//!
//! Slots live in an arena and are addressed by a stable `BufferId`, which
//! also travels with the compositor's release notification. Every slot is in
//! exactly one of two sets: in use (attached, awaiting release) or unused
//! (free to hand out). The pool only grows; handles are destroyed at
//! teardown.

use crate::error::{Anomaly, DisplayError};
use log::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    InUse,
    Unused,
}

#[derive(Debug)]
struct Slot<B> {
    handle: B,
    state: BufferState,
}

#[derive(Debug)]
pub struct BufferPool<B> {
    slots: Vec<Slot<B>>,
    in_use: Vec<BufferId>,
    unused: Vec<BufferId>,
}

impl<B> Default for BufferPool<B> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            in_use: Vec::new(),
            unused: Vec::new(),
        }
    }
}

impl<B> BufferPool<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out an unused buffer, or creates one through `create` when none
    /// is free. The returned buffer is already counted as in use.
    pub fn acquire<F>(&mut self, create: F) -> Result<(BufferId, &B), DisplayError>
    where
        F: FnOnce(BufferId) -> Result<B, DisplayError>,
    {
        let id = match self.unused.pop() {
            Some(id) => {
                trace!("BufferPool: reusing {:?}", id);
                id
            }
            None => {
                let id = BufferId(self.slots.len());
                let handle = create(id)?;
                self.slots.push(Slot {
                    handle,
                    state: BufferState::Unused,
                });
                debug!("BufferPool: created {:?} ({} total)", id, self.slots.len());
                id
            }
        };

        let slot = &mut self.slots[id.0];
        slot.state = BufferState::InUse;
        self.in_use.push(id);
        Ok((id, &slot.handle))
    }

    /// Moves a buffer the compositor let go of back to the unused set.
    /// Unknown or already-unused ids are reported and otherwise ignored.
    pub fn release(&mut self, id: BufferId) -> Result<(), Anomaly> {
        let anomaly = match self.slots.get(id.0).map(|slot| slot.state) {
            None => Anomaly::UnknownBufferReleased(id),
            Some(BufferState::Unused) => Anomaly::BufferReleasedTwice(id),
            Some(BufferState::InUse) => {
                if let Some(pos) = self.in_use.iter().position(|used| *used == id) {
                    self.in_use.swap_remove(pos);
                }
                self.slots[id.0].state = BufferState::Unused;
                self.unused.push(id);
                debug!("BufferPool: buffer {:?} released", id);
                return Ok(());
            }
        };
        warn!("BufferPool: {}", anomaly);
        Err(anomaly)
    }

    /// Hands every handle to `destroy` and empties the pool. A second call
    /// finds nothing to destroy.
    pub fn destroy_all<F>(&mut self, mut destroy: F)
    where
        F: FnMut(B),
    {
        let count = self.slots.len();
        self.in_use.clear();
        self.unused.clear();
        for slot in self.slots.drain(..) {
            destroy(slot.handle);
        }
        if count > 0 {
            debug!("BufferPool: destroyed {} buffers", count);
        }
    }

    pub fn state(&self, id: BufferId) -> Option<BufferState> {
        self.slots.get(id.0).map(|slot| slot.state)
    }

    pub fn in_use(&self) -> &[BufferId] {
        &self.in_use
    }

    pub fn unused(&self) -> &[BufferId] {
        &self.unused
    }

    /// Handles ever created and not yet destroyed.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
