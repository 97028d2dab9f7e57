// src/display/sync.rs

//! Frame synchronization: gates submissions on "content changed" and
//! "compositor ready" so at most one frame callback is ever outstanding.

use bitflags::bitflags;
use log::{debug, trace};

bitflags! {
    /// `PREDRAWN`: pixels changed since the last submission.
    /// `READY`: the last frame callback fired.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawStatus: u8 {
        const PREDRAWN = 1 << 0;
        const READY    = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    /// A frame-done notification has been requested and not yet delivered.
    CallbackArmed,
}

#[derive(Debug, Default)]
pub struct FrameSync {
    status: DrawStatus,
    phase: FramePhase,
    submissions: u64,
    anomalies: u64,
}

impl FrameSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> DrawStatus {
        self.status
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Frames committed so far, the initial one included.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    /// Drawing anomalies (malformed glyph streams) seen so far.
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    pub fn record_anomaly(&mut self) {
        self.anomalies += 1;
    }

    pub fn mark_predrawn(&mut self) {
        self.status.insert(DrawStatus::PREDRAWN);
    }

    /// The armed callback was consumed; a new frame may be submitted.
    pub fn frame_done(&mut self) {
        if self.phase != FramePhase::CallbackArmed {
            debug!("FrameSync: frame done with no callback armed");
        }
        self.phase = FramePhase::Idle;
        self.status.insert(DrawStatus::READY);
        trace!("FrameSync: ready, status {:?}", self.status);
    }

    pub fn should_submit(&self) -> bool {
        self.status.contains(DrawStatus::PREDRAWN | DrawStatus::READY)
    }

    pub(super) fn arm_callback(&mut self) {
        self.phase = FramePhase::CallbackArmed;
    }

    /// Both flags drop together, exactly when a frame goes out.
    pub(super) fn complete_submission(&mut self) {
        self.status = DrawStatus::empty();
        self.submissions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_start_with_both_flags_clear() {
        let sync = FrameSync::new();
        assert!(sync.status().is_empty());
        assert_eq!(sync.phase(), FramePhase::Idle);
        assert!(!sync.should_submit());
    }

    #[test]
    fn it_should_require_both_content_and_readiness() {
        let mut sync = FrameSync::new();
        sync.mark_predrawn();
        assert!(!sync.should_submit());

        let mut sync = FrameSync::new();
        sync.frame_done();
        assert!(!sync.should_submit());

        sync.mark_predrawn();
        assert!(sync.should_submit());
    }

    #[test]
    fn it_should_clear_both_flags_on_submission() {
        let mut sync = FrameSync::new();
        sync.mark_predrawn();
        sync.frame_done();
        sync.arm_callback();
        sync.complete_submission();
        assert!(sync.status().is_empty());
        assert_eq!(sync.phase(), FramePhase::CallbackArmed);
        assert_eq!(sync.submissions(), 1);
    }
}
