// src/platform/keywait.rs

//! Key polling on top of a single "pump one dispatch pass" primitive, so the
//! waiting rules work the same for any event source.

use anyhow::Result;
use std::time::{Duration, Instant};

/// Outcome of `wait_for_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWait {
    Key(u32),
    Quit,
    TimedOut,
}

pub trait KeyPump {
    /// One synchronization check plus one readiness wait and dispatch pass.
    fn pump(&mut self, timeout_ms: i32) -> Result<()>;
    fn is_quit(&self) -> bool;
    fn take_key(&mut self) -> Option<u32>;
}

/// Non-blocking: one zero-timeout pass, then the pending key if any.
pub fn check_for_key<P: KeyPump>(pump: &mut P) -> Result<Option<u32>> {
    pump.pump(0)?;
    Ok(pump.take_key())
}

/// Waits up to `seconds` for a key press or a close request. Checks run in
/// order: deadline, quit, pending key. A deadline past what `Instant` can
/// hold means no deadline.
pub fn wait_for_key<P: KeyPump>(pump: &mut P, seconds: u64, slice_ms: u32) -> Result<KeyWait> {
    let deadline = Instant::now().checked_add(Duration::from_secs(seconds));
    loop {
        let now = Instant::now();
        let remaining = match deadline {
            Some(deadline) if now >= deadline => return Ok(KeyWait::TimedOut),
            Some(deadline) => deadline - now,
            None => Duration::MAX,
        };
        if pump.is_quit() {
            return Ok(KeyWait::Quit);
        }
        if let Some(key) = pump.take_key() {
            return Ok(KeyWait::Key(key));
        }
        pump.pump(wait_slice_ms(remaining, slice_ms))?;
    }
}

/// Milliseconds for the next readiness wait: the time left, capped at
/// `slice_ms`, and never zero so a partial millisecond still blocks.
fn wait_slice_ms(remaining: Duration, slice_ms: u32) -> i32 {
    let ms = remaining.as_millis().min(slice_ms as u128).max(1);
    ms.min(i32::MAX as u128) as i32
}
