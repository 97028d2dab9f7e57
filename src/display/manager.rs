// src/display/manager.rs
//! DisplayContext - the state every compositor notification updates.
//!
//! Replaces a process-wide display struct: the platform glue owns one
//! context and passes it by reference to each handler. It ties the buffer
//! pool to the frame gate so there is a single commit path.

use crate::display::driver::Presenter;
use crate::display::messages::EventHandler;
use crate::display::pool::{BufferId, BufferPool};
use crate::display::sync::FrameSync;
use crate::error::DisplayError;
use log::{debug, info, trace};

pub struct DisplayContext<B> {
    width: u32,
    height: u32,
    pool: BufferPool<B>,
    sync: FrameSync,
    configured: bool,
    quit: bool,
    keyboard: bool,
    key_code: u32,
    anomalies: u64,
}

impl<B> DisplayContext<B> {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pool: BufferPool::new(),
            sync: FrameSync::new(),
            configured: false,
            quit: false,
            keyboard: false,
            key_code: 0,
            anomalies: 0,
        }
    }

    /// Commits the first frame regardless of draw status, seeding the
    /// frame-callback pipeline.
    pub fn submit_initial<P>(&mut self, presenter: &mut P) -> Result<(), DisplayError>
    where
        P: Presenter<Buffer = B>,
    {
        self.submit(presenter)?;
        info!("DisplayContext: initial frame submitted");
        Ok(())
    }

    /// Submits a frame if content changed and the compositor is ready.
    /// Returns whether a frame went out. Never submits after a close request.
    pub fn check_predraw<P>(&mut self, presenter: &mut P) -> Result<bool, DisplayError>
    where
        P: Presenter<Buffer = B>,
    {
        if self.quit || !self.sync.should_submit() {
            return Ok(false);
        }
        self.submit(presenter)?;
        Ok(true)
    }

    // The damage rectangle is always the configured size; an oversized
    // "everything" rectangle is rejected by some compositors.
    fn submit<P>(&mut self, presenter: &mut P) -> Result<(), DisplayError>
    where
        P: Presenter<Buffer = B>,
    {
        presenter.request_frame()?;
        self.sync.arm_callback();
        presenter.damage(self.width, self.height);
        let (id, buffer) = self.pool.acquire(|id| presenter.create_buffer(id))?;
        presenter.attach(buffer);
        presenter.commit();
        presenter.flush()?;
        self.sync.complete_submission();
        trace!(
            "DisplayContext: frame {} committed with {:?}",
            self.sync.submissions(),
            id
        );
        Ok(())
    }

    /// Destroys every pooled buffer. Safe to repeat.
    pub fn teardown<P>(&mut self, presenter: &mut P)
    where
        P: Presenter<Buffer = B>,
    {
        self.pool.destroy_all(|buffer| presenter.destroy_buffer(buffer));
    }

    /// Consumes the last key press, if any.
    pub fn take_key(&mut self) -> Option<u32> {
        match std::mem::take(&mut self.key_code) {
            0 => None,
            key => Some(key),
        }
    }

    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut FrameSync {
        &mut self.sync
    }

    pub fn pool(&self) -> &BufferPool<B> {
        &self.pool
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn is_quit(&self) -> bool {
        self.quit
    }

    pub fn has_keyboard(&self) -> bool {
        self.keyboard
    }

    /// Consistency anomalies seen so far (all logged, none fatal), drawing
    /// included.
    pub fn anomalies(&self) -> u64 {
        self.anomalies + self.sync.anomalies()
    }
}

impl<B> EventHandler for DisplayContext<B> {
    fn on_configure(&mut self, serial: u32) {
        if !self.configured {
            info!("DisplayContext: got surface configure (serial {})", serial);
        }
        self.configured = true;
    }

    fn on_frame_done(&mut self, time: u32) {
        debug!("DisplayContext: frame is done ({})", time);
        self.sync.frame_done();
    }

    fn on_buffer_released(&mut self, id: BufferId) {
        if self.pool.release(id).is_err() {
            self.anomalies += 1;
        }
    }

    fn on_key(&mut self, serial: u32, time: u32, key: u32, pressed: bool) {
        debug!(
            "DisplayContext: key serial:{} time:{} key:{} pressed:{}",
            serial, time, key, pressed
        );
        if pressed {
            self.key_code = key;
        }
    }

    fn on_seat_capabilities(&mut self, keyboard: bool) {
        if keyboard && !self.keyboard {
            info!("DisplayContext: found keyboard");
        } else if !keyboard && self.keyboard {
            info!("DisplayContext: keyboard went away");
        }
        self.keyboard = keyboard;
    }

    fn on_close(&mut self) {
        info!("DisplayContext: close requested");
        self.quit = true;
    }
}
