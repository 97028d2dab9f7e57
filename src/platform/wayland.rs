// src/platform/wayland.rs

//! Wayland glue for the presentation core.
//!
//! Binds the globals, builds an xdg toplevel over a single shm pool that
//! aliases the whole `PixelSurface`, and translates every protocol callback
//! into a `DisplayEvent` for `DisplayContext`. The `Presenter` impl is the
//! only place frames reach the compositor.

use crate::config::Config;
use crate::display::{BufferId, DisplayContext, DisplayEvent, EventHandler, Presenter};
use crate::error::DisplayError;
use crate::font::Font;
use crate::os::epoll::{EpollFlags, EventMonitor};
use crate::platform::keywait::{self, KeyPump, KeyWait};
use crate::rasterizer;
use crate::surface::PixelSurface;
use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use std::io;
use std::os::fd::AsRawFd;
use wayland_client::backend::WaylandError;
use wayland_client::{
    protocol::{
        wl_buffer, wl_callback, wl_compositor, wl_keyboard, wl_registry, wl_seat, wl_shm,
        wl_shm_pool, wl_surface,
    },
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum,
};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

// --- Constants ---
const SHM_FORMAT: wl_shm::Format = wl_shm::Format::Xrgb8888;
const WAYLAND_TOKEN: u64 = 1;
/// First `wl_surface` version with `damage_buffer`.
const DAMAGE_BUFFER_SINCE: u32 = 4;
const KEYBOARD_RELEASE_SINCE: u32 = 3;

// --- Protocol objects ---

struct WaylandObjects {
    conn: Connection,
    qh: QueueHandle<WaylandState>,
    registry: Option<wl_registry::WlRegistry>,
    compositor: Option<wl_compositor::WlCompositor>,
    shm: Option<wl_shm::WlShm>,
    seat: Option<wl_seat::WlSeat>,
    wm_base: Option<xdg_wm_base::XdgWmBase>,
    keyboard: Option<wl_keyboard::WlKeyboard>,
    shm_pool: Option<wl_shm_pool::WlShmPool>,
    surface: Option<wl_surface::WlSurface>,
    xdg_surface: Option<xdg_surface::XdgSurface>,
    toplevel: Option<xdg_toplevel::XdgToplevel>,
    frame_callback: Option<wl_callback::WlCallback>,
    width: u32,
    height: u32,
    stride: u32,
}

impl WaylandObjects {
    fn surface(&self) -> Result<&wl_surface::WlSurface, DisplayError> {
        self.surface
            .as_ref()
            .ok_or_else(|| DisplayError::Protocol("no wl_surface".into()))
    }

    fn release_keyboard(&mut self) {
        if let Some(keyboard) = self.keyboard.take() {
            if keyboard.version() >= KEYBOARD_RELEASE_SINCE {
                keyboard.release();
            }
            debug!("Wayland: keyboard released");
        }
    }
}

impl Presenter for WaylandObjects {
    type Buffer = wl_buffer::WlBuffer;

    fn create_buffer(&mut self, id: BufferId) -> Result<wl_buffer::WlBuffer, DisplayError> {
        let pool = self
            .shm_pool
            .as_ref()
            .ok_or_else(|| DisplayError::Allocation("no wl_shm_pool for buffer".into()))?;
        let buffer = pool.create_buffer(
            0,
            self.width as i32,
            self.height as i32,
            self.stride as i32,
            SHM_FORMAT,
            &self.qh,
            id,
        );
        debug!("Wayland: created wl_buffer for {:?}", id);
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: wl_buffer::WlBuffer) {
        buffer.destroy();
    }

    fn request_frame(&mut self) -> Result<(), DisplayError> {
        let callback = self.surface()?.frame(&self.qh, ());
        self.frame_callback = Some(callback);
        Ok(())
    }

    fn damage(&mut self, width: u32, height: u32) {
        if let Some(surface) = &self.surface {
            if surface.version() >= DAMAGE_BUFFER_SINCE {
                surface.damage_buffer(0, 0, width as i32, height as i32);
            } else {
                surface.damage(0, 0, width as i32, height as i32);
            }
        }
    }

    fn attach(&mut self, buffer: &wl_buffer::WlBuffer) {
        if let Some(surface) = &self.surface {
            surface.attach(Some(buffer), 0, 0);
        }
    }

    fn commit(&mut self) {
        if let Some(surface) = &self.surface {
            surface.commit();
        }
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        flush_result(self.conn.flush())
    }
}

struct WaylandState {
    core: DisplayContext<wl_buffer::WlBuffer>,
    objects: WaylandObjects,
}

// --- Display ---

pub struct WaylandDisplay {
    conn: Connection,
    event_queue: EventQueue<WaylandState>,
    state: WaylandState,
    pixels: PixelSurface,
    font: Font,
    monitor: EventMonitor,
    dispatch_slice_ms: u32,
    torn_down: bool,
}

impl WaylandDisplay {
    /// Connects, opens the window and submits the first frame. On failure
    /// everything acquired so far is released before returning.
    pub fn connect(config: &Config, font: Font) -> Result<Self> {
        let window = &config.window;
        let conn = Connection::connect_to_env().map_err(DisplayError::from)?;
        let event_queue = conn.new_event_queue::<WaylandState>();
        let qh = event_queue.handle();

        let mut pixels = PixelSurface::allocate(window.width, window.height)
            .context("Failed to allocate pixel surface")?;
        pixels.fill(window.background);

        let registry = conn.display().get_registry(&qh, ());
        let objects = WaylandObjects {
            conn: conn.clone(),
            qh,
            registry: Some(registry),
            compositor: None,
            shm: None,
            seat: None,
            wm_base: None,
            keyboard: None,
            shm_pool: None,
            surface: None,
            xdg_surface: None,
            toplevel: None,
            frame_callback: None,
            width: pixels.width(),
            height: pixels.height(),
            stride: pixels.stride(),
        };

        let mut display = Self {
            conn,
            event_queue,
            state: WaylandState {
                core: DisplayContext::new(window.width, window.height),
                objects,
            },
            pixels,
            font,
            monitor: EventMonitor::new()?,
            dispatch_slice_ms: config.timing.dispatch_slice_ms.max(1),
            torn_down: false,
        };
        display
            .open_window(&window.title)
            .context("Failed to open Wayland window")?;

        let fd = display.conn.backend().poll_fd().as_raw_fd();
        display.monitor.watch(fd, WAYLAND_TOKEN)?;
        info!(
            "Wayland: window {}x{} ready",
            display.pixels.width(),
            display.pixels.height()
        );
        Ok(display)
    }

    fn open_window(&mut self, title: &str) -> Result<(), DisplayError> {
        self.event_queue.roundtrip(&mut self.state)?;

        let objects = &self.state.objects;
        let compositor = objects
            .compositor
            .clone()
            .ok_or(DisplayError::MissingGlobal("wl_compositor"))?;
        let shm = objects
            .shm
            .clone()
            .ok_or(DisplayError::MissingGlobal("wl_shm"))?;
        objects
            .seat
            .as_ref()
            .ok_or(DisplayError::MissingGlobal("wl_seat"))?;
        let wm_base = objects
            .wm_base
            .clone()
            .ok_or(DisplayError::MissingGlobal("xdg_wm_base"))?;

        // Seat capabilities arrive after the bind.
        self.event_queue.roundtrip(&mut self.state)?;
        if !self.state.core.has_keyboard() {
            warn!("Wayland: seat has no keyboard");
        }

        let qh = self.state.objects.qh.clone();
        let fd = self
            .pixels
            .fd()
            .ok_or_else(|| DisplayError::Allocation("pixel surface already released".into()))?;
        let shm_pool = shm.create_pool(fd, self.pixels.request_size() as i32, &qh, ());
        self.state.objects.shm_pool = Some(shm_pool);

        let surface = compositor.create_surface(&qh, ());
        let xdg_surface = wm_base.get_xdg_surface(&surface, &qh, ());
        let toplevel = xdg_surface.get_toplevel(&qh, ());
        xdg_surface.set_window_geometry(
            0,
            0,
            self.pixels.width() as i32,
            self.pixels.height() as i32,
        );
        toplevel.set_title(title.to_string());
        surface.commit();
        self.state.objects.surface = Some(surface);
        self.state.objects.xdg_surface = Some(xdg_surface);
        self.state.objects.toplevel = Some(toplevel);

        self.event_queue.roundtrip(&mut self.state)?;
        while !self.state.core.is_configured() {
            if self.state.core.is_quit() {
                return Err(DisplayError::Protocol(
                    "window closed before first configure".into(),
                ));
            }
            self.event_queue.blocking_dispatch(&mut self.state)?;
        }

        let WaylandState { core, objects } = &mut self.state;
        core.submit_initial(objects)
    }

    /// Draws one character of the built-in font at pen position (`x`, `y`)
    /// and returns its advance.
    pub fn draw_char(&mut self, x: u32, y: u32, code: u8) -> u32 {
        rasterizer::draw_char(
            &mut self.pixels,
            self.state.core.sync_mut(),
            &self.font,
            x,
            y,
            code,
        )
    }

    /// Submits a frame if one is due.
    pub fn check_predraw(&mut self) -> Result<bool> {
        let WaylandState { core, objects } = &mut self.state;
        Ok(core.check_predraw(objects)?)
    }

    /// One synchronization check, then one bounded readiness wait and
    /// dispatch pass. Negative `timeout_ms` waits indefinitely.
    pub fn poll_for_event(&mut self, timeout_ms: i32) -> Result<()> {
        self.check_predraw()?;

        self.event_queue
            .dispatch_pending(&mut self.state)
            .map_err(DisplayError::from)?;
        self.state.objects.flush()?;

        let guard = self.conn.prepare_read();
        let flags = self.monitor.wait(WAYLAND_TOKEN, timeout_ms)?;

        if let Some(guard) = guard {
            if flags.contains(EpollFlags::EPOLLIN) {
                match guard.read() {
                    Ok(n) => trace!("Wayland: read {} events", n),
                    Err(WaylandError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(DisplayError::from(e).into()),
                }
            }
        }
        if flags.intersects(EpollFlags::EPOLLERR | EpollFlags::EPOLLHUP)
            && !flags.contains(EpollFlags::EPOLLIN)
        {
            return Err(DisplayError::Protocol("compositor connection hung up".into()).into());
        }

        self.event_queue
            .dispatch_pending(&mut self.state)
            .map_err(DisplayError::from)?;
        Ok(())
    }

    /// Non-blocking: one zero-timeout pass, then the pending key if any.
    pub fn check_for_key(&mut self) -> Result<Option<u32>> {
        keywait::check_for_key(self)
    }

    /// Waits up to `seconds` for a key press or a close request.
    pub fn wait_for_key(&mut self, seconds: u64) -> Result<KeyWait> {
        let slice_ms = self.dispatch_slice_ms;
        keywait::wait_for_key(self, seconds, slice_ms)
    }

    /// Consistency anomalies seen by the event handler.
    pub fn anomalies(&self) -> u64 {
        self.state.core.anomalies()
    }

    /// Releases every resource in reverse dependency order. Safe to call
    /// more than once; objects never created are skipped.
    pub fn teardown(&mut self) {
        if !self.torn_down {
            debug!("Wayland: tearing down");
        }

        let WaylandState { core, objects } = &mut self.state;

        objects.release_keyboard();
        objects.frame_callback.take();
        if let Some(toplevel) = objects.toplevel.take() {
            toplevel.destroy();
        }
        if let Some(xdg_surface) = objects.xdg_surface.take() {
            xdg_surface.destroy();
        }
        if let Some(surface) = objects.surface.take() {
            surface.destroy();
        }
        if let Some(wm_base) = objects.wm_base.take() {
            wm_base.destroy();
        }
        objects.seat.take();

        core.teardown(objects);

        if let Some(pool) = objects.shm_pool.take() {
            pool.destroy();
        }
        objects.shm.take();
        objects.compositor.take();
        objects.registry.take();

        if !self.torn_down {
            if let Err(e) = self.conn.flush() {
                debug!("Wayland: final flush failed: {}", e);
            }
        }

        self.pixels.release();
        self.torn_down = true;
    }
}

impl Drop for WaylandDisplay {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl KeyPump for WaylandDisplay {
    fn pump(&mut self, timeout_ms: i32) -> Result<()> {
        self.poll_for_event(timeout_ms)
    }

    fn is_quit(&self) -> bool {
        self.state.core.is_quit()
    }

    fn take_key(&mut self) -> Option<u32> {
        self.state.core.take_key()
    }
}

/// `WouldBlock` only means the socket buffer is full; anything else is fatal.
fn flush_result(result: Result<(), WaylandError>) -> Result<(), DisplayError> {
    match result {
        Err(WaylandError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
        other => other.map_err(DisplayError::from),
    }
}

// --- Dispatch Implementations ---

impl Dispatch<wl_registry::WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        {
            let objects = &mut state.objects;
            match interface.as_str() {
                "wl_compositor" => {
                    let compositor = registry.bind::<wl_compositor::WlCompositor, _, _>(
                        name,
                        version.min(DAMAGE_BUFFER_SINCE),
                        qh,
                        (),
                    );
                    objects.compositor = Some(compositor);
                }
                "wl_shm" => {
                    let shm = registry.bind::<wl_shm::WlShm, _, _>(name, 1, qh, ());
                    objects.shm = Some(shm);
                }
                "wl_seat" => {
                    let seat = registry.bind::<wl_seat::WlSeat, _, _>(
                        name,
                        version.min(KEYBOARD_RELEASE_SINCE),
                        qh,
                        (),
                    );
                    objects.seat = Some(seat);
                }
                "xdg_wm_base" => {
                    let wm_base =
                        registry.bind::<xdg_wm_base::XdgWmBase, _, _>(name, 1, qh, ());
                    objects.wm_base = Some(wm_base);
                }
                _ => return,
            }
            debug!("Wayland: bound {} (v{})", interface, version);
        }
    }
}

impl Dispatch<wl_compositor::WlCompositor, ()> for WaylandState {
    fn event(
        _: &mut Self,
        _: &wl_compositor::WlCompositor,
        _: wl_compositor::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_shm::WlShm, ()> for WaylandState {
    fn event(
        _: &mut Self,
        _: &wl_shm::WlShm,
        _: wl_shm::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, ()> for WaylandState {
    fn event(
        _: &mut Self,
        _: &wl_shm_pool::WlShmPool,
        _: wl_shm_pool::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_buffer::WlBuffer, BufferId> for WaylandState {
    fn event(
        state: &mut Self,
        _: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        id: &BufferId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            state.core.handle(DisplayEvent::BufferReleased(*id));
        }
    }
}

impl Dispatch<wl_surface::WlSurface, ()> for WaylandState {
    fn event(
        _: &mut Self,
        _: &wl_surface::WlSurface,
        _: wl_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_callback::WlCallback, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _: &wl_callback::WlCallback,
        event: wl_callback::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { callback_data } = event {
            state.objects.frame_callback = None;
            state.core.handle(DisplayEvent::FrameDone {
                time: callback_data,
            });
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for WaylandState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(caps),
        } = event
        {
            let keyboard = caps.contains(wl_seat::Capability::Keyboard);
            if keyboard && state.objects.keyboard.is_none() {
                state.objects.keyboard = Some(seat.get_keyboard(qh, ()));
            } else if !keyboard {
                state.objects.release_keyboard();
            }
            state
                .core
                .handle(DisplayEvent::SeatCapabilities { keyboard });
        }
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Key {
                serial,
                time,
                key,
                state: key_state,
            } => {
                let pressed = key_state == WEnum::Value(wl_keyboard::KeyState::Pressed);
                state.core.handle(DisplayEvent::Key {
                    serial,
                    time,
                    key,
                    pressed,
                });
            }
            // The keymap descriptor is closed when `fd` drops; raw codes suffice.
            wl_keyboard::Event::Keymap { format, .. } => {
                trace!("Wayland: keymap {:?} ignored", format);
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for WaylandState {
    fn event(
        _: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            trace!("Wayland: ping {}", serial);
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for WaylandState {
    fn event(
        state: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
            state.core.handle(DisplayEvent::Configure { serial });
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        // Size is fixed; toplevel configure hints are ignored.
        if let xdg_toplevel::Event::Close = event {
            state.core.handle(DisplayEvent::Close);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_treat_a_full_socket_as_a_successful_flush() {
        let full = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(flush_result(Err(WaylandError::Io(full))).is_ok());
        assert!(flush_result(Ok(())).is_ok());
    }

    #[test]
    fn it_should_fail_the_flush_on_a_broken_connection() {
        let broken = io::Error::from(io::ErrorKind::BrokenPipe);
        let err = flush_result(Err(WaylandError::Io(broken))).unwrap_err();
        assert!(matches!(err, DisplayError::Backend(_)));
    }
}
