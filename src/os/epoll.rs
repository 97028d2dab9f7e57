// src/os/epoll.rs

//! Readiness wait over `epoll`, using raw `libc` calls.
//!
//! The display loop watches exactly one descriptor (the compositor
//! connection) with a bounded timeout; a timeout simply hands control back
//! to the caller.

use anyhow::{Context, Result};
use bitflags::bitflags;
use log::{debug, trace};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

const MAX_EVENTS_BUFFER_SIZE: usize = 4;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EpollFlags: u32 {
        const EPOLLIN = libc::EPOLLIN as u32;
        const EPOLLERR = libc::EPOLLERR as u32;
        const EPOLLHUP = libc::EPOLLHUP as u32;
    }
}

#[derive(Debug)]
pub struct EventMonitor {
    epoll_fd: OwnedFd,
    event_buffer: [libc::epoll_event; MAX_EVENTS_BUFFER_SIZE],
}

impl EventMonitor {
    pub fn new() -> Result<Self> {
        let raw = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if raw == -1 {
            return Err(io::Error::last_os_error())
                .context("Failed to create epoll instance (epoll_create1)");
        }
        debug!("EventMonitor created with epoll_fd: {}", raw);
        Ok(Self {
            epoll_fd: unsafe { OwnedFd::from_raw_fd(raw) },
            event_buffer: [libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS_BUFFER_SIZE],
        })
    }

    /// Starts watching `fd` for input.
    pub fn watch(&self, fd: RawFd, token: u64) -> Result<()> {
        let mut event = libc::epoll_event {
            events: EpollFlags::EPOLLIN.bits(),
            u64: token,
        };
        if unsafe {
            libc::epoll_ctl(
                self.epoll_fd.as_raw_fd(),
                libc::EPOLL_CTL_ADD,
                fd,
                &mut event,
            )
        } == -1
        {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to add fd {} to epoll (token: {})", fd, token));
        }
        trace!("Watching fd {} with token {}", fd, token);
        Ok(())
    }

    /// Blocks up to `timeout_ms` (negative waits forever). Returns the flags
    /// reported for `token`, empty on timeout or interruption.
    pub fn wait(&mut self, token: u64, timeout_ms: i32) -> Result<EpollFlags> {
        let num_events = unsafe {
            libc::epoll_wait(
                self.epoll_fd.as_raw_fd(),
                self.event_buffer.as_mut_ptr(),
                MAX_EVENTS_BUFFER_SIZE as libc::c_int,
                timeout_ms,
            )
        };

        if num_events == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                trace!("EventMonitor: epoll_wait interrupted (EINTR)");
                return Ok(EpollFlags::empty());
            }
            return Err(err).context("epoll_wait failed in EventMonitor");
        }

        let flags = self.event_buffer[..num_events as usize]
            .iter()
            .filter(|event| {
                let event_token = event.u64;
                event_token == token
            })
            .fold(EpollFlags::empty(), |acc, event| {
                acc | EpollFlags::from_bits_truncate(event.events)
            });
        trace!("EventMonitor: {} events, flags {:?}", num_events, flags);
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    fn pipe() -> (OwnedFd, OwnedFd) {
        let mut fds: [RawFd; 2] = [0; 2];
        assert_eq!(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) }, 0);
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[test]
    fn it_should_time_out_when_nothing_is_readable() {
        let (read, _write) = pipe();
        let mut monitor = EventMonitor::new().unwrap();
        monitor.watch(read.as_raw_fd(), 1).unwrap();

        assert!(monitor.wait(1, 10).unwrap().is_empty());
    }

    #[test]
    fn it_should_report_input_on_the_watched_descriptor() {
        let (read, write) = pipe();
        let mut monitor = EventMonitor::new().unwrap();
        monitor.watch(read.as_raw_fd(), 7).unwrap();

        let byte = [1u8];
        let written = unsafe { libc::write(write.as_raw_fd(), byte.as_ptr().cast(), 1) };
        assert_eq!(written, 1);

        assert!(monitor.wait(7, 1000).unwrap().contains(EpollFlags::EPOLLIN));
    }
}
