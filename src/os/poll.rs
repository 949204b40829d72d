// src/os/poll.rs

//! Readiness watcher over a single input descriptor, built on raw `libc`
//! epoll calls.
//!
//! The registration is one-shot (`EPOLLONESHOT`): after a wake-up is
//! delivered the descriptor stays muted until [`ReadyWatch::rearm`] is
//! called. That gives the event bridge an explicit re-arm point, so a
//! drain that stops early (callback error or cancellation) simply never
//! re-arms and polling is left disabled.

use anyhow::{Context, Result};
use bitflags::bitflags;
use log::{debug, trace, warn};
use std::io;
use std::os::unix::io::RawFd;

bitflags! {
    /// Readiness bits reported by a wake-up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReadyFlags: u32 {
        const READABLE = libc::EPOLLIN as u32;
        const ERROR    = libc::EPOLLERR as u32;
        const HANGUP   = libc::EPOLLHUP as u32;
    }
}

const ARM_FLAGS: u32 = (libc::EPOLLIN | libc::EPOLLONESHOT) as u32;

/// Watches at most one file descriptor for read-readiness.
#[derive(Debug)]
pub struct ReadyWatch {
    epoll_fd: RawFd,
    watched: Option<RawFd>,
}

impl ReadyWatch {
    pub fn new() -> Result<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(libc::O_CLOEXEC) };
        if epoll_fd == -1 {
            return Err(io::Error::last_os_error())
                .context("Failed to create epoll instance (epoll_create1)");
        }
        debug!("ReadyWatch created with epoll_fd {}", epoll_fd);
        Ok(Self {
            epoll_fd,
            watched: None,
        })
    }

    pub fn is_watching(&self) -> bool {
        self.watched.is_some()
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd) -> Result<()> {
        let mut event = libc::epoll_event {
            events: ARM_FLAGS,
            u64: fd as u64,
        };
        if unsafe { libc::epoll_ctl(self.epoll_fd, op, fd, &mut event) } == -1 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("epoll_ctl(op {}) failed for fd {}", op, fd));
        }
        Ok(())
    }

    /// Registers `fd` armed for one read-readiness wake-up.
    pub fn watch(&mut self, fd: RawFd) -> Result<()> {
        debug_assert!(self.watched.is_none(), "watch() while already watching");
        self.ctl(libc::EPOLL_CTL_ADD, fd)?;
        self.watched = Some(fd);
        trace!("ReadyWatch: armed fd {} on epoll_fd {}", fd, self.epoll_fd);
        Ok(())
    }

    /// Re-arms the watched descriptor for the next wake-up.
    pub fn rearm(&mut self) -> Result<()> {
        let fd = self.watched.context("rearm() without a watched fd")?;
        self.ctl(libc::EPOLL_CTL_MOD, fd)?;
        trace!("ReadyWatch: re-armed fd {}", fd);
        Ok(())
    }

    /// Drops the registration. No-op when nothing is watched.
    pub fn unwatch(&mut self) -> Result<()> {
        let Some(fd) = self.watched.take() else {
            return Ok(());
        };
        let mut event: libc::epoll_event = unsafe { std::mem::zeroed() };
        if unsafe { libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, &mut event) } == -1 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to delete fd {} from epoll", fd));
        }
        trace!("ReadyWatch: dropped fd {}", fd);
        Ok(())
    }

    /// Blocks up to `timeout_ms` (-1 for no timeout) for a wake-up.
    /// Returns `None` on timeout or `EINTR`.
    pub fn wait(&mut self, timeout_ms: i32) -> Result<Option<ReadyFlags>> {
        let mut event: libc::epoll_event = unsafe { std::mem::zeroed() };
        let n = unsafe { libc::epoll_wait(self.epoll_fd, &mut event, 1, timeout_ms) };
        if n == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                trace!("ReadyWatch: epoll_wait interrupted (EINTR)");
                return Ok(None);
            }
            return Err(err).context("epoll_wait failed in ReadyWatch");
        }
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(ReadyFlags::from_bits_truncate(event.events)))
    }
}

impl Drop for ReadyWatch {
    fn drop(&mut self) {
        if unsafe { libc::close(self.epoll_fd) } == -1 {
            warn!(
                "Failed to close epoll_fd {} in ReadyWatch::drop: {}",
                self.epoll_fd,
                io::Error::last_os_error()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe_pair() -> (RawFd, RawFd) {
        let mut fds = [0 as RawFd; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (fds[0], fds[1])
    }

    #[test]
    fn oneshot_wakeup_requires_rearm() {
        let (rd, wr) = pipe_pair();
        let mut watch = ReadyWatch::new().unwrap();
        watch.watch(rd).unwrap();

        assert_eq!(watch.wait(0).unwrap(), None);

        assert_eq!(unsafe { libc::write(wr, b"x".as_ptr().cast(), 1) }, 1);
        let flags = watch.wait(1000).unwrap().expect("readable wake-up");
        assert!(flags.contains(ReadyFlags::READABLE));

        // oneshot: still readable, but muted until re-armed
        assert_eq!(watch.wait(0).unwrap(), None);
        watch.rearm().unwrap();
        assert!(watch.wait(1000).unwrap().is_some());

        watch.unwatch().unwrap();
        unsafe {
            libc::close(rd);
            libc::close(wr);
        }
    }

    #[test]
    fn unwatch_is_idempotent() {
        let mut watch = ReadyWatch::new().unwrap();
        assert!(!watch.is_watching());
        watch.unwatch().unwrap();
        watch.unwatch().unwrap();
    }
}
