//! The epoll selector: `epoll_create1`/`epoll_ctl`/`epoll_wait`, edge-triggered.
//!
//! Grounded directly in the teacher's `sys/unix/selector/epoll.rs`
//! (`Selector::new`/`register`/`reregister`/`deregister`/`select`), adapted
//! from mio's `Token`-keyed registration to this crate's descriptor-state
//! model: the `epoll_event.u64` payload carries the raw [`Handle`] itself,
//! since the reactor (C8) looks descriptor state up by `Handle` directly
//! rather than through an intermediate token table.
//!
//! Every registration always asks for the full readiness set
//! (`EPOLLIN | EPOLLOUT | EPOLLRDHUP | EPOLLPRI`) plus `EPOLLET`: the
//! readiness cache (C6) mirrors all six bits unconditionally for every
//! registered descriptor rather than tracking which directions a caller
//! currently cares about, so there is only ever one interest mask.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use crate::handle::Handle;

const INTEREST_FLAGS: u32 =
    (libc::EPOLLIN | libc::EPOLLOUT | libc::EPOLLRDHUP | libc::EPOLLPRI | libc::EPOLLET) as u32;

/// A thin wrapper around one epoll instance.
#[derive(Debug)]
pub struct Selector {
    ep: OwnedFd,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        // SAFETY: `epoll_create1(2)` returns a valid fd or -1.
        let ep = unsafe { OwnedFd::from_raw_fd(syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?) };
        Ok(Selector { ep })
    }

    pub fn register(&self, handle: Handle) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: INTEREST_FLAGS,
            u64: handle as u64,
        };
        syscall!(epoll_ctl(self.ep.as_raw_fd(), libc::EPOLL_CTL_ADD, handle, &mut event)).map(|_| ())
    }

    pub fn deregister(&self, handle: Handle) -> io::Result<()> {
        syscall!(epoll_ctl(
            self.ep.as_raw_fd(),
            libc::EPOLL_CTL_DEL,
            handle,
            std::ptr::null_mut(),
        ))
        .map(|_| ())
    }

    /// Block until at least one descriptor is ready or `timeout` elapses
    /// (`None` blocks indefinitely). Retries transparently on `EINTR`, per
    /// the propagation policy (signals never surface on the kernel wait).
    pub fn select(&self, events: &mut Vec<libc::epoll_event>, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = timeout
            .map(|to| {
                to.checked_add(Duration::from_nanos(999_999))
                    .unwrap_or(to)
                    .as_millis() as libc::c_int
            })
            .unwrap_or(-1);

        events.clear();
        loop {
            let ep = self.ep.as_raw_fd();
            let cap = events.capacity();
            match syscall!(epoll_wait(ep, events.as_mut_ptr(), cap as i32, timeout_ms)) {
                Ok(n) => {
                    // SAFETY: `epoll_wait` just initialized the first `n`
                    // slots of the buffer we gave it.
                    unsafe { events.set_len(n as usize) };
                    return Ok(());
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl AsRawFd for Selector {
    fn as_raw_fd(&self) -> RawFd {
        self.ep.as_raw_fd()
    }
}

/// Decode the [`Handle`] an epoll event refers to.
pub fn event_handle(event: &libc::epoll_event) -> Handle {
    event.u64 as Handle
}

pub fn event_flags(event: &libc::epoll_event) -> u32 {
    event.events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_registers_and_deregisters_a_pipe() {
        let selector = Selector::new().expect("epoll_create1");
        let mut fds = [0i32; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        let [read_fd, write_fd] = fds;

        selector.register(read_fd).expect("register");
        selector.deregister(read_fd).expect("deregister");

        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }

    #[test]
    fn select_reports_a_pipe_becoming_readable() {
        let selector = Selector::new().expect("epoll_create1");
        let mut fds = [0i32; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let [read_fd, write_fd] = fds;
        selector.register(read_fd).expect("register");

        let byte = [1u8];
        assert_eq!(unsafe { libc::write(write_fd, byte.as_ptr() as *const _, 1) }, 1);

        let mut events = Vec::with_capacity(4);
        selector.select(&mut events, Some(Duration::from_secs(1))).expect("select");
        assert_eq!(events.len(), 1);
        assert_eq!(event_handle(&events[0]), read_fd);
        assert_ne!(event_flags(&events[0]) & libc::EPOLLIN as u32, 0);

        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }
}
