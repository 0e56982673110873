//! Readiness cache & descriptor state (C6).
//!
//! Under edge-triggered epoll a descriptor only raises an event when its
//! readiness *changes*, so the reactor must remember the last-known state
//! itself rather than re-asking the kernel. [`Readiness`] is that memory: six
//! independent bits, mirroring the `EPOLLIN`/`EPOLLOUT`/`EPOLLRDHUP`/
//! `EPOLLPRI`/`EPOLLERR`/`EPOLLHUP` flags epoll reports. The teacher's own
//! edge-triggered bookkeeping (`sys/unix/selector/io_source/edge_triggered.rs`
//! — `IoSourceState`/`InternalState`) is the direct model: clear the relevant
//! bit the moment a syscall returns would-block, and only a fresh kernel
//! event is allowed to set it again.

use std::collections::VecDeque;

use crate::handle::Handle;
use crate::queue::{AddressedRecv, AddressedSend, Completion, PendingQueue};

/// The six readiness bits cached per descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    readable: bool,
    writable: bool,
    read_hangup: bool,
    priority: bool,
    error: bool,
    hangup: bool,
}

impl Readiness {
    pub fn new() -> Readiness {
        Readiness::default()
    }

    /// Merge in the bits an epoll event reported, latching `error`/`hangup`
    /// (they never clear on their own — a descriptor that has erred or hung
    /// up stays that way until it is deregistered).
    pub fn merge_event(&mut self, events: u32) {
        if events & (libc::EPOLLIN as u32) != 0 {
            self.readable = true;
        }
        if events & (libc::EPOLLOUT as u32) != 0 {
            self.writable = true;
        }
        if events & (libc::EPOLLRDHUP as u32) != 0 {
            self.read_hangup = true;
        }
        if events & (libc::EPOLLPRI as u32) != 0 {
            self.priority = true;
        }
        if events & (libc::EPOLLERR as u32) != 0 {
            self.error = true;
        }
        if events & (libc::EPOLLHUP as u32) != 0 {
            self.hangup = true;
        }
    }

    /// Clear the readable bit after a read attempt returns would-block.
    pub fn clear_readable(&mut self) {
        self.readable = false;
    }

    /// Clear the writable bit after a write attempt returns would-block.
    pub fn clear_writable(&mut self) {
        self.writable = false;
    }

    pub fn readable(&self) -> bool {
        self.readable
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn read_hangup(&self) -> bool {
        self.read_hangup
    }

    pub fn priority(&self) -> bool {
        self.priority
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn hangup(&self) -> bool {
        self.hangup
    }

    /// True once either latching terminal bit (error or hangup) has been
    /// observed; the descriptor's queues should be drained to completion
    /// (with the terminal error) rather than left waiting for more events.
    pub fn is_terminal(&self) -> bool {
        self.error || self.hangup
    }
}

/// Per-descriptor bookkeeping: its cached readiness plus its two directional
/// pending-work queues (C3).
#[derive(Default)]
pub struct DescriptorState {
    pub readiness: Readiness,
    pub read_queue: PendingQueue,
    pub write_queue: PendingQueue,
    /// Listener-only: completions waiting for a new connection. Kept here
    /// rather than in `net::tcp` so the reactor can drain it the same way
    /// it drains `read_queue`/`write_queue`, on the same readiness bit
    /// (`accept` suspends and resumes on readability exactly like `recv`).
    pub accept_queue: VecDeque<Completion<Handle>>,
    /// Stream-only: completions waiting on a non-blocking connect to settle,
    /// resolved against `SO_ERROR` the moment the descriptor becomes
    /// writable (§4.6).
    pub connect_queue: VecDeque<Completion<()>>,
    /// Datagram-only: queued `send_to`/`recv_from` calls that would-blocked
    /// on their first attempt. Address-carrying, so they cannot reuse
    /// `read_queue`/`write_queue`'s byte-oriented `Intent`.
    pub send_to_queue: VecDeque<AddressedSend>,
    pub recv_from_queue: VecDeque<AddressedRecv>,
}

impl DescriptorState {
    pub fn new() -> DescriptorState {
        DescriptorState::default()
    }

    pub fn is_idle(&self) -> bool {
        self.read_queue.is_empty()
            && self.write_queue.is_empty()
            && self.accept_queue.is_empty()
            && self.connect_queue.is_empty()
            && self.send_to_queue.is_empty()
            && self.recv_from_queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_event_sets_only_reported_bits() {
        let mut r = Readiness::new();
        r.merge_event((libc::EPOLLIN | libc::EPOLLOUT) as u32);
        assert!(r.readable());
        assert!(r.writable());
        assert!(!r.hangup());
    }

    #[test]
    fn would_block_clears_only_its_own_direction() {
        let mut r = Readiness::new();
        r.merge_event((libc::EPOLLIN | libc::EPOLLOUT) as u32);
        r.clear_readable();
        assert!(!r.readable());
        assert!(r.writable());
    }

    #[test]
    fn error_and_hangup_latch() {
        let mut r = Readiness::new();
        r.merge_event(libc::EPOLLERR as u32);
        assert!(r.is_terminal());
        r.clear_readable();
        r.clear_writable();
        assert!(r.is_terminal());
    }

    #[test]
    fn descriptor_state_starts_idle() {
        let state = DescriptorState::new();
        assert!(state.is_idle());
    }
}
