//! The UDP half of the socket façade (C9): `UdpSocket`.
//!
//! Connected-mode `send`/`recv` participate in the same pending-work queue
//! as TCP (C3), since they reduce to the same byte-oriented `send(2)`/
//! `recv(2)` pair. Unconnected `send_to`/`recv_from` carry a destination or
//! source address the byte-oriented [`crate::queue::Intent`] type has no
//! room for, so they go through their own address-carrying queue
//! (`crate::queue::AddressedSend`/`AddressedRecv`) instead: would-block is
//! absorbed into a wait like every other operation (§7 — it is never
//! surfaced to the caller as an error).

use std::net::SocketAddr;
use std::os::fd::AsRawFd;

use crate::buf::OwningBuffer;
use crate::error::{ErrorCode, Result};
use crate::future::IoFuture;
use crate::handle::OwnedHandle;
use crate::queue::{Completion, IntentId};
use crate::reactor::SharedReactor;
use crate::sys::syscalls;

pub struct UdpSocket {
    handle: OwnedHandle,
    reactor: SharedReactor,
}

impl UdpSocket {
    pub fn bind(reactor: &SharedReactor, addr: SocketAddr) -> Result<UdpSocket> {
        let domain = if addr.is_ipv4() { libc::AF_INET } else { libc::AF_INET6 };
        let fd = syscalls::socket(domain, libc::SOCK_DGRAM, 0).map_err(ErrorCode::from)?;
        let handle = fd.as_raw_fd();
        syscalls::bind(handle, addr).map_err(ErrorCode::from)?;
        reactor.borrow_mut().register(handle).map_err(ErrorCode::from)?;
        Ok(UdpSocket {
            handle: OwnedHandle::from(fd),
            reactor: reactor.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        syscalls::local_addr(self.handle.weak()).map_err(ErrorCode::from)
    }

    /// Connect this socket to a single peer, after which `read`/`write`
    /// (not `send_to`/`recv_from`) are the natural operations, and both
    /// participate in the pending-work queue like a TCP stream's.
    pub fn connect(&self, addr: SocketAddr) -> Result<()> {
        syscalls::connect(self.handle.weak(), addr).map_err(ErrorCode::from)
    }

    /// Read a socket option, validated against the option-size table (§4.6).
    pub fn getsockopt(&self, level: libc::c_int, name: libc::c_int, buf: &mut [u8]) -> Result<usize> {
        crate::net::sockopt::getsockopt(self.handle.weak(), level, name, buf)
    }

    /// Set a socket option, validated against the option-size table (§4.6).
    pub fn setsockopt(&self, level: libc::c_int, name: libc::c_int, buf: &[u8]) -> Result<()> {
        crate::net::sockopt::setsockopt(self.handle.weak(), level, name, buf)
    }

    pub fn read_with(&self, buf: OwningBuffer, completion: Completion<(OwningBuffer, usize)>) -> Option<IntentId> {
        self.reactor.borrow_mut().submit_read(self.handle.weak(), buf, completion)
    }

    pub fn read(&self, buf: OwningBuffer) -> IoFuture<(OwningBuffer, usize)> {
        let (future, completion) = IoFuture::pair();
        self.read_with(buf, completion);
        future
    }

    /// Cancel a queued connected-mode read (§5 "Cancellation & timeouts").
    pub fn cancel_read(&self, id: IntentId) -> bool {
        self.reactor.borrow_mut().cancel_read(self.handle.weak(), id)
    }

    pub fn write_with(&self, buf: OwningBuffer, completion: Completion<(OwningBuffer, usize)>) -> Option<IntentId> {
        self.reactor.borrow_mut().submit_write(self.handle.weak(), buf, completion)
    }

    pub fn write(&self, buf: OwningBuffer) -> IoFuture<(OwningBuffer, usize)> {
        let (future, completion) = IoFuture::pair();
        self.write_with(buf, completion);
        future
    }

    /// Cancel a queued connected-mode write.
    pub fn cancel_write(&self, id: IntentId) -> bool {
        self.reactor.borrow_mut().cancel_write(self.handle.weak(), id)
    }

    /// Send one datagram to `addr`: the completion receives the buffer back
    /// alongside the byte count, whether that settles on the fast path or
    /// after a wait. Would-block is always absorbed into the wait, never
    /// surfaced as an error (§7).
    pub fn send_to_with(&self, buf: OwningBuffer, addr: SocketAddr, completion: Completion<usize>) {
        self.reactor.borrow_mut().submit_send_to(self.handle.weak(), buf, addr, completion)
    }

    pub fn send_to(&self, buf: OwningBuffer, addr: SocketAddr) -> IoFuture<usize> {
        let (future, completion) = IoFuture::pair();
        self.send_to_with(buf, addr, completion);
        future
    }

    /// Receive one datagram: the completion receives the buffer, the byte
    /// count, and the sender's address. Symmetric with
    /// [`UdpSocket::send_to_with`].
    pub fn recv_from_with(&self, buf: OwningBuffer, completion: Completion<(OwningBuffer, usize, SocketAddr)>) {
        self.reactor.borrow_mut().submit_recv_from(self.handle.weak(), buf, completion)
    }

    pub fn recv_from(&self, buf: OwningBuffer) -> IoFuture<(OwningBuffer, usize, SocketAddr)> {
        let (future, completion) = IoFuture::pair();
        self.recv_from_with(buf, completion);
        future
    }
}

impl Drop for UdpSocket {
    fn drop(&mut self) {
        let _ = self.reactor.borrow_mut().deregister(self.handle.weak());
    }
}
