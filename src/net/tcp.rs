//! The TCP half of the socket façade (C9): `TcpListener`/`TcpStream`.
//!
//! Grounded in the teacher's `sys/unix/tcp/stream.rs` (wrapping
//! `std::net::TcpStream`/`TcpListener` construction and the
//! `SOCK_NONBLOCK | SOCK_CLOEXEC` socket-creation idiom) for shape, and in
//! `original_source/src/socket.h`/`socket.cpp` for the continuation-style
//! operation contract: every operation either completes synchronously (the
//! fast path) or is hanged off the reactor's pending-work queue to resume
//! on readiness, never blocking the caller's thread either way.
//!
//! Every operation is offered twice, per Design Note §9: a `_with` method
//! taking a [`Completion`] directly, and a plain method returning an
//! [`IoFuture`] for `async`/`.await` callers. Both go through the same
//! reactor entry points underneath.

use std::net::SocketAddr;
use std::os::fd::AsRawFd;

use crate::buf::{OwningBuffer, RefBuffer, RefMultiBuffer};
use crate::error::{ErrorCode, Result};
use crate::future::IoFuture;
use crate::handle::{Handle, OwnedHandle};
use crate::queue::{Completion, IntentId};
use crate::reactor::SharedReactor;
use crate::sys::syscalls;

/// A bound, listening TCP socket.
pub struct TcpListener {
    handle: OwnedHandle,
    reactor: SharedReactor,
}

impl TcpListener {
    pub fn bind(reactor: &SharedReactor, addr: SocketAddr) -> Result<TcpListener> {
        let domain = if addr.is_ipv4() { libc::AF_INET } else { libc::AF_INET6 };
        let fd = syscalls::socket(domain, libc::SOCK_STREAM, 0).map_err(ErrorCode::from)?;
        let handle = fd.as_raw_fd();
        syscalls::set_reuseaddr(handle, true).map_err(ErrorCode::from)?;
        syscalls::bind(handle, addr).map_err(ErrorCode::from)?;
        syscalls::listen(handle, 1024).map_err(ErrorCode::from)?;
        reactor.borrow_mut().register(handle).map_err(ErrorCode::from)?;
        Ok(TcpListener {
            handle: OwnedHandle::from(fd),
            reactor: reactor.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        syscalls::local_addr(self.handle.weak()).map_err(ErrorCode::from)
    }

    /// Read a socket option, validated against the option-size table (§4.6).
    pub fn getsockopt(&self, level: libc::c_int, name: libc::c_int, buf: &mut [u8]) -> Result<usize> {
        crate::net::sockopt::getsockopt(self.handle.weak(), level, name, buf)
    }

    /// Set a socket option, validated against the option-size table (§4.6).
    pub fn setsockopt(&self, level: libc::c_int, name: libc::c_int, buf: &[u8]) -> Result<()> {
        crate::net::sockopt::setsockopt(self.handle.weak(), level, name, buf)
    }

    /// Low-level accept: the completion fires with the accepted stream and
    /// its peer address, whether that happens immediately or after a wait.
    pub fn accept_with(&self, completion: Completion<(TcpStream, SocketAddr)>) {
        let reactor = self.reactor.clone();
        let inner = Completion::new(move |result: Result<Handle>| match result {
            Ok(raw) => {
                let handle = unsafe { OwnedHandle::from_raw(raw) };
                let weak = handle.weak();
                let peer = syscalls::peer_addr(weak).unwrap_or_else(|_| {
                    SocketAddr::new(std::net::Ipv4Addr::UNSPECIFIED.into(), 0)
                });
                let _ = reactor.borrow_mut().register(weak);
                completion.complete(Ok((TcpStream { handle, reactor: reactor.clone() }, peer)));
            }
            Err(err) => completion.complete(Err(err)),
        });
        self.reactor.borrow_mut().submit_accept(self.handle.weak(), inner);
    }

    /// Future-returning accept.
    pub fn accept(&self) -> IoFuture<(TcpStream, SocketAddr)> {
        let (future, completion) = IoFuture::pair();
        self.accept_with(completion);
        future
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        let _ = self.reactor.borrow_mut().deregister(self.handle.weak());
    }
}

/// A connected TCP stream.
pub struct TcpStream {
    handle: OwnedHandle,
    reactor: SharedReactor,
}

impl TcpStream {
    /// Low-level connect: the completion fires once the connection
    /// succeeds or fails terminally (never for `EINPROGRESS`, which is
    /// absorbed into the wait, per §7's propagation policy).
    pub fn connect_with(reactor: &SharedReactor, addr: SocketAddr, completion: Completion<TcpStream>) {
        let domain = if addr.is_ipv4() { libc::AF_INET } else { libc::AF_INET6 };
        let fd = match syscalls::socket(domain, libc::SOCK_STREAM, 0) {
            Ok(fd) => fd,
            Err(err) => {
                completion.complete(Err(ErrorCode::from(err)));
                return;
            }
        };
        let handle = OwnedHandle::from(fd);
        let weak = handle.weak();
        if let Err(err) = reactor.borrow_mut().register(weak) {
            completion.complete(Err(ErrorCode::from(err)));
            return;
        }

        let reactor_for_completion = reactor.clone();
        let inner = Completion::new(move |result: Result<()>| match result {
            Ok(()) => completion.complete(Ok(TcpStream {
                handle,
                reactor: reactor_for_completion,
            })),
            Err(err) => completion.complete(Err(err)),
        });
        reactor.borrow_mut().submit_connect(weak, addr, inner);
    }

    pub fn connect(reactor: &SharedReactor, addr: SocketAddr) -> IoFuture<TcpStream> {
        let (future, completion) = IoFuture::pair();
        TcpStream::connect_with(reactor, addr, completion);
        future
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        syscalls::local_addr(self.handle.weak()).map_err(ErrorCode::from)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        syscalls::peer_addr(self.handle.weak()).map_err(ErrorCode::from)
    }

    pub fn set_nodelay(&self, on: bool) -> Result<()> {
        syscalls::set_tcp_nodelay(self.handle.weak(), on).map_err(ErrorCode::from)
    }

    /// Read a socket option, validated against the option-size table (§4.6).
    pub fn getsockopt(&self, level: libc::c_int, name: libc::c_int, buf: &mut [u8]) -> Result<usize> {
        crate::net::sockopt::getsockopt(self.handle.weak(), level, name, buf)
    }

    /// Set a socket option, validated against the option-size table (§4.6).
    pub fn setsockopt(&self, level: libc::c_int, name: libc::c_int, buf: &[u8]) -> Result<()> {
        crate::net::sockopt::setsockopt(self.handle.weak(), level, name, buf)
    }

    /// Low-level read: fills `buf` (up to its length) and completes with the
    /// buffer and the number of bytes read (`0` means the peer closed its
    /// write half). Returns `Some(IntentId)` if the read had to be queued
    /// (pass it to [`TcpStream::cancel_read`] to cancel it), `None` if it
    /// already settled on the fast path.
    pub fn read_with(&self, buf: OwningBuffer, completion: Completion<(OwningBuffer, usize)>) -> Option<IntentId> {
        self.reactor.borrow_mut().submit_read(self.handle.weak(), buf, completion)
    }

    pub fn read(&self, buf: OwningBuffer) -> IoFuture<(OwningBuffer, usize)> {
        let (future, completion) = IoFuture::pair();
        self.read_with(buf, completion);
        future
    }

    /// Cancel a queued read (§5 "Cancellation & timeouts"); its completion
    /// fires with [`crate::error::PosixError::OperationCanceled`]. Returns
    /// `false` if `id` already settled or did not belong to this stream.
    pub fn cancel_read(&self, id: IntentId) -> bool {
        self.reactor.borrow_mut().cancel_read(self.handle.weak(), id)
    }

    /// Low-level write: sends `buf` and completes with the buffer and the
    /// number of bytes written. Returns `Some(IntentId)` if the write had to
    /// be queued, `None` if it already settled on the fast path.
    pub fn write_with(&self, buf: OwningBuffer, completion: Completion<(OwningBuffer, usize)>) -> Option<IntentId> {
        self.reactor.borrow_mut().submit_write(self.handle.weak(), buf, completion)
    }

    pub fn write(&self, buf: OwningBuffer) -> IoFuture<(OwningBuffer, usize)> {
        let (future, completion) = IoFuture::pair();
        self.write_with(buf, completion);
        future
    }

    /// Symmetric with [`TcpStream::cancel_read`].
    pub fn cancel_write(&self, id: IntentId) -> bool {
        self.reactor.borrow_mut().cancel_write(self.handle.weak(), id)
    }

    /// Vectored write: coalesces `bufs` into a single `writev` on the fast
    /// path, per the reactor's "coalesce small writes into vectored
    /// syscalls" responsibility (spec.md §1). A full transfer completes
    /// synchronously with the total byte count. A partial transfer or a
    /// would-block copies the unwritten remainder into one [`OwningBuffer`]
    /// and queues it like an ordinary write: the pending-work queue (C3)
    /// tracks one buffer per intent, and a `RefMultiBuffer` cannot outlive
    /// the caller's borrowed slices across poll iterations the way an owned
    /// buffer can. This mirrors [`crate::net::udp::UdpSocket::send_to`]'s
    /// documented scope reduction.
    pub fn write_vectored_with(&self, bufs: &[&[u8]], completion: Completion<usize>) {
        let total: usize = bufs.iter().map(|b| b.len()).sum();
        let mut multi = RefMultiBuffer::with_capacity(bufs.len());
        multi.append_many(bufs.iter().map(|&b| RefBuffer::from_slice(b)));

        match syscalls::writev(self.handle.weak(), &multi) {
            Ok(n) if n == total => completion.complete(Ok(n)),
            Ok(n) => self.queue_vectored_remainder(&mut multi, n, completion),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                self.queue_vectored_remainder(&mut multi, 0, completion)
            }
            Err(err) => completion.complete(Err(ErrorCode::from(err))),
        }
    }

    fn queue_vectored_remainder(&self, multi: &mut RefMultiBuffer<'_>, written: usize, completion: Completion<usize>) {
        if written > 0 {
            multi.head_consume(written);
        }
        let mut remainder = OwningBuffer::with_capacity(multi.total_len());
        for slice in multi.as_slices() {
            remainder.extend_from_slice(slice.as_slice());
        }
        let inner = Completion::new(move |result: Result<(OwningBuffer, usize)>| {
            completion.complete(result.map(|(_, n)| written + n));
        });
        self.reactor.borrow_mut().submit_write(self.handle.weak(), remainder, inner);
    }

    pub fn write_vectored(&self, bufs: &[&[u8]]) -> IoFuture<usize> {
        let (future, completion) = IoFuture::pair();
        self.write_vectored_with(bufs, completion);
        future
    }

    pub fn shutdown(&self, how: libc::c_int) -> Result<()> {
        syscalls::shutdown(self.handle.weak(), how).map_err(ErrorCode::from)
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        let _ = self.reactor.borrow_mut().deregister(self.handle.weak());
    }
}

