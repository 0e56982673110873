//! The syscall adapter (C5): thin wrappers over the raw socket syscalls the
//! façade (C9) needs, each returning `io::Result` via the `syscall!` macro
//! the way the teacher's own `sys/unix/*` modules do. Nothing here
//! classifies errors into [`crate::error::ErrorCode`] — that happens one
//! layer up, at the point an intent actually completes or suspends, per the
//! ambient error-handling convention (SPEC_FULL §0).

use std::io;
use std::net::SocketAddr;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use crate::buf::{RefBuffer, RefMultiBuffer};
use crate::handle::Handle;
use crate::net::addr::{read_sockaddr, write_sockaddr, SockAddrStorage};

pub fn socket(domain: libc::c_int, ty: libc::c_int, protocol: libc::c_int) -> io::Result<OwnedFd> {
    let fd = syscall!(socket(domain, ty | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC, protocol))?;
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub fn bind(handle: Handle, addr: SocketAddr) -> io::Result<()> {
    let storage = write_sockaddr(addr);
    syscall!(bind(handle, storage.as_ptr(), storage.len())).map(|_| ())
}

pub fn listen(handle: Handle, backlog: i32) -> io::Result<()> {
    syscall!(listen(handle, backlog)).map(|_| ())
}

/// Accept a pending connection, non-blocking. `Ok(None)` means would-block
/// (the syscall adapter itself never swallows EAGAIN; the caller — the
/// reactor's suspend path — is the one that decides to enqueue).
pub fn accept(handle: Handle) -> io::Result<(OwnedFd, SocketAddr)> {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let fd = syscall!(accept4(
        handle,
        &mut storage as *mut _ as *mut libc::sockaddr,
        &mut len,
        libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
    ))?;
    let addr = read_sockaddr(&storage)?;
    Ok((unsafe { OwnedFd::from_raw_fd(fd) }, addr))
}

/// Begin a non-blocking connect. Returns `Ok(())` if it completed
/// synchronously (rare, e.g. connecting to a loopback listener with room in
/// its backlog) or an `io::Error` of kind `WouldBlock`/`Other(EINPROGRESS)`
/// if it is still in flight; the façade treats the latter as "wait for
/// write-readiness, then check `SO_ERROR`" (§4.6).
pub fn connect(handle: Handle, addr: SocketAddr) -> io::Result<()> {
    let storage = write_sockaddr(addr);
    syscall!(connect(handle, storage.as_ptr(), storage.len())).map(|_| ())
}

/// Read the deferred result of a non-blocking connect via `SO_ERROR`.
/// `Ok(())` means the connection succeeded; any other `errno` is the
/// terminal connect failure.
pub fn take_socket_error(handle: Handle) -> io::Result<()> {
    let mut errno: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    syscall!(getsockopt(
        handle,
        libc::SOL_SOCKET,
        libc::SO_ERROR,
        &mut errno as *mut _ as *mut libc::c_void,
        &mut len,
    ))?;
    if errno == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(errno))
    }
}

pub fn recv(handle: Handle, buf: &mut RefBuffer<'_>) -> io::Result<usize> {
    let slice = unsafe { buf.as_mut_slice() };
    let n = syscall!(recv(handle, slice.as_mut_ptr() as *mut libc::c_void, slice.len(), 0))?;
    Ok(n as usize)
}

pub fn send(handle: Handle, buf: &RefBuffer<'_>) -> io::Result<usize> {
    let slice = buf.as_slice();
    let n = syscall!(send(
        handle,
        slice.as_ptr() as *const libc::c_void,
        slice.len(),
        libc::MSG_NOSIGNAL,
    ))?;
    Ok(n as usize)
}

pub fn readv(handle: Handle, bufs: &RefMultiBuffer<'_>) -> io::Result<usize> {
    let iovecs = bufs.as_iovecs();
    let n = syscall!(readv(handle, iovecs.as_ptr(), iovecs.len() as libc::c_int))?;
    Ok(n as usize)
}

pub fn writev(handle: Handle, bufs: &RefMultiBuffer<'_>) -> io::Result<usize> {
    let iovecs = bufs.as_iovecs();
    let n = syscall!(writev(handle, iovecs.as_ptr(), iovecs.len() as libc::c_int))?;
    Ok(n as usize)
}

pub fn sendto(handle: Handle, buf: &RefBuffer<'_>, addr: SocketAddr) -> io::Result<usize> {
    let storage = write_sockaddr(addr);
    let slice = buf.as_slice();
    let n = syscall!(sendto(
        handle,
        slice.as_ptr() as *const libc::c_void,
        slice.len(),
        libc::MSG_NOSIGNAL,
        storage.as_ptr(),
        storage.len(),
    ))?;
    Ok(n as usize)
}

pub fn recvfrom(handle: Handle, buf: &mut RefBuffer<'_>) -> io::Result<(usize, SocketAddr)> {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let slice = unsafe { buf.as_mut_slice() };
    let n = syscall!(recvfrom(
        handle,
        slice.as_mut_ptr() as *mut libc::c_void,
        slice.len(),
        0,
        &mut storage as *mut _ as *mut libc::sockaddr,
        &mut len,
    ))?;
    let addr = read_sockaddr(&storage)?;
    Ok((n as usize, addr))
}

pub fn shutdown(handle: Handle, how: libc::c_int) -> io::Result<()> {
    syscall!(shutdown(handle, how)).map(|_| ())
}

pub fn local_addr(handle: Handle) -> io::Result<SocketAddr> {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    syscall!(getsockname(handle, &mut storage as *mut _ as *mut libc::sockaddr, &mut len))?;
    read_sockaddr(&storage)
}

pub fn peer_addr(handle: Handle) -> io::Result<SocketAddr> {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    syscall!(getpeername(handle, &mut storage as *mut _ as *mut libc::sockaddr, &mut len))?;
    read_sockaddr(&storage)
}

pub fn set_reuseaddr(handle: Handle, on: bool) -> io::Result<()> {
    set_bool_opt(handle, libc::SOL_SOCKET, libc::SO_REUSEADDR, on)
}

pub fn set_tcp_nodelay(handle: Handle, on: bool) -> io::Result<()> {
    set_bool_opt(handle, libc::IPPROTO_TCP, libc::TCP_NODELAY, on)
}

/// Generic `getsockopt`, writing the kernel's value representation into
/// `buf` and returning how many bytes it actually wrote.
pub fn getsockopt_raw(handle: Handle, level: libc::c_int, name: libc::c_int, buf: &mut [u8]) -> io::Result<usize> {
    let mut len = buf.len() as libc::socklen_t;
    syscall!(getsockopt(
        handle,
        level,
        name,
        buf.as_mut_ptr() as *mut libc::c_void,
        &mut len,
    ))?;
    Ok(len as usize)
}

/// Generic `setsockopt`, passing `buf` as the kernel's value representation.
pub fn setsockopt_raw(handle: Handle, level: libc::c_int, name: libc::c_int, buf: &[u8]) -> io::Result<()> {
    syscall!(setsockopt(
        handle,
        level,
        name,
        buf.as_ptr() as *const libc::c_void,
        buf.len() as libc::socklen_t,
    ))
    .map(|_| ())
}

fn set_bool_opt(handle: Handle, level: libc::c_int, name: libc::c_int, on: bool) -> io::Result<()> {
    let value: libc::c_int = on as libc::c_int;
    syscall!(setsockopt(
        handle,
        level,
        name,
        &value as *const _ as *const libc::c_void,
        std::mem::size_of::<libc::c_int>() as libc::socklen_t,
    ))
    .map(|_| ())
}

#[allow(dead_code)]
pub(crate) fn raw_fd_is_valid(fd: RawFd) -> bool {
    unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
}

#[allow(dead_code)]
pub(crate) fn sockaddr_storage_size() -> usize {
    std::mem::size_of::<SockAddrStorage>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::os::fd::AsRawFd;

    #[test]
    fn bind_listen_accept_loopback_round_trip() {
        let listener = socket(libc::AF_INET, libc::SOCK_STREAM, 0).expect("socket");
        let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
        bind(listener.as_raw_fd(), addr).expect("bind");
        listen(listener.as_raw_fd(), 16).expect("listen");
        let bound = local_addr(listener.as_raw_fd()).expect("local_addr");
        assert_ne!(bound.port(), 0);

        let client = socket(libc::AF_INET, libc::SOCK_STREAM, 0).expect("socket");
        let connect_result = connect(client.as_raw_fd(), bound);
        // Non-blocking connect either completes immediately or reports
        // EINPROGRESS; both are acceptable outcomes here.
        if let Err(err) = &connect_result {
            assert_eq!(err.raw_os_error(), Some(libc::EINPROGRESS));
        }
    }
}
