//! The address adapter half of C4: converting between `std::net::SocketAddr`
//! and the kernel's `sockaddr_storage` representation.
//!
//! The teacher's own `sys/unix/net.rs` does this conversion inline at each
//! call site; this crate centralizes it into two functions so the syscall
//! adapter (C5) and the DNS adapter both go through the same, tested path.

use std::io;
use std::mem::size_of;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Large enough to hold any `sockaddr_in`/`sockaddr_in6` plus the
/// `sockaddr_storage` padding the kernel expects as the buffer size for
/// `accept`/`getsockname`/`getpeername`.
pub type SockAddrStorage = libc::sockaddr_storage;

/// The `(pointer, length)` a bind/connect/sendto call needs, borrowing out
/// of an on-stack `sockaddr_storage`.
pub struct EncodedAddr {
    storage: libc::sockaddr_storage,
    len: libc::socklen_t,
}

impl EncodedAddr {
    pub fn as_ptr(&self) -> *const libc::sockaddr {
        &self.storage as *const _ as *const libc::sockaddr
    }

    pub fn len(&self) -> libc::socklen_t {
        self.len
    }
}

pub fn write_sockaddr(addr: SocketAddr) -> EncodedAddr {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(v4) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: v4.port().to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                },
                sin_zero: [0; 8],
            };
            unsafe {
                std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in, sin);
            }
            size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: v6.port().to_be(),
                sin6_flowinfo: v6.flowinfo(),
                sin6_addr: libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                },
                sin6_scope_id: v6.scope_id(),
            };
            unsafe {
                std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in6, sin6);
            }
            size_of::<libc::sockaddr_in6>()
        }
    };
    EncodedAddr {
        storage,
        len: len as libc::socklen_t,
    }
}

pub fn read_sockaddr(storage: &libc::sockaddr_storage) -> io::Result<SocketAddr> {
    match storage.ss_family as libc::c_int {
        libc::AF_INET => {
            let sin = unsafe { &*(storage as *const _ as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes());
            let port = u16::from_be(sin.sin_port);
            Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }
        libc::AF_INET6 => {
            let sin6 = unsafe { &*(storage as *const _ as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
            let port = u16::from_be(sin6.sin6_port);
            Ok(SocketAddr::V6(SocketAddrV6::new(ip, port, sin6.sin6_flowinfo, sin6.sin6_scope_id)))
        }
        other => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported address family {other}"),
        )),
    }
}
