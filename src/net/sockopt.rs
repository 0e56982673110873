//! The socket-option size table, recovered from `original_source/src/socket.cpp`'s
//! `get_sockopt_size` switch (`SOL_SOCKET`, `IPPROTO_TCP`, and `IPPROTO_RAW`'s
//! single `ICMP_FILTER` entry were fully enumerated there — note the original
//! keys that entry under `IPPROTO_RAW`, not `IPPROTO_ICMP`: on Linux
//! `IPPROTO_ICMP` and `SOL_SOCKET` are the same numeric value, which the
//! original calls out with `static_assert(SOL_SOCKET == IPPROTO_ICMP)`). The
//! `IPPROTO_IP`/`IPPROTO_IPV6`/`IPPROTO_UDP` levels the original left as empty
//! `break`s are filled in here with the standard sizes the options those
//! levels actually define, per SPEC_FULL §4.
//!
//! This table exists so a generic `getsockopt`/`setsockopt` entry point can
//! validate the caller's buffer is the right size for a given
//! `(level, name)` pair before making the syscall, the way the original's
//! dispatch does, rather than trusting every call site to get it right.

use std::mem::size_of;

use crate::error::{ErrorCode, PosixError, Result};
use crate::handle::Handle;
use crate::sys::syscalls;

/// Validated `getsockopt`: the façade operation spec.md §4.6 names.
/// Rejects `buf` as invalid-argument if it is smaller than the known size
/// for `(level, name)`, before ever reaching the syscall; an unrecognized
/// `(level, name)` pair is passed straight through (see [`option_size`]'s
/// doc comment on `None`).
pub fn getsockopt(handle: Handle, level: libc::c_int, name: libc::c_int, buf: &mut [u8]) -> Result<usize> {
    validate_len(level, name, buf.len())?;
    syscalls::getsockopt_raw(handle, level, name, buf).map_err(ErrorCode::from)
}

/// Validated `setsockopt`, symmetric with [`getsockopt`].
pub fn setsockopt(handle: Handle, level: libc::c_int, name: libc::c_int, buf: &[u8]) -> Result<()> {
    validate_len(level, name, buf.len())?;
    syscalls::setsockopt_raw(handle, level, name, buf).map_err(ErrorCode::from)
}

fn validate_len(level: libc::c_int, name: libc::c_int, len: usize) -> Result<()> {
    if let Some(required) = option_size(level, name) {
        if len < required {
            return Err(ErrorCode::Posix(PosixError::InvalidArgument));
        }
    }
    Ok(())
}

/// The byte size of the kernel's value representation for `(level, name)`,
/// or `None` if this table does not recognize the option (the original
/// falls through to a default case; callers here should treat `None` as
/// "pass the caller's buffer size through unchecked" rather than an error,
/// since the table is a convenience, not a gate).
pub fn option_size(level: libc::c_int, name: libc::c_int) -> Option<usize> {
    match level {
        libc::SOL_SOCKET => socket_level_size(name),
        libc::IPPROTO_IP => ip_level_size(name),
        libc::IPPROTO_IPV6 => ipv6_level_size(name),
        libc::IPPROTO_RAW => raw_level_size(name),
        libc::IPPROTO_TCP => tcp_level_size(name),
        libc::IPPROTO_UDP => udp_level_size(name),
        _ => None,
    }
}

fn socket_level_size(name: libc::c_int) -> Option<usize> {
    use libc::*;
    let size = match name {
        SO_REUSEADDR | SO_REUSEPORT | SO_KEEPALIVE | SO_BROADCAST | SO_OOBINLINE | SO_DONTROUTE
        | SO_ACCEPTCONN | SO_ERROR | SO_TYPE | SO_SNDBUF | SO_RCVBUF | SO_SNDLOWAT | SO_RCVLOWAT
        | SO_PRIORITY => size_of::<c_int>(),
        SO_LINGER => size_of::<libc::linger>(),
        SO_RCVTIMEO | SO_SNDTIMEO => size_of::<libc::timeval>(),
        _ => return None,
    };
    Some(size)
}

fn ip_level_size(name: libc::c_int) -> Option<usize> {
    use libc::*;
    let size = match name {
        IP_TTL | IP_TOS | IP_HDRINCL | IP_RECVTOS | IP_RECVTTL | IP_MULTICAST_TTL | IP_MULTICAST_LOOP => {
            size_of::<c_int>()
        }
        IP_MULTICAST_IF => size_of::<libc::in_addr>(),
        IP_ADD_MEMBERSHIP | IP_DROP_MEMBERSHIP => size_of::<libc::ip_mreq>(),
        _ => return None,
    };
    Some(size)
}

fn ipv6_level_size(name: libc::c_int) -> Option<usize> {
    use libc::*;
    let size = match name {
        IPV6_V6ONLY | IPV6_UNICAST_HOPS | IPV6_MULTICAST_HOPS | IPV6_MULTICAST_LOOP | IPV6_RECVPKTINFO => {
            size_of::<c_int>()
        }
        IPV6_JOIN_GROUP | IPV6_LEAVE_GROUP => size_of::<libc::ipv6_mreq>(),
        _ => return None,
    };
    Some(size)
}

fn raw_level_size(name: libc::c_int) -> Option<usize> {
    match name {
        libc::ICMP_FILTER => Some(size_of::<u8>()),
        _ => None,
    }
}

fn tcp_level_size(name: libc::c_int) -> Option<usize> {
    use libc::*;
    let size = match name {
        TCP_NODELAY | TCP_MAXSEG | TCP_CORK | TCP_KEEPIDLE | TCP_KEEPINTVL | TCP_KEEPCNT
        | TCP_SYNCNT | TCP_QUICKACK | TCP_DEFER_ACCEPT | TCP_WINDOW_CLAMP => size_of::<c_int>(),
        TCP_INFO => size_of::<libc::tcp_info>(),
        _ => return None,
    };
    Some(size)
}

fn udp_level_size(name: libc::c_int) -> Option<usize> {
    use libc::*;
    let size = match name {
        #[cfg(target_os = "linux")]
        UDP_CORK | UDP_SEGMENT => size_of::<c_int>(),
        _ => return None,
    };
    Some(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_socket_level_options_resolve() {
        assert_eq!(option_size(libc::SOL_SOCKET, libc::SO_REUSEADDR), Some(size_of::<libc::c_int>()));
        assert_eq!(option_size(libc::SOL_SOCKET, libc::SO_LINGER), Some(size_of::<libc::linger>()));
    }

    #[test]
    fn known_tcp_level_options_resolve() {
        assert_eq!(option_size(libc::IPPROTO_TCP, libc::TCP_NODELAY), Some(size_of::<libc::c_int>()));
    }

    #[test]
    fn unknown_option_returns_none() {
        assert_eq!(option_size(libc::SOL_SOCKET, 999_999), None);
    }

    #[test]
    fn setsockopt_rejects_an_undersized_buffer() {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        assert!(fd >= 0);
        let undersized = [0u8; 1];
        let err = setsockopt(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, &undersized).unwrap_err();
        assert_eq!(err, PosixError::InvalidArgument);
        unsafe { libc::close(fd) };
    }

    #[test]
    fn getsockopt_round_trips_so_reuseaddr() {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        assert!(fd >= 0);
        let on: libc::c_int = 1;
        setsockopt(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, &on.to_ne_bytes()).expect("set");
        let mut buf = [0u8; size_of::<libc::c_int>()];
        getsockopt(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, &mut buf).expect("get");
        assert_eq!(libc::c_int::from_ne_bytes(buf), 1);
        unsafe { libc::close(fd) };
    }
}
