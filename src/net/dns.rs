//! The DNS adapter half of C4: a synchronous wrapper over `getaddrinfo`.
//!
//! Grounded in `original_source/src/dns.cpp`, which resolves a host/service
//! pair through `getaddrinfo` and walks the returned `addrinfo` linked list,
//! freeing it with `freeaddrinfo` on every exit path (success, partial
//! failure, and the `EAI_SYSTEM` case where `errno` carries the real
//! reason). `getaddrinfo` is a blocking libc call; nothing in this crate
//! makes it non-blocking. Callers who need resolution to not stall the
//! reactor thread must run it elsewhere (a thread, a pool) themselves — the
//! resolver is documented as an external collaborator, same as upstream DNS
//! itself, not a component the reactor drives through its event loop.

use std::ffi::{CStr, CString};
use std::net::SocketAddr;
use std::ptr;

use crate::error::{ErrorCode, PosixError, ResolverError, Result};
use crate::net::addr::read_sockaddr;

/// Which address family a hint or a resolved record belongs to. The address
/// converter (C4) covers only these two; `getaddrinfo` entries in any other
/// family are skipped, per spec.md §6's "further families are not covered".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    fn from_raw(family: libc::c_int) -> Option<AddressFamily> {
        match family {
            libc::AF_INET => Some(AddressFamily::V4),
            libc::AF_INET6 => Some(AddressFamily::V6),
            _ => None,
        }
    }

    fn to_raw(self) -> libc::c_int {
        match self {
            AddressFamily::V4 => libc::AF_INET,
            AddressFamily::V6 => libc::AF_INET6,
        }
    }
}

/// Narrows `resolve`'s output, mirroring `getaddrinfo`'s `hints` argument
/// (spec.md §4.7: "optional hints record").
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveHints {
    pub family: Option<AddressFamily>,
    pub socktype: libc::c_int,
    pub protocol: libc::c_int,
    /// Ask the resolver to fill in each record's canonical name
    /// (`AI_CANONNAME`).
    pub want_canonical_name: bool,
}

/// One resolved address record, exactly the tuple spec.md §4.7 names:
/// `{flags, family, socktype, protocol, sockaddr, canonical_name}`.
#[derive(Debug, Clone)]
pub struct AddressRecord {
    pub flags: libc::c_int,
    pub family: AddressFamily,
    pub socktype: libc::c_int,
    pub protocol: libc::c_int,
    pub sockaddr: SocketAddr,
    pub canonical_name: Option<String>,
}

/// Resolve a node name and/or service name to an ordered list of address
/// records ("DNS fan-out": a caller typically tries each in turn). At least
/// one of `node`/`service` must be present, matching `getaddrinfo`'s own
/// contract; violating that is reported as an invalid-argument error rather
/// than reaching the libc call.
pub fn resolve(node: Option<&str>, service: Option<&str>, hints: Option<ResolveHints>) -> Result<Vec<AddressRecord>> {
    if node.is_none() && service.is_none() {
        return Err(ErrorCode::Posix(PosixError::InvalidArgument));
    }
    let c_node = node
        .map(CString::new)
        .transpose()
        .map_err(|_| ErrorCode::Posix(PosixError::InvalidArgument))?;
    let c_service = service
        .map(CString::new)
        .transpose()
        .map_err(|_| ErrorCode::Posix(PosixError::InvalidArgument))?;

    let hints = hints.unwrap_or_default();
    let mut raw_hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    raw_hints.ai_family = hints.family.map(AddressFamily::to_raw).unwrap_or(libc::AF_UNSPEC);
    raw_hints.ai_socktype = hints.socktype;
    raw_hints.ai_protocol = hints.protocol;
    if hints.want_canonical_name {
        raw_hints.ai_flags |= libc::AI_CANONNAME;
    }

    let mut result: *mut libc::addrinfo = ptr::null_mut();
    let node_ptr = c_node.as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null());
    let service_ptr = c_service.as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null());

    let rc = unsafe { libc::getaddrinfo(node_ptr, service_ptr, &raw_hints, &mut result) };
    if rc != 0 {
        return Err(classify_eai(rc));
    }

    let mut records = Vec::new();
    let mut cursor = result;
    while !cursor.is_null() {
        let entry = unsafe { &*cursor };
        if let Some(family) = AddressFamily::from_raw(entry.ai_family) {
            if let Ok(sockaddr) = unsafe { addrinfo_to_socket_addr(entry) } {
                records.push(AddressRecord {
                    flags: entry.ai_flags,
                    family,
                    socktype: entry.ai_socktype,
                    protocol: entry.ai_protocol,
                    sockaddr,
                    canonical_name: unsafe { read_canonical_name(entry) },
                });
            }
        }
        cursor = entry.ai_next;
    }
    unsafe { libc::freeaddrinfo(result) };

    Ok(records)
}

unsafe fn addrinfo_to_socket_addr(entry: &libc::addrinfo) -> std::io::Result<SocketAddr> {
    let storage = entry.ai_addr as *const libc::sockaddr_storage;
    read_sockaddr(&*storage)
}

unsafe fn read_canonical_name(entry: &libc::addrinfo) -> Option<String> {
    if entry.ai_canonname.is_null() {
        None
    } else {
        Some(CStr::from_ptr(entry.ai_canonname).to_string_lossy().into_owned())
    }
}

fn classify_eai(rc: libc::c_int) -> ErrorCode {
    if rc == libc::EAI_SYSTEM {
        // The original rewrites EAI_SYSTEM into the corresponding POSIX
        // kind via `errno`, per §7's propagation policy.
        ErrorCode::Posix(PosixError::from_errno(std::io::Error::last_os_error().raw_os_error().unwrap_or(0)))
    } else {
        ErrorCode::Resolver(ResolverError::from_eai(rc))
    }
}

/// A human-readable description of a `getaddrinfo` error code, via
/// `gai_strerror`. Used only for logging; never parsed.
pub fn gai_strerror(rc: libc::c_int) -> String {
    unsafe {
        let ptr = libc::gai_strerror(rc);
        if ptr.is_null() {
            format!("unknown getaddrinfo error {rc}")
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}
