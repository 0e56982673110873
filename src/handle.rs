//! Ownership primitives (C1): an exclusive-owner handle over a raw
//! descriptor, plus a small move-only wrapper used throughout the crate
//! wherever a resource must have exactly one owner.
//!
//! Grounded in the original C++ `OwnedHandle` (`handle.h`) and `MoveOnly<T>`
//! (`ownership.h`). Rust's move semantics make most of the C++ ceremony
//! (deleted copy constructor, defaulted move constructor, `noexcept`
//! qualifications) disappear: a plain `struct OwnedHandle(OwnedFd)` already
//! has exactly the contract the original hand-wrote. The teacher reaches for
//! `std::os::fd::OwnedFd` the same way (`sys::unix::selector::epoll::Selector`
//! wraps its epoll fd in one), so this module is a thin, closed-enumeration
//! wrapper around it rather than a reimplementation.

use std::fmt;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// A non-negative integer descriptor identity, with no ownership attached.
///
/// Valid from the moment the kernel returns it until the owning
/// [`OwnedHandle`] is dropped. A `Handle` by itself carries no lifetime
/// enforcement — exactly like the original's raw `using Handle = int` — so
/// callers must not let one outlive its owner.
pub type Handle = RawFd;

/// An exclusive owner of a kernel descriptor.
///
/// Construction from a raw descriptor transfers ownership to the
/// `OwnedHandle`; dropping it closes the descriptor. `OwnedHandle` cannot be
/// copied (only moved), matching the original's deleted copy constructor.
pub struct OwnedHandle(OwnedFd);

impl OwnedHandle {
    /// Take ownership of a raw descriptor returned by a kernel call.
    ///
    /// # Safety
    ///
    /// `fd` must be a valid, open descriptor not owned by anything else.
    pub unsafe fn from_raw(fd: Handle) -> OwnedHandle {
        OwnedHandle(OwnedFd::from_raw_fd(fd))
    }

    /// A weak reference to this handle, valid only as long as `self` lives.
    pub fn weak(&self) -> Handle {
        self.0.as_raw_fd()
    }

    /// Give up ownership, returning the raw descriptor without closing it.
    pub fn into_raw(self) -> Handle {
        self.0.into_raw_fd()
    }
}

impl AsRawFd for OwnedHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl From<OwnedFd> for OwnedHandle {
    fn from(fd: OwnedFd) -> OwnedHandle {
        OwnedHandle(fd)
    }
}

impl fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedHandle").field(&self.weak()).finish()
    }
}

/// A move-only box for any movable `T`.
///
/// Mirrors the original `MoveOnly<T>` (`ownership.h`): empties out on
/// move-from, forbids copy, and forbids implicit conversion back to `T` that
/// would let the value escape without going through `&`/`&mut`/ownership
/// transfer. In idiomatic Rust this is almost exactly what `Option<T>` plus
/// the type system's normal move checking already gives you — `MoveOnly<T>`
/// exists here chiefly so intent bookkeeping (C3) can hold a "may or may not
/// have been taken yet" slot with the same vocabulary the original uses.
#[derive(Default)]
pub struct MoveOnly<T>(Option<T>);

impl<T> MoveOnly<T> {
    pub fn new(value: T) -> MoveOnly<T> {
        MoveOnly(Some(value))
    }

    pub fn empty() -> MoveOnly<T> {
        MoveOnly(None)
    }

    pub fn has_value(&self) -> bool {
        self.0.is_some()
    }

    /// Take the inner value, leaving this `MoveOnly` empty.
    pub fn take(&mut self) -> Option<T> {
        self.0.take()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.0.as_mut()
    }
}

impl<T> fmt::Debug for MoveOnly<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MoveOnly").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_only_empties_on_take() {
        let mut m = MoveOnly::new(42);
        assert!(m.has_value());
        assert_eq!(m.take(), Some(42));
        assert!(!m.has_value());
        assert_eq!(m.take(), None);
    }

    #[test]
    fn owned_handle_closes_on_drop() {
        // Duplicate stdin's fd so we own something real to close, rather
        // than fabricating a descriptor number.
        let dup = unsafe { libc::dup(0) };
        assert!(dup >= 0);
        let handle = unsafe { OwnedHandle::from_raw(dup) };
        assert_eq!(handle.weak(), dup);
        drop(handle);
        // The fd is now closed; fcntl on it must fail with EBADF.
        let rc = unsafe { libc::fcntl(dup, libc::F_GETFD) };
        assert_eq!(rc, -1);
    }
}
