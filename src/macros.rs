//! Small helper macros shared across the syscall and feature-gated layers.
//!
//! `syscall!` mirrors the teacher's own helper of the same name
//! (`sys/unix/mod.rs`): run a raw libc call, turn `-1` into
//! `io::Error::last_os_error()`.
//!
//! Macros must be defined before any module that uses them, hence this file
//! sits first in `lib.rs`'s module list.

#![allow(unused_macros)]

macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

/// The `net` feature is enabled.
macro_rules! cfg_net {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "net")]
            #[cfg_attr(docsrs, doc(cfg(feature = "net")))]
            $item
        )*
    }
}
