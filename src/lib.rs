//! A single-threaded, edge-triggered async network I/O reactor for Linux.
//!
//! Built around an epoll event loop (C8) and a per-descriptor pending-work
//! queue (C3): every socket operation either completes synchronously against
//! the kernel or is handed a one-shot [`queue::Completion`] that the reactor
//! invokes once the descriptor's readiness cache (C6) says it is safe to
//! retry. The socket façade (`net::TcpStream`, `net::TcpListener`,
//! `net::UdpSocket`) offers both that low-level callback form and a
//! `Future`-returning form (`future::IoFuture`) for `async`/`.await` callers,
//! per the crate's continuation-API design note.
//!
//! This crate targets Linux only: it reaches for `epoll`/`eventfd` directly
//! rather than abstracting over a portability layer, since portability
//! beyond Linux is out of scope.

#[cfg(not(target_os = "linux"))]
compile_error!("this crate only supports Linux targets (epoll/eventfd are Linux-specific)");

#[macro_use]
mod macros;

pub mod buf;
pub mod error;
mod future;
mod handle;
#[cfg(feature = "net")]
pub mod net;
mod queue;
mod reactor;
mod readiness;
mod sys;
mod timer;

pub use error::{ErrorCode, PosixError, Result};
pub use future::IoFuture;
pub use handle::{Handle, OwnedHandle};
pub use queue::{Completion, Direction, IntentId};
pub use reactor::{Reactor, ReactorBuilder, RemoteHandle, SharedReactor};
pub use timer::TimerId;

#[cfg(feature = "net")]
pub use error::ResolverError;
