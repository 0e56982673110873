//! Linux-specific primitives: the epoll selector and the eventfd waker.

mod epoll;
mod waker;

pub use epoll::{event_flags, event_handle, Selector};
pub use waker::Waker;
