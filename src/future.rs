//! The `Future`-returning half of the continuation API (C9, Design Note §9).
//!
//! The reactor only ever deals in [`Completion`]s; `IoFuture` is a small
//! adapter layered on top, wrapping a `Completion` that fills a shared slot
//! and wakes a `std::task::Waker`, so `async fn`-style callers never see the
//! low-level callback form. The reactor's own task/slot layout stays
//! private to this module, per the design note's "without exposing internal
//! task layout."

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::error::Result;
use crate::queue::Completion;

struct Shared<T> {
    result: Option<Result<T>>,
    waker: Option<Waker>,
}

/// A `Future` resolving to the outcome of a single queued I/O intent or
/// timer tick.
pub struct IoFuture<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T: 'static> IoFuture<T> {
    /// Build a future/completion pair: hand the `Completion` half to the
    /// reactor (`Reactor::submit_read`, etc.) and return the future half to
    /// the caller.
    pub(crate) fn pair() -> (IoFuture<T>, Completion<T>) {
        let shared = Arc::new(Mutex::new(Shared { result: None, waker: None }));
        let sink = shared.clone();
        let completion = Completion::new(move |result| {
            let mut guard = sink.lock().expect("future slot poisoned");
            guard.result = Some(result);
            if let Some(waker) = guard.waker.take() {
                waker.wake();
            }
        });
        (IoFuture { shared }, completion)
    }
}

impl<T> Future for IoFuture<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut guard = self.shared.lock().expect("future slot poisoned");
        if let Some(result) = guard.result.take() {
            Poll::Ready(result)
        } else {
            guard.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}
