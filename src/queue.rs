//! The pending-work queue (C3): one-shot completions and the per-descriptor,
//! per-direction FIFO of queued I/O intents.
//!
//! Grounded in `original_source/src/callbacks.h`'s `callback<Args...>`, an
//! rvalue-qualified (`operator() &&`) wrapper that can only be invoked once,
//! by value. Rust already enforces "invoked at most once" for any `FnOnce`
//! consumed by value, so [`Completion`] is a thin wrapper around
//! `Box<dyn FnOnce(..)>` rather than a reimplementation of the original's
//! move-tracking assertions. A `Completion` is not `Send`: it runs on the
//! reactor's own thread and façade completions routinely capture a
//! same-thread [`crate::reactor::SharedReactor`] handle. Work that
//! genuinely needs to cross threads goes through the reactor's separate
//! `Send` remote-submission mechanism (§5), not through `Completion`.
//!
//! An [`Intent`] queued here has, by construction, already failed its fast
//! path (the immediate syscall attempt returned would-block) and must
//! survive until the reactor (C8) sees the descriptor become ready again.
//! Since that may be an arbitrary number of poll iterations later, an
//! `Intent` owns its buffer outright ([`crate::buf::OwningBuffer`]) rather
//! than borrowing a [`crate::buf::RefBuffer`] the way a same-call syscall
//! does — there is no caller stack frame left to borrow from.

use std::collections::VecDeque;

use crate::buf::OwningBuffer;
use crate::error::Result;

/// A one-shot callback, consumed exactly once when its operation settles.
pub struct Completion<T> {
    inner: Box<dyn FnOnce(Result<T>)>,
}

impl<T> Completion<T> {
    pub fn new<F>(f: F) -> Completion<T>
    where
        F: FnOnce(Result<T>) + 'static,
    {
        Completion { inner: Box::new(f) }
    }

    /// Invoke the completion, consuming it. There is no way to call this
    /// twice: `self` is gone after the call, by the type system's ordinary
    /// move rules.
    pub fn complete(self, result: Result<T>) {
        (self.inner)(result)
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Completion(..)")
    }
}

/// Which direction of a descriptor an intent is queued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Identity of a queued [`Intent`], handed back by [`PendingQueue::push`] so
/// a caller can later ask for it to be cancelled (§5 "Cancellation &
/// timeouts") without needing to track a position into the FIFO, which
/// shifts as earlier intents complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntentId(u64);

/// A single queued I/O operation waiting for its descriptor to become ready.
///
/// The completion hands the buffer back alongside the transfer count on
/// success, the way `io_uring`/IOCP-style completion APIs do: the caller
/// handed the reactor ownership of the buffer when it had no stack frame
/// left to borrow from (§ queue module doc), so the only way to get it back
/// is for the completion to return it.
pub struct Intent {
    pub id: IntentId,
    pub buffer: OwningBuffer,
    /// Bytes already transferred for this intent across prior partial
    /// attempts; the next attempt resumes at `buffer[progress..]`.
    pub progress: usize,
    completion: Completion<(OwningBuffer, usize)>,
}

impl Intent {
    pub fn new(id: IntentId, buffer: OwningBuffer, completion: Completion<(OwningBuffer, usize)>) -> Intent {
        Intent {
            id,
            buffer,
            progress: 0,
            completion,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.buffer.len()
    }

    /// Record that `n` more bytes were transferred for this intent.
    pub fn advance(&mut self, n: usize) {
        self.progress = (self.progress + n).min(self.buffer.len());
    }

    /// Consume this intent, invoking its completion with the buffer and the
    /// total bytes transferred (on success) or the terminal error (in which
    /// case the buffer is dropped along with the intent).
    pub fn finish(self, result: Result<usize>) {
        let Intent { buffer, completion, .. } = self;
        completion.complete(result.map(|n| (buffer, n)));
    }
}

impl std::fmt::Debug for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Intent")
            .field("len", &self.buffer.len())
            .field("progress", &self.progress)
            .finish()
    }
}

/// A FIFO of [`Intent`]s queued for one descriptor in one direction.
///
/// The reactor drains this queue from the front whenever the descriptor's
/// readiness cache (C6) marks that direction ready, stopping at the first
/// intent that would-blocks again or empties the queue entirely.
#[derive(Default)]
pub struct PendingQueue {
    intents: VecDeque<Intent>,
    next_id: u64,
}

impl PendingQueue {
    pub fn new() -> PendingQueue {
        PendingQueue {
            intents: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Reserve the next [`IntentId`], for a caller building an [`Intent`] to
    /// pass to [`PendingQueue::push`].
    pub fn next_id(&mut self) -> IntentId {
        let id = IntentId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn push(&mut self, intent: Intent) {
        self.intents.push_back(intent);
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn front_mut(&mut self) -> Option<&mut Intent> {
        self.intents.front_mut()
    }

    /// Remove and return the front intent, typically because it has either
    /// fully completed or failed with a hard (non-suspend) error.
    pub fn pop_front(&mut self) -> Option<Intent> {
        self.intents.pop_front()
    }

    /// Remove a specific queued intent by id, wherever it sits in the FIFO,
    /// shifting the rest up while preserving their relative order (§5:
    /// "the rest of the queue shifts up preserving order"). Returns it so
    /// the caller can finish it with a cancellation error.
    pub fn cancel(&mut self, id: IntentId) -> Option<Intent> {
        let position = self.intents.iter().position(|intent| intent.id == id)?;
        self.intents.remove(position)
    }
}

impl std::fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQueue").field("len", &self.intents.len()).finish()
    }
}

/// A single queued, destination-addressed datagram send, waiting for
/// writability. Unlike a stream [`Intent`], a `send_to` is atomic — the
/// kernel either transmits the whole datagram or none of it — so there is no
/// partial-progress state to track the way [`Intent::advance`] does.
pub struct AddressedSend {
    pub buffer: OwningBuffer,
    pub addr: std::net::SocketAddr,
    completion: Completion<usize>,
}

impl AddressedSend {
    pub fn new(buffer: OwningBuffer, addr: std::net::SocketAddr, completion: Completion<usize>) -> AddressedSend {
        AddressedSend { buffer, addr, completion }
    }

    pub fn finish(self, result: Result<usize>) {
        self.completion.complete(result)
    }
}

/// A single queued `recv_from`, waiting for readability. The buffer comes
/// back alongside the byte count and the sender's address once it settles.
pub struct AddressedRecv {
    pub buffer: OwningBuffer,
    completion: Completion<(OwningBuffer, usize, std::net::SocketAddr)>,
}

impl AddressedRecv {
    pub fn new(buffer: OwningBuffer, completion: Completion<(OwningBuffer, usize, std::net::SocketAddr)>) -> AddressedRecv {
        AddressedRecv { buffer, completion }
    }

    pub fn finish(self, result: Result<(usize, std::net::SocketAddr)>) {
        let AddressedRecv { buffer, completion } = self;
        completion.complete(result.map(|(n, addr)| (buffer, n, addr)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn completion_runs_exactly_once_and_carries_the_result() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let completion = Completion::new(move |result: Result<usize>| {
            seen2.store(result.unwrap(), Ordering::SeqCst);
        });
        completion.complete(Ok(7));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn pending_queue_is_fifo() {
        let mut queue = PendingQueue::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for id in 0..3 {
            let order = order.clone();
            let intent_id = queue.next_id();
            let intent = Intent::new(
                intent_id,
                OwningBuffer::zeroed(4),
                Completion::new(move |_: Result<(OwningBuffer, usize)>| order.lock().unwrap().push(id)),
            );
            queue.push(intent);
        }
        while let Some(intent) = queue.pop_front() {
            intent.finish(Ok(4));
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn finishing_an_intent_hands_the_buffer_back() {
        let intent = Intent::new(IntentId(0), OwningBuffer::zeroed(4), Completion::new(|result| {
            let (buffer, n) = result.unwrap();
            assert_eq!(n, 4);
            assert_eq!(buffer.len(), 4);
        }));
        intent.finish(Ok(4));
    }

    #[test]
    fn intent_tracks_partial_progress() {
        let mut intent = Intent::new(IntentId(0), OwningBuffer::zeroed(10), Completion::new(|_| {}));
        assert!(!intent.is_complete());
        intent.advance(4);
        assert_eq!(intent.remaining(), 6);
        intent.advance(6);
        assert!(intent.is_complete());
    }

    #[test]
    fn completion_can_carry_a_hard_error() {
        let completion = Completion::new(|result: Result<usize>| {
            assert!(result.is_err());
        });
        completion.complete(Err(ErrorCode::from(crate::error::PosixError::ConnectionReset)));
    }

    #[test]
    fn cancel_removes_a_middle_intent_and_preserves_the_rest_of_the_order() {
        let mut queue = PendingQueue::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut ids = Vec::new();
        for label in 0..3 {
            let order = order.clone();
            let id = queue.next_id();
            ids.push(id);
            queue.push(Intent::new(
                id,
                OwningBuffer::zeroed(4),
                Completion::new(move |_: Result<(OwningBuffer, usize)>| order.lock().unwrap().push(label)),
            ));
        }
        let cancelled = queue.cancel(ids[1]).expect("middle intent found");
        cancelled.finish(Err(ErrorCode::from(crate::error::PosixError::OperationCanceled)));
        assert_eq!(queue.len(), 2);
        while let Some(intent) = queue.pop_front() {
            intent.finish(Ok(4));
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 2]);
    }

    #[test]
    fn cancel_is_a_no_op_for_an_unknown_id() {
        let mut queue: PendingQueue = PendingQueue::new();
        let unrelated_id = queue.next_id();
        assert!(queue.cancel(unrelated_id).is_none());
    }
}
