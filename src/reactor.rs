//! The reactor loop (C8): the core event-loop state machine.
//!
//! Each turn: compute how long to block from the timer heap (C7), wait on
//! epoll (retrying transparently on `EINTR`, absorbed the same way the
//! teacher's `poll.rs` `poll2()` loop absorbs it), dispatch whatever events
//! came back into the readiness cache (C6), drain each touched
//! descriptor's pending-work queues (C3) until they empty or would-block
//! again, then run any timers that are now due. Loop until [`Reactor::stop`]
//! is called.
//!
//! Grounded in `original_source/src/epoll_executor.h` for the overall
//! shape of this loop (wait, dispatch, drain, repeat) and in the teacher's
//! `poll.rs` for the Rust idiom of a signal-retrying wait plus a
//! capacity-bounded `Events` buffer.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::fd::AsRawFd;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::buf::{OwningBuffer, PageBuffer, RefBuffer};
use crate::error::{ErrorCode, PosixError};
use crate::handle::Handle;
use crate::queue::{AddressedRecv, AddressedSend, Completion, Direction, Intent, IntentId, PendingQueue};
use crate::readiness::DescriptorState;
use crate::sys::syscalls;
use crate::sys::unix::{event_flags, event_handle, Selector, Waker};
use crate::timer::{TimerHeap, TimerId};

type RemoteJob = Box<dyn FnOnce(&mut Reactor) + Send>;

/// A reactor shared, same-thread, by every façade socket built against it.
/// The reactor itself is not `Send`/`Sync` — only [`RemoteHandle`] crosses
/// thread boundaries (§5).
pub type SharedReactor = Rc<RefCell<Reactor>>;

/// Configuration for a [`Reactor`], resolving the original's
/// `//TODO: Add configuration options through some init/builder/option
/// struct pattern` (`runtime.h`).
#[derive(Debug, Clone)]
pub struct ReactorBuilder {
    event_capacity: usize,
    timer_capacity: usize,
    enable_waker: bool,
}

impl Default for ReactorBuilder {
    fn default() -> ReactorBuilder {
        ReactorBuilder {
            event_capacity: 256,
            timer_capacity: 16,
            enable_waker: true,
        }
    }
}

impl ReactorBuilder {
    pub fn new() -> ReactorBuilder {
        ReactorBuilder::default()
    }

    /// How many ready descriptors `epoll_wait` can report in a single call.
    pub fn event_capacity(mut self, capacity: usize) -> ReactorBuilder {
        self.event_capacity = capacity;
        self
    }

    pub fn timer_capacity(mut self, capacity: usize) -> ReactorBuilder {
        self.timer_capacity = capacity;
        self
    }

    /// Whether the cross-thread submission mechanism (§5) is wired up. A
    /// reactor used from a single thread can disable this to skip the
    /// `eventfd` registration entirely.
    pub fn enable_waker(mut self, enable: bool) -> ReactorBuilder {
        self.enable_waker = enable;
        self
    }

    /// Build and wrap the reactor for use by same-thread façade types
    /// ([`crate::net::tcp::TcpStream`] and friends), which need shared,
    /// interior-mutable access to submit intents.
    pub fn build_shared(self) -> io::Result<SharedReactor> {
        Ok(Rc::new(RefCell::new(self.build()?)))
    }

    pub fn build(self) -> io::Result<Reactor> {
        let selector = Selector::new()?;
        let waker = if self.enable_waker {
            let waker = Waker::new()?;
            selector.register(waker.as_raw_fd())?;
            Some(Arc::new(waker))
        } else {
            None
        };
        Ok(Reactor {
            selector,
            descriptors: HashMap::new(),
            timers: TimerHeap::with_capacity(self.timer_capacity),
            waker,
            submission: Arc::new(Mutex::new(VecDeque::new())),
            events_buf: Vec::with_capacity(self.event_capacity),
            scratch: PageBuffer::new(),
            active: false,
        })
    }
}

/// The single-threaded event loop. Owns the epoll selector, every
/// registered descriptor's readiness cache and pending-work queues, and the
/// timer heap.
pub struct Reactor {
    selector: Selector,
    descriptors: HashMap<Handle, DescriptorState>,
    timers: TimerHeap,
    waker: Option<Arc<Waker>>,
    submission: Arc<Mutex<VecDeque<RemoteJob>>>,
    events_buf: Vec<libc::epoll_event>,
    /// A page-sized scratch buffer, allocated once alongside the reactor and
    /// reused for its whole lifetime rather than per call (§3). Used by
    /// [`Reactor::discard_readable`] to drain and discard a descriptor's
    /// buffered bytes without the caller handing in a buffer of its own.
    scratch: PageBuffer,
    active: bool,
}

impl Reactor {
    pub fn builder() -> ReactorBuilder {
        ReactorBuilder::new()
    }

    /// Register a descriptor so the reactor starts tracking its readiness.
    /// Idempotent: calling it twice for the same handle is a no-op.
    pub fn register(&mut self, handle: Handle) -> io::Result<()> {
        if self.descriptors.contains_key(&handle) {
            return Ok(());
        }
        self.selector.register(handle)?;
        self.descriptors.insert(handle, DescriptorState::new());
        trace!("registered {handle}");
        Ok(())
    }

    /// Drop a descriptor's tracked state. The caller (the façade type's
    /// `Drop` impl) is responsible for actually closing the descriptor;
    /// this only forgets the reactor-side bookkeeping.
    pub fn deregister(&mut self, handle: Handle) -> io::Result<()> {
        if self.descriptors.remove(&handle).is_some() {
            self.discard_readable(handle);
            self.selector.deregister(handle)?;
            trace!("deregistered {handle}");
        }
        Ok(())
    }

    /// Drain and discard whatever is currently readable on `handle`, using
    /// the reactor's page-sized scratch buffer rather than an allocation of
    /// the caller's own. Best-effort: a closing descriptor's unread bytes
    /// don't matter to anyone, but reading them here means the peer sees a
    /// clean close instead of a reset from bytes still sitting in the
    /// kernel's receive buffer.
    fn discard_readable(&mut self, handle: Handle) {
        loop {
            let mut view = self.scratch.as_ref_buffer();
            match try_recv_ref(handle, &mut view) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }

    /// Attempt a read now; queue it if the descriptor would-block, or if the
    /// kernel hands back less than the full buffer before that. Either way
    /// the completion receives the buffer back alongside the byte count on
    /// success, since the caller handed ownership of it over. Returns
    /// `Some(IntentId)` if the read was queued (pass it to
    /// [`Reactor::cancel_read`] to cancel it later), or `None` if it
    /// already settled on the fast path.
    pub fn submit_read(
        &mut self,
        handle: Handle,
        buf: OwningBuffer,
        completion: Completion<(OwningBuffer, usize)>,
    ) -> Option<IntentId> {
        let state = self.descriptors.entry(handle).or_insert_with(DescriptorState::new);
        let id = state.read_queue.next_id();
        // An already-pending read means the fast path must not be taken:
        // racing ahead of it would complete this read before one pushed
        // earlier, breaking the per-descriptor, per-direction FIFO ordering
        // guarantee (§4.5 "Ordering"; Open Questions resolution "this spec
        // forbids bypass").
        if !state.read_queue.is_empty() {
            state.read_queue.push(Intent::new(id, buf, completion));
            trace!("queued a read on {handle} behind already-pending reads (FIFO order)");
            return Some(id);
        }
        let mut intent = Intent::new(id, buf, completion);
        match attempt_intent(handle, &mut intent, &mut state.readiness, Direction::Read) {
            AttemptOutcome::Settled => {
                trace!("read {} bytes from {handle} on the fast path", intent.progress);
                let total = intent.progress;
                intent.finish(Ok(total));
                None
            }
            AttemptOutcome::Pending => {
                trace!("queued a read on {handle} ({} bytes so far)", intent.progress);
                state.read_queue.push(intent);
                Some(id)
            }
            AttemptOutcome::Error(err) => {
                warn!("read on {handle} failed: {err}");
                intent.finish(Err(err));
                None
            }
        }
    }

    /// Symmetric with [`Reactor::submit_read`].
    pub fn submit_write(
        &mut self,
        handle: Handle,
        buf: OwningBuffer,
        completion: Completion<(OwningBuffer, usize)>,
    ) -> Option<IntentId> {
        let state = self.descriptors.entry(handle).or_insert_with(DescriptorState::new);
        let id = state.write_queue.next_id();
        // Same FIFO-preservation rule as `submit_read`, for the write queue.
        if !state.write_queue.is_empty() {
            state.write_queue.push(Intent::new(id, buf, completion));
            trace!("queued a write on {handle} behind already-pending writes (FIFO order)");
            return Some(id);
        }
        let mut intent = Intent::new(id, buf, completion);
        match attempt_intent(handle, &mut intent, &mut state.readiness, Direction::Write) {
            AttemptOutcome::Settled => {
                trace!("wrote {} bytes to {handle} on the fast path", intent.progress);
                let total = intent.progress;
                intent.finish(Ok(total));
                None
            }
            AttemptOutcome::Pending => {
                trace!("queued a write on {handle} ({} bytes so far)", intent.progress);
                state.write_queue.push(intent);
                Some(id)
            }
            AttemptOutcome::Error(err) => {
                warn!("write on {handle} failed: {err}");
                intent.finish(Err(err));
                None
            }
        }
    }

    /// Cancel a queued read, if it is still pending: removes it from the
    /// descriptor's read queue (the rest shift up, order preserved) and
    /// fires its completion with [`PosixError::OperationCanceled`] (§5
    /// "Cancellation & timeouts"). Returns `false` if `id` had already
    /// settled or never existed.
    pub fn cancel_read(&mut self, handle: Handle, id: IntentId) -> bool {
        Self::cancel_in(&mut self.descriptors, handle, id, Direction::Read)
    }

    /// Symmetric with [`Reactor::cancel_read`].
    pub fn cancel_write(&mut self, handle: Handle, id: IntentId) -> bool {
        Self::cancel_in(&mut self.descriptors, handle, id, Direction::Write)
    }

    fn cancel_in(descriptors: &mut HashMap<Handle, DescriptorState>, handle: Handle, id: IntentId, dir: Direction) -> bool {
        let Some(state) = descriptors.get_mut(&handle) else {
            return false;
        };
        let queue = match dir {
            Direction::Read => &mut state.read_queue,
            Direction::Write => &mut state.write_queue,
        };
        match queue.cancel(id) {
            Some(intent) => {
                intent.finish(Err(ErrorCode::from(PosixError::OperationCanceled)));
                true
            }
            None => false,
        }
    }

    /// Attempt an accept now; queue it if no connection is pending.
    pub fn submit_accept(&mut self, listener: Handle, completion: Completion<Handle>) {
        let state = self.descriptors.entry(listener).or_insert_with(DescriptorState::new);
        match syscalls::accept(listener) {
            Ok((fd, _addr)) => {
                let raw = std::os::fd::IntoRawFd::into_raw_fd(fd);
                trace!("accepted {raw} on {listener} on the fast path");
                completion.complete(Ok(raw));
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                state.readiness.clear_readable();
                state.accept_queue.push_back(completion);
                trace!("queued an accept on {listener} (would-block)");
            }
            Err(err) => {
                completion.complete(Err(ErrorCode::from(err)));
            }
        }
    }

    /// Begin a non-blocking connect; queue the completion to settle once
    /// the descriptor becomes writable and `SO_ERROR` can be consulted.
    pub fn submit_connect(&mut self, handle: Handle, addr: std::net::SocketAddr, completion: Completion<()>) {
        let state = self.descriptors.entry(handle).or_insert_with(DescriptorState::new);
        match syscalls::connect(handle, addr) {
            Ok(()) => completion.complete(Ok(())),
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EINPROGRESS) =>
            {
                state.readiness.clear_writable();
                state.connect_queue.push_back(completion);
            }
            Err(err) => completion.complete(Err(ErrorCode::from(err))),
        }
    }

    /// Send one datagram to `addr` now; queue it if the descriptor
    /// would-block. Atomic, unlike [`Reactor::submit_write`]: the kernel
    /// either transmits the whole datagram or none of it, so there is no
    /// partial case to carry forward (§4.6, §7: would-block is never
    /// surfaced as an error — it is always absorbed into a wait here).
    pub fn submit_send_to(&mut self, handle: Handle, buf: OwningBuffer, addr: std::net::SocketAddr, completion: Completion<usize>) {
        let state = self.descriptors.entry(handle).or_insert_with(DescriptorState::new);
        if !state.send_to_queue.is_empty() {
            state.send_to_queue.push_back(AddressedSend::new(buf, addr, completion));
            trace!("queued a send_to on {handle} behind already-pending sends (FIFO order)");
            return;
        }
        match try_sendto(handle, &buf, addr) {
            Ok(n) => {
                trace!("sent {n} bytes to {addr} from {handle} on the fast path");
                completion.complete(Ok(n));
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                state.readiness.clear_writable();
                state.send_to_queue.push_back(AddressedSend::new(buf, addr, completion));
                trace!("queued a send_to on {handle} (would-block)");
            }
            Err(err) => {
                warn!("send_to on {handle} failed: {err}");
                completion.complete(Err(ErrorCode::from(err)));
            }
        }
    }

    /// Receive one datagram now; queue it if the descriptor would-block.
    /// Symmetric with [`Reactor::submit_send_to`].
    pub fn submit_recv_from(
        &mut self,
        handle: Handle,
        buf: OwningBuffer,
        completion: Completion<(OwningBuffer, usize, std::net::SocketAddr)>,
    ) {
        let state = self.descriptors.entry(handle).or_insert_with(DescriptorState::new);
        if !state.recv_from_queue.is_empty() {
            state.recv_from_queue.push_back(AddressedRecv::new(buf, completion));
            trace!("queued a recv_from on {handle} behind already-pending receives (FIFO order)");
            return;
        }
        let mut buf = buf;
        match try_recvfrom(handle, &mut buf) {
            Ok((n, addr)) => {
                trace!("received {n} bytes from {addr} on {handle} on the fast path");
                completion.complete(Ok((buf, n, addr)));
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                state.readiness.clear_readable();
                state.recv_from_queue.push_back(AddressedRecv::new(buf, completion));
                trace!("queued a recv_from on {handle} (would-block)");
            }
            Err(err) => {
                warn!("recv_from on {handle} failed: {err}");
                completion.complete(Err(ErrorCode::from(err)));
            }
        }
    }

    pub fn schedule_timer(&mut self, deadline: Instant, completion: Completion<Instant>) -> TimerId {
        self.timers.push(deadline, completion)
    }

    pub fn schedule_interval(&mut self, period: Duration, completion: Completion<Instant>) -> TimerId {
        self.timers.push_periodic(Instant::now() + period, period, completion)
    }

    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    /// A cheap, cloneable handle other threads can use to enqueue work onto
    /// this reactor (§5). The closure runs on the reactor's own thread, at
    /// the top of the next `turn`.
    pub fn remote(&self) -> RemoteHandle {
        RemoteHandle {
            submission: self.submission.clone(),
            waker: self.waker.clone(),
        }
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Run until [`Reactor::stop`] is called.
    pub fn run(&mut self) -> io::Result<()> {
        self.active = true;
        while self.active {
            self.turn()?;
        }
        Ok(())
    }

    /// Run exactly one iteration: drain cross-thread submissions, wait on
    /// epoll, dispatch events, drain queues, fire due timers.
    pub fn turn(&mut self) -> io::Result<()> {
        self.drain_submissions();

        let now = Instant::now();
        let timeout = self.timers.timeout_until_next(now);
        let mut events_buf = std::mem::take(&mut self.events_buf);
        self.selector.select(&mut events_buf, timeout)?;

        for event in &events_buf {
            let handle = event_handle(event);
            if self.waker.as_ref().is_some_and(|w| w.as_raw_fd() == handle) {
                if let Some(waker) = &self.waker {
                    let _ = waker.drain();
                }
                continue;
            }
            let flags = event_flags(event);
            self.dispatch(handle, flags);
        }
        self.events_buf = events_buf;

        let now = Instant::now();
        let fired = self.timers.pop_expired(now);
        if fired > 0 {
            trace!("fired {fired} timer(s)");
        }
        Ok(())
    }

    fn drain_submissions(&mut self) {
        let jobs: Vec<RemoteJob> = {
            let mut queue = self.submission.lock().expect("submission queue poisoned");
            queue.drain(..).collect()
        };
        for job in jobs {
            job(self);
        }
    }

    fn dispatch(&mut self, handle: Handle, flags: u32) {
        let Some(state) = self.descriptors.get_mut(&handle) else {
            return;
        };
        state.readiness.merge_event(flags);

        if state.readiness.is_terminal() {
            let err = terminal_error(handle, state.readiness.error());
            self.fail_and_deregister(handle, err);
            return;
        }

        while state.readiness.readable() && !state.accept_queue.is_empty() {
            match syscalls::accept(handle) {
                Ok((fd, _addr)) => {
                    let raw = std::os::fd::IntoRawFd::into_raw_fd(fd);
                    let completion = state.accept_queue.pop_front().expect("just checked non-empty");
                    completion.complete(Ok(raw));
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    state.readiness.clear_readable();
                    break;
                }
                Err(err) => {
                    if let Some(completion) = state.accept_queue.pop_front() {
                        completion.complete(Err(ErrorCode::from(err)));
                    }
                }
            }
        }

        while state.readiness.writable() && !state.connect_queue.is_empty() {
            let completion = state.connect_queue.pop_front().expect("just checked non-empty");
            match syscalls::take_socket_error(handle) {
                Ok(()) => completion.complete(Ok(())),
                Err(err) => completion.complete(Err(ErrorCode::from(err))),
            }
        }

        while state.readiness.writable() && !state.send_to_queue.is_empty() {
            let item = state.send_to_queue.front().expect("just checked non-empty");
            match try_sendto(handle, &item.buffer, item.addr) {
                Ok(n) => {
                    let item = state.send_to_queue.pop_front().expect("front just confirmed an entry");
                    item.finish(Ok(n));
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    state.readiness.clear_writable();
                    break;
                }
                Err(err) => {
                    let item = state.send_to_queue.pop_front().expect("front just confirmed an entry");
                    item.finish(Err(ErrorCode::from(err)));
                }
            }
        }

        while state.readiness.readable() && !state.recv_from_queue.is_empty() {
            let item = state.recv_from_queue.front_mut().expect("just checked non-empty");
            match try_recvfrom(handle, &mut item.buffer) {
                Ok((n, addr)) => {
                    let item = state.recv_from_queue.pop_front().expect("front_mut just confirmed an entry");
                    item.finish(Ok((n, addr)));
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    state.readiness.clear_readable();
                    break;
                }
                Err(err) => {
                    let item = state.recv_from_queue.pop_front().expect("front_mut just confirmed an entry");
                    item.finish(Err(ErrorCode::from(err)));
                }
            }
        }

        drain_direction(handle, &mut state.read_queue, &mut state.readiness, Direction::Read);
        drain_direction(handle, &mut state.write_queue, &mut state.readiness, Direction::Write);
    }

    /// Fail every pending intent on a descriptor (both I/O directions, plus
    /// any pending accept/connect) with `err`, then deregister it: the
    /// reactor loop's step 4, "if a hangup or error bit is now set, fail
    /// every pending intent on both queues with the latched error, then
    /// deregister" (spec.md §4.5).
    fn fail_and_deregister(&mut self, handle: Handle, err: ErrorCode) {
        if let Some(mut state) = self.descriptors.remove(&handle) {
            while let Some(intent) = state.read_queue.pop_front() {
                intent.finish(Err(err));
            }
            while let Some(intent) = state.write_queue.pop_front() {
                intent.finish(Err(err));
            }
            while let Some(completion) = state.accept_queue.pop_front() {
                completion.complete(Err(err));
            }
            while let Some(completion) = state.connect_queue.pop_front() {
                completion.complete(Err(err));
            }
            while let Some(item) = state.send_to_queue.pop_front() {
                item.finish(Err(err));
            }
            while let Some(item) = state.recv_from_queue.pop_front() {
                item.finish(Err(err));
            }
        }
        let _ = self.selector.deregister(handle);
        debug!("{handle} reached a terminal state ({err}); failed its queues and deregistered");
    }
}

/// The error to fail pending intents with once a descriptor latches
/// error/hangup. When the error bit is set, `SO_ERROR` names the real
/// failure (e.g. `ECONNRESET` after a peer RST); a bare hangup with no
/// latched error (an orderly close racing a queued intent) is reported as a
/// connection reset too, since there is no pending data left to deliver.
fn terminal_error(handle: Handle, has_error_bit: bool) -> ErrorCode {
    if has_error_bit {
        match syscalls::take_socket_error(handle) {
            Ok(()) => ErrorCode::from(PosixError::ConnectionReset),
            Err(err) => ErrorCode::from(err),
        }
    } else {
        ErrorCode::from(PosixError::ConnectionReset)
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        if let Some(waker) = self.waker.take() {
            let _ = self.selector.deregister(waker.as_raw_fd());
        }
    }
}

fn drain_direction(handle: Handle, queue: &mut PendingQueue, readiness: &mut crate::readiness::Readiness, dir: Direction) {
    loop {
        let ready = match dir {
            Direction::Read => readiness.readable(),
            Direction::Write => readiness.writable(),
        };
        if !ready || queue.is_empty() {
            break;
        }
        let Some(intent) = queue.front_mut() else { break };
        match attempt_intent(handle, intent, readiness, dir) {
            AttemptOutcome::Settled => {
                let intent = queue.pop_front().expect("front_mut just confirmed an entry");
                let total = intent.progress;
                intent.finish(Ok(total));
            }
            AttemptOutcome::Pending => break,
            AttemptOutcome::Error(err) => {
                let intent = queue.pop_front().expect("front_mut just confirmed an entry");
                intent.finish(Err(err));
            }
        }
    }
}

/// How a single fast-path or queued-drain attempt at an intent came out.
enum AttemptOutcome {
    /// The intent transferred its full length, or hit EOF (a zero-byte
    /// transfer) partway through — either way there is nothing left to
    /// retry and the intent finishes with however many bytes it moved.
    Settled,
    /// The descriptor would-block before the intent finished; it stays
    /// queued with whatever progress it already made.
    Pending,
    Error(ErrorCode),
}

/// Drive one intent's syscall (`recv`/`send`) until it completes, hits a
/// hard error, or would-blocks, retrying immediately on a partial transfer
/// the same way [`drain_direction`] retries a queued intent (spec.md §4.6:
/// "On partial success, push the remainder as a new intent" — applied here
/// before the intent is ever queued, so a fast-path caller only sees it
/// queued once every immediately-available byte has already been moved).
fn attempt_intent(handle: Handle, intent: &mut Intent, readiness: &mut crate::readiness::Readiness, dir: Direction) -> AttemptOutcome {
    loop {
        let attempt = {
            let progress = intent.progress;
            let remaining = intent.remaining();
            let mut view = RefBuffer::from_mut_slice(&mut intent.buffer.as_mut_slice()[progress..progress + remaining]);
            match dir {
                Direction::Read => try_recv_ref(handle, &mut view),
                Direction::Write => try_send_ref(handle, &view),
            }
        };
        match attempt {
            Ok(n) => {
                intent.advance(n);
                if n == 0 || intent.is_complete() {
                    return AttemptOutcome::Settled;
                }
                // Non-zero partial transfer on a descriptor that is still
                // ready: loop and try to move the remainder right away.
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                match dir {
                    Direction::Read => readiness.clear_readable(),
                    Direction::Write => readiness.clear_writable(),
                }
                return AttemptOutcome::Pending;
            }
            Err(err) => return AttemptOutcome::Error(ErrorCode::from(err)),
        }
    }
}

fn try_recv_ref(handle: Handle, buf: &mut RefBuffer<'_>) -> io::Result<usize> {
    syscalls::recv(handle, buf)
}

fn try_send_ref(handle: Handle, buf: &RefBuffer<'_>) -> io::Result<usize> {
    syscalls::send(handle, buf)
}

fn try_sendto(handle: Handle, buf: &OwningBuffer, addr: std::net::SocketAddr) -> io::Result<usize> {
    let view = RefBuffer::from_slice(buf.as_slice());
    syscalls::sendto(handle, &view, addr)
}

fn try_recvfrom(handle: Handle, buf: &mut OwningBuffer) -> io::Result<(usize, std::net::SocketAddr)> {
    let mut view = buf.as_ref_buffer();
    syscalls::recvfrom(handle, &mut view)
}

/// A cheap, `Send + Sync` handle other threads use to schedule work onto a
/// [`Reactor`] that lives on a different thread, per §5's optional
/// cross-thread submission mechanism.
#[derive(Clone)]
pub struct RemoteHandle {
    submission: Arc<Mutex<VecDeque<RemoteJob>>>,
    waker: Option<Arc<Waker>>,
}

impl RemoteHandle {
    /// Enqueue a closure to run on the reactor's own thread, then nudge the
    /// reactor out of its blocking wait so it notices promptly.
    pub fn submit(&self, job: impl FnOnce(&mut Reactor) + Send + 'static) {
        self.submission.lock().expect("submission queue poisoned").push_back(Box::new(job));
        if let Some(waker) = &self.waker {
            let _ = waker.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn builder_defaults_are_sane() {
        let builder = ReactorBuilder::new();
        assert_eq!(builder.event_capacity, 256);
        assert!(builder.enable_waker);
    }

    #[test]
    fn a_pipe_write_wakes_a_queued_read() {
        let mut reactor = Reactor::builder().enable_waker(false).build().expect("build reactor");
        let mut fds = [0i32; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let [read_fd, write_fd] = fds;
        reactor.register(read_fd).expect("register");

        let got = Arc::new(Mutex::new(None));
        let got2 = got.clone();
        reactor.submit_read(read_fd, OwningBuffer::zeroed(4), Completion::new(move |result| {
            *got2.lock().unwrap() = Some(result);
        }));
        // Nothing written yet: the intent must have been queued, not completed.
        assert!(got.lock().unwrap().is_none());

        let payload = [9u8, 9, 9, 9];
        assert_eq!(unsafe { libc::write(write_fd, payload.as_ptr() as *const _, 4) }, 4);

        reactor.turn().expect("turn");
        let (buffer, n) = got.lock().unwrap().take().expect("completion ran").expect("read succeeded");
        assert_eq!(n, 4);
        assert_eq!(buffer.as_slice(), &payload);

        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }

    #[test]
    fn remote_handle_wakes_the_reactor_to_run_a_job() {
        let mut reactor = Reactor::builder().build().expect("build reactor");
        let remote = reactor.remote();
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        remote.submit(move |_reactor| ran2.store(true, Ordering::SeqCst));
        reactor.turn().expect("turn");
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn cancelling_a_queued_read_fires_its_completion_with_operation_canceled() {
        let mut reactor = Reactor::builder().enable_waker(false).build().expect("build reactor");
        let mut fds = [0i32; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let [read_fd, write_fd] = fds;
        reactor.register(read_fd).expect("register");

        let got = Arc::new(Mutex::new(None));
        let got2 = got.clone();
        let id = reactor
            .submit_read(read_fd, OwningBuffer::zeroed(4), Completion::new(move |result| {
                *got2.lock().unwrap() = Some(result);
            }))
            .expect("nothing written yet, so the read must have been queued");

        assert!(reactor.cancel_read(read_fd, id));
        let result = got.lock().unwrap().take().expect("cancellation completes synchronously");
        assert_eq!(result.unwrap_err(), crate::error::PosixError::OperationCanceled);

        // Cancelling the same id again is a no-op, not a double-complete.
        assert!(!reactor.cancel_read(read_fd, id));

        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }
}
