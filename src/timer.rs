//! The timer heap (C7): a monotonic min-heap of deadlines, plus periodic
//! re-arm.
//!
//! Deadlines are `std::time::Instant`, matching the original's
//! `std::chrono::steady_clock` (`timer_list.h`). Re-arm computes
//! `now + period` at fire time rather than `previous_deadline + period`,
//! following `Timer::update()` in the original: a timer that oversleeps
//! (because the reactor was busy draining I/O) does not fire a burst of
//! catch-up ticks to make up for lost time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crate::queue::Completion;

/// Opaque identity for a scheduled timer, returned by [`TimerHeap::push`] so
/// callers can distinguish their own entries if they schedule several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Entry {
    deadline: Instant,
    id: TimerId,
    period: Option<Duration>,
    completion: Completion<Instant>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Entry) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}
impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Entry) -> Ordering {
        // `BinaryHeap` is a max-heap; reverse so the earliest deadline sorts
        // highest, making `peek`/`pop` return the soonest timer.
        other.deadline.cmp(&self.deadline).then_with(|| other.id.0.cmp(&self.id.0))
    }
}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Entry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of pending timers, keyed by deadline.
#[derive(Default)]
pub struct TimerHeap {
    heap: BinaryHeap<Entry>,
    next_id: u64,
}

impl TimerHeap {
    pub fn new() -> TimerHeap {
        TimerHeap {
            heap: BinaryHeap::new(),
            next_id: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> TimerHeap {
        TimerHeap {
            heap: BinaryHeap::with_capacity(capacity),
            next_id: 0,
        }
    }

    /// Schedule a one-shot timer to fire at `deadline`.
    pub fn push(&mut self, deadline: Instant, completion: Completion<Instant>) -> TimerId {
        self.push_inner(deadline, None, completion)
    }

    /// Schedule a timer that re-arms itself for `now + period` every time it
    /// fires. `completion` is invoked once per tick; the caller is
    /// responsible for re-registering if it wants the next tick's
    /// completion delivered too (see [`crate::reactor::Reactor`]'s interval
    /// wiring), since a [`Completion`] is one-shot by construction.
    pub fn push_periodic(&mut self, first_deadline: Instant, period: Duration, completion: Completion<Instant>) -> TimerId {
        self.push_inner(first_deadline, Some(period), completion)
    }

    fn push_inner(&mut self, deadline: Instant, period: Option<Duration>, completion: Completion<Instant>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(Entry {
            deadline,
            id,
            period,
            completion,
        });
        id
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// The soonest scheduled deadline, if any timer is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// How long until the next timer fires, `None` if the heap is empty
    /// (meaning the reactor should block on epoll with no timeout).
    /// Already-due timers report `Duration::ZERO`, never a negative delta.
    pub fn timeout_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline().map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Pop and fire every timer whose deadline is at or before `now`,
    /// re-arming periodic ones for `now + period`. Returns the number of
    /// timers fired.
    pub fn pop_expired(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(next) = self.heap.peek() {
            if next.deadline > now {
                break;
            }
            let entry = self.heap.pop().expect("peek just confirmed an entry");
            if let Some(period) = entry.period {
                let next_deadline = now + period;
                let id = entry.id;
                // Re-insert before invoking the completion so a panicking
                // completion can't silently drop the recurring timer.
                self.heap.push(Entry {
                    deadline: next_deadline,
                    id,
                    period: Some(period),
                    completion: Completion::new(|_| {}),
                });
                entry.completion.complete(Ok(now));
                fired += 1;
            } else {
                entry.completion.complete(Ok(now));
                fired += 1;
            }
        }
        fired
    }

    /// Remove a pending timer before it fires. Returns `true` if it was
    /// found and removed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.heap.len();
        self.heap = self.heap.drain().filter(|entry| entry.id != id).collect();
        self.heap.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn pop_expired_fires_in_deadline_order() {
        let now = Instant::now();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut heap = TimerHeap::new();
        for (id, delay_ms) in [(0u32, 30), (1, 10), (2, 20)] {
            let order = order.clone();
            heap.push(now + Duration::from_millis(delay_ms), Completion::new(move |_| order.lock().unwrap().push(id)));
        }
        heap.pop_expired(now + Duration::from_millis(25));
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn next_deadline_tracks_the_soonest_entry() {
        let now = Instant::now();
        let mut heap = TimerHeap::new();
        heap.push(now + Duration::from_secs(5), Completion::new(|_| {}));
        heap.push(now + Duration::from_secs(1), Completion::new(|_| {}));
        assert_eq!(heap.next_deadline(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn timeout_until_next_never_goes_negative() {
        let now = Instant::now();
        let mut heap = TimerHeap::new();
        heap.push(now, Completion::new(|_| {}));
        let later = now + Duration::from_millis(50);
        assert_eq!(heap.timeout_until_next(later), Some(Duration::ZERO));
    }

    #[test]
    fn periodic_timer_rearms_at_now_plus_period_not_previous_plus_period() {
        let base = Instant::now();
        let mut heap = TimerHeap::new();
        heap.push_periodic(base, Duration::from_millis(100), Completion::new(|_| {}));
        // Fire late, as if the reactor was busy: "now" is far past the
        // original deadline.
        let late_now = base + Duration::from_millis(500);
        heap.pop_expired(late_now);
        // Re-arm must be relative to `late_now`, not `base`, so it does not
        // immediately re-fire a backlog of missed ticks.
        assert_eq!(heap.next_deadline(), Some(late_now + Duration::from_millis(100)));
    }

    #[test]
    fn cancel_removes_a_pending_timer() {
        let now = Instant::now();
        let mut heap = TimerHeap::new();
        let id = heap.push(now + Duration::from_secs(1), Completion::new(|_| {}));
        assert!(heap.cancel(id));
        assert!(heap.is_empty());
    }
}
