//! Cooperative event loop with a virtual millisecond clock.
//!
//! Tasks are plain values; the owner pops due tasks and dispatches them. Equal deadlines
//! fire in scheduling order. Cancelled timers are skipped lazily when they reach the top
//! of the heap.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Deadline {
    at: u64,
    seq: u64,
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on (at, seq).
        other.at.cmp(&self.at).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
pub struct Timeline<T> {
    now: u64,
    next_seq: u64,
    heap: BinaryHeap<Deadline>,
    pending: HashMap<u64, T>,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Timeline<T> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn schedule(&mut self, delay_ms: u64, task: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Deadline {
            at: self.now.saturating_add(delay_ms),
            seq,
        });
        self.pending.insert(seq, task);
        TimerId(seq)
    }

    /// Returns the task if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        self.pending.remove(&id.0)
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deadline of the earliest live timer.
    pub fn next_deadline(&mut self) -> Option<u64> {
        self.discard_cancelled();
        self.heap.peek().map(|d| d.at)
    }

    /// Pop the earliest task due at or before `until`, advancing the clock to its
    /// deadline.
    pub fn pop_due(&mut self, until: u64) -> Option<(TimerId, T)> {
        self.discard_cancelled();
        let top = *self.heap.peek()?;
        if top.at > until {
            return None;
        }
        self.heap.pop();
        self.now = self.now.max(top.at);
        self.pending.remove(&top.seq).map(|task| (TimerId(top.seq), task))
    }

    /// Move the clock forward without running anything.
    pub fn advance_to(&mut self, at: u64) {
        self.now = self.now.max(at);
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }

    fn discard_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.pending.contains_key(&top.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_deadline_order_with_fifo_ties() {
        let mut timeline = Timeline::new();
        timeline.schedule(50, "b");
        timeline.schedule(10, "a");
        timeline.schedule(50, "c");

        let mut order = Vec::new();
        while let Some((_, task)) = timeline.pop_due(u64::MAX) {
            order.push((timeline.now(), task));
        }
        assert_eq!(order, vec![(10, "a"), (50, "b"), (50, "c")]);
    }

    #[test]
    fn respects_until_bound() {
        let mut timeline = Timeline::new();
        timeline.schedule(100, ());
        assert!(timeline.pop_due(99).is_none());
        assert_eq!(timeline.now(), 0);
        assert!(timeline.pop_due(100).is_some());
        assert_eq!(timeline.now(), 100);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timeline = Timeline::new();
        let first = timeline.schedule(10, 1);
        timeline.schedule(20, 2);
        assert_eq!(timeline.cancel(first), Some(1));
        assert_eq!(timeline.cancel(first), None);
        assert_eq!(timeline.next_deadline(), Some(20));
        assert_eq!(timeline.pop_due(u64::MAX).map(|(_, t)| t), Some(2));
        assert!(timeline.is_idle());
    }

    #[test]
    fn delays_are_relative_to_now() {
        let mut timeline = Timeline::new();
        timeline.advance_to(1_000);
        timeline.schedule(5, ());
        assert_eq!(timeline.next_deadline(), Some(1_005));
    }
}
