//! Per-tree render debounce with a single-flight guard.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::config::SchedulerSettings;
use crate::timeline::{TimerId, Timeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Scheduled,
    Rendering,
}

/// Outcome of a debounce timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fire {
    Run,
    /// A render for the same key is still in flight; the request is dropped.
    Dropped,
    /// The timer was superseded by a later request.
    Stale,
}

/// Newer requests supersede pending ones; requests that fire while a render is in
/// flight are dropped, not queued. The in-flight mark is cleared `cooldown_ms` after
/// a render finishes.
#[derive(Debug)]
pub struct RenderScheduler<K> {
    debounce_ms: u64,
    cooldown_ms: u64,
    pending: HashMap<K, TimerId>,
    in_flight: HashSet<K>,
}

impl<K> RenderScheduler<K>
where
    K: Copy + Eq + Hash + Debug,
{
    pub fn new(settings: &SchedulerSettings) -> Self {
        Self {
            debounce_ms: settings.debounce_ms,
            cooldown_ms: settings.cooldown_ms,
            pending: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    /// Arm (or re-arm) the debounce timer for `key`.
    pub fn request<T>(
        &mut self,
        timeline: &mut Timeline<T>,
        key: K,
        delay_ms: Option<u64>,
        task: T,
    ) -> TimerId {
        if let Some(previous) = self.pending.remove(&key) {
            timeline.cancel(previous);
        }
        let id = timeline.schedule(delay_ms.unwrap_or(self.debounce_ms), task);
        self.pending.insert(key, id);
        id
    }

    pub fn fire(&mut self, key: K, timer: TimerId) -> Fire {
        match self.pending.get(&key) {
            Some(current) if *current == timer => {
                self.pending.remove(&key);
            }
            _ => return Fire::Stale,
        }
        if !self.in_flight.insert(key) {
            log::debug!("render for {key:?} skipped (in-flight)");
            return Fire::Dropped;
        }
        Fire::Run
    }

    /// Mark the render done; `release` is delivered after the cooldown and must be
    /// passed back to [`RenderScheduler::release`].
    pub fn finish<T>(&mut self, timeline: &mut Timeline<T>, release: T) -> TimerId {
        timeline.schedule(self.cooldown_ms, release)
    }

    pub fn release(&mut self, key: K) {
        self.in_flight.remove(&key);
    }

    /// Forget everything about `key`, cancelling its pending timer.
    pub fn forget<T>(&mut self, timeline: &mut Timeline<T>, key: K) {
        if let Some(timer) = self.pending.remove(&key) {
            timeline.cancel(timer);
        }
        self.in_flight.remove(&key);
    }

    pub fn state(&self, key: K) -> RenderState {
        if self.in_flight.contains(&key) {
            RenderState::Rendering
        } else if self.pending.contains_key(&key) {
            RenderState::Scheduled
        } else {
            RenderState::Idle
        }
    }
}
