//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Frame scheduler
//!
//! A virtual millisecond clock holding at most one periodic tick and any number of
//! one-shot calls. The scheduler never runs anything itself: the owner asks for the
//! events that are due with [`FrameScheduler::pop_due`] and dispatches them.

use std::collections::BTreeMap;

/// Handle returned by [`FrameScheduler::schedule_once`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OneShotId(u64);

#[derive(Debug, Clone)]
struct TickBinding<E> {
    handler: E,
    interval_ms: u64,
    next_due_ms: u64,
}

/// Single-handler tick plus cancellable one-shot calls
#[derive(Debug)]
pub struct FrameScheduler<E: Clone> {
    now_ms: u64,
    tick: Option<TickBinding<E>>,
    pending: BTreeMap<(u64, u64), E>,
    next_seq: u64,
}

impl<E: Clone> Default for FrameScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> FrameScheduler<E> {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Scheduler whose clock starts at `now_ms`
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now_ms,
            tick: None,
            pending: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Bind `handler` as the only tick handler, replacing any previous binding.
    ///
    /// The first tick fires one interval from now. Returns the replaced handler.
    pub fn set_tick_handler(&mut self, handler: E, interval_ms: u64) -> Option<E> {
        let interval_ms = interval_ms.max(1);
        let previous = self.tick.replace(TickBinding {
            handler,
            interval_ms,
            next_due_ms: self.now_ms.saturating_add(interval_ms),
        });
        previous.map(|binding| binding.handler)
    }

    /// Unbind the tick handler. Does nothing when none is bound.
    pub fn clear_tick_handler(&mut self) -> Option<E> {
        self.tick.take().map(|binding| binding.handler)
    }

    pub fn is_ticking(&self) -> bool {
        self.tick.is_some()
    }

    pub fn tick_interval(&self) -> Option<u64> {
        self.tick.as_ref().map(|binding| binding.interval_ms)
    }

    /// Run `event` once, `delay_ms` from now
    pub fn schedule_once(&mut self, delay_ms: u64, event: E) -> OneShotId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending
            .insert((self.now_ms.saturating_add(delay_ms), seq), event);
        OneShotId(seq)
    }

    /// Cancel a one-shot call. Returns false when it already fired or was cancelled.
    pub fn cancel(&mut self, id: OneShotId) -> bool {
        let key = self.pending.keys().find(|(_, seq)| *seq == id.0).copied();
        key.and_then(|key| self.pending.remove(&key)).is_some()
    }

    /// Cancel every outstanding one-shot call, returning how many were dropped
    pub fn cancel_pending(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Time of the next event, tick or one-shot
    pub fn next_deadline(&self) -> Option<u64> {
        let tick = self.tick.as_ref().map(|binding| binding.next_due_ms);
        let once = self.pending.keys().next().map(|(due, _)| *due);
        match (tick, once) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Take the earliest event due at or before `now_ms`.
    ///
    /// The clock moves to the event's due time, so anything the caller schedules while
    /// handling it is relative to that instant. A tick due at the same time as a
    /// one-shot fires first. Returns `None` once nothing else is due, leaving the clock
    /// at `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<E> {
        let tick_due = self
            .tick
            .as_ref()
            .map(|binding| binding.next_due_ms)
            .filter(|due| *due <= now_ms);
        let once_due = self
            .pending
            .keys()
            .next()
            .map(|(due, _)| *due)
            .filter(|due| *due <= now_ms);

        match (tick_due, once_due) {
            (Some(tick), once) if once.is_none_or(|once| tick <= once) => {
                let binding = self.tick.as_mut()?;
                self.now_ms = self.now_ms.max(tick);
                binding.next_due_ms = tick.saturating_add(binding.interval_ms);
                Some(binding.handler.clone())
            }
            (_, Some(_)) => {
                let ((due, _), event) = self.pending.pop_first()?;
                self.now_ms = self.now_ms.max(due);
                Some(event)
            }
            _ => {
                self.now_ms = self.now_ms.max(now_ms);
                None
            }
        }
    }

    /// Move the clock forward without firing anything
    pub fn advance_clock(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Collapse tick slots missed before `now_ms` into the latest one.
    ///
    /// The next [`FrameScheduler::pop_due`] then fires a single late tick instead of
    /// one per missed interval. One-shot calls are untouched. Returns how many ticks
    /// were dropped.
    pub fn skip_missed_ticks(&mut self, now_ms: u64) -> u64 {
        let Some(binding) = self.tick.as_mut() else {
            return 0;
        };
        if binding.next_due_ms > now_ms {
            return 0;
        }
        let missed = (now_ms - binding.next_due_ms) / binding.interval_ms;
        binding.next_due_ms += missed * binding.interval_ms;
        missed
    }
}
