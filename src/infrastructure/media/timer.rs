//! Timer manager driven by the engine tick
//!
//! Timers are one-shot; owners re-arm them from their handler. Killing or
//! re-arming bumps a generation so stale heap entries are skipped lazily.

use crate::domain::shared::TerminationId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

/// Timer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

#[derive(Debug)]
struct TimerEntry {
    owner: TerminationId,
    generation: u64,
    armed: bool,
}

/// Monotonic millisecond clock with a deadline heap
#[derive(Debug, Default)]
pub struct TimerManager {
    now_ms: u64,
    next_id: u64,
    timers: HashMap<TimerId, TimerEntry>,
    heap: BinaryHeap<Reverse<(u64, u64, TimerId)>>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds elapsed since the manager was created
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Register a disarmed timer owned by a termination
    pub fn create(&mut self, owner: TerminationId) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(
            id,
            TimerEntry {
                owner,
                generation: 0,
                armed: false,
            },
        );
        id
    }

    /// Arm (or re-arm) a timer to fire `timeout_ms` from now
    pub fn set(&mut self, id: TimerId, timeout_ms: u64) -> bool {
        let Some(entry) = self.timers.get_mut(&id) else {
            return false;
        };
        entry.generation += 1;
        entry.armed = true;
        self.heap
            .push(Reverse((self.now_ms + timeout_ms, entry.generation, id)));
        true
    }

    /// Disarm a timer without removing it
    pub fn kill(&mut self, id: TimerId) -> bool {
        let Some(entry) = self.timers.get_mut(&id) else {
            return false;
        };
        entry.generation += 1;
        entry.armed = false;
        true
    }

    pub fn remove(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.timers.get(&id).is_some_and(|entry| entry.armed)
    }

    /// Advance the clock and collect expired timers in deadline order
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<(TimerId, TerminationId)> {
        self.now_ms += elapsed_ms;
        let mut fired = Vec::new();

        while let Some(Reverse((deadline, generation, id))) = self.heap.peek().copied() {
            if deadline > self.now_ms {
                break;
            }
            self.heap.pop();
            if let Some(entry) = self.timers.get_mut(&id) {
                if entry.armed && entry.generation == generation {
                    entry.armed = false;
                    fired.push((id, entry.owner));
                }
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_fires_once_at_deadline() {
        let mut timers = TimerManager::new();
        let owner = TerminationId::new();
        let id = timers.create(owner);
        assert!(timers.set(id, 30));

        assert!(timers.advance(20).is_empty());
        assert_eq!(timers.advance(10), vec![(id, owner)]);
        assert!(!timers.is_armed(id));
        assert!(timers.advance(100).is_empty());
    }

    #[test]
    fn test_kill_and_rearm_skip_stale_entries() {
        let mut timers = TimerManager::new();
        let owner = TerminationId::new();
        let id = timers.create(owner);

        timers.set(id, 10);
        timers.kill(id);
        assert!(timers.advance(10).is_empty());

        timers.set(id, 10);
        timers.set(id, 50);
        assert!(timers.advance(20).is_empty());
        assert_eq!(timers.advance(40).len(), 1);
        assert_eq!(timers.now_ms(), 70);
    }

    #[test]
    fn test_deadline_order() {
        let mut timers = TimerManager::new();
        let owner = TerminationId::new();
        let late = timers.create(owner);
        let early = timers.create(owner);
        timers.set(late, 20);
        timers.set(early, 10);

        let fired: Vec<TimerId> = timers.advance(30).into_iter().map(|(id, _)| id).collect();
        assert_eq!(fired, vec![early, late]);
    }

    #[test]
    fn test_removed_timer_never_fires() {
        let mut timers = TimerManager::new();
        let id = timers.create(TerminationId::new());
        timers.set(id, 5);
        timers.remove(id);
        assert!(timers.advance(10).is_empty());
        assert!(!timers.set(id, 5));
    }
}
