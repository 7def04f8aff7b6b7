//! Engine clock
//!
//! A fixed-period tick source paired with the timer heap it drives. The
//! interval is created on the first tick so a scheduler can be built
//! outside a runtime.

use crate::domain::shared::TerminationId;
use crate::infrastructure::media::timer::{TimerId, TimerManager};
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

pub struct Scheduler {
    tick_ms: u64,
    interval: Option<Interval>,
    timers: TimerManager,
    ticks: u64,
}

impl Scheduler {
    pub fn new(tick_ms: u64) -> Self {
        Self {
            tick_ms: tick_ms.max(1),
            interval: None,
            timers: TimerManager::new(),
            ticks: 0,
        }
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    /// Ticks elapsed since start
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn timers(&self) -> &TimerManager {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut TimerManager {
        &mut self.timers
    }

    /// Wait for the next quantum and return the timers it expired
    ///
    /// Late ticks are delivered back to back so media time keeps pace with
    /// wall time.
    pub async fn tick(&mut self) -> Vec<(TimerId, TerminationId)> {
        let tick_ms = self.tick_ms;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = time::interval(Duration::from_millis(tick_ms));
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            interval
        });
        interval.tick().await;
        self.ticks += 1;
        self.timers.advance(self.tick_ms)
    }
}
