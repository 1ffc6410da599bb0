//! Tick scheduler for a running animation.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// Yields immediately, then every `every` measured from the previous tick.
///
/// Time spent handling a tick counts towards the wait for the next one. Changing `every`
/// reschedules the pending tick relative to the last one instead of restarting the period.
#[derive(Debug)]
pub struct Ticker {
    every: Duration,
    start: Instant,
    last_tick: Option<Instant>,
    max_time: Option<Duration>,
    iteration: u64,
    done: bool,
}

impl Ticker {
    pub fn new(every: Duration, max_time: Option<Duration>) -> Self {
        Self {
            every,
            start: Instant::now(),
            last_tick: None,
            max_time,
            iteration: 0,
            done: false,
        }
    }

    pub fn every(&self) -> Duration {
        self.every
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn change_every(&mut self, every: Duration) {
        self.every = every;
    }

    pub fn stop(&mut self) {
        self.done = true;
    }

    fn out_of_time(&mut self) -> bool {
        if let Some(max) = self.max_time
            && self.start.elapsed() >= max
        {
            self.done = true;
        }
        self.done
    }

    /// Wait for the next tick. `None` once `max_time` has passed.
    ///
    /// Dropping the returned future before it resolves leaves the schedule untouched.
    pub async fn tick(&mut self) -> Option<u64> {
        if self.out_of_time() {
            return None;
        }
        if let Some(last) = self.last_tick {
            sleep_until(last + self.every).await;
            if self.out_of_time() {
                return None;
            }
        }
        self.last_tick = Some(Instant::now());
        self.iteration += 1;
        Some(self.iteration)
    }
}
