//! Debounced autosave timer.

use std::time::Duration;
use tokio::time::Instant;

/// Debounces local mutations into a single push trigger.
///
/// Every `arm` restarts the delay. The scheduler only tracks the deadline;
/// the session driver sleeps until [`deadline`](Self::deadline) and then
/// calls [`poll`](Self::poll). While paused the deadline is kept but never
/// fires, so resuming after an outage still pushes pending edits.
#[derive(Debug, Clone)]
pub struct AutosaveScheduler {
    delay: Duration,
    deadline: Option<Instant>,
    paused: bool,
}

impl AutosaveScheduler {
    /// Creates an idle scheduler with debounce delay `delay`.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            paused: false,
        }
    }

    /// Returns the debounce delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)starts the debounce timer.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Drops any pending deadline.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Stops the timer from firing.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Lets the timer fire again.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Returns true if paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns true if a deadline is pending (paused or not).
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns the instant the timer fires at, if it can fire.
    pub fn deadline(&self) -> Option<Instant> {
        if self.paused {
            None
        } else {
            self.deadline
        }
    }

    /// Consumes the deadline if it has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
