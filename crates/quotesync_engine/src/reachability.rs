//! Online/offline tracking.

use std::time::Duration;
use tokio::time::Instant;

/// Connectivity as last reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// The network is available.
    Online,
    /// The network is unavailable.
    Offline,
}

/// A state change reported by [`ReachabilityMonitor::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityTransition {
    /// online -> offline.
    WentOffline,
    /// offline -> online.
    ///
    /// `reconnected` is false when the previous reconnect happened within
    /// the cooldown window; the coordinator then resumes without starting
    /// another catch-up.
    CameOnline {
        /// Whether this transition counts as a `reconnected` event.
        reconnected: bool,
    },
}

/// Tracks `online <-> offline` transitions with reconnect debouncing.
#[derive(Debug, Clone)]
pub struct ReachabilityMonitor {
    state: Reachability,
    cooldown: Duration,
    last_reconnect: Option<Instant>,
}

impl ReachabilityMonitor {
    /// Creates a monitor that starts online.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Reachability::Online,
            cooldown,
            last_reconnect: None,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> Reachability {
        self.state
    }

    /// Returns true if currently online.
    pub fn is_online(&self) -> bool {
        self.state == Reachability::Online
    }

    /// Feeds a connectivity signal. Returns the transition, if any.
    pub fn observe(&mut self, online: bool, now: Instant) -> Option<ReachabilityTransition> {
        match (self.state, online) {
            (Reachability::Online, true) | (Reachability::Offline, false) => None,
            (Reachability::Online, false) => {
                self.state = Reachability::Offline;
                Some(ReachabilityTransition::WentOffline)
            }
            (Reachability::Offline, true) => {
                self.state = Reachability::Online;
                let reconnected = self
                    .last_reconnect
                    .map_or(true, |at| now.duration_since(at) >= self.cooldown);
                if reconnected {
                    self.last_reconnect = Some(now);
                }
                Some(ReachabilityTransition::CameOnline { reconnected })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_online_and_ignores_repeats() {
        let mut monitor = ReachabilityMonitor::new(Duration::from_secs(2));
        let now = Instant::now();
        assert!(monitor.is_online());
        assert_eq!(monitor.observe(true, now), None);

        assert_eq!(monitor.observe(false, now), Some(ReachabilityTransition::WentOffline));
        assert_eq!(monitor.observe(false, now), None);
        assert_eq!(monitor.state(), Reachability::Offline);
    }

    #[test]
    fn reconnect_fires_once_per_transition() {
        let mut monitor = ReachabilityMonitor::new(Duration::from_secs(2));
        let start = Instant::now();

        monitor.observe(false, start);
        assert_eq!(
            monitor.observe(true, start),
            Some(ReachabilityTransition::CameOnline { reconnected: true })
        );
        assert_eq!(monitor.observe(true, start), None);
    }

    #[test]
    fn flapping_within_cooldown_is_quiet() {
        let mut monitor = ReachabilityMonitor::new(Duration::from_secs(2));
        let start = Instant::now();

        monitor.observe(false, start);
        monitor.observe(true, start);

        let flap = start + Duration::from_millis(500);
        monitor.observe(false, flap);
        assert_eq!(
            monitor.observe(true, flap),
            Some(ReachabilityTransition::CameOnline { reconnected: false })
        );

        let later = start + Duration::from_secs(3);
        monitor.observe(false, later);
        assert_eq!(
            monitor.observe(true, later),
            Some(ReachabilityTransition::CameOnline { reconnected: true })
        );
    }
}
