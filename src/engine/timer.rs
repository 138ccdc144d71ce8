//! Cancellable timers owned by the state machines.
//!
//! Nothing here sleeps. A timer only records a deadline; the owner asks
//! whether it is due when the engine is advanced, and the driver sleeps until
//! the earliest deadline across all owners.

use std::time::Duration;
use tokio::time::Instant;

/// One-shot timer.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)arms the timer; a previous deadline is dropped.
    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.deadline = Some(now + after);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(d) if d <= now)
    }

    /// Disarms and returns true if the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Fixed-rate ticker. Missed ticks are not caught up: after a tick fires the
/// next one is scheduled one period after the time it was observed.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next: Option<Instant>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn start(&mut self, now: Instant) {
        if self.next.is_none() {
            self.next = Some(now + self.period);
        }
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// Returns true when a tick is due and schedules the next one.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if next <= now => {
                self.next = Some(now + self.period);
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next
    }
}

/// Earliest of two optional deadlines.
pub fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_fires_once() {
        let t0 = Instant::now();
        let mut timer = Timer::new();
        timer.arm(t0, Duration::from_millis(100));
        assert!(!timer.fire(t0 + Duration::from_millis(99)));
        assert!(timer.fire(t0 + Duration::from_millis(100)));
        assert!(!timer.fire(t0 + Duration::from_millis(200)));
        assert_eq!(timer.deadline(), None);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let t0 = Instant::now();
        let mut timer = Timer::new();
        timer.arm(t0, Duration::from_millis(10));
        timer.cancel();
        assert!(!timer.fire(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn ticker_does_not_catch_up() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(Duration::from_millis(16));
        ticker.start(t0);
        assert!(!ticker.poll(t0 + Duration::from_millis(15)));
        // a long stall yields a single tick
        let late = t0 + Duration::from_millis(100);
        assert!(ticker.poll(late));
        assert!(!ticker.poll(late));
        assert_eq!(ticker.deadline(), Some(late + Duration::from_millis(16)));
    }

    #[test]
    fn start_is_idempotent() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(Duration::from_millis(16));
        ticker.start(t0);
        ticker.start(t0 + Duration::from_millis(10));
        assert_eq!(ticker.deadline(), Some(t0 + Duration::from_millis(16)));
    }

    #[test]
    fn earliest_picks_min() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(5);
        assert_eq!(earliest(Some(t1), Some(t0)), Some(t0));
        assert_eq!(earliest(None, Some(t1)), Some(t1));
        assert_eq!(earliest(None, None), None);
    }
}
