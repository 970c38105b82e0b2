//! Coalescing of change signals into refresh deadlines.
//!
//! Editors and deployment tools touch a file several times in quick
//! succession. [`Debouncer`] turns such a burst into one refresh: each signal
//! pushes the deadline out by the window, but never past `max_delay` after the
//! first signal of the burst, so a steady stream still gets refreshed.

use std::future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// A resettable refresh deadline.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use fsd_discovery::Debouncer;
///
/// let mut debouncer = Debouncer::new(Duration::from_millis(50), Duration::from_secs(1));
/// let now = Instant::now();
///
/// debouncer.record(now);
/// assert_eq!(debouncer.deadline(), Some(now + Duration::from_millis(50)));
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    max_delay: Duration,
    first_signal: Option<Instant>,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Creates an idle debouncer. `max_delay` is raised to `window` if smaller.
    #[must_use]
    pub fn new(window: Duration, max_delay: Duration) -> Self {
        Self {
            window,
            max_delay: max_delay.max(window),
            first_signal: None,
            deadline: None,
        }
    }

    /// Records a change signal received at `now`.
    pub fn record(&mut self, now: Instant) {
        let first = *self.first_signal.get_or_insert(now);
        let deadline = (now + self.window).min(first + self.max_delay);
        self.deadline = Some(deadline);
    }

    /// Returns when the pending refresh is due.
    #[inline]
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Forgets the pending refresh, if any.
    pub fn clear(&mut self) {
        self.first_signal = None;
        self.deadline = None;
    }

    /// Completes at the deadline. Never completes while idle.
    ///
    /// Cancel-safe: the deadline is only read, so dropping the future in a
    /// `select!` loses nothing.
    pub async fn wait(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_by_default() {
        let debouncer = Debouncer::new(Duration::from_millis(50), Duration::from_secs(1));
        assert!(debouncer.deadline().is_none());
    }

    #[test]
    fn test_signals_push_deadline_out() {
        let window = Duration::from_millis(50);
        let mut debouncer = Debouncer::new(window, Duration::from_secs(1));
        let start = Instant::now();

        debouncer.record(start);
        debouncer.record(start + Duration::from_millis(30));
        assert_eq!(debouncer.deadline(), Some(start + Duration::from_millis(80)));
    }

    #[test]
    fn test_deadline_capped_by_max_delay() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50), Duration::from_millis(100));
        let start = Instant::now();

        for ms in (0..=200).step_by(20) {
            debouncer.record(start + Duration::from_millis(ms));
        }
        assert_eq!(debouncer.deadline(), Some(start + Duration::from_millis(100)));
    }

    #[test]
    fn test_clear_starts_new_burst() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50), Duration::from_millis(100));
        let start = Instant::now();
        debouncer.record(start);
        debouncer.clear();
        assert!(debouncer.deadline().is_none());

        let later = start + Duration::from_secs(5);
        debouncer.record(later);
        assert_eq!(debouncer.deadline(), Some(later + Duration::from_millis(50)));
    }

    #[test]
    fn test_max_delay_never_below_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50), Duration::ZERO);
        let start = Instant::now();
        debouncer.record(start);
        assert_eq!(debouncer.deadline(), Some(start + Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_completes_at_deadline() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50), Duration::from_secs(1));
        let start = Instant::now();
        debouncer.record(start);

        debouncer.wait().await;
        assert!(Instant::now() >= start + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_pending_while_idle() {
        let debouncer = Debouncer::new(Duration::from_millis(50), Duration::from_secs(1));
        let result = tokio::time::timeout(Duration::from_secs(10), debouncer.wait()).await;
        assert!(result.is_err());
    }
}
