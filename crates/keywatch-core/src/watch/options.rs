//! Watch session options.

use std::time::Duration;

/// Default long-poll wait handed to every blocking query: 5 minutes.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(300);

/// Options applied to every watch session a provider opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Upper bound a single blocking query may park on the store.
    pub wait_time: Duration,
    /// Deliver a final background error before closing the stream when the
    /// loop fails after its first response. Off by default: such failures
    /// are only logged and the stream simply ends.
    pub report_background_errors: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            wait_time: DEFAULT_WAIT_TIME,
            report_background_errors: false,
        }
    }
}

impl WatchOptions {
    /// Sets the long-poll wait.
    #[must_use]
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    /// Enables or disables the terminal background error message.
    #[must_use]
    pub fn with_background_errors(mut self, report: bool) -> Self {
        self.report_background_errors = report;
        self
    }

    /// Returns the effective wait, using the default if zero.
    pub fn effective_wait_time(&self) -> Duration {
        if self.wait_time.is_zero() {
            DEFAULT_WAIT_TIME
        } else {
            self.wait_time
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = WatchOptions::default();
        assert_eq!(options.wait_time, Duration::from_secs(300));
        assert!(!options.report_background_errors);
    }

    #[test]
    fn test_effective_wait_time_uses_default_when_zero() {
        let options = WatchOptions::default().with_wait_time(Duration::ZERO);
        assert_eq!(options.effective_wait_time(), DEFAULT_WAIT_TIME);
    }
}
