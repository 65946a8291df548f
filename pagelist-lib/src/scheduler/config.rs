//! Scheduler configuration.

use std::time::Duration;

/// Configuration for request deduplication and the retry scan.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use pagelist_lib::scheduler::SchedulerConfig;
///
/// // Default configuration
/// let config = SchedulerConfig::default();
///
/// // Slow backend: wait longer before re-issuing, scan less often
/// let custom = SchedulerConfig::default()
///     .with_cool_down(Duration::from_secs(10))
///     .with_scan_interval(Duration::from_secs(15));
///
/// // Never revive failed requests
/// let strict = SchedulerConfig::default().with_revive_failed(false);
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How long an attempt may run before the same request can be re-issued.
    /// Also the wait before a failed request is revived.
    pub cool_down: Duration,
    /// Interval between retry scans.
    pub scan_interval: Duration,
    /// Whether the retry scan revives failed requests.
    pub revive_failed: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cool_down: Duration::from_secs(2),
            scan_interval: Duration::from_secs(5),
            revive_failed: true,
        }
    }
}

impl SchedulerConfig {
    /// Sets the cool-down.
    pub fn with_cool_down(mut self, cool_down: Duration) -> Self {
        self.cool_down = cool_down;
        self
    }

    /// Sets the retry scan interval.
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Enables or disables reviving failed requests from the retry scan.
    pub fn with_revive_failed(mut self, enabled: bool) -> Self {
        self.revive_failed = enabled;
        self
    }
}
