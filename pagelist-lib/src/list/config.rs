//! List configuration.

use std::time::Duration;

/// Configuration for a [`VirtualList`](super::VirtualList).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use pagelist_lib::list::ListConfig;
///
/// let config = ListConfig::default()
///     .with_row_height(60.0)
///     .with_buffer(10)
///     .with_stale_after(Duration::from_secs(5));
/// assert_eq!(config.row_height, 60.0);
/// ```
#[derive(Debug, Clone)]
pub struct ListConfig {
    /// Fixed height of every row, in pixels.
    ///
    /// Default: 80
    pub row_height: f64,
    /// Rows kept live above and below the viewport.
    ///
    /// Default: 20
    pub buffer: usize,
    /// Age after which a row still showing its placeholder is re-rendered.
    ///
    /// Default: 2 seconds
    pub stale_after: Duration,
    /// Whether rows that leave the window are dropped.
    ///
    /// Default: true
    pub evict_outside_range: bool,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            row_height: 80.0,
            buffer: 20,
            stale_after: Duration::from_secs(2),
            evict_outside_range: true,
        }
    }
}

impl ListConfig {
    pub fn with_row_height(mut self, height: f64) -> Self {
        self.row_height = height;
        self
    }

    pub fn with_buffer(mut self, rows: usize) -> Self {
        self.buffer = rows;
        self
    }

    pub fn with_stale_after(mut self, delay: Duration) -> Self {
        self.stale_after = delay;
        self
    }

    pub fn with_evict_outside_range(mut self, enabled: bool) -> Self {
        self.evict_outside_range = enabled;
        self
    }
}
