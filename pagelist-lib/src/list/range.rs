//! Scroll offset to index range.

use std::ops::RangeInclusive;

/// An inclusive, non-empty range of row indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisibleRange {
    pub start: usize,
    pub end: usize,
}

impl VisibleRange {
    /// Whether `index` is inside the range.
    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }

    /// Number of indices in the range.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always `false`; an empty window is represented by `None`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the indices in order.
    pub fn indices(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Computes the rows to keep live for a scroll position.
///
/// `start = max(0, floor(scroll / row_height) - buffer)` and
/// `end = min(total - 1, ceil((scroll + viewport) / row_height) + buffer)`.
///
/// Returns `None` when there are no rows or `row_height` is not positive.
///
/// # Example
///
/// ```
/// use pagelist_lib::list::compute_visible_range;
///
/// let range = compute_visible_range(8000.0, 960.0, 80.0, 1000, 20).unwrap();
/// assert_eq!((range.start, range.end), (80, 132));
/// ```
pub fn compute_visible_range(
    scroll_offset: f64,
    viewport_size: f64,
    row_height: f64,
    total: usize,
    buffer: usize,
) -> Option<VisibleRange> {
    if total == 0 || !row_height.is_finite() || row_height <= 0.0 {
        return None;
    }
    let scroll = if scroll_offset.is_finite() {
        scroll_offset.max(0.0)
    } else {
        0.0
    };
    let viewport = if viewport_size.is_finite() {
        viewport_size.max(0.0)
    } else {
        0.0
    };

    let last = total - 1;
    let first_visible = (scroll / row_height).floor() as usize;
    let last_visible = ((scroll + viewport) / row_height).ceil() as usize;

    let end = last_visible.saturating_add(buffer).min(last);
    // Scrolled past the content: keep the tail window instead of an inverted range.
    let start = first_visible.saturating_sub(buffer).min(end);
    Some(VisibleRange { start, end })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_scenario_window() {
        let range = compute_visible_range(8000.0, 960.0, 80.0, 1000, 20).unwrap();
        assert_eq!(range, VisibleRange { start: 80, end: 132 });
        assert_eq!(range.len(), 53);
    }

    #[test]
    fn test_clamped_at_top() {
        let range = compute_visible_range(0.0, 960.0, 80.0, 1000, 20).unwrap();
        assert_eq!(range, VisibleRange { start: 0, end: 32 });
    }

    #[test]
    fn test_clamped_at_bottom() {
        let range = compute_visible_range(79_040.0, 960.0, 80.0, 1000, 20).unwrap();
        assert_eq!(range, VisibleRange { start: 968, end: 999 });
    }

    #[test]
    fn test_empty_and_degenerate() {
        assert_eq!(compute_visible_range(0.0, 960.0, 80.0, 0, 20), None);
        assert_eq!(compute_visible_range(0.0, 960.0, 0.0, 10, 20), None);
        assert_eq!(compute_visible_range(0.0, 960.0, f64::NAN, 10, 20), None);

        let range = compute_visible_range(-50.0, 960.0, 80.0, 3, 0).unwrap();
        assert_eq!(range, VisibleRange { start: 0, end: 2 });
    }

    #[test]
    fn test_scrolled_past_content() {
        let range = compute_visible_range(1e7, 960.0, 80.0, 1000, 20).unwrap();
        assert_eq!(range.end, 999);
        assert_eq!(range.start, 999);
    }

    proptest! {
        #[test]
        fn prop_range_within_bounds(
            scroll in 0.0f64..1e7,
            viewport in 0.0f64..5_000.0,
            row_height in 1.0f64..500.0,
            total in 1usize..100_000,
            buffer in 0usize..100,
        ) {
            let range = compute_visible_range(scroll, viewport, row_height, total, buffer).unwrap();
            prop_assert!(range.start <= range.end);
            prop_assert!(range.end <= total - 1);
        }

        #[test]
        fn prop_visible_rows_are_covered(
            row in 0usize..10_000,
            viewport_rows in 1usize..30,
            row_height in 1u32..200,
            buffer in 0usize..40,
        ) {
            let total = 10_000;
            let row_height = row_height as f64;
            let scroll = row as f64 * row_height;
            let viewport = viewport_rows as f64 * row_height;
            let range = compute_visible_range(scroll, viewport, row_height, total, buffer).unwrap();

            // Every row intersecting the viewport is live.
            for index in row..(row + viewport_rows).min(total) {
                prop_assert!(range.contains(index));
            }
            prop_assert!(range.start >= row.saturating_sub(buffer));
        }
    }
}
