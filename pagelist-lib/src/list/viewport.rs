//! The scroll container a list renders into.

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

/// A scrollable container with a fixed visible height.
///
/// Implemented by the host UI. All sizes are in pixels. The host forwards
/// scroll events to [`VirtualList::on_scroll`](super::VirtualList::on_scroll)
/// while listening is enabled, and calls
/// [`VirtualList::on_frame`](super::VirtualList::on_frame) after a requested
/// frame.
pub trait Viewport: Send + Sync {
    /// Whether the container currently exists.
    fn is_attached(&self) -> bool;

    /// Current vertical scroll offset.
    fn scroll_offset(&self) -> f64;

    /// Moves the viewport. Hosts clamp to the scrollable extent.
    fn set_scroll_offset(&self, offset: f64);

    /// Height of the visible area.
    fn viewport_size(&self) -> f64;

    /// Height of the scrollable content.
    fn content_size(&self) -> f64;

    /// Resizes the scrollable content.
    fn set_content_size(&self, size: f64);

    /// Enables or disables delivery of scroll events.
    fn listen_scroll(&self, enabled: bool);

    /// Asks for one `on_frame` call before the next repaint.
    fn request_frame(&self);
}

#[derive(Debug, Clone, Default)]
struct HeadlessState {
    attached: bool,
    scroll_offset: f64,
    viewport_size: f64,
    content_size: f64,
    listening: bool,
    frames_requested: usize,
}

/// In-memory viewport for tests and terminal front ends.
///
/// Behaves like a browser scroll container: offsets are clamped to
/// `[0, content - viewport]`.
#[derive(Debug, Default)]
pub struct HeadlessViewport {
    state: Mutex<HeadlessState>,
}

impl HeadlessViewport {
    /// Creates an attached viewport showing `viewport_size` pixels.
    pub fn new(viewport_size: f64) -> Self {
        Self {
            state: Mutex::new(HeadlessState {
                attached: true,
                viewport_size,
                ..Default::default()
            }),
        }
    }

    /// Creates a viewport whose container does not exist.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Removes the container.
    pub fn detach(&self) {
        self.state().attached = false;
    }

    /// Whether scroll events are being delivered.
    pub fn is_listening(&self) -> bool {
        self.state().listening
    }

    /// Number of frames requested so far.
    pub fn frames_requested(&self) -> usize {
        self.state().frames_requested
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Viewport for HeadlessViewport {
    fn is_attached(&self) -> bool {
        self.state().attached
    }

    fn scroll_offset(&self) -> f64 {
        self.state().scroll_offset
    }

    fn set_scroll_offset(&self, offset: f64) {
        let mut state = self.state();
        let max = (state.content_size - state.viewport_size).max(0.0);
        state.scroll_offset = offset.clamp(0.0, max);
    }

    fn viewport_size(&self) -> f64 {
        self.state().viewport_size
    }

    fn content_size(&self) -> f64 {
        self.state().content_size
    }

    fn set_content_size(&self, size: f64) {
        let mut state = self.state();
        state.content_size = size.max(0.0);
        let max = (state.content_size - state.viewport_size).max(0.0);
        state.scroll_offset = state.scroll_offset.min(max);
    }

    fn listen_scroll(&self, enabled: bool) {
        self.state().listening = enabled;
    }

    fn request_frame(&self) {
        self.state().frames_requested += 1;
    }
}
