//! The rendering surface, seen from the orchestrator.

use orion_core::MessageId;

/// Why a viewport call had no effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewportError {
    /// The view is not on screen.
    #[error("viewport is not mounted")]
    NotMounted,
}

/// Narrow port onto the scrollable message list. Every failure is treated as
/// "view not ready" and ignored by the caller.
pub trait ViewportPort: Send + Sync {
    /// Whether the view is on screen.
    fn is_mounted(&self) -> bool;

    /// Current distance from the top, in pixels.
    fn current_scroll_offset(&self) -> Result<u32, ViewportError>;

    /// Jump to the newest message.
    fn scroll_to_bottom(&self) -> Result<(), ViewportError>;

    /// Bring the message with `id` into view.
    fn scroll_to_anchor(&self, id: &MessageId) -> Result<(), ViewportError>;
}

/// A viewport that is never mounted. For headless sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopViewport;

impl ViewportPort for NoopViewport {
    fn is_mounted(&self) -> bool {
        false
    }

    fn current_scroll_offset(&self) -> Result<u32, ViewportError> {
        Err(ViewportError::NotMounted)
    }

    fn scroll_to_bottom(&self) -> Result<(), ViewportError> {
        Err(ViewportError::NotMounted)
    }

    fn scroll_to_anchor(&self, _id: &MessageId) -> Result<(), ViewportError> {
        Err(ViewportError::NotMounted)
    }
}

/// Scroll metrics reported by the view on every scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollGeometry {
    /// Distance from the top.
    pub top: u32,
    /// Total scrollable height.
    pub height: u32,
    /// Visible height.
    pub client_height: u32,
}

impl ScrollGeometry {
    /// The user has scrolled away from the bottom by more than a tenth of a
    /// screen, so new batches must not yank the view down.
    pub fn fixed_scroll(&self) -> bool {
        f64::from(self.top) < f64::from(self.height) - f64::from(self.client_height) * 1.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_scroll_threshold() {
        let at_bottom = ScrollGeometry {
            top: 900,
            height: 1000,
            client_height: 100,
        };
        assert!(!at_bottom.fixed_scroll());

        let near_bottom = ScrollGeometry {
            top: 895,
            ..at_bottom
        };
        assert!(!near_bottom.fixed_scroll());

        let scrolled_up = ScrollGeometry {
            top: 400,
            ..at_bottom
        };
        assert!(scrolled_up.fixed_scroll());
    }

    #[test]
    fn noop_viewport_is_never_mounted() {
        let v = NoopViewport;
        assert!(!v.is_mounted());
        assert_eq!(v.scroll_to_bottom(), Err(ViewportError::NotMounted));
        assert_eq!(v.current_scroll_offset(), Err(ViewportError::NotMounted));
    }
}
