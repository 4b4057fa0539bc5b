//! Page operations used by the play sequence.

use std::path::Path;
use std::time::Duration;

use super::error::CdpError;
use super::locator::{CanvasProbe, FrameNode};
use super::protocol::BoundingBox;

/// A controllable page: navigation, the frame tree, element geometry,
/// mouse input and clipped screenshots.
///
/// Coordinates are CSS pixels relative to the main frame's viewport.
pub trait GamePage<F: FrameNode>: CanvasProbe<F, Error = CdpError> {
    /// Starts navigation to `url`. `timeout = None` waits for the browser
    /// to accept the navigation however long it takes.
    fn navigate(&self, url: &str, timeout: Option<Duration>) -> Result<(), CdpError>;

    /// `document.readyState` of the main frame.
    fn ready_state(&self) -> Result<String, CdpError>;

    fn frame_tree(&self) -> Result<Vec<F>, CdpError>;

    /// The element's layout box, or None if it currently has none.
    fn bounding_box(&self, element: &Self::Element) -> Result<Option<BoundingBox>, CdpError>;

    fn click(&self, x: f64, y: f64) -> Result<(), CdpError>;

    /// Writes a PNG of the given viewport rectangle to `path`.
    fn screenshot_clip(&self, bbox: &BoundingBox, path: &Path) -> Result<(), CdpError>;
}
