//! CDP protocol types and message definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CDP request message.
#[derive(Debug, Serialize)]
pub struct CdpRequest<'a> {
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// CDP response or event message.
#[derive(Debug, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorResponse>,
}

/// CDP error in response.
#[derive(Debug, Deserialize)]
pub struct CdpErrorResponse {
    pub code: i64,
    pub message: String,
}

/// Page info from the /json/list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Browser version info.
///
/// Note: Chrome returns PascalCase field names for this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
}

/// One frame as reported by `Page.getFrameTree`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    pub id: String,
    #[serde(default)]
    pub url: String,
}

/// A frame and its child frames, in document order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameTreeNode {
    pub frame: FrameInfo,
    #[serde(default)]
    pub child_frames: Vec<FrameTreeNode>,
}

/// Axis-aligned box in CSS pixels, main-frame viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Reduces a CDP quad (x1, y1, ... x4, y4) to its enclosing box.
    pub fn from_quad(quad: &[f64]) -> Option<Self> {
        if quad.len() != 8 {
            return None;
        }
        let xs = quad.iter().step_by(2);
        let ys = quad.iter().skip(1).step_by(2);
        let min_x = xs.clone().copied().fold(f64::INFINITY, f64::min);
        let max_x = xs.copied().fold(f64::NEG_INFINITY, f64::max);
        let min_y = ys.clone().copied().fold(f64::INFINITY, f64::min);
        let max_y = ys.copied().fold(f64::NEG_INFINITY, f64::max);

        let width = max_x - min_x;
        let height = max_y - min_y;
        if !(width > 0.0 && height > 0.0) {
            return None;
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width,
            height,
        })
    }

    /// Point `offset` pixels above the middle of the bottom edge.
    pub fn bottom_center(&self, offset: f64) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height - offset)
    }
}

/// Box model from `DOM.getBoxModel`.
#[derive(Debug, Clone, Deserialize)]
pub struct BoxModel {
    pub border: Vec<f64>,
}
