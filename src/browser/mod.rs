//! Browser control over the Chrome DevTools Protocol.
//!
//! This module provides:
//! - Browser process launch and page attachment (`BrowserProcess`)
//! - The page operations the play sequence drives (`GamePage`)
//! - A blocking CDP page session implementing them (`PageSession`)
//! - Engine-independent canvas search across nested frames (`find_canvas`)

pub mod error;
pub mod launcher;
pub mod locator;
pub mod page;
pub mod protocol;
pub mod session;

pub use error::CdpError;
pub use launcher::BrowserProcess;
pub use locator::{FrameNode, find_canvas};
pub use page::GamePage;
pub use protocol::FrameTreeNode;
