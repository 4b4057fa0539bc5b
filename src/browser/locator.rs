//! Frame-tree canvas search.
//!
//! Walks a tree of rendering contexts in pre-order (a frame, then its
//! children in document order, then the next sibling) and returns the first
//! frame whose first canvas element is visible. The walk uses an explicit
//! stack, so deeply nested iframes cannot exhaust the call stack.

use std::fmt::Display;

/// A node in the page's frame tree.
pub trait FrameNode: Sized {
    fn url(&self) -> &str;
    fn child_frames(&self) -> &[Self];
}

/// Queries a frame for canvas elements.
pub trait CanvasProbe<F> {
    type Element;
    type Error: Display;

    /// Returns the frame's first canvas element, if any.
    fn first_canvas(&self, frame: &F) -> Result<Option<Self::Element>, Self::Error>;

    fn is_visible(&self, element: &Self::Element) -> Result<bool, Self::Error>;

    /// Drops an element handle the search decided not to return.
    fn release(&self, _element: &Self::Element) {}
}

/// The frame holding the located canvas, and the canvas itself.
#[derive(Debug)]
pub struct CanvasMatch<'a, F, E> {
    pub frame: &'a F,
    pub element: E,
}

fn probe_frame<F, P>(frame: &F, probe: &P) -> Result<Option<P::Element>, P::Error>
where
    P: CanvasProbe<F>,
{
    let Some(element) = probe.first_canvas(frame)? else {
        return Ok(None);
    };
    match probe.is_visible(&element) {
        Ok(true) => Ok(Some(element)),
        Ok(false) => {
            probe.release(&element);
            Ok(None)
        }
        Err(e) => {
            probe.release(&element);
            Err(e)
        }
    }
}

/// Finds the first visible canvas across `roots` and all their descendants.
///
/// A frame that fails to answer (detached, still loading) counts as having
/// no canvas; the search carries on with its children and siblings.
pub fn find_canvas<'a, F, P>(roots: &'a [F], probe: &P) -> Option<CanvasMatch<'a, F, P::Element>>
where
    F: FrameNode,
    P: CanvasProbe<F>,
{
    let mut pending: Vec<&'a F> = roots.iter().rev().collect();

    while let Some(frame) = pending.pop() {
        match probe_frame(frame, probe) {
            Ok(Some(element)) => return Some(CanvasMatch { frame, element }),
            Ok(None) => {}
            Err(e) => crate::log(&format!("Skipping frame {}: {}", frame.url(), e)),
        }
        pending.extend(frame.child_frames().iter().rev());
    }

    None
}
