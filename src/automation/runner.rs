//! Play sequence runner.
//!
//! Launches the browser, opens the launcher page, finds the game canvas,
//! takes a screenshot, clicks through the splash and Play buttons and takes
//! a second screenshot. The browser is closed when the runner returns.

use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::{BrowserProcess, CdpError, FrameNode, FrameTreeNode, GamePage, find_canvas};
use crate::config::{AppConfig, PlayConfig};
use crate::error::PipelineError;
use crate::poll::{CancelFlag, PollOutcome, settle, try_poll};

/// Artifacts of a completed play sequence.
#[derive(Debug, Clone)]
pub struct PlayOutcome {
    /// URL of the frame hosting the game canvas
    pub frame_url: String,
    pub before_screenshot: PathBuf,
    pub after_screenshot: PathBuf,
}

fn max_wait(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn cancelled() -> anyhow::Error {
    anyhow!("Cancelled")
}

/// Treats page-level failures as "not ready yet" and passes transport
/// failures through, so a dead browser ends the wait.
fn transient<T>(result: Result<Option<T>, CdpError>, what: &str) -> Result<Option<T>, CdpError> {
    match result {
        Err(e) if !e.is_fatal() => {
            crate::log(&format!("{} unavailable: {}", what, e));
            Ok(None)
        }
        other => other,
    }
}

/// Polls `document.readyState` until the page reports `complete`.
fn wait_for_load<F, P>(
    page: &P,
    interval: Duration,
    timeout_ms: u64,
    cancel: &CancelFlag,
) -> Result<()>
where
    F: FrameNode,
    P: GamePage<F>,
{
    let outcome = try_poll(
        || {
            let state = page.ready_state().map(|s| (s == "complete").then_some(()));
            transient(state, "Ready state")
        },
        interval,
        max_wait(timeout_ms),
        cancel,
    )
    .context("Browser connection lost while loading page")?;

    match outcome {
        PollOutcome::Ready(()) => Ok(()),
        PollOutcome::TimedOut => Err(anyhow!("Page load timed out after {}ms", timeout_ms)),
        PollOutcome::Cancelled => Err(cancelled()),
    }
}

/// Polls the frame tree until some frame holds a visible canvas.
fn wait_for_canvas<F, P>(
    page: &P,
    interval: Duration,
    timeout_ms: u64,
    cancel: &CancelFlag,
) -> Result<(String, P::Element)>
where
    F: FrameNode,
    P: GamePage<F>,
{
    let outcome = try_poll(
        || {
            let Some(roots) = transient(page.frame_tree().map(Some), "Frame tree")? else {
                return Ok::<_, CdpError>(None);
            };
            Ok(find_canvas(&roots, page).map(|m| (m.frame.url().to_string(), m.element)))
        },
        interval,
        Some(Duration::from_millis(timeout_ms)),
        cancel,
    )
    .context("Browser connection lost while waiting for the game canvas")?;

    match outcome {
        PollOutcome::Ready(found) => Ok(found),
        PollOutcome::TimedOut => Err(PipelineError::CanvasNotFound.into()),
        PollOutcome::Cancelled => Err(cancelled()),
    }
}

fn screenshot_canvas<F, P>(page: &P, canvas: &P::Element, path: &Path) -> Result<()>
where
    F: FrameNode,
    P: GamePage<F>,
{
    let bbox = page
        .bounding_box(canvas)?
        .ok_or(PipelineError::BoundingBoxUnavailable)?;
    page.screenshot_clip(&bbox, path)
        .with_context(|| format!("Failed to save screenshot {}", path.display()))?;
    crate::log(&format!("Screenshot saved as {}", path.display()));
    Ok(())
}

/// Drives an already attached page through the start sequence.
pub fn play_sequence<F, P>(
    page: &P,
    play: &PlayConfig,
    out_dir: &Path,
    cancel: &CancelFlag,
) -> Result<PlayOutcome>
where
    F: FrameNode,
    P: GamePage<F>,
{
    let interval = Duration::from_millis(play.poll_interval_ms.max(10));

    crate::log("Navigating to URL...");
    page.navigate(&play.url, max_wait(play.load_timeout_ms))?;
    wait_for_load::<F, P>(page, interval, play.load_timeout_ms, cancel)?;

    crate::log(&format!(
        "Waiting for game canvas (up to {} seconds)...",
        play.canvas_wait_ms / 1000
    ));
    let (frame_url, canvas) =
        wait_for_canvas::<F, P>(page, interval, play.canvas_wait_ms, cancel)?;
    crate::log(&format!("Canvas found in frame: {}", frame_url));

    crate::log(&format!(
        "Waiting for {} ms for the game to finish loading...",
        play.canvas_settle_ms
    ));
    if !settle(Duration::from_millis(play.canvas_settle_ms), cancel) {
        return Err(cancelled());
    }

    let before_screenshot = out_dir.join(&play.before_screenshot);
    screenshot_canvas::<F, P>(page, &canvas, &before_screenshot)?;

    let first = play.first_click;
    page.click(first.x, first.y)?;
    crate::log(&format!("Clicked canvas at ({}, {})", first.x, first.y));

    crate::log(&format!(
        "Waiting for {} ms...",
        play.first_click_settle_ms
    ));
    if !settle(Duration::from_millis(play.first_click_settle_ms), cancel) {
        return Err(cancelled());
    }

    // The canvas may be re-laid out by the splash click; give its box the same budget.
    let bbox = match try_poll(
        || transient(page.bounding_box(&canvas), "Canvas box"),
        interval,
        Some(Duration::from_millis(play.first_click_settle_ms)),
        cancel,
    )? {
        PollOutcome::Ready(bbox) => bbox,
        PollOutcome::TimedOut => return Err(PipelineError::BoundingBoxUnavailable.into()),
        PollOutcome::Cancelled => return Err(cancelled()),
    };

    let (play_x, play_y) = bbox.bottom_center(play.play_button_offset_px);
    page.click(play_x, play_y)?;
    crate::log(&format!(
        "Clicked Play button at ({:.1}, {:.1})",
        play_x, play_y
    ));

    crate::log(&format!(
        "Waiting for {} ms for game to start/render...",
        play.play_settle_ms
    ));
    if !settle(Duration::from_millis(play.play_settle_ms), cancel) {
        return Err(cancelled());
    }

    let after_screenshot = out_dir.join(&play.after_screenshot);
    screenshot_canvas::<F, P>(page, &canvas, &after_screenshot)?;

    Ok(PlayOutcome {
        frame_url,
        before_screenshot,
        after_screenshot,
    })
}

/// Launches the browser, runs the start sequence and closes the browser.
pub fn run_play(config: &AppConfig, out_dir: &Path, cancel: &CancelFlag) -> Result<PlayOutcome> {
    let browser = BrowserProcess::launch(&config.browser, cancel)?;
    let session = browser.open_page()?;

    let outcome = play_sequence::<FrameTreeNode, _>(&session, &config.play, out_dir, cancel);

    drop(session);
    drop(browser);
    outcome
}
