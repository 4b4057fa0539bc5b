//! Poll-until-ready waits with a bounded timeout and a cancellation flag.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation flag, set from the Ctrl-C handler.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a poll loop.
#[derive(Debug, PartialEq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

/// Calls `predicate` every `interval` until it yields a value.
///
/// `max_wait = None` waits forever (only cancellation stops it). The
/// predicate is always evaluated at least once, even with a zero budget.
pub fn poll<T, F>(
    mut predicate: F,
    interval: Duration,
    max_wait: Option<Duration>,
    cancel: &CancelFlag,
) -> PollOutcome<T>
where
    F: FnMut() -> Option<T>,
{
    match try_poll(
        || Ok::<_, Infallible>(predicate()),
        interval,
        max_wait,
        cancel,
    ) {
        Ok(outcome) => outcome,
        Err(never) => match never {},
    }
}

/// Like [`poll`], but `check` may fail. `Ok(None)` means "not ready yet";
/// an `Err` stops the loop immediately and is returned as is.
pub fn try_poll<T, E, F>(
    mut check: F,
    interval: Duration,
    max_wait: Option<Duration>,
    cancel: &CancelFlag,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Result<Option<T>, E>,
{
    let start = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }

        if let Some(value) = check()? {
            return Ok(PollOutcome::Ready(value));
        }

        let remaining = match max_wait {
            Some(limit) => match limit.checked_sub(start.elapsed()) {
                Some(rem) if !rem.is_zero() => Some(rem),
                _ => return Ok(PollOutcome::TimedOut),
            },
            None => None,
        };

        let nap = remaining.map_or(interval, |rem| rem.min(interval));
        std::thread::sleep(nap);
    }
}

/// Waits for `duration` without a readiness signal, waking early on cancel.
///
/// Returns false if the wait was cancelled.
pub fn settle(duration: Duration, cancel: &CancelFlag) -> bool {
    let outcome = poll(
        || None::<()>,
        Duration::from_millis(100),
        Some(duration),
        cancel,
    );
    outcome != PollOutcome::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_ready_after_some_attempts() {
        let cancel = CancelFlag::new();
        let mut attempts = 0;
        let outcome = poll(
            || {
                attempts += 1;
                (attempts == 3).then_some(attempts)
            },
            Duration::from_millis(1),
            Some(Duration::from_secs(5)),
            &cancel,
        );
        assert_eq!(outcome, PollOutcome::Ready(3));
    }

    #[test]
    fn test_poll_times_out() {
        let cancel = CancelFlag::new();
        let start = Instant::now();
        let outcome: PollOutcome<()> = poll(
            || None,
            Duration::from_millis(5),
            Some(Duration::from_millis(30)),
            &cancel,
        );
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_poll_zero_budget_still_checks_once() {
        let cancel = CancelFlag::new();
        let outcome = poll(
            || Some("now"),
            Duration::from_millis(5),
            Some(Duration::ZERO),
            &cancel,
        );
        assert_eq!(outcome, PollOutcome::Ready("now"));
    }

    #[test]
    fn test_poll_cancelled() {
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let mut attempts = 0;
        let outcome: PollOutcome<()> = poll(
            || {
                attempts += 1;
                if attempts == 2 {
                    trigger.cancel();
                }
                None
            },
            Duration::from_millis(1),
            None,
            &cancel,
        );
        assert_eq!(outcome, PollOutcome::Cancelled);
    }

    #[test]
    fn test_try_poll_stops_on_error_without_timeout() {
        let cancel = CancelFlag::new();
        let mut attempts = 0;
        let result: Result<PollOutcome<()>, &str> = try_poll(
            || {
                attempts += 1;
                if attempts < 3 { Ok(None) } else { Err("closed") }
            },
            Duration::from_millis(1),
            None,
            &cancel,
        );
        assert_eq!(result, Err("closed"));
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_settle_returns_false_when_cancelled() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(!settle(Duration::from_secs(10), &cancel));
        assert!(settle(Duration::from_millis(1), &CancelFlag::new()));
    }
}
