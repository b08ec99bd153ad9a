//! Absence Poller
//!
//! Dual of the convergence poller: succeeds on the first confirmed
//! `NotFound`. A transient error is not evidence of absence, so it counts as
//! "still present" exactly like `Found`.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::accessor::{fetch_bounded, fetch_timeout, ResourceAccessor};
use crate::poll::{poll_rounds, Round};
use crate::resource::{PollOutcome, ResourceRef};

/// Outcome of one absence session
#[derive(Debug, Clone, PartialEq)]
pub struct AbsenceResult {
    /// True once a fetch returned `NotFound`
    pub gone: bool,
    /// Time from the first round to the end of the session
    pub elapsed: Duration,
    /// Outcome of the final fetch
    pub last_outcome: PollOutcome,
}

/// Poll until `target` is confirmedly gone; true on success
pub async fn await_gone(
    accessor: &dyn ResourceAccessor,
    target: &ResourceRef,
    interval: Duration,
    deadline: Duration,
) -> bool {
    watch_absence(accessor, target, interval, deadline).await.gone
}

/// Like [`await_gone`], keeping the final observation for diagnostics
pub async fn watch_absence(
    accessor: &dyn ResourceAccessor,
    target: &ResourceRef,
    interval: Duration,
    deadline: Duration,
) -> AbsenceResult {
    let limit = fetch_timeout(interval);
    let description = format!("{target} to be gone");

    let session = poll_rounds(&description, interval, deadline, |round| async move {
        let outcome = fetch_bounded(accessor, target, limit).await;
        match &outcome {
            PollOutcome::NotFound => Round::Done(outcome),
            PollOutcome::Found => {
                debug!(round, resource = %target, "still present");
                Round::Pending(outcome)
            }
            PollOutcome::TransientError(detail) => {
                warn!(round, resource = %target, error = %detail, "fetch failed, treating as present");
                Round::Pending(outcome)
            }
        }
    })
    .await;

    if session.satisfied {
        info!(
            resource = %target,
            elapsed_ms = session.elapsed.as_millis() as u64,
            "resource no longer exists"
        );
    } else {
        warn!(
            resource = %target,
            last = %session.last,
            elapsed_ms = session.elapsed.as_millis() as u64,
            "resource still present at deadline"
        );
    }

    AbsenceResult {
        gone: session.satisfied,
        elapsed: session.elapsed,
        last_outcome: session.last,
    }
}
