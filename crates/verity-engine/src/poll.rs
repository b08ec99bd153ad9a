//! Deadline-bounded polling core shared by every poller
//!
//! A poll session is a sequence of synchronous check-then-sleep rounds. A
//! round that reports done ends the session immediately, even if the
//! deadline passed while the round was running. Otherwise the session ends
//! once a round finishes at or after the deadline. The last sleep is clamped
//! to the remaining time so the final round lands on the deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// What a single round observed
#[derive(Debug)]
pub(crate) enum Round<T> {
    /// Target condition holds
    Done(T),
    /// Not yet; keep the observation for diagnostics
    Pending(T),
}

/// Summary of a finished poll session
#[derive(Debug)]
pub(crate) struct Session<T> {
    /// Whether a round reported `Done`
    pub satisfied: bool,
    /// Wall time from the first round to the end of the session
    pub elapsed: Duration,
    /// Number of rounds executed
    pub rounds: u32,
    /// Observation from the final round
    pub last: T,
}

/// Run rounds until one is `Done` or the deadline elapses.
///
/// `round` receives the 1-based round number.
pub(crate) async fn poll_rounds<T, F, Fut>(
    description: &str,
    interval: Duration,
    deadline: Duration,
    mut round: F,
) -> Session<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Round<T>>,
{
    let start = Instant::now();
    let mut rounds = 0u32;

    loop {
        rounds += 1;
        let observed = round(rounds).await;
        let elapsed = start.elapsed();

        match observed {
            Round::Done(last) => {
                return Session {
                    satisfied: true,
                    elapsed,
                    rounds,
                    last,
                }
            }
            Round::Pending(last) => {
                if elapsed >= deadline {
                    return Session {
                        satisfied: false,
                        elapsed,
                        rounds,
                        last,
                    };
                }
                trace!(
                    description = %description,
                    round = rounds,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "condition not yet met"
                );
                tokio::time::sleep(interval.min(deadline - elapsed)).await;
            }
        }
    }
}
