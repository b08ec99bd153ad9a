//! Convergence Poller
//!
//! Waits until every resource in an [`ExpectationSet`] can be fetched. Partial
//! convergence is normal while a reconciler is still working, so a missing or
//! erroring resource never aborts the wait early; each round's per-resource
//! outcome is logged instead.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::accessor::{fetch_bounded, fetch_timeout, ResourceAccessor};
use crate::poll::{poll_rounds, Round};
use crate::resource::{ExpectationSet, PollOutcome, ResourceRef};
use crate::{Error, Result};

/// Outcome of one convergence session
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceResult {
    /// True when one full round was all `Found`
    pub satisfied: bool,
    /// Time from the first round to the end of the session
    pub elapsed: Duration,
    /// Outcome of every resource in the final round
    pub last_outcomes: BTreeMap<ResourceRef, PollOutcome>,
}

impl ConvergenceResult {
    /// Resources that were not `Found` in the final round
    pub fn missing(&self) -> Vec<(&ResourceRef, &PollOutcome)> {
        self.last_outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_found())
            .collect()
    }

    /// Render the final round as `ref: outcome` pairs, missing ones first
    pub fn diagnostics(&self) -> String {
        let mut lines: Vec<String> = self
            .missing()
            .into_iter()
            .map(|(r, o)| format!("{r}: {o}"))
            .collect();
        let found = self.last_outcomes.len() - lines.len();
        lines.push(format!("{found}/{} found", self.last_outcomes.len()));
        lines.join("; ")
    }

    /// Turn an unsatisfied session into [`Error::DeadlineExceeded`]
    pub fn into_result(self, description: &str) -> Result<Self> {
        if self.satisfied {
            Ok(self)
        } else {
            Err(Error::deadline_exceeded(
                description,
                self.elapsed,
                self.diagnostics(),
            ))
        }
    }
}

/// Poll until every expected resource is `Found` or `deadline` elapses.
///
/// `NotFound` and `TransientError` both mean "not yet". All fetches of a
/// round run concurrently and each is bounded by [`fetch_timeout`].
pub async fn await_all(
    accessor: &dyn ResourceAccessor,
    expectations: &ExpectationSet,
    interval: Duration,
    deadline: Duration,
) -> ConvergenceResult {
    let refs = expectations.refs();
    let limit = fetch_timeout(interval);
    let description = format!(
        "{} resource(s) in namespace {}",
        refs.len(),
        expectations.namespace()
    );

    let session = poll_rounds(&description, interval, deadline, |round| {
        let refs = &refs;
        async move {
            let outcomes = join_all(refs.iter().map(|r| fetch_bounded(accessor, r, limit))).await;

            let mut found = 0usize;
            let mut last = BTreeMap::new();
            for (r, outcome) in refs.iter().zip(outcomes) {
                match &outcome {
                    PollOutcome::Found => {
                        found += 1;
                        debug!(round, resource = %r, "found");
                    }
                    PollOutcome::NotFound => {
                        debug!(round, resource = %r, "not found yet");
                    }
                    PollOutcome::TransientError(detail) => {
                        warn!(round, resource = %r, error = %detail, "fetch failed, will retry");
                    }
                }
                last.insert(r.clone(), outcome);
            }

            if found == refs.len() {
                Round::Done(last)
            } else {
                debug!(round, found, expected = refs.len(), "partial convergence");
                Round::Pending(last)
            }
        }
    })
    .await;

    let result = ConvergenceResult {
        satisfied: session.satisfied,
        elapsed: session.elapsed,
        last_outcomes: session.last,
    };

    if result.satisfied {
        info!(
            namespace = %expectations.namespace(),
            resources = refs.len(),
            rounds = session.rounds,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "all expected resources found"
        );
    } else {
        warn!(
            namespace = %expectations.namespace(),
            rounds = session.rounds,
            elapsed_ms = result.elapsed.as_millis() as u64,
            missing = %result.diagnostics(),
            "expected resources did not converge before deadline"
        );
    }

    result
}
