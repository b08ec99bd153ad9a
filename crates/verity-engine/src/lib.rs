//! Convergence verification engine
//!
//! Asserts that a reconciliation controller drove the cluster into an
//! expected state within a bounded time: resources exist, resources are
//! gone, or an application reports the desired health and sync. Scenarios
//! built on these assertions run through the [`runner::ScenarioRunner`].

pub mod absence;
pub mod accessor;
pub mod clean_slate;
pub mod context;
pub mod convergence;
pub mod kube_store;
pub mod manifest;
mod poll;
pub mod resource;
pub mod runner;
pub mod status;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

pub use verity_common::{Error, Result};

pub use accessor::{CreateOutcome, DeleteOutcome, ResourceAccessor, ResourceMutator};
pub use context::{Timeouts, VerifyContext};
pub use resource::{ExpectationSet, PollOutcome, ResourceKind, ResourceRef};
pub use runner::{RunReport, Scenario, ScenarioReport, ScenarioRunner, ScenarioState};
