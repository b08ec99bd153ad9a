//! Status Predicate Checker and object predicate polling
//!
//! An application-like resource exposes two independent status axes, health
//! and sync. The checker only succeeds when both predicates hold in the same
//! observed round; a resource that is healthy in one round and synced in the
//! next never satisfies it.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::accessor::{fetch_timeout, read_bounded, ResourceAccessor};
use crate::poll::{poll_rounds, Round};
use crate::resource::{ResourceKind, ResourceRef};
use crate::Result;

/// Health value Argo CD reports for a fully healthy application
pub const HEALTH_HEALTHY: &str = "Healthy";
/// Sync value Argo CD reports when live state matches git
pub const SYNC_SYNCED: &str = "Synced";

/// Predicate over one status axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPredicate {
    /// Value must equal this string
    Equals(String),
    /// Value must be one of these strings
    OneOf(Vec<String>),
    /// Any present value passes
    Any,
}

impl StatusPredicate {
    /// Shorthand for [`StatusPredicate::Equals`]
    pub fn equals(value: impl Into<String>) -> Self {
        StatusPredicate::Equals(value.into())
    }

    /// Evaluate against an observed value; an absent field never passes
    pub fn matches(&self, observed: Option<&str>) -> bool {
        let Some(observed) = observed else {
            return false;
        };
        match self {
            StatusPredicate::Equals(want) => observed == want,
            StatusPredicate::OneOf(options) => options.iter().any(|o| o == observed),
            StatusPredicate::Any => true,
        }
    }
}

/// The application whose status is checked, and what "done" means
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTarget {
    /// Application name
    pub resource_name: String,
    /// Application namespace
    pub namespace: String,
    /// Predicate on the health axis
    pub desired_health: StatusPredicate,
    /// Predicate on the sync axis
    pub desired_sync: StatusPredicate,
}

impl StatusTarget {
    /// Target `Healthy` + `Synced`
    pub fn healthy_and_synced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            resource_name: name.into(),
            namespace: namespace.into(),
            desired_health: StatusPredicate::equals(HEALTH_HEALTHY),
            desired_sync: StatusPredicate::equals(SYNC_SYNCED),
        }
    }
}

/// One observation of an application's two status axes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationStatus {
    /// Health classification, if reported
    pub health: Option<String>,
    /// Sync classification, if reported
    pub sync: Option<String>,
}

/// External source of application health/sync
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApplicationStatusProvider: Send + Sync {
    /// Observe the current status of `name` in `namespace`
    async fn observe(&self, name: &str, namespace: &str) -> Result<ApplicationStatus>;
}

/// Read the Application object and extract its status; a missing object has
/// neither axis set
pub async fn observe_application(
    accessor: &dyn ResourceAccessor,
    name: &str,
    namespace: &str,
) -> Result<ApplicationStatus> {
    let target = ResourceRef::new(ResourceKind::Application, name, namespace);
    let object = accessor.read(&target).await?;
    Ok(object.as_ref().map(application_status).unwrap_or_default())
}

/// Extract the two status axes from an Application object
pub fn application_status(object: &Value) -> ApplicationStatus {
    let field = |pointer: &str| {
        object
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    ApplicationStatus {
        health: field("/status/health/status"),
        sync: field("/status/sync/status"),
    }
}

/// Outcome of one status session
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResult {
    /// True when both predicates held in the same round
    pub satisfied: bool,
    /// Time from the first round to the end of the session
    pub elapsed: Duration,
    /// Last successful observation (`None` if every lookup failed)
    pub last_observed: Option<ApplicationStatus>,
}

/// Poll until both predicates of `target` hold in the same round
pub async fn await_status(
    provider: &dyn ApplicationStatusProvider,
    target: &StatusTarget,
    interval: Duration,
    deadline: Duration,
) -> bool {
    check_status(provider, target, interval, deadline)
        .await
        .satisfied
}

/// Like [`await_status`], keeping the last observation for diagnostics
pub async fn check_status(
    provider: &dyn ApplicationStatusProvider,
    target: &StatusTarget,
    interval: Duration,
    deadline: Duration,
) -> StatusResult {
    let limit = fetch_timeout(interval);
    let description = format!(
        "application {}/{} health+sync",
        target.namespace, target.resource_name
    );

    let session = poll_rounds(&description, interval, deadline, |round| async move {
        let observed = tokio::time::timeout(
            limit,
            provider.observe(&target.resource_name, &target.namespace),
        )
        .await;

        let status = match observed {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                debug!(round, application = %target.resource_name, error = %e, "status lookup failed");
                return Round::Pending(None);
            }
            Err(_) => {
                debug!(round, application = %target.resource_name, "status lookup timed out");
                return Round::Pending(None);
            }
        };

        // Both axes are judged on this one observation
        let health_ok = target.desired_health.matches(status.health.as_deref());
        let sync_ok = target.desired_sync.matches(status.sync.as_deref());
        debug!(
            round,
            application = %target.resource_name,
            health = ?status.health,
            sync = ?status.sync,
            health_ok,
            sync_ok,
            "observed application status"
        );

        if health_ok && sync_ok {
            Round::Done(Some(status))
        } else {
            Round::Pending(Some(status))
        }
    })
    .await;

    if session.satisfied {
        info!(
            application = %target.resource_name,
            namespace = %target.namespace,
            elapsed_ms = session.elapsed.as_millis() as u64,
            "application reached desired health and sync"
        );
    } else {
        warn!(
            application = %target.resource_name,
            namespace = %target.namespace,
            last = ?session.last,
            "application did not reach desired health and sync before deadline"
        );
    }

    StatusResult {
        satisfied: session.satisfied,
        elapsed: session.elapsed,
        last_observed: session.last,
    }
}

/// Outcome of waiting for an object predicate
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectWait {
    /// True when the predicate held
    pub satisfied: bool,
    /// Time from the first round to the end of the session
    pub elapsed: Duration,
    /// Object from the final round, if it could be read
    pub last_object: Option<Value>,
}

/// Poll until the object at `target` satisfies `predicate`.
///
/// A missing object or failed read counts as "not yet".
pub async fn await_object<P>(
    accessor: &dyn ResourceAccessor,
    target: &ResourceRef,
    predicate: P,
    interval: Duration,
    deadline: Duration,
) -> ObjectWait
where
    P: Fn(&Value) -> bool,
{
    let limit = fetch_timeout(interval);
    let description = format!("{target} to satisfy predicate");
    let predicate = &predicate;

    let session = poll_rounds(&description, interval, deadline, |round| async move {
        match read_bounded(accessor, target, limit).await {
            Ok(Some(object)) if predicate(&object) => Round::Done(Some(object)),
            Ok(object) => {
                debug!(round, resource = %target, exists = object.is_some(), "predicate not met");
                Round::Pending(object)
            }
            Err(e) => {
                warn!(round, resource = %target, error = %e, "read failed, will retry");
                Round::Pending(None)
            }
        }
    })
    .await;

    ObjectWait {
        satisfied: session.satisfied,
        elapsed: session.elapsed,
        last_object: session.last,
    }
}

/// Predicate: a Deployment reports at least `min_ready` ready replicas
pub fn deployment_ready(min_ready: i64) -> impl Fn(&Value) -> bool {
    move |object| {
        object
            .pointer("/status/readyReplicas")
            .and_then(Value::as_i64)
            .is_some_and(|ready| ready >= min_ready)
    }
}
