//! Typed Resource Accessor and mutation seams
//!
//! The accessor is the only way the engine reads the backing store. It never
//! retries; retry policy belongs to the pollers that call it.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::resource::{PollOutcome, ResourceRef};
use crate::Result;

/// Lower bound on how long a single fetch may take inside a poll round
pub const MIN_FETCH_TIMEOUT: Duration = Duration::from_millis(250);

/// Read-only access to named resources in the backing store
#[async_trait]
pub trait ResourceAccessor: Send + Sync {
    /// Fetch an object.
    ///
    /// `Ok(None)` means the store confirmed the object does not exist. Any
    /// other failure (network, serialization, rate limiting) is `Err`.
    async fn read(&self, target: &ResourceRef) -> Result<Option<Value>>;

    /// Tri-state view of [`ResourceAccessor::read`]
    async fn fetch(&self, target: &ResourceRef) -> PollOutcome {
        match self.read(target).await {
            Ok(Some(_)) => PollOutcome::Found,
            Ok(None) => PollOutcome::NotFound,
            Err(e) => PollOutcome::TransientError(e.to_string()),
        }
    }
}

/// Result of a create request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The store accepted the new object
    Created,
    /// An object with that name already existed; nothing was changed
    AlreadyExists,
}

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Deletion was accepted (the object may still linger on finalizers)
    Deleted,
    /// There was nothing to delete
    AlreadyAbsent,
}

/// The controlled mutations the engine is allowed to request
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceMutator: Send + Sync {
    /// Create `body` at `target`. An existing object is not an error.
    async fn create(&self, target: &ResourceRef, body: Value) -> Result<CreateOutcome>;

    /// Request deletion. A missing object is not an error.
    async fn delete(&self, target: &ResourceRef) -> Result<DeleteOutcome>;

    /// JSON merge-patch an existing object, returning the patched object
    async fn merge_patch(&self, target: &ResourceRef, patch: Value) -> Result<Value>;
}

/// Per-fetch bound used inside a poll round: four fifths of the interval.
///
/// A hung call must give up before the next round is due. Intervals under
/// about 300ms get [`MIN_FETCH_TIMEOUT`] instead.
pub fn fetch_timeout(interval: Duration) -> Duration {
    (interval * 4 / 5).max(MIN_FETCH_TIMEOUT)
}

/// Fetch with a time bound; expiry is reported as a transient error
pub async fn fetch_bounded(
    accessor: &dyn ResourceAccessor,
    target: &ResourceRef,
    limit: Duration,
) -> PollOutcome {
    match tokio::time::timeout(limit, accessor.fetch(target)).await {
        Ok(outcome) => outcome,
        Err(_) => PollOutcome::TransientError(format!("fetch timed out after {limit:?}")),
    }
}

/// Read with a time bound; expiry is reported as an internal error
pub async fn read_bounded(
    accessor: &dyn ResourceAccessor,
    target: &ResourceRef,
    limit: Duration,
) -> Result<Option<Value>> {
    match tokio::time::timeout(limit, accessor.read(target)).await {
        Ok(result) => result,
        Err(_) => Err(verity_common::Error::internal_with_context(
            "read",
            format!("read of {target} timed out after {limit:?}"),
        )),
    }
}

/// Manifest body for a new object of `target`'s kind
pub fn object_body(target: &ResourceRef, spec: Value) -> Value {
    let mut metadata = serde_json::Map::new();
    metadata.insert("name".to_string(), Value::String(target.name().to_string()));
    if let Some(ns) = target.namespace_opt() {
        metadata.insert("namespace".to_string(), Value::String(ns.to_string()));
    }

    let mut body = serde_json::json!({
        "apiVersion": target.kind().api_version(),
        "kind": target.kind().kind(),
        "metadata": Value::Object(metadata),
    });
    if !spec.is_null() {
        body["spec"] = spec;
    }
    body
}
