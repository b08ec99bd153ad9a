//! Clean-Slate Coordinator
//!
//! Establishes an empty baseline before a scenario runs: request deletion of
//! a namespace, then block until the store confirms it is gone. Failing to
//! reach that baseline is fatal for the run, because later scenarios cannot
//! tell stale state from state the reconciler just created.

use std::time::Duration;

use tracing::{info, warn};

use crate::absence::watch_absence;
use crate::accessor::{DeleteOutcome, ResourceAccessor, ResourceMutator};
use crate::resource::ResourceRef;
use crate::{Error, Result};

/// Delete `namespace` and wait until it is gone.
///
/// Deleting an absent namespace is success. A rejected delete request is
/// logged and the wait proceeds anyway; only a namespace still present at
/// `deadline` yields [`Error::CleanupFailure`].
pub async fn reset(
    accessor: &dyn ResourceAccessor,
    mutator: &dyn ResourceMutator,
    namespace: &str,
    interval: Duration,
    deadline: Duration,
) -> Result<()> {
    let target = ResourceRef::namespace_object(namespace);

    match mutator.delete(&target).await {
        Ok(DeleteOutcome::Deleted) => {
            info!(namespace, "namespace deletion requested");
        }
        Ok(DeleteOutcome::AlreadyAbsent) => {
            info!(namespace, "namespace already absent");
        }
        Err(e) => {
            warn!(namespace, error = %e, "namespace delete request failed, waiting for absence anyway");
        }
    }

    let absence = watch_absence(accessor, &target, interval, deadline).await;
    if absence.gone {
        Ok(())
    } else {
        Err(Error::cleanup_failure(
            namespace,
            absence.elapsed,
            format!("namespace still present: {}", absence.last_outcome),
        ))
    }
}
