//! Reclaiming boxes that outlived their TTL.
//!
//! Every run re-lists the runtime and only ever touches pods named with the sandbox name, since
//! the runtime is shared with other workloads. A failed listing aborts the run; a failure on any
//! single box is logged and the run moves on. Nothing is retried within a run, the next
//! scheduled run starts from scratch.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use serde::Serialize;
use typed_builder::TypedBuilder;

use crate::{
    config::{
        DEFAULT_BOX_TTL, DEFAULT_GC_CONCURRENCY, DEFAULT_RUNTIME_CALL_TIMEOUT,
        DEFAULT_SANDBOX_NAME,
    },
    runtime::{with_deadline, PodEntry, RuntimeClient},
    TermboxError,
};

use super::BoxRegistry;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// When boxes are reclaimed and how the runtime is called while doing it.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct GcPolicy {
    /// Boxes older than this are deleted.
    #[builder(default = DEFAULT_BOX_TTL)]
    pub ttl: Duration,

    /// Only pods with this name are considered.
    #[builder(default = DEFAULT_SANDBOX_NAME.to_string(), setter(into))]
    pub sandbox_name: String,

    /// Upper bound for every runtime call.
    #[builder(default = DEFAULT_RUNTIME_CALL_TIMEOUT)]
    pub call_timeout: Duration,

    /// How many boxes are inspected at once.
    #[builder(default = DEFAULT_GC_CONCURRENCY)]
    pub concurrency: usize,
}

/// The outcome of one garbage collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    /// The pod listing failed and nothing was done.
    pub aborted: bool,

    /// Number of raw entries in the listing.
    pub listed: usize,

    /// Entries that could not be parsed.
    pub malformed: usize,

    /// Entries belonging to other workloads.
    pub ignored: usize,

    /// Boxes deleted by this run.
    pub deleted: Vec<String>,

    /// Boxes still within their TTL.
    pub kept: Vec<String>,

    /// Boxes that disappeared between the listing and the delete.
    pub gone: Vec<String>,

    /// Boxes whose inspection or deletion failed.
    pub failed: Vec<String>,
}

/// The recurring job that deletes expired boxes.
#[derive(Clone)]
pub struct GarbageCollector {
    runtime: Arc<dyn RuntimeClient>,
    registry: BoxRegistry,
    policy: GcPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Deleted,
    Kept,
    Gone,
    Failed,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl GarbageCollector {
    /// Creates a garbage collector acting on `runtime` according to `policy`.
    pub fn new(runtime: Arc<dyn RuntimeClient>, policy: GcPolicy) -> Self {
        let registry = BoxRegistry::new(
            Arc::clone(&runtime),
            policy.sandbox_name.clone(),
            policy.call_timeout,
        );

        Self {
            runtime,
            registry,
            policy,
        }
    }

    /// The policy this collector enforces.
    pub fn policy(&self) -> &GcPolicy {
        &self.policy
    }

    /// Runs one collection pass against the current time.
    pub async fn run(&self) -> GcReport {
        self.run_at(Utc::now()).await
    }

    /// Runs one collection pass, measuring box ages against `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> GcReport {
        let snapshot = match self.registry.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("garbage collection aborted, failed to list pods: {}", e);
                return GcReport {
                    aborted: true,
                    ..Default::default()
                };
            }
        };

        let mut report = GcReport {
            listed: snapshot.listed,
            malformed: snapshot.malformed,
            ignored: snapshot.ignored,
            ..Default::default()
        };

        let verdicts: Vec<(String, Verdict)> = stream::iter(snapshot.boxes)
            .map(|entry| async move {
                let verdict = self.reap(&entry, now).await;
                (entry.id, verdict)
            })
            .buffer_unordered(self.policy.concurrency.max(1))
            .collect()
            .await;

        for (id, verdict) in verdicts {
            match verdict {
                Verdict::Deleted => report.deleted.push(id),
                Verdict::Kept => report.kept.push(id),
                Verdict::Gone => report.gone.push(id),
                Verdict::Failed => report.failed.push(id),
            }
        }

        tracing::debug!(
            "garbage collection finished: {} deleted, {} kept, {} gone, {} failed",
            report.deleted.len(),
            report.kept.len(),
            report.gone.len(),
            report.failed.len()
        );

        report
    }

    async fn reap(&self, entry: &PodEntry, now: DateTime<Utc>) -> Verdict {
        let record = match self.registry.record(entry).await {
            Ok(record) => record,
            Err(TermboxError::PodNotFound(_)) => {
                tracing::debug!("box {} is already gone", entry.id);
                return Verdict::Gone;
            }
            Err(e) => {
                tracing::error!("failed to inspect box {}: {}", entry.id, e);
                return Verdict::Failed;
            }
        };

        let age = record.age(now);
        if age <= self.policy.ttl {
            tracing::debug!("keeping box {} ({}s old)", record.id, age.as_secs());
            return Verdict::Kept;
        }

        match with_deadline(
            "delete_pod",
            self.policy.call_timeout,
            self.runtime.delete_pod(&record.id),
        )
        .await
        {
            Ok(()) => {
                tracing::info!("deleted box {} ({}s old)", record.id, age.as_secs());
                Verdict::Deleted
            }
            Err(TermboxError::PodNotFound(_)) => {
                tracing::debug!("box {} was removed before it could be deleted", record.id);
                Verdict::Gone
            }
            Err(e) => {
                tracing::error!("failed to delete box {}: {}", record.id, e);
                Verdict::Failed
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for GcPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
