use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    runtime::{with_deadline, ListFilter, PodEntry, RuntimeClient},
    TermboxError, TermboxResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A view of the boxes this control plane owns, derived from the runtime's pod listing.
///
/// Nothing is cached. Every call re-lists the runtime, so boxes created or removed by anyone
/// since the last call are always accounted for.
#[derive(Clone)]
pub struct BoxRegistry {
    runtime: Arc<dyn RuntimeClient>,
    sandbox_name: String,
    call_timeout: Duration,
}

/// The boxes found in one listing, plus what was skipped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoxSnapshot {
    /// Entries whose name matches the sandbox name.
    pub boxes: Vec<PodEntry>,

    /// Number of raw entries in the listing.
    pub listed: usize,

    /// Entries that could not be parsed.
    pub malformed: usize,

    /// Well-formed entries belonging to other workloads.
    pub ignored: usize,
}

/// A box together with the creation time reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodRecord {
    /// The runtime-assigned pod id.
    pub id: String,

    /// The pod name.
    pub name: String,

    /// When the runtime created the pod.
    pub created_at: DateTime<Utc>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BoxRegistry {
    /// Creates a registry for pods named `sandbox_name`.
    pub fn new(
        runtime: Arc<dyn RuntimeClient>,
        sandbox_name: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            sandbox_name: sandbox_name.into(),
            call_timeout,
        }
    }

    /// The pod name that marks a box.
    pub fn sandbox_name(&self) -> &str {
        &self.sandbox_name
    }

    /// Lists the runtime once and keeps the entries that are boxes.
    pub async fn snapshot(&self) -> TermboxResult<BoxSnapshot> {
        let entries = with_deadline(
            "list_pods",
            self.call_timeout,
            self.runtime.list_pods(&ListFilter::all_pods()),
        )
        .await?;

        let mut snapshot = BoxSnapshot {
            listed: entries.len(),
            ..Default::default()
        };

        for raw in entries {
            match raw.parse::<PodEntry>() {
                Ok(entry) if entry.name == self.sandbox_name => snapshot.boxes.push(entry),
                Ok(_) => snapshot.ignored += 1,
                Err(e) => {
                    tracing::warn!("skipping pod listing entry: {}", e);
                    snapshot.malformed += 1;
                }
            }
        }

        Ok(snapshot)
    }

    /// Looks up a single box by id in a fresh listing.
    pub async fn find(&self, id: &str) -> TermboxResult<Option<PodEntry>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.boxes.into_iter().find(|entry| entry.id == id))
    }

    /// Fetches the runtime's creation time for a listed box.
    pub async fn record(&self, entry: &PodEntry) -> TermboxResult<PodRecord> {
        let info = with_deadline(
            "get_pod_info",
            self.call_timeout,
            self.runtime.get_pod_info(&entry.id),
        )
        .await?;

        let created_at = DateTime::from_timestamp(info.created_at, 0).ok_or_else(|| {
            TermboxError::InvalidTimestamp {
                id: entry.id.clone(),
                created_at: info.created_at,
            }
        })?;

        Ok(PodRecord {
            id: entry.id.clone(),
            name: entry.name.clone(),
            created_at,
        })
    }
}

impl PodRecord {
    /// How old the pod is at `now`, in whole seconds like the runtime's timestamps. Pods
    /// reported as created in the future have age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        let secs = now.timestamp() - self.created_at.timestamp();
        Duration::from_secs(u64::try_from(secs).unwrap_or_default())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Fault, InMemoryRuntime};

    fn registry(runtime: &Arc<InMemoryRuntime>) -> BoxRegistry {
        BoxRegistry::new(runtime.clone(), "termbox", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_registry_snapshot_keeps_only_boxes() -> TermboxResult<()> {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.insert_pod("p1", "termbox", Utc::now());
        runtime.insert_pod("p2", "database", Utc::now());
        runtime.insert_raw_entry("no-name");

        let snapshot = registry(&runtime).snapshot().await?;

        assert_eq!(snapshot.listed, 3);
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.ignored, 1);
        assert_eq!(snapshot.boxes.len(), 1);
        assert_eq!(snapshot.boxes[0].id, "p1");
        Ok(())
    }

    #[tokio::test]
    async fn test_registry_find_ignores_foreign_pods() -> TermboxResult<()> {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.insert_pod("p1", "termbox", Utc::now());
        runtime.insert_pod("p2", "database", Utc::now());

        let registry = registry(&runtime);
        assert!(registry.find("p1").await?.is_some());
        assert!(registry.find("p2").await?.is_none());
        assert!(registry.find("p3").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_registry_snapshot_propagates_listing_failure() {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.inject_fault(Fault::List);

        let result = registry(&runtime).snapshot().await;
        assert!(matches!(result, Err(TermboxError::Runtime(_))));
    }

    #[test]
    fn test_pod_record_age_is_never_negative() {
        let now = Utc::now();
        let record = PodRecord {
            id: "p1".to_string(),
            name: "termbox".to_string(),
            created_at: now + chrono::Duration::minutes(5),
        };
        assert_eq!(record.age(now), Duration::ZERO);

        let record = PodRecord {
            created_at: now - chrono::Duration::minutes(5),
            ..record
        };
        assert_eq!(record.age(now), Duration::from_secs(300));
    }

    #[test]
    fn test_pod_record_age_ignores_sub_second_precision() {
        let created_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let record = PodRecord {
            id: "p1".to_string(),
            name: "termbox".to_string(),
            created_at,
        };

        let now =
            created_at + chrono::Duration::seconds(21600) + chrono::Duration::milliseconds(999);
        assert_eq!(record.age(now), Duration::from_secs(21600));
    }
}
