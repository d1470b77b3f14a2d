//! Keeping catalog images warm in the runtime's cache.

use std::{sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
    config::ImageCatalog,
    runtime::{with_deadline, RuntimeClient},
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The recurring job that pulls every catalog image.
#[derive(Clone)]
pub struct ImagePrefetcher {
    runtime: Arc<dyn RuntimeClient>,
    catalog: Arc<ImageCatalog>,
    pull_timeout: Duration,
}

/// The outcome of one prefetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    /// Tags that were pulled.
    pub pulled: Vec<String>,

    /// Tags whose pull failed or timed out.
    pub failed: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImagePrefetcher {
    /// Creates a prefetcher pulling `catalog` into `runtime`.
    pub fn new(
        runtime: Arc<dyn RuntimeClient>,
        catalog: Arc<ImageCatalog>,
        pull_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            catalog,
            pull_timeout,
        }
    }

    /// Pulls every `reference:version` pair of the catalog, one after the other.
    ///
    /// There is no check for images that are already cached; pulling a cached image is a no-op
    /// for the runtime. A failed pull does not stop the remaining ones.
    pub async fn run(&self) -> PrefetchReport {
        let mut report = PrefetchReport::default();

        for tag in self.catalog.tags() {
            tracing::info!("pulling image {}", tag);
            let pulled =
                with_deadline("pull_image", self.pull_timeout, self.runtime.pull_image(&tag)).await;
            match pulled {
                Ok(()) => report.pulled.push(tag),
                Err(e) => {
                    tracing::error!("failed to pull image {}: {}", tag, e);
                    report.failed.push(tag);
                }
            }
        }

        tracing::info!(
            "image prefetch finished: {} pulled, {} failed",
            report.pulled.len(),
            report.failed.len()
        );

        report
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ImageSpec, DEFAULT_PULL_TIMEOUT},
        runtime::{Fault, InMemoryRuntime},
    };

    fn prefetcher(runtime: &Arc<InMemoryRuntime>, images: Vec<ImageSpec>) -> ImagePrefetcher {
        let catalog = Arc::new(ImageCatalog::new(images).unwrap());
        ImagePrefetcher::new(runtime.clone(), catalog, DEFAULT_PULL_TIMEOUT)
    }

    #[tokio::test]
    async fn test_prefetch_pulls_every_version() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let job = prefetcher(&runtime, vec![ImageSpec::new("alpine", ["3.10", "3.11"])]);

        let report = job.run().await;

        assert_eq!(runtime.pull_calls(), vec!["alpine:3.10", "alpine:3.11"]);
        assert_eq!(report.pulled, vec!["alpine:3.10", "alpine:3.11"]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_prefetch_continues_past_failures() {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.inject_fault(Fault::PullImage("alpine:3.10".to_string()));
        runtime.inject_fault(Fault::PullImage("ubuntu:20.04".to_string()));
        let job = prefetcher(
            &runtime,
            vec![
                ImageSpec::new("alpine", ["3.10", "3.11"]),
                ImageSpec::new("ubuntu", ["20.04", "22.04", "24.04"]),
                ImageSpec::new("busybox", ["latest"]),
            ],
        );

        let report = job.run().await;

        // One pull per pair, regardless of failures.
        assert_eq!(runtime.pull_calls().len(), 6);
        assert_eq!(report.failed, vec!["alpine:3.10", "ubuntu:20.04"]);
        assert_eq!(
            report.pulled,
            vec!["alpine:3.11", "ubuntu:22.04", "ubuntu:24.04", "busybox:latest"]
        );
    }

    #[tokio::test]
    async fn test_prefetch_runs_repeat_everything() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let job = prefetcher(&runtime, vec![ImageSpec::new("alpine", ["3.11"])]);

        job.run().await;
        job.run().await;

        assert_eq!(runtime.pull_calls(), vec!["alpine:3.11", "alpine:3.11"]);
        assert_eq!(runtime.cached_images(), vec!["alpine:3.11"]);
    }
}
