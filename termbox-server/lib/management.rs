//! Wiring the background jobs from the server configuration.

use std::sync::Arc;

use termbox_core::{
    config::ImageCatalog,
    management::{Cadence, GarbageCollector, ImagePrefetcher, Job, Scheduler},
    runtime::RuntimeClient,
};

use crate::config::Config;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Builds the scheduler running garbage collection and image prefetch for `config`.
///
/// The scheduler is returned unstarted so callers can subscribe to its reports first.
pub fn create_scheduler(
    config: &Config,
    runtime: Arc<dyn RuntimeClient>,
    catalog: Arc<ImageCatalog>,
) -> Scheduler {
    let gc = Job::CollectGarbage(GarbageCollector::new(
        Arc::clone(&runtime),
        config.get_gc_policy().clone(),
    ));
    let prefetch = Job::PrefetchImages(ImagePrefetcher::new(
        runtime,
        catalog,
        *config.get_pull_timeout(),
    ));

    let scheduler = Scheduler::new().schedule(Cadence::Every(*config.get_gc_interval()), gc);
    let prefetch_cadence = Cadence::DailyAt(*config.get_prefetch_at());

    if *config.get_prefetch_on_start() {
        scheduler.schedule_and_run(prefetch_cadence, prefetch)
    } else {
        scheduler.schedule(prefetch_cadence, prefetch)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
