//! Application state management for the termbox server.
//!
//! The state only carries shared handles. Boxes themselves are never stored here; every request
//! asks the runtime.

use std::sync::Arc;

use getset::Getters;
use termbox_core::{config::ImageCatalog, management::BoxManager, runtime::RuntimeClient};

use crate::config::Config;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Application state structure
#[derive(Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct AppState {
    /// The application configuration
    config: Arc<Config>,

    /// Box operations backed by the runtime
    boxes: BoxManager,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AppState {
    /// Create a new application state instance
    pub fn new(
        config: Arc<Config>,
        runtime: Arc<dyn RuntimeClient>,
        catalog: Arc<ImageCatalog>,
    ) -> Self {
        let policy = config.get_gc_policy();
        let boxes = BoxManager::new(
            runtime,
            catalog,
            policy.sandbox_name.clone(),
            policy.call_timeout,
        );

        Self { config, boxes }
    }
}
