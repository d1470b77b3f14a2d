//! Creating, listing and attaching to boxes.
//!
//! None of these operations store anything locally. A created box becomes visible to the
//! garbage collector through the runtime's listing, which is the only place box existence is
//! reconciled.

use std::{sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
    config::{ImageCatalog, DEFAULT_EXEC_COMMAND},
    runtime::{with_deadline, ExecRequest, ExecStream, PodEntry, PodSpec, RuntimeClient},
    TermboxError, TermboxResult,
};

use super::BoxRegistry;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Entry point for the request-driven box operations.
#[derive(Clone)]
pub struct BoxManager {
    runtime: Arc<dyn RuntimeClient>,
    catalog: Arc<ImageCatalog>,
    registry: BoxRegistry,
    call_timeout: Duration,
}

/// A newly created box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoxHandle {
    /// The runtime-assigned pod id.
    pub id: String,

    /// The `reference:version` the box runs.
    pub image: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BoxManager {
    /// Creates a box manager. Boxes are pods named `sandbox_name`.
    pub fn new(
        runtime: Arc<dyn RuntimeClient>,
        catalog: Arc<ImageCatalog>,
        sandbox_name: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        let registry = BoxRegistry::new(Arc::clone(&runtime), sandbox_name, call_timeout);
        Self {
            runtime,
            catalog,
            registry,
            call_timeout,
        }
    }

    /// The image catalog boxes are created from.
    pub fn catalog(&self) -> &ImageCatalog {
        &self.catalog
    }

    /// Creates a box running `image`, or the catalog's default image when none is given.
    ///
    /// Only catalog images are accepted, since those are the ones kept warm.
    pub async fn create_box(&self, image: Option<&str>) -> TermboxResult<BoxHandle> {
        let image = match image {
            Some(image) if self.catalog.contains(image) => image.to_string(),
            Some(image) => return Err(TermboxError::ImageNotInCatalog(image.to_string())),
            None => self.catalog.default_tag().ok_or_else(|| {
                TermboxError::InvalidCatalog("catalog does not contain any images".to_string())
            })?,
        };

        let spec = PodSpec {
            name: self.registry.sandbox_name().to_string(),
            image: image.clone(),
            tty: true,
        };

        let id = with_deadline(
            "create_pod",
            self.call_timeout,
            self.runtime.create_pod(&spec),
        )
        .await?;
        tracing::info!("created box {} from {}", id, image);

        Ok(BoxHandle { id, image })
    }

    /// Lists the boxes currently known to the runtime.
    pub async fn list_boxes(&self) -> TermboxResult<Vec<PodEntry>> {
        Ok(self.registry.snapshot().await?.boxes)
    }

    /// Looks up box `id` in a fresh listing.
    pub async fn find_box(&self, id: &str) -> TermboxResult<Option<PodEntry>> {
        self.registry.find(id).await
    }

    /// Attaches an interactive stream to `command` inside box `id`.
    ///
    /// Fails with [`TermboxError::PodNotFound`] if `id` is not a box, even when the runtime has a
    /// pod with that id.
    pub async fn exec_box(
        &self,
        id: &str,
        command: Vec<String>,
    ) -> TermboxResult<Box<dyn ExecStream>> {
        if self.registry.find(id).await?.is_none() {
            return Err(TermboxError::PodNotFound(id.to_string()));
        }

        let command = if command.is_empty() {
            vec![DEFAULT_EXEC_COMMAND.to_string()]
        } else {
            command
        };

        tracing::info!("attaching to box {}: {:?}", id, command);
        let request = ExecRequest::interactive(command);
        with_deadline("exec", self.call_timeout, self.runtime.exec(id, &request)).await
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
