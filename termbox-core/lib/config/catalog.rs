//! The catalog of images kept warm in the runtime's cache.
//!
//! The catalog is a JSON array of `{ "reference": ..., "versions": [...] }` objects, loaded once
//! at start-up. The legacy `image` key is accepted in place of `reference`. Any problem with
//! the file is fatal: there is no degraded mode without a catalog.

use std::{collections::HashSet, path::Path};

use getset::Getters;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::{TermboxError, TermboxResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An image reference together with the version tags that should be kept warm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ImageSpec {
    /// The image reference without a tag, e.g. `alpine` or `docker.io/library/ubuntu`.
    #[serde(alias = "image")]
    reference: String,

    /// The version tags of the image, in catalog order.
    versions: Vec<String>,
}

/// The immutable, validated list of images known to the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCatalog {
    images: Vec<ImageSpec>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageSpec {
    /// Creates a new image spec.
    pub fn new(
        reference: impl Into<String>,
        versions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            reference: reference.into(),
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns every `reference:version` pair of this image.
    pub fn tags(&self) -> impl Iterator<Item = String> + '_ {
        self.versions
            .iter()
            .map(move |version| format!("{}:{}", self.reference, version))
    }

    fn validate(&self) -> TermboxResult<()> {
        if self.reference.trim().is_empty() {
            return Err(TermboxError::InvalidCatalog(
                "image reference must not be empty".to_string(),
            ));
        }

        if self.reference.chars().any(char::is_whitespace) {
            return Err(TermboxError::InvalidCatalog(format!(
                "image reference {:?} contains whitespace",
                self.reference
            )));
        }

        if self.versions.is_empty() {
            return Err(TermboxError::InvalidCatalog(format!(
                "image {} has no versions",
                self.reference
            )));
        }

        for version in &self.versions {
            if version.is_empty() || version.chars().any(|c| c.is_whitespace() || c == ':') {
                return Err(TermboxError::InvalidCatalog(format!(
                    "image {} has an invalid version tag {:?}",
                    self.reference, version
                )));
            }
        }

        Ok(())
    }
}

impl ImageCatalog {
    /// Builds a catalog from already constructed image specs, validating every entry.
    pub fn new(images: Vec<ImageSpec>) -> TermboxResult<Self> {
        if images.is_empty() {
            return Err(TermboxError::InvalidCatalog(
                "catalog does not contain any images".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for image in &images {
            image.validate()?;
            if !seen.insert(image.reference.as_str()) {
                return Err(TermboxError::InvalidCatalog(format!(
                    "image {} is listed more than once",
                    image.reference
                )));
            }
        }

        Ok(Self { images })
    }

    /// Reads and validates the catalog file at `path`.
    pub async fn load(path: impl AsRef<Path>) -> TermboxResult<Self> {
        let path = path.as_ref();
        let contents = fs::read(path)
            .await
            .map_err(|source| TermboxError::CatalogRead {
                path: path.to_path_buf(),
                source,
            })?;

        let images: Vec<ImageSpec> =
            serde_json::from_slice(&contents).map_err(|source| TermboxError::CatalogParse {
                path: path.to_path_buf(),
                source,
            })?;

        let catalog = Self::new(images)?;
        tracing::info!(
            "loaded image catalog {} with {} images and {} tags",
            path.display(),
            catalog.images.len(),
            catalog.tag_count()
        );

        Ok(catalog)
    }

    /// Returns the images in catalog order.
    pub fn images(&self) -> &[ImageSpec] {
        &self.images
    }

    /// Returns every `reference:version` pair in catalog order.
    pub fn tags(&self) -> impl Iterator<Item = String> + '_ {
        self.images.iter().flat_map(ImageSpec::tags)
    }

    /// Returns the total number of `reference:version` pairs.
    pub fn tag_count(&self) -> usize {
        self.images.iter().map(|image| image.versions.len()).sum()
    }

    /// Checks whether `tag` is one of the catalog's `reference:version` pairs.
    pub fn contains(&self, tag: &str) -> bool {
        self.images.iter().any(|image| {
            tag.strip_prefix(image.reference.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
                .is_some_and(|version| image.versions.iter().any(|v| v == version))
        })
    }

    /// The tag boxes are created from when the caller does not ask for one.
    pub fn default_tag(&self) -> Option<String> {
        self.tags().next()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
