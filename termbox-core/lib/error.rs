use std::{path::PathBuf, time::Duration};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a termbox-related operation.
pub type TermboxResult<T> = Result<T, TermboxError>;

/// An error that occurred during a termbox operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum TermboxError {
    /// The image catalog file could not be read.
    #[error("failed to read image catalog {path}: {source}")]
    CatalogRead {
        /// The catalog path
        path: PathBuf,

        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The image catalog file is not valid JSON of the expected shape.
    #[error("malformed image catalog {path}: {source}")]
    CatalogParse {
        /// The catalog path
        path: PathBuf,

        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The image catalog parsed but contains an invalid entry.
    #[error("invalid image catalog: {0}")]
    InvalidCatalog(String),

    /// The requested image is not part of the catalog.
    #[error("image {0} is not in the catalog")]
    ImageNotInCatalog(String),

    /// A pod listing entry could not be split into its fields.
    #[error("malformed pod listing entry: {0:?}")]
    MalformedPodEntry(String),

    /// The runtime does not know the pod.
    #[error("pod not found: {0}")]
    PodNotFound(String),

    /// The runtime reported a creation time that cannot be represented.
    #[error("pod {id} reported an invalid creation timestamp {created_at}")]
    InvalidTimestamp {
        /// The pod id
        id: String,

        /// The raw unix timestamp
        created_at: i64,
    },

    /// The runtime rejected or failed a request.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A runtime call did not finish in time.
    #[error("runtime call {operation} timed out after {timeout:?}")]
    RuntimeTimeout {
        /// The name of the runtime operation
        operation: &'static str,

        /// The timeout that elapsed
        timeout: Duration,
    },

    /// An error from the HTTP client used to talk to the runtime.
    #[error("runtime http error: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

