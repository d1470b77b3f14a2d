//! Request and response payload definitions for the termbox server.

use serde::{Deserialize, Serialize};
use termbox_core::{management::BoxHandle, runtime::PodEntry};

//--------------------------------------------------------------------------------------------------
// Types: Requests
//--------------------------------------------------------------------------------------------------

/// Request payload for creating a box
#[derive(Debug, Default, Deserialize)]
pub struct CreateBoxRequest {
    /// The `reference:version` to run. Defaults to the first catalog image.
    #[serde(default)]
    pub image: Option<String>,
}

/// Query parameters for attaching to a box
#[derive(Debug, Default, Deserialize)]
pub struct ExecQuery {
    /// The command line to run, split on whitespace. Defaults to a shell.
    #[serde(default)]
    pub cmd: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Types: Responses
//--------------------------------------------------------------------------------------------------

/// Response type for regular message responses
#[derive(Debug, Serialize)]
pub struct RegularMessageResponse {
    /// Message indicating the status of the operation
    pub message: String,
}

/// Response body of a failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// What went wrong
    pub error: String,
}

/// Response for a newly created box
#[derive(Debug, Serialize)]
pub struct CreateBoxResponse {
    /// The box id
    pub id: String,

    /// The image the box runs
    pub image: String,

    /// Where to open the exec websocket
    pub exec_path: String,
}

/// Response listing the current boxes
#[derive(Debug, Serialize)]
pub struct BoxListResponse {
    /// The boxes
    pub boxes: Vec<BoxStatus>,
}

/// Status of an individual box
#[derive(Debug, Serialize)]
pub struct BoxStatus {
    /// The box id
    pub id: String,

    /// The pod name
    pub name: String,

    /// The status reported by the runtime
    pub status: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExecQuery {
    /// The command to run; empty means the default shell.
    pub fn command(&self) -> Vec<String> {
        self.cmd
            .as_deref()
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<BoxHandle> for CreateBoxResponse {
    fn from(handle: BoxHandle) -> Self {
        Self {
            exec_path: format!("/boxes/{}/exec", handle.id),
            id: handle.id,
            image: handle.image,
        }
    }
}

impl From<PodEntry> for BoxStatus {
    fn from(entry: PodEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            status: entry.status,
        }
    }
}
