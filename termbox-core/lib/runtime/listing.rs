use std::str::FromStr;

use serde::Serialize;

use crate::{TermboxError, TermboxResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const FIELD_SEPARATOR: char = ':';

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One entry of a pod listing.
///
/// Runtimes report pods as `id:name[:vm[:status]]`. Only the id and the name are required.
///
/// ## Examples
///
/// ```
/// use termbox_core::runtime::PodEntry;
///
/// let entry: PodEntry = "pod-k2j3:termbox:vm-aa01:running".parse().unwrap();
/// assert_eq!(entry.id, "pod-k2j3");
/// assert_eq!(entry.name, "termbox");
/// assert_eq!(entry.status.as_deref(), Some("running"));
///
/// assert!("pod-without-name".parse::<PodEntry>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodEntry {
    /// The runtime-assigned pod id.
    pub id: String,

    /// The pod name.
    pub name: String,

    /// The id of the VM backing the pod, if reported.
    pub vm: Option<String>,

    /// The pod status, if reported.
    pub status: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for PodEntry {
    type Err = TermboxError;

    fn from_str(raw: &str) -> TermboxResult<Self> {
        let malformed = || TermboxError::MalformedPodEntry(raw.to_string());
        let mut fields = raw.split(FIELD_SEPARATOR).map(str::trim);

        let id = fields.next().filter(|f| !f.is_empty()).ok_or_else(malformed)?;
        let name = fields.next().filter(|f| !f.is_empty()).ok_or_else(malformed)?;
        let vm = fields.next().filter(|f| !f.is_empty()).map(str::to_string);
        let status = fields.next().filter(|f| !f.is_empty()).map(str::to_string);

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            vm,
            status,
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
