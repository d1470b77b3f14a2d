//! Box lifecycle management.
//!
//! This module provides:
//! - [`BoxRegistry`], a projection of the runtime's pods onto this control plane's boxes
//! - [`BoxManager`] for creating, listing and attaching to boxes
//! - [`GarbageCollector`], the job reclaiming boxes past their TTL
//! - [`ImagePrefetcher`], the job keeping catalog images warm
//! - [`Scheduler`], which runs both jobs on their cadences

mod boxes;
mod gc;
mod prefetch;
mod registry;
mod scheduler;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use boxes::*;
pub use gc::*;
pub use prefetch::*;
pub use registry::*;
pub use scheduler::*;
