//! Termbox Server - The HTTP boundary for creating and attaching to termboxes.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handler;
pub mod management;
pub mod middleware;
pub mod payload;
pub mod route;
pub mod state;

#[cfg(test)]
mod handler_tests;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use config::*;
pub use error::*;
pub use handler::*;
pub use management::*;
pub use middleware::*;
pub use payload::*;
pub use route::*;
pub use state::*;
