//! Command line entry points for termbox.

#![warn(missing_docs)]

mod args;
mod error;
pub mod styles;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use args::*;
pub use error::*;
