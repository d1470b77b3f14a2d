//! Configuration types and defaults.

mod catalog;
mod defaults;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use catalog::*;
pub use defaults::*;
