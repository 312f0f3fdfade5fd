//! Utility functions and types.

pub mod path;

// Spinners are only compiled when the `cli-viz` feature is enabled.
#[cfg(feature = "cli-viz")]
pub mod viz;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use path::*;
