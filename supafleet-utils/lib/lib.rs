//! `supafleet-utils` is a library containing general utilities for the supafleet project.

#![warn(missing_docs)]

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod defaults;
pub mod env;
pub mod path;
pub mod term;

pub use defaults::*;
pub use env::*;
pub use path::*;
pub use term::*;
