//! `supafleet-cli` is the command line interface of supafleet.
//!
//! It parses arguments with clap, styles terminal output and maps library errors to exit codes.
//! The `supafleet` binary lives in `bin/supafleet`.

#![warn(missing_docs)]

mod args;
mod error;
mod styles;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use args::*;
pub use error::*;
pub use styles::*;
