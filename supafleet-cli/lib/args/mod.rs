//! Command line arguments.

mod supafleet;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use supafleet::*;
