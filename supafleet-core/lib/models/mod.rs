//! Persisted registry schema and the views derived from it.

mod connection;
mod registry;
mod secrets;
mod timestamp;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use connection::*;
pub use registry::*;
pub use secrets::*;
