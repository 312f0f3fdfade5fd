//! Configuration types and helpers.

mod instance_id;
mod manager;
mod placeholders;
mod resources;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use instance_id::*;
pub use manager::*;
pub use placeholders::*;
pub use resources::*;
