//! Instance management: secret generation, registry persistence, configuration rendering and
//! the lifecycle controller tying them to the container runtime.

pub mod compose;
pub mod folder;
pub mod lifecycle;
pub mod secrets;
pub mod store;
pub mod template;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use lifecycle::*;
pub use store::*;
pub use template::{PlainSubstitution, Rendered, SubstitutionMap, TemplateEngine};
