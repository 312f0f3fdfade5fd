//! `supafleet` provisions, tracks and tears down isolated instances of a self-hosted Supabase stack.
//!
//! # Overview
//!
//! Every instance gets its own block of host ports, its own docker network, its own generated
//! secrets and a record in a JSON registry kept in the base folder. The crate handles:
//! - Deterministic port and network allocation per instance id
//! - Secret and signed token generation
//! - Registry persistence with backup-on-write
//! - The provisioning and teardown pipelines around docker and git
//!
//! # Architecture
//!
//! - **Config**: instance ids, the port allocator, placeholder tables and manager settings
//! - **Models**: registry records, secret bundles and connection views
//! - **Management**: secret generation, the registry store, templating and the lifecycle controller
//! - **Runtime**: interfaces to the container runtime and the template repository
//!
//! # Modules
//!
//! - [`config`] - Configuration types and the resource allocator
//! - [`management`] - Instance lifecycle, registry store and secret generation
//! - [`models`] - Persisted registry schema
//! - [`runtime`] - Container runtime and template source collaborators
//! - [`utils`] - Common utilities and helpers

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod config;
pub mod management;
pub mod models;
pub mod runtime;
pub mod utils;

pub use error::*;
