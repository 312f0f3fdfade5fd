//! Collaborators outside the process: the container runtime and the template repository.
//!
//! Both are traits so the lifecycle controller can be driven by fakes in tests. The default
//! implementations shell out to the `docker` and `git` binaries.

mod docker;
mod process;
mod source;

use std::{collections::BTreeMap, path::Path, time::Duration};

use async_trait::async_trait;

use crate::SupafleetResult;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use docker::*;
pub use source::*;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// The container runtime instances run on.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Lists the networks named exactly `name`.
    async fn list_networks(&self, name: &str) -> SupafleetResult<Vec<NetworkInfo>>;

    /// Creates a network.
    async fn create_network(
        &self,
        name: &str,
        driver: &str,
        options: &BTreeMap<String, String>,
    ) -> SupafleetResult<NetworkInfo>;

    /// Removes a network.
    async fn remove_network(&self, network: &NetworkInfo) -> SupafleetResult<()>;

    /// Lists the containers attached to a network.
    async fn list_containers(
        &self,
        network: &str,
        include_stopped: bool,
    ) -> SupafleetResult<Vec<ContainerInfo>>;

    /// Stops a container, killing it after `timeout`.
    async fn stop_container(&self, container: &ContainerInfo, timeout: Duration)
        -> SupafleetResult<()>;

    /// Removes a stopped container.
    async fn remove_container(&self, container: &ContainerInfo) -> SupafleetResult<()>;

    /// Brings down the compose project in `compose_dir`, removing its volumes.
    async fn compose_down(&self, compose_dir: &Path) -> SupafleetResult<()>;
}

/// Where the deployment templates come from.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Makes sure an up to date copy of the templates exists at `target_dir`.
    async fn ensure_present(&self, target_dir: &Path) -> SupafleetResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A network known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Runtime id.
    pub id: String,

    /// Network name.
    pub name: String,

    /// Network driver.
    pub driver: String,
}

/// A container known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Runtime id.
    pub id: String,

    /// Container name.
    pub name: String,

    /// Lifecycle state.
    pub state: ContainerState,
}

/// The lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Created but never started.
    Created,

    /// Running.
    Running,

    /// Paused.
    Paused,

    /// Restarting.
    Restarting,

    /// Being removed.
    Removing,

    /// Exited.
    Exited,

    /// Dead.
    Dead,

    /// A state this crate does not know.
    Other,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContainerInfo {
    /// Whether the container is up.
    pub fn is_running(&self) -> bool {
        matches!(
            self.state,
            ContainerState::Running | ContainerState::Restarting | ContainerState::Paused
        )
    }
}

impl ContainerState {
    /// Parses the state reported by docker.
    pub fn parse(state: &str) -> Self {
        match state.trim().to_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Other,
        }
    }
}
