use std::{collections::BTreeMap, path::Path, time::Duration};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};

use super::{process, ContainerInfo, ContainerRuntime, ContainerState, NetworkInfo};
use crate::SupafleetResult;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const DOCKER_PROGRAM: &str = "docker";

const JSON_FORMAT: &str = "{{json .}}";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Drives the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkLine {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    #[serde(default)]
    driver: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    names: String,
    #[serde(default)]
    state: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DockerCli {
    /// Uses the `docker` binary found on the `PATH`.
    pub fn new() -> Self {
        Self::with_program(DOCKER_PROGRAM)
    }

    /// Uses another docker compatible binary, e.g. `podman`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn docker(&self, args: &[&str], current_dir: Option<&Path>) -> SupafleetResult<String> {
        process::run(&self.program, args, current_dir).await
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list_networks(&self, name: &str) -> SupafleetResult<Vec<NetworkInfo>> {
        let filter = format!("name={}", name);
        let output = self
            .docker(
                &["network", "ls", "--filter", filter.as_str(), "--format", JSON_FORMAT],
                None,
            )
            .await?;

        // The name filter matches substrings.
        let networks = parse_json_lines::<NetworkLine>(&output)?
            .into_iter()
            .filter(|line| line.name == name)
            .map(|line| NetworkInfo {
                id: line.id,
                name: line.name,
                driver: line.driver,
            })
            .collect();

        Ok(networks)
    }

    async fn create_network(
        &self,
        name: &str,
        driver: &str,
        options: &BTreeMap<String, String>,
    ) -> SupafleetResult<NetworkInfo> {
        let options: Vec<String> = options
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();

        let mut args = vec!["network", "create", "--driver", driver];
        for option in &options {
            args.push("--opt");
            args.push(option.as_str());
        }
        args.push(name);

        let output = self.docker(&args, None).await?;
        tracing::info!("created docker network {}", name);

        Ok(NetworkInfo {
            id: output.trim().to_string(),
            name: name.to_string(),
            driver: driver.to_string(),
        })
    }

    async fn remove_network(&self, network: &NetworkInfo) -> SupafleetResult<()> {
        let target = if network.id.is_empty() {
            network.name.as_str()
        } else {
            network.id.as_str()
        };

        self.docker(&["network", "rm", target], None).await?;
        tracing::info!("removed docker network {}", network.name);
        Ok(())
    }

    async fn list_containers(
        &self,
        network: &str,
        include_stopped: bool,
    ) -> SupafleetResult<Vec<ContainerInfo>> {
        let filter = format!("network={}", network);
        let mut args = vec!["ps", "--no-trunc", "--filter", filter.as_str(), "--format", JSON_FORMAT];
        if include_stopped {
            args.insert(1, "--all");
        }

        let output = self.docker(&args, None).await?;
        let containers = parse_json_lines::<ContainerLine>(&output)?
            .into_iter()
            .map(|line| ContainerInfo {
                id: line.id,
                name: line.names,
                state: ContainerState::parse(&line.state),
            })
            .collect();

        Ok(containers)
    }

    async fn stop_container(
        &self,
        container: &ContainerInfo,
        timeout: Duration,
    ) -> SupafleetResult<()> {
        let seconds = timeout.as_secs().to_string();
        self.docker(&["stop", "--time", seconds.as_str(), container.id.as_str()], None)
            .await?;
        tracing::info!("stopped container {}", container.name);
        Ok(())
    }

    async fn remove_container(&self, container: &ContainerInfo) -> SupafleetResult<()> {
        self.docker(&["rm", "--force", container.id.as_str()], None).await?;
        tracing::info!("removed container {}", container.name);
        Ok(())
    }

    async fn compose_down(&self, compose_dir: &Path) -> SupafleetResult<()> {
        self.docker(
            &["compose", "down", "-v", "--remove-orphans"],
            Some(compose_dir),
        )
        .await?;
        tracing::info!("compose project in {} is down", compose_dir.display());
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Parses the one-object-per-line output of `--format '{{json .}}'`.
fn parse_json_lines<T: DeserializeOwned>(output: &str) -> SupafleetResult<Vec<T>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
