//! The instance lifecycle controller.
//!
//! [`InstanceManager`] drives every multi-step operation on instances: provisioning, metadata
//! updates, configuration regeneration, teardown and live status queries. Each operation loads
//! the registry at its start and saves it after any mutation.
//!
//! Provisioning registers an instance only after every step has succeeded. A failed provision
//! leaves the files it wrote in the instance directory; a retry reuses them.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use getset::Getters;
use serde::Serialize;
use tokio::fs;
use typed_builder::TypedBuilder;

#[cfg(feature = "cli-viz")]
use crate::utils::viz;
use crate::{
    config::{
        self, InstanceId, InstanceLayout, ManagerConfig, ResourceSet, BRIDGE_NAME_OPTION,
        NETWORK_DRIVER,
    },
    models::{
        ConnectionExport, ConnectionInfo, InstanceMetadata, InstanceRecord, InstanceStatus,
        NetworkRecord, Registry, SecretBundle,
    },
    runtime::{ContainerRuntime, DockerCli, GitTemplateSource, TemplateSource},
    SupafleetError, SupafleetResult,
};

use super::{
    compose, folder, secrets, template, FileRegistryStore, PlainSubstitution, RegistryStore,
    TemplateEngine,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

#[cfg(feature = "cli-viz")]
const FETCH_TEMPLATE_MSG: &str = "Fetch deployment template";

#[cfg(feature = "cli-viz")]
const WRITE_CONFIG_MSG: &str = "Write instance configuration";

#[cfg(feature = "cli-viz")]
const CREATE_NETWORK_MSG: &str = "Create docker network";

#[cfg(feature = "cli-viz")]
const TEARDOWN_MSG: &str = "Tear down containers and network";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Provisions, tracks and tears down instances.
#[derive(Getters, TypedBuilder)]
#[getset(get = "pub with_prefix")]
pub struct InstanceManager {
    /// Manager settings.
    config: ManagerConfig,

    /// Registry persistence.
    store: Arc<dyn RegistryStore>,

    /// Container runtime.
    runtime: Arc<dyn ContainerRuntime>,

    /// Template repository.
    source: Arc<dyn TemplateSource>,

    /// `.env` renderer.
    #[builder(default = Arc::new(PlainSubstitution) as Arc<dyn TemplateEngine>)]
    engine: Arc<dyn TemplateEngine>,
}

/// The result of provisioning one instance of a batch.
#[derive(Debug)]
pub struct ProvisionOutcome {
    /// The instance.
    pub instance_id: InstanceId,

    /// The registered record, or why provisioning failed.
    pub result: SupafleetResult<InstanceRecord>,
}

/// A teardown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecommissionStep {
    /// `docker compose down`.
    ComposeDown,

    /// Stopping leftover containers on the instance network.
    StopContainers,

    /// Removing leftover containers on the instance network.
    RemoveContainers,

    /// Removing the instance network.
    RemoveNetwork,

    /// Dropping the registry records.
    Unregister,

    /// Deleting the instance directory.
    RemoveFiles,
}

/// A teardown step that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecommissionFailure {
    /// The step.
    pub step: DecommissionStep,

    /// What went wrong.
    pub message: String,
}

/// What a teardown did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecommissionReport {
    /// Containers stopped or removed outside of compose.
    pub removed_containers: Vec<String>,

    /// Networks removed from the runtime.
    pub removed_networks: Vec<String>,

    /// Whether the registry records were dropped.
    pub unregistered: bool,

    /// The instance directory, when it was deleted.
    pub removed_path: Option<PathBuf>,

    /// Steps that failed. Teardown carries on past them.
    pub failures: Vec<DecommissionFailure>,
}

/// A registered instance joined with its live status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSummary {
    /// Instance id.
    pub instance_id: InstanceId,

    /// Name.
    pub name: String,

    /// Description.
    pub description: String,

    /// Tags.
    pub tags: Vec<String>,

    /// Live status.
    pub status: InstanceStatus,

    /// Instance folder name.
    pub folder_name: String,

    /// Docker network.
    pub docker_network: String,

    /// Public API URL.
    pub supabase_url: String,

    /// Database port.
    pub postgres_port: u16,

    /// Registration time.
    pub created_at: Option<DateTime<Utc>>,

    /// Whether the configuration files still bind ports or URLs that were repaired on load.
    pub config_stale: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl InstanceManager {
    /// Creates a manager backed by the registry file in the base folder, the `docker` CLI and
    /// the configured git repository.
    pub fn with_defaults(config: ManagerConfig) -> Self {
        let store = FileRegistryStore::new(config.registry_path());
        let source = GitTemplateSource::from_config(&config);

        Self::builder()
            .store(Arc::new(store))
            .runtime(Arc::new(DockerCli::new()))
            .source(Arc::new(source))
            .config(config)
            .build()
    }

    /// Provisions a new instance and registers it.
    pub async fn provision(
        &self,
        id: InstanceId,
        metadata: &InstanceMetadata,
    ) -> SupafleetResult<InstanceRecord> {
        let mut registry = self.store.load().await?;
        if registry.contains(id) {
            return Err(SupafleetError::AlreadyExists(id));
        }

        let folder_name = folder::folder_name(id, metadata.name.as_deref())?;
        let instance_dir = self.config.instance_dir(&folder_name);
        tracing::info!(
            "provisioning instance {} in {}",
            id,
            instance_dir.display()
        );

        let (resources, secrets) = match self.prepare_instance(id, &instance_dir).await {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!(
                    "provisioning instance {} failed: {}; files written so far remain in {}",
                    id,
                    e,
                    instance_dir.display()
                );
                return Err(e);
            }
        };

        let record = InstanceRecord::new(&resources, metadata, folder_name, instance_dir, secrets);
        registry.insert(record.clone(), NetworkRecord::new(&resources));
        self.store.save(&mut registry).await?;

        tracing::info!(
            "instance {} registered: {} (postgres on port {})",
            id,
            record.supabase_url,
            record.postgres_port
        );
        Ok(record)
    }

    /// Provisions several instances one after the other. A failure never stops the batch.
    ///
    /// The name in `metadata` only applies when a single instance is provisioned; batches use
    /// the default names.
    pub async fn provision_many(
        &self,
        ids: &[InstanceId],
        metadata: &InstanceMetadata,
    ) -> Vec<ProvisionOutcome> {
        let metadata = if ids.len() > 1 && metadata.name.is_some() {
            tracing::warn!("ignoring the custom name for a batch of {} instances", ids.len());
            InstanceMetadata {
                name: None,
                ..metadata.clone()
            }
        } else {
            metadata.clone()
        };

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.provision(*id, &metadata).await;
            if let Err(e) = &result {
                tracing::error!("instance {} was not provisioned: {}", id, e);
            }

            outcomes.push(ProvisionOutcome {
                instance_id: *id,
                result,
            });
        }

        outcomes
    }

    /// Changes the name and optionally the description of an instance. Returns `false` when
    /// the instance is not registered.
    pub async fn update_metadata(
        &self,
        id: InstanceId,
        name: &str,
        description: Option<&str>,
    ) -> SupafleetResult<bool> {
        if name.trim().is_empty() {
            return Err(SupafleetError::InvalidArgument(
                "instance name must not be empty".to_string(),
            ));
        }

        let mut registry = self.store.load().await?;
        let Some(record) = registry.get_mut(id) else {
            tracing::warn!("instance {} is not registered", id);
            return Ok(false);
        };

        record.name = name.to_string();
        if let Some(description) = description {
            record.description = description.to_string();
        }
        record.updated_at = Some(Utc::now());

        self.store.save(&mut registry).await?;
        tracing::info!("updated metadata of instance {}", id);
        Ok(true)
    }

    /// Generates new secrets for an instance and rewrites its configuration files, which also
    /// clears the stale configuration marker.
    ///
    /// The instance directory must pass [`folder::ensure_contained`] before anything is written.
    /// Running containers keep the old credentials until the instance is restarted.
    pub async fn regenerate_config(&self, id: InstanceId) -> SupafleetResult<InstanceRecord> {
        let mut registry = self.store.load().await?;
        let record = registry.get(id).ok_or(SupafleetError::NotFound(id))?;

        let instance_dir =
            folder::ensure_contained(self.config.get_base_dir(), &self.record_dir(record), id)?;
        let layout = InstanceLayout::new(&instance_dir);
        if !fs::try_exists(&layout.env_template).await.unwrap_or(false) {
            return Err(SupafleetError::TemplateMissing(layout.env_template));
        }

        let resources = config::allocate(id);
        let secrets = secrets::generate()?;
        self.write_config(&layout, &resources, &secrets).await?;

        let record = registry.get_mut(id).ok_or(SupafleetError::NotFound(id))?;
        record.secrets = secrets;
        record.config_stale = false;
        record.updated_at = Some(Utc::now());
        let record = record.clone();

        self.store.save(&mut registry).await?;
        tracing::info!(
            "regenerated configuration of instance {}; restart it to apply",
            id
        );
        Ok(record)
    }

    /// Tears an instance down and unregisters it.
    ///
    /// The instance directory is checked with [`folder::ensure_contained`] before anything else
    /// happens. With `remove_files` a refused path aborts the teardown, and an accepted one is
    /// deleted last. Without it, compose down is skipped and reported as failed while the rest of
    /// the teardown runs. Every other step is best effort: failures are collected in the report
    /// and the teardown continues.
    pub async fn decommission(
        &self,
        id: InstanceId,
        remove_files: bool,
    ) -> SupafleetResult<DecommissionReport> {
        let mut registry = self.store.load().await?;
        let record = registry
            .get(id)
            .cloned()
            .ok_or(SupafleetError::NotFound(id))?;

        let instance_dir = self.record_dir(&record);
        let contained = match folder::ensure_contained(self.config.get_base_dir(), &instance_dir, id)
        {
            Err(e) if remove_files => return Err(e),
            result => result,
        };

        tracing::info!("decommissioning instance {}", id);
        let mut report = DecommissionReport::default();

        #[cfg(feature = "cli-viz")]
        let teardown_sp = viz::create_spinner(TEARDOWN_MSG.to_string(), None, None);

        match &contained {
            Ok(instance_dir) => self.compose_down(instance_dir, &mut report).await,
            Err(e) => report.fail(DecommissionStep::ComposeDown, e),
        }
        self.remove_leftover_containers(&record.docker_network, &mut report)
            .await;
        self.remove_networks(&record.docker_network, &mut report)
            .await;

        #[cfg(feature = "cli-viz")]
        teardown_sp.finish();

        self.unregister(&mut registry, id, &mut report).await;

        if let (true, Ok(path)) = (remove_files, contained) {
            if report.unregistered {
                match folder::remove_instance_dir(&path).await {
                    Ok(true) => report.removed_path = Some(path),
                    Ok(false) => {}
                    Err(e) => report.fail(DecommissionStep::RemoveFiles, e),
                }
            } else {
                report.fail(
                    DecommissionStep::RemoveFiles,
                    "skipped because the instance is still registered",
                );
            }
        }

        if report.is_clean() {
            tracing::info!("instance {} decommissioned", id);
        } else {
            tracing::warn!(
                "instance {} decommissioned with {} failed step(s)",
                id,
                report.failures.len()
            );
        }

        Ok(report)
    }

    /// Queries the live status of a registered instance.
    pub async fn query_status(&self, id: InstanceId) -> SupafleetResult<InstanceStatus> {
        let registry = self.store.load().await?;
        let record = registry.get(id).ok_or(SupafleetError::NotFound(id))?;
        Ok(self.live_status(&record.docker_network).await)
    }

    /// Lists every registered instance, ordered by id, with its live status.
    pub async fn list(&self) -> SupafleetResult<Vec<InstanceSummary>> {
        let registry = self.store.load().await?;

        let mut summaries = Vec::with_capacity(registry.len());
        for record in registry.records() {
            let status = self.live_status(&record.docker_network).await;
            summaries.push(InstanceSummary::new(record, status));
        }

        Ok(summaries)
    }

    /// Exports the connection details of one instance, or of all of them when `id` is `None`.
    /// Returns `None` for an unregistered id.
    pub async fn export_connection_info(
        &self,
        id: Option<InstanceId>,
    ) -> SupafleetResult<Option<ConnectionExport>> {
        let registry = self.store.load().await?;

        let export = match id {
            Some(id) => registry
                .get(id)
                .map(|record| ConnectionExport::Single(ConnectionInfo::from_record(record))),
            None => Some(ConnectionExport::All(
                registry
                    .records()
                    .into_iter()
                    .map(|record| {
                        (
                            record.instance_id.registry_key(),
                            ConnectionInfo::from_record(record),
                        )
                    })
                    .collect::<BTreeMap<_, _>>(),
            )),
        };

        Ok(export)
    }

    /// A compose file for an external service that joins the network of an instance.
    pub async fn external_service_template(
        &self,
        id: InstanceId,
        service: &str,
    ) -> SupafleetResult<String> {
        let registry = self.store.load().await?;
        let record = registry.get(id).ok_or(SupafleetError::NotFound(id))?;
        compose::external_service_template(record, service)
    }
}

impl InstanceManager {
    /// Runs every provisioning step that has side effects outside the registry.
    async fn prepare_instance(
        &self,
        id: InstanceId,
        instance_dir: &Path,
    ) -> SupafleetResult<(ResourceSet, SecretBundle)> {
        fs::create_dir_all(instance_dir).await?;
        let layout = InstanceLayout::new(instance_dir);

        #[cfg(feature = "cli-viz")]
        let fetch_sp = viz::create_spinner(FETCH_TEMPLATE_MSG.to_string(), None, None);

        let fetched = self.source.ensure_present(&layout.checkout_dir).await;

        #[cfg(feature = "cli-viz")]
        match &fetched {
            Ok(_) => fetch_sp.finish(),
            Err(_) => viz::finish_with_error(&fetch_sp),
        }

        fetched?;

        if !fs::try_exists(&layout.env_template).await.unwrap_or(false) {
            return Err(SupafleetError::TemplateMissing(layout.env_template));
        }

        let resources = config::allocate(id);
        let secrets = secrets::generate()?;

        #[cfg(feature = "cli-viz")]
        let write_sp = viz::create_spinner(WRITE_CONFIG_MSG.to_string(), None, None);

        let written = self.write_config(&layout, &resources, &secrets).await;

        #[cfg(feature = "cli-viz")]
        match &written {
            Ok(_) => write_sp.finish(),
            Err(_) => viz::finish_with_error(&write_sp),
        }

        written?;

        #[cfg(feature = "cli-viz")]
        let network_sp = viz::create_spinner(CREATE_NETWORK_MSG.to_string(), None, None);

        let network = self.ensure_network(&resources).await;

        #[cfg(feature = "cli-viz")]
        match &network {
            Ok(_) => network_sp.finish(),
            Err(_) => viz::finish_with_error(&network_sp),
        }

        network?;

        Ok((resources, secrets))
    }

    /// Renders `.env` and customizes the compose file of an instance.
    async fn write_config(
        &self,
        layout: &InstanceLayout,
        resources: &ResourceSet,
        secrets: &SecretBundle,
    ) -> SupafleetResult<()> {
        let env_template = fs::read_to_string(&layout.env_template).await?;
        let substitutions = template::build_env_substitutions(resources, secrets)?;
        let rendered = self.engine.render(&env_template, &substitutions);

        for placeholder in &rendered.missing {
            let key = placeholder.split('=').next().unwrap_or(placeholder);
            tracing::warn!(
                "{} default not found in {}; the template may have changed upstream",
                key,
                layout.env_template.display()
            );
        }

        let mut env = rendered.text;
        env.push_str(&template::env_trailer(resources, secrets));
        fs::write(&layout.env_file, env).await?;
        tracing::info!("wrote {}", layout.env_file.display());

        if !fs::try_exists(&layout.compose_file).await.unwrap_or(false) {
            return Err(SupafleetError::TemplateMissing(layout.compose_file.clone()));
        }

        let compose_text = fs::read_to_string(&layout.compose_file).await?;
        let customized = compose::customize_compose(&compose_text, resources)?;
        fs::write(&layout.compose_file, customized).await?;
        tracing::info!("customized {}", layout.compose_file.display());

        Ok(())
    }

    /// Creates the instance network unless it already exists.
    async fn ensure_network(&self, resources: &ResourceSet) -> SupafleetResult<()> {
        let name = &resources.docker_network;
        if !self.runtime.list_networks(name).await?.is_empty() {
            tracing::info!("docker network {} already exists", name);
            return Ok(());
        }

        let mut options = BTreeMap::new();
        options.insert(
            BRIDGE_NAME_OPTION.to_string(),
            resources.bridge_name.clone(),
        );

        self.runtime
            .create_network(name, NETWORK_DRIVER, &options)
            .await?;
        Ok(())
    }

    async fn compose_down(&self, instance_dir: &Path, report: &mut DecommissionReport) {
        let layout = InstanceLayout::new(instance_dir);
        if !fs::try_exists(&layout.compose_file).await.unwrap_or(false) {
            tracing::info!(
                "no compose file at {}, skipping compose down",
                layout.compose_file.display()
            );
            return;
        }

        if let Err(e) = self.runtime.compose_down(&layout.compose_dir).await {
            report.fail(DecommissionStep::ComposeDown, e);
        }
    }

    async fn remove_leftover_containers(&self, network: &str, report: &mut DecommissionReport) {
        let containers = match self.runtime.list_containers(network, true).await {
            Ok(containers) => containers,
            Err(e) => {
                report.fail(DecommissionStep::StopContainers, e);
                return;
            }
        };

        for container in containers {
            if container.is_running() {
                if let Err(e) = self
                    .runtime
                    .stop_container(&container, *self.config.get_stop_timeout())
                    .await
                {
                    report.fail(
                        DecommissionStep::StopContainers,
                        format!("{}: {}", container.name, e),
                    );
                }
            }

            match self.runtime.remove_container(&container).await {
                Ok(()) => report.removed_containers.push(container.name.clone()),
                Err(e) => report.fail(
                    DecommissionStep::RemoveContainers,
                    format!("{}: {}", container.name, e),
                ),
            }
        }
    }

    async fn remove_networks(&self, network: &str, report: &mut DecommissionReport) {
        let networks = match self.runtime.list_networks(network).await {
            Ok(networks) => networks,
            Err(e) => {
                report.fail(DecommissionStep::RemoveNetwork, e);
                return;
            }
        };

        for network in networks {
            match self.runtime.remove_network(&network).await {
                Ok(()) => report.removed_networks.push(network.name.clone()),
                Err(e) => report.fail(
                    DecommissionStep::RemoveNetwork,
                    format!("{}: {}", network.name, e),
                ),
            }
        }
    }

    async fn unregister(
        &self,
        registry: &mut Registry,
        id: InstanceId,
        report: &mut DecommissionReport,
    ) {
        if registry.remove(id).is_none() {
            return;
        }

        match self.store.save(registry).await {
            Ok(()) => report.unregistered = true,
            Err(e) => report.fail(DecommissionStep::Unregister, e),
        }
    }

    async fn live_status(&self, network: &str) -> InstanceStatus {
        match self.runtime.list_containers(network, true).await {
            Ok(containers) if containers.iter().any(|c| c.is_running()) => InstanceStatus::Running,
            Ok(containers) if !containers.is_empty() => InstanceStatus::Stopped,
            Ok(_) => InstanceStatus::Configured,
            Err(e) => {
                tracing::debug!("could not query containers on {}: {}", network, e);
                InstanceStatus::Unknown
            }
        }
    }

    /// The directory of a record, falling back to the base folder for records without a path.
    fn record_dir(&self, record: &InstanceRecord) -> PathBuf {
        if !record.path.as_os_str().is_empty() {
            return record.path.clone();
        }

        let folder_name = if record.folder_name.is_empty() {
            record.instance_id.registry_key()
        } else {
            record.folder_name.clone()
        };
        self.config.instance_dir(&folder_name)
    }
}

impl DecommissionReport {
    /// Whether every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, step: DecommissionStep, error: impl fmt::Display) {
        tracing::warn!("{} failed: {}", step, error);
        self.failures.push(DecommissionFailure {
            step,
            message: error.to_string(),
        });
    }
}

impl ProvisionOutcome {
    /// Whether the instance was provisioned.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl InstanceSummary {
    fn new(record: &InstanceRecord, status: InstanceStatus) -> Self {
        Self {
            instance_id: record.instance_id,
            name: record.name.clone(),
            description: record.description.clone(),
            tags: record.tags.iter().cloned().collect(),
            status,
            folder_name: record.folder_name.clone(),
            docker_network: record.docker_network.clone(),
            supabase_url: record.supabase_url.clone(),
            postgres_port: record.postgres_port,
            created_at: record.created_at,
            config_stale: record.config_stale,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for DecommissionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::ComposeDown => "compose down",
            Self::StopContainers => "stop containers",
            Self::RemoveContainers => "remove containers",
            Self::RemoveNetwork => "remove network",
            Self::Unregister => "unregister",
            Self::RemoveFiles => "remove files",
        };
        write!(f, "{}", step)
    }
}
