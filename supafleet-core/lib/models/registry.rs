//! The persisted registry of instances and their networks.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::PathBuf,
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::{timestamp, SecretBundle};
use crate::{
    config::{self, InstanceId, PortMap, ResourceSet},
    SupafleetError,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Schema version written by this crate.
pub const REGISTRY_VERSION: &str = "1.1";

/// Schema version assumed when a registry carries none.
pub const LEGACY_REGISTRY_VERSION: &str = "1.0";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The status of an instance as seen by the container runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Registered, no containers exist on its network.
    #[default]
    Configured,

    /// At least one container on its network is running.
    Running,

    /// Containers exist on its network but none are running.
    Stopped,

    /// The runtime could not be queried.
    #[serde(other)]
    Unknown,
}

/// Operator supplied metadata of an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct InstanceMetadata {
    /// Human readable name. Also used to build the folder name.
    #[builder(default, setter(into, strip_option))]
    pub name: Option<String>,

    /// Free-form description.
    #[builder(default, setter(into, strip_option))]
    pub description: Option<String>,

    /// Tags used for grouping.
    #[builder(default)]
    pub tags: Vec<String>,
}

/// One provisioned instance.
///
/// `docker_network`, `ports`, `kong_http_port`, `postgres_port`, `database_name`,
/// `supabase_url` and `postgres_url` are a cache of [`config::allocate`]; see
/// [`InstanceRecord::refresh_derived`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// The instance id.
    pub instance_id: InstanceId,

    /// Human readable name.
    #[serde(default)]
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Tags used for grouping.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Status at registration time. Live status comes from the runtime.
    #[serde(default)]
    pub status: InstanceStatus,

    /// When the instance was registered.
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the record last changed.
    #[serde(
        default,
        with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,

    /// Name of the instance directory inside the base folder.
    #[serde(default)]
    pub folder_name: String,

    /// Absolute path of the instance directory.
    #[serde(default)]
    pub path: PathBuf,

    /// Docker network of the instance.
    #[serde(default)]
    pub docker_network: String,

    /// Host ports of the instance.
    #[serde(default)]
    pub ports: PortMap,

    /// Gateway HTTP port, duplicated from `ports` for older readers.
    #[serde(default)]
    pub kong_http_port: u16,

    /// Database port, duplicated from `ports` for older readers.
    #[serde(default)]
    pub postgres_port: u16,

    /// Database name.
    #[serde(default)]
    pub database_name: String,

    /// Public API URL.
    #[serde(default)]
    pub supabase_url: String,

    /// Database URL with a `{POSTGRES_PASSWORD}` placeholder.
    #[serde(default)]
    pub postgres_url: String,

    /// Generated credentials.
    #[serde(default)]
    pub secrets: SecretBundle,

    /// Set when the cached ports or URLs were repaired on load. The files on disk still bind
    /// the old values until the configuration is regenerated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub config_stale: bool,
}

/// The network created for an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// Network name.
    pub name: String,

    /// The owning instance.
    pub instance_id: InstanceId,

    /// When the network was registered.
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// All known instances and networks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    /// Instances keyed by `instance<id>`.
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceRecord>,

    /// Networks keyed by name.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkRecord>,

    /// When the registry was last saved.
    #[serde(default, with = "timestamp")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Schema version.
    #[serde(default = "legacy_version")]
    pub version: String,

    /// Instance entries that could not be read, kept verbatim under their original keys.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unparsed_instances: BTreeMap<String, serde_json::Value>,

    /// Network entries that could not be read, kept verbatim under their original keys.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unparsed_networks: BTreeMap<String, serde_json::Value>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl InstanceRecord {
    /// Builds the record of a freshly provisioned instance.
    pub fn new(
        resources: &ResourceSet,
        metadata: &InstanceMetadata,
        folder_name: String,
        path: PathBuf,
        secrets: SecretBundle,
    ) -> Self {
        let id = resources.instance_id;
        let mut record = Self {
            instance_id: id,
            name: metadata
                .name
                .clone()
                .unwrap_or_else(|| default_name(id)),
            description: metadata
                .description
                .clone()
                .unwrap_or_else(|| default_description(id)),
            tags: metadata.tags.iter().cloned().collect(),
            status: InstanceStatus::Configured,
            created_at: Some(Utc::now()),
            updated_at: None,
            folder_name,
            path,
            docker_network: String::new(),
            ports: PortMap::default(),
            kong_http_port: 0,
            postgres_port: 0,
            database_name: String::new(),
            supabase_url: String::new(),
            postgres_url: String::new(),
            secrets,
            config_stale: false,
        };

        record.apply_resources(resources);
        record
    }

    /// Re-derives the cached fields from the instance id.
    ///
    /// Returns the names of the fields that had drifted and marks the record's configuration as
    /// stale when any did. Empty names and descriptions are filled with their defaults as well.
    pub fn refresh_derived(&mut self) -> Vec<&'static str> {
        let resources = config::allocate(self.instance_id);
        let mut drifted = Vec::new();

        if self.docker_network != resources.docker_network {
            drifted.push("docker_network");
        }
        if self.ports != resources.ports {
            drifted.push("ports");
        }
        if self.kong_http_port != resources.ports.kong_http {
            drifted.push("kong_http_port");
        }
        if self.postgres_port != resources.ports.postgres {
            drifted.push("postgres_port");
        }
        if self.database_name != resources.database_name {
            drifted.push("database_name");
        }
        if self.supabase_url != resources.supabase_url() {
            drifted.push("supabase_url");
        }
        if self.postgres_url != resources.postgres_url_template() {
            drifted.push("postgres_url");
        }

        self.apply_resources(&resources);
        if !drifted.is_empty() {
            self.config_stale = true;
        }

        if self.name.is_empty() {
            self.name = default_name(self.instance_id);
        }
        if self.description.is_empty() {
            self.description = default_description(self.instance_id);
        }

        drifted
    }

    /// The resources of this instance.
    pub fn resources(&self) -> ResourceSet {
        config::allocate(self.instance_id)
    }

    fn apply_resources(&mut self, resources: &ResourceSet) {
        self.docker_network = resources.docker_network.clone();
        self.ports = resources.ports;
        self.kong_http_port = resources.ports.kong_http;
        self.postgres_port = resources.ports.postgres;
        self.database_name = resources.database_name.clone();
        self.supabase_url = resources.supabase_url();
        self.postgres_url = resources.postgres_url_template();
    }
}

impl NetworkRecord {
    /// Builds the network record of an instance.
    pub fn new(resources: &ResourceSet) -> Self {
        Self {
            name: resources.docker_network.clone(),
            instance_id: resources.instance_id,
            created_at: Some(Utc::now()),
        }
    }
}

impl Registry {
    /// Returns the record of an instance.
    pub fn get(&self, id: InstanceId) -> Option<&InstanceRecord> {
        self.instances.get(&id.registry_key())
    }

    /// Returns the mutable record of an instance.
    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut InstanceRecord> {
        self.instances.get_mut(&id.registry_key())
    }

    /// Whether an instance is registered.
    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id.registry_key())
    }

    /// Registers an instance and its network.
    pub fn insert(&mut self, record: InstanceRecord, network: NetworkRecord) {
        self.networks.insert(network.name.clone(), network);
        self.instances
            .insert(record.instance_id.registry_key(), record);
    }

    /// Unregisters an instance and every network it owns.
    ///
    /// A network record carrying the instance's network name but owned by another id is left in
    /// place and logged.
    pub fn remove(&mut self, id: InstanceId) -> Option<(InstanceRecord, Vec<NetworkRecord>)> {
        let record = self.instances.remove(&id.registry_key())?;

        if let Some(network) = self.networks.get(&record.docker_network) {
            if network.instance_id != id {
                tracing::warn!(
                    "network record {} is owned by instance {}, not {}; leaving it in place",
                    network.name,
                    network.instance_id,
                    id
                );
            }
        }

        let owned: Vec<String> = self
            .networks
            .iter()
            .filter(|(_, network)| network.instance_id == id)
            .map(|(name, _)| name.clone())
            .collect();

        let networks = owned
            .iter()
            .filter_map(|name| self.networks.remove(name))
            .collect();

        Some((record, networks))
    }

    /// Instance records ordered by id.
    pub fn records(&self) -> Vec<&InstanceRecord> {
        let mut records: Vec<&InstanceRecord> = self.instances.values().collect();
        records.sort_by_key(|record| record.instance_id);
        records
    }

    /// Network records without a registered owner.
    pub fn orphaned_networks(&self) -> Vec<&NetworkRecord> {
        self.networks
            .values()
            .filter(|network| !self.contains(network.instance_id))
            .collect()
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether no instance is registered.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for Registry {
    fn default() -> Self {
        Self {
            instances: BTreeMap::new(),
            networks: BTreeMap::new(),
            last_updated: None,
            version: REGISTRY_VERSION.to_string(),
            unparsed_instances: BTreeMap::new(),
            unparsed_networks: BTreeMap::new(),
        }
    }
}

impl InstanceStatus {
    /// The status as written in the registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = SupafleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "configured" => Ok(Self::Configured),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "unknown" => Ok(Self::Unknown),
            _ => Err(SupafleetError::InvalidArgument(format!(
                "invalid instance status: {}",
                s
            ))),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn legacy_version() -> String {
    LEGACY_REGISTRY_VERSION.to_string()
}

fn default_name(id: InstanceId) -> String {
    format!("Instance {}", id)
}

fn default_description(id: InstanceId) -> String {
    format!("Supabase instance {}", id)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
