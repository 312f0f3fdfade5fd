//! Deterministic resource allocation per instance.
//!
//! Every instance owns a block of [`PORT_BLOCK_SIZE`] host ports starting at
//! `PORT_BLOCK_BASE + id * PORT_BLOCK_SIZE`. Each logical service takes a fixed slot inside the
//! block, so blocks of distinct ids never overlap and every port grows strictly with the id.
//!
//! Changing any of these constants after instances have been provisioned invalidates the derived
//! fields cached in the registry.

use serde::{Deserialize, Serialize};

use super::{InstanceId, MAX_INSTANCE_ID};
use crate::SupafleetResult;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// First port of the block owned by instance 0 (which is never allocated).
pub const PORT_BLOCK_BASE: u16 = 20000;

/// Number of ports reserved per instance. Slots 6..9 are unused.
pub const PORT_BLOCK_SIZE: u16 = 10;

/// Database name used by every instance. Each instance runs its own postgres container, and the
/// bundled services expect the default database name.
pub const DATABASE_NAME: &str = "postgres";

/// Placeholder substituted with the database password in [`ResourceSet::postgres_url_template`].
pub const POSTGRES_PASSWORD_PLACEHOLDER: &str = "{POSTGRES_PASSWORD}";

/// Host that published ports are reachable on.
pub const LOCALHOST: &str = "localhost";

/// Driver used for instance networks.
pub const NETWORK_DRIVER: &str = "bridge";

/// Docker option naming the bridge interface of an instance network.
pub const BRIDGE_NAME_OPTION: &str = "com.docker.network.bridge.name";

const _: () = assert!(
    PORT_BLOCK_BASE as u32 + (MAX_INSTANCE_ID + 1) * PORT_BLOCK_SIZE as u32 <= u16::MAX as u32
);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Position of a logical service inside an instance's port block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PortSlot {
    /// Kong HTTP gateway.
    KongHttp = 0,

    /// Kong HTTPS gateway.
    KongHttps = 1,

    /// Postgres.
    Postgres = 2,

    /// Studio dashboard.
    Studio = 3,

    /// Logflare analytics.
    Analytics = 4,

    /// Supavisor transaction pooler.
    Pooler = 5,
}

/// The host ports of one instance, keyed by logical service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortMap {
    /// Kong HTTP gateway port.
    pub kong_http: u16,

    /// Kong HTTPS gateway port.
    pub kong_https: u16,

    /// Postgres port.
    pub postgres: u16,

    /// Studio port.
    pub studio: u16,

    /// Analytics port.
    pub analytics: u16,

    /// Pooler port.
    pub pooler: u16,
}

/// Everything derived from an instance id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSet {
    /// The instance the resources belong to.
    pub instance_id: InstanceId,

    /// Host ports.
    pub ports: PortMap,

    /// Name of the instance's docker network.
    pub docker_network: String,

    /// Name of the bridge interface backing the network.
    pub bridge_name: String,

    /// Database name.
    pub database_name: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PortMap {
    /// Returns every port with its service name.
    pub fn entries(&self) -> [(&'static str, u16); 6] {
        [
            ("kong_http", self.kong_http),
            ("kong_https", self.kong_https),
            ("postgres", self.postgres),
            ("studio", self.studio),
            ("analytics", self.analytics),
            ("pooler", self.pooler),
        ]
    }
}

impl ResourceSet {
    /// Database port of the instance.
    pub fn database_port(&self) -> u16 {
        self.ports.postgres
    }

    /// Public API URL served by the gateway.
    pub fn supabase_url(&self) -> String {
        format!("http://{}:{}", LOCALHOST, self.ports.kong_http)
    }

    /// Database URL with a [`POSTGRES_PASSWORD_PLACEHOLDER`] in place of the password.
    pub fn postgres_url_template(&self) -> String {
        format!(
            "postgresql://postgres:{}@{}:{}/{}",
            POSTGRES_PASSWORD_PLACEHOLDER, LOCALHOST, self.ports.postgres, self.database_name
        )
    }

    /// Database URL with the real password.
    pub fn postgres_url(&self, password: &str) -> String {
        interpolate_password(&self.postgres_url_template(), password)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Derives the resources of an instance.
pub fn allocate(instance_id: InstanceId) -> ResourceSet {
    let block = PORT_BLOCK_BASE + instance_id.get() as u16 * PORT_BLOCK_SIZE;
    let port = |slot: PortSlot| block + slot as u16;

    ResourceSet {
        instance_id,
        ports: PortMap {
            kong_http: port(PortSlot::KongHttp),
            kong_https: port(PortSlot::KongHttps),
            postgres: port(PortSlot::Postgres),
            studio: port(PortSlot::Studio),
            analytics: port(PortSlot::Analytics),
            pooler: port(PortSlot::Pooler),
        },
        docker_network: network_name(instance_id),
        bridge_name: format!("supabase-br{}", instance_id),
        database_name: DATABASE_NAME.to_string(),
    }
}

/// Validates a raw id and derives its resources.
pub fn try_allocate(raw_id: i64) -> SupafleetResult<ResourceSet> {
    InstanceId::new(raw_id).map(allocate)
}

/// Returns the docker network name of an instance.
pub fn network_name(instance_id: InstanceId) -> String {
    format!("supabase-instance{}-network", instance_id)
}

/// Replaces the password placeholder of a templated database URL.
pub fn interpolate_password(url_template: &str, password: &str) -> String {
    url_template.replace(POSTGRES_PASSWORD_PLACEHOLDER, password)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
