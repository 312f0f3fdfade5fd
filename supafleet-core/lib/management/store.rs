//! Persistence of the instance registry.
//!
//! The registry is a single JSON document. [`FileRegistryStore`] keeps it next to the instance
//! directories and writes it atomically, keeping a `.backup` copy of the previous version.
//! [`MemoryRegistryStore`] keeps the same document in memory.
//!
//! Both stores share the loader: unknown keys are ignored, missing or null keys take their
//! defaults and the fields derived from the instance id are re-derived, with a warning for every
//! drifted record. An entry that cannot be read is set aside instead of failing the whole load.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use supafleet_utils::{
    INSTANCE_PREFIX, REGISTRY_BACKUP_SUFFIX, REGISTRY_CORRUPT_SUFFIX, REGISTRY_TMP_SUFFIX,
};
use tokio::{fs, sync::Mutex};

use crate::{
    models::{InstanceRecord, NetworkRecord, Registry, REGISTRY_VERSION},
    SupafleetError, SupafleetResult,
};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Loads and saves the registry.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Loads the registry, returning a fresh one when nothing usable is stored.
    async fn load(&self) -> SupafleetResult<Registry>;

    /// Stamps `last_updated` and persists the registry.
    async fn save(&self, registry: &mut Registry) -> SupafleetResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A registry kept in a JSON file.
#[derive(Debug, Clone)]
pub struct FileRegistryStore {
    path: PathBuf,
}

/// A registry kept in memory as a serialized document.
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    document: Mutex<Option<String>>,
    saves: AtomicUsize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FileRegistryStore {
    /// Creates a store for the registry file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the copy of the previous registry.
    pub fn backup_path(&self) -> PathBuf {
        self.sibling(REGISTRY_BACKUP_SUFFIX)
    }

    fn tmp_path(&self) -> PathBuf {
        self.sibling(REGISTRY_TMP_SUFFIX)
    }

    fn corrupt_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        self.sibling(&format!("{}-{}", REGISTRY_CORRUPT_SUFFIX, stamp))
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// Moves an unusable registry file aside so the next save does not overwrite it.
    async fn quarantine(&self, reason: &str) -> SupafleetResult<()> {
        let target = self.corrupt_path();
        tracing::error!(
            "registry {} is unusable ({}); moving it to {}",
            self.path.display(),
            reason,
            target.display()
        );

        fs::rename(&self.path, &target).await.map_err(|e| {
            persistence_error(
                format!("could not move unusable registry to {}", target.display()),
                e,
            )
        })
    }
}

impl MemoryRegistryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding an existing document.
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
            saves: AtomicUsize::new(0),
        }
    }

    /// The stored document, if any.
    pub async fn document(&self) -> Option<String> {
        self.document.lock().await.clone()
    }

    /// How many times the registry has been saved.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn load(&self) -> SupafleetResult<Registry> {
        let exists = fs::try_exists(&self.path).await.unwrap_or(false);
        if !exists {
            tracing::debug!(
                "no registry at {}, starting empty",
                self.path.display()
            );
            return Ok(Registry::default());
        }

        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) => {
                self.quarantine(&e.to_string()).await?;
                return Ok(Registry::default());
            }
        };

        match parse_registry(&text) {
            Ok(registry) => {
                tracing::debug!(
                    "loaded {} instance(s) from {}",
                    registry.len(),
                    self.path.display()
                );
                Ok(registry)
            }
            Err(e) => {
                self.quarantine(&e.to_string()).await?;
                Ok(Registry::default())
            }
        }
    }

    async fn save(&self, registry: &mut Registry) -> SupafleetResult<()> {
        stamp(registry);
        let document = serialize_registry(registry)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                persistence_error(format!("could not create {}", parent.display()), e)
            })?;
        }

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup).await.map_err(|e| {
                persistence_error(format!("could not back up to {}", backup.display()), e)
            })?;
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, document.as_bytes())
            .await
            .map_err(|e| persistence_error(format!("could not write {}", tmp.display()), e))?;

        fs::rename(&tmp, &self.path).await.map_err(|e| {
            persistence_error(format!("could not replace {}", self.path.display()), e)
        })?;

        tracing::debug!(
            "saved {} instance(s) to {}",
            registry.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn load(&self) -> SupafleetResult<Registry> {
        let document = self.document.lock().await;
        match document.as_deref() {
            None => Ok(Registry::default()),
            Some(text) => match parse_registry(text) {
                Ok(registry) => Ok(registry),
                Err(e) => {
                    tracing::error!("stored registry is unusable ({}); starting empty", e);
                    Ok(Registry::default())
                }
            },
        }
    }

    async fn save(&self, registry: &mut Registry) -> SupafleetResult<()> {
        stamp(registry);
        let text = serialize_registry(registry)?;
        *self.document.lock().await = Some(text);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Parses a registry document and repairs the cached fields of every record.
///
/// Entries are read one at a time. An entry that cannot be read is logged and kept verbatim in
/// [`Registry::unparsed_instances`] or [`Registry::unparsed_networks`] so the next save writes it
/// back unchanged. Only a document that is not a JSON object at all is an error.
pub(crate) fn parse_registry(text: &str) -> SupafleetResult<Registry> {
    let mut document: Value = serde_json::from_str(text)?;
    let mut raw_instances = take_section(&mut document, "instances");
    raw_instances.extend(take_section(&mut document, "unparsed_instances"));
    let mut raw_networks = take_section(&mut document, "networks");
    raw_networks.extend(take_section(&mut document, "unparsed_networks"));

    let mut registry: Registry = serde_json::from_value(document)?;

    for (key, value) in raw_instances {
        let mut record = match instance_from_value(&key, value.clone()) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("keeping unreadable instance entry {} as is: {}", key, e);
                registry.unparsed_instances.insert(key, value);
                continue;
            }
        };

        let canonical = record.instance_id.registry_key();
        if registry.instances.contains_key(&canonical) {
            tracing::error!(
                "registry entry {} duplicates instance {}; keeping it as is",
                key,
                record.instance_id
            );
            registry.unparsed_instances.insert(key, value);
            continue;
        }

        if key != canonical {
            tracing::warn!(
                "registry entry {} holds instance {}; re-keying it as {}",
                key,
                record.instance_id,
                canonical
            );
        }

        let drifted = record.refresh_derived();
        if !drifted.is_empty() {
            tracing::warn!(
                "instance {} had drifted derived fields ({}); run `supafleet update-env --instance {}` \
                 to rewrite its configuration files",
                record.instance_id,
                drifted.join(", "),
                record.instance_id
            );
        }

        registry.instances.insert(canonical, record);
    }

    for (key, value) in raw_networks {
        match network_from_value(&key, value.clone()) {
            Ok(network) => {
                registry.networks.insert(key, network);
            }
            Err(e) => {
                tracing::error!("keeping unreadable network entry {} as is: {}", key, e);
                registry.unparsed_networks.insert(key, value);
            }
        }
    }

    for network in registry.orphaned_networks() {
        tracing::warn!(
            "network record {} belongs to unregistered instance {}",
            network.name,
            network.instance_id
        );
    }

    Ok(registry)
}

/// Removes a keyed section from the document. A section that is not an object is returned as a
/// single entry under the section's own name so it is preserved as unreadable.
fn take_section(document: &mut Value, section: &str) -> Vec<(String, Value)> {
    let Some(fields) = document.as_object_mut() else {
        return Vec::new();
    };

    match fields.remove(section) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(entries)) => entries.into_iter().collect(),
        Some(other) => {
            tracing::error!("registry section {} is not an object", section);
            vec![(section.to_string(), other)]
        }
    }
}

fn instance_from_value(key: &str, mut value: Value) -> Result<InstanceRecord, String> {
    let Value::Object(fields) = &mut value else {
        return Err("not an object".to_string());
    };

    strip_nulls(fields);
    if !fields.contains_key("instance_id") {
        let id = key
            .strip_prefix(INSTANCE_PREFIX)
            .and_then(|raw| raw.parse::<u32>().ok())
            .ok_or_else(|| "no instance_id and the key does not name one".to_string())?;
        fields.insert("instance_id".to_string(), Value::from(id));
    }

    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn network_from_value(key: &str, mut value: Value) -> Result<NetworkRecord, String> {
    let Value::Object(fields) = &mut value else {
        return Err("not an object".to_string());
    };

    strip_nulls(fields);
    fields
        .entry("name")
        .or_insert_with(|| Value::from(key.to_string()));

    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Drops null fields, recursively, so they take their defaults.
fn strip_nulls(fields: &mut Map<String, Value>) {
    fields.retain(|_, field| !field.is_null());
    for field in fields.values_mut() {
        if let Value::Object(nested) = field {
            strip_nulls(nested);
        }
    }
}

fn serialize_registry(registry: &Registry) -> SupafleetResult<String> {
    serde_json::to_string_pretty(registry)
        .map_err(|e| SupafleetError::Persistence(format!("could not serialize registry: {}", e)))
}

fn stamp(registry: &mut Registry) {
    registry.last_updated = Some(Utc::now());
    registry.version = REGISTRY_VERSION.to_string();
}

fn persistence_error(context: String, error: std::io::Error) -> SupafleetError {
    SupafleetError::Persistence(format!("{}: {}", context, error))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
