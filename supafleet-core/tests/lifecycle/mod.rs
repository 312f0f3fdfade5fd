//! End to end lifecycle tests against a fake container runtime and template source.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use supafleet_core::{
    config::{InstanceId, ManagerConfig, ENV_PLACEHOLDERS},
    management::{
        secrets, DecommissionStep, FileRegistryStore, InstanceManager, MemoryRegistryStore,
        RegistryStore,
    },
    models::{ConnectionExport, InstanceMetadata, InstanceStatus},
    runtime::{ContainerInfo, ContainerRuntime, ContainerState, NetworkInfo, TemplateSource},
    SupafleetError, SupafleetResult,
};
use tempfile::TempDir;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const COMPOSE_TEMPLATE: &str = "\
name: supabase

services:
  db:
    container_name: supabase-db
    image: supabase/postgres
  studio:
    container_name: supabase-studio
    image: supabase/studio

networks:
  default:
    driver: bridge
";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Default)]
struct FakeRuntime {
    networks: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    containers: Mutex<Vec<(String, ContainerInfo)>>,
    calls: Mutex<Vec<String>>,
    fail_queries: AtomicBool,
    fail_create_network: AtomicBool,
    fail_compose_down: AtomicBool,
    fail_remove_container: AtomicBool,
}

#[derive(Default)]
struct FakeTemplateSource {
    fail: AtomicBool,
}

struct Harness {
    _dir: TempDir,
    base: PathBuf,
    runtime: Arc<FakeRuntime>,
    source: Arc<FakeTemplateSource>,
    store: Arc<FileRegistryStore>,
    manager: InstanceManager,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FakeRuntime {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn add_container(&self, network: &str, name: &str, state: ContainerState) {
        self.containers.lock().unwrap().push((
            network.to_string(),
            ContainerInfo {
                id: format!("id-{}", name),
                name: name.to_string(),
                state,
            },
        ));
    }

    fn has_network(&self, name: &str) -> bool {
        self.networks.lock().unwrap().contains_key(name)
    }

    fn check_queries(&self) -> SupafleetResult<()> {
        check(&self.fail_queries, "cannot connect to the docker daemon")
    }
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("database");
        let config = ManagerConfig::new(Some(base.clone()))
            .with_stop_timeout(Duration::from_secs(1));

        let runtime = Arc::new(FakeRuntime::default());
        let source = Arc::new(FakeTemplateSource::default());
        let store = Arc::new(FileRegistryStore::new(config.registry_path()));

        let manager = InstanceManager::builder()
            .store(store.clone())
            .runtime(runtime.clone())
            .source(source.clone())
            .config(config)
            .build();

        Self {
            _dir: dir,
            base,
            runtime,
            source,
            store,
            manager,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_networks(&self, name: &str) -> SupafleetResult<Vec<NetworkInfo>> {
        self.record(format!("list_networks {}", name));
        self.check_queries()?;

        let networks = self.networks.lock().unwrap();
        Ok(networks
            .keys()
            .filter(|network| network.as_str() == name)
            .map(|network| NetworkInfo {
                id: format!("net-{}", network),
                name: network.clone(),
                driver: "bridge".to_string(),
            })
            .collect())
    }

    async fn create_network(
        &self,
        name: &str,
        driver: &str,
        options: &BTreeMap<String, String>,
    ) -> SupafleetResult<NetworkInfo> {
        self.record(format!("create_network {}", name));
        check(&self.fail_create_network, "pool overlaps with other one on this address space")?;
        self.networks
            .lock()
            .unwrap()
            .insert(name.to_string(), options.clone());

        Ok(NetworkInfo {
            id: format!("net-{}", name),
            name: name.to_string(),
            driver: driver.to_string(),
        })
    }

    async fn remove_network(&self, network: &NetworkInfo) -> SupafleetResult<()> {
        self.record(format!("remove_network {}", network.name));
        self.networks.lock().unwrap().remove(&network.name);
        Ok(())
    }

    async fn list_containers(
        &self,
        network: &str,
        include_stopped: bool,
    ) -> SupafleetResult<Vec<ContainerInfo>> {
        self.record(format!("list_containers {}", network));
        self.check_queries()?;

        let containers = self.containers.lock().unwrap();
        Ok(containers
            .iter()
            .filter(|(net, container)| {
                net == network && (include_stopped || container.is_running())
            })
            .map(|(_, container)| container.clone())
            .collect())
    }

    async fn stop_container(
        &self,
        container: &ContainerInfo,
        _timeout: Duration,
    ) -> SupafleetResult<()> {
        self.record(format!("stop_container {}", container.name));
        let mut containers = self.containers.lock().unwrap();
        for (_, existing) in containers.iter_mut() {
            if existing.id == container.id {
                existing.state = ContainerState::Exited;
            }
        }
        Ok(())
    }

    async fn remove_container(&self, container: &ContainerInfo) -> SupafleetResult<()> {
        self.record(format!("remove_container {}", container.name));
        check(&self.fail_remove_container, "removal of container is already in progress")?;
        self.containers
            .lock()
            .unwrap()
            .retain(|(_, existing)| existing.id != container.id);
        Ok(())
    }

    async fn compose_down(&self, compose_dir: &Path) -> SupafleetResult<()> {
        self.record(format!("compose_down {}", compose_dir.display()));
        check(&self.fail_compose_down, "compose exited with status 1")
    }
}

#[async_trait]
impl TemplateSource for FakeTemplateSource {
    async fn ensure_present(&self, target_dir: &Path) -> SupafleetResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SupafleetError::ExternalTool(
                "could not resolve host: github.com".to_string(),
            ));
        }

        let docker_dir = target_dir.join("docker");
        std::fs::create_dir_all(&docker_dir)?;

        let mut env: Vec<String> = ENV_PLACEHOLDERS
            .iter()
            .map(|entry| entry.placeholder())
            .collect();
        env.push("ENABLE_EMAIL_SIGNUP=true".to_string());
        std::fs::write(docker_dir.join(".env.example"), env.join("\n") + "\n")?;
        std::fs::write(docker_dir.join("docker-compose.yml"), COMPOSE_TEMPLATE)?;

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn id(raw: i64) -> InstanceId {
    InstanceId::new(raw).unwrap()
}

fn check(flag: &AtomicBool, message: &str) -> SupafleetResult<()> {
    if flag.load(Ordering::SeqCst) {
        return Err(SupafleetError::ExternalTool(message.to_string()));
    }
    Ok(())
}

async fn tamper_path(h: &Harness, raw: i64, path: &str) {
    let mut registry = h.store.load().await.unwrap();
    registry.get_mut(id(raw)).unwrap().path = PathBuf::from(path);
    h.store.save(&mut registry).await.unwrap();
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_provision_then_list() {
    let h = Harness::new();
    let metadata = InstanceMetadata::builder()
        .name("Shop Backend")
        .tags(vec!["prod".to_string()])
        .build();

    let record = h.manager.provision(id(1), &metadata).await.unwrap();
    assert_eq!(record.name, "Shop Backend");
    assert_eq!(record.folder_name, "shop-backend-instance1");
    assert_eq!(record.path, h.base.join("shop-backend-instance1"));
    assert_eq!(record.ports.kong_http, 20010);
    secrets::verify(&record.secrets).unwrap();

    let docker_dir = record.path.join("supabase/docker");
    let env = std::fs::read_to_string(docker_dir.join(".env")).unwrap();
    assert!(env.contains(&format!(
        "POSTGRES_PASSWORD={}\n",
        record.secrets.postgres_password
    )));
    assert!(env.contains("POSTGRES_PORT=20012\n"));
    assert!(env.contains("INSTANCE_ID=1\n"));
    assert!(env.contains("ENABLE_EMAIL_SIGNUP=true\n"));

    let compose = std::fs::read_to_string(docker_dir.join("docker-compose.yml")).unwrap();
    assert!(compose.contains("name: supabase-instance1\n"));
    assert!(compose.contains("container_name: supabase-instance1-db\n"));
    assert!(compose.contains("    name: supabase-instance1-network\n    external: true\n"));

    assert!(h.runtime.has_network("supabase-instance1-network"));
    let options = h.runtime.networks.lock().unwrap()["supabase-instance1-network"].clone();
    assert_eq!(
        options.get("com.docker.network.bridge.name").map(String::as_str),
        Some("supabase-br1")
    );

    let summaries = h.manager.list().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].instance_id, id(1));
    assert_eq!(summaries[0].status, InstanceStatus::Configured);
    assert_eq!(summaries[0].tags, vec!["prod".to_string()]);

    let registry = h.store.load().await.unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.networks.len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_provision_reuses_existing_network() {
    let h = Harness::new();
    h.runtime
        .networks
        .lock()
        .unwrap()
        .insert("supabase-instance2-network".to_string(), BTreeMap::new());

    h.manager
        .provision(id(2), &InstanceMetadata::default())
        .await
        .unwrap();

    assert!(!h
        .runtime
        .calls()
        .iter()
        .any(|call| call.starts_with("create_network")));
}

#[test_log::test(tokio::test)]
async fn test_double_provision_is_rejected() {
    let h = Harness::new();
    let metadata = InstanceMetadata::default();

    h.manager.provision(id(3), &metadata).await.unwrap();
    let calls = h.runtime.call_count();

    let second = h.manager.provision(id(3), &metadata).await;
    assert!(matches!(second, Err(SupafleetError::AlreadyExists(i)) if i == id(3)));
    assert_eq!(h.runtime.call_count(), calls);
    assert_eq!(h.store.load().await.unwrap().len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_failed_fetch_registers_nothing() {
    let h = Harness::new();
    h.source.fail.store(true, Ordering::SeqCst);

    let result = h.manager.provision(id(4), &InstanceMetadata::default()).await;
    assert!(matches!(result, Err(SupafleetError::ExternalTool(_))));
    assert!(h.store.load().await.unwrap().is_empty());
    assert!(!h.runtime.has_network("supabase-instance4-network"));
}

#[test_log::test(tokio::test)]
async fn test_failed_network_registers_nothing() {
    let h = Harness::new();
    h.runtime.fail_create_network.store(true, Ordering::SeqCst);

    let result = h.manager.provision(id(4), &InstanceMetadata::default()).await;
    assert!(matches!(result, Err(SupafleetError::ExternalTool(_))));
    assert!(h.store.load().await.unwrap().is_empty());
    assert!(!h.runtime.has_network("supabase-instance4-network"));

    h.runtime.fail_create_network.store(false, Ordering::SeqCst);
    h.manager
        .provision(id(4), &InstanceMetadata::default())
        .await
        .unwrap();
    assert!(h.store.load().await.unwrap().contains(id(4)));
}

#[test_log::test(tokio::test)]
async fn test_batch_continues_after_failure() {
    let h = Harness::new();
    h.manager
        .provision(id(1), &InstanceMetadata::default())
        .await
        .unwrap();

    let metadata = InstanceMetadata::builder().name("ignored").build();
    let outcomes = h
        .manager
        .provision_many(&[id(1), id(2), id(3)], &metadata)
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(
        outcomes[0].result,
        Err(SupafleetError::AlreadyExists(_))
    ));
    assert!(outcomes[1].is_success());
    assert!(outcomes[2].is_success());

    let second = outcomes[1].result.as_ref().unwrap();
    assert_eq!(second.name, "Instance 2");
    assert_eq!(second.folder_name, "instance2");
    assert_eq!(h.store.load().await.unwrap().len(), 3);
}

#[test_log::test(tokio::test)]
async fn test_update_metadata() {
    let h = Harness::new();

    assert!(!h.manager.update_metadata(id(9), "ghost", None).await.unwrap());
    assert!(h.store.load().await.unwrap().is_empty());

    h.manager
        .provision(id(9), &InstanceMetadata::default())
        .await
        .unwrap();
    assert!(h
        .manager
        .update_metadata(id(9), "Analytics", Some("reporting db"))
        .await
        .unwrap());

    let registry = h.store.load().await.unwrap();
    let record = registry.get(id(9)).unwrap();
    assert_eq!(record.name, "Analytics");
    assert_eq!(record.description, "reporting db");
    assert!(record.updated_at.is_some());
    assert_eq!(record.folder_name, "instance9");
}

#[test_log::test(tokio::test)]
async fn test_export_contains_real_password() {
    let h = Harness::new();
    let record = h
        .manager
        .provision(id(5), &InstanceMetadata::default())
        .await
        .unwrap();

    let export = h.manager.export_connection_info(Some(id(5))).await.unwrap();
    let Some(ConnectionExport::Single(info)) = export else {
        panic!("expected a single export");
    };
    assert_eq!(
        info.database_url,
        format!(
            "postgresql://postgres:{}@localhost:20052/postgres",
            record.secrets.postgres_password
        )
    );
    assert_eq!(info.supabase_anon_key, record.secrets.anon_key);

    assert!(h
        .manager
        .export_connection_info(Some(id(6)))
        .await
        .unwrap()
        .is_none());

    let Some(ConnectionExport::All(all)) = h.manager.export_connection_info(None).await.unwrap()
    else {
        panic!("expected a combined export");
    };
    assert!(all["instance5"]
        .database_url
        .contains(&record.secrets.postgres_password));
}

#[test_log::test(tokio::test)]
async fn test_live_status() {
    let h = Harness::new();
    h.manager
        .provision(id(1), &InstanceMetadata::default())
        .await
        .unwrap();
    let network = "supabase-instance1-network";

    h.runtime
        .add_container(network, "supabase-instance1-db", ContainerState::Exited);
    assert_eq!(
        h.manager.query_status(id(1)).await.unwrap(),
        InstanceStatus::Stopped
    );

    h.runtime
        .add_container(network, "supabase-instance1-kong", ContainerState::Running);
    assert_eq!(
        h.manager.query_status(id(1)).await.unwrap(),
        InstanceStatus::Running
    );

    h.runtime.fail_queries.store(true, Ordering::SeqCst);
    assert_eq!(
        h.manager.query_status(id(1)).await.unwrap(),
        InstanceStatus::Unknown
    );
    assert_eq!(h.manager.list().await.unwrap()[0].status, InstanceStatus::Unknown);

    assert!(matches!(
        h.manager.query_status(id(2)).await,
        Err(SupafleetError::NotFound(_))
    ));
}

#[test_log::test(tokio::test)]
async fn test_decommission_is_idempotent() {
    let h = Harness::new();
    let record = h
        .manager
        .provision(id(7), &InstanceMetadata::builder().name("tmp").build())
        .await
        .unwrap();
    h.runtime.add_container(
        "supabase-instance7-network",
        "supabase-instance7-db",
        ContainerState::Running,
    );

    let canonical = record.path.canonicalize().unwrap();

    let report = h.manager.decommission(id(7), true).await.unwrap();
    assert!(report.is_clean(), "{:?}", report.failures);
    assert!(report.unregistered);
    assert_eq!(report.removed_networks, vec!["supabase-instance7-network"]);
    assert_eq!(report.removed_containers, vec!["supabase-instance7-db"]);
    assert_eq!(report.removed_path, Some(canonical));
    assert!(!record.path.exists());
    assert!(!h.runtime.has_network("supabase-instance7-network"));

    let calls = h.runtime.calls();
    assert!(calls.iter().any(|call| call.starts_with("compose_down")));
    assert!(calls.iter().any(|call| call == "stop_container supabase-instance7-db"));

    let registry = h.store.load().await.unwrap();
    assert!(registry.is_empty());
    assert!(registry.networks.is_empty());

    let before = h.runtime.call_count();
    assert!(matches!(
        h.manager.decommission(id(7), true).await,
        Err(SupafleetError::NotFound(_))
    ));
    assert_eq!(h.runtime.call_count(), before);
}

#[test_log::test(tokio::test)]
async fn test_decommission_keeps_files_by_default() {
    let h = Harness::new();
    let record = h
        .manager
        .provision(id(8), &InstanceMetadata::default())
        .await
        .unwrap();

    let report = h.manager.decommission(id(8), false).await.unwrap();
    assert!(report.unregistered);
    assert!(report.removed_path.is_none());
    assert!(record.path.exists());
}

#[test_log::test(tokio::test)]
async fn test_decommission_refuses_tampered_path() {
    let h = Harness::new();
    h.manager
        .provision(id(1), &InstanceMetadata::default())
        .await
        .unwrap();

    tamper_path(&h, 1, "/etc").await;

    let before = h.runtime.call_count();
    let result = h.manager.decommission(id(1), true).await;
    assert!(matches!(result, Err(SupafleetError::SafetyViolation { .. })));
    assert_eq!(h.runtime.call_count(), before);
    assert!(h.store.load().await.unwrap().contains(id(1)));
    assert!(Path::new("/etc").exists());
}

#[test_log::test(tokio::test)]
async fn test_decommission_continues_past_failures() {
    let h = Harness::new();
    h.manager
        .provision(id(6), &InstanceMetadata::default())
        .await
        .unwrap();
    h.runtime.add_container(
        "supabase-instance6-network",
        "supabase-instance6-db",
        ContainerState::Running,
    );
    h.runtime.fail_compose_down.store(true, Ordering::SeqCst);
    h.runtime.fail_remove_container.store(true, Ordering::SeqCst);

    let report = h.manager.decommission(id(6), false).await.unwrap();
    let steps: Vec<DecommissionStep> = report.failures.iter().map(|f| f.step).collect();
    assert_eq!(
        steps,
        vec![DecommissionStep::ComposeDown, DecommissionStep::RemoveContainers]
    );
    assert!(report.removed_containers.is_empty());
    assert_eq!(report.removed_networks, vec!["supabase-instance6-network"]);
    assert!(!h.runtime.has_network("supabase-instance6-network"));
    assert!(report.unregistered);
    assert!(!h.store.load().await.unwrap().contains(id(6)));
}

#[test_log::test(tokio::test)]
async fn test_decommission_keeping_files_skips_compose_outside_base() {
    let h = Harness::new();
    h.manager
        .provision(id(2), &InstanceMetadata::default())
        .await
        .unwrap();
    tamper_path(&h, 2, "/etc").await;

    let report = h.manager.decommission(id(2), false).await.unwrap();
    assert!(!h
        .runtime
        .calls()
        .iter()
        .any(|call| call.starts_with("compose_down")));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].step, DecommissionStep::ComposeDown);
    assert_eq!(report.removed_networks, vec!["supabase-instance2-network"]);
    assert!(report.unregistered);
    assert!(report.removed_path.is_none());
}

#[test_log::test(tokio::test)]
async fn test_regenerate_config_refuses_path_outside_base() {
    let h = Harness::new();
    let outside = TempDir::new().unwrap();
    let docker_dir = outside.path().join("supabase/docker");
    std::fs::create_dir_all(&docker_dir).unwrap();
    std::fs::write(docker_dir.join(".env.example"), "POSTGRES_PASSWORD=x\n").unwrap();

    let record = h
        .manager
        .provision(id(3), &InstanceMetadata::default())
        .await
        .unwrap();
    tamper_path(&h, 3, outside.path().to_str().unwrap()).await;

    assert!(matches!(
        h.manager.regenerate_config(id(3)).await,
        Err(SupafleetError::SafetyViolation { .. })
    ));
    assert!(!docker_dir.join(".env").exists());
    assert_eq!(
        h.store.load().await.unwrap().get(id(3)).unwrap().secrets,
        record.secrets
    );
}

#[test_log::test(tokio::test)]
async fn test_regenerate_config() {
    let h = Harness::new();
    let record = h
        .manager
        .provision(id(2), &InstanceMetadata::default())
        .await
        .unwrap();

    let mut registry = h.store.load().await.unwrap();
    registry.get_mut(id(2)).unwrap().ports.postgres = 5432;
    h.store.save(&mut registry).await.unwrap();
    assert!(h.manager.list().await.unwrap()[0].config_stale);

    let updated = h.manager.regenerate_config(id(2)).await.unwrap();
    assert!(!updated.config_stale);
    assert!(!h.store.load().await.unwrap().get(id(2)).unwrap().config_stale);
    assert!(!h.manager.list().await.unwrap()[0].config_stale);
    assert_ne!(updated.secrets.jwt_secret, record.secrets.jwt_secret);
    assert!(updated.updated_at.is_some());
    secrets::verify(&updated.secrets).unwrap();

    let env = std::fs::read_to_string(record.path.join("supabase/docker/.env")).unwrap();
    assert!(env.contains(&format!(
        "POSTGRES_PASSWORD={}\n",
        updated.secrets.postgres_password
    )));

    let stored = h.store.load().await.unwrap();
    assert_eq!(stored.get(id(2)).unwrap().secrets, updated.secrets);

    assert!(matches!(
        h.manager.regenerate_config(id(3)).await,
        Err(SupafleetError::NotFound(_))
    ));

    std::fs::remove_file(record.path.join("supabase/docker/.env.example")).unwrap();
    assert!(matches!(
        h.manager.regenerate_config(id(2)).await,
        Err(SupafleetError::TemplateMissing(_))
    ));
}

#[test_log::test(tokio::test)]
async fn test_external_service_template() {
    let h = Harness::new();
    h.manager
        .provision(id(3), &InstanceMetadata::default())
        .await
        .unwrap();

    let yaml = h
        .manager
        .external_service_template(id(3), "worker")
        .await
        .unwrap();
    assert!(yaml.contains("supabase-instance3-network"));
    assert!(yaml.contains("worker"));

    assert!(matches!(
        h.manager.external_service_template(id(4), "worker").await,
        Err(SupafleetError::NotFound(_))
    ));
}

#[test_log::test(tokio::test)]
async fn test_memory_store_backed_manager() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRegistryStore::new());
    let manager = InstanceManager::builder()
        .store(store.clone())
        .runtime(Arc::new(FakeRuntime::default()))
        .source(Arc::new(FakeTemplateSource::default()))
        .config(ManagerConfig::new(Some(dir.path().to_path_buf())))
        .build();

    manager
        .provision(id(1), &InstanceMetadata::default())
        .await
        .unwrap();
    assert_eq!(store.save_count(), 1);

    assert!(!manager.update_metadata(id(2), "nope", None).await.unwrap());
    assert_eq!(store.save_count(), 1);

    assert!(!dir.path().join("instance_registry.json").exists());
}
