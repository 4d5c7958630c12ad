//! Locate-or-start the emulator container and wait for it to become ready.
//!
//! ```text
//!   acquire(registry, name, repository, tag)
//!         │
//!         ▼
//!   ┌──────────────┐  match   ┌──────────────┐
//!   │ Discover     │────────▶│ Inspect      │──┐
//!   │ /name + image│          └──────────────┘  │
//!   └──────────────┘                            │
//!         │ no match                            ▼
//!         ▼                          ┌─────────────────────┐
//!   ┌──────────────┐                 │ Per service: retry  │
//!   │ Run with     │────────────────▶│ log probe "Ready."  │
//!   │ SERVICES=... │                 └─────────────────────┘
//!   └──────────────┘                            │
//!                                               ▼
//!                                         Localstack handle
//! ```
//!
//! Discovery is not exclusive: two acquires racing on the same name can
//! both miss and each try to start a container.

use std::sync::Arc;

use crate::config::{DEFAULT_REPOSITORY, LATEST_TAG, LocalstackConfig};
use crate::endpoint::{DEFAULT_ENDPOINT_HOST, SERVICE_ROUTES, ServiceRoute};
use crate::error::{LocalstackError, Result, RuntimeError};
use crate::localstack::Localstack;
use crate::runtime::{
    ContainerDetails, ContainerRuntime, DockerRuntime, RunOptions, image_reference,
};
use crate::services::ServiceRegistry;

/// Log text the emulator prints once every requested service is up.
pub const READY_MARKER: &str = "Ready.";

/// Whether any line of `logs`, trimmed, contains [`READY_MARKER`].
pub fn contains_ready_marker(logs: &str) -> bool {
    logs.lines().any(|line| line.trim().contains(READY_MARKER))
}

/// Why a single readiness probe did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Not Ready")]
    NotReady,

    #[error(transparent)]
    Logs(#[from] RuntimeError),
}

/// Read the container logs once and look for the readiness marker.
pub async fn probe_ready(
    runtime: &dyn ContainerRuntime,
    container_id: &str,
) -> std::result::Result<(), ProbeError> {
    let logs = runtime.logs(container_id).await?;
    if contains_ready_marker(&logs) {
        Ok(())
    } else {
        Err(ProbeError::NotReady)
    }
}

/// Drives discovery, startup, readiness and teardown through a
/// [`ContainerRuntime`].
pub struct LifecycleManager {
    runtime: Arc<dyn ContainerRuntime>,
    routes: &'static [ServiceRoute],
    endpoint_host: String,
}

impl LifecycleManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            routes: SERVICE_ROUTES,
            endpoint_host: DEFAULT_ENDPOINT_HOST.to_string(),
        }
    }

    /// Connect to the local Docker daemon using the config's retry budget
    /// and endpoint host.
    pub async fn connect(config: &LocalstackConfig) -> Result<Self> {
        let runtime = DockerRuntime::connect(config.retry.clone())
            .await
            .map_err(LocalstackError::Discovery)?;
        Ok(Self::new(Arc::new(runtime)).with_endpoint_host(config.endpoint_host.clone()))
    }

    /// Resolve [`LocalstackConfig`] from the environment, then [`connect`](Self::connect).
    pub async fn from_env() -> Result<Self> {
        let config = LocalstackConfig::resolve()?;
        Self::connect(&config).await
    }

    /// Replace the service routing table.
    pub fn with_routes(mut self, routes: &'static [ServiceRoute]) -> Self {
        self.routes = routes;
        self
    }

    /// Host used to reach ports published on all interfaces.
    pub fn with_endpoint_host(mut self, host: impl Into<String>) -> Self {
        self.endpoint_host = host.into();
        self
    }

    /// Start an unnamed container from `localstack/localstack:latest`.
    pub async fn acquire_latest(&self, registry: ServiceRegistry) -> Result<Localstack> {
        self.acquire(registry, "", DEFAULT_REPOSITORY, LATEST_TAG)
            .await
    }

    /// Acquire using the repository, tag, name and services from `config`.
    pub async fn acquire_from_config(&self, config: &LocalstackConfig) -> Result<Localstack> {
        self.acquire(
            config.services.clone(),
            &config.name,
            &config.repository,
            &config.tag,
        )
        .await
    }

    /// Acquire using the `LOCALSTACK_*` environment.
    ///
    /// The endpoint host stays the one this manager was built with.
    pub async fn acquire_from_env(&self) -> Result<Localstack> {
        let config = LocalstackConfig::resolve()?;
        self.acquire_from_config(&config).await
    }

    /// Adopt a running `repository:tag` container called `name`, or start
    /// one, then wait until every service in `registry` is ready.
    ///
    /// An empty `name` skips discovery and always starts a fresh container.
    pub async fn acquire(
        &self,
        registry: ServiceRegistry,
        name: &str,
        repository: &str,
        tag: &str,
    ) -> Result<Localstack> {
        let container = match self.discover(name, repository, tag).await? {
            Some(existing) => {
                tracing::info!(
                    "Reusing LocalStack container {} ({})",
                    existing.name,
                    existing.id
                );
                existing
            }
            None => self.start(&registry, name, repository, tag).await?,
        };

        self.wait_until_ready(&registry, &container.id).await?;

        Ok(self.handle(registry, container))
    }

    /// Discovery only: wrap an existing container without starting or
    /// waiting on anything.
    pub async fn attach(
        &self,
        registry: ServiceRegistry,
        name: &str,
        repository: &str,
        tag: &str,
    ) -> Result<Option<Localstack>> {
        Ok(self
            .discover(name, repository, tag)
            .await?
            .map(|container| self.handle(registry, container)))
    }

    /// Stop and remove the handle's container.
    ///
    /// This is destructive even for containers that were discovered rather
    /// than started by this manager.
    pub async fn release(&self, handle: Localstack) -> Result<()> {
        handle.destroy().await
    }

    /// Find a container created from `repository:tag` whose name is
    /// `/{name}`. `Ok(None)` means "start fresh".
    pub async fn discover(
        &self,
        name: &str,
        repository: &str,
        tag: &str,
    ) -> Result<Option<ContainerDetails>> {
        if name.is_empty() {
            return Ok(None);
        }

        let image = image_reference(repository, tag);
        let containers = self
            .runtime
            .list_containers()
            .await
            .map_err(LocalstackError::Discovery)?;

        let Some(found) = containers.iter().find(|c| c.matches(&image, name)) else {
            tracing::debug!("No container named '{}' running {}", name, image);
            return Ok(None);
        };

        let details = self
            .runtime
            .inspect_container(&found.id)
            .await
            .map_err(LocalstackError::Discovery)?;
        if !details.running {
            tracing::warn!(
                "Container {} ({}) is not running; readiness will likely fail",
                details.name,
                details.id
            );
        }
        Ok(Some(details))
    }

    async fn start(
        &self,
        registry: &ServiceRegistry,
        name: &str,
        repository: &str,
        tag: &str,
    ) -> Result<ContainerDetails> {
        let exposed_ports = self
            .routes
            .iter()
            .filter(|r| r.is_enabled(registry))
            .map(|r| r.port)
            .collect();

        let options = RunOptions {
            repository: repository.to_string(),
            tag: tag.to_string(),
            name: (!name.is_empty()).then(|| name.to_string()),
            env: vec![registry.startup_env()],
            exposed_ports,
        };

        tracing::info!(
            "Starting LocalStack {} with {}",
            options.image(),
            registry.startup_env()
        );

        self.runtime
            .run_with_options(&options)
            .await
            .map_err(LocalstackError::Startup)
    }

    /// Probe the logs for every service in turn; the first service to
    /// exhaust its retry budget fails the whole wait.
    async fn wait_until_ready(&self, registry: &ServiceRegistry, container_id: &str) -> Result<()> {
        let runtime = self.runtime.as_ref();
        let policy = runtime.retry_policy();

        for service in registry {
            policy
                .retry(|| probe_ready(runtime, container_id))
                .await
                .map_err(|e| LocalstackError::NotReady {
                    service: service.name().to_string(),
                    attempts: e.attempts,
                    reason: e.last_error.to_string(),
                })?;
            tracing::info!("Service '{}' ready", service);
        }

        Ok(())
    }

    fn handle(&self, registry: ServiceRegistry, container: ContainerDetails) -> Localstack {
        Localstack::new(
            container,
            Arc::new(registry),
            self.routes,
            &self.endpoint_host,
            Arc::clone(&self.runtime),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::runtime::{ContainerSummary, PublishedPort};
    use crate::testing::FakeRuntime;

    const IMAGE_REPO: &str = "localstack/localstack";
    const IMAGE_TAG: &str = "0.9.1";

    fn registry(names: &[&str]) -> ServiceRegistry {
        ServiceRegistry::from_names(names.iter().copied()).unwrap()
    }

    fn existing(id: &str, image: &str, name: &str) -> (ContainerSummary, ContainerDetails) {
        let summary = ContainerSummary {
            id: id.to_string(),
            names: vec![format!("/{name}")],
            image: image.to_string(),
        };
        let details = ContainerDetails {
            id: id.to_string(),
            name: format!("/{name}"),
            image: image.to_string(),
            running: true,
            ports: [(
                4569,
                PublishedPort {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: 31000,
                },
            )]
            .into_iter()
            .collect(),
        };
        (summary, details)
    }

    #[test]
    fn test_ready_marker_with_whitespace() {
        assert!(contains_ready_marker("Starting mock services\n  Ready.  \n"));
        assert!(contains_ready_marker("\tReady.\r\n"));
        assert!(!contains_ready_marker("Starting mock DynamoDB\nready\n"));
        assert!(!contains_ready_marker(""));
    }

    #[tokio::test]
    async fn test_discovery_adopts_matching_container() {
        let (summary, details) = existing("abc123", "localstack/localstack:0.9.1", "foo");
        let runtime = Arc::new(
            FakeRuntime::new()
                .with_container(summary, details)
                .with_logs("  Ready.  "),
        );
        let manager = LifecycleManager::new(runtime.clone());

        let handle = manager
            .acquire(registry(&["dynamodb"]), "foo", IMAGE_REPO, IMAGE_TAG)
            .await
            .expect("acquire should adopt the container");

        assert_eq!(handle.container_id(), "abc123");
        assert_eq!(runtime.run_calls(), 0);
        assert_eq!(runtime.inspect_calls(), 1);
        assert_eq!(
            handle.resolve_endpoint("DynamoDB").unwrap().url.port(),
            Some(31000)
        );
    }

    #[tokio::test]
    async fn test_discovery_ignores_other_image_tag() {
        let (summary, details) = existing("old", "localstack/localstack:latest", "foo");
        let runtime = Arc::new(
            FakeRuntime::new()
                .with_container(summary, details)
                .with_logs("Ready."),
        );
        let manager = LifecycleManager::new(runtime.clone());

        let handle = manager
            .acquire(registry(&["s3"]), "foo", IMAGE_REPO, IMAGE_TAG)
            .await
            .unwrap();

        assert_ne!(handle.container_id(), "old");
        assert_eq!(runtime.run_calls(), 1);
    }

    #[tokio::test]
    async fn test_unnamed_acquire_skips_discovery() {
        let runtime = Arc::new(FakeRuntime::new().with_logs("Ready."));
        let manager = LifecycleManager::new(runtime.clone());

        manager
            .acquire(registry(&["sqs"]), "", IMAGE_REPO, IMAGE_TAG)
            .await
            .unwrap();

        assert_eq!(runtime.list_calls(), 0);
        assert_eq!(runtime.run_calls(), 1);
        assert_eq!(runtime.last_run().unwrap().name, None);
    }

    #[tokio::test]
    async fn test_start_passes_services_env_and_ports() {
        let runtime = Arc::new(FakeRuntime::new().with_logs("Ready."));
        let manager = LifecycleManager::new(runtime.clone());

        manager
            .acquire(
                registry(&["dynamodb", "dynamodbstreams"]),
                "dynamotest",
                IMAGE_REPO,
                IMAGE_TAG,
            )
            .await
            .unwrap();

        let options = runtime.last_run().expect("container should be started");
        assert_eq!(runtime.run_calls(), 1);
        assert_eq!(options.env, vec!["SERVICES=dynamodb,dynamodbstreams"]);
        assert_eq!(options.name.as_deref(), Some("dynamotest"));
        assert_eq!(options.image(), "localstack/localstack:0.9.1");
        assert_eq!(options.exposed_ports, vec![4569, 4570]);
    }

    #[tokio::test]
    async fn test_not_ready_reports_service_and_retries() {
        let runtime = Arc::new(FakeRuntime::new().with_logs("Starting mock S3 service"));
        let manager = LifecycleManager::new(runtime.clone());

        let err = manager
            .acquire(registry(&["s3", "sqs"]), "", IMAGE_REPO, IMAGE_TAG)
            .await
            .unwrap_err();

        match err {
            LocalstackError::NotReady {
                service, attempts, ..
            } => {
                assert_eq!(service, "s3");
                assert_eq!(attempts, FakeRuntime::DEFAULT_ATTEMPTS);
            }
            other => panic!("expected NotReady, got {other:?}"),
        }
        assert_eq!(runtime.logs_calls(), FakeRuntime::DEFAULT_ATTEMPTS);
        // The started container is left for the caller to release.
        assert_eq!(runtime.purge_calls(), 0);
    }

    #[tokio::test]
    async fn test_ready_after_several_probes() {
        let runtime = Arc::new(FakeRuntime::new().ready_after(3));
        let manager = LifecycleManager::new(runtime.clone());

        manager
            .acquire(registry(&["kinesis"]), "", IMAGE_REPO, IMAGE_TAG)
            .await
            .unwrap();

        assert_eq!(runtime.logs_calls(), 3);
    }

    #[tokio::test]
    async fn test_start_failure_aborts() {
        let runtime = Arc::new(FakeRuntime::new().failing_run());
        let manager = LifecycleManager::new(runtime.clone());

        let err = manager
            .acquire(registry(&["s3"]), "x", IMAGE_REPO, IMAGE_TAG)
            .await
            .unwrap_err();

        assert!(matches!(err, LocalstackError::Startup(_)));
        assert_eq!(runtime.logs_calls(), 0);
    }

    #[tokio::test]
    async fn test_list_failure_is_discovery_error() {
        let runtime = Arc::new(FakeRuntime::new().failing_list());
        let manager = LifecycleManager::new(runtime.clone());

        let err = manager
            .acquire(registry(&["s3"]), "x", IMAGE_REPO, IMAGE_TAG)
            .await
            .unwrap_err();

        assert!(matches!(err, LocalstackError::Discovery(_)));
        assert_eq!(runtime.run_calls(), 0);
    }

    #[tokio::test]
    async fn test_attach_without_match() {
        let runtime = Arc::new(FakeRuntime::new());
        let manager = LifecycleManager::new(runtime.clone());

        let found = manager
            .attach(registry(&["s3"]), "missing", IMAGE_REPO, IMAGE_TAG)
            .await
            .unwrap();

        assert!(found.is_none());
        assert_eq!(runtime.run_calls(), 0);
        assert_eq!(runtime.logs_calls(), 0);
    }

    #[tokio::test]
    async fn test_release_purges_container() {
        let runtime = Arc::new(FakeRuntime::new().with_logs("Ready."));
        let manager = LifecycleManager::new(runtime.clone());

        let handle = manager.acquire_latest(registry(&["sns"])).await.unwrap();
        let id = handle.container_id().to_string();
        assert_eq!(runtime.last_run().unwrap().tag, "latest");

        manager.release(handle).await.unwrap();
        assert_eq!(runtime.purged(), vec![id]);
    }

    #[tokio::test]
    async fn test_release_failure_is_reported() {
        let runtime = Arc::new(FakeRuntime::new().with_logs("Ready.").failing_purge());
        let manager = LifecycleManager::new(runtime.clone());

        let handle = manager.acquire_latest(registry(&["sns"])).await.unwrap();
        let err = manager.release(handle).await.unwrap_err();

        assert!(matches!(err, LocalstackError::Teardown(_)));
        assert_eq!(runtime.purge_calls(), 1);
    }

    #[tokio::test]
    async fn test_discovery_adopts_stopped_container() {
        let (summary, mut details) = existing("stopped1", "localstack/localstack:0.9.1", "idle");
        details.running = false;
        let runtime = Arc::new(
            FakeRuntime::new()
                .with_container(summary, details)
                .with_logs("Ready."),
        );
        let manager = LifecycleManager::new(runtime.clone());

        let found = manager
            .discover("idle", IMAGE_REPO, IMAGE_TAG)
            .await
            .unwrap()
            .expect("stopped container is still discovered");
        assert!(!found.running);
        assert_eq!(runtime.run_calls(), 0);
    }

    const ENV_VARS: &[&str] = &[
        "LOCALSTACK_REPOSITORY",
        "LOCALSTACK_TAG",
        "LOCALSTACK_CONTAINER_NAME",
        "LOCALSTACK_SERVICES",
        "LOCALSTACK_READY_MAX_ATTEMPTS",
    ];

    fn clear_env() {
        // SAFETY: Only called under ENV_MUTEX in tests.
        unsafe {
            for var in ENV_VARS {
                std::env::remove_var(var);
            }
        }
    }

    #[tokio::test]
    async fn test_acquire_from_env() {
        let _guard = crate::config::helpers::ENV_MUTEX
            .lock()
            .expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("LOCALSTACK_SERVICES", "s3,sqs");
            std::env::set_var("LOCALSTACK_CONTAINER_NAME", "envtest");
            std::env::set_var("LOCALSTACK_TAG", "latest");
        }

        let runtime = Arc::new(FakeRuntime::new().with_logs("Ready."));
        let manager = LifecycleManager::new(runtime.clone());
        let result = manager.acquire_from_env().await;
        clear_env();

        let handle = result.unwrap();
        assert_eq!(handle.services().names().collect::<Vec<_>>(), ["s3", "sqs"]);
        let options = runtime.last_run().unwrap();
        assert_eq!(options.name.as_deref(), Some("envtest"));
        assert_eq!(options.image(), "localstack/localstack:latest");
        assert_eq!(options.env, vec!["SERVICES=s3,sqs".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_env_is_config_error() {
        let _guard = crate::config::helpers::ENV_MUTEX
            .lock()
            .expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("LOCALSTACK_READY_MAX_ATTEMPTS", "0");
        }

        let runtime = Arc::new(FakeRuntime::new());
        let manager = LifecycleManager::new(runtime.clone());
        let acquired = manager.acquire_from_env().await;
        // Fails while resolving, before any Docker connection is attempted.
        let connected = LifecycleManager::from_env().await;
        clear_env();

        assert!(matches!(
            acquired,
            Err(LocalstackError::Config(ConfigError::InvalidValue { ref key, .. }))
                if key == "LOCALSTACK_READY_MAX_ATTEMPTS"
        ));
        assert!(matches!(connected, Err(LocalstackError::Config(_))));
        assert_eq!(runtime.list_calls(), 0);
        assert_eq!(runtime.run_calls(), 0);
    }
}
