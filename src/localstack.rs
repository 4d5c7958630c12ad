//! Handle to a ready LocalStack container.

use std::fmt;
use std::sync::Arc;

use crate::endpoint::{Endpoint, EndpointResolver, ServiceRoute};
use crate::error::{ConfigError, EndpointNotFound, LocalstackError, Result};
use crate::runtime::{ContainerDetails, ContainerRuntime};
use crate::sdk::SdkConfig;
use crate::services::ServiceRegistry;

/// A running emulator container together with the services requested from it.
///
/// Returned by [`LifecycleManager::acquire`](crate::lifecycle::LifecycleManager::acquire).
/// The handle owns no container resources itself; [`destroy`](Self::destroy)
/// asks the runtime to purge the container. Nothing is cleaned up on drop,
/// so test suites must call `destroy` (or `LifecycleManager::release`)
/// explicitly from their teardown path.
pub struct Localstack {
    container: ContainerDetails,
    services: Arc<ServiceRegistry>,
    resolver: EndpointResolver,
    runtime: Arc<dyn ContainerRuntime>,
}

impl Localstack {
    pub(crate) fn new(
        container: ContainerDetails,
        services: Arc<ServiceRegistry>,
        routes: &'static [ServiceRoute],
        endpoint_host: &str,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        let resolver =
            EndpointResolver::new(routes, Arc::clone(&services), &container, endpoint_host);
        Self {
            container,
            services,
            resolver,
            runtime,
        }
    }

    pub fn container(&self) -> &ContainerDetails {
        &self.container
    }

    pub fn container_id(&self) -> &str {
        &self.container.id
    }

    /// Services requested when the handle was acquired.
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Resolver routing SDK service identifiers to this container.
    pub fn endpoint_resolver(&self) -> EndpointResolver {
        self.resolver.clone()
    }

    /// Shorthand for `endpoint_resolver().resolve(service_id)`.
    pub fn resolve_endpoint(
        &self,
        service_id: &str,
    ) -> std::result::Result<Endpoint, EndpointNotFound> {
        self.resolver.resolve(service_id)
    }

    /// SDK configuration with placeholder credentials and this container's
    /// endpoint resolver. Region comes from `AWS_REGION` / `AWS_DEFAULT_REGION`.
    pub fn sdk_config(&self) -> std::result::Result<SdkConfig, ConfigError> {
        SdkConfig::load(self.endpoint_resolver())
    }

    /// Stop and remove the container. Failures are returned, not retried.
    pub async fn destroy(self) -> Result<()> {
        self.runtime
            .purge(&self.container.id)
            .await
            .map_err(LocalstackError::Teardown)
    }
}

impl fmt::Debug for Localstack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Localstack")
            .field("container", &self.container)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}
