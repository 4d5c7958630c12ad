//! Error types for the LocalStack harness.

use thiserror::Error;

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LocalstackError>;

/// Errors surfaced by [`LifecycleManager`](crate::lifecycle::LifecycleManager).
///
/// Acquire is all-or-nothing: any of these aborts the whole operation.
#[derive(Debug, Error)]
pub enum LocalstackError {
    /// Listing or inspecting containers failed during discovery.
    #[error("Container discovery failed: {0}")]
    Discovery(#[source] RuntimeError),

    /// The container engine could not pull, create or start the container.
    #[error("Could not start LocalStack container: {0}")]
    Startup(#[source] RuntimeError),

    /// A service never logged the readiness marker within the retry budget.
    ///
    /// A container started by the failed acquire is left running.
    #[error("Service '{service}' not ready after {attempts} attempts: {reason}")]
    NotReady {
        /// Service name from the registry.
        service: String,
        /// How many probes were made.
        attempts: u32,
        /// Last probe failure.
        reason: String,
    },

    /// Purging the container failed.
    #[error("Could not purge LocalStack container: {0}")]
    Teardown(#[source] RuntimeError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors reported by a [`ContainerRuntime`](crate::runtime::ContainerRuntime).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Docker daemon could not be reached.
    #[error("Docker not available: {reason}")]
    DockerNotAvailable {
        /// Reason why Docker is unavailable.
        reason: String,
    },

    /// Listing containers failed.
    #[error("Unable to retrieve docker containers: {reason}")]
    ListFailed {
        /// Reason for failure.
        reason: String,
    },

    /// Inspecting a container failed.
    #[error("Unable to inspect container {id}: {reason}")]
    InspectFailed {
        /// Container ID.
        id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Pulling the image failed.
    #[error("Failed to pull image '{image}': {reason}")]
    ImagePullFailed {
        /// Image reference.
        image: String,
        /// Reason for failure.
        reason: String,
    },

    /// Creating the container failed.
    #[error("Failed to create container '{name}': {reason}")]
    ContainerCreationFailed {
        /// Container name, or the image when unnamed.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Starting the container failed.
    #[error("Failed to start container '{name}': {reason}")]
    ContainerStartFailed {
        /// Container name, or the container ID when unnamed.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Reading container logs failed.
    #[error("Unable to retrieve logs for container {id}: {reason}")]
    LogsFailed {
        /// Container ID.
        id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Stopping or removing the container failed.
    #[error("Could not purge container {id}: {reason}")]
    PurgeFailed {
        /// Container ID.
        id: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Errors building a [`ServiceDescriptor`](crate::services::ServiceDescriptor).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Service name must not be empty")]
    Empty,

    #[error("Invalid service name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Signal returned by the endpoint resolver for services it does not route.
///
/// SDK clients treat this as "use the default endpoint resolution".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No LocalStack endpoint for service '{service_id}'")]
pub struct EndpointNotFound {
    /// Service identifier that was looked up.
    pub service_id: String,
}
