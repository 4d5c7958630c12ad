//! Container runtime abstraction.
//!
//! The lifecycle manager only talks to [`ContainerRuntime`], so tests can
//! swap the Docker-backed [`DockerRuntime`] for
//! [`FakeRuntime`](crate::testing::FakeRuntime).

pub mod docker;
pub mod retry;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::RuntimeError;

pub use docker::{DockerRuntime, connect_docker};
pub use retry::{RetryError, RetryPolicy};

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Entry from a container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    /// Engine names, each with a leading `/` (e.g. `/dynamotest`).
    pub names: Vec<String>,
    /// Image reference the container was created from (`repository:tag`).
    pub image: String,
}

impl ContainerSummary {
    /// Whether this container was created from `image` and carries `name`.
    pub fn matches(&self, image: &str, name: &str) -> bool {
        if self.image != image {
            return false;
        }
        let wanted = format!("/{name}");
        self.names.iter().any(|n| *n == wanted)
    }
}

/// Host side of a published container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPort {
    /// Host interface, `None` or a wildcard when bound to all interfaces.
    pub host_ip: Option<String>,
    pub host_port: u16,
}

/// Inspected state of a single container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: String,
    /// Engine name with its leading `/`, empty when unknown.
    pub name: String,
    pub image: String,
    pub running: bool,
    /// Internal TCP port → host binding.
    pub ports: HashMap<u16, PublishedPort>,
}

impl ContainerDetails {
    /// Host binding for an internal TCP port.
    pub fn host_port(&self, internal: u16) -> Option<&PublishedPort> {
        self.ports.get(&internal)
    }
}

/// Everything needed to start a new emulator container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub repository: String,
    pub tag: String,
    /// Explicit container name. `None` lets the engine pick one.
    pub name: Option<String>,
    /// `KEY=value` entries.
    pub env: Vec<String>,
    /// Internal TCP ports to expose and publish on random host ports.
    pub exposed_ports: Vec<u16>,
}

impl RunOptions {
    /// `repository:tag`.
    pub fn image(&self) -> String {
        image_reference(&self.repository, &self.tag)
    }
}

/// Join a repository and tag the way the engine reports images.
pub fn image_reference(repository: &str, tag: &str) -> String {
    format!("{repository}:{tag}")
}

/// Capabilities the lifecycle manager needs from a container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List all containers, running or stopped.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>>;

    /// Inspect a container by ID or name.
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails>;

    /// Create and start a container, returning its inspected state.
    async fn run_with_options(&self, options: &RunOptions) -> Result<ContainerDetails>;

    /// Snapshot of the container's stdout and stderr so far.
    async fn logs(&self, id: &str) -> Result<String>;

    /// Stop and remove the container together with its volumes.
    async fn purge(&self, id: &str) -> Result<()>;

    /// Backoff policy applied to readiness probes.
    fn retry_policy(&self) -> &RetryPolicy;
}
