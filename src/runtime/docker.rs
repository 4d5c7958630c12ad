//! Docker Engine implementation of [`ContainerRuntime`] using bollard.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, HostConfig, PortBinding};
use futures::StreamExt;

use crate::error::RuntimeError;
use crate::runtime::{
    ContainerDetails, ContainerRuntime, ContainerSummary, PublishedPort, Result, RetryPolicy,
    RunOptions,
};

/// Seconds bollard waits on socket requests.
const SOCKET_TIMEOUT_SECS: u64 = 120;

/// Connect to the Docker daemon and verify it answers a ping.
///
/// Tries bollard's local defaults first (which honour `DOCKER_HOST`), then
/// the Docker Desktop socket under the home directory and the rootless
/// socket under `$XDG_RUNTIME_DIR`.
pub async fn connect_docker() -> Result<Docker> {
    let mut last_error = match Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.ping().await {
            Ok(_) => return Ok(docker),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    for socket in fallback_sockets() {
        if !socket.exists() {
            continue;
        }
        let Some(path) = socket.to_str() else {
            continue;
        };
        tracing::debug!("Trying Docker socket at {}", path);
        match Docker::connect_with_socket(path, SOCKET_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        {
            Ok(docker) => match docker.ping().await {
                Ok(_) => return Ok(docker),
                Err(e) => last_error = e.to_string(),
            },
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(RuntimeError::DockerNotAvailable {
        reason: last_error,
    })
}

fn fallback_sockets() -> Vec<PathBuf> {
    let mut sockets = Vec::new();
    if let Some(home) = dirs::home_dir() {
        sockets.push(home.join(".docker/run/docker.sock"));
    }
    if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        sockets.push(PathBuf::from(runtime_dir).join("docker.sock"));
    }
    sockets
}

/// [`ContainerRuntime`] backed by a live Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
    retry: RetryPolicy,
}

impl DockerRuntime {
    /// Connect to the local daemon.
    pub async fn connect(retry: RetryPolicy) -> Result<Self> {
        let docker = connect_docker().await?;
        Ok(Self::with_client(docker, retry))
    }

    /// Wrap an existing bollard client.
    pub fn with_client(docker: Docker, retry: RetryPolicy) -> Self {
        Self { docker, retry }
    }

    /// Pull `repository:tag` unless it is already present locally.
    async fn pull_image(&self, repository: &str, tag: &str) -> Result<()> {
        let image = format!("{repository}:{tag}");
        if self.docker.inspect_image(&image).await.is_ok() {
            tracing::debug!("Image '{}' exists locally", image);
            return Ok(());
        }

        tracing::info!("Pulling image: {}", image);

        let options = CreateImageOptions {
            from_image: repository.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::trace!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(RuntimeError::ImagePullFailed {
                        image,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!("Pulled image: {}", image);
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(|e| RuntimeError::ListFailed {
                reason: e.to_string(),
            })?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
                image: c.image.unwrap_or_default(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| RuntimeError::InspectFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(details_from_inspect(response))
    }

    async fn run_with_options(&self, options: &RunOptions) -> Result<ContainerDetails> {
        let image = options.image();
        let display_name = options.name.clone().unwrap_or_else(|| image.clone());

        self.pull_image(&options.repository, &options.tag).await?;

        let exposed_ports: HashMap<String, HashMap<(), ()>> = options
            .exposed_ports
            .iter()
            .map(|port| (format!("{port}/tcp"), HashMap::new()))
            .collect();

        let host_config = HostConfig {
            publish_all_ports: Some(true),
            auto_remove: Some(false),
            ..Default::default()
        };

        let config = Config {
            image: Some(image.clone()),
            env: if options.env.is_empty() {
                None
            } else {
                Some(options.env.clone())
            },
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = options.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });

        let created = self
            .docker
            .create_container(create_options, config)
            .await
            .map_err(|e| RuntimeError::ContainerCreationFailed {
                name: display_name.clone(),
                reason: e.to_string(),
            })?;

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::ContainerStartFailed {
                name: display_name.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!("Started container {} ({})", display_name, created.id);

        self.inspect_container(&created.id).await
    }

    async fn logs(&self, id: &str) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RuntimeError::LogsFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
            output.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }
        Ok(output)
    }

    async fn purge(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| RuntimeError::PurgeFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!("Purged container {}", id);
        Ok(())
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

fn details_from_inspect(response: ContainerInspectResponse) -> ContainerDetails {
    let ports = response
        .network_settings
        .and_then(|settings| settings.ports)
        .map(parse_port_map)
        .unwrap_or_default();

    ContainerDetails {
        id: response.id.unwrap_or_default(),
        name: response.name.unwrap_or_default(),
        image: response
            .config
            .and_then(|config| config.image)
            .unwrap_or_default(),
        running: response
            .state
            .and_then(|state| state.running)
            .unwrap_or(false),
        ports,
    }
}

/// Convert the engine's `"4569/tcp" → [bindings]` map into internal TCP
/// port → first usable host binding, preferring IPv4 bindings.
fn parse_port_map(
    map: HashMap<String, Option<Vec<PortBinding>>>,
) -> HashMap<u16, PublishedPort> {
    let mut ports = HashMap::new();
    for (key, bindings) in map {
        let Some((port, proto)) = key.split_once('/') else {
            continue;
        };
        if proto != "tcp" {
            continue;
        }
        let Ok(internal) = port.parse::<u16>() else {
            continue;
        };

        let published: Vec<PublishedPort> = bindings
            .unwrap_or_default()
            .into_iter()
            .filter_map(|b| {
                let host_port = b.host_port?.parse().ok()?;
                Some(PublishedPort {
                    host_ip: b.host_ip.filter(|ip| !ip.is_empty()),
                    host_port,
                })
            })
            .collect();

        let preferred = published
            .iter()
            .find(|p| !p.host_ip.as_deref().is_some_and(|ip| ip.contains(':')))
            .or_else(|| published.first())
            .cloned();

        if let Some(binding) = preferred {
            ports.insert(internal, binding);
        }
    }
    ports
}
