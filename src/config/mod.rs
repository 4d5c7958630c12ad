//! Configuration resolved from the environment.

pub(crate) mod helpers;

use std::time::Duration;

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::endpoint::DEFAULT_ENDPOINT_HOST;
use crate::error::ConfigError;
use crate::runtime::RetryPolicy;
use crate::services::ServiceRegistry;

/// LocalStack Docker repository.
pub const DEFAULT_REPOSITORY: &str = "localstack/localstack";

/// Last image tag the readiness marker and port layout were verified against.
pub const TESTED_TAG: &str = "0.9.1";

/// Tag used by [`LifecycleManager::acquire_latest`](crate::lifecycle::LifecycleManager::acquire_latest).
pub const LATEST_TAG: &str = "latest";

/// Where and how to run the emulator.
#[derive(Debug, Clone)]
pub struct LocalstackConfig {
    /// Image repository (`LOCALSTACK_REPOSITORY`).
    pub repository: String,
    /// Image tag (`LOCALSTACK_TAG`).
    pub tag: String,
    /// Container name; empty disables discovery (`LOCALSTACK_CONTAINER_NAME`).
    pub name: String,
    /// Services to request (`LOCALSTACK_SERVICES`, comma separated).
    pub services: ServiceRegistry,
    /// Host used to reach ports bound on all interfaces (`LOCALSTACK_ENDPOINT_HOST`).
    pub endpoint_host: String,
    /// Readiness probe budget.
    pub retry: RetryPolicy,
}

impl Default for LocalstackConfig {
    fn default() -> Self {
        Self {
            repository: DEFAULT_REPOSITORY.to_string(),
            tag: TESTED_TAG.to_string(),
            name: String::new(),
            services: ServiceRegistry::new(),
            endpoint_host: DEFAULT_ENDPOINT_HOST.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl LocalstackConfig {
    /// Resolve from `LOCALSTACK_*` environment variables over the defaults.
    pub fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let services = match optional_env("LOCALSTACK_SERVICES")? {
            Some(list) => {
                ServiceRegistry::parse(&list).map_err(|e| ConfigError::InvalidValue {
                    key: "LOCALSTACK_SERVICES".to_string(),
                    message: e.to_string(),
                })?
            }
            None => defaults.services,
        };

        let timeout_secs = parse_optional_env(
            "LOCALSTACK_READY_TIMEOUT_SECS",
            defaults.retry.max_elapsed.as_secs(),
        )?;
        let initial_ms = parse_optional_env(
            "LOCALSTACK_READY_INITIAL_INTERVAL_MS",
            defaults.retry.initial_interval.as_millis() as u64,
        )?;
        let max_interval_ms = parse_optional_env(
            "LOCALSTACK_READY_MAX_INTERVAL_MS",
            defaults.retry.max_interval.as_millis() as u64,
        )?;
        let max_attempts = optional_env("LOCALSTACK_READY_MAX_ATTEMPTS")?
            .map(|s| s.trim().parse::<u32>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "LOCALSTACK_READY_MAX_ATTEMPTS".to_string(),
                message: e.to_string(),
            })?;

        if max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "LOCALSTACK_READY_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            repository: optional_env("LOCALSTACK_REPOSITORY")?.unwrap_or(defaults.repository),
            tag: optional_env("LOCALSTACK_TAG")?.unwrap_or(defaults.tag),
            name: optional_env("LOCALSTACK_CONTAINER_NAME")?.unwrap_or(defaults.name),
            services,
            endpoint_host: optional_env("LOCALSTACK_ENDPOINT_HOST")?
                .unwrap_or(defaults.endpoint_host),
            retry: RetryPolicy {
                initial_interval: Duration::from_millis(initial_ms),
                max_interval: Duration::from_millis(max_interval_ms.max(initial_ms)),
                max_elapsed: Duration::from_secs(timeout_secs),
                max_attempts,
                ..defaults.retry
            },
        })
    }

    /// `repository:tag`.
    pub fn image(&self) -> String {
        crate::runtime::image_reference(&self.repository, &self.tag)
    }
}
