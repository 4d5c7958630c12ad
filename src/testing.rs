//! In-memory container runtime for tests.
//!
//! [`FakeRuntime`] records every call, serves scripted logs and lets tests
//! inject failures per operation, so lifecycle behavior can be checked
//! without a Docker daemon.
//!
//! ```rust
//! use std::sync::Arc;
//! use localstack_harness::{LifecycleManager, ServiceRegistry, testing::FakeRuntime};
//!
//! # tokio_test::block_on(async {
//! let runtime = Arc::new(FakeRuntime::new().ready_after(2));
//! let manager = LifecycleManager::new(runtime.clone());
//!
//! let registry = ServiceRegistry::parse("s3").unwrap();
//! let handle = manager.acquire_latest(registry).await.unwrap();
//! assert_eq!(runtime.logs_calls(), 2);
//!
//! manager.release(handle).await.unwrap();
//! # });
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::runtime::{
    ContainerDetails, ContainerRuntime, ContainerSummary, PublishedPort, Result, RetryPolicy,
    RunOptions,
};

/// Offset added to internal ports when the fake "publishes" them.
pub const HOST_PORT_OFFSET: u16 = 30000;

/// Scriptable [`ContainerRuntime`] test double.
pub struct FakeRuntime {
    containers: Mutex<Vec<(ContainerSummary, ContainerDetails)>>,
    logs: String,
    ready_after: Option<u32>,
    retry: RetryPolicy,
    fail_list: bool,
    fail_run: bool,
    fail_purge: bool,
    runs: Mutex<Vec<RunOptions>>,
    purged: Mutex<Vec<String>>,
    list_calls: AtomicU32,
    inspect_calls: AtomicU32,
    run_calls: AtomicU32,
    logs_calls: AtomicU32,
    purge_calls: AtomicU32,
}

impl FakeRuntime {
    /// Probe attempts allowed by the default retry policy.
    pub const DEFAULT_ATTEMPTS: u32 = 5;

    /// No containers, empty logs, five quick probe attempts.
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(Vec::new()),
            logs: String::new(),
            ready_after: None,
            retry: RetryPolicy::fixed(Self::DEFAULT_ATTEMPTS, Duration::from_millis(1)),
            fail_list: false,
            fail_run: false,
            fail_purge: false,
            runs: Mutex::new(Vec::new()),
            purged: Mutex::new(Vec::new()),
            list_calls: AtomicU32::new(0),
            inspect_calls: AtomicU32::new(0),
            run_calls: AtomicU32::new(0),
            logs_calls: AtomicU32::new(0),
            purge_calls: AtomicU32::new(0),
        }
    }

    /// Add a pre-existing container visible to listing and inspection.
    pub fn with_container(self, summary: ContainerSummary, details: ContainerDetails) -> Self {
        self.lock_containers().push((summary, details));
        self
    }

    /// Logs returned by every `logs` call.
    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = logs.into();
        self
    }

    /// Logs only contain the readiness marker from the `n`th call onwards.
    pub fn ready_after(mut self, n: u32) -> Self {
        self.ready_after = Some(n);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_run(mut self) -> Self {
        self.fail_run = true;
        self
    }

    pub fn failing_purge(mut self) -> Self {
        self.fail_purge = true;
        self
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::Relaxed)
    }

    pub fn inspect_calls(&self) -> u32 {
        self.inspect_calls.load(Ordering::Relaxed)
    }

    pub fn run_calls(&self) -> u32 {
        self.run_calls.load(Ordering::Relaxed)
    }

    pub fn logs_calls(&self) -> u32 {
        self.logs_calls.load(Ordering::Relaxed)
    }

    pub fn purge_calls(&self) -> u32 {
        self.purge_calls.load(Ordering::Relaxed)
    }

    /// Options passed to the most recent `run_with_options`.
    pub fn last_run(&self) -> Option<RunOptions> {
        self.runs.lock().expect("runs lock poisoned").last().cloned()
    }

    /// IDs of purged containers, in order.
    pub fn purged(&self) -> Vec<String> {
        self.purged.lock().expect("purged lock poisoned").clone()
    }

    /// IDs of containers that still exist.
    pub fn container_ids(&self) -> Vec<String> {
        self.lock_containers()
            .iter()
            .map(|(summary, _)| summary.id.clone())
            .collect()
    }

    fn lock_containers(&self) -> std::sync::MutexGuard<'_, Vec<(ContainerSummary, ContainerDetails)>> {
        self.containers.lock().expect("containers lock poisoned")
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_list {
            return Err(RuntimeError::ListFailed {
                reason: "injected failure".to_string(),
            });
        }
        Ok(self
            .lock_containers()
            .iter()
            .map(|(summary, _)| summary.clone())
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        self.inspect_calls.fetch_add(1, Ordering::Relaxed);
        self.lock_containers()
            .iter()
            .find(|(summary, _)| summary.id == id)
            .map(|(_, details)| details.clone())
            .ok_or_else(|| RuntimeError::InspectFailed {
                id: id.to_string(),
                reason: "no such container".to_string(),
            })
    }

    async fn run_with_options(&self, options: &RunOptions) -> Result<ContainerDetails> {
        let n = self.run_calls.fetch_add(1, Ordering::Relaxed) + 1;
        self.runs
            .lock()
            .expect("runs lock poisoned")
            .push(options.clone());

        if self.fail_run {
            return Err(RuntimeError::ContainerStartFailed {
                name: options.name.clone().unwrap_or_else(|| options.image()),
                reason: "injected failure".to_string(),
            });
        }

        let id = format!("fake-{n}");
        let name = format!("/{}", options.name.clone().unwrap_or_else(|| id.clone()));
        let details = ContainerDetails {
            id: id.clone(),
            name: name.clone(),
            image: options.image(),
            running: true,
            ports: options
                .exposed_ports
                .iter()
                .map(|port| {
                    (
                        *port,
                        PublishedPort {
                            host_ip: Some("0.0.0.0".to_string()),
                            host_port: port.saturating_add(HOST_PORT_OFFSET),
                        },
                    )
                })
                .collect(),
        };
        let summary = ContainerSummary {
            id,
            names: vec![name],
            image: options.image(),
        };
        self.lock_containers().push((summary, details.clone()));
        Ok(details)
    }

    async fn logs(&self, id: &str) -> Result<String> {
        let n = self.logs_calls.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.lock_containers().iter().any(|(s, _)| s.id == id) {
            return Err(RuntimeError::LogsFailed {
                id: id.to_string(),
                reason: "no such container".to_string(),
            });
        }
        Ok(match self.ready_after {
            Some(ready_at) if n >= ready_at => format!("{}\n  Ready.  \n", self.logs),
            Some(_) => format!("{}\nStarting mock services...\n", self.logs),
            None => self.logs.clone(),
        })
    }

    async fn purge(&self, id: &str) -> Result<()> {
        self.purge_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_purge {
            return Err(RuntimeError::PurgeFailed {
                id: id.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        let mut containers = self.lock_containers();
        let before = containers.len();
        containers.retain(|(summary, _)| summary.id != id);
        if containers.len() == before {
            return Err(RuntimeError::PurgeFailed {
                id: id.to_string(),
                reason: "no such container".to_string(),
            });
        }
        drop(containers);
        self.purged
            .lock()
            .expect("purged lock poisoned")
            .push(id.to_string());
        Ok(())
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}
