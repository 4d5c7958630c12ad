//! Disposable LocalStack containers for integration tests.
//!
//! A test suite builds a [`ServiceRegistry`], asks a [`LifecycleManager`] to
//! acquire a container (reusing a named one when it is already running),
//! points its SDK clients at the container through the handle's
//! [`EndpointResolver`], and releases the container when the suite ends.
//!
//! ```rust,no_run
//! use localstack_harness::{LifecycleManager, LocalstackConfig, ServiceRegistry};
//! use localstack_harness::config::{DEFAULT_REPOSITORY, TESTED_TAG};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = LifecycleManager::connect(&LocalstackConfig::default()).await?;
//! let services = ServiceRegistry::parse("dynamodb,dynamodbstreams")?;
//!
//! let localstack = manager
//!     .acquire(services, "dynamotest", DEFAULT_REPOSITORY, TESTED_TAG)
//!     .await?;
//!
//! let sdk = localstack.sdk_config()?;
//! println!("DynamoDB at {}", sdk.resolve_endpoint("DynamoDB")?);
//!
//! // No cleanup on drop: release explicitly from the suite's teardown.
//! manager.release(localstack).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod lifecycle;
pub mod localstack;
pub mod runtime;
pub mod sdk;
pub mod services;
pub mod testing;

pub use config::LocalstackConfig;
pub use endpoint::{Endpoint, EndpointResolver, SERVICE_ROUTES, ServiceRoute};
pub use error::{ConfigError, EndpointNotFound, LocalstackError, RuntimeError, ServiceError};
pub use lifecycle::LifecycleManager;
pub use localstack::Localstack;
pub use runtime::{ContainerRuntime, DockerRuntime, RetryPolicy};
pub use sdk::{SdkConfig, StaticCredentials};
pub use services::{ServiceDescriptor, ServiceRegistry};
