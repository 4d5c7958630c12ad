//! `up`, `down` and `endpoints` commands.

use clap::Args;
use serde::Serialize;

use crate::config::LocalstackConfig;
use crate::endpoint::EndpointResolver;
use crate::lifecycle::LifecycleManager;
use crate::services::ServiceRegistry;

/// Container selection shared by the container commands.
///
/// Unset flags fall back to the `LOCALSTACK_*` environment.
#[derive(Args, Debug, Clone, Default)]
pub struct ContainerArgs {
    /// Comma-separated services, e.g. "dynamodb,s3"
    #[arg(short, long)]
    pub services: Option<String>,

    /// Container name used for discovery
    #[arg(short, long)]
    pub name: Option<String>,

    /// Image repository
    #[arg(long)]
    pub repository: Option<String>,

    /// Image tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Print endpoints as JSON
    #[arg(long)]
    pub json: bool,
}

impl ContainerArgs {
    /// Overlay the flags on the environment configuration.
    pub fn resolve(&self) -> anyhow::Result<LocalstackConfig> {
        let mut config = LocalstackConfig::resolve()?;
        if let Some(ref services) = self.services {
            config.services = ServiceRegistry::parse(services)?;
        }
        if let Some(ref name) = self.name {
            config.name = name.clone();
        }
        if let Some(ref repository) = self.repository {
            config.repository = repository.clone();
        }
        if let Some(ref tag) = self.tag {
            config.tag = tag.clone();
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct EndpointRow {
    service: &'static str,
    service_id: &'static str,
    url: String,
}

fn print_endpoints(resolver: &EndpointResolver, json: bool) -> anyhow::Result<()> {
    let endpoints = resolver.endpoints();
    let rows: Vec<EndpointRow> = endpoints
        .iter()
        .map(|(route, endpoint)| EndpointRow {
            service: route.name,
            service_id: route.service_id,
            url: endpoint.to_string(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        println!("{:<16} {}", row.service, row.url);
    }
    for name in resolver.services().names() {
        if !rows.iter().any(|row| row.service == name) {
            eprintln!("{name:<16} (no published port)");
        }
    }
    Ok(())
}

/// Acquire a container and leave it running.
pub async fn run_up_command(args: ContainerArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    if config.services.is_empty() {
        anyhow::bail!("no services requested; pass --services or set LOCALSTACK_SERVICES");
    }

    let manager = LifecycleManager::connect(&config).await?;
    let localstack = manager.acquire_from_config(&config).await?;

    tracing::info!("LocalStack container {} ready", localstack.container_id());
    print_endpoints(&localstack.endpoint_resolver(), args.json)
}

/// Purge the named container.
pub async fn run_down_command(args: ContainerArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    if config.name.is_empty() {
        anyhow::bail!("--name (or LOCALSTACK_CONTAINER_NAME) is required to find the container");
    }

    let manager = LifecycleManager::connect(&config).await?;
    match manager
        .attach(config.services.clone(), &config.name, &config.repository, &config.tag)
        .await?
    {
        Some(localstack) => {
            let id = localstack.container_id().to_string();
            manager.release(localstack).await?;
            println!("Removed {} ({})", config.name, id);
        }
        None => println!("No container named '{}' running {}", config.name, config.image()),
    }
    Ok(())
}

/// Print endpoints of the named container without starting anything.
pub async fn run_endpoints_command(args: ContainerArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    if config.name.is_empty() {
        anyhow::bail!("--name (or LOCALSTACK_CONTAINER_NAME) is required to find the container");
    }

    let manager = LifecycleManager::connect(&config).await?;
    let Some(localstack) = manager
        .attach(config.services.clone(), &config.name, &config.repository, &config.tag)
        .await?
    else {
        anyhow::bail!("no container named '{}' running {}", config.name, config.image());
    };

    print_endpoints(&localstack.endpoint_resolver(), args.json)
}
