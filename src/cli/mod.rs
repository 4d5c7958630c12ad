//! CLI command handling.
//!
//! Provides subcommands for:
//! - Starting or reusing an emulator container (`up`)
//! - Purging a named container (`down`)
//! - Printing endpoints of a running container (`endpoints`)
//! - Listing the supported services and their ports (`services`)

mod container;
mod services;

pub use container::{ContainerArgs, run_down_command, run_endpoints_command, run_up_command};
pub use services::run_services_command;

use clap::{ColorChoice, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "localstack-harness")]
#[command(about = "Disposable LocalStack containers for integration tests")]
#[command(
    long_about = "Starts, inspects and purges LocalStack containers.\nExamples:\n  localstack-harness up --services dynamodb,s3 --name itest\n  localstack-harness down --name itest"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit JSON logs instead of human-readable ones
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start (or reuse) a container and wait until its services are ready
    #[command(
        about = "Start or reuse a LocalStack container",
        long_about = "Discovers a running container by name and image, or starts one, then waits for every service to log 'Ready.'.\nThe container is left running.\nExample: localstack-harness up --services dynamodb --name itest"
    )]
    Up(ContainerArgs),

    /// Purge a named container
    #[command(
        about = "Stop and remove a LocalStack container",
        long_about = "Finds the container by name and image and removes it with its volumes.\nExample: localstack-harness down --name itest"
    )]
    Down(ContainerArgs),

    /// Print the endpoints of an already running container
    #[command(
        about = "Show service endpoints",
        long_about = "Resolves each requested service to the container's published port without starting anything.\nExample: localstack-harness endpoints --name itest --services s3"
    )]
    Endpoints(ContainerArgs),

    /// List supported services and their internal ports
    Services {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run a parsed command.
pub async fn run_command(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Up(args) => run_up_command(args).await,
        Command::Down(args) => run_down_command(args).await,
        Command::Endpoints(args) => run_endpoints_command(args).await,
        Command::Services { json } => run_services_command(json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_up() {
        let cli = Cli::try_parse_from([
            "localstack-harness",
            "up",
            "--services",
            "dynamodb,s3",
            "--name",
            "itest",
            "--tag",
            "latest",
        ])
        .unwrap();

        match cli.command {
            Command::Up(args) => {
                assert_eq!(args.services.as_deref(), Some("dynamodb,s3"));
                assert_eq!(args.name.as_deref(), Some("itest"));
                assert_eq!(args.tag.as_deref(), Some("latest"));
                assert!(args.repository.is_none());
                assert!(!args.json);
            }
            other => panic!("expected up, got {other:?}"),
        }
    }

    #[test]
    fn test_services_takes_no_container_args() {
        assert!(Cli::try_parse_from(["localstack-harness", "services", "--name", "x"]).is_err());
    }
}
