//! Command line front end for the ECS + ELK deployment plan.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stackflow::blueprint::ecs_elk_deployment;
use stackflow::config::DeploymentConfig;
use stackflow::deploy::Deployer;
use stackflow::engine::InMemoryEngine;
use stackflow::events::LoggingEventSink;
use stackflow::observability::{init_tracing, LogFormat};
use stackflow::params::InMemoryParameterStore;
use stackflow::plan::FailureMode;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file. Environment variables prefixed with
    /// `STACKFLOW_` override its values.
    #[arg(long, global = true, env = "STACKFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, default_value = "pretty", env = "STACKFLOW_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the deployment order
    Order,
    /// Print the templates of every stack, or of one
    Synth {
        #[arg(long)]
        stack: Option<String>,
    },
    /// Deploy against the in-memory engine and store and print the report
    Simulate {
        /// Overrides the configured failure mode.
        #[arg(long)]
        failure_mode: Option<FailureMode>,
    },
}

fn deployer(config: &DeploymentConfig, failure_mode: FailureMode) -> Result<Deployer> {
    let plan = ecs_elk_deployment(config).context("Invalid deployment plan")?;
    Ok(Deployer::new(
        plan,
        Arc::new(InMemoryEngine::new()),
        Arc::new(InMemoryParameterStore::new()),
        config.target(),
    )
    .with_event_sink(Arc::new(LoggingEventSink::debug()))
    .with_failure_mode(failure_mode))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, "stackflow=info");

    let config = DeploymentConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    info!(deployment = %config.name, target = %config.target(), "Configuration loaded");

    match cli.command {
        Commands::Order => {
            let deployer = deployer(&config, config.failure_mode)?;
            for (position, stack) in deployer.plan().deployment_order().iter().enumerate() {
                let deps = deployer.plan().dependencies_of(stack);
                if deps.is_empty() {
                    println!("{}. {stack}", position + 1);
                } else {
                    println!("{}. {stack} (after {})", position + 1, deps.join(", "));
                }
            }
        }
        Commands::Synth { stack } => {
            let deployer = deployer(&config, config.failure_mode)?;
            let templates = deployer.synth().context("Synthesis failed")?;
            let rendered: Vec<serde_json::Value> = templates
                .iter()
                .filter(|t| stack.as_deref().map_or(true, |name| t.stack_name == name))
                .map(|t| t.to_json())
                .collect();
            if let Some(name) = &stack {
                if rendered.is_empty() {
                    bail!("Unknown stack '{name}'");
                }
            }
            print_json(&rendered)?;
        }
        Commands::Simulate { failure_mode } => {
            let deployer = deployer(&config, failure_mode.unwrap_or(config.failure_mode))?;
            let report = deployer.deploy().await;
            print_json(&report)?;

            let parameters = deployer.exchange().store().list(deployer.target()).await?;
            info!(parameters = parameters.len(), "Parameters in store after simulation");

            if !report.succeeded() {
                bail!(
                    "{} of {} stacks failed",
                    report.summary.failed_stacks,
                    report.summary.total_stacks
                );
            }
        }
    }

    Ok(())
}
