//! Command-line adapter for the Axon coordination engine.
//!
//! A thin translator: every subcommand maps onto the coordinator's
//! canonical events (`execute_workflow`, `get_workflow_status`,
//! `cancel_workflow`, `validate_output`) and adds no policy of its own.

use axon_builtins::register_builtins;
use axon_coordinator::{
    Coordinator, CoordinatorConfig, QaThresholds, WorkflowCatalog, WorkflowSpec, COORDINATOR_AGENT,
};
use axon_core::AgentSystem;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "axon", about = "Axon — agent workflow coordination engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "axon.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow and wait for it to finish
    Run {
        /// Workflow name (registered, alias, or anything — unknown names
        /// get a synthesized one-step descriptor)
        workflow: String,
        /// Workflow parameters as a JSON object
        #[arg(short, long)]
        params: Option<String>,
        /// Explicit workflow definition (TOML file); overrides the catalog
        #[arg(short, long)]
        definition: Option<PathBuf>,
        /// Print the stored step results after completion
        #[arg(long)]
        results: bool,
    },
    /// Validate an agent output file against the QA rules
    Validate {
        /// Agent id the output claims to come from
        agent_id: String,
        /// JSON file holding the output to validate
        file: PathBuf,
    },
    /// List configured workflows and recognized aliases
    List,
    /// Show the health report for all registered agents
    Agents,
}

#[derive(Deserialize, Default)]
struct AxonConfig {
    #[serde(default)]
    qa: QaThresholds,
    #[serde(default)]
    coordinator: CoordinatorSettings,
    #[serde(default)]
    workflows: Vec<WorkflowSpec>,
}

#[derive(Deserialize)]
struct CoordinatorSettings {
    #[serde(default = "default_max_history")]
    max_history: usize,
    #[serde(default = "default_monitor_interval_secs")]
    monitor_interval_secs: u64,
    #[serde(default = "default_monitor_backoff_secs")]
    monitor_backoff_secs: u64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            monitor_interval_secs: default_monitor_interval_secs(),
            monitor_backoff_secs: default_monitor_backoff_secs(),
        }
    }
}

fn default_max_history() -> usize {
    100
}
fn default_monitor_interval_secs() -> u64 {
    30
}
fn default_monitor_backoff_secs() -> u64 {
    60
}

impl From<&CoordinatorSettings> for CoordinatorConfig {
    fn from(settings: &CoordinatorSettings) -> Self {
        Self {
            max_history: settings.max_history,
            monitor_interval: Duration::from_secs(settings.monitor_interval_secs),
            monitor_backoff: Duration::from_secs(settings.monitor_backoff_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        let raw = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", cli.config.display(), e)
        })?;
        toml::from_str(&raw)?
    } else {
        info!(config = %cli.config.display(), "No config file found, using defaults");
        AxonConfig::default()
    };

    let system = Arc::new(AgentSystem::new());
    register_builtins(&system);
    let coordinator = Arc::new(Coordinator::new(
        system.clone(),
        WorkflowCatalog::with_specs(config.workflows.clone()),
        config.qa.clone(),
        (&config.coordinator).into(),
    ));
    system.register(coordinator.clone());

    match cli.command {
        Commands::Run {
            workflow,
            params,
            definition,
            results,
        } => {
            let monitor = coordinator.start_monitor();

            let parameters: Value = match params {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Invalid --params JSON: {e}"))?,
                None => json!({}),
            };
            let workflow_def: Option<Value> = match definition {
                Some(path) => {
                    let raw = tokio::fs::read_to_string(&path).await?;
                    let spec: WorkflowSpec = toml::from_str(&raw)?;
                    Some(serde_json::to_value(spec)?)
                }
                None => None,
            };

            let receipt = send(
                &system,
                "execute_workflow",
                json!({
                    "workflow_name": workflow,
                    "workflow_def": workflow_def,
                    "parameters": parameters,
                }),
            )
            .await?;
            let workflow_id = receipt["workflow_id"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Malformed execution receipt"))?
                .to_string();
            info!(workflow_id = %workflow_id, steps = %receipt["steps"], "Workflow started");

            let report = loop {
                let report = send(
                    &system,
                    "get_workflow_status",
                    json!({ "workflow_id": workflow_id }),
                )
                .await?;
                match report["status"].as_str() {
                    Some("completed") | Some("failed") | Some("cancelled") => break report,
                    _ => tokio::time::sleep(Duration::from_millis(250)).await,
                }
            };

            println!("{}", serde_json::to_string_pretty(&report)?);
            if results {
                if let Some(execution) = coordinator
                    .find_execution(workflow_id.parse()?)
                    .await
                {
                    println!("{}", serde_json::to_string_pretty(&execution.results)?);
                }
            }

            monitor.stop();
            coordinator.shutdown().await;

            if report["status"] != "completed" {
                anyhow::bail!("Workflow ended with status {}", report["status"]);
            }
        }
        Commands::Validate { agent_id, file } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let output: Value = serde_json::from_str(&raw)?;
            let report = send(
                &system,
                "validate_output",
                json!({ "agent_id": agent_id, "output": output }),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::List => {
            let listing = json!({
                "workflows": coordinator.catalog().names(),
                "aliases": {
                    "complete-analysis | full-analysis": "semantic_analysis.analyze, knowledge_graph.update, documentation.generate",
                    "simple-analysis | quick-analysis": "semantic_analysis.analyze",
                },
            });
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Commands::Agents => {
            let report = system.health_report();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Dispatch one canonical event to the coordinator and require an answer.
async fn send(system: &AgentSystem, event_type: &str, payload: Value) -> anyhow::Result<Value> {
    system
        .send(COORDINATOR_AGENT, event_type, payload)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Coordinator did not answer {event_type}"))
}
