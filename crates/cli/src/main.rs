//! `ledgerflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — validate a workflow graph JSON file.
//! - `run`      — execute a workflow against in-memory collaborators.
//! - `nodes`    — list registered node types by category.
//! - `migrate`  — run pending database migrations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_decimal_macros::dec;
use tracing::info;

use calc::FixedRateTable;
use engine::{ExecutorConfig, NoopStore, Orchestrator, WorkflowGraph};
use nodes::collab::{InMemoryInvoices, InMemoryRenderer};
use nodes::{InvoiceRecord, NodeCategory, NodeRegistry};

#[derive(Parser)]
#[command(
    name = "ledgerflow",
    about = "Financial-document workflow orchestration engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow graph JSON file.
    Validate {
        /// Path to the workflow graph JSON file.
        path: PathBuf,
    },
    /// Execute a workflow against in-memory collaborators.
    Run {
        /// Path to the workflow graph JSON file.
        path: PathBuf,
        /// Optional invoice fixture (JSON array of records) serving as the
        /// data collaborator.
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// List registered node types by category.
    Nodes,
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

/// Rates mirroring the historical table used for INR-standardised reports.
fn default_rates() -> FixedRateTable {
    FixedRateTable::new()
        .with_rate("USD", "INR", dec!(83.50))
        .with_rate("EUR", "INR", dec!(91.20))
        .with_rate("GBP", "INR", dec!(106.50))
        .with_rate("AED", "INR", dec!(22.75))
        .with_rate("SGD", "INR", dec!(62.30))
}

fn local_registry(records: Vec<InvoiceRecord>) -> NodeRegistry {
    NodeRegistry::with_builtins(
        Arc::new(InMemoryInvoices::new(records)),
        Arc::new(default_rates()),
        InMemoryRenderer::new(),
    )
}

fn load_graph(path: &PathBuf) -> anyhow::Result<WorkflowGraph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid workflow in {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let graph = load_graph(&path)?;
            let registry = local_registry(Vec::new());
            match engine::validate(&graph, &registry) {
                Ok(order) => {
                    println!("workflow is valid; execution order: {order:?}");
                }
                Err(err) => {
                    eprintln!("validation failed: {err}");
                    std::process::exit(1);
                }
            }
        }

        Command::Run { path, data } => {
            let graph = load_graph(&path)?;

            let records: Vec<InvoiceRecord> = match data {
                Some(fixture) => {
                    let content = std::fs::read_to_string(&fixture)
                        .with_context(|| format!("cannot read {}", fixture.display()))?;
                    serde_json::from_str(&content)
                        .with_context(|| format!("invalid fixture in {}", fixture.display()))?
                }
                None => Vec::new(),
            };
            info!(invoices = records.len(), "loaded fixture data");

            let orchestrator = Orchestrator::new(
                Arc::new(local_registry(records)),
                Arc::new(NoopStore),
                ExecutorConfig::default(),
            );
            let outcome = orchestrator.run(&graph).await?;

            println!("execution {}: {}", outcome.record.id, outcome.record.status);
            for node in &outcome.record.node_results {
                println!(
                    "  {:<24} {:?} ({} ms)",
                    node.node_id,
                    node.result.status,
                    node.result.duration.as_millis()
                );
            }
            if let Some(output) = &outcome.record.aggregated_output {
                println!("{}", serde_json::to_string_pretty(output)?);
            }
        }

        Command::Nodes => {
            let registry = local_registry(Vec::new());
            for category in [
                NodeCategory::Fetch,
                NodeCategory::Calculation,
                NodeCategory::Filter,
                NodeCategory::Aggregation,
                NodeCategory::Output,
            ] {
                println!("{category}:");
                for key in registry.list_by_category(category) {
                    println!("  {key}");
                }
            }
        }

        Command::Migrate { database_url } => {
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool)
                .await
                .context("migration failed")?;
            info!("Migrations applied successfully");
        }
    }

    Ok(())
}
