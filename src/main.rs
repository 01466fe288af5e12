use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use stepflow::executor::browser::{BrowserConfig, BrowserExecutor, BrowserKind};
use stepflow::executor::remote::RemoteExecutor;
use stepflow::executor::StepExecutor;
use stepflow::model::RunStatus;
use stepflow::runner::{execute_flow, ConsoleRunListener, ContinuationPolicy, EventEmitter};
use stepflow::server::{self, AppState};
use stepflow::store::{FileStorage, StateCoordinator};
use stepflow::transfer;
use stepflow::utils::config::AppConfig;

#[derive(Parser)]
#[command(name = "stepflow")]
#[command(version = "0.1.0")]
#[command(about = "Browser test-flow orchestration engine", long_about = None)]
struct Cli {
    /// Directory holding the durable state collections
    #[arg(long, global = true, default_value = ".stepflow")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the run API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 9333)]
        port: u16,

        /// Run browsers headless
        #[arg(long)]
        headless: bool,

        /// Browser to execute steps with (chromium, firefox, webkit)
        #[arg(long, default_value = "chromium")]
        browser: String,

        /// Forward steps to a remote run API instead of a local browser
        #[arg(long)]
        executor_url: Option<String>,
    },

    /// Run a saved flow by name or id
    Run {
        /// Flow name or id
        flow: String,

        /// Abort at the first failed step instead of finishing the sequence
        #[arg(long)]
        stop_on_failure: bool,

        /// Run the browser headless
        #[arg(long)]
        headless: bool,

        /// Override the flow's configured browser
        #[arg(long)]
        browser: Option<String>,

        /// Forward steps to a remote run API instead of a local browser
        #[arg(long)]
        executor_url: Option<String>,
    },

    /// List saved flows
    Flows,

    /// List recent run reports
    Reports {
        /// Maximum number of reports to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Export a flow or report to a JSON document
    Export {
        /// Flow name or id to export
        #[arg(long)]
        flow: Option<String>,

        /// Report id to export
        #[arg(long)]
        report: Option<String>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import a flow document
    Import {
        /// Path to an exported flow JSON file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let coordinator = open_state(&cli.state_dir)?;

    match cli.command {
        Commands::Serve {
            port,
            headless,
            browser,
            executor_url,
        } => {
            let executor = build_executor(executor_url, &browser, headless)?;
            let config = AppConfig::default();

            coordinator.clone().spawn_watch();
            coordinator
                .clone()
                .spawn_sweeper(std::time::Duration::from_secs(config.sweep_interval_secs));

            let state = Arc::new(AppState {
                coordinator,
                executor,
            });
            server::serve(state, port).await?;
        }

        Commands::Run {
            flow,
            stop_on_failure,
            headless,
            browser,
            executor_url,
        } => {
            let target = coordinator
                .flow_by_name(&flow)
                .or_else(|| coordinator.flow_by_id(&flow));
            let target = match target {
                Some(target) => target,
                None => bail!("no saved flow named \"{}\"", flow),
            };

            let browser = browser.unwrap_or_else(|| target.browser.clone());
            let executor = build_executor(executor_url, &browser, headless)?;
            let policy = if stop_on_failure {
                ContinuationPolicy::StopOnFailure
            } else {
                ContinuationPolicy::ContinueOnFailure
            };

            let (emitter, receiver) = EventEmitter::new();
            tokio::spawn(ConsoleRunListener::listen(receiver));

            let report =
                execute_flow(&coordinator, executor, emitter, &target, policy, "cli").await?;

            // Give the listener a moment to flush its final line.
            tokio::time::sleep(std::time::Duration::from_millis(150)).await;

            println!(
                "\n  {}/{} steps passed ({} attempted)",
                report.passed_steps, report.total_steps, report.completed_steps
            );
            if report.status == RunStatus::Error {
                std::process::exit(1);
            }
        }

        Commands::Flows => {
            let flows = coordinator.flows();
            if flows.is_empty() {
                println!("No saved flows.");
            }
            for flow in flows {
                println!(
                    "{}  {} ({} steps, {}) {}",
                    flow.id.dimmed(),
                    flow.name.white().bold(),
                    flow.steps.len(),
                    flow.browser,
                    flow.duration.as_deref().unwrap_or("")
                );
            }
        }

        Commands::Reports { limit } => {
            let reports = coordinator.reports();
            if reports.is_empty() {
                println!("No reports yet.");
            }
            for report in reports.iter().take(limit) {
                let status = match report.status {
                    RunStatus::Success => "PASSED".green().bold(),
                    RunStatus::Error => "FAILED".red().bold(),
                };
                let stamp = report
                    .timestamp
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {} [{}] {}/{} in {} ({})",
                    stamp.dimmed(),
                    report.test_name.white().bold(),
                    status,
                    report.passed_steps,
                    report.total_steps,
                    report.duration,
                    report.trigger
                );
            }
        }

        Commands::Export {
            flow,
            report,
            output,
        } => {
            let doc = match (flow, report) {
                (Some(flow), None) => {
                    let target = coordinator
                        .flow_by_name(&flow)
                        .or_else(|| coordinator.flow_by_id(&flow))
                        .with_context(|| format!("no saved flow named \"{}\"", flow))?;
                    serde_json::to_value(transfer::export_flow(&target))?
                }
                (None, Some(report)) => {
                    let target = coordinator
                        .report_by_id(&report)
                        .with_context(|| format!("no report with id \"{}\"", report))?;
                    serde_json::to_value(transfer::export_report(&target))?
                }
                _ => bail!("pass exactly one of --flow or --report"),
            };

            std::fs::write(&output, serde_json::to_string_pretty(&doc)?)
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("{} Exported to {}", "✓".green(), output.display());
        }

        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let doc: serde_json::Value =
                serde_json::from_str(&raw).context("import file is not valid JSON")?;

            let flow = transfer::import_flow(&doc)?;
            let added = coordinator.add_flow(flow);
            println!(
                "{} Imported \"{}\" ({} steps) as {}",
                "✓".green(),
                added.name,
                added.steps.len(),
                added.id
            );
        }
    }

    Ok(())
}

fn open_state(state_dir: &PathBuf) -> Result<Arc<StateCoordinator>> {
    let storage = Arc::new(FileStorage::open(state_dir)?);
    let coordinator = StateCoordinator::load(storage);
    if let Some(error) = coordinator.load_error() {
        bail!("cannot load state from {}: {}", state_dir.display(), error);
    }
    Ok(coordinator)
}

fn build_executor(
    executor_url: Option<String>,
    browser: &str,
    headless: bool,
) -> Result<Arc<dyn StepExecutor>> {
    if let Some(url) = executor_url {
        return Ok(Arc::new(RemoteExecutor::new(url)));
    }

    let kind: BrowserKind = browser.parse()?;
    let config = BrowserConfig {
        kind,
        headless: headless || BrowserConfig::default().headless,
        ..BrowserConfig::default()
    };
    Ok(Arc::new(BrowserExecutor::new(config)))
}
