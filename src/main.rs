use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use provider_scout::config::{Config, ProfileSelection};
use provider_scout::logging;
use provider_scout::observability::metrics;
use provider_scout::pipeline::{self, Assembler, DiscoveryRun, ExportRow, RunReport};
use provider_scout::storage::{InMemoryStorage, Storage};

const CONFIG_ENV: &str = "PROVIDER_SCOUT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/discovery.toml";

#[derive(Parser)]
#[command(name = "provider_scout")]
#[command(about = "Discover, deduplicate and score provider listings from the NPI registry")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (defaults to $PROVIDER_SCOUT_CONFIG, then config/discovery.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every plan, merge, score and export
    Run {
        /// Override the scoring profile
        #[arg(long, value_enum)]
        profile: Option<ProfileArg>,
        /// Override assembly.min_score
        #[arg(long)]
        min_score: Option<i32>,
        /// Write JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Push the export rows through an in-memory store and report the counts;
        /// nothing is kept after the process exits
        #[arg(long)]
        persist: bool,
        /// Print Prometheus metrics to stderr when done
        #[arg(long)]
        print_metrics: bool,
    },
    /// Print the generated query plans without fetching anything
    Plans,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    Registry,
    Keyword,
    Auto,
}

impl From<ProfileArg> for ProfileSelection {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Registry => ProfileSelection::Registry,
            ProfileArg::Keyword => ProfileSelection::Keyword,
            ProfileArg::Auto => ProfileSelection::Auto,
        }
    }
}

#[derive(Serialize)]
struct RunExport<'a> {
    report: &'a RunReport,
    rows: &'a [ExportRow],
}

fn config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn write_output(json: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating output directory {}", parent.display()))?;
            }
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Wrote export");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    eprintln!("\n📊 Discovery run {}:", report.run_id);
    eprintln!(
        "   Plans: {} ({} exhausted, {} capped, {} failed, {} timed out, {} truncated)",
        report.plans_total,
        report.plans_exhausted,
        report.plans_capped,
        report.plans_failed,
        report.plans_deadline_exceeded,
        report.plans_truncated
    );
    eprintln!("   Pages fetched: {}", report.pages_fetched);
    eprintln!("   Raw records: {}", report.raw_records);
    eprintln!("   Unique records: {}", report.unique_records);
    eprintln!("   Exported: {}", report.exported_records);
    if let Some(persistence) = &report.persistence {
        eprintln!(
            "   Persisted: {} inserted, {} skipped, {} failed",
            persistence.inserted, persistence.skipped, persistence.failed
        );
    }
    if !report.failures.is_empty() {
        eprintln!("\n⚠️  Plans that ended early:");
        for failure in &report.failures {
            eprintln!("   - {}: {}", failure.plan, failure.reason);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let path = config_path(cli.config);
    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Invalid configuration");
            return Err(e).with_context(|| format!("loading configuration from {}", path.display()));
        }
    };

    match cli.command {
        Commands::Plans => {
            let plan_set = pipeline::plans(&config);
            for plan in &plan_set.plans {
                println!("{}", plan.label());
            }
            if plan_set.truncated > 0 {
                eprintln!("⚠️  {} plans dropped by limits.max_plans", plan_set.truncated);
            }
        }
        Commands::Run {
            profile,
            min_score,
            output,
            persist,
            print_metrics,
        } => {
            if let Err(e) = metrics::init() {
                warn!(error = %e, "Metrics recorder not installed");
            }

            let mut assembler = Assembler::from_config(&config);
            if let Some(profile) = profile {
                assembler = assembler.with_profile(profile.into());
            }
            if let Some(min_score) = min_score {
                assembler = assembler.with_min_score(min_score);
            }

            let run = DiscoveryRun::from_config(config)
                .context("building registry clients")?
                .with_assembler(assembler);

            let storage = InMemoryStorage::new();
            let storage: Option<&dyn Storage> = if persist { Some(&storage) } else { None };
            let outcome = run.execute(storage).await;

            let json = serde_json::to_string_pretty(&RunExport {
                report: &outcome.report,
                rows: &outcome.rows,
            })?;
            write_output(&json, output.as_deref())?;
            print_summary(&outcome.report);

            if print_metrics {
                match metrics::render() {
                    Some(text) => eprintln!("{}", text),
                    None => warn!("No metrics recorder installed"),
                }
            }
        }
    }

    Ok(())
}
