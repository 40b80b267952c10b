use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use walkability_survey::config::DashboardConfig;
use walkability_survey::fetch::SourceFetcher;
use walkability_survey::loader::{fallback_paths, load_csv, LoadOptions};
use walkability_survey::models::ChartKind;
use walkability_survey::survey::SurveyLoader;
use walkability_survey::table::Table;
use walkability_survey::{aggregate, report, schema};

#[derive(Parser)]
#[command(name = "walkability")]
#[command(about = "Loads and summarizes neighbourhood walkability surveys", long_about = None)]
struct Cli {
    /// JSON dashboard configuration; built-in defaults when omitted
    #[arg(long, env = "WALKABILITY_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Directory that rooted CSV paths resolve against
    #[arg(long, env = "WALKABILITY_DATA_ROOT", global = true)]
    data_root: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one survey CSV and print a summary
    Load { path: String },
    /// Profile a CSV's columns and print chart suggestions as JSON
    Schema { path: String },
    /// Aggregate one column of a survey into a chart series
    Chart {
        path: String,
        #[arg(long)]
        column: String,
        #[arg(long, default_value = "bar")]
        kind: ChartKind,
    },
    /// Generate a markdown report for every configured member
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<DashboardConfig> {
    let mut config = match &cli.config {
        Some(path) => DashboardConfig::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    if let Some(root) = &cli.data_root {
        config.data_root = root.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;
    let fetcher = Arc::new(SourceFetcher::new(config.data_root.clone()));
    let loader = SurveyLoader::new(fetcher.clone(), &config);

    match cli.command {
        Commands::Load { path } => {
            let survey = loader.load_survey(&path).await;
            if !survey.has_data() {
                for error in &survey.errors {
                    eprintln!("- {error}");
                }
                anyhow::bail!("no survey responses loaded from {path}");
            }
            println!(
                "Loaded {} responses for {} from {} ({} rows).",
                survey.responses.len(),
                survey.member.name(),
                survey.meta.source.as_deref().unwrap_or(&path),
                survey.meta.row_count
            );
            if let Some(format) = survey.format {
                println!("Format: {format}");
            }
            for warning in &survey.warnings {
                println!("- {warning}");
            }
        }
        Commands::Schema { path } => {
            let options = LoadOptions {
                max_retries: config.loader.max_retries,
                timeout: config.loader.timeout(),
                fallback_paths: fallback_paths(&path),
                backoff_base: config.loader.backoff_base(),
                skip_empty_lines: true,
            };
            let loaded = load_csv(fetcher.as_ref(), &path, &options).await;
            if loaded.table.is_empty() {
                anyhow::bail!("no rows loaded from {path}: {}", loaded.errors.join("; "));
            }
            let analysis = schema::analyze(&loaded.table);
            println!(
                "{}",
                serde_json::to_string_pretty(&analysis).context("failed to encode schema")?
            );
        }
        Commands::Chart { path, column, kind } => {
            let survey = loader.load_survey(&path).await;
            let table = Table::from_responses(&survey.responses);
            let series = aggregate::transform(&table, &column, kind);
            println!(
                "{}",
                serde_json::to_string_pretty(&series).context("failed to encode chart")?
            );
        }
        Commands::Report { out } => {
            let paths: Vec<String> = config.members.iter().map(|m| m.csv.clone()).collect();
            let surveys = loader.load_members(&paths).await;
            let report = report::build_report(&config.members, &surveys);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
