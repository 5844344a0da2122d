use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use housing_effects::config::Config;
use housing_effects::constants::OUTER_RADIUS_MILES;
use housing_effects::logging;
use housing_effects::observability;
use housing_effects::pipeline::processing::classify;
use housing_effects::pipeline::Pipeline;
use housing_effects::report::AnalysisReport;
use housing_effects::synthetic::{self, SyntheticConfig};
use housing_effects::types::Grouping;

#[derive(Parser)]
#[command(name = "housing_effects")]
#[command(about = "Sale-price effects of nearby subsidized housing")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis over the configured input files
    Run {
        /// TOML configuration file; built-in defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// Report directory, overriding the configured one
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate a synthetic dataset and analyse it
    Demo {
        #[arg(long, default_value = "output/demo")]
        output: PathBuf,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Number of sale rows to generate
        #[arg(long, default_value_t = 2000)]
        sales: usize,
    },
    /// Print the cohort group for a single sale
    Classify {
        #[arg(long)]
        distance: f64,
        #[arg(long)]
        sale_year: i32,
        #[arg(long)]
        housing_year: i32,
        /// Use the full grouping instead of inside-only
        #[arg(long)]
        full: bool,
        /// Outer radius in miles for the inside-only grouping
        #[arg(long, default_value_t = OUTER_RADIUS_MILES)]
        outer_radius: f64,
    },
}

fn execute(config: Config) -> anyhow::Result<AnalysisReport> {
    if config.output.write_metrics {
        observability::init();
    }

    let report_dir = config.output.report_dir.clone();
    let write_metrics = config.output.write_metrics;

    let report = Pipeline::new(config).run().context("Analysis run failed")?;
    report.print_summary();

    let path = report
        .persist_to_json(&report_dir)
        .with_context(|| format!("Failed to write report to {}", report_dir.display()))?;
    info!("💾 Saved report to {}", path.display());
    println!("\n💾 Saved report to {}", path.display());

    if write_metrics {
        let metrics_path = report_dir.join("metrics.prom");
        if observability::write_snapshot(&metrics_path).context("Failed to write metrics snapshot")? {
            println!("📏 Metrics snapshot: {}", metrics_path.display());
        }
    }
    Ok(report)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = Config::load_or_default(path);
    match path {
        Some(p) => config.with_context(|| format!("Failed to load config from {}", p.display())),
        None => config.context("Built-in configuration is invalid"),
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = output {
                config.output.report_dir = dir;
            }
            let _guard = logging::init_logging(&config.output.log_dir);
            println!("🚀 Running analysis...");
            if let Err(e) = execute(config) {
                error!("Analysis failed: {:#}", e);
                return Err(e);
            }
        }
        Commands::Demo { output, seed, sales } => {
            let mut config = Config::default();
            config.output.report_dir = output.clone();
            config.output.log_dir = output.join("logs");
            config.output.write_metrics = true;
            let _guard = logging::init_logging(&config.output.log_dir);

            println!("🧪 Generating synthetic dataset (seed {}, {} sales)...", seed, sales);
            let synthetic_config = SyntheticConfig {
                seed,
                sales,
                ..SyntheticConfig::default()
            };
            let (inputs, _) = synthetic::generate(&output.join("data"), &synthetic_config)
                .context("Failed to generate synthetic data")?;
            config.inputs = inputs;

            if let Err(e) = execute(config) {
                error!("Demo analysis failed: {:#}", e);
                return Err(e);
            }
        }
        Commands::Classify {
            distance,
            sale_year,
            housing_year,
            full,
            outer_radius,
        } => {
            let grouping = if full { Grouping::Full } else { Grouping::InsideOnly };
            println!("{}", classify(grouping, distance, sale_year, housing_year, outer_radius));
        }
    }
    Ok(())
}
