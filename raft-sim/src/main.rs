//! Raft leader-election cluster simulator.
//!
//! Ad hoc in-process cluster runs and the named scenarios from §8:
//! - `run` - run a single named scenario and write its summary
//! - `suite` - run every scenario and report pass/fail, optionally as JUnit XML

mod cluster;
mod fault_injection;
mod metrics;
mod scenarios;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "raft-sim")]
#[command(about = "In-process cluster runner for the leader-election protocol")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single named scenario (s1, s2, s3, b1, b2, b3)
    Run {
        #[arg(short, long, default_value = "s1")]
        scenario: String,

        #[arg(short = 'd', long, default_value = "./results")]
        output_dir: PathBuf,

        #[arg(long, default_value = "1")]
        seed: u64,
    },

    /// Run every scenario and report the combined result
    Suite {
        #[arg(short, long, default_value = "./results")]
        output_dir: PathBuf,

        #[arg(long)]
        junit_xml: Option<PathBuf>,

        #[arg(long, default_value = "1")]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Run {
            scenario,
            output_dir,
            seed,
        } => {
            let config = scenarios::get_scenario(&scenario)?;
            info!(
                "running scenario {} ({} nodes, timeouts [{}, {}])",
                config.name, config.nodes, config.min_timeout_ms, config.max_timeout_ms
            );

            let result = scenarios::run_scenario(&config, &output_dir, seed).await?;

            let summary_path = output_dir.join(&config.name).join("summary.json");
            std::fs::write(&summary_path, result.summary.export_json())?;
            info!("summary written to: {}", summary_path.display());

            if result.passed {
                println!("PASSED: {}", config.name);
            } else {
                println!(
                    "FAILED: {} ({})",
                    config.name,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
                std::process::exit(1);
            }
        }

        Commands::Suite {
            output_dir,
            junit_xml,
            seed,
        } => {
            let results = scenarios::run_suite(&output_dir, seed).await?;

            println!("\nScenario suite results:");
            println!("  total:  {}", results.total);
            println!("  passed: {}", results.passed);
            println!("  failed: {}", results.failed);

            if let Some(xml_path) = junit_xml {
                std::fs::write(&xml_path, results.to_junit_xml())?;
                info!("JUnit XML written to: {}", xml_path.display());
            }

            if results.failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
