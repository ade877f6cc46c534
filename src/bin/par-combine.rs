//! Parallel Elementwise Combine - Benchmark Entry Point
//!
//! Fills two large buffers with random values, combines them on a worker pool and
//! prints the combine time, the result length and one spot-check element.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use par_combine_core::{Backing, BinaryOp, CombineController, RunConfig, Schedule};

/// Parallel elementwise buffer combination benchmark
#[derive(Parser, Debug)]
#[command(name = "par-combine")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML file with run settings; flags below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Elements per buffer
    #[arg(short = 'n', long)]
    elements: Option<usize>,

    /// Worker threads (default: runtime-determined)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Partitioning strategy
    #[arg(long, value_enum)]
    schedule: Option<Schedule>,

    /// Elementwise operation
    #[arg(long, value_enum)]
    op: Option<BinaryOp>,

    /// Buffer storage
    #[arg(long, value_enum)]
    backing: Option<Backing>,

    /// Seed for the input fill
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show per-worker private copies of a captured value
    Firstprivate {
        /// Value visible before the parallel region
        #[arg(long, default_value = "25")]
        initial: i64,
    },
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(elements) = self.elements {
            config.elements = elements;
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if let Some(schedule) = self.schedule {
            config.schedule = schedule;
        }
        if let Some(op) = self.op {
            config.operation = op;
        }
        if let Some(backing) = self.backing {
            config.backing = backing;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = cli.run_config()?;
    let mut controller = CombineController::new(config).context("Failed to set up run")?;

    match cli.command {
        Some(Commands::Firstprivate { initial }) => {
            println!("Value of n before the region: {}", initial);
            for copy in controller.firstprivate_demo(initial) {
                println!(
                    "Worker {}: n on entry = {}, n on exit = {}",
                    copy.worker, copy.on_entry, copy.on_exit
                );
            }
            // `initial` was only lent to the workers
            println!("Value of n after the region: {}", initial);
        }
        None => {
            let outcome = controller.run().context("Run failed")?;
            println!("{}", outcome.report);
        }
    }

    Ok(())
}
