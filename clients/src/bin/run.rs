//! `gridcount-run` — Builds the path-counting oracle for a problem and
//! recovers the exact count from its modular answers.
//!
//! **Usage:**
//! ```
//! gridcount-run <n> <bits> <threads> [paths | cycles | hamiltonian]
//!               [--oracle <path>] [--source-dir <path>] [--skip-build] [--report <path>]
//! ```
//!
//! Exits non-zero if the schedule runs out before two consecutive
//! reconstructions agree, or if the oracle misbehaves.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use gridcount_engine::{
    build_oracle, EnumerationMode, OracleClient, ProcessTransport, Problem, ReconstructionLoop,
    RunOutcome, RunReport, WordWidth,
};

/// Count grid paths exactly through a modular oracle.
#[derive(Parser)]
#[command(
    name = "gridcount-run",
    about = "Recover exact grid path counts from a modular oracle"
)]
struct Args {
    /// Grid size, 4 to 30.
    n: u32,

    /// Counter width of the oracle: 8, 16, 32 or 64.
    bits: u32,

    /// Worker threads used by the oracle.
    threads: u32,

    /// What to count: paths (default), cycles or hamiltonian.
    mode: Option<String>,

    /// Oracle binary to run for every modulus (default: <source-dir>/path-counter).
    #[arg(long)]
    oracle: Option<PathBuf>,

    /// Directory the oracle is built in.
    #[arg(long, default_value = ".")]
    source_dir: PathBuf,

    /// Use the existing oracle binary instead of rebuilding it.
    #[arg(long)]
    skip_build: bool,

    /// Write a JSON report of the run to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

/// Name of the binary produced by the oracle build.
const ORACLE_BINARY: &str = "path-counter";

impl Args {
    /// The oracle to run: `--oracle` if given, else the binary built in
    /// `--source-dir`.
    fn oracle_path(&self) -> PathBuf {
        self.oracle
            .clone()
            .unwrap_or_else(|| self.source_dir.join(ORACLE_BINARY))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Fail on the width before building anything.
    let width = WordWidth::from_bits(args.bits)?;
    let mode = EnumerationMode::from_arg(args.mode.as_deref());
    let problem = Problem::new(args.n, width, args.threads, mode)?;

    let oracle_path = args.oracle_path();
    if args.skip_build {
        log::info!("skipping build, using {}", oracle_path.display());
    } else {
        build_oracle(&problem, &args.source_dir).context("Failed to compile the oracle")?;
    }

    let mut report = RunReport::new(Some(problem));
    let mut oracle = OracleClient::new(ProcessTransport::new(&oracle_path), io::stdout());
    let outcome = ReconstructionLoop::from_schedule(width.schedule())
        .run(&mut oracle, |step| {
            print!("{step}");
            report.push(step);
        })
        .with_context(|| format!("Oracle run failed ({})", oracle_path.display()))?;
    report.finish(outcome.clone());

    if let Some(path) = &args.report {
        let json = report.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("report written to {}", path.display());
    }

    match outcome {
        RunOutcome::Converged { value, .. } => {
            println!("final result: {value}");
            Ok(())
        }
        RunOutcome::Exhausted { queries, .. } => {
            println!("failed to find a solution");
            eprintln!("No convergence after {queries} moduli.");
            process::exit(1);
        }
    }
}
