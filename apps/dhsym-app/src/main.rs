//! Symbolic DH Jacobian derivation CLI.
//!
//! Provides three modes of operation:
//! - `derive`: Derive the symbolic Jacobian for a robot description
//! - `eval`: Evaluate a derived Jacobian at a joint configuration
//! - `info`: Print workspace crate versions and the wire format

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dhsym_core::prelude::*;
use dhsym_jacobian::{FinalJacobianData, JacobianEvaluator};
use dhsym_pipeline::JacobianPipeline;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Symbolic Jacobian derivation for serial DH manipulators.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the symbolic Jacobian for a robot description.
    Derive {
        /// Robot description TOML file.
        description: PathBuf,

        /// Write the full artifact as TOML instead of printing matrices.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the end-effector-frame Jacobian as well.
        #[arg(long)]
        complete: bool,
    },

    /// Evaluate the base-frame Jacobian at a joint configuration.
    Eval {
        /// Robot description TOML file.
        description: PathBuf,

        /// Joint values, one per actuated joint (radians or meters).
        #[arg(short = 'q', long = "joint", value_name = "VALUE", num_args = 1..)]
        joints: Vec<f64>,

        /// Joint rates; when given, also print the Cartesian velocity.
        #[arg(long = "rate", value_name = "VALUE", num_args = 1..)]
        rates: Vec<f64>,
    },

    /// Print crate information.
    Info,
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run_derive(
    description: &PathBuf,
    output: Option<&PathBuf>,
    complete: bool,
) -> Result<(), String> {
    let desc = load_description(description)?;
    let data = derive(desc.clone())?;

    println!(
        "{}: {} joints, {} actuated ({})",
        desc.name,
        desc.joints.len(),
        desc.dof(),
        data.version
    );

    if complete {
        println!();
        println!("end-effector frame:");
        println!("{}", data.complete_jacobian);
    }
    println!();
    println!("base frame:");
    println!("{}", data.final_jacobian);

    if let Some(path) = output {
        let text =
            toml::to_string_pretty(&data).map_err(|e| format!("serialize artifact: {e}"))?;
        std::fs::write(path, text).map_err(|e| format!("write {}: {e}", path.display()))?;
        println!();
        println!("artifact written to {}", path.display());
    }
    Ok(())
}

fn run_eval(description: &PathBuf, joints: &[f64], rates: &[f64]) -> Result<(), String> {
    let desc = load_description(description)?;
    let data = derive(desc.clone())?;
    let evaluator = JacobianEvaluator::new(&data, &desc);

    let jacobian = evaluator
        .evaluate(joints)
        .map_err(|e| format!("evaluate: {e}"))?;
    println!("jacobian at q = {joints:?}:");
    for r in 0..jacobian.nrows() {
        let row: Vec<String> = (0..jacobian.ncols())
            .map(|c| format!("{:>12.6}", jacobian[(r, c)]))
            .collect();
        println!("  [{}]", row.join(", "));
    }

    if !rates.is_empty() {
        let velocity = evaluator
            .cartesian_velocity(joints, rates)
            .map_err(|e| format!("cartesian velocity: {e}"))?;
        println!();
        println!(
            "cartesian velocity: v=[{:.6}, {:.6}, {:.6}], w=[{:.6}, {:.6}, {:.6}]",
            velocity[0], velocity[1], velocity[2], velocity[3], velocity[4], velocity[5]
        );
    }
    Ok(())
}

fn run_info() {
    println!("dhsym v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  dhsym-core     {}", env!("CARGO_PKG_VERSION"));
    println!("  dhsym-expr     {}", env!("CARGO_PKG_VERSION"));
    println!("  dhsym-jacobian {}", env!("CARGO_PKG_VERSION"));
    println!("  dhsym-pipeline {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("wire format: matrix([e11,e12,...],[e21,...],...)");
    println!("symbols: t{{n}} td{{n}} (revolute), d{{n}} dd{{n}} (prismatic)");
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_description(path: &PathBuf) -> Result<RobotDescription, String> {
    RobotDescription::load(path).map_err(|e| format!("load {}: {e}", path.display()))
}

fn derive(desc: RobotDescription) -> Result<FinalJacobianData, String> {
    let pipeline = JacobianPipeline::spawn();
    pipeline
        .request(desc)
        .map_err(|e| format!("request: {e}"))?;
    pipeline.settled().map_err(|e| format!("derive: {e}"))
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Derive {
            description,
            output,
            complete,
        } => run_derive(&description, output.as_ref(), complete),
        Commands::Eval {
            description,
            joints,
            rates,
        } => run_eval(&description, &joints, &rates),
        Commands::Info => {
            run_info();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
