//! ossim - OpenSilicon circuit simulator
//!
//! Runs an operating point, DC sweep or transient analysis on a netlist
//! given as JSON (the serialized form of `ParsedNetlist`).
//!
//! # Usage
//!
//! ```bash
//! ossim divider.json
//! ossim rc.json --tran 1e-6 1e-3
//! ossim inverter.json --dc VIN 0 1.8 0.01 --json > sweep.json
//! ```

use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use opensilicon_sim::{
    analysis::{DcSweepConfig, Progress, RunControl, TranConfig},
    error::{Result, SimError},
    run_simulation_with, AnalysisConfig, Circuit, ParsedNetlist, SimulationResult, SolverOptions,
};
use tracing::{info, Level};

/// Analog circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file (JSON)
    #[arg(value_name = "NETLIST_FILE")]
    netlist_file: PathBuf,

    /// Transient analysis: STEP STOP [START]
    #[arg(long, num_args = 2..=3, value_names = ["STEP", "STOP", "START"], conflicts_with = "dc")]
    tran: Option<Vec<f64>>,

    /// DC sweep: SOURCE START STOP STEP
    #[arg(long, num_args = 4, value_names = ["SOURCE", "START", "STOP", "STEP"])]
    dc: Option<Vec<String>>,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // Load the netlist
    let text = fs::read_to_string(&args.netlist_file).map_err(|source| SimError::FileRead {
        path: args.netlist_file.display().to_string(),
        source,
    })?;
    let netlist: ParsedNetlist = serde_json::from_str(&text)?;

    // Build the circuit
    let circuit = Circuit::from_netlist(&netlist)?;
    let options = SolverOptions::from_params(&netlist.options())?;

    // Command-line analysis flags win over the netlist's own directive
    let config = match (&args.tran, &args.dc) {
        (Some(tran), _) => Some(tran_config(tran)),
        (None, Some(dc)) => Some(dc_config(dc)?),
        (None, None) => netlist.analysis(),
    };

    let mut on_progress = |p: Progress| {
        info!(percent = (p.fraction() * 100.0).round(), x = p.x, "progress");
    };
    let mut control = RunControl::new().with_progress(&mut on_progress);
    let result = run_simulation_with(&circuit, config.as_ref(), &options, &mut control)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(())
}

fn tran_config(values: &[f64]) -> AnalysisConfig {
    let mut tran = TranConfig::new(values[0], values[1]);
    if let Some(&start) = values.get(2) {
        tran = tran.with_start(start);
    }
    AnalysisConfig::Tran(tran)
}

fn dc_config(values: &[String]) -> Result<AnalysisConfig> {
    let number = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| SimError::invalid_analysis(format!("'{s}' is not a number")))
    };
    Ok(AnalysisConfig::DcSweep(DcSweepConfig::new(
        values[0].clone(),
        number(&values[1])?,
        number(&values[2])?,
        number(&values[3])?,
    )))
}

fn print_summary(result: &SimulationResult) {
    println!(
        "converged: {}  iterations: {}  elapsed: {:.3?}{}",
        result.converged,
        result.iterations,
        result.elapsed,
        if result.cancelled { "  (cancelled)" } else { "" }
    );

    if let Some(op) = &result.op_point {
        println!("\nOperating point:");
        for (label, value) in op {
            println!("  {label:<20} {value:>14.6e}");
        }
    }

    if !result.waveform.is_empty() {
        println!("\nSignals ({} points):", result.waveform.point_count());
        for signal in &result.waveform.signals {
            let (first, last) = match (signal.data.first(), signal.data.last()) {
                (Some(&(_, a)), Some(&(_, b))) => (a, b),
                _ => continue,
            };
            println!(
                "  {:<20} {:>14.6e} -> {:>14.6e} {}",
                signal.name, first, last, signal.unit
            );
        }
    }

    if !result.issues.is_empty() {
        println!("\nIssues:");
        for issue in &result.issues {
            match issue.at {
                Some(at) => println!("  [{:?}] at {at:.6e}: {}", issue.kind, issue.message),
                None => println!("  [{:?}] {}", issue.kind, issue.message),
            }
        }
    }
}
