// Scenario Runner - Load and execute scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/ring_sync.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/ring_sync.yaml --seed 1234

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use serde::Deserialize;
use simple_logger::SimpleLogger;

use le_rust::{Diameter, NodeId, Session, SimConfig};

#[derive(Parser, Debug)]
#[command(name = "scenario_runner")]
#[command(about = "Run leader election scenarios from YAML files", long_about = None)]
struct Args {
    /// Scenario file or directory of scenario files
    path: PathBuf,

    /// Override the seed of every scenario
    #[arg(long)]
    seed: Option<u64>,

    /// Log every message
    #[arg(short, long)]
    verbose: bool,
}

/// Scenario file format
#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    meta: ScenarioMeta,

    #[serde(default)]
    config: SimConfig,

    /// Number of runs; run i uses seed + i
    #[serde(default = "default_repeat")]
    repeat: usize,

    #[serde(default)]
    expect: Expectations,
}

#[derive(Debug, Default, Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
    hypothesis: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Expectations {
    leader: Option<NodeId>,
    diameter: Option<u64>,
}

fn default_repeat() -> usize {
    1
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    SimpleLogger::new().with_level(level).init()?;

    let failures = if args.path.is_file() {
        run_scenario_file(&args.path, args.seed)?
    } else if args.path.is_dir() {
        run_scenario_directory(&args.path, args.seed)?
    } else {
        bail!("path does not exist: {}", args.path.display());
    };

    if failures > 0 {
        eprintln!("{} expectation(s) failed", failures);
        process::exit(1);
    }
    Ok(())
}

fn run_scenario_directory(dir: &Path, seed: Option<u64>) -> Result<usize> {
    let mut scenarios = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        let ext = path.extension().and_then(|s| s.to_str());
        if ext == Some("yaml") || ext == Some("yml") {
            scenarios.push(path);
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        bail!("no .yaml files found in {}", dir.display());
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  SCENARIO RUNNER - Multiple Scenarios                  ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Found {} scenario(s) to run\n", scenarios.len());

    let mut failures = 0;
    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        failures += run_scenario_file(scenario_path, seed)?;
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  All scenarios complete!                               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    Ok(failures)
}

fn run_scenario_file(path: &Path, seed: Option<u64>) -> Result<usize> {
    println!("Loading scenario from: {}", path.display());

    let yaml = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let scenario: ScenarioFile = serde_yaml::from_str(&yaml)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let title = scenario.meta.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scenario")
            .to_string()
    });
    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  {}{}║", title, " ".repeat(54_usize.saturating_sub(title.len())));
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    if let Some(ref hypothesis) = scenario.meta.hypothesis {
        println!("Hypothesis:");
        println!("  {}\n", hypothesis);
    }

    let base_seed = seed.or(scenario.config.seed);
    let mut failures = 0;

    for i in 0..scenario.repeat.max(1) {
        let mut config = scenario.config.clone();
        config.seed = base_seed.map(|s| s.wrapping_add(i as u64));

        let report = Session::execute(config)
            .with_context(|| format!("run {} of {} failed", i + 1, path.display()))?;
        report.print_summary();

        if let Some(expected) = scenario.expect.leader {
            if report.run.leader != expected {
                warn!("run {}: expected leader {}, got {}", i + 1, expected, report.run.leader);
                println!("  ✗ leader {} (expected {})", report.run.leader, expected);
                failures += 1;
            } else {
                println!("  ✓ leader {}", expected);
            }
        }

        if let Some(expected) = scenario.expect.diameter {
            match report.diameter {
                Some(Diameter::Exact(d)) if d == expected => println!("  ✓ diameter {}", d),
                other => {
                    warn!("run {}: expected diameter {}, got {:?}", i + 1, expected, other);
                    println!("  ✗ diameter {:?} (expected {})", other, expected);
                    failures += 1;
                }
            }
        }
    }

    info!("{}: {} failure(s)", title, failures);
    Ok(failures)
}
