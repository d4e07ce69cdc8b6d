use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;

use le_rust::le_delay::{DelayConfig, Synchrony};
use le_rust::le_diameter::DiameterStrategy;
use le_rust::{InitiatorConfig, Session, SimConfig, TopologyConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Topology {
    Line,
    Ring,
    Complete,
    Hypercube,
    Random,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Every message takes exactly one tick
    Sync,
    /// One tick plus a Poisson-distributed delay
    Async,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    Matrix,
    Bfs,
}

/// Simulate pulse-based leader election over a generated network
#[derive(Parser, Debug)]
#[command(name = "leader-election")]
#[command(about = "Discrete-event leader election simulator", long_about = None)]
struct Args {
    /// Load the whole configuration from a YAML file (other flags are ignored)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Network topology
    #[arg(long, value_enum, default_value = "ring")]
    topology: Topology,

    /// Delivery timing
    #[arg(long, value_enum, default_value = "sync")]
    synchrony: Mode,

    /// Mean extra delay of asynchronous messages
    #[arg(long, default_value = "5.0")]
    time_delay: f64,

    /// Number of nodes
    #[arg(long, short = 'n', default_value = "10")]
    nodes: usize,

    /// Probability that a node wakes up on its own
    #[arg(long, default_value = "0.1")]
    initiator_probability: f64,

    /// Edge probability for random graphs
    #[arg(long, default_value = "0.4")]
    edge_probability: f64,

    /// Measure the graph diameter before the election
    #[arg(long)]
    find_diameter: bool,

    /// Diameter algorithm
    #[arg(long, value_enum, default_value = "matrix")]
    diameter_strategy: Strategy,

    /// Random seed (drawn from entropy when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Write the generated topology as an edge list
    #[arg(long)]
    edge_list: Option<PathBuf>,

    /// Trace every message
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> SimConfig {
        let nodes = self.nodes;
        let topology = match self.topology {
            Topology::Line => TopologyConfig::Line { nodes },
            Topology::Ring => TopologyConfig::Ring { nodes },
            Topology::Complete => TopologyConfig::Complete { nodes },
            Topology::Hypercube => TopologyConfig::Hypercube { nodes },
            Topology::Random => TopologyConfig::Random {
                nodes,
                edge_probability: self.edge_probability,
            },
        };

        SimConfig {
            topology,
            initiators: InitiatorConfig::Probability(self.initiator_probability),
            synchrony: match self.synchrony {
                Mode::Sync => Synchrony::Synchronous,
                Mode::Async => Synchrony::Asynchronous,
            },
            delay: DelayConfig::Poisson {
                mean: self.time_delay,
            },
            seed: self.seed,
            verbose: self.verbose,
            find_diameter: self.find_diameter,
            diameter_strategy: match self.diameter_strategy {
                Strategy::Matrix => DiameterStrategy::MatrixDoubling,
                Strategy::Bfs => DiameterStrategy::BreadthFirst,
            },
        }
    }
}

/// Flags build the config unless a file is given; `-v` applies either way
fn load_config(args: &Args) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => args.to_config(),
    };
    config.verbose |= args.verbose;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let level = if config.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    info!("starting");
    info!("  topology: {}", config.topology.name());
    info!("  synchrony: {:?}", config.synchrony);
    info!("  delay: {:?}", config.delay);
    info!("  initiators: {:?}", config.initiators);
    info!("  find diameter: {}", config.find_diameter);

    let session = Session::new(config)?;

    if let Some(path) = &args.edge_list {
        fs::write(path, session.graph().to_edge_list())
            .with_context(|| format!("failed to write edge list to {}", path.display()))?;
        info!("edge list written to {}", path.display());
    }

    if session.graph().is_empty() {
        bail!("the generated graph has no nodes");
    }

    let report = session.run()?;
    report.print_summary();

    Ok(())
}
