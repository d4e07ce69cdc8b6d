// Session: topology generation, optional diameter measurement and one election run

use log::info;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use thiserror::Error;

use crate::le_config::{ConfigError, SimConfig};
use crate::le_diameter::{self, Diameter, DiameterError};
use crate::le_graph::Graph;
use crate::le_scheduler::{RunReport, Simulation, SimulationError};
use crate::le_sink::LoggingEventSink;
use crate::le_topology::TopologyError;

#[derive(Error, Debug)]
pub enum LeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Diameter(#[from] DiameterError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("the graph is not connected")]
    Disconnected,
}

/// Everything a session produced
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub seed_used: u64,
    pub topology: &'static str,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_initiators: usize,
    pub diameter: Option<Diameter>,
    pub run: RunReport,
}

impl SessionReport {
    /// Print a summary of the session results
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║        Leader Election Results                         ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Configuration:");
        println!("  Seed: {}", self.seed_used);
        println!("  Topology: {}", self.topology);
        println!("  Nodes: {}", self.num_nodes);
        println!("  Edges: {}", self.num_edges);
        println!("  Initiators: {}", self.num_initiators);
        if let Some(diameter) = self.diameter {
            match diameter.value() {
                Some(d) => println!("  Diameter: {}", d),
                None => println!("  Diameter: disconnected"),
            }
        }
        println!();

        println!("Election:");
        println!("  Leader elected: {}", self.run.leader);
        println!("  Termination time: {}", self.run.termination_time);
        println!("  Message count: {}", self.run.event_count);
        println!("  Messages sent: {}", self.run.messages_sent);
        println!("  Trace digest: {}", hex(&self.run.trace_digest[..8]));
        println!();
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generated topology plus the RNG state that produced it
pub struct Session {
    config: SimConfig,
    seed: u64,
    rng: StdRng,
    graph: Graph,
    num_initiators: usize,
}

impl Session {
    /// Resolve the seed and generate the topology with its initiators
    pub fn new(config: SimConfig) -> Result<Self, LeError> {
        let seed = config.resolve_seed();
        info!("using random seed: {}", seed);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut graph = config.topology.generate(&mut rng)?;
        let num_initiators = config.initiators.apply(&mut graph, &mut rng)?;

        info!(
            "generated {} graph: {} nodes, {} edges, {} initiator(s)",
            config.topology.name(),
            graph.len(),
            graph.num_edges(),
            num_initiators
        );

        Ok(Self {
            config,
            seed,
            rng,
            graph,
            num_initiators,
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Measure the diameter if requested (always for random topologies,
    /// which must be connected for the election to terminate)
    fn check_diameter(&self) -> Result<Option<Diameter>, LeError> {
        if !self.config.find_diameter && !self.config.topology.is_random() {
            return Ok(None);
        }

        let diameter = le_diameter::measure(&self.graph, self.config.diameter_strategy)?;
        if !diameter.is_connected() {
            return Err(LeError::Disconnected);
        }
        info!("diameter: {:?}", diameter);
        Ok(Some(diameter))
    }

    pub fn run(mut self) -> Result<SessionReport, LeError> {
        let diameter = self.check_diameter()?;

        // simulation gets its own seed drawn after graph generation
        let sim_seed = self.rng.next_u64();
        let sink = Box::new(LoggingEventSink::new(self.config.verbose));
        let mut simulation = Simulation::new_with_sink(
            &self.graph,
            self.config.delay.clone(),
            sim_seed,
            self.config.synchrony,
            sink,
        )?;
        let run = simulation.run()?;

        Ok(SessionReport {
            seed_used: self.seed,
            topology: self.config.topology.name(),
            num_nodes: self.graph.len(),
            num_edges: self.graph.num_edges(),
            num_initiators: self.num_initiators,
            diameter,
            run,
        })
    }

    /// Build and run in one go
    pub fn execute(config: SimConfig) -> Result<SessionReport, LeError> {
        Self::new(config)?.run()
    }
}
