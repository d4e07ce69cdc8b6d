// Simulation Configuration

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Deserialize;
use thiserror::Error;

use crate::le_delay::{DelayConfig, Synchrony};
use crate::le_diameter::DiameterStrategy;
use crate::le_graph::Graph;
use crate::le_interface::NodeId;
use crate::le_topology::{self, TopologyError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Main simulation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub topology: TopologyConfig,
    pub initiators: InitiatorConfig,
    pub synchrony: Synchrony,
    /// Extra transit delay, only sampled for asynchronous runs
    pub delay: DelayConfig,
    /// Random seed for reproducibility (None = draw from entropy)
    pub seed: Option<u64>,
    /// Trace every message through the log
    pub verbose: bool,
    pub find_diameter: bool,
    pub diameter_strategy: DiameterStrategy,
}

/// Network shape
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologyConfig {
    Line { nodes: usize },
    Ring { nodes: usize },
    Complete { nodes: usize },
    Hypercube { nodes: usize },
    Random { nodes: usize, edge_probability: f64 },
    ConnectedRings { first: usize, second: usize },
}

/// Which nodes wake up on their own.
///
/// YAML forms: `all`, `probability: 0.2` or `nodes: [0, 3]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "InitiatorRepr")]
pub enum InitiatorConfig {
    All,
    Probability(f64),
    Nodes(Vec<NodeId>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InitiatorRepr {
    Keyword(InitiatorKeyword),
    Probability { probability: f64 },
    Nodes { nodes: Vec<NodeId> },
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum InitiatorKeyword {
    All,
}

impl From<InitiatorRepr> for InitiatorConfig {
    fn from(repr: InitiatorRepr) -> Self {
        match repr {
            InitiatorRepr::Keyword(InitiatorKeyword::All) => InitiatorConfig::All,
            InitiatorRepr::Probability { probability } => InitiatorConfig::Probability(probability),
            InitiatorRepr::Nodes { nodes } => InitiatorConfig::Nodes(nodes),
        }
    }
}

// ============================================================================
// Default Configurations
// ============================================================================

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            topology: TopologyConfig::default(),
            initiators: InitiatorConfig::default(),
            synchrony: Synchrony::default(),
            delay: DelayConfig::default(),
            seed: None,
            verbose: false,
            find_diameter: false,
            diameter_strategy: DiameterStrategy::default(),
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        TopologyConfig::Ring { nodes: 10 }
    }
}

impl Default for InitiatorConfig {
    fn default() -> Self {
        InitiatorConfig::Probability(0.1)
    }
}

impl TopologyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            TopologyConfig::Line { .. } => "line",
            TopologyConfig::Ring { .. } => "ring",
            TopologyConfig::Complete { .. } => "complete",
            TopologyConfig::Hypercube { .. } => "hypercube",
            TopologyConfig::Random { .. } => "random",
            TopologyConfig::ConnectedRings { .. } => "connected_rings",
        }
    }

    /// Random topologies may come out disconnected and must be checked
    pub fn is_random(&self) -> bool {
        matches!(self, TopologyConfig::Random { .. })
    }

    pub fn generate(&self, rng: &mut StdRng) -> Result<Graph, TopologyError> {
        match *self {
            TopologyConfig::Line { nodes } => le_topology::line(nodes),
            TopologyConfig::Ring { nodes } => le_topology::ring(nodes),
            TopologyConfig::Complete { nodes } => le_topology::complete(nodes),
            TopologyConfig::Hypercube { nodes } => le_topology::hypercube(nodes),
            TopologyConfig::Random {
                nodes,
                edge_probability,
            } => le_topology::random(nodes, edge_probability, rng),
            TopologyConfig::ConnectedRings { first, second } => {
                le_topology::connected_rings(first, second)
            }
        }
    }
}

impl InitiatorConfig {
    /// Mark initiators on `graph`, returning how many there are
    pub fn apply(&self, graph: &mut Graph, rng: &mut StdRng) -> Result<usize, TopologyError> {
        match self {
            InitiatorConfig::All => le_topology::mark_all_initiators(graph),
            InitiatorConfig::Probability(p) => le_topology::assign_initiators(graph, *p, rng),
            InitiatorConfig::Nodes(ids) => le_topology::mark_initiators(graph, ids),
        }
    }
}

impl SimConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Get or generate seed
    pub fn resolve_seed(&self) -> u64 {
        self.seed
            .unwrap_or_else(|| StdRng::from_entropy().next_u64())
    }
}
