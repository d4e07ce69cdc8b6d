//! # leRust - Pulse-Based Leader Election Simulator
//!
//! A discrete-event simulation of a flooding leader-election protocol over an
//! arbitrary undirected network. Independent node automata exchange
//! `(candidate, distance)` messages through simulated channels driven by a
//! virtual logical clock, and converge on the largest node id as leader.
//!
//! ## Core Components
//!
//! - **Simulation**: event queue, logical clock and global termination tracking
//! - **NodeState**: the per-vertex protocol automaton
//! - **Diameter**: exact graph diameter by boolean matrix doubling
//! - **Graph / topology**: the static network and its generators
//!
//! ## Usage
//!
//! ```no_run
//! use le_rust::le_delay::{Poisson, Synchrony};
//! use le_rust::le_topology;
//!
//! let mut graph = le_topology::ring(10).unwrap();
//! le_topology::mark_initiators(&mut graph, &[0]).unwrap();
//!
//! let report = le_rust::run(&graph, Poisson::new(5.0), 42, Synchrony::Asynchronous).unwrap();
//! assert_eq!(report.leader, 9);
//! ```
//!
//! Runs are reproducible: the same graph, seed and synchrony flag always give
//! the same leader, termination time and event count.

pub mod le_config;
pub mod le_delay;
pub mod le_diameter;
pub mod le_graph;
pub mod le_interface;
pub mod le_node;
pub mod le_scheduler;
pub mod le_session;
pub mod le_sink;
pub mod le_topology;

// Re-export commonly used types
pub use le_config::{InitiatorConfig, SimConfig, TopologyConfig};
pub use le_delay::{DelayConfig, DelayModel, Synchrony};
pub use le_diameter::{measure_diameter, measure_diameter_bfs, Diameter, DiameterStrategy};
pub use le_graph::Graph;
pub use le_interface::{
    Event, EventSink, Message, MessageSender, NoOpSink, NodeId, SimTime, TERMINATED,
};
pub use le_node::{NodePhase, NodeState};
pub use le_scheduler::{run, RunReport, Simulation, SimulationError};
pub use le_session::{LeError, Session, SessionReport};
