// Topology generators
//
// Every generator numbers its vertices 0..n in insertion order. Initiators
// are assigned separately so the same shape can be reused with different
// wake-up patterns.

use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

use crate::le_graph::{Graph, GraphError};
use crate::le_interface::NodeId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("no initiators were selected")]
    NoInitiators,

    #[error("hypercube size {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

fn with_vertices(num_nodes: usize) -> Result<Graph, TopologyError> {
    let mut graph = Graph::new();
    for id in 0..num_nodes as NodeId {
        graph.add_vertex(id, false)?;
    }
    Ok(graph)
}

fn check_probability(probability: f64) -> Result<(), TopologyError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(TopologyError::InvalidProbability(probability))
    }
}

/// Path 0 - 1 - ... - (n-1)
pub fn line(num_nodes: usize) -> Result<Graph, TopologyError> {
    let mut graph = with_vertices(num_nodes)?;
    for id in 1..num_nodes as NodeId {
        graph.add_edge(id - 1, id)?;
    }
    Ok(graph)
}

/// Cycle over n vertices. Below three vertices the closing edge would be a
/// self-loop or a duplicate, so the result degenerates to a line.
pub fn ring(num_nodes: usize) -> Result<Graph, TopologyError> {
    let mut graph = line(num_nodes)?;
    if num_nodes >= 3 {
        graph.add_edge(0, num_nodes as NodeId - 1)?;
    }
    Ok(graph)
}

pub fn complete(num_nodes: usize) -> Result<Graph, TopologyError> {
    let mut graph = with_vertices(num_nodes)?;
    for a in 0..num_nodes as NodeId {
        for b in (a + 1)..num_nodes as NodeId {
            graph.add_edge(a, b)?;
        }
    }
    Ok(graph)
}

/// Two rings of `a` and `b` vertices joined by a bridge between vertex 0 and vertex `a`
pub fn connected_rings(a: usize, b: usize) -> Result<Graph, TopologyError> {
    let mut graph = with_vertices(a + b)?;

    for (offset, size) in [(0, a), (a, b)] {
        let first = offset as NodeId;
        for i in 1..size as NodeId {
            graph.add_edge(first + i - 1, first + i)?;
        }
        if size >= 3 {
            graph.add_edge(first, first + size as NodeId - 1)?;
        }
    }

    if a > 0 && b > 0 {
        graph.add_edge(0, a as NodeId)?;
    }
    Ok(graph)
}

/// Hypercube: vertices adjacent iff their ids differ in exactly one bit
pub fn hypercube(num_nodes: usize) -> Result<Graph, TopologyError> {
    if !num_nodes.is_power_of_two() {
        return Err(TopologyError::NotPowerOfTwo(num_nodes));
    }

    let mut graph = with_vertices(num_nodes)?;
    let dimensions = num_nodes.trailing_zeros();
    for id in 0..num_nodes as NodeId {
        for bit in 0..dimensions {
            let other = id ^ (1 << bit);
            if other > id {
                graph.add_edge(id, other)?;
            }
        }
    }
    Ok(graph)
}

/// Erdos-Renyi G(n, p): every unordered pair becomes an edge independently
pub fn random(
    num_nodes: usize,
    edge_probability: f64,
    rng: &mut StdRng,
) -> Result<Graph, TopologyError> {
    check_probability(edge_probability)?;

    let mut graph = with_vertices(num_nodes)?;
    for a in 0..num_nodes as NodeId {
        for b in (a + 1)..num_nodes as NodeId {
            if rng.gen_bool(edge_probability) {
                graph.add_edge(a, b)?;
            }
        }
    }
    log::debug!(
        "random graph: {} nodes, {} edges (p={})",
        num_nodes,
        graph.num_edges(),
        edge_probability
    );
    Ok(graph)
}

/// Flag each vertex as initiator with the given probability.
///
/// Fails with `NoInitiators` when the draw selects nobody: the protocol
/// needs at least one node that wakes up on its own.
pub fn assign_initiators(
    graph: &mut Graph,
    probability: f64,
    rng: &mut StdRng,
) -> Result<usize, TopologyError> {
    check_probability(probability)?;

    let ids: Vec<NodeId> = graph.ids().collect();
    let mut selected = 0;
    for id in ids {
        let initiator = rng.gen_bool(probability);
        if initiator {
            log::debug!("node {} is an initiator", id);
            selected += 1;
        }
        graph.set_initiator(id, initiator)?;
    }

    if selected == 0 {
        return Err(TopologyError::NoInitiators);
    }
    Ok(selected)
}

pub fn mark_initiators(graph: &mut Graph, ids: &[NodeId]) -> Result<usize, TopologyError> {
    if ids.is_empty() {
        return Err(TopologyError::NoInitiators);
    }
    for id in ids {
        graph.set_initiator(*id, true)?;
    }
    Ok(graph.initiators().count())
}

pub fn mark_all_initiators(graph: &mut Graph) -> Result<usize, TopologyError> {
    let ids: Vec<NodeId> = graph.ids().collect();
    mark_initiators(graph, &ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_line_and_ring_shapes() {
        let line = line(5).unwrap();
        assert_eq!(line.num_edges(), 4);
        assert_eq!(line.neighbors(0), Some(&[1][..]));

        let ring = ring(5).unwrap();
        assert_eq!(ring.num_edges(), 5);
        assert_eq!(ring.neighbors(0), Some(&[1, 4][..]));
        assert_eq!(ring.neighbors(4), Some(&[3, 0][..]));
    }

    #[test]
    fn test_small_rings_degenerate() {
        assert_eq!(ring(1).unwrap().num_edges(), 0);
        assert_eq!(ring(2).unwrap().num_edges(), 1);
        assert_eq!(ring(0).unwrap().len(), 0);
    }

    #[test]
    fn test_complete_graph_edges() {
        let graph = complete(6).unwrap();
        assert_eq!(graph.num_edges(), 15);
        assert!(graph.ids().all(|id| graph.neighbors(id).unwrap().len() == 5));
    }

    #[test]
    fn test_connected_rings_bridge() {
        let graph = connected_rings(5, 7).unwrap();
        assert_eq!(graph.len(), 12);
        // 5 + 7 ring edges plus the bridge
        assert_eq!(graph.num_edges(), 13);
        assert!(graph.neighbors(0).unwrap().contains(&5));
        assert!(graph.neighbors(5).unwrap().contains(&0));
    }

    #[test]
    fn test_hypercube() {
        let graph = hypercube(8).unwrap();
        assert_eq!(graph.num_edges(), 12);
        assert_eq!(graph.neighbors(0), Some(&[1, 2, 4][..]));

        assert_eq!(hypercube(6).unwrap_err(), TopologyError::NotPowerOfTwo(6));
        assert_eq!(hypercube(1).unwrap().num_edges(), 0);
    }

    #[test]
    fn test_random_graph_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(random(6, 0.0, &mut rng).unwrap().num_edges(), 0);
        assert_eq!(random(6, 1.0, &mut rng).unwrap().num_edges(), 15);
        assert_eq!(
            random(6, 1.5, &mut rng).unwrap_err(),
            TopologyError::InvalidProbability(1.5)
        );
    }

    #[test]
    fn test_random_graph_is_reproducible() {
        let a = random(20, 0.3, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = random(20, 0.3, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a.edges(), b.edges());
    }

    #[test]
    fn test_initiator_assignment() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut graph = line(4).unwrap();

        assert_eq!(
            assign_initiators(&mut graph, 0.0, &mut rng),
            Err(TopologyError::NoInitiators)
        );
        assert_eq!(assign_initiators(&mut graph, 1.0, &mut rng), Ok(4));

        let mut graph = line(4).unwrap();
        assert_eq!(mark_initiators(&mut graph, &[2]), Ok(1));
        assert!(graph.is_initiator(2));
        assert!(!graph.is_initiator(0));
        assert_eq!(mark_initiators(&mut graph, &[]), Err(TopologyError::NoInitiators));
        assert_eq!(mark_all_initiators(&mut graph), Ok(4));
    }
}
