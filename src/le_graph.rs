// Static network topology shared by the scheduler and the diameter analyzer

use indexmap::IndexMap;
use thiserror::Error;

use crate::le_interface::NodeId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("vertex {0} already exists")]
    DuplicateVertex(NodeId),

    #[error("unknown vertex {0}")]
    UnknownVertex(NodeId),

    #[error("self-loop on vertex {0}")]
    SelfLoop(NodeId),
}

#[derive(Debug, Clone, Default)]
struct Vertex {
    initiator: bool,
    neighbors: Vec<NodeId>,
}

/// Undirected graph with stable integer vertex ids.
///
/// Vertices are enumerated in insertion order and neighbor lists keep the
/// order in which edges were added; both orders feed the scheduler, so they
/// are part of what makes a run reproducible.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: IndexMap<NodeId, Vertex>,
    num_edges: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, id: NodeId, initiator: bool) -> Result<(), GraphError> {
        if self.vertices.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }
        self.vertices.insert(
            id,
            Vertex {
                initiator,
                neighbors: Vec::new(),
            },
        );
        Ok(())
    }

    /// Add an undirected edge. Returns `false` if the edge was already present.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<bool, GraphError> {
        if a == b {
            return Err(GraphError::SelfLoop(a));
        }
        for id in [a, b] {
            if !self.vertices.contains_key(&id) {
                return Err(GraphError::UnknownVertex(id));
            }
        }
        if self.vertices[&a].neighbors.contains(&b) {
            return Ok(false);
        }

        self.vertices[&a].neighbors.push(b);
        self.vertices[&b].neighbors.push(a);
        self.num_edges += 1;
        Ok(true)
    }

    pub fn neighbors(&self, id: NodeId) -> Option<&[NodeId]> {
        self.vertices.get(&id).map(|v| v.neighbors.as_slice())
    }

    /// Vertex ids in enumeration order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.vertices.keys().copied()
    }

    /// Position of a vertex in the enumeration order
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.vertices.get_index_of(&id)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    pub fn is_initiator(&self, id: NodeId) -> bool {
        self.vertices.get(&id).map_or(false, |v| v.initiator)
    }

    pub fn set_initiator(&mut self, id: NodeId, initiator: bool) -> Result<(), GraphError> {
        let vertex = self
            .vertices
            .get_mut(&id)
            .ok_or(GraphError::UnknownVertex(id))?;
        vertex.initiator = initiator;
        Ok(())
    }

    pub fn initiators(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.vertices
            .iter()
            .filter(|(_, v)| v.initiator)
            .map(|(id, _)| *id)
    }

    /// Each undirected edge once, in the order it was added from its lower-indexed end
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::with_capacity(self.num_edges);
        for (index, (id, vertex)) in self.vertices.iter().enumerate() {
            for other in &vertex.neighbors {
                if self.index_of(*other).map_or(false, |o| o > index) {
                    edges.push((*id, *other));
                }
            }
        }
        edges
    }

    /// Edge list text, one `"a b"` line per edge
    pub fn to_edge_list(&self) -> String {
        self.edges()
            .iter()
            .map(|(a, b)| format!("{} {}\n", a, b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(n: u64) -> Graph {
        let mut graph = Graph::new();
        for id in 0..n {
            graph.add_vertex(id, false).unwrap();
        }
        for id in 1..n {
            graph.add_edge(id - 1, id).unwrap();
        }
        graph
    }

    #[test]
    fn test_edges_are_symmetric() {
        let graph = path(3);

        assert_eq!(graph.neighbors(0), Some(&[1][..]));
        assert_eq!(graph.neighbors(1), Some(&[0, 2][..]));
        assert_eq!(graph.neighbors(2), Some(&[1][..]));
        assert_eq!(graph.num_edges(), 2);
    }

    #[test]
    fn test_duplicate_edge_is_ignored() {
        let mut graph = path(2);

        assert_eq!(graph.add_edge(1, 0), Ok(false));
        assert_eq!(graph.num_edges(), 1);
        assert_eq!(graph.neighbors(0), Some(&[1][..]));
    }

    #[test]
    fn test_invalid_edges_rejected() {
        let mut graph = path(2);

        assert_eq!(graph.add_edge(1, 1), Err(GraphError::SelfLoop(1)));
        assert_eq!(graph.add_edge(0, 9), Err(GraphError::UnknownVertex(9)));
        assert_eq!(graph.add_vertex(0, true), Err(GraphError::DuplicateVertex(0)));
    }

    #[test]
    fn test_enumeration_follows_insertion_order() {
        let mut graph = Graph::new();
        for id in [5, 2, 9] {
            graph.add_vertex(id, id == 9).unwrap();
        }

        assert_eq!(graph.ids().collect::<Vec<_>>(), vec![5, 2, 9]);
        assert_eq!(graph.index_of(9), Some(2));
        assert_eq!(graph.initiators().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn test_edge_list_output() {
        let mut graph = path(3);
        graph.add_edge(0, 2).unwrap();

        assert_eq!(graph.edges(), vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(graph.to_edge_list(), "0 1\n0 2\n1 2\n");
    }
}
