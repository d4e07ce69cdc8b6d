// Exact graph diameter
//
// Matrix doubling: with M the reflexive adjacency relation, M^(2^k) is
// "reachable within 2^k hops". Square until the relation is total (or stops
// changing, which means the graph is disconnected), then binary search the
// exponent between 2^(K-1) and 2^K by composing the memoised powers.

use std::collections::VecDeque;

use serde::Deserialize;
use thiserror::Error;

use crate::le_graph::Graph;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiameterError {
    #[error("diameter bounds met too quickly (lower {lower}, upper {upper})")]
    BoundsMetEarly { lower: u64, upper: u64 },

    #[error("diameter bounds did not meet (lower {lower}, upper {upper})")]
    BoundsMismatch { lower: u64, upper: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diameter {
    /// Longest shortest path over all vertex pairs
    Exact(u64),
    /// Some pair of vertices has no path between them
    Disconnected,
}

impl Diameter {
    pub fn value(&self) -> Option<u64> {
        match self {
            Diameter::Exact(d) => Some(*d),
            Diameter::Disconnected => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Diameter::Exact(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiameterStrategy {
    #[default]
    MatrixDoubling,
    BreadthFirst,
}

pub fn measure(graph: &Graph, strategy: DiameterStrategy) -> Result<Diameter, DiameterError> {
    match strategy {
        DiameterStrategy::MatrixDoubling => measure_diameter(graph),
        DiameterStrategy::BreadthFirst => Ok(measure_diameter_bfs(graph)),
    }
}

/// Square boolean matrix, one bitset row per vertex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolMatrix {
    size: usize,
    words: usize,
    rows: Vec<u64>,
}

impl BoolMatrix {
    pub fn new(size: usize) -> Self {
        let words = (size + 63) / 64;
        Self {
            size,
            words,
            rows: vec![0; size * words],
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut m = Self::new(size);
        for i in 0..size {
            m.set(i, i);
        }
        m
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.rows[row * self.words + col / 64] & (1 << (col % 64)) != 0
    }

    pub fn set(&mut self, row: usize, col: usize) {
        self.rows[row * self.words + col / 64] |= 1 << (col % 64);
    }

    fn row(&self, row: usize) -> &[u64] {
        &self.rows[row * self.words..(row + 1) * self.words]
    }

    /// Boolean product: (self * other)[i][j] = OR_k self[i][k] AND other[k][j]
    pub fn multiply(&self, other: &BoolMatrix) -> BoolMatrix {
        debug_assert_eq!(self.size, other.size);

        let mut product = BoolMatrix::new(self.size);
        for i in 0..self.size {
            let start = i * self.words;
            for k in 0..self.size {
                if self.get(i, k) {
                    for (word, bits) in other.row(k).iter().enumerate() {
                        product.rows[start + word] |= bits;
                    }
                }
            }
        }
        product
    }

    pub fn square(&self) -> BoolMatrix {
        self.multiply(self)
    }

    /// True when every entry is set
    pub fn is_full(&self) -> bool {
        if self.size == 0 {
            return true;
        }

        let tail_bits = self.size % 64;
        let last_mask = if tail_bits == 0 {
            u64::MAX
        } else {
            (1u64 << tail_bits) - 1
        };

        (0..self.size).all(|i| {
            let row = self.row(i);
            let (last, full) = row.split_last().map_or((0, &[][..]), |(l, f)| (*l, f));
            full.iter().all(|w| *w == u64::MAX) && last & last_mask == last_mask
        })
    }

    /// Reflexive adjacency relation of a graph, indexed by enumeration position
    pub fn reachability(graph: &Graph) -> BoolMatrix {
        let mut m = BoolMatrix::identity(graph.len());
        for (i, id) in graph.ids().enumerate() {
            for neighbor in graph.neighbors(id).unwrap_or_default() {
                if let Some(j) = graph.index_of(*neighbor) {
                    m.set(i, j);
                }
            }
        }
        m
    }
}

/// Exact diameter by boolean matrix doubling and binary search
pub fn measure_diameter(graph: &Graph) -> Result<Diameter, DiameterError> {
    if graph.len() <= 1 {
        return Ok(Diameter::Exact(0));
    }

    // powers[k] = reachable within 2^k hops
    let mut powers = vec![BoolMatrix::reachability(graph)];
    if powers[0].is_full() {
        return Ok(Diameter::Exact(1));
    }

    loop {
        let last = &powers[powers.len() - 1];
        let next = last.square();
        if next == *last {
            // steady state without covering every pair
            return Ok(Diameter::Disconnected);
        }
        let full = next.is_full();
        powers.push(next);
        if full {
            break;
        }
    }

    let log_upper = (powers.len() - 1) as u32;
    let mut upper: u64 = 1 << log_upper;
    let mut lower: u64 = (1 << (log_upper - 1)) + 1;

    // the total relation is not needed anymore; the accumulator starts as
    // "reachable within lower - 1 hops"
    powers.pop();
    let mut confirmed = powers.pop().unwrap_or_else(|| BoolMatrix::identity(graph.len()));

    for i in (0..powers.len()).rev() {
        if lower >= upper {
            return Err(DiameterError::BoundsMetEarly { lower, upper });
        }

        let candidate = confirmed.multiply(&powers[i]);
        if !candidate.is_full() {
            // 2^i more hops still leave a pair unreachable, keep them
            confirmed = candidate;
            lower += 1 << i;
        } else {
            upper -= 1 << i;
        }
    }

    if lower != upper {
        return Err(DiameterError::BoundsMismatch { lower, upper });
    }

    log::debug!("diameter {} after {} squarings", lower, log_upper);
    Ok(Diameter::Exact(lower))
}

/// Exact diameter by one breadth-first search per vertex
pub fn measure_diameter_bfs(graph: &Graph) -> Diameter {
    let n = graph.len();
    let adjacency: Vec<Vec<usize>> = graph
        .ids()
        .map(|id| {
            graph
                .neighbors(id)
                .unwrap_or_default()
                .iter()
                .filter_map(|neighbor| graph.index_of(*neighbor))
                .collect()
        })
        .collect();

    let mut diameter = 0;
    let mut distances = vec![u64::MAX; n];
    let mut queue = VecDeque::new();

    for start in 0..n {
        distances.iter_mut().for_each(|d| *d = u64::MAX);
        distances[start] = 0;
        queue.clear();
        queue.push_back(start);
        let mut reached = 1;

        while let Some(current) = queue.pop_front() {
            for &j in &adjacency[current] {
                if distances[j] == u64::MAX {
                    distances[j] = distances[current] + 1;
                    diameter = diameter.max(distances[j]);
                    reached += 1;
                    queue.push_back(j);
                }
            }
        }

        if reached < n {
            return Diameter::Disconnected;
        }
    }

    Diameter::Exact(diameter)
}
