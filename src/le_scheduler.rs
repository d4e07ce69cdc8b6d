// Discrete-event scheduler driving the node automata
//
// One logical thread processes events strictly in (arrival_time, sequence)
// order. `sequence` is a global insertion counter, so events that arrive at
// the same tick are delivered in the order they were sent.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use hashbrown::HashMap;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::le_delay::{DelayModel, Synchrony};
use crate::le_graph::Graph;
use crate::le_interface::{Event, EventSink, Message, MessageSender, NoOpSink, NodeId, SimTime};
use crate::le_node::NodeState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("graph has no vertices")]
    EmptyGraph,

    #[error("graph has no initiators")]
    NoInitiators,

    #[error("event queue is empty at time {time} but {pending} node(s) have not terminated")]
    Deadlock { time: SimTime, pending: usize },

    #[error("event arrival {arrival} precedes the logical clock {clock}")]
    ClockRegression { clock: SimTime, arrival: SimTime },

    #[error("message addressed to unknown node {0}")]
    UnknownNode(NodeId),

    #[error("arrival time overflows: clock {clock} plus delay {delay}")]
    TimeOverflow { clock: SimTime, delay: SimTime },
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Candidate held by the first vertex of the graph when the run ended
    pub leader: NodeId,
    /// Logical clock value when the last node terminated
    pub termination_time: SimTime,
    /// Events dequeued and delivered
    pub event_count: u64,
    /// Events enqueued, including those still in flight at the end
    pub messages_sent: u64,
    /// Nodes that declared themselves leader
    pub declared_leaders: Vec<NodeId>,
    /// blake3 digest over every delivered (time, source, target, message)
    pub trace_digest: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueuedEvent {
    arrival_time: SimTime,
    sequence: u64,
    source: NodeId,
    target: NodeId,
    candidate: NodeId,
    distance: i64,
}

impl QueuedEvent {
    fn message(&self) -> Message {
        Message::new(self.candidate, self.distance)
    }
}

/// Send capability bound to one source node for the duration of a step
struct Courier<'a, D: DelayModel> {
    source: NodeId,
    clock: SimTime,
    synchrony: Synchrony,
    delay: &'a mut D,
    rng: &'a mut StdRng,
    queue: &'a mut BinaryHeap<Reverse<QueuedEvent>>,
    sequence: &'a mut u64,
    sink: &'a mut dyn EventSink,
    // first send whose arrival time did not fit in SimTime
    overflow: Option<SimulationError>,
}

impl<D: DelayModel> MessageSender for Courier<'_, D> {
    fn send(&mut self, target: NodeId, message: Message) {
        let delay = if self.synchrony.is_synchronous() {
            0
        } else {
            self.delay.sample(self.rng)
        };
        let arrival_time = match delay
            .checked_add(1)
            .and_then(|transit| self.clock.checked_add(transit))
        {
            Some(arrival_time) => arrival_time,
            None => {
                if self.overflow.is_none() {
                    self.overflow = Some(SimulationError::TimeOverflow {
                        clock: self.clock,
                        delay,
                    });
                }
                return;
            }
        };

        self.queue.push(Reverse(QueuedEvent {
            arrival_time,
            sequence: *self.sequence,
            source: self.source,
            target,
            candidate: message.candidate,
            distance: message.distance,
        }));
        *self.sequence += 1;

        self.sink.log(
            self.clock,
            Event::MessageSent {
                source: self.source,
                target,
                sent_at: self.clock,
                arrival_time,
                message,
            },
        );
    }
}

pub struct Simulation<D: DelayModel> {
    // index-addressed by vertex position in the graph's enumeration
    nodes: Vec<NodeState>,
    neighbors: Vec<Vec<NodeId>>,
    terminated: Vec<bool>,
    index: HashMap<NodeId, usize>,

    queue: BinaryHeap<Reverse<QueuedEvent>>,
    sequence: u64,
    clock: SimTime,
    event_count: u64,

    synchrony: Synchrony,
    delay: D,
    rng: StdRng,
    event_sink: Box<dyn EventSink>,
    trace: blake3::Hasher,
}

impl<D: DelayModel> Simulation<D> {
    /// Create a simulation with the default NoOpSink
    pub fn new(graph: &Graph, delay: D, seed: u64, synchrony: Synchrony) -> Result<Self, SimulationError> {
        Self::new_with_sink(graph, delay, seed, synchrony, Box::new(NoOpSink))
    }

    /// Create a simulation with a custom event sink for tracing/analysis
    pub fn new_with_sink(
        graph: &Graph,
        delay: D,
        seed: u64,
        synchrony: Synchrony,
        event_sink: Box<dyn EventSink>,
    ) -> Result<Self, SimulationError> {
        if graph.is_empty() {
            return Err(SimulationError::EmptyGraph);
        }
        if graph.initiators().next().is_none() {
            return Err(SimulationError::NoInitiators);
        }

        let mut nodes = Vec::with_capacity(graph.len());
        let mut neighbors = Vec::with_capacity(graph.len());
        let mut index = HashMap::with_capacity(graph.len());
        for (position, id) in graph.ids().enumerate() {
            nodes.push(NodeState::new(id, graph.is_initiator(id)));
            neighbors.push(graph.neighbors(id).unwrap_or_default().to_vec());
            index.insert(id, position);
        }

        Ok(Self {
            terminated: vec![false; nodes.len()],
            nodes,
            neighbors,
            index,
            queue: BinaryHeap::new(),
            sequence: 0,
            clock: 0,
            event_count: 0,
            synchrony,
            delay,
            rng: StdRng::seed_from_u64(seed),
            event_sink,
            trace: blake3::Hasher::new(),
        })
    }

    pub fn nodes(&self) -> &[NodeState] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeState> {
        self.index.get(&id).map(|i| &self.nodes[*i])
    }

    /// Run the election to global termination
    pub fn run(&mut self) -> Result<RunReport, SimulationError> {
        // seed phase: initiators wake up and broadcast
        for position in 0..self.nodes.len() {
            if self.nodes[position].is_initiator() {
                self.step_node(position)?;
            }
        }

        while self.terminated.iter().any(|t| !t) {
            let Reverse(event) = self.queue.pop().ok_or_else(|| SimulationError::Deadlock {
                time: self.clock,
                pending: self.terminated.iter().filter(|t| !**t).count(),
            })?;

            if event.arrival_time < self.clock {
                return Err(SimulationError::ClockRegression {
                    clock: self.clock,
                    arrival: event.arrival_time,
                });
            }
            self.clock = event.arrival_time;
            self.event_count += 1;

            let position = *self
                .index
                .get(&event.target)
                .ok_or(SimulationError::UnknownNode(event.target))?;

            self.record_delivery(&event);
            self.nodes[position].deliver(event.source, event.message());
            self.step_node(position)?;
        }

        let report = self.build_report();
        info!(
            "leader elected: {} termination time: {} events: {}",
            report.leader, report.termination_time, report.event_count
        );
        Ok(report)
    }

    fn record_delivery(&mut self, event: &QueuedEvent) {
        self.trace.update(&event.arrival_time.to_le_bytes());
        self.trace.update(&event.source.to_le_bytes());
        self.trace.update(&event.target.to_le_bytes());
        self.trace.update(&event.candidate.to_le_bytes());
        self.trace.update(&event.distance.to_le_bytes());

        self.event_sink.log(
            self.clock,
            Event::MessageDelivered {
                source: event.source,
                target: event.target,
                message: event.message(),
            },
        );
    }

    /// Invoke one protocol step and record its termination result
    fn step_node(&mut self, position: usize) -> Result<(), SimulationError> {
        let node = &mut self.nodes[position];
        let was_leader = node.declared_leader();

        let mut courier = Courier {
            source: node.id(),
            clock: self.clock,
            synchrony: self.synchrony,
            delay: &mut self.delay,
            rng: &mut self.rng,
            queue: &mut self.queue,
            sequence: &mut self.sequence,
            sink: &mut *self.event_sink,
            overflow: None,
        };
        let done = node.step(&self.neighbors[position], &mut courier);
        if let Some(error) = courier.overflow {
            return Err(error);
        }

        if node.declared_leader() && !was_leader {
            debug!("node {} declared itself leader at {}", node.id(), self.clock);
            self.event_sink
                .log(self.clock, Event::LeaderDeclared { node: node.id() });
        }

        // termination flips false -> true only
        if done && !self.terminated[position] {
            self.terminated[position] = true;
            self.event_sink.log(
                self.clock,
                Event::NodeTerminated {
                    node: node.id(),
                    candidate: node.candidate(),
                },
            );
        }
        Ok(())
    }

    fn build_report(&self) -> RunReport {
        RunReport {
            // the protocol converges every candidate, so any vertex would do
            leader: self.nodes[0].candidate(),
            termination_time: self.clock,
            event_count: self.event_count,
            messages_sent: self.sequence,
            declared_leaders: self
                .nodes
                .iter()
                .filter(|n| n.declared_leader())
                .map(NodeState::id)
                .collect(),
            trace_digest: *self.trace.finalize().as_bytes(),
        }
    }
}

/// One-shot run of the election over `graph`
pub fn run<D: DelayModel>(
    graph: &Graph,
    delay: D,
    seed: u64,
    synchrony: Synchrony,
) -> Result<RunReport, SimulationError> {
    Simulation::new(graph, delay, seed, synchrony)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::le_delay::{Constant, DelayConfig, Poisson};
    use crate::le_interface::TERMINATED;
    use crate::le_sink::RecordingSink;
    use crate::le_topology::{complete, connected_rings, hypercube, line, mark_initiators, ring};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    fn with_initiators(mut graph: Graph, ids: &[NodeId]) -> Graph {
        mark_initiators(&mut graph, ids).unwrap();
        graph
    }

    fn assert_elects_maximum(graph: &Graph, synchrony: Synchrony, seed: u64) {
        let max_id = graph.ids().max().unwrap();
        let mut sim = Simulation::new(graph, Poisson::new(5.0), seed, synchrony).unwrap();
        let report = sim.run().unwrap();

        assert_eq!(report.leader, max_id);
        assert_eq!(report.declared_leaders, vec![max_id]);
        assert!(sim.node(max_id).map_or(false, NodeState::declared_leader));
        for node in sim.nodes() {
            assert_eq!(node.candidate(), max_id, "node {} disagrees", node.id());
            assert_eq!(node.distance(), TERMINATED);
        }
    }

    #[test]
    fn test_two_node_line_synchronous_trace() {
        let graph = with_initiators(line(2).unwrap(), &[0]);
        let report = run(&graph, Constant(0), 0, Synchrony::Synchronous).unwrap();

        assert_eq!(report.leader, 1);
        assert_eq!(report.termination_time, 6);
        assert_eq!(report.event_count, 10);
        assert_eq!(report.declared_leaders, vec![1]);
    }

    #[test]
    fn test_complete_graph_synchronous() {
        let graph = with_initiators(complete(4).unwrap(), &[0]);
        let report = run(&graph, Constant(0), 0, Synchrony::Synchronous).unwrap();

        assert_eq!(report.leader, 3);
        assert_eq!(report.termination_time, 6);
        assert_eq!(report.event_count, 60);
    }

    #[test]
    fn test_single_initiator_elects_maximum() {
        for n in [2, 3, 5, 8, 12] {
            for synchrony in [Synchrony::Synchronous, Synchrony::Asynchronous] {
                for initiator in [0, n as NodeId - 1, n as NodeId / 2] {
                    assert_elects_maximum(&with_initiators(line(n).unwrap(), &[initiator]), synchrony, 17);
                    assert_elects_maximum(&with_initiators(complete(n).unwrap(), &[initiator]), synchrony, 17);
                    if n >= 3 {
                        assert_elects_maximum(&with_initiators(ring(n).unwrap(), &[initiator]), synchrony, 17);
                    }
                }
            }
        }
    }

    #[test]
    fn test_all_initiators_elect_maximum() {
        let graphs = [
            ring(9).unwrap(),
            line(7).unwrap(),
            complete(6).unwrap(),
            hypercube(16).unwrap(),
            connected_rings(5, 7).unwrap(),
        ];
        for graph in graphs {
            let ids: Vec<NodeId> = graph.ids().collect();
            let graph = with_initiators(graph, &ids);
            for seed in 0..5 {
                assert_elects_maximum(&graph, Synchrony::Asynchronous, seed);
            }
            assert_elects_maximum(&graph, Synchrony::Synchronous, 0);
        }
    }

    #[test]
    fn test_runs_are_deterministic() {
        let graph = with_initiators(ring(20).unwrap(), &[3, 11]);

        let first = run(&graph, Poisson::new(5.0), 1234, Synchrony::Asynchronous).unwrap();
        let second = run(&graph, Poisson::new(5.0), 1234, Synchrony::Asynchronous).unwrap();
        assert_eq!(first, second);

        let other = run(&graph, Poisson::new(5.0), 4321, Synchrony::Asynchronous).unwrap();
        assert_eq!(other.leader, first.leader);
        assert_ne!(other.trace_digest, first.trace_digest);
    }

    #[test]
    fn test_synchronous_run_ignores_seed() {
        let graph = with_initiators(ring(10).unwrap(), &[0]);

        let a = run(&graph, DelayConfig::default(), 1, Synchrony::Synchronous).unwrap();
        let b = run(&graph, DelayConfig::default(), 2, Synchrony::Synchronous).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_causality_and_monotonic_clock() {
        let graph = with_initiators(ring(12).unwrap(), &[0, 5]);
        let sink = Rc::new(RefCell::new(RecordingSink::new()));
        let mut sim = Simulation::new_with_sink(
            &graph,
            Poisson::new(3.0),
            77,
            Synchrony::Asynchronous,
            Box::new(sink.clone()),
        )
        .unwrap();
        let report = sim.run().unwrap();

        let recorded = sink.borrow();
        let mut last_time = 0;
        let mut delivered = 0;
        for (time, event) in recorded.events() {
            assert!(*time >= last_time, "clock went backwards");
            last_time = *time;

            match event {
                Event::MessageSent {
                    sent_at,
                    arrival_time,
                    ..
                } => assert!(arrival_time > sent_at),
                Event::MessageDelivered { .. } => delivered += 1,
                _ => {}
            }
        }
        assert_eq!(delivered, report.event_count);
        assert_eq!(last_time, report.termination_time);
    }

    #[test]
    fn test_termination_recorded_once_per_node() {
        let graph = with_initiators(complete(5).unwrap(), &[1]);
        let sink = Rc::new(RefCell::new(RecordingSink::new()));
        let mut sim =
            Simulation::new_with_sink(&graph, Constant(0), 0, Synchrony::Synchronous, Box::new(sink.clone()))
                .unwrap();
        sim.run().unwrap();

        let recorded = sink.borrow();
        let terminated = recorded
            .events()
            .iter()
            .filter(|(_, e)| matches!(e, Event::NodeTerminated { .. }))
            .count();
        let declared = recorded
            .events()
            .iter()
            .filter(|(_, e)| matches!(e, Event::LeaderDeclared { node: 4 }))
            .count();
        assert_eq!(terminated, 5);
        assert_eq!(declared, 1);
    }

    #[test]
    fn test_equal_arrivals_delivered_in_send_order() {
        let graph = complete(5).unwrap();
        let ids: Vec<NodeId> = graph.ids().collect();
        let graph = with_initiators(graph, &ids);
        let sink = Rc::new(RefCell::new(RecordingSink::new()));
        let mut sim =
            Simulation::new_with_sink(&graph, Constant(0), 0, Synchrony::Synchronous, Box::new(sink.clone()))
                .unwrap();
        let report = sim.run().unwrap();

        // per arrival time: messages in send order, and in delivery order
        let mut sent: BTreeMap<SimTime, Vec<(NodeId, NodeId, Message)>> = BTreeMap::new();
        let mut delivered: BTreeMap<SimTime, Vec<(NodeId, NodeId, Message)>> = BTreeMap::new();
        for (time, event) in sink.borrow().events() {
            match event {
                Event::MessageSent {
                    source,
                    target,
                    arrival_time,
                    message,
                    ..
                } => sent
                    .entry(*arrival_time)
                    .or_default()
                    .push((*source, *target, *message)),
                Event::MessageDelivered {
                    source,
                    target,
                    message,
                } => delivered
                    .entry(*time)
                    .or_default()
                    .push((*source, *target, *message)),
                _ => {}
            }
        }

        let mut checked = 0;
        for (time, got) in &delivered {
            let expected = &sent[time];
            if *time == report.termination_time {
                // the run stops once every node has terminated
                assert_eq!(got[..], expected[..got.len()], "time {}", time);
            } else {
                assert_eq!(got, expected, "time {}", time);
            }
            checked += got.len() as u64;
        }
        assert_eq!(checked, report.event_count);
    }

    #[test]
    fn test_delay_overflow_is_reported() {
        let graph = with_initiators(line(2).unwrap(), &[0]);

        let result = run(&graph, Constant(SimTime::MAX), 0, Synchrony::Asynchronous);
        assert_eq!(
            result,
            Err(SimulationError::TimeOverflow {
                clock: 0,
                delay: SimTime::MAX
            })
        );

        // first hop fits exactly, the reply cannot
        let result = run(&graph, Constant(SimTime::MAX - 1), 0, Synchrony::Asynchronous);
        assert!(matches!(
            result,
            Err(SimulationError::TimeOverflow { clock: SimTime::MAX, .. })
        ));
    }

    #[test]
    fn test_single_isolated_initiator() {
        let graph = with_initiators(line(1).unwrap(), &[0]);
        let report = run(&graph, Constant(0), 0, Synchrony::Synchronous).unwrap();

        assert_eq!(report.leader, 0);
        assert_eq!(report.event_count, 0);
        assert_eq!(report.termination_time, 0);
        assert_eq!(report.declared_leaders, vec![0]);
    }

    #[test]
    fn test_disconnected_graph_deadlocks() {
        // vertex 2 is unreachable and never wakes up
        let mut graph = line(2).unwrap();
        graph.add_vertex(2, false).unwrap();
        let graph = with_initiators(graph, &[0]);

        let result = run(&graph, Constant(0), 0, Synchrony::Synchronous);
        assert!(matches!(result, Err(SimulationError::Deadlock { pending: 1, .. })));
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        assert_eq!(
            Simulation::new(&Graph::new(), Constant(0), 0, Synchrony::Synchronous).err(),
            Some(SimulationError::EmptyGraph)
        );
        assert_eq!(
            Simulation::new(&line(3).unwrap(), Constant(0), 0, Synchrony::Synchronous).err(),
            Some(SimulationError::NoInitiators)
        );
    }
}
