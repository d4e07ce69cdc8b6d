// Per-vertex leader election automaton
//
// A node only ever touches its own state and the messages delivered into its
// inbox. Candidates flood outwards one pulse at a time: a pulse fires once
// the inbox holds a message from every neighbor, consumes the oldest message
// of each, and answers with the node's updated (candidate, distance) pair.
// The distance doubles as a stall detector. An active candidate that sees two
// consecutive pulses without any distance progress declares itself leader
// and floods a termination marker.

use std::collections::VecDeque;

use hashbrown::HashMap;
use log::trace;

use crate::le_interface::{Distance, Message, MessageSender, NodeId, TERMINATED};

/// Consecutive pulses without progress after which an active candidate wins
const STALL_LIMIT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    Dormant,
    Active,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct NodeState {
    id: NodeId,
    initiator: bool,

    awake: bool,
    candidate: NodeId,
    distance: Distance,
    active: bool,
    stall: u32,
    pulse: u32,
    declared_leader: bool,

    // per-sender FIFO of messages not yet consumed by a pulse
    inbox: HashMap<NodeId, VecDeque<Message>>,
}

impl NodeState {
    pub fn new(id: NodeId, initiator: bool) -> Self {
        Self {
            id,
            initiator,
            awake: false,
            candidate: id,
            distance: 0,
            active: true,
            stall: 0,
            pulse: 0,
            declared_leader: false,
            inbox: HashMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn candidate(&self) -> NodeId {
        self.candidate
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stall(&self) -> u32 {
        self.stall
    }

    pub fn pulse(&self) -> u32 {
        self.pulse
    }

    pub fn declared_leader(&self) -> bool {
        self.declared_leader
    }

    pub fn is_terminated(&self) -> bool {
        self.distance == TERMINATED
    }

    pub fn phase(&self) -> NodePhase {
        if self.is_terminated() {
            NodePhase::Terminated
        } else if self.awake {
            NodePhase::Active
        } else {
            NodePhase::Dormant
        }
    }

    /// Number of buffered, not yet consumed messages across all senders
    pub fn pending(&self) -> usize {
        self.inbox.values().map(VecDeque::len).sum()
    }

    /// Append a message to the sender's queue
    pub fn deliver(&mut self, from: NodeId, message: Message) {
        self.inbox.entry(from).or_default().push_back(message);
    }

    /// Run one protocol step after a delivery (or once at start for initiators).
    ///
    /// Returns true iff the node is terminated, whether just now or earlier.
    pub fn step<S: MessageSender + ?Sized>(&mut self, neighbors: &[NodeId], sender: &mut S) -> bool {
        if self.is_terminated() {
            return true;
        }

        if !self.awake && (self.initiator || self.pending() > 0) {
            trace!("node {} wakes up", self.id);
            self.awake = true;
            self.broadcast(neighbors, sender);
        }

        if self.ready_for_pulse(neighbors) {
            return self.run_pulse(neighbors, sender);
        }

        false
    }

    fn ready_for_pulse(&self, neighbors: &[NodeId]) -> bool {
        neighbors
            .iter()
            .all(|n| self.inbox.get(n).map_or(false, |q| !q.is_empty()))
    }

    fn broadcast<S: MessageSender + ?Sized>(&self, neighbors: &[NodeId], sender: &mut S) {
        let message = Message::new(self.candidate, self.distance);
        for neighbor in neighbors {
            sender.send(*neighbor, message);
        }
    }

    fn terminate<S: MessageSender + ?Sized>(&mut self, neighbors: &[NodeId], sender: &mut S) -> bool {
        self.distance = TERMINATED;
        self.broadcast(neighbors, sender);
        true
    }

    fn run_pulse<S: MessageSender + ?Sized>(&mut self, neighbors: &[NodeId], sender: &mut S) -> bool {
        self.pulse += 1;

        // oldest message per neighbor, in neighbor order
        let consumed: Vec<Message> = neighbors
            .iter()
            .filter_map(|n| self.inbox.get_mut(n).and_then(VecDeque::pop_front))
            .collect();

        // isolated node: nobody to hear from, nobody to outrank it
        if consumed.is_empty() {
            trace!("node {} has no neighbors, electing itself", self.id);
            self.declared_leader = true;
            self.distance = TERMINATED;
            return true;
        }

        if consumed.iter().any(Message::is_termination) {
            trace!("node {} received completion at pulse {}", self.id, self.pulse);
            return self.terminate(neighbors, sender);
        }

        // highest candidate heard of this pulse
        let best = consumed.iter().map(|m| m.candidate).max().unwrap_or(self.candidate);

        if best > self.candidate {
            trace!(
                "node {} defers to {} at pulse {}",
                self.id,
                best,
                self.pulse
            );
            self.active = false;
            self.candidate = best;
            self.distance = Distance::from(self.pulse);
        }

        if self.active {
            if best < self.candidate {
                self.stall = 1;
            } else {
                // longest distance reported by a neighbor
                let furthest = consumed.iter().map(|m| m.distance).max().unwrap_or(self.distance);

                if furthest > self.distance {
                    self.distance = furthest;
                    self.stall = 0;
                } else {
                    self.stall += 1;
                }

                if self.stall == STALL_LIMIT {
                    trace!("node {} declares itself leader", self.id);
                    self.declared_leader = true;
                    return self.terminate(neighbors, sender);
                }
            }
        }

        self.broadcast(neighbors, sender);
        false
    }
}
