// all the same numeric type of some size to allow casting/interop
pub type NodeId = u64;
pub type SimTime = u64;

/// Decision distance carried in every message. Signed so that the
/// termination sentinel fits next to the pulse indexes.
pub type Distance = i64;

/// Distance value marking a node (and its messages) as permanently terminated
pub const TERMINATED: Distance = -1;

/// Payload exchanged between adjacent nodes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Message {
    /// Largest node id the sender currently believes should lead
    pub candidate: NodeId,
    /// Sender's decision distance, `TERMINATED` once it has stopped
    pub distance: Distance,
}

impl Message {
    pub fn new(candidate: NodeId, distance: Distance) -> Self {
        Self {
            candidate,
            distance,
        }
    }

    pub fn is_termination(&self) -> bool {
        self.distance == TERMINATED
    }
}

/// A message emitted by a node but not yet scheduled
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    pub target: NodeId,
    pub message: Message,
}

/// Send capability handed to a node for the duration of one protocol step.
///
/// Nodes never see the event queue or the clock; everything they emit goes
/// through this trait, so the same protocol code runs under synchronous and
/// asynchronous delivery (and in unit tests against a plain `Vec`).
pub trait MessageSender {
    fn send(&mut self, target: NodeId, message: Message);
}

impl MessageSender for Vec<Outgoing> {
    fn send(&mut self, target: NodeId, message: Message) {
        self.push(Outgoing { target, message });
    }
}

// ============================================================================
// Event Logging System
// ============================================================================

/// Events emitted by the scheduler for tracing and analysis
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Message enqueued by a node's send capability
    MessageSent {
        source: NodeId,
        target: NodeId,
        sent_at: SimTime,
        arrival_time: SimTime,
        message: Message,
    },
    /// Message dequeued and appended to the target's inbox
    MessageDelivered {
        source: NodeId,
        target: NodeId,
        message: Message,
    },
    /// Node reported termination for the first time
    NodeTerminated { node: NodeId, candidate: NodeId },
    /// Node declared itself leader
    LeaderDeclared { node: NodeId },
}

/// Trait for consuming events from the scheduler
pub trait EventSink {
    fn log(&mut self, time: SimTime, event: Event);
}

/// No-op event sink for production use (zero overhead)
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _time: SimTime, _event: Event) {}
}
