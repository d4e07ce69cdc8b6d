//! Event sinks for tracing and analysing runs

use std::cell::RefCell;
use std::rc::Rc;

use log::info;

use crate::le_interface::{Event, EventSink, SimTime};

/// Logging event sink that renders events through the `log` facade
pub struct LoggingEventSink {
    enabled: bool,
}

impl LoggingEventSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl EventSink for LoggingEventSink {
    fn log(&mut self, time: SimTime, event: Event) {
        if !self.enabled {
            return;
        }

        match event {
            Event::MessageSent {
                source,
                target,
                sent_at,
                arrival_time,
                message,
            } => {
                info!(
                    "{} send: {} -> {} arrival:{} x:{} d:{}",
                    sent_at, source, target, arrival_time, message.candidate, message.distance
                );
            }
            Event::MessageDelivered {
                source,
                target,
                message,
            } => {
                info!(
                    "{} recv: {} <- {} x:{} d:{}",
                    time, target, source, message.candidate, message.distance
                );
            }
            Event::NodeTerminated { node, candidate } => {
                info!("{} done: {} (leader {})", time, node, candidate);
            }
            Event::LeaderDeclared { node } => {
                info!("{} leader: {}", time, node);
            }
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<(SimTime, Event)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[(SimTime, Event)] {
        &self.events
    }

    pub fn sent(&self) -> usize {
        self.events
            .iter()
            .filter(|(_, e)| matches!(e, Event::MessageSent { .. }))
            .count()
    }

    pub fn delivered(&self) -> usize {
        self.events
            .iter()
            .filter(|(_, e)| matches!(e, Event::MessageDelivered { .. }))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn log(&mut self, time: SimTime, event: Event) {
        self.events.push((time, event));
    }
}

// shared handle, so a caller can inspect what a boxed sink collected
impl<S: EventSink> EventSink for Rc<RefCell<S>> {
    fn log(&mut self, time: SimTime, event: Event) {
        self.borrow_mut().log(time, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::le_interface::Message;

    #[test]
    fn test_recording_sink_counts() {
        let mut sink = RecordingSink::new();
        sink.log(
            0,
            Event::MessageSent {
                source: 0,
                target: 1,
                sent_at: 0,
                arrival_time: 1,
                message: Message::new(0, 0),
            },
        );
        sink.log(
            1,
            Event::MessageDelivered {
                source: 0,
                target: 1,
                message: Message::new(0, 0),
            },
        );
        sink.log(1, Event::LeaderDeclared { node: 1 });

        assert_eq!(sink.sent(), 1);
        assert_eq!(sink.delivered(), 1);
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn test_shared_handle_forwards() {
        let shared = Rc::new(RefCell::new(RecordingSink::new()));
        let mut boxed: Box<dyn EventSink> = Box::new(shared.clone());
        boxed.log(4, Event::LeaderDeclared { node: 2 });

        assert_eq!(shared.borrow().events(), &[(4, Event::LeaderDeclared { node: 2 })]);
    }

    #[test]
    fn test_disabled_logging_sink_is_silent() {
        let mut sink = LoggingEventSink::new(false);
        sink.log(0, Event::LeaderDeclared { node: 0 });
    }
}
