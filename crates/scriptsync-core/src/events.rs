//! Alignment events and the sinks that receive them.
//!
//! The tracker reports progress through an [`EventSink`], one method per
//! event kind. [`AlignmentEvent`] is the value form of the same calls and
//! serializes to the wire shape published to presentation clients:
//! `{"event": "highlight", "index": 2}`, `{"event": "pause"}`, ...

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// A forward-progress notification from the alignment tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AlignmentEvent {
    /// The segment at `index` is now the one expected next.
    Highlight { index: usize },
    /// Sync was lost (low similarity or silence).
    Pause,
    /// Sync was regained after a pause.
    Resume,
    /// The last segment was spoken. Fired at most once.
    Completed,
}

impl std::fmt::Display for AlignmentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Highlight { index } => write!(f, "highlight({index})"),
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Receives tracker events, in emission order, for one session.
pub trait EventSink: Send + Sync {
    fn highlight(&self, index: usize);
    fn pause(&self);
    fn resume(&self);
    fn completed(&self);

    /// Dispatch a value-form event to the matching method.
    fn deliver(&self, event: AlignmentEvent) {
        match event {
            AlignmentEvent::Highlight { index } => self.highlight(index),
            AlignmentEvent::Pause => self.pause(),
            AlignmentEvent::Resume => self.resume(),
            AlignmentEvent::Completed => self.completed(),
        }
    }
}

/// Records every event; used to assert exact call sequences.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AlignmentEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<AlignmentEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of received events equal to `event`.
    pub fn count(&self, event: AlignmentEvent) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }

    fn push(&self, event: AlignmentEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl EventSink for RecordingSink {
    fn highlight(&self, index: usize) {
        self.push(AlignmentEvent::Highlight { index });
    }

    fn pause(&self) {
        self.push(AlignmentEvent::Pause);
    }

    fn resume(&self) {
        self.push(AlignmentEvent::Resume);
    }

    fn completed(&self) {
        self.push(AlignmentEvent::Completed);
    }
}

/// An event stamped with its session and time, for publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub event: AlignmentEvent,
    pub at: DateTime<Utc>,
}

impl SessionEvent {
    pub fn new(session_id: Uuid, event: AlignmentEvent) -> Self {
        Self {
            session_id,
            event,
            at: Utc::now(),
        }
    }
}

/// Forwards events into an unbounded channel, preserving order.
///
/// Sending never blocks the tracker. If the receiver is gone the event is
/// dropped and logged at debug level.
pub struct ChannelSink {
    session_id: Uuid,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport reads from.
    pub fn new(session_id: Uuid) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { session_id, tx }, rx)
    }

    fn send(&self, event: AlignmentEvent) {
        if let Err(e) = self.tx.send(SessionEvent::new(self.session_id, event)) {
            debug!(event = %e.0.event, "event dropped, receiver closed");
        }
    }
}

impl EventSink for ChannelSink {
    fn highlight(&self, index: usize) {
        self.send(AlignmentEvent::Highlight { index });
    }

    fn pause(&self) {
        self.send(AlignmentEvent::Pause);
    }

    fn resume(&self) {
        self.send(AlignmentEvent::Resume);
    }

    fn completed(&self) {
        self.send(AlignmentEvent::Completed);
    }
}

/// Delivers each event to every inner sink, in the order they were added.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn highlight(&self, index: usize) {
        self.sinks.iter().for_each(|s| s.highlight(index));
    }

    fn pause(&self) {
        self.sinks.iter().for_each(|s| s.pause());
    }

    fn resume(&self) {
        self.sinks.iter().for_each(|s| s.resume());
    }

    fn completed(&self) {
        self.sinks.iter().for_each(|s| s.completed());
    }
}
