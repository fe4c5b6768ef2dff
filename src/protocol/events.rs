//! Asynchronous event path from the native side to managed subscribers.

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use crossbeam_skiplist::SkipMap;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use tracing::trace;

use crate::{Error, Result};

/// A named control event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum ControlEvent {
    /// Probes are installed and the session is active
    #[serde(rename = "Capturing/Start")]
    CapturingStarted,
    /// The session ended and probes were removed
    #[serde(rename = "Capturing/Stop")]
    CapturingStopped,
    /// A session could not start or a probe failed
    #[serde(rename = "FailedToCapture", rename_all = "camelCase")]
    FailedToCapture {
        /// Category of the failure
        failure_type: String,
        /// Human readable detail
        failure_message: String,
    },
    /// Every entry logged before the stop has been written
    #[serde(rename = "Flush")]
    Flush,
}

impl ControlEvent {
    /// The kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            ControlEvent::CapturingStarted => EventKind::CapturingStarted,
            ControlEvent::CapturingStopped => EventKind::CapturingStopped,
            ControlEvent::FailedToCapture { .. } => EventKind::FailedToCapture,
            ControlEvent::Flush => EventKind::Flush,
        }
    }

    /// Parses an event delivered as JSON.
    ///
    /// # Errors
    /// Returns [`Error::Json`] if the document is malformed or names an unknown event.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the event as JSON.
    ///
    /// # Errors
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Event names subscribers filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr)]
pub enum EventKind {
    /// `Capturing/Start`
    #[strum(serialize = "Capturing/Start")]
    CapturingStarted,
    /// `Capturing/Stop`
    #[strum(serialize = "Capturing/Stop")]
    CapturingStopped,
    /// `FailedToCapture`
    #[strum(serialize = "FailedToCapture")]
    FailedToCapture,
    /// `Flush`
    #[strum(serialize = "Flush")]
    Flush,
}

impl EventKind {
    /// Wire name of the event.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

struct Subscriber {
    filter: Option<EventKind>,
    sender: Sender<ControlEvent>,
}

/// Fan-out of [`ControlEvent`]s to any number of subscribers.
///
/// Cloning yields another handle to the same stream. Publishing never blocks; events
/// published while nobody is subscribed are discarded.
#[derive(Clone, Default)]
pub struct EventStream {
    subscribers: Arc<SkipMap<u64, Subscriber>>,
    next_id: Arc<AtomicU64>,
}

impl EventStream {
    /// Creates a stream without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every matching subscriber.
    pub fn publish(&self, event: ControlEvent) {
        let kind = event.kind();
        trace!(target: "callscope::protocol", event = kind.name(), "publishing event");

        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            if subscriber.filter.map_or(true, |filter| filter == kind) {
                // A closed receiver is removed when its subscription drops
                let _ = subscriber.sender.send(event.clone());
            }
        }
    }

    /// Parses a JSON event from the native side and publishes it.
    ///
    /// # Errors
    /// Returns [`Error::Json`] for malformed documents. An unknown event name is a defect
    /// of the native component and also trips a debug assertion.
    pub fn publish_json(&self, json: &str) -> Result<()> {
        match ControlEvent::from_json(json) {
            Ok(event) => {
                self.publish(event);
                Ok(())
            }
            Err(error) => {
                debug_assert!(false, "unrecognized control event {json}: {error}");
                Err(error)
            }
        }
    }

    /// Subscribes to events of `kind`, or to every event if `None`.
    #[must_use]
    pub fn subscribe(&self, kind: Option<EventKind>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = unbounded();
        self.subscribers.insert(
            id,
            Subscriber {
                filter: kind,
                sender,
            },
        );

        Subscription {
            id,
            receiver,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Subscribes by wire name.
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] for an unknown name, which also trips a debug assertion.
    pub fn subscribe_named(&self, name: &str) -> Result<Subscription> {
        match EventKind::from_str(name) {
            Ok(kind) => Ok(self.subscribe(Some(kind))),
            Err(_) => {
                debug_assert!(false, "unknown control event name {name}");
                Err(Error::Protocol(format!("unknown event name {name}")))
            }
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Receiving end of [`EventStream::subscribe`]; unsubscribes when dropped.
pub struct Subscription {
    id: u64,
    receiver: Receiver<ControlEvent>,
    subscribers: Arc<SkipMap<u64, Subscriber>>,
}

impl Subscription {
    /// Returns the next pending event without waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<ControlEvent> {
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ControlEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Drains every pending event.
    #[must_use]
    pub fn drain(&self) -> Vec<ControlEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.subscribers.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    fn failure() -> ControlEvent {
        ControlEvent::FailedToCapture {
            failure_type: "UnresolvedMethods".into(),
            failure_message: "0".into(),
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            ControlEvent::CapturingStarted.to_json().unwrap(),
            r#"{"name":"Capturing/Start"}"#
        );
        assert_eq!(
            failure().to_json().unwrap(),
            r#"{"name":"FailedToCapture","failureType":"UnresolvedMethods","failureMessage":"0"}"#
        );
        assert_eq!(
            ControlEvent::from_json(r#"{"name":"Capturing/Stop"}"#).unwrap(),
            ControlEvent::CapturingStopped
        );

        for kind in EventKind::iter() {
            assert_eq!(EventKind::from_str(kind.name()).unwrap(), kind);
        }
    }

    #[test]
    fn test_filtered_subscriptions() {
        let events = EventStream::new();
        let all = events.subscribe(None);
        let failures = events.subscribe(Some(EventKind::FailedToCapture));

        events.publish(ControlEvent::CapturingStarted);
        events.publish(failure());
        events.publish(ControlEvent::Flush);

        assert_eq!(
            all.drain(),
            vec![ControlEvent::CapturingStarted, failure(), ControlEvent::Flush]
        );
        assert_eq!(failures.try_recv(), Some(failure()));
        assert_eq!(failures.try_recv(), None);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let events = EventStream::new();
        let subscription = events.subscribe_named("Flush").unwrap();
        let clone = events.clone();
        assert_eq!(clone.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(events.subscriber_count(), 0);
        clone.publish(ControlEvent::Flush);
    }

    #[test]
    fn test_publish_json_from_native() {
        let events = EventStream::new();
        let stops = events.subscribe(Some(EventKind::CapturingStopped));
        events.publish_json(r#"{"name":"Capturing/Stop"}"#).unwrap();
        assert_eq!(
            stops.recv_timeout(Duration::from_secs(1)),
            Some(ControlEvent::CapturingStopped)
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unknown control event name")]
    fn test_unknown_name_is_a_defect() {
        let _ = EventStream::new().subscribe_named("Capturing/Pause");
    }
}
