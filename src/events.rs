use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

/// Canonical event names shared by producers, the activity logger, and live
/// stream sessions.
pub const STUDENT_ADDED: &str = "student-added";
pub const GRADE_UPDATED: &str = "grade-updated";
pub const ANNOUNCEMENT_CREATED: &str = "announcement-created";
pub const FILE_UPLOADED: &str = "file-uploaded";

pub const KNOWN_EVENT_TYPES: [&str; 4] = [
    STUDENT_ADDED,
    GRADE_UPDATED,
    ANNOUNCEMENT_CREATED,
    FILE_UPLOADED,
];

/// Envelope that carries an event name and its opaque payload.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    pub name: String,
    pub payload: Value,
}

impl ServerEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&ServerEvent) -> anyhow::Result<()> + Send + Sync>;

/// Returned by [`EventBus::subscribe`]; identifies one registration so it can
/// be removed later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionHandle {
    name: String,
    id: u64,
}

struct Subscriber {
    id: u64,
    handler: EventHandler,
}

/// Name-addressed publish/subscribe registry that fans events out to any
/// registered consumers. Handed to producers and consumers by value (it is a
/// cheap clone around shared state); bus state is process-local and discarded
/// on restart.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    registry: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every future publish of `name`. Any string is
    /// accepted; unregistered names are simply never matched. Handlers for
    /// the same name run in registration order.
    pub fn subscribe(&self, name: &str, handler: EventHandler) -> SubscriptionHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut registry = self.inner.registry.lock().unwrap();
        registry
            .entry(name.to_string())
            .or_default()
            .push(Subscriber { id, handler });
        SubscriptionHandle {
            name: name.to_string(),
            id,
        }
    }

    /// Removes the registration behind `handle`; no-op if already removed.
    /// Calling this from within a handler during an in-flight publish only
    /// affects subsequent publishes.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut registry = self.inner.registry.lock().unwrap();
        if let Some(subscribers) = registry.get_mut(&handle.name) {
            subscribers.retain(|s| s.id != handle.id);
            if subscribers.is_empty() {
                registry.remove(&handle.name);
            }
        }
    }

    /// Synchronously invokes every handler currently subscribed to the
    /// event's name, in registration order, and returns once each has run or
    /// failed. The subscriber list is snapshotted before iteration, so a
    /// handler may unsubscribe (itself included) without skipping or
    /// double-invoking anyone mid-publish. A failing handler is reported and
    /// does not stop delivery to the rest.
    pub fn publish(&self, event: ServerEvent) {
        let snapshot: Vec<EventHandler> = {
            let registry = self.inner.registry.lock().unwrap();
            match registry.get(&event.name) {
                Some(subscribers) => subscribers.iter().map(|s| s.handler.clone()).collect(),
                None => return,
            }
        };
        for handler in snapshot {
            if let Err(err) = handler(&event) {
                tracing::error!("Event handler failed for {}: {:#}", event.name, err);
            }
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, name: &str) -> usize {
        self.inner
            .registry
            .lock()
            .unwrap()
            .get(name)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

/// One frame pushed to a live stream session: the event name plus the
/// serialized `{eventType, payload}` message body.
#[derive(Clone, Debug)]
pub struct SessionFrame {
    pub event: String,
    pub data: String,
}

/// One open streaming connection. Owns the subscription handles it registered
/// on open and removes them exactly once when the transport goes away.
pub struct LiveSession {
    bus: EventBus,
    handles: Mutex<Vec<SubscriptionHandle>>,
}

impl LiveSession {
    /// Registers one forwarding subscription per known event type. Each
    /// matching publish is serialized as `{eventType, payload}` and sent to
    /// `tx` as a single frame, in publish order. A closed receiver means the
    /// client is gone; the send error surfaces through the bus like any other
    /// handler failure.
    pub fn open(bus: EventBus, tx: mpsc::UnboundedSender<SessionFrame>) -> Self {
        let mut handles = Vec::with_capacity(KNOWN_EVENT_TYPES.len());
        for name in KNOWN_EVENT_TYPES {
            let tx = tx.clone();
            let handle = bus.subscribe(
                name,
                Arc::new(move |event: &ServerEvent| {
                    let frame = SessionFrame {
                        event: event.name.clone(),
                        data: serde_json::json!({
                            "eventType": event.name,
                            "payload": event.payload,
                        })
                        .to_string(),
                    };
                    tx.send(frame)
                        .map_err(|_| anyhow::anyhow!("live session transport closed"))?;
                    Ok(())
                }),
            );
            handles.push(handle);
        }
        Self {
            bus,
            handles: Mutex::new(handles),
        }
    }

    /// Removes every subscription this session registered. Idempotent: the
    /// handle list is drained on the first call, so a second close has no
    /// further effect.
    pub fn close(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in &handles {
            self.bus.unsubscribe(handle);
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collector(events: Arc<Mutex<Vec<String>>>, tag: &str) -> EventHandler {
        let tag = tag.to_string();
        Arc::new(move |event: &ServerEvent| {
            events.lock().unwrap().push(format!("{}:{}", tag, event.name));
            Ok(())
        })
    }

    #[test]
    fn delivers_in_publish_order_while_subscribed() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = bus.subscribe(STUDENT_ADDED, collector(seen.clone(), "a"));

        bus.publish(ServerEvent::new(STUDENT_ADDED, json!({"id": 1})));
        bus.publish(ServerEvent::new(GRADE_UPDATED, json!({"id": 2})));
        bus.publish(ServerEvent::new(STUDENT_ADDED, json!({"id": 3})));

        bus.unsubscribe(&handle);
        bus.publish(ServerEvent::new(STUDENT_ADDED, json!({"id": 4})));

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec!["a:student-added", "a:student-added"]);
    }

    #[test]
    fn invokes_handlers_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(GRADE_UPDATED, collector(seen.clone(), "first"));
        bus.subscribe(GRADE_UPDATED, collector(seen.clone(), "second"));

        bus.publish(ServerEvent::new(GRADE_UPDATED, json!({})));

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec!["first:grade-updated", "second:grade-updated"]);
    }

    #[test]
    fn failing_handler_does_not_block_later_handlers() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            FILE_UPLOADED,
            Arc::new(|_: &ServerEvent| anyhow::bail!("boom")),
        );
        bus.subscribe(FILE_UPLOADED, collector(seen.clone(), "after"));

        bus.publish(ServerEvent::new(FILE_UPLOADED, json!({})));

        assert_eq!(*seen.lock().unwrap(), vec!["after:file-uploaded"]);
    }

    #[test]
    fn handler_may_unsubscribe_itself_mid_publish() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

        let handle = {
            let bus_in_handler = bus.clone();
            let slot = slot.clone();
            let seen = seen.clone();
            bus.subscribe(
                ANNOUNCEMENT_CREATED,
                Arc::new(move |_: &ServerEvent| {
                    seen.lock().unwrap().push("self".to_string());
                    if let Some(handle) = slot.lock().unwrap().take() {
                        bus_in_handler.unsubscribe(&handle);
                    }
                    Ok(())
                }),
            )
        };
        *slot.lock().unwrap() = Some(handle);
        bus.subscribe(ANNOUNCEMENT_CREATED, collector(seen.clone(), "other"));

        // First publish: both run; the self-removal applies afterwards.
        bus.publish(ServerEvent::new(ANNOUNCEMENT_CREATED, json!({})));
        bus.publish(ServerEvent::new(ANNOUNCEMENT_CREATED, json!({})));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                "self".to_string(),
                "other:announcement-created".to_string(),
                "other:announcement-created".to_string(),
            ]
        );
    }

    #[test]
    fn unsubscribe_twice_is_a_noop() {
        let bus = EventBus::new();
        let handle = bus.subscribe(STUDENT_ADDED, Arc::new(|_| Ok(())));
        bus.unsubscribe(&handle);
        bus.unsubscribe(&handle);
        assert_eq!(bus.subscriber_count(STUDENT_ADDED), 0);
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(ServerEvent::new("unheard-of", json!({"ok": true})));
    }

    #[tokio::test]
    async fn live_session_forwards_frames_and_tears_down_once() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = LiveSession::open(bus.clone(), tx);
        assert_eq!(bus.subscriber_count(STUDENT_ADDED), 1);

        bus.publish(ServerEvent::new(
            STUDENT_ADDED,
            json!({"id": 1, "name": "Ada"}),
        ));
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.event, STUDENT_ADDED);
        let body: Value = serde_json::from_str(&frame.data).unwrap();
        assert_eq!(body["eventType"], "student-added");
        assert_eq!(body["payload"]["name"], "Ada");
        assert_eq!(body["payload"]["id"], 1);

        session.close();
        session.close();
        for name in KNOWN_EVENT_TYPES {
            assert_eq!(bus.subscriber_count(name), 0);
        }
        bus.publish(ServerEvent::new(STUDENT_ADDED, json!({"id": 2})));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_a_session_unsubscribes_it() {
        let bus = EventBus::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        {
            let _session = LiveSession::open(bus.clone(), tx);
            assert_eq!(bus.subscriber_count(GRADE_UPDATED), 1);
        }
        assert_eq!(bus.subscriber_count(GRADE_UPDATED), 0);
    }
}
