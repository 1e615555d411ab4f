use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery lifecycle of a [`Message`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Acknowledged,
    Failed,
    TimedOut,
}

/// A message routed through the [`super::MessageBus`].
///
/// Owned by the bus from the moment it is handed to `send`/`broadcast`
/// until `receive` returns it to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Application-defined type tag; `-1` is reserved as the subscription
    /// wildcard and should not be used on a real message.
    pub kind: i32,
    pub priority: i32,
    pub sender_id: Uuid,
    pub sender_name: Option<String>,
    /// `None` marks this message as a broadcast.
    pub receiver_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub byte_size: usize,
    pub correlation_id: Option<Uuid>,
    pub expects_response: bool,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(kind: i32, priority: i32, sender_id: Uuid, payload: serde_json::Value) -> Self {
        let byte_size = serde_json::to_vec(&payload).map(|v| v.len()).unwrap_or(0);
        Self {
            id: Uuid::new_v4(),
            kind,
            priority,
            sender_id,
            sender_name: None,
            receiver_id: None,
            payload,
            byte_size,
            correlation_id: None,
            expects_response: false,
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
            delivered_at: None,
        }
    }

    pub fn to(mut self, receiver_id: Uuid) -> Self {
        self.receiver_id = Some(receiver_id);
        self
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Build a response to `request`, correlated by `request.id`, addressed
    /// back to `request.sender_id` (spec §8 scenario 4).
    pub fn create_response(request: &Message, payload: serde_json::Value) -> Self {
        let responder = request.receiver_id.unwrap_or(request.sender_id);
        let mut response = Message::new(request.kind, request.priority, responder, payload);
        response.correlation_id = Some(request.id);
        response.receiver_id = Some(request.sender_id);
        response
    }

    fn clone_for_broadcast(&self) -> Self {
        let mut clone = self.clone();
        clone.id = Uuid::new_v4();
        clone.correlation_id = None;
        clone.status = DeliveryStatus::Pending;
        clone.delivered_at = None;
        clone
    }
}

pub(super) fn clone_for_broadcast(msg: &Message) -> Message {
    msg.clone_for_broadcast()
}

/// `(agent_id, type-filter, handler)` tuple stored in the bus.
///
/// The handler is a closure rather than a separate function-pointer +
/// opaque-context pair: in Rust a capturing closure already is that pair.
/// Handlers run synchronously inside the bus lock (spec §4.3) — they must
/// not block and must not call back into the bus.
pub struct Subscription {
    pub agent_id: Uuid,
    /// `None` matches every message kind (the spec's `-1` wildcard).
    pub kind_filter: Option<i32>,
    pub handler: Box<dyn Fn(&Message) + Send + Sync>,
}

impl Subscription {
    pub fn matches(&self, msg: &Message) -> bool {
        match self.kind_filter {
            None => true,
            Some(k) => k == msg.kind,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("agent_id", &self.agent_id)
            .field("kind_filter", &self.kind_filter)
            .finish()
    }
}
