//! Message bus (spec §4.3): per-recipient mailboxes, blocking/timed/
//! non-blocking receive, broadcast, subscriptions, request/response
//! correlation.

mod message;

pub use message::{DeliveryStatus, Message, Subscription};

use crate::concurrency::{wait_while, Condvar, Mutex};
use crate::constants::REQUEST_POLL_SLICE_MS;
use crate::error::{ForgeError, Result};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

struct State {
    mailboxes: HashMap<Uuid, VecDeque<Message>>,
    subscriptions: Vec<Subscription>,
    shutdown: bool,
}

/// Central message router. Created with [`MessageBus::new`], torn down
/// with [`MessageBus::shutdown`] followed by [`MessageBus::free`].
pub struct MessageBus {
    state: Mutex<State>,
    available: Condvar,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                mailboxes: HashMap::new(),
                subscriptions: Vec::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Deliver `msg` to its receiver's mailbox, running matching
    /// subscriptions synchronously while holding the bus lock.
    ///
    /// Takes ownership of `msg` regardless of outcome.
    pub fn send(&self, msg: Message) -> Result<()> {
        let Some(receiver_id) = msg.receiver_id else {
            return Err(ForgeError::InvalidArgument(
                "send requires a non-null receiver id".into(),
            ));
        };

        let mut state = self.state.lock();
        if state.shutdown {
            return Err(ForgeError::Shutdown("message bus is shut down".into()));
        }

        let mut delivered = msg;
        delivered.status = DeliveryStatus::Delivered;
        delivered.delivered_at = Some(chrono::Utc::now());

        state
            .mailboxes
            .entry(receiver_id)
            .or_default()
            .push_back(delivered.clone());

        for sub in state.subscriptions.iter() {
            if sub.agent_id == receiver_id && sub.matches(&delivered) {
                (sub.handler)(&delivered);
            }
        }

        self.available.notify_all();
        Ok(())
    }

    /// Clone `msg` once per mailbox other than the sender's, enqueue each
    /// clone, and drop the original. Does not invoke subscription handlers.
    pub fn broadcast(&self, msg: Message) -> Result<()> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(ForgeError::Shutdown("message bus is shut down".into()));
        }

        let targets: Vec<Uuid> = state
            .mailboxes
            .keys()
            .copied()
            .filter(|id| *id != msg.sender_id)
            .collect();

        for target in targets {
            let mut clone = message::clone_for_broadcast(&msg);
            clone.receiver_id = Some(target);
            clone.status = DeliveryStatus::Delivered;
            clone.delivered_at = Some(chrono::Utc::now());
            state.mailboxes.entry(target).or_default().push_back(clone);
        }

        self.available.notify_all();
        Ok(())
    }

    /// Block until `agent_id`'s mailbox is non-empty or the bus shuts down.
    pub fn receive(&self, agent_id: Uuid) -> Option<Message> {
        self.receive_inner(agent_id, None)
    }

    /// Wait up to `timeout` for a message; may return `None` on timeout.
    pub fn receive_timeout(&self, agent_id: Uuid, timeout: Duration) -> Option<Message> {
        self.receive_inner(agent_id, Some(timeout))
    }

    fn receive_inner(&self, agent_id: Uuid, timeout: Option<Duration>) -> Option<Message> {
        let guard = self.state.lock();
        let mailbox_empty = |s: &mut State| {
            !s.shutdown
                && s.mailboxes.get(&agent_id).map(VecDeque::is_empty).unwrap_or(true)
        };
        let (mut guard, _) = wait_while(&self.available, guard, timeout, mailbox_empty);
        guard.mailboxes.get_mut(&agent_id).and_then(VecDeque::pop_front)
    }

    /// Never blocks, never creates a mailbox that doesn't already exist.
    pub fn try_receive(&self, agent_id: Uuid) -> Option<Message> {
        let mut state = self.state.lock();
        state.mailboxes.get_mut(&agent_id)?.pop_front()
    }

    /// Send `msg` as a request and block (in
    /// [`crate::constants::REQUEST_POLL_SLICE_MS`] slices) up to
    /// `timeout` for the correlated response.
    ///
    /// Messages that arrive in the meantime without a matching
    /// correlation id are re-enqueued to the sender's own mailbox — a
    /// documented quirk (spec §9), not a bug to silently fix.
    pub fn request(&self, mut msg: Message, timeout: Duration) -> Result<Option<Message>> {
        let sender_id = msg.sender_id;
        let Some(_receiver_id) = msg.receiver_id else {
            return Err(ForgeError::InvalidArgument(
                "request requires a non-null receiver id".into(),
            ));
        };

        msg.expects_response = true;
        let correlation_id = msg.id;
        self.send(msg)?;

        let deadline = std::time::Instant::now() + timeout;
        let slice = Duration::from_millis(REQUEST_POLL_SLICE_MS);

        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let wait = remaining.min(slice);
            match self.receive_timeout(sender_id, wait) {
                Some(candidate) if candidate.correlation_id == Some(correlation_id) => {
                    return Ok(Some(candidate));
                }
                Some(other) => {
                    debug!(
                        "request: re-enqueuing unrelated message {} to sender {}",
                        other.id, sender_id
                    );
                    let mut state = self.state.lock();
                    state.mailboxes.entry(sender_id).or_default().push_back(other);
                    self.available.notify_all();
                }
                None => {}
            }
        }
    }

    /// Replace an existing `(agent_id, kind_filter)` subscription in place,
    /// or append a new one.
    pub fn subscribe(
        &self,
        agent_id: Uuid,
        kind_filter: Option<i32>,
        handler: Box<dyn Fn(&Message) + Send + Sync>,
    ) {
        let mut state = self.state.lock();
        if let Some(existing) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.agent_id == agent_id && s.kind_filter == kind_filter)
        {
            existing.handler = handler;
        } else {
            state.subscriptions.push(Subscription {
                agent_id,
                kind_filter,
                handler,
            });
        }
    }

    pub fn unsubscribe(&self, agent_id: Uuid) {
        let mut state = self.state.lock();
        state.subscriptions.retain(|s| s.agent_id != agent_id);
    }

    /// Wake every blocked receiver; subsequent receives on an empty
    /// mailbox return `None` immediately.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        drop(state);
        self.available.notify_all();
    }

    /// Drain every mailbox and drop every subscription.
    pub fn free(&self) {
        let mut state = self.state.lock();
        let dropped: usize = state.mailboxes.values().map(VecDeque::len).sum();
        if dropped > 0 {
            warn!("message bus freed with {dropped} undelivered messages still queued");
        }
        state.mailboxes.clear();
        state.subscriptions.clear();
    }
}

impl Drop for MessageBus {
    fn drop(&mut self) {
        self.shutdown();
        self.free();
    }
}
