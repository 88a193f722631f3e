use anyhow::Result;
use std::collections::HashMap;

use crate::{EventName, WSClientToServer, WSServerToClient};

use tokio::sync::mpsc;

/// Where a gateway delivers inbound events for a subscription.
pub type Handler = mpsc::UnboundedSender<WSServerToClient>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Bidirectional channel to the room server.
///
/// None of the calls block: emits are queued rather than awaited, which lets a `RoomSession`
/// send its leave notice from `Drop`.
pub trait ConnectionGateway {
    /// Starts the connection. Emits issued before the connection is established are queued.
    fn open(&mut self) -> Result<()>;

    /// Flushes queued emits, closes the connection and drops every handler. After this, no
    /// handler receives anything.
    fn close(&mut self);

    fn subscribe(&mut self, event: EventName, handler: Handler) -> HandlerId;

    fn unsubscribe(&mut self, event: EventName, id: HandlerId);

    fn emit(&mut self, msg: WSClientToServer) -> Result<()>;
}

/// Dispatch table from event names to handlers.
#[derive(Debug, Default)]
pub struct Subscribers {
    next_id: u64,
    handlers: HashMap<EventName, Vec<(HandlerId, Handler)>>,
}

impl Subscribers {
    pub fn new() -> Subscribers {
        Subscribers::default()
    }

    /// Allocates a fresh id without registering anything under it.
    pub fn next_id(&mut self) -> HandlerId {
        self.next_id += 1;
        HandlerId(self.next_id)
    }

    pub fn add(&mut self, event: EventName, handler: Handler) -> HandlerId {
        let id = self.next_id();
        self.insert(event, id, handler);
        id
    }

    /// Registers a handler under an id allocated earlier.
    pub fn insert(&mut self, event: EventName, id: HandlerId, handler: Handler) {
        self.handlers.entry(event).or_default().push((id, handler));
    }

    pub fn remove(&mut self, event: EventName, id: HandlerId) -> bool {
        let list = match self.handlers.get_mut(&event) {
            Some(v) => v,
            None => return false,
        };

        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        before != list.len()
    }

    /// Delivers the message to every handler subscribed to its event, in subscription order.
    /// Handlers whose receiving side is gone are forgotten. Returns the number of deliveries.
    pub fn dispatch(&mut self, msg: &WSServerToClient) -> usize {
        let event = msg.event();
        let list = match self.handlers.get_mut(&event) {
            Some(v) => v,
            None => {
                log::debug!("no subscribers for {}", event.as_str());
                return 0;
            }
        };

        let mut delivered = 0;
        list.retain(|(id, handler)| match handler.send(msg.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                log::debug!("dropping closed handler {:?} for {}", id, event.as_str());
                false
            }
        });

        delivered
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}
