use anyhow::{Context, Result};

use super::gateway::{ConnectionGateway, HandlerId};
use crate::game::PlayerId;
use crate::{EventName, WSClientToServer, WSServerToClient};

use tokio::sync::mpsc;

/// Membership in one room over a gateway.
///
/// Joining opens the gateway, subscribes to everything the client consumes and asks the server
/// to join. Leaving undoes all of that exactly once, either through `leave` or on drop, so the
/// subscriptions and the connection never outlive the session.
pub struct RoomSession<G: ConnectionGateway> {
    gateway: G,
    room_id: String,
    player_id: Option<PlayerId>,

    handlers: Vec<(EventName, HandlerId)>,
    left: bool,
}

impl<G: ConnectionGateway> RoomSession<G> {
    /// Returns the session and the receiver on which all inbound events arrive, in order.
    pub fn join(
        mut gateway: G,
        room_id: &str,
    ) -> Result<(RoomSession<G>, mpsc::UnboundedReceiver<WSServerToClient>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        // Subscribe before opening, so that nothing the server says first gets lost.
        let handlers = EventName::ALL
            .iter()
            .map(|event| (*event, gateway.subscribe(*event, tx.clone())))
            .collect();

        let mut session = RoomSession {
            gateway,
            room_id: room_id.to_string(),
            player_id: None,
            handlers,
            left: false,
        };

        session.gateway.open().context("opening gateway")?;
        session
            .gateway
            .emit(WSClientToServer::Join(session.room_id.clone()))
            .context(format!("joining room {}", session.room_id))?;

        log::info!("joining room {}", session.room_id);

        Ok((session, rx))
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn set_player_id(&mut self, id: PlayerId) {
        if let Some(prev) = self.player_id {
            if prev != id {
                log::warn!("room {}: player id changed from {} to {}", self.room_id, prev, id);
            }
        }
        self.player_id = Some(id);
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn is_active(&self) -> bool {
        !self.left
    }

    /// Unsubscribes, tells the server we're gone (if it ever told us who we are) and closes the
    /// gateway. Calling it again does nothing.
    pub fn leave(&mut self) {
        if self.left {
            return;
        }
        self.left = true;

        for (event, id) in self.handlers.drain(..) {
            self.gateway.unsubscribe(event, id);
        }

        match self.player_id {
            Some(id) => {
                if let Err(err) = self.gateway.emit(WSClientToServer::Leave(id)) {
                    log::warn!("room {}: failed to send leave notice: {:#}", self.room_id, err);
                }
            }
            None => {
                log::debug!("room {}: never got a player id, not sending leave", self.room_id);
            }
        }

        self.gateway.close();
        log::info!("left room {}", self.room_id);
    }
}

impl<G: ConnectionGateway> Drop for RoomSession<G> {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game_manager::gateway::{Handler, Subscribers};
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};

    /// In-memory gateway. Clones share state, so a test can keep one to push inbound events and
    /// inspect what was emitted while the other one is owned by the code under test.
    #[derive(Clone, Default)]
    pub(crate) struct FakeGateway {
        pub(crate) shared: Arc<Mutex<FakeState>>,
    }

    #[derive(Default)]
    pub(crate) struct FakeState {
        pub(crate) subscribers: Subscribers,
        pub(crate) sent: Vec<WSClientToServer>,
        pub(crate) opened: bool,
        pub(crate) closed: bool,
        pub(crate) fail_open: bool,
    }

    impl FakeGateway {
        pub(crate) fn push(&self, msg: WSServerToClient) -> usize {
            let mut s = self.shared.lock().unwrap();
            if s.closed {
                return 0;
            }
            s.subscribers.dispatch(&msg)
        }

        pub(crate) fn sent(&self) -> Vec<WSClientToServer> {
            self.shared.lock().unwrap().sent.clone()
        }

        pub(crate) fn subscriptions(&self) -> usize {
            self.shared.lock().unwrap().subscribers.len()
        }

        pub(crate) fn is_closed(&self) -> bool {
            self.shared.lock().unwrap().closed
        }
    }

    impl ConnectionGateway for FakeGateway {
        fn open(&mut self) -> Result<()> {
            let mut s = self.shared.lock().unwrap();
            if s.fail_open {
                return Err(anyhow!("refused"));
            }
            s.opened = true;
            Ok(())
        }

        fn close(&mut self) {
            let mut s = self.shared.lock().unwrap();
            s.closed = true;
            s.subscribers.clear();
        }

        fn subscribe(&mut self, event: EventName, handler: Handler) -> HandlerId {
            self.shared.lock().unwrap().subscribers.add(event, handler)
        }

        fn unsubscribe(&mut self, event: EventName, id: HandlerId) {
            self.shared.lock().unwrap().subscribers.remove(event, id);
        }

        fn emit(&mut self, msg: WSClientToServer) -> Result<()> {
            let mut s = self.shared.lock().unwrap();
            if s.closed {
                return Err(anyhow!("closed"));
            }
            s.sent.push(msg);
            Ok(())
        }
    }

    #[test]
    fn test_join_subscribes_and_requests_room() {
        let gw = FakeGateway::default();
        let (session, mut rx) = RoomSession::join(gw.clone(), "room-1").unwrap();

        assert!(gw.shared.lock().unwrap().opened);
        assert_eq!(gw.subscriptions(), 3);
        assert_eq!(gw.sent(), vec![WSClientToServer::Join("room-1".to_string())]);

        gw.push(WSServerToClient::Error("nope".to_string()));
        assert_eq!(rx.try_recv().unwrap(), WSServerToClient::Error("nope".to_string()));

        drop(session);
    }

    #[test]
    fn test_leave_sends_notice_once() {
        let gw = FakeGateway::default();
        let (mut session, mut rx) = RoomSession::join(gw.clone(), "r").unwrap();
        session.set_player_id(8);

        session.leave();
        session.leave();
        drop(session);

        assert_eq!(
            gw.sent(),
            vec![
                WSClientToServer::Join("r".to_string()),
                WSClientToServer::Leave(8),
            ]
        );
        assert_eq!(gw.subscriptions(), 0);
        assert!(gw.is_closed());

        // Every handler is gone, so the channel is closed.
        assert!(rx.try_recv().is_err());
        assert_eq!(gw.push(WSServerToClient::Error("late".to_string())), 0);
    }

    #[test]
    fn test_drop_tears_down() {
        let gw = FakeGateway::default();
        {
            let (mut session, _rx) = RoomSession::join(gw.clone(), "r").unwrap();
            session.set_player_id(2);
        }

        assert!(gw.is_closed());
        assert_eq!(gw.subscriptions(), 0);
        assert_eq!(gw.sent().last(), Some(&WSClientToServer::Leave(2)));
    }

    #[test]
    fn test_no_leave_without_player_id() {
        let gw = FakeGateway::default();
        let (session, _rx) = RoomSession::join(gw.clone(), "r").unwrap();
        drop(session);

        assert_eq!(gw.sent(), vec![WSClientToServer::Join("r".to_string())]);
        assert!(gw.is_closed());
    }

    #[test]
    fn test_failed_open_still_cleans_up() {
        let gw = FakeGateway::default();
        gw.shared.lock().unwrap().fail_open = true;

        assert!(RoomSession::join(gw.clone(), "r").is_err());
        assert_eq!(gw.subscriptions(), 0);
        assert!(gw.is_closed());
    }
}
