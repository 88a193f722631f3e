pub mod game;
pub mod game_manager;
pub mod view;

use crate::game::{Choice, PlayerId, RoomSnapshot};

/// Message the client sends to the room server. Serialized as `{"event": .., "data": ..}`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WSClientToServer {
    /// Ask to join the room with the given id.
    #[serde(rename = "room:join")]
    Join(String),

    /// Let the server know that the given player is leaving.
    #[serde(rename = "room:leave")]
    Leave(PlayerId),

    /// Submit the move for the current round.
    #[serde(rename = "room:choice")]
    Choice(Choice),
}

/// Message the room server pushes to the client.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WSServerToClient {
    #[serde(rename = "room:joined")]
    Joined(RoomJoined),

    #[serde(rename = "room:update")]
    Update(RoomSnapshot),

    #[serde(rename = "error")]
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoomJoined {
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
}

/// Name of an inbound event, used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    RoomJoined,
    RoomUpdate,
    Error,
}

impl EventName {
    pub const ALL: [EventName; 3] = [EventName::RoomJoined, EventName::RoomUpdate, EventName::Error];

    pub fn as_str(&self) -> &'static str {
        match *self {
            EventName::RoomJoined => "room:joined",
            EventName::RoomUpdate => "room:update",
            EventName::Error => "error",
        }
    }
}

impl WSServerToClient {
    pub fn event(&self) -> EventName {
        match self {
            WSServerToClient::Joined(_) => EventName::RoomJoined,
            WSServerToClient::Update(_) => EventName::RoomUpdate,
            WSServerToClient::Error(_) => EventName::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_frames() {
        let join = serde_json::to_value(&WSClientToServer::Join("abc".to_string())).unwrap();
        assert_eq!(join, json!({"event": "room:join", "data": "abc"}));

        let leave = serde_json::to_value(&WSClientToServer::Leave(4)).unwrap();
        assert_eq!(leave, json!({"event": "room:leave", "data": 4}));

        let choice = serde_json::to_value(&WSClientToServer::Choice(Choice::Paper)).unwrap();
        assert_eq!(choice, json!({"event": "room:choice", "data": "PAPER"}));
    }

    #[test]
    fn test_inbound_frames() {
        let msg: WSServerToClient =
            serde_json::from_str(r#"{"event": "room:joined", "data": {"playerId": 12}}"#).unwrap();
        assert_eq!(msg, WSServerToClient::Joined(RoomJoined { player_id: 12 }));
        assert_eq!(msg.event(), EventName::RoomJoined);

        let msg: WSServerToClient =
            serde_json::from_str(r#"{"event": "error", "data": "room is full"}"#).unwrap();
        assert_eq!(msg, WSServerToClient::Error("room is full".to_string()));
        assert_eq!(msg.event().as_str(), "error");

        let msg: WSServerToClient = serde_json::from_str(
            r#"{"event": "room:update", "data": {"round": 0, "players": []}}"#,
        )
        .unwrap();
        assert_eq!(msg.event(), EventName::RoomUpdate);

        assert!(serde_json::from_str::<WSServerToClient>(r#"{"event": "room:nope", "data": 1}"#).is_err());
    }
}
