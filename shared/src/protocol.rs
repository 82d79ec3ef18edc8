//! JSON wire protocol shared by the server and the client.
//!
//! Every frame is a single JSON object `{"type": "<kind>", "payload": {...}}`.
//! Frames are decoded once at the connection boundary into a tagged enum and
//! dispatched from there; handlers never inspect raw JSON fields.

use crate::{PlayerId, Vec3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("invalid payload for '{kind}': {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The part of a participant's state that other participants may see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub health: i32,
    pub alive: bool,
}

/// Messages sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientMessage {
    Join {
        #[serde(default)]
        name: String,
        #[serde(default)]
        position: Vec3,
        #[serde(default)]
        rotation: Vec3,
    },
    StateUpdate {
        position: Vec3,
        rotation: Vec3,
    },
    Attack {},
    Respawn {},
    RtcOffer {
        to: PlayerId,
        description: Value,
    },
    RtcAnswer {
        to: PlayerId,
        description: Value,
    },
    RtcIce {
        to: PlayerId,
        candidate: Value,
    },
}

/// Messages sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    Welcome {
        id: PlayerId,
    },
    RoomState {
        players: Vec<PublicPlayer>,
    },
    PlayerJoined {
        player: PublicPlayer,
    },
    PlayerLeft {
        id: PlayerId,
    },
    StateUpdate {
        id: PlayerId,
        position: Vec3,
        rotation: Vec3,
    },
    Attack {
        attacker: PlayerId,
    },
    HealthUpdate {
        id: PlayerId,
        health: i32,
        alive: bool,
    },
    PlayerRespawned {
        player: PublicPlayer,
    },
    Respawned {
        position: Vec3,
        health: i32,
    },
    RtcOffer {
        from: PlayerId,
        description: Value,
    },
    RtcAnswer {
        from: PlayerId,
        description: Value,
    },
    RtcIce {
        from: PlayerId,
        candidate: Value,
    },
}

/// Voice handshake message kinds carried through the signaling relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    Ice,
}

impl SignalKind {
    /// Builds the client request addressed to `to`.
    pub fn request(self, to: PlayerId, body: Value) -> ClientMessage {
        match self {
            SignalKind::Offer => ClientMessage::RtcOffer {
                to,
                description: body,
            },
            SignalKind::Answer => ClientMessage::RtcAnswer {
                to,
                description: body,
            },
            SignalKind::Ice => ClientMessage::RtcIce {
                to,
                candidate: body,
            },
        }
    }

    /// Builds the server message delivered to the target, stamped with the sender.
    pub fn deliver(self, from: PlayerId, body: Value) -> ServerMessage {
        match self {
            SignalKind::Offer => ServerMessage::RtcOffer {
                from,
                description: body,
            },
            SignalKind::Answer => ServerMessage::RtcAnswer {
                from,
                description: body,
            },
            SignalKind::Ice => ServerMessage::RtcIce {
                from,
                candidate: body,
            },
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

fn decode_tagged<T: DeserializeOwned>(
    text: &str,
    known_kinds: &[&str],
) -> Result<Option<T>, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    if !known_kinds.contains(&envelope.kind.as_str()) {
        return Ok(None);
    }

    // Payload-less kinds such as `attack` may omit the field entirely.
    let payload = match envelope.payload {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    let tagged = json!({ "type": envelope.kind, "payload": payload });
    serde_json::from_value(tagged)
        .map(Some)
        .map_err(|e| ProtocolError::InvalidPayload {
            kind: envelope.kind,
            reason: e.to_string(),
        })
}

impl ClientMessage {
    pub const KINDS: &'static [&'static str] = &[
        "join",
        "state-update",
        "attack",
        "respawn",
        "rtc-offer",
        "rtc-answer",
        "rtc-ice",
    ];

    /// Decodes one inbound frame.
    ///
    /// Returns `Ok(None)` for well-formed frames of an unknown kind so callers
    /// can ignore them without logging.
    pub fn decode(text: &str) -> Result<Option<ClientMessage>, ProtocolError> {
        decode_tagged(text, Self::KINDS)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Splits a signaling request into its kind, target and opaque body.
    pub fn into_signal(self) -> Result<(SignalKind, PlayerId, Value), ClientMessage> {
        match self {
            ClientMessage::RtcOffer { to, description } => Ok((SignalKind::Offer, to, description)),
            ClientMessage::RtcAnswer { to, description } => {
                Ok((SignalKind::Answer, to, description))
            }
            ClientMessage::RtcIce { to, candidate } => Ok((SignalKind::Ice, to, candidate)),
            other => Err(other),
        }
    }
}

impl ServerMessage {
    pub const KINDS: &'static [&'static str] = &[
        "welcome",
        "room-state",
        "player-joined",
        "player-left",
        "state-update",
        "attack",
        "health-update",
        "player-respawned",
        "respawned",
        "rtc-offer",
        "rtc-answer",
        "rtc-ice",
    ];

    pub fn decode(text: &str) -> Result<Option<ServerMessage>, ProtocolError> {
        decode_tagged(text, Self::KINDS)
    }

    /// Wire name of this message, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::RoomState { .. } => "room-state",
            ServerMessage::PlayerJoined { .. } => "player-joined",
            ServerMessage::PlayerLeft { .. } => "player-left",
            ServerMessage::StateUpdate { .. } => "state-update",
            ServerMessage::Attack { .. } => "attack",
            ServerMessage::HealthUpdate { .. } => "health-update",
            ServerMessage::PlayerRespawned { .. } => "player-respawned",
            ServerMessage::Respawned { .. } => "respawned",
            ServerMessage::RtcOffer { .. } => "rtc-offer",
            ServerMessage::RtcAnswer { .. } => "rtc-answer",
            ServerMessage::RtcIce { .. } => "rtc-ice",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Splits a relayed signaling message into its kind, sender and opaque body.
    pub fn into_signal(self) -> Result<(SignalKind, PlayerId, Value), ServerMessage> {
        match self {
            ServerMessage::RtcOffer { from, description } => {
                Ok((SignalKind::Offer, from, description))
            }
            ServerMessage::RtcAnswer { from, description } => {
                Ok((SignalKind::Answer, from, description))
            }
            ServerMessage::RtcIce { from, candidate } => Ok((SignalKind::Ice, from, candidate)),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_HEALTH;

    fn sample_player() -> PublicPlayer {
        PublicPlayer {
            id: PlayerId::new("7f3a"),
            name: "Alice".to_string(),
            position: Vec3::new(0.0, 1.6, 5.0),
            rotation: Vec3::new(0.0, 1.25, 0.0),
            health: MAX_HEALTH,
            alive: true,
        }
    }

    #[test]
    fn test_public_player_roundtrip() {
        let player = sample_player();
        let json = serde_json::to_string(&player).unwrap();
        let back: PublicPlayer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, player);
    }

    #[test]
    fn test_public_player_wire_shape() {
        let value = serde_json::to_value(sample_player()).unwrap();
        assert_eq!(value["id"], "7f3a");
        assert_eq!(value["position"], json!([0.0, 1.6f32, 5.0]));
        assert_eq!(value["health"], 6);
        assert_eq!(value["alive"], true);
    }

    #[test]
    fn test_server_message_envelope() {
        let msg = ServerMessage::PlayerLeft {
            id: PlayerId::new("p1"),
        };
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "player-left", "payload": {"id": "p1"}}));
    }

    #[test]
    fn test_decode_join() {
        let text = r#"{"type":"join","payload":{"name":"Bob","position":[1,1.6,2],"rotation":[0,3.1,0]}}"#;
        let msg = ClientMessage::decode(text).unwrap();
        match msg {
            Some(ClientMessage::Join {
                name,
                position,
                rotation,
            }) => {
                assert_eq!(name, "Bob");
                assert_eq!(position, Vec3::new(1.0, 1.6, 2.0));
                assert_eq!(rotation.y, 3.1);
            }
            other => panic!("Unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_attack_without_payload() {
        let msg = ClientMessage::decode(r#"{"type":"attack"}"#).unwrap();
        assert_eq!(msg, Some(ClientMessage::Attack {}));

        let msg = ClientMessage::decode(r#"{"type":"respawn","payload":{}}"#).unwrap();
        assert_eq!(msg, Some(ClientMessage::Respawn {}));
    }

    #[test]
    fn test_decode_unknown_type_is_ignored() {
        let msg = ClientMessage::decode(r#"{"type":"dance","payload":{"style":"robot"}}"#).unwrap();
        assert!(msg.is_none());
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"payload":{}}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::decode("[1,2,3]"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_invalid_payload() {
        let result = ClientMessage::decode(r#"{"type":"state-update","payload":{"position":"up"}}"#);
        match result {
            Err(ProtocolError::InvalidPayload { kind, .. }) => assert_eq!(kind, "state-update"),
            other => panic!("Expected invalid payload, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_out_of_range_coordinates() {
        let text = r#"{"type":"state-update","payload":{"position":[1e39,1.6,5],"rotation":[0,0,0]}}"#;
        match ClientMessage::decode(text) {
            Err(ProtocolError::InvalidPayload { kind, .. }) => assert_eq!(kind, "state-update"),
            other => panic!("Expected invalid payload, got {:?}", other),
        }

        let text = r#"{"type":"join","payload":{"name":"Eve","position":[0,1.6,5],"rotation":[0,-1e39,0]}}"#;
        assert!(matches!(
            ClientMessage::decode(text),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_signal_request_and_delivery() {
        let body = json!({"sdp": "v=0", "type": "offer"});
        let request = SignalKind::Offer.request(PlayerId::new("b"), body.clone());
        let text = request.encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "rtc-offer");
        assert_eq!(value["payload"]["to"], "b");

        let (kind, to, carried) = ClientMessage::decode(&text)
            .unwrap()
            .unwrap()
            .into_signal()
            .unwrap();
        assert_eq!(kind, SignalKind::Offer);
        assert_eq!(to, PlayerId::new("b"));
        assert_eq!(carried, body);

        let delivered = SignalKind::Ice.deliver(PlayerId::new("a"), json!({"candidate": "c"}));
        let value = serde_json::to_value(&delivered).unwrap();
        assert_eq!(value["type"], "rtc-ice");
        assert_eq!(value["payload"]["from"], "a");
        assert_eq!(value["payload"]["candidate"]["candidate"], "c");
    }

    #[test]
    fn test_non_signal_message_is_returned_unchanged() {
        let msg = ClientMessage::Attack {};
        assert_eq!(msg.clone().into_signal().unwrap_err(), msg);
    }

    #[test]
    fn test_server_decode_room_state() {
        let msg = ServerMessage::RoomState {
            players: vec![sample_player()],
        };
        let decoded = ServerMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, Some(msg));
    }
}
