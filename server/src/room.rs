//! Session registry: the single authoritative owner of participant state
//!
//! This module handles the server-side bookkeeping of everyone sharing the room:
//! - Participant lifecycle (accept, join handshake, leave)
//! - Transform updates relayed to the other ready participants
//! - Fan-out broadcast with per-recipient failure isolation
//!
//! All participant mutation goes through `Room`, so wrapping one `Room` in a
//! single mutex gives every handler the same consistent view of the world.
//! Combat and signaling operations live in their own modules as further
//! `impl Room` blocks.

use log::{debug, info, warn};
use shared::{
    sanitize_name, PlayerId, PublicPlayer, ServerMessage, Transform, Vec3, MAX_HEALTH,
};
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound half of a participant's channel. The gateway owns the receiving end.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// Health bookkeeping for one participant
#[derive(Debug, Clone, PartialEq)]
pub struct CombatState {
    pub health: i32,
    pub alive: bool,
    /// Wall-clock millis of the last accepted attack
    pub last_attack_ms: Option<u64>,
}

impl Default for CombatState {
    fn default() -> Self {
        Self {
            health: MAX_HEALTH,
            alive: true,
            last_attack_ms: None,
        }
    }
}

/// One connected user's authoritative state
///
/// A participant exists from channel accept until channel close. It only
/// takes part in gameplay (and only shows up in broadcasts) once `ready`.
#[derive(Debug)]
pub struct Participant {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
    pub transform: Transform,
    pub combat: CombatState,
    sender: Outbound,
}

impl Participant {
    fn new(id: PlayerId, sender: Outbound) -> Self {
        Self {
            id,
            name: shared::DEFAULT_NAME.to_string(),
            ready: false,
            transform: Transform::default(),
            combat: CombatState::default(),
            sender,
        }
    }

    /// Projects the subset of state other participants are allowed to see
    pub fn public(&self) -> PublicPlayer {
        PublicPlayer {
            id: self.id.clone(),
            name: self.name.clone(),
            position: self.transform.position,
            rotation: self.transform.rotation,
            health: self.combat.health,
            alive: self.combat.alive,
        }
    }

    /// Ready and alive: eligible to move, attack and be attacked
    pub fn is_active(&self) -> bool {
        self.ready && self.combat.alive
    }

    /// Queues a message on this participant's channel
    ///
    /// Returns false when the channel's receiving side is gone. The caller
    /// decides whether to log; the participant is never removed here.
    pub(crate) fn send(&self, message: ServerMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Room of participants keyed by their server-issued id
///
/// Constructed once per process and handed to every connection handler.
/// Iteration order over participants is unspecified.
#[derive(Debug, Default)]
pub struct Room {
    pub(crate) participants: HashMap<PlayerId, Participant>,
}

impl Room {
    pub fn new() -> Self {
        Self {
            participants: HashMap::new(),
        }
    }

    /// Registers a freshly accepted channel
    ///
    /// The participant starts with full health, alive, and not ready. Nothing
    /// is broadcast until it completes a join.
    pub fn add_participant(&mut self, sender: Outbound) -> PlayerId {
        let id = PlayerId::new(Uuid::new_v4().to_string());
        self.participants
            .insert(id.clone(), Participant::new(id.clone(), sender));
        debug!("Participant {} accepted ({} connected)", id, self.len());
        id
    }

    /// Completes the join handshake for `id`
    ///
    /// Sends the joiner a room-state snapshot of every *other* ready
    /// participant, then announces the joiner to everyone else. A repeated
    /// join re-applies name and transform and repeats both messages.
    pub fn handle_join(&mut self, id: &PlayerId, name: &str, position: Vec3, rotation: Vec3) {
        let public = match self.participants.get_mut(id) {
            Some(participant) => {
                participant.name = sanitize_name(name);
                participant.ready = true;
                participant.transform = Transform::new(position, rotation);
                participant.public()
            }
            None => {
                warn!("Join from unknown participant {}", id);
                return;
            }
        };

        let players = self
            .participants
            .values()
            .filter(|p| p.ready && p.id != *id)
            .map(Participant::public)
            .collect();
        self.send_to(id, ServerMessage::RoomState { players });

        info!("{} joined as '{}'", id, public.name);
        self.broadcast(ServerMessage::PlayerJoined { player: public }, Some(id));
    }

    /// Applies a transform update and relays it to every other ready participant
    ///
    /// Ignored unless the sender is ready and alive. Updates are neither
    /// sequenced nor buffered: last write wins per sender.
    pub fn handle_state_update(&mut self, id: &PlayerId, position: Vec3, rotation: Vec3) {
        match self.participants.get_mut(id) {
            Some(participant) if participant.is_active() => {
                participant.transform = Transform::new(position, rotation);
            }
            _ => return,
        }

        self.broadcast(
            ServerMessage::StateUpdate {
                id: id.clone(),
                position,
                rotation,
            },
            Some(id),
        );
    }

    /// Removes a participant and tells the rest it left
    ///
    /// Returns false if the id was already gone.
    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        match self.participants.remove(id) {
            Some(participant) => {
                info!("{} left ({} remaining)", participant.id, self.len());
                if participant.ready {
                    self.broadcast(ServerMessage::PlayerLeft { id: id.clone() }, None);
                }
                true
            }
            None => false,
        }
    }

    /// Sends a message to one participant, regardless of readiness
    pub fn send_to(&self, id: &PlayerId, message: ServerMessage) -> bool {
        match self.participants.get(id) {
            Some(participant) => {
                let kind = message.kind();
                let delivered = participant.send(message);
                if !delivered {
                    warn!("Failed to deliver {} to {}", kind, id);
                }
                delivered
            }
            None => false,
        }
    }

    /// Fans a message out to every ready participant except `exclude`
    ///
    /// A failed delivery is logged and skipped; it neither stops delivery to
    /// the others nor removes the failing participant. Only that participant's
    /// own channel closing removes it.
    pub fn broadcast(&self, message: ServerMessage, exclude: Option<&PlayerId>) {
        for participant in self.participants.values() {
            if !participant.ready || Some(&participant.id) == exclude {
                continue;
            }

            if !participant.send(message.clone()) {
                warn!("Failed to deliver {} to {}", message.kind(), participant.id);
            }
        }
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Public projections of all ready participants
    pub fn ready_players(&self) -> Vec<PublicPlayer> {
        self.participants
            .values()
            .filter(|p| p.ready)
            .map(Participant::public)
            .collect()
    }

    /// Returns the number of connected participants, ready or not
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
