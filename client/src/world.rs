//! Client world: the single cooperative update loop.
//!
//! Network handlers only call [`ClientWorld::stage`]. Staged messages are
//! applied together at the start of the next [`ClientWorld::update`], so no
//! frame ever observes a half-applied batch. After applying, the update
//! advances reconciliation, moves voice sources to the freshly smoothed
//! positions and hands back everything that should go to the server.

use crate::error::VoiceError;
use crate::mesh::{PeerMesh, VoiceEngine};
use crate::reconciliation::ReconciliationEngine;
use log::{info, warn};
use shared::{ClientMessage, PlayerId, ServerMessage, Transform, Vec3, MAX_HEALTH};
use std::collections::VecDeque;

/// The participant driven by this client, in eye-height coordinates
#[derive(Debug, Clone)]
pub struct LocalAvatar {
    pub transform: Transform,
    pub health: i32,
    pub alive: bool,
}

impl Default for LocalAvatar {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            health: MAX_HEALTH,
            alive: true,
        }
    }
}

pub struct ClientWorld<E: VoiceEngine> {
    local_id: Option<PlayerId>,
    joined: bool,
    local: LocalAvatar,
    remotes: ReconciliationEngine,
    mesh: PeerMesh<E>,
    inbox: VecDeque<ServerMessage>,
    outbox: Vec<ClientMessage>,
}

impl<E: VoiceEngine> ClientWorld<E> {
    pub fn new(engine: E) -> Self {
        Self {
            local_id: None,
            joined: false,
            local: LocalAvatar::default(),
            remotes: ReconciliationEngine::new(),
            mesh: PeerMesh::new(engine),
            inbox: VecDeque::new(),
            outbox: Vec::new(),
        }
    }

    /// Queues a server message for the next update
    pub fn stage(&mut self, message: ServerMessage) {
        self.inbox.push_back(message);
    }

    /// Runs one frame and returns the messages to send to the server
    pub fn update(&mut self, dt: f32) -> Vec<ClientMessage> {
        while let Some(message) = self.inbox.pop_front() {
            self.apply(message);
        }

        self.remotes.tick(dt);
        self.mesh.refresh_positions(self.remotes.positions());

        let mut outgoing = std::mem::take(&mut self.outbox);
        outgoing.extend(self.mesh.drain_outbox());
        outgoing
    }

    fn is_local(&self, id: &PlayerId) -> bool {
        self.local_id.as_ref() == Some(id)
    }

    fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome { id } => {
                self.mesh.set_local_id(id.clone());
                self.local_id = Some(id);
            }
            ServerMessage::RoomState { players } => {
                self.joined = true;
                self.remotes.clear();
                let local = self.local_id.clone();

                // Peers missing from a fresh snapshot are gone
                let departed: Vec<PlayerId> = self
                    .mesh
                    .known_peers()
                    .filter(|known| !players.iter().any(|p| &p.id == *known))
                    .cloned()
                    .collect();
                for peer in &departed {
                    self.mesh.peer_left(peer);
                }

                for player in players.iter().filter(|p| local.as_ref() != Some(&p.id)) {
                    self.remotes.upsert(player);
                    self.mesh.peer_joined(player.id.clone());
                }
                info!("Joined room with {} other participant(s)", self.remotes.len());
            }
            ServerMessage::PlayerJoined { player } => {
                if self.is_local(&player.id) {
                    return;
                }
                info!("{} joined", player.name);
                self.remotes.upsert(&player);
                self.mesh.peer_joined(player.id);
            }
            ServerMessage::PlayerLeft { id } => {
                if let Some(view) = self.remotes.remove(&id) {
                    info!("{} left", view.name);
                }
                self.mesh.peer_left(&id);
            }
            ServerMessage::StateUpdate {
                id,
                position,
                rotation,
            } => self.remotes.on_transform(&id, position, rotation),
            ServerMessage::Attack { attacker } => {
                if !self.is_local(&attacker) {
                    self.remotes.on_attack(&attacker);
                }
            }
            ServerMessage::HealthUpdate { id, health, alive } => {
                if self.is_local(&id) {
                    self.local.health = health;
                    self.local.alive = alive;
                    if !alive {
                        info!("You were defeated");
                    }
                    return;
                }
                let was_alive = self.remotes.get(&id).map_or(false, |view| view.alive);
                self.remotes.on_health(&id, health, alive);
                if was_alive && !alive {
                    if let Some(view) = self.remotes.get(&id) {
                        info!("{} was defeated", view.name);
                    }
                }
            }
            ServerMessage::PlayerRespawned { player } => {
                if !self.is_local(&player.id) {
                    self.remotes.on_respawn(&player);
                }
            }
            ServerMessage::Respawned { position, health } => {
                self.local.transform.position = position;
                self.local.health = health;
                self.local.alive = true;
                info!("Respawned at {:?}", position);
            }
            signal => {
                if let Ok((kind, from, body)) = signal.into_signal() {
                    if let Err(e) = self.mesh.handle_signal(kind, from.clone(), body) {
                        warn!("Voice {:?} from {} failed: {}", kind, from, e);
                    }
                }
            }
        }
    }

    /// Moves the local avatar and reports the new transform once joined
    pub fn move_local(&mut self, position: Vec3, rotation: Vec3) {
        self.local.transform = Transform::new(position, rotation);
        if self.joined && self.local.alive {
            self.outbox
                .push(ClientMessage::StateUpdate { position, rotation });
        }
    }

    /// Queues an attack; returns false while dead or not yet joined
    pub fn attack(&mut self) -> bool {
        if !self.joined || !self.local.alive {
            return false;
        }
        self.outbox.push(ClientMessage::Attack {});
        true
    }

    /// Queues a respawn request; only meaningful while dead
    pub fn request_respawn(&mut self) -> bool {
        if !self.joined || self.local.alive {
            return false;
        }
        self.outbox.push(ClientMessage::Respawn {});
        true
    }

    pub fn enable_voice(&mut self) -> Result<(), VoiceError> {
        self.mesh.enable_voice()
    }

    /// Leaves the room: tears down voice and forgets every remote participant
    pub fn leave(&mut self) -> Vec<(PlayerId, VoiceError)> {
        let interrupted = self.mesh.leave();
        for (peer, e) in &interrupted {
            warn!("Voice handshake with {} interrupted: {}", peer, e);
        }
        self.remotes.clear();
        self.inbox.clear();
        self.outbox.clear();
        self.joined = false;
        interrupted
    }

    pub fn local_id(&self) -> Option<&PlayerId> {
        self.local_id.as_ref()
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn local(&self) -> &LocalAvatar {
        &self.local
    }

    pub fn remotes(&self) -> &ReconciliationEngine {
        &self.remotes
    }

    pub fn mesh(&self) -> &PeerMesh<E> {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut PeerMesh<E> {
        &mut self.mesh
    }
}
