//! Peer mesh coordinator: one direct voice connection per remote participant.
//!
//! The coordinator is a state machine. It never touches audio or network
//! hardware directly; a [`VoiceEngine`] owns the media side, and everything
//! the coordinator wants to tell the server lands in an outbox that the
//! client world drains once per update.
//!
//! Exactly one side of every pair initiates the offer, decided by
//! [`initiates_offer`]. Signaling that arrives before the local microphone
//! is ready waits in an arrival-ordered queue.

use crate::error::VoiceError;
use log::{debug, info, warn};
use serde_json::Value;
use shared::{ClientMessage, PlayerId, SignalKind, Vec3};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Height above the avatar origin where a peer's voice is placed
pub const HEAD_OFFSET: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Unconnected,
    Offering,
    Answering,
    Connected,
}

/// Transport-level state reported by the media layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Spatial,
    Plain,
}

/// Media backend driven by the mesh.
///
/// `Link` is whatever handle the backend uses for one peer connection and its
/// audio graph. The mesh owns links and hands them back through
/// [`VoiceEngine::close_link`] when a connection is torn down.
pub trait VoiceEngine {
    type Link;

    /// Acquires the local microphone
    fn start_capture(&mut self) -> Result<(), VoiceError>;

    fn open_link(&mut self, peer: &PlayerId) -> Result<Self::Link, VoiceError>;

    /// Produces the local session description for an outgoing call
    fn create_offer(&mut self, link: &mut Self::Link) -> Result<Value, VoiceError>;

    /// Applies a remote offer and returns the local answer
    fn accept_offer(&mut self, link: &mut Self::Link, offer: Value) -> Result<Value, VoiceError>;

    fn accept_answer(&mut self, link: &mut Self::Link, answer: Value) -> Result<(), VoiceError>;

    fn add_ice_candidate(&mut self, link: &mut Self::Link, candidate: Value)
        -> Result<(), VoiceError>;

    fn place_source(&mut self, link: &mut Self::Link, position: Vec3);

    fn set_output_mode(&mut self, link: &mut Self::Link, mode: OutputMode);

    fn close_link(&mut self, link: Self::Link);
}

/// Returns true when `local` is the side that sends the offer to `remote`
pub fn initiates_offer(local: &PlayerId, remote: &PlayerId) -> bool {
    local < remote
}

#[derive(Debug)]
pub struct VoiceConnection<L> {
    pub state: NegotiationState,
    pub link: L,
    /// Set while our offer is waiting for an answer
    pub offer_pending: bool,
    pub output: OutputMode,
    pub last_position: Option<Vec3>,
}

impl<L> VoiceConnection<L> {
    fn new(link: L, output: OutputMode) -> Self {
        Self {
            state: NegotiationState::Unconnected,
            link,
            offer_pending: false,
            output,
            last_position: None,
        }
    }

    /// True until the transport reports the connection as established
    pub fn is_negotiating(&self) -> bool {
        self.state != NegotiationState::Connected
    }
}

pub struct PeerMesh<E: VoiceEngine> {
    engine: E,
    local_id: Option<PlayerId>,
    voice_ready: bool,
    known_peers: BTreeSet<PlayerId>,
    connections: BTreeMap<PlayerId, VoiceConnection<E::Link>>,
    pending_signals: VecDeque<(SignalKind, PlayerId, Value)>,
    spatial: bool,
    outbox: Vec<ClientMessage>,
}

impl<E: VoiceEngine> PeerMesh<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            local_id: None,
            voice_ready: false,
            known_peers: BTreeSet::new(),
            connections: BTreeMap::new(),
            pending_signals: VecDeque::new(),
            spatial: true,
            outbox: Vec::new(),
        }
    }

    pub fn set_local_id(&mut self, id: PlayerId) {
        self.known_peers.remove(&id);
        self.local_id = Some(id);
    }

    /// Turns on the microphone, then replays queued signaling in arrival order
    /// and calls every known peer this side is responsible for.
    ///
    /// A capture failure leaves the mesh without voice; signaling keeps
    /// queueing so a later retry can still pick it up.
    pub fn enable_voice(&mut self) -> Result<(), VoiceError> {
        if self.voice_ready {
            return Ok(());
        }

        self.engine.start_capture()?;
        self.voice_ready = true;
        info!("Voice capture ready");

        while let Some((kind, from, body)) = self.pending_signals.pop_front() {
            if let Err(e) = self.process_signal(kind, &from, body) {
                warn!("Queued {:?} from {} failed: {}", kind, from, e);
            }
        }

        let peers: Vec<PlayerId> = self.known_peers.iter().cloned().collect();
        for peer in peers {
            self.acquire(&peer);
        }
        Ok(())
    }

    pub fn peer_joined(&mut self, peer: PlayerId) {
        if self.local_id.as_ref() == Some(&peer) {
            return;
        }
        self.known_peers.insert(peer.clone());
        if self.voice_ready {
            self.acquire(&peer);
        }
    }

    /// Forgets a peer, discarding its queued signaling and tearing down its
    /// connection. Returns whether a connection existed.
    pub fn peer_left(&mut self, peer: &PlayerId) -> bool {
        self.known_peers.remove(peer);
        self.pending_signals.retain(|(_, from, _)| from != peer);
        self.teardown(peer)
    }

    /// Entry point for relayed handshake messages
    pub fn handle_signal(
        &mut self,
        kind: SignalKind,
        from: PlayerId,
        body: Value,
    ) -> Result<(), VoiceError> {
        if !self.voice_ready {
            debug!("Queueing {:?} from {} until voice is ready", kind, from);
            self.pending_signals.push_back((kind, from, body));
            return Ok(());
        }
        self.process_signal(kind, &from, body)
    }

    fn process_signal(
        &mut self,
        kind: SignalKind,
        from: &PlayerId,
        body: Value,
    ) -> Result<(), VoiceError> {
        let result = match kind {
            SignalKind::Offer => self.on_offer(from, body),
            SignalKind::Answer => self.on_answer(from, body),
            SignalKind::Ice => self.on_ice(from, body),
        };

        // A broken negotiation leaves nothing behind; reacquire starts over.
        if let Err(VoiceError::Negotiation(_)) = &result {
            self.teardown(from);
        }
        result
    }

    fn on_offer(&mut self, from: &PlayerId, offer: Value) -> Result<(), VoiceError> {
        if let Some(existing) = self.connections.get(from) {
            let we_initiate = self
                .local_id
                .as_ref()
                .map_or(false, |local| initiates_offer(local, from));
            if existing.offer_pending && we_initiate {
                debug!("Ignoring crossing offer from {}; ours takes precedence", from);
                return Ok(());
            }
            self.teardown(from);
        }

        self.known_peers.insert(from.clone());
        let mut link = self.engine.open_link(from)?;
        let answer = match self.engine.accept_offer(&mut link, offer) {
            Ok(answer) => answer,
            Err(e) => {
                self.engine.close_link(link);
                return Err(e);
            }
        };

        let mut connection = VoiceConnection::new(link, self.output_mode());
        connection.state = NegotiationState::Answering;
        self.connections.insert(from.clone(), connection);
        self.outbox
            .push(SignalKind::Answer.request(from.clone(), answer));
        Ok(())
    }

    fn on_answer(&mut self, from: &PlayerId, answer: Value) -> Result<(), VoiceError> {
        let connection = self
            .connections
            .get_mut(from)
            .ok_or_else(|| VoiceError::UnknownPeer(from.clone()))?;

        if !connection.offer_pending {
            return Err(VoiceError::Negotiation(format!(
                "unexpected answer from {}",
                from
            )));
        }

        self.engine.accept_answer(&mut connection.link, answer)?;
        connection.offer_pending = false;
        Ok(())
    }

    fn on_ice(&mut self, from: &PlayerId, candidate: Value) -> Result<(), VoiceError> {
        let connection = self
            .connections
            .get_mut(from)
            .ok_or_else(|| VoiceError::UnknownPeer(from.clone()))?;
        self.engine.add_ice_candidate(&mut connection.link, candidate)
    }

    /// Calls `peer` if this side owns the offer and no connection exists.
    /// Returns whether an offer was queued.
    fn acquire(&mut self, peer: &PlayerId) -> bool {
        let Some(local) = self.local_id.as_ref() else {
            return false;
        };
        if !self.voice_ready || self.connections.contains_key(peer) || !initiates_offer(local, peer)
        {
            return false;
        }

        let mut link = match self.engine.open_link(peer) {
            Ok(link) => link,
            Err(e) => {
                warn!("Could not open voice link to {}: {}", peer, e);
                return false;
            }
        };
        let offer = match self.engine.create_offer(&mut link) {
            Ok(offer) => offer,
            Err(e) => {
                warn!("Could not create offer for {}: {}", peer, e);
                self.engine.close_link(link);
                return false;
            }
        };

        let mut connection = VoiceConnection::new(link, self.output_mode());
        connection.state = NegotiationState::Offering;
        connection.offer_pending = true;
        self.connections.insert(peer.clone(), connection);
        self.outbox.push(SignalKind::Offer.request(peer.clone(), offer));
        debug!("Offering voice to {}", peer);
        true
    }

    /// Re-establishes a connection previously torn down by failure
    pub fn reacquire(&mut self, peer: &PlayerId) -> bool {
        if !self.known_peers.contains(peer) {
            return false;
        }
        self.acquire(peer)
    }

    /// Applies a transport state change reported by the media layer
    pub fn on_transport_state(&mut self, peer: &PlayerId, state: TransportState) {
        match state {
            TransportState::Connected => {
                let spatial = self.spatial;
                if let Some(connection) = self.connections.get_mut(peer) {
                    connection.state = NegotiationState::Connected;
                    connection.offer_pending = false;
                    if spatial {
                        if let Some(position) = connection.last_position {
                            self.engine.place_source(&mut connection.link, position);
                        }
                    }
                    info!("Voice connected with {}", peer);
                }
            }
            TransportState::Failed | TransportState::Closed => {
                if self.teardown(peer) {
                    info!("Voice link to {} ended ({:?})", peer, state);
                }
            }
        }
    }

    /// Forwards a locally gathered ICE candidate to `peer`
    pub fn local_candidate(&mut self, peer: &PlayerId, candidate: Value) -> bool {
        if !self.connections.contains_key(peer) {
            return false;
        }
        self.outbox.push(SignalKind::Ice.request(peer.clone(), candidate));
        true
    }

    /// Moves every voice source to its peer's current avatar position
    pub fn refresh_positions<'a, I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = (&'a PlayerId, Vec3)>,
    {
        for (id, position) in positions {
            let Some(connection) = self.connections.get_mut(id) else {
                continue;
            };
            let head = position + Vec3::new(0.0, HEAD_OFFSET, 0.0);
            connection.last_position = Some(head);
            if self.spatial {
                self.engine.place_source(&mut connection.link, head);
            }
        }
    }

    /// Switches every connection between positional and plain output
    pub fn set_spatial_enabled(&mut self, enabled: bool) {
        self.spatial = enabled;
        let mode = self.output_mode();
        for connection in self.connections.values_mut() {
            connection.output = mode;
            self.engine.set_output_mode(&mut connection.link, mode);
            if enabled {
                if let Some(position) = connection.last_position {
                    self.engine.place_source(&mut connection.link, position);
                }
            }
        }
    }

    /// Closes every connection and drops all queued signaling.
    ///
    /// Peers whose handshake had not completed are returned with
    /// [`VoiceError::ClosedBeforeCompletion`].
    pub fn leave(&mut self) -> Vec<(PlayerId, VoiceError)> {
        let mut interrupted = Vec::new();
        for (peer, connection) in std::mem::take(&mut self.connections) {
            if connection.is_negotiating() {
                interrupted.push((peer, VoiceError::ClosedBeforeCompletion));
            }
            self.engine.close_link(connection.link);
        }
        self.known_peers.clear();
        self.pending_signals.clear();
        self.outbox.clear();
        interrupted
    }

    pub fn drain_outbox(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outbox)
    }

    fn teardown(&mut self, peer: &PlayerId) -> bool {
        match self.connections.remove(peer) {
            Some(connection) => {
                self.engine.close_link(connection.link);
                true
            }
            None => false,
        }
    }

    fn output_mode(&self) -> OutputMode {
        if self.spatial {
            OutputMode::Spatial
        } else {
            OutputMode::Plain
        }
    }

    pub fn state(&self, peer: &PlayerId) -> NegotiationState {
        self.connections
            .get(peer)
            .map_or(NegotiationState::Unconnected, |c| c.state)
    }

    pub fn connection(&self, peer: &PlayerId) -> Option<&VoiceConnection<E::Link>> {
        self.connections.get(peer)
    }

    pub fn known_peers(&self) -> impl Iterator<Item = &PlayerId> + '_ {
        self.known_peers.iter()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn pending_signal_count(&self) -> usize {
        self.pending_signals.len()
    }

    pub fn is_voice_ready(&self) -> bool {
        self.voice_ready
    }

    pub fn is_spatial(&self) -> bool {
        self.spatial
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;

    fn outbox_kinds(mesh: &mut PeerMesh<RecordingEngine>) -> Vec<(SignalKind, PlayerId)> {
        mesh.drain_outbox()
            .into_iter()
            .filter_map(|msg| msg.into_signal().ok())
            .map(|(kind, to, _)| (kind, to))
            .collect()
    }

    #[test]
    fn test_tie_break_is_exclusive_and_stable() {
        let pairs = [("a", "b"), ("7f3a", "7f3b"), ("Z", "a"), ("abc", "abcd")];
        for (x, y) in pairs {
            let (x, y) = (id(x), id(y));
            assert_ne!(initiates_offer(&x, &y), initiates_offer(&y, &x));
            assert_eq!(initiates_offer(&x, &y), initiates_offer(&x, &y));
        }
        assert!(initiates_offer(&id("a"), &id("b")));
    }

    #[test]
    fn test_smaller_id_offers_on_join() {
        let mut mesh = ready_mesh("b");
        mesh.peer_joined(id("c"));
        mesh.peer_joined(id("a"));

        assert_eq!(outbox_kinds(&mut mesh), vec![(SignalKind::Offer, id("c"))]);
        assert_eq!(mesh.state(&id("c")), NegotiationState::Offering);
        assert!(mesh.connection(&id("c")).unwrap().offer_pending);
        assert_eq!(mesh.state(&id("a")), NegotiationState::Unconnected);
    }

    #[test]
    fn test_own_id_is_never_a_peer() {
        let mut mesh = ready_mesh("a");
        mesh.peer_joined(id("a"));
        assert!(mesh.drain_outbox().is_empty());
        assert_eq!(mesh.connection_count(), 0);
    }

    #[test]
    fn test_full_offer_answer_flow() {
        let mut mesh = ready_mesh("a");
        mesh.peer_joined(id("b"));
        outbox_kinds(&mut mesh);

        mesh.handle_signal(SignalKind::Answer, id("b"), json!({"sdp": "ans"}))
            .unwrap();
        assert!(!mesh.connection(&id("b")).unwrap().offer_pending);
        assert_eq!(mesh.state(&id("b")), NegotiationState::Offering);

        mesh.handle_signal(SignalKind::Ice, id("b"), json!({"candidate": "c1"}))
            .unwrap();
        mesh.on_transport_state(&id("b"), TransportState::Connected);
        assert_eq!(mesh.state(&id("b")), NegotiationState::Connected);

        assert!(mesh
            .engine()
            .calls
            .contains(&Call::AcceptAnswer(id("b"), json!({"sdp": "ans"}))));
        assert!(mesh
            .engine()
            .calls
            .contains(&Call::Ice(id("b"), json!({"candidate": "c1"}))));
    }

    #[test]
    fn test_answering_side() {
        let mut mesh = ready_mesh("b");
        mesh.handle_signal(SignalKind::Offer, id("a"), json!({"sdp": "o"}))
            .unwrap();

        assert_eq!(mesh.state(&id("a")), NegotiationState::Answering);
        let sent = mesh.drain_outbox();
        assert_eq!(
            sent,
            vec![ClientMessage::RtcAnswer {
                to: id("a"),
                description: json!({"type": "answer", "sdp": "answer-to-a"})
            }]
        );
    }

    #[test]
    fn test_crossing_offer_is_ignored_by_initiator() {
        let mut mesh = ready_mesh("a");
        mesh.peer_joined(id("b"));
        outbox_kinds(&mut mesh);

        mesh.handle_signal(SignalKind::Offer, id("b"), json!({"sdp": "glare"}))
            .unwrap();

        assert!(mesh.drain_outbox().is_empty());
        assert_eq!(mesh.state(&id("b")), NegotiationState::Offering);
        assert!(!mesh
            .engine()
            .calls
            .iter()
            .any(|c| matches!(c, Call::AcceptOffer(..))));
    }

    #[test]
    fn test_no_second_offer_while_pending() {
        let mut mesh = ready_mesh("a");
        mesh.peer_joined(id("b"));
        mesh.peer_joined(id("b"));
        assert!(!mesh.reacquire(&id("b")));
        assert_eq!(outbox_kinds(&mut mesh).len(), 1);
    }

    #[test]
    fn test_signals_queue_until_voice_ready() {
        let mut mesh = PeerMesh::new(RecordingEngine::default());
        mesh.set_local_id(id("b"));

        mesh.handle_signal(SignalKind::Offer, id("a"), json!({"sdp": "o"}))
            .unwrap();
        mesh.handle_signal(SignalKind::Ice, id("a"), json!({"candidate": "c1"}))
            .unwrap();
        mesh.handle_signal(SignalKind::Ice, id("a"), json!({"candidate": "c2"}))
            .unwrap();
        assert_eq!(mesh.pending_signal_count(), 3);
        assert!(mesh.engine().calls.is_empty());

        mesh.enable_voice().unwrap();
        assert_eq!(mesh.pending_signal_count(), 0);
        assert_eq!(
            mesh.engine().calls,
            vec![
                Call::Open(id("a")),
                Call::AcceptOffer(id("a"), json!({"sdp": "o"})),
                Call::Ice(id("a"), json!({"candidate": "c1"})),
                Call::Ice(id("a"), json!({"candidate": "c2"})),
            ]
        );
    }

    #[test]
    fn test_permission_denied_is_recoverable() {
        let mut mesh = PeerMesh::new(RecordingEngine {
            deny_capture: true,
            ..Default::default()
        });
        mesh.set_local_id(id("a"));
        mesh.peer_joined(id("b"));
        mesh.handle_signal(SignalKind::Ice, id("c"), json!({})).unwrap();

        assert!(matches!(
            mesh.enable_voice(),
            Err(VoiceError::PermissionDenied(_))
        ));
        assert!(!mesh.is_voice_ready());
        assert_eq!(mesh.pending_signal_count(), 1);
        assert!(mesh.drain_outbox().is_empty());
    }

    #[test]
    fn test_enable_voice_calls_known_peers() {
        let mut mesh = PeerMesh::new(RecordingEngine::default());
        mesh.set_local_id(id("m"));
        mesh.peer_joined(id("z"));
        mesh.peer_joined(id("n"));
        mesh.peer_joined(id("a"));
        assert!(mesh.drain_outbox().is_empty());

        mesh.enable_voice().unwrap();
        assert_eq!(
            outbox_kinds(&mut mesh),
            vec![(SignalKind::Offer, id("n")), (SignalKind::Offer, id("z"))]
        );
    }

    #[test]
    fn test_peer_left_drops_queued_signals_and_connection() {
        let mut mesh = PeerMesh::new(RecordingEngine::default());
        mesh.set_local_id(id("b"));
        mesh.handle_signal(SignalKind::Offer, id("a"), json!({})).unwrap();
        mesh.handle_signal(SignalKind::Offer, id("c"), json!({})).unwrap();

        assert!(!mesh.peer_left(&id("a")));
        assert_eq!(mesh.pending_signal_count(), 1);

        mesh.enable_voice().unwrap();
        assert_eq!(mesh.state(&id("c")), NegotiationState::Answering);
        assert!(mesh.peer_left(&id("c")));
        assert_eq!(mesh.connection_count(), 0);
        assert_eq!(mesh.engine().closed(), vec![&id("c")]);
    }

    #[test]
    fn test_failure_tears_down_and_reacquire_restarts() {
        let mut mesh = ready_mesh("a");
        mesh.peer_joined(id("b"));
        mesh.on_transport_state(&id("b"), TransportState::Connected);
        outbox_kinds(&mut mesh);

        mesh.on_transport_state(&id("b"), TransportState::Failed);
        assert_eq!(mesh.connection_count(), 0);
        assert_eq!(mesh.state(&id("b")), NegotiationState::Unconnected);

        assert!(mesh.reacquire(&id("b")));
        assert_eq!(mesh.state(&id("b")), NegotiationState::Offering);
        assert_eq!(outbox_kinds(&mut mesh), vec![(SignalKind::Offer, id("b"))]);
    }

    #[test]
    fn test_reacquire_unknown_peer_is_noop() {
        let mut mesh = ready_mesh("a");
        assert!(!mesh.reacquire(&id("ghost")));
    }

    #[test]
    fn test_failed_negotiation_removes_connection() {
        let mut mesh = PeerMesh::new(RecordingEngine {
            reject_offers: true,
            ..Default::default()
        });
        mesh.set_local_id(id("b"));
        mesh.enable_voice().unwrap();

        let result = mesh.handle_signal(SignalKind::Offer, id("a"), json!({}));
        assert!(matches!(result, Err(VoiceError::Negotiation(_))));
        assert_eq!(mesh.connection_count(), 0);
        assert!(mesh.drain_outbox().is_empty());
    }

    #[test]
    fn test_answer_without_offer_is_rejected() {
        let mut mesh = ready_mesh("b");
        assert_eq!(
            mesh.handle_signal(SignalKind::Answer, id("a"), json!({})),
            Err(VoiceError::UnknownPeer(id("a")))
        );
        assert!(matches!(
            mesh.handle_signal(SignalKind::Ice, id("a"), json!({})),
            Err(VoiceError::UnknownPeer(_))
        ));
    }

    #[test]
    fn test_local_candidate_forwarding() {
        let mut mesh = ready_mesh("a");
        assert!(!mesh.local_candidate(&id("b"), json!({"candidate": "x"})));

        mesh.peer_joined(id("b"));
        mesh.drain_outbox();
        assert!(mesh.local_candidate(&id("b"), json!({"candidate": "x"})));
        assert_eq!(
            mesh.drain_outbox(),
            vec![ClientMessage::RtcIce {
                to: id("b"),
                candidate: json!({"candidate": "x"})
            }]
        );
    }

    #[test]
    fn test_refresh_positions_adds_head_offset() {
        let mut mesh = ready_mesh("a");
        mesh.peer_joined(id("b"));
        let b = id("b");
        let ghost = id("ghost");

        mesh.refresh_positions(vec![(&b, Vec3::new(1.0, 0.0, 2.0)), (&ghost, Vec3::ZERO)]);

        let expected = Vec3::new(1.0, HEAD_OFFSET, 2.0);
        assert_eq!(mesh.connection(&b).unwrap().last_position, Some(expected));
        assert_eq!(mesh.engine().calls.last(), Some(&Call::Place(b, expected)));
    }

    #[test]
    fn test_spatial_toggle_applies_to_all_connections() {
        let mut mesh = ready_mesh("a");
        mesh.peer_joined(id("b"));
        mesh.peer_joined(id("c"));
        let b = id("b");
        mesh.refresh_positions(vec![(&b, Vec3::ZERO)]);

        mesh.set_spatial_enabled(false);
        assert!(!mesh.is_spatial());
        for peer in ["b", "c"] {
            assert_eq!(mesh.connection(&id(peer)).unwrap().output, OutputMode::Plain);
        }

        let placed_before = mesh.engine().calls.len();
        mesh.refresh_positions(vec![(&b, Vec3::new(3.0, 0.0, 0.0))]);
        assert_eq!(mesh.engine().calls.len(), placed_before);
        assert_eq!(
            mesh.connection(&b).unwrap().last_position,
            Some(Vec3::new(3.0, HEAD_OFFSET, 0.0))
        );

        mesh.set_spatial_enabled(true);
        assert!(mesh
            .engine()
            .calls
            .contains(&Call::Mode(id("c"), OutputMode::Spatial)));
        assert!(mesh
            .engine()
            .calls
            .ends_with(&[
                Call::Mode(b.clone(), OutputMode::Spatial),
                Call::Place(b, Vec3::new(3.0, HEAD_OFFSET, 0.0)),
                Call::Mode(id("c"), OutputMode::Spatial),
            ]));
        // Connection state is untouched by the toggle
        assert_eq!(mesh.state(&id("c")), NegotiationState::Offering);
    }

    #[test]
    fn test_leave_fails_pending_handshakes() {
        let mut mesh = ready_mesh("b");
        mesh.peer_joined(id("c"));
        mesh.peer_joined(id("d"));
        mesh.on_transport_state(&id("d"), TransportState::Connected);
        mesh.handle_signal(SignalKind::Offer, id("a"), json!({})).unwrap();

        let interrupted = mesh.leave();
        assert_eq!(
            interrupted,
            vec![
                (id("a"), VoiceError::ClosedBeforeCompletion),
                (id("c"), VoiceError::ClosedBeforeCompletion),
            ]
        );
        assert_eq!(mesh.connection_count(), 0);
        assert_eq!(mesh.engine().closed().len(), 3);
        assert!(mesh.drain_outbox().is_empty());
    }
}
