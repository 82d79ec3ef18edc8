//! # Room Client Library
//!
//! Client-side half of the shared-space protocol. The server is authoritative
//! for every participant; the client's job is to turn its sparse updates into
//! continuous presentation and to keep a direct voice link to every peer.
//!
//! ## Architecture Overview
//!
//! ### Reconciliation
//! Remote participants are never drawn at the last received position. Each
//! one converges toward its latest authoritative transform with exponential
//! smoothing, so motion looks continuous at any render rate regardless of how
//! often updates arrive. Attack and hit reactions are short timed pulses
//! layered on top.
//!
//! ### Peer Mesh
//! Voice is peer to peer. For every pair of participants exactly one side
//! sends the offer, chosen by comparing ids, so two peers never call each
//! other at the same time. Handshake messages travel through the server's
//! relay untouched.
//!
//! ### Staged Updates
//! Network input never mutates presentation state directly. Messages are
//! staged and applied at the start of the next frame, then reconciliation and
//! spatial audio advance together.
//!
//! ## Module Organization
//!
//! - `error`: connection and voice error types
//! - `mesh`: per-peer voice negotiation and spatial placement
//! - `network`: WebSocket session and the welcome/join handshake
//! - `reconciliation`: smoothing, walk cycle, attack/hit pulses
//! - `world`: the staged update loop tying the rest together
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::network::Session;
//! use client::world::ClientWorld;
//! # use client::mesh::{OutputMode, VoiceEngine};
//! # use client::VoiceError;
//! # use shared::{PlayerId, Vec3};
//! # struct Silent;
//! # impl VoiceEngine for Silent {
//! #     type Link = ();
//! #     fn start_capture(&mut self) -> Result<(), VoiceError> { Ok(()) }
//! #     fn open_link(&mut self, _: &PlayerId) -> Result<(), VoiceError> { Ok(()) }
//! #     fn create_offer(&mut self, _: &mut ()) -> Result<serde_json::Value, VoiceError> { Ok(serde_json::Value::Null) }
//! #     fn accept_offer(&mut self, _: &mut (), _: serde_json::Value) -> Result<serde_json::Value, VoiceError> { Ok(serde_json::Value::Null) }
//! #     fn accept_answer(&mut self, _: &mut (), _: serde_json::Value) -> Result<(), VoiceError> { Ok(()) }
//! #     fn add_ice_candidate(&mut self, _: &mut (), _: serde_json::Value) -> Result<(), VoiceError> { Ok(()) }
//! #     fn place_source(&mut self, _: &mut (), _: Vec3) {}
//! #     fn set_output_mode(&mut self, _: &mut (), _: OutputMode) {}
//! #     fn close_link(&mut self, _: ()) {}
//! # }
//! # async fn run() -> Result<(), client::ClientError> {
//! let mut session = Session::connect("ws://127.0.0.1:8080/ws").await?;
//! let mut world = ClientWorld::new(Silent);
//! session.join("Alice", Vec3::new(0.0, 1.6, 5.0), Vec3::ZERO).await?;
//!
//! while let Some(message) = session.recv().await {
//!     world.stage(message);
//!     for outgoing in world.update(1.0 / 60.0) {
//!         session.send(outgoing)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mesh;
pub mod network;
pub mod reconciliation;
pub mod world;

pub use error::{ClientError, VoiceError};
