//! # Room Server Library
//!
//! This library provides the authoritative server for a small shared 3D space.
//! It tracks every connected participant, relays their movement and combat
//! actions to everyone else, and forwards peer-to-peer voice handshakes
//! between two named participants.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The server owns the one true copy of each participant's name, transform,
//! health and liveness. Clients only ever see the public projection of that
//! state, and only for participants who completed the join handshake.
//!
//! ### Event Relay
//! Transform updates are applied and relayed immediately in arrival order,
//! with no sequencing or buffering. The latest update from a sender wins.
//!
//! ### Combat Resolution
//! Attacks are validated against a 600ms cooldown, then resolved against every
//! other live participant using a range gate and a forward-facing cone test.
//!
//! ### Signaling Relay
//! Voice offers, answers and ICE candidates are forwarded verbatim to their
//! target. Unreachable targets are dropped silently.
//!
//! ## Architecture Design
//!
//! ### One Room, One Lock
//! All participant state lives in a single `Room` guarded by one mutex inside
//! `AppState`. Every mutation and every broadcast happens while holding that
//! lock, which keeps join snapshots, damage and respawns atomic with respect
//! to each other.
//!
//! ### Per-Connection Tasks
//! The gateway spawns a reader and a writer per WebSocket. Broadcasts only
//! push onto per-participant channels, so delivery to one peer never blocks
//! or cancels delivery to another.
//!
//! ## Module Organization
//!
//! - `room`: session registry, join/leave bookkeeping and broadcast
//! - `combat`: attack, damage and respawn handling
//! - `signaling`: voice handshake relay
//! - `gateway`: WebSocket accept, decode-then-dispatch, `/health`
//! - `error`: server startup errors
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::gateway::{bind, serve, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = bind("127.0.0.1:8080").await?;
//!     serve(listener, AppState::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod combat;
pub mod error;
pub mod gateway;
pub mod room;
pub mod signaling;

pub use error::ServerError;
pub use gateway::AppState;
pub use room::Room;
