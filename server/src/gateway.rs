//! Connection gateway: WebSocket accept loop, frame decoding and dispatch
//!
//! Each accepted socket gets its own pair of tasks: a reader that decodes
//! inbound frames and dispatches them against the shared `Room`, and a writer
//! that drains the participant's outbound channel onto the socket. The room
//! itself never touches a socket, so a slow or dead peer can't stall a
//! broadcast.

use crate::error::ServerError;
use crate::room::Room;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use shared::{ClientMessage, PlayerId, ServerMessage};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};

/// Process-wide server context handed to every connection handler
#[derive(Clone, Default)]
pub struct AppState {
    pub room: Arc<Mutex<Room>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            room: Arc::new(Mutex::new(Room::new())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// Builds the HTTP surface: `/ws` for the game channel, `/health` for liveness
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serves the router on an already bound listener until the listener fails
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs one participant's connection from accept to close
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let id = {
        let mut room = state.room.lock().await;
        let id = room.add_participant(tx);
        room.send_to(&id, ServerMessage::Welcome { id: id.clone() });
        id
    };
    info!("Connection opened for {}", id);

    let writer_id = id.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode {} for {}: {}", message.kind(), writer_id, e);
                    continue;
                }
            };

            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!("Writer for {} stopped: {}", writer_id, e);
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_frame(&state, &id, &text).await,
            Ok(Message::Binary(_)) => warn!("Dropping binary frame from {}", id),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Connection error for {}: {}", id, e);
                break;
            }
        }
    }

    state.room.lock().await.remove_player(&id);
    writer.abort();
    info!("Connection closed for {}", id);
}

async fn handle_frame(state: &AppState, id: &PlayerId, text: &str) {
    let message = match ClientMessage::decode(text) {
        Ok(Some(message)) => message,
        Ok(None) => return,
        Err(e) => {
            warn!("Dropping message from {}: {}", id, e);
            return;
        }
    };

    let mut room = state.room.lock().await;
    dispatch(&mut room, id, message, now_ms());
}

/// Wall-clock milliseconds, the time base for attack cooldowns
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Routes one decoded client message to the registry, combat or relay
pub fn dispatch(room: &mut Room, id: &PlayerId, message: ClientMessage, now_ms: u64) {
    match message {
        ClientMessage::Join {
            name,
            position,
            rotation,
        } => room.handle_join(id, &name, position, rotation),
        ClientMessage::StateUpdate { position, rotation } => {
            room.handle_state_update(id, position, rotation)
        }
        ClientMessage::Attack {} => {
            room.handle_attack(id, now_ms);
        }
        ClientMessage::Respawn {} => {
            room.handle_respawn(id, &mut rand::thread_rng());
        }
        signal => {
            if let Ok((kind, to, body)) = signal.into_signal() {
                room.relay(kind, id, &to, body);
            }
        }
    }
}
