//! WebSocket session with the room server
//!
//! The socket is split into a reader task that decodes frames into
//! `ServerMessage`s and a writer task that encodes queued `ClientMessage`s.
//! Handshake steps (`welcome`, `room-state`) are awaited inline. Every
//! message seen meanwhile, the handshake replies included, is kept in a
//! backlog and handed out by `recv` in arrival order.

use crate::error::ClientError;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, PlayerId, PublicPlayer, ServerMessage, Vec3};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub struct Session {
    id: PlayerId,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    backlog: VecDeque<ServerMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Session {
    /// Opens the channel and waits for the server-issued id
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _) = connect_async(url).await?;
        info!("Connected to {}", url);

        let (mut sink, mut stream) = socket.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (incoming_tx, mut incoming) = mpsc::unbounded_channel::<ServerMessage>();

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let text = match message.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode outgoing message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!("Send failed: {}", e);
                    return;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ServerMessage::decode(&text) {
                        Ok(Some(message)) => {
                            if incoming_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Dropping server message: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Connection error: {}", e);
                        break;
                    }
                }
            }
            debug!("Reader finished");
        });

        let mut backlog = VecDeque::new();
        let id = loop {
            match incoming.recv().await {
                Some(ServerMessage::Welcome { id }) => {
                    backlog.push_back(ServerMessage::Welcome { id: id.clone() });
                    break id;
                }
                Some(other) => backlog.push_back(other),
                None => return Err(ClientError::ClosedBeforeCompletion("welcome")),
            }
        };
        info!("Assigned id {}", id);

        Ok(Self {
            id,
            outgoing,
            incoming,
            backlog,
            reader,
            writer,
        })
    }

    /// Sends `join` and waits for the room snapshot
    pub async fn join(
        &mut self,
        name: &str,
        position: Vec3,
        rotation: Vec3,
    ) -> Result<Vec<PublicPlayer>, ClientError> {
        self.send(ClientMessage::Join {
            name: name.to_string(),
            position,
            rotation,
        })
        .map_err(|_| ClientError::ClosedBeforeCompletion("join"))?;

        loop {
            match self.incoming.recv().await {
                Some(ServerMessage::RoomState { players }) => {
                    self.backlog.push_back(ServerMessage::RoomState {
                        players: players.clone(),
                    });
                    return Ok(players);
                }
                Some(other) => self.backlog.push_back(other),
                None => return Err(ClientError::ClosedBeforeCompletion("join")),
            }
        }
    }

    pub fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.outgoing
            .send(message)
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Next server message, or `None` once the server has closed the channel
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        if let Some(message) = self.backlog.pop_front() {
            return Some(message);
        }
        self.incoming.recv().await
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    /// Flushes pending sends, closes the socket and stops both tasks
    pub async fn close(self) {
        drop(self.outgoing);
        if let Err(e) = self.writer.await {
            debug!("Writer task ended abnormally: {}", e);
        }
        self.reader.abort();
    }
}
