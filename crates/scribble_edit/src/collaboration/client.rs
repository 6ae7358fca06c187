//! WebSocket client for scribble collaboration servers.

use futures_util::{SinkExt, StreamExt};
use scribble_engine::{Filter, Image, Mask};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::protocol::*;
use crate::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Join rejected: {0:?}")]
    Rejected(RejectReason),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Disconnected from server")]
    Disconnected,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URL; `ws://` is assumed when no scheme is given
    pub url: String,
    pub display_name: String,
    pub room_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            display_name: "Anonymous".to_string(),
            room_name: "default".to_string(),
        }
    }
}

/// Room state reported by the server when the handshake succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRoom {
    pub room_name: String,
    pub participant_id: ParticipantId,
    pub head_node_id: NodeId,
    pub head_image: Image,
    pub participants: Vec<String>,
}

/// Commands that can be sent to the client task.
#[derive(Debug)]
pub enum ClientCommand {
    Send(ClientMessage),
    Disconnect,
}

/// Events received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum CollaborationEvent {
    Message(ServerMessage),
    Disconnected,
    Error(ClientError),
}

/// Handle for sending requests to the joined room.
#[derive(Clone)]
pub struct ClientHandle {
    command_tx: mpsc::Sender<ClientCommand>,
    joined: JoinedRoom,
}

impl ClientHandle {
    /// Room state at the time of joining.
    pub fn joined(&self) -> &JoinedRoom {
        &self.joined
    }

    pub fn participant_id(&self) -> ParticipantId {
        self.joined.participant_id
    }

    async fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.command_tx
            .send(ClientCommand::Send(message))
            .await
            .map_err(|e| ClientError::SendFailed(e.to_string()))
    }

    pub async fn submit(&self, parent_id: NodeId, filter: Filter, mask: Option<Mask>, message: Option<String>) -> Result<(), ClientError> {
        self.send(ClientMessage::SubmitOp {
            parent_id,
            filter,
            mask,
            message,
        })
        .await
    }

    pub async fn undo(&self) -> Result<(), ClientError> {
        self.send(ClientMessage::Undo).await
    }

    pub async fn redo(&self, node_id: Option<NodeId>) -> Result<(), ClientError> {
        self.send(ClientMessage::Redo { node_id }).await
    }

    pub async fn history(&self, from_node_id: Option<NodeId>) -> Result<(), ClientError> {
        self.send(ClientMessage::History { from_node_id }).await
    }

    pub async fn fetch(&self, node_id: NodeId) -> Result<(), ClientError> {
        self.send(ClientMessage::Fetch { node_id }).await
    }

    pub async fn select(&self, node_id: Option<NodeId>, seed_x: u32, seed_y: u32, threshold: u8) -> Result<(), ClientError> {
        self.send(ClientMessage::Select {
            node_id,
            seed_x,
            seed_y,
            threshold,
        })
        .await
    }

    /// Leave the room; the server closes the connection afterwards.
    pub async fn leave(&self) -> Result<(), ClientError> {
        self.send(ClientMessage::Leave).await
    }

    /// Close the connection without leaving first.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.command_tx
            .send(ClientCommand::Disconnect)
            .await
            .map_err(|e| ClientError::SendFailed(e.to_string()))
    }
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else {
        format!("ws://{url}")
    }
}

/// Connect and perform the handshake.
///
/// Returns once the server answered the handshake: with a handle and the event
/// stream on `Joined`, with `ClientError::Rejected` otherwise.
pub async fn connect(config: ClientConfig) -> Result<(ClientHandle, mpsc::Receiver<CollaborationEvent>), ClientError> {
    let url = normalize_url(&config.url);
    log::info!("Connecting to collaboration server: {url}");

    let (ws_stream, _) = connect_async(&url).await.map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
    let (mut write, mut read) = ws_stream.split();

    let handshake = ClientMessage::Handshake {
        protocol_version: PROTOCOL_VERSION,
        display_name: config.display_name.clone(),
        room_name: config.room_name.clone(),
    };
    let json = serde_json::to_string(&handshake).map_err(|e| ClientError::ProtocolError(e.to_string()))?;
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| ClientError::WebSocketError(e.to_string()))?;

    let joined = loop {
        let text = match read.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => return Err(ClientError::Disconnected),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ClientError::WebSocketError(e.to_string())),
        };
        let text_str: &str = text.as_ref();
        match serde_json::from_str::<ServerMessage>(text_str).map_err(|e| ClientError::ProtocolError(e.to_string()))? {
            ServerMessage::Joined {
                room_name,
                participant_id,
                head_node_id,
                head_image,
                participants,
            } => {
                break JoinedRoom {
                    room_name,
                    participant_id,
                    head_node_id,
                    head_image,
                    participants,
                };
            }
            ServerMessage::Rejected { reason } => return Err(ClientError::Rejected(reason)),
            other => return Err(ClientError::ProtocolError(format!("unexpected reply to handshake: {other:?}"))),
        }
    };
    log::info!("Joined room {} as participant {}", joined.room_name, joined.participant_id);

    let (command_tx, mut command_rx) = mpsc::channel(256);
    let (event_tx, event_rx) = mpsc::channel(256);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let text_str: &str = text.as_ref();
                            let event = match serde_json::from_str::<ServerMessage>(text_str) {
                                Ok(message) => CollaborationEvent::Message(message),
                                Err(e) => CollaborationEvent::Error(ClientError::ProtocolError(e.to_string())),
                            };
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = event_tx.send(CollaborationEvent::Disconnected).await;
                            break;
                        }
                        Some(Err(e)) => {
                            let _ = event_tx.send(CollaborationEvent::Error(ClientError::WebSocketError(e.to_string()))).await;
                            break;
                        }
                        _ => {}
                    }
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(ClientCommand::Send(message)) => {
                            let json = match serde_json::to_string(&message) {
                                Ok(json) => json,
                                Err(e) => {
                                    log::error!("Failed to encode message: {e}");
                                    continue;
                                }
                            };
                            if let Err(e) = write.send(Message::Text(json.into())).await {
                                log::error!("Failed to send message: {e}");
                            }
                        }
                        Some(ClientCommand::Disconnect) | None => {
                            let _ = write.close().await;
                            let _ = event_tx.send(CollaborationEvent::Disconnected).await;
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok((ClientHandle { command_tx, joined }, event_rx))
}
