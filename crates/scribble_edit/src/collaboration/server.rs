//! WebSocket server hosting collaboration rooms.
//!
//! Each connection gets one task reading client messages and one writer task
//! draining the connection's outbox into the socket. A connection first sends a
//! `Handshake`; on success it is bound to the named room, which is created on
//! first use and dropped again when its last participant leaves.
//!
//! Lock order is server room map first, then a room's own lock. Join and leave
//! both take the map lock, so a room cannot be torn down while someone joins it.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use scribble_engine::{Image, ImageError};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::tungstenite::Message;

use super::protocol::*;
use super::room::{Outbox, Room, RoomConfig, RoomError};

// ANSI color codes for server output
pub(crate) mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const CYAN: &str = "\x1b[1;36m";
    pub const GREEN: &str = "\x1b[1;32m";
    pub const YELLOW: &str = "\x1b[1;33m";
    pub const RED: &str = "\x1b[1;31m";
    pub const BLUE: &str = "\x1b[1;34m";
    pub const WHITE: &str = "\x1b[1;37m";
    pub const GRAY: &str = "\x1b[1;90m";
}

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    BindFailed { addr: SocketAddr, source: std::io::Error },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid initial canvas: {0}")]
    InvalidCanvas(#[from] ImageError),
}

/// Server configuration. Every field has a default, so a config file only needs
/// to name what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Size of the blank canvas new rooms start with
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Starting image for new rooms, overrides the blank canvas
    #[serde(skip)]
    pub initial_canvas: Option<Image>,
    /// Maximum participants per room (0 for unlimited)
    pub max_participants: usize,
    /// Capacity of each participant's outbound queue. A participant whose queue
    /// overflows is disconnected.
    pub outbound_queue_len: usize,
    /// Send submitted images as diffs against the previous head
    pub send_diffs: bool,

    pub ui_title: String,
    pub ui_bind_address: String,
    pub ui_canvas: String,
    pub ui_max_participants: String,
    pub ui_connect_with: String,
    pub ui_stop_hint: String,
    pub ui_unlimited: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            canvas_width: 640,
            canvas_height: 480,
            initial_canvas: None,
            max_participants: 0,
            outbound_queue_len: 256,
            send_diffs: false,
            ui_title: "scribble Collaboration Server".to_string(),
            ui_bind_address: "Bind Address".to_string(),
            ui_canvas: "Canvas".to_string(),
            ui_max_participants: "Max Participants".to_string(),
            ui_connect_with: "Connect with".to_string(),
            ui_stop_hint: "Press Ctrl+C to stop the server".to_string(),
            ui_unlimited: "unlimited".to_string(),
        }
    }
}

impl ServerConfig {
    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            max_participants: self.max_participants,
            send_diffs: self.send_diffs,
        }
    }
}

/// Shared server state: the live rooms by name.
#[derive(Debug)]
pub struct ServerState {
    config: ServerConfig,
    canvas: Image,
    rooms: Mutex<HashMap<String, Arc<Room>>>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, ServerError> {
        let canvas = match &config.initial_canvas {
            Some(image) => image.clone(),
            None => Image::blank(config.canvas_width, config.canvas_height)?,
        };
        Ok(Arc::new(Self {
            config,
            canvas,
            rooms: Mutex::new(HashMap::new()),
        }))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn room(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.lock().get(name).cloned()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Join `room_name`, creating the room if needed. A room created for a join
    /// that then fails is removed again.
    pub fn join_room(&self, room_name: &str, display_name: &str, outbox: Outbox, shed: Arc<Notify>) -> Result<(Arc<Room>, ParticipantId), RoomError> {
        let mut rooms = self.rooms.lock();
        let room = rooms
            .entry(room_name.to_string())
            .or_insert_with(|| {
                log::info!("creating room {room_name}");
                Arc::new(Room::new(room_name, self.canvas.clone(), self.config.room_config()))
            })
            .clone();
        match room.join(display_name, outbox, shed) {
            Ok(id) => Ok((room, id)),
            Err(err) => {
                if room.is_empty() {
                    rooms.remove(room_name);
                }
                Err(err)
            }
        }
    }

    /// Remove a participant and drop the room once nobody is left in it.
    pub fn leave_room(&self, room: &Arc<Room>, participant: ParticipantId) {
        let mut rooms = self.rooms.lock();
        room.leave(participant);
        if room.is_empty() && rooms.get(room.name()).is_some_and(|r| Arc::ptr_eq(r, room)) {
            rooms.remove(room.name());
            log::info!("room {} closed", room.name());
        }
    }

    /// Queue `ServerShutdown` for every participant in every room.
    pub fn announce_shutdown(&self) {
        let rooms: Vec<Arc<Room>> = self.rooms.lock().values().cloned().collect();
        for room in rooms {
            room.announce_shutdown();
        }
    }
}

/// Per-connection state passed to [`handle_message`].
pub struct Connection {
    pub addr: SocketAddr,
    outbox: Outbox,
    shed: Arc<Notify>,
    membership: Option<Membership>,
}

struct Membership {
    room: Arc<Room>,
    participant: ParticipantId,
    display_name: String,
}

impl Connection {
    pub fn new(addr: SocketAddr, outbox: Outbox) -> Self {
        Self {
            addr,
            outbox,
            shed: Arc::new(Notify::new()),
            membership: None,
        }
    }

    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.membership.as_ref().map(|m| m.participant)
    }

    pub fn room(&self) -> Option<&Arc<Room>> {
        self.membership.as_ref().map(|m| &m.room)
    }

    /// Notified when the room drops this connection as a slow consumer.
    pub fn shed_signal(&self) -> Arc<Notify> {
        self.shed.clone()
    }

    /// Queue a reply without waiting. A full outbox means the client stopped
    /// reading, so it is treated like a slow consumer: the connection leaves its
    /// room and `Flow::Close` is returned. A closed outbox means the writer is gone.
    fn reply(&mut self, state: &ServerState, message: ServerMessage) -> Flow {
        match self.outbox.try_send(Arc::new(message)) {
            Ok(()) => Flow::Continue,
            Err(err) => {
                let why = match err {
                    mpsc::error::TrySendError::Full(_) => "full",
                    mpsc::error::TrySendError::Closed(_) => "closed",
                };
                log::warn!("[{}] dropping connection: outbound queue {why}", self.addr);
                self.disconnect(state);
                Flow::Close
            }
        }
    }

    /// Leave the current room, if any.
    pub fn disconnect(&mut self, state: &ServerState) {
        if let Some(membership) = self.membership.take() {
            state.leave_room(&membership.room, membership.participant);
            log::info!("[{}] {} left room {}", self.addr, membership.display_name, membership.room.name());
        }
    }
}

/// What the connection loop should do after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Bound listener, ready to accept connections.
pub struct BoundServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl BoundServer {
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending::<()>()).await
    }

    /// Accept connections until `shutdown` completes, then announce the shutdown
    /// to every participant.
    pub async fn serve_with_shutdown(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted?;
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream, addr).await {
                            log::error!("[{addr}] Connection error: {e}");
                        }
                    });
                }
                () = &mut shutdown => {
                    log::info!("Server shutting down");
                    self.state.announce_shutdown();
                    return Ok(());
                }
            }
        }
    }
}

/// Bind the listening socket without accepting yet.
pub async fn bind(config: ServerConfig) -> Result<BoundServer, ServerError> {
    let addr = config.bind_addr;
    let state = ServerState::new(config)?;
    let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::BindFailed { addr, source })?;
    Ok(BoundServer { listener, state })
}

/// Builder for creating collaboration servers.
#[derive(Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn bind_str(mut self, addr: &str) -> Result<Self, std::net::AddrParseError> {
        self.config.bind_addr = addr.parse()?;
        Ok(self)
    }

    pub fn canvas_size(mut self, width: u32, height: u32) -> Self {
        self.config.canvas_width = width;
        self.config.canvas_height = height;
        self
    }

    pub fn initial_canvas(mut self, image: Image) -> Self {
        self.config.initial_canvas = Some(image);
        self
    }

    pub fn max_participants(mut self, max: usize) -> Self {
        self.config.max_participants = max;
        self
    }

    pub fn outbound_queue_len(mut self, len: usize) -> Self {
        self.config.outbound_queue_len = len;
        self
    }

    pub fn send_diffs(mut self, enable: bool) -> Self {
        self.config.send_diffs = enable;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }

    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        bind(self.config).await
    }
}

/// Run the collaboration server until Ctrl+C.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let server = bind(config).await?;
    let local_addr = server.local_addr()?;
    print_banner(server.state().config(), local_addr);
    log::info!("Server listening on {local_addr}");

    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
            anstream::println!();
            anstream::println!("{}[Server]{} Shutting down...", colors::YELLOW, colors::RESET);
        })
        .await?;

    // Give writer tasks a moment to flush the shutdown notice.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    log::info!("Server shutdown complete");
    Ok(())
}

fn print_banner(config: &ServerConfig, local_addr: SocketAddr) {
    use anstream::println;
    use colors::*;

    let ws_url = format!("ws://{local_addr}");
    let canvas = match &config.initial_canvas {
        Some(image) => format!("{}x{}", image.width(), image.height()),
        None => format!("{}x{}", config.canvas_width, config.canvas_height),
    };
    let max_participants = if config.max_participants > 0 {
        config.max_participants.to_string()
    } else {
        config.ui_unlimited.clone()
    };

    let rows = [
        (&config.ui_bind_address, local_addr.to_string()),
        (&config.ui_canvas, canvas),
        (&config.ui_max_participants, max_participants),
    ];
    let label_width = rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .chain(std::iter::once(config.ui_connect_with.chars().count()))
        .max()
        .unwrap_or(13);
    let value_width = rows
        .iter()
        .map(|(_, value)| value.chars().count())
        .chain(std::iter::once(ws_url.chars().count()))
        .max()
        .unwrap_or(20);
    let inner_width = config
        .ui_title
        .chars()
        .count()
        .max(config.ui_stop_hint.chars().count())
        .max(label_width + 3 + value_width);
    let box_width = inner_width + 2;
    let border = "═".repeat(box_width);
    let pad = |text: &str| " ".repeat(box_width - 2 - text.chars().count());

    let print_row = |label: &str, value: &str, color: &str| {
        let label_pad = " ".repeat(label_width - label.chars().count());
        let value_pad = " ".repeat(box_width - 2 - label_width - 3 - value.chars().count());
        println!("{CYAN}║{RESET}  {color}{label}{label_pad}:{RESET}  {value}{value_pad}{CYAN}║{RESET}");
    };

    println!("{CYAN}╔{border}╗{RESET}");
    println!("{CYAN}║{RESET}  {YELLOW}{}{RESET}{}{CYAN}║{RESET}", config.ui_title, pad(&config.ui_title));
    println!("{CYAN}╠{border}╣{RESET}");
    for (label, value) in &rows {
        print_row(label, value, GREEN);
    }
    println!("{CYAN}╠{border}╣{RESET}");
    print_row(&config.ui_connect_with, &ws_url, WHITE);
    println!("{CYAN}╠{border}╣{RESET}");
    println!("{CYAN}║{RESET}  {GRAY}{}{RESET}{}{CYAN}║{RESET}", config.ui_stop_hint, pad(&config.ui_stop_hint));
    println!("{CYAN}╚{border}╝{RESET}");
    println!();
}

/// Handle a single WebSocket connection.
async fn handle_connection(state: Arc<ServerState>, stream: TcpStream, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use anstream::println;
    use colors::*;

    println!("{BLUE}[{addr}]{RESET} New connection");

    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(state.config().outbound_queue_len.max(1));
    let mut connection = Connection::new(addr, tx);
    let shed = connection.shed_signal();

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(msg.as_ref()) {
                Ok(json) => json,
                Err(e) => {
                    log::error!("[{addr}] Failed to encode message: {e}");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        log::warn!("[{addr}] WebSocket error: {e}");
                        break;
                    }
                    None => break,
                };
                match msg {
                    Message::Text(text) => {
                        let text_str: &str = text.as_ref();
                        if handle_message(&state, &mut connection, text_str).await == Flow::Close {
                            break;
                        }
                    }
                    Message::Close(_) => {
                        println!("{YELLOW}[{addr}]{RESET} Client requested close");
                        break;
                    }
                    // Pong is handled automatically by tungstenite
                    _ => {}
                }
            }
            () = shed.notified() => {
                println!("{RED}[{addr}]{RESET} Dropped as slow consumer");
                break;
            }
        }
    }

    match connection.membership.as_ref() {
        Some(m) => println!("{RED}[{addr}]{RESET} {BOLD}{}{RESET} left {}", m.display_name, m.room.name()),
        None => println!("{RED}[{addr}]{RESET} Disconnected (no handshake)"),
    }
    connection.disconnect(&state);
    drop(connection);

    // The writer ends once every outbox sender is gone; give it a moment to flush.
    if tokio::time::timeout(std::time::Duration::from_secs(1), sender_task).await.is_err() {
        log::debug!("[{addr}] writer did not finish in time");
    }
    Ok(())
}

/// Handle a single JSON message from a client. Replies are queued on the
/// connection's outbox behind any broadcast already queued there; if that outbox
/// is full the connection leaves its room and `Flow::Close` is returned.
///
/// Filter work for submissions and selections runs on the blocking thread pool.
pub async fn handle_message(state: &Arc<ServerState>, connection: &mut Connection, text: &str) -> Flow {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            log::debug!("[{}] undecodable message: {e}", connection.addr);
            return connection.reply(state, ServerMessage::error(ErrorCode::BadRequest, e.to_string()));
        }
    };

    if let ClientMessage::Handshake {
        protocol_version,
        display_name,
        room_name,
    } = message
    {
        return handle_handshake(state, connection, protocol_version, display_name, room_name);
    }

    let Some(membership) = connection.membership.as_ref() else {
        return connection.reply(state, ServerMessage::error(ErrorCode::NotJoined, "handshake first"));
    };
    let room = membership.room.clone();
    let participant = membership.participant;

    let reply = match message {
        ClientMessage::Handshake { .. } => None,
        ClientMessage::SubmitOp {
            parent_id,
            filter,
            mask,
            message,
        } => {
            // Filters may take a while; keep them off the async workers.
            let room = room.clone();
            match tokio::task::spawn_blocking(move || room.submit(participant, parent_id, filter, mask, message)).await {
                Ok(result) => result.err().map(|e| e.to_message()),
                Err(e) => Some(task_failed(connection.addr, &e)),
            }
        }
        ClientMessage::Undo => room.undo(participant).err().map(|e| e.to_message()),
        ClientMessage::Redo { node_id } => room.redo(participant, node_id).err().map(|e| e.to_message()),
        ClientMessage::History { from_node_id } => Some(match room.history(from_node_id) {
            Ok(nodes) => ServerMessage::History { nodes },
            Err(e) => e.to_message(),
        }),
        ClientMessage::Fetch { node_id } => Some(match room.node(node_id) {
            Ok((node, image)) => ServerMessage::Node { node, image },
            Err(e) => e.to_message(),
        }),
        ClientMessage::Select {
            node_id,
            seed_x,
            seed_y,
            threshold,
        } => {
            let room = room.clone();
            Some(match tokio::task::spawn_blocking(move || room.select(node_id, seed_x, seed_y, threshold)).await {
                Ok(Ok((node_id, mask))) => ServerMessage::Selection { node_id, mask },
                Ok(Err(e)) => e.to_message(),
                Err(e) => task_failed(connection.addr, &e),
            })
        }
        ClientMessage::Leave => {
            connection.disconnect(state);
            return Flow::Close;
        }
    };

    match reply {
        Some(reply) => connection.reply(state, reply),
        None => Flow::Continue,
    }
}

fn task_failed(addr: SocketAddr, err: &tokio::task::JoinError) -> ServerMessage {
    log::error!("[{addr}] filter task failed: {err}");
    ServerMessage::error(ErrorCode::Internal, "request could not be completed")
}

fn handle_handshake(state: &Arc<ServerState>, connection: &mut Connection, protocol_version: u32, display_name: String, room_name: String) -> Flow {
    use anstream::println;
    use colors::*;

    let addr = connection.addr;
    if connection.membership.is_some() {
        return connection.reply(state, ServerMessage::error(ErrorCode::BadRequest, "already joined a room"));
    }
    if protocol_version != PROTOCOL_VERSION {
        println!("{RED}[{addr}]{RESET} Refused: protocol version {protocol_version}");
        return connection.reply(
            state,
            ServerMessage::Rejected {
                reason: RejectReason::BadVersion,
            },
        );
    }
    let display_name = display_name.trim().to_string();
    if display_name.is_empty() || display_name.chars().count() > MAX_NAME_LEN || room_name.is_empty() {
        return connection.reply(
            state,
            ServerMessage::Rejected {
                reason: RejectReason::InvalidName,
            },
        );
    }

    match state.join_room(&room_name, &display_name, connection.outbox.clone(), connection.shed.clone()) {
        Ok((room, participant)) => {
            println!(
                "{GREEN}[{addr}]{RESET} {BOLD}{display_name}{RESET} joined {room_name} (participants: {})",
                room.participant_count()
            );
            connection.membership = Some(Membership {
                room,
                participant,
                display_name,
            });
            Flow::Continue
        }
        Err(err) => {
            println!("{RED}[{addr}]{RESET} Refused: {err}");
            connection.reply(state, err.to_message())
        }
    }
}
