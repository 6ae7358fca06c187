//! A room: one shared version history plus the participants editing it.
//!
//! All mutable room state sits behind a single lock. Accepted changes are pushed
//! into every participant's bounded outbox while that lock is held, using
//! non-blocking sends only, so each participant observes changes in acceptance
//! order. Socket writes happen later in the connection's writer task.

use std::sync::Arc;

use parking_lot::Mutex;
use scribble_engine::{Filter, FilterError, Image, Mask};
use thiserror::Error;
use tokio::sync::{Notify, mpsc};

use super::compression::diff_images;
use super::protocol::{AppliedImage, ApplyCause, ErrorCode, ParticipantId, RejectReason, ServerMessage};
use crate::{HistoryError, NodeId, NodeSummary, PreparedEdit, VersionNode, VersionTree};

/// Queue feeding one participant's connection.
pub type Outbox = mpsc::Sender<Arc<ServerMessage>>;

#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// 0 for unlimited.
    pub max_participants: usize,
    /// Broadcast submitted and redone images as diffs against the previous head.
    pub send_diffs: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_participants: 0,
            send_diffs: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Edit was based on node {submitted} but head is {expected_head}")]
    Conflict { submitted: NodeId, expected_head: NodeId },

    #[error("Head is the root, nothing to undo")]
    AtRoot,

    #[error("Unknown parent node {0}")]
    UnknownParent(NodeId),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Node {node_id} is not a child of head {head}")]
    NotAChild { node_id: NodeId, head: NodeId },

    #[error("Head {0} has no children to redo")]
    NoChildren(NodeId),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Participant {0} is not in this room")]
    NotJoined(ParticipantId),

    #[error("Display name {0:?} is already in use")]
    NameInUse(String),

    #[error("Room is full ({0} participants)")]
    RoomFull(usize),
}

impl From<HistoryError> for RoomError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::UnknownParent(id) | HistoryError::ForeignParent(id) => RoomError::UnknownParent(id),
            HistoryError::UnknownNode(id) => RoomError::UnknownNode(id),
            HistoryError::AtRoot(_) => RoomError::AtRoot,
            HistoryError::Filter(err) => RoomError::Filter(err),
        }
    }
}

impl RoomError {
    /// The message reporting this error to the participant that caused it.
    pub fn to_message(&self) -> ServerMessage {
        let code = match self {
            RoomError::Conflict { expected_head, .. } => {
                return ServerMessage::Conflict { expected_head: *expected_head };
            }
            RoomError::NameInUse(_) => {
                return ServerMessage::Rejected {
                    reason: RejectReason::NameInUse,
                };
            }
            RoomError::RoomFull(_) => {
                return ServerMessage::Rejected {
                    reason: RejectReason::RoomFull,
                };
            }
            RoomError::AtRoot => ErrorCode::AtRoot,
            RoomError::UnknownParent(_) => ErrorCode::UnknownParent,
            RoomError::UnknownNode(_) => ErrorCode::UnknownNode,
            RoomError::NotAChild { .. } => ErrorCode::NotAChild,
            RoomError::NoChildren(_) => ErrorCode::NoChildren,
            RoomError::Filter(FilterError::InvalidFilterParameters(_)) => ErrorCode::InvalidFilterParameters,
            RoomError::Filter(FilterError::DimensionMismatch { .. }) => ErrorCode::DimensionMismatch,
            RoomError::NotJoined(_) => ErrorCode::NotJoined,
        };
        ServerMessage::error(code, self.to_string())
    }
}

struct Participant {
    id: ParticipantId,
    name: String,
    outbox: Outbox,
    shed: Arc<Notify>,
}

struct RoomState {
    tree: VersionTree,
    head: NodeId,
    participants: Vec<Participant>,
    next_participant_id: ParticipantId,
}

impl RoomState {
    fn head_node(&self) -> Arc<VersionNode> {
        debug_assert!(self.tree.contains(self.head), "head {} missing from tree", self.head);
        self.tree.get(self.head).unwrap_or_else(|| self.tree.root()).clone()
    }

    fn name_of(&self, participant: ParticipantId) -> Result<String, RoomError> {
        self.participants
            .iter()
            .find(|p| p.id == participant)
            .map(|p| p.name.clone())
            .ok_or(RoomError::NotJoined(participant))
    }

    fn names(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.name.clone()).collect()
    }

    /// Queue `message` for every participant. Participants whose queue is full or
    /// closed are dropped from the room and told to disconnect.
    fn broadcast(&mut self, room: &str, message: ServerMessage) {
        let message = Arc::new(message);
        let mut shed_any = false;
        self.participants.retain(|p| match p.outbox.try_send(message.clone()) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("room {room}: dropping {} ({}): outbound queue {}", p.name, p.id, queue_state(&err));
                p.shed.notify_one();
                shed_any = true;
                false
            }
        });
        if shed_any && !self.participants.is_empty() {
            let names = self.names();
            self.broadcast(room, ServerMessage::Participants { names });
        }
    }

    fn applied(&self, node: &VersionNode, previous: &Image, author: String, cause: ApplyCause, send_diffs: bool) -> ServerMessage {
        let result = if send_diffs && cause != ApplyCause::Undo {
            match diff_images(previous, &node.image) {
                Ok(diff) => AppliedImage::Diff { diff },
                Err(_) => AppliedImage::Full { image: node.image.clone() },
            }
        } else {
            AppliedImage::Full { image: node.image.clone() }
        };
        ServerMessage::Applied {
            node_id: node.id,
            parent_id: node.parent,
            filter_kind: node.filter_kind(),
            result,
            author,
            cause,
        }
    }
}

fn queue_state<T>(err: &mpsc::error::TrySendError<T>) -> &'static str {
    match err {
        mpsc::error::TrySendError::Full(_) => "full",
        mpsc::error::TrySendError::Closed(_) => "closed",
    }
}

pub struct Room {
    name: String,
    config: RoomConfig,
    state: Mutex<RoomState>,
}

impl Room {
    pub fn new(name: impl Into<String>, canvas: Image, config: RoomConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(RoomState {
                tree: VersionTree::new(canvas),
                head: 0,
                participants: Vec::new(),
                next_participant_id: 1,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head(&self) -> NodeId {
        self.state.lock().head
    }

    pub fn head_image(&self) -> Image {
        self.state.lock().head_node().image.clone()
    }

    pub fn participant_names(&self) -> Vec<String> {
        self.state.lock().names()
    }

    pub fn participant_count(&self) -> usize {
        self.state.lock().participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().participants.is_empty()
    }

    /// Run `f` against the history while holding the room lock.
    pub fn with_tree<R>(&self, f: impl FnOnce(&VersionTree) -> R) -> R {
        f(&self.state.lock().tree)
    }

    /// Add a participant. `Joined` is queued to the newcomer before anything else,
    /// followed by the updated participant list for everyone.
    pub fn join(&self, display_name: &str, outbox: Outbox, shed: Arc<Notify>) -> Result<ParticipantId, RoomError> {
        let mut state = self.state.lock();
        if state.participants.iter().any(|p| p.name == display_name) {
            return Err(RoomError::NameInUse(display_name.to_string()));
        }
        if self.config.max_participants > 0 && state.participants.len() >= self.config.max_participants {
            return Err(RoomError::RoomFull(self.config.max_participants));
        }

        let id = state.next_participant_id;
        state.next_participant_id += 1;

        let head = state.head_node();
        let mut participants = state.names();
        participants.push(display_name.to_string());
        let joined = ServerMessage::Joined {
            room_name: self.name.clone(),
            participant_id: id,
            head_node_id: head.id,
            head_image: head.image.clone(),
            participants: participants.clone(),
        };
        if let Err(err) = outbox.try_send(Arc::new(joined)) {
            log::warn!("room {}: {display_name} left before joining: outbound queue {}", self.name, queue_state(&err));
            return Err(RoomError::NotJoined(id));
        }
        state.participants.push(Participant {
            id,
            name: display_name.to_string(),
            outbox,
            shed,
        });
        log::info!("room {}: {display_name} joined as {id} ({} participants)", self.name, state.participants.len());
        state.broadcast(&self.name, ServerMessage::Participants { names: participants });
        Ok(id)
    }

    /// Remove a participant. Returns the number of remaining participants, or `None`
    /// if the participant was not in the room (for example after being dropped as
    /// a slow consumer).
    pub fn leave(&self, participant: ParticipantId) -> Option<usize> {
        let mut state = self.state.lock();
        let index = state.participants.iter().position(|p| p.id == participant)?;
        let gone = state.participants.remove(index);
        log::info!("room {}: {} left ({} participants)", self.name, gone.name, state.participants.len());
        if !state.participants.is_empty() {
            let names = state.names();
            state.broadcast(&self.name, ServerMessage::Participants { names });
        }
        Some(state.participants.len())
    }

    /// Apply `filter` to `parent_id` and make the result the new head.
    ///
    /// Accepted only while `parent_id` is the head. The filter runs without the room
    /// lock on a snapshot of the parent; if another submission won in the meantime
    /// this one fails with `Conflict` and the tree is left untouched.
    pub fn submit(&self, participant: ParticipantId, parent_id: NodeId, filter: Filter, mask: Option<Mask>, message: Option<String>) -> Result<NodeId, RoomError> {
        let parent = {
            let state = self.state.lock();
            state.name_of(participant)?;
            let parent = state.tree.get(parent_id).ok_or(RoomError::UnknownParent(parent_id))?.clone();
            if parent_id != state.head {
                return Err(RoomError::Conflict {
                    submitted: parent_id,
                    expected_head: state.head,
                });
            }
            parent
        };

        let edit = PreparedEdit::compute(&parent, filter, mask)?;

        let mut state = self.state.lock();
        let author = state.name_of(participant)?;
        if state.head != parent_id {
            log::debug!("room {}: {author} lost the race for head {parent_id}", self.name);
            return Err(RoomError::Conflict {
                submitted: parent_id,
                expected_head: state.head,
            });
        }
        let node_id = state.tree.commit(edit, author.clone(), message)?;
        state.head = node_id;
        let node = state.head_node();
        log::debug!("room {}: {author} applied {} as node {node_id}", self.name, node.filter_kind().map_or("?", |k| k.name()));
        let applied = state.applied(&node, &parent.image, author, ApplyCause::Submit, self.config.send_diffs);
        state.broadcast(&self.name, applied);
        Ok(node_id)
    }

    /// Move the head back to its parent. The former head stays in the tree.
    pub fn undo(&self, participant: ParticipantId) -> Result<NodeId, RoomError> {
        let mut state = self.state.lock();
        let author = state.name_of(participant)?;
        let previous = state.head_node();
        let parent = state.tree.parent_of(state.head)?;
        state.head = parent;
        let node = state.head_node();
        log::debug!("room {}: {author} undid node {} back to {parent}", self.name, previous.id);
        let applied = state.applied(&node, &previous.image, author, ApplyCause::Undo, self.config.send_diffs);
        state.broadcast(&self.name, applied);
        Ok(parent)
    }

    /// Move the head forward to one of its children, the newest if `node_id` is `None`.
    pub fn redo(&self, participant: ParticipantId, node_id: Option<NodeId>) -> Result<NodeId, RoomError> {
        let mut state = self.state.lock();
        let author = state.name_of(participant)?;
        let head = state.head;
        let children = state.tree.children_of(head);
        let target = match node_id {
            Some(id) if !state.tree.contains(id) => return Err(RoomError::UnknownNode(id)),
            Some(id) if !children.contains(&id) => return Err(RoomError::NotAChild { node_id: id, head }),
            Some(id) => id,
            None => *children.last().ok_or(RoomError::NoChildren(head))?,
        };
        let previous = state.head_node();
        state.head = target;
        let node = state.head_node();
        log::debug!("room {}: {author} redid node {target}", self.name);
        let applied = state.applied(&node, &previous.image, author, ApplyCause::Redo, self.config.send_diffs);
        state.broadcast(&self.name, applied);
        Ok(target)
    }

    /// Summaries from `from` (default: head) up to the root.
    pub fn history(&self, from: Option<NodeId>) -> Result<Vec<NodeSummary>, RoomError> {
        let state = self.state.lock();
        let from = from.unwrap_or(state.head);
        let path = state.tree.path_to_root(from)?;
        Ok(path.into_iter().filter_map(|id| state.tree.summary(id)).collect())
    }

    pub fn node(&self, id: NodeId) -> Result<(NodeSummary, Image), RoomError> {
        let state = self.state.lock();
        let summary = state.tree.summary(id).ok_or(RoomError::UnknownNode(id))?;
        let image = state.tree.get(id).ok_or(RoomError::UnknownNode(id))?.image.clone();
        Ok((summary, image))
    }

    /// Magic wand selection on the image of `node_id` (default: head).
    pub fn select(&self, node_id: Option<NodeId>, seed_x: u32, seed_y: u32, threshold: u8) -> Result<(NodeId, Mask), RoomError> {
        let node = {
            let state = self.state.lock();
            match node_id {
                Some(id) => state.tree.get(id).ok_or(RoomError::UnknownNode(id))?.clone(),
                None => state.head_node(),
            }
        };
        let mask = Filter::MagicWandSelect { seed_x, seed_y, threshold }.select(&node.image)?;
        Ok((node.id, mask))
    }

    /// Tell every participant the server is going away.
    pub fn announce_shutdown(&self) {
        self.state.lock().broadcast(&self.name, ServerMessage::ServerShutdown);
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("name", &self.name).field("config", &self.config).finish_non_exhaustive()
    }
}
