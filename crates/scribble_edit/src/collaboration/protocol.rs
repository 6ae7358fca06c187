//! Wire messages.
//!
//! Every message is a JSON object in a WebSocket text frame with a `"type"` field
//! naming the variant. Images travel as `{width, height, data}` with base64 RGBA
//! data, masks as base64 packed bits.

use scribble_engine::{Filter, FilterKind, Image, Mask};
use serde::{Deserialize, Serialize};

use super::ImageDiff;
use crate::{NodeId, NodeSummary};

/// Version of the message schema. Handshakes carrying any other version are rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Room-local participant id, assigned on join.
pub type ParticipantId = u32;

/// Client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Handshake {
        protocol_version: u32,
        display_name: String,
        room_name: String,
    },
    SubmitOp {
        parent_id: NodeId,
        filter: Filter,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mask: Option<Mask>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Undo,
    /// Move the head to a child of the current head, the newest one if `node_id` is absent.
    Redo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<NodeId>,
    },
    History {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_node_id: Option<NodeId>,
    },
    Fetch {
        node_id: NodeId,
    },
    Select {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<NodeId>,
        seed_x: u32,
        seed_y: u32,
        threshold: u8,
    },
    Leave,
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Joined {
        room_name: String,
        participant_id: ParticipantId,
        head_node_id: NodeId,
        head_image: Image,
        participants: Vec<String>,
    },
    Rejected {
        reason: RejectReason,
    },
    /// The head moved. Sent to every participant of the room, the requester included.
    Applied {
        node_id: NodeId,
        parent_id: Option<NodeId>,
        filter_kind: Option<FilterKind>,
        result: AppliedImage,
        author: String,
        cause: ApplyCause,
    },
    Conflict {
        expected_head: NodeId,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    /// Nodes from the requested node up to the root.
    History {
        nodes: Vec<NodeSummary>,
    },
    Node {
        node: NodeSummary,
        image: Image,
    },
    Selection {
        node_id: NodeId,
        mask: Mask,
    },
    Participants {
        names: Vec<String>,
    },
    ServerShutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    BadVersion,
    NameInUse,
    InvalidName,
    RoomFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyCause {
    Submit,
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    AtRoot,
    UnknownParent,
    UnknownNode,
    NotAChild,
    NoChildren,
    InvalidFilterParameters,
    DimensionMismatch,
    NotJoined,
    BadRequest,
    /// The server failed to finish the request.
    Internal,
}

/// New head image, either complete or as a difference to the previous head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding")]
pub enum AppliedImage {
    Full { image: Image },
    Diff { diff: ImageDiff },
}

impl AppliedImage {
    /// Reconstruct the new head image given the image of the node it was applied to.
    pub fn resolve(&self, previous: &Image) -> Result<Image, super::CompressionError> {
        match self {
            AppliedImage::Full { image } => Ok(image.clone()),
            AppliedImage::Diff { diff } => super::apply_diff(previous, diff),
        }
    }
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}
