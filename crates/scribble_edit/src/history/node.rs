use std::sync::Arc;

use scribble_engine::{Filter, FilterError, FilterKind, Image, Mask};
use serde::{Deserialize, Serialize};

/// Identifies a node inside one room's history. Ids are handed out in creation
/// order starting with the root at `0`, so a parent's id is always lower than its
/// children's.
pub type NodeId = u64;

/// One immutable entry of the version tree.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionNode {
    pub id: NodeId,
    /// `None` only for the root.
    pub parent: Option<NodeId>,
    /// The filter that turned the parent's image into [`VersionNode::image`].
    pub filter: Option<Filter>,
    pub mask: Option<Mask>,
    pub image: Image,
    pub author: String,
    pub message: Option<String>,
}

impl VersionNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn filter_kind(&self) -> Option<FilterKind> {
        self.filter.as_ref().map(Filter::kind)
    }
}

/// The result of running a filter against a parent node, ready to be committed.
///
/// Only [`VersionTree::prepare`](crate::VersionTree::prepare) and the room build
/// these, and a commit accepts an edit only into the tree holding that very parent
/// node, so a committed node's image is always the filter's output for its parent.
#[derive(Debug, Clone)]
pub struct PreparedEdit {
    pub(crate) parent: Arc<VersionNode>,
    pub(crate) filter: Filter,
    pub(crate) mask: Option<Mask>,
    pub(crate) image: Image,
}

impl PreparedEdit {
    /// Apply `filter` to `parent`. This does the expensive pixel work and needs no
    /// access to the tree, so it may run while other edits are being committed.
    pub(crate) fn compute(parent: &Arc<VersionNode>, filter: Filter, mask: Option<Mask>) -> Result<Self, FilterError> {
        let image = filter.apply(&parent.image, mask.as_ref())?;
        Ok(Self {
            parent: parent.clone(),
            filter,
            mask,
            image,
        })
    }

    pub fn parent(&self) -> NodeId {
        self.parent.id
    }

    pub fn image(&self) -> &Image {
        &self.image
    }
}

/// Pixel-free description of a node, as listed in history responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    pub filter_kind: Option<FilterKind>,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Direct children in creation order; all but the first are side nodes.
    pub children: Vec<NodeId>,
}
