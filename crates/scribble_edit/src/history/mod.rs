//! Branching edit history.
//!
//! Every applied filter becomes a [`VersionNode`]. Nodes are never removed or
//! changed, so undo only moves a cursor kept by the caller and a new edit on an
//! older node simply starts another branch ("side node").

mod node;
pub use node::*;

use std::sync::Arc;

use scribble_engine::{Filter, FilterError, Image, Mask};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Unknown parent node {0}")]
    UnknownParent(NodeId),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Node {0} is the root and has no parent")]
    AtRoot(NodeId),

    #[error("Edit was prepared against a node {0} that is not part of this history")]
    ForeignParent(NodeId),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Arena of version nodes indexed by id.
#[derive(Debug, Clone)]
pub struct VersionTree {
    nodes: Vec<Arc<VersionNode>>,
    children: Vec<Vec<NodeId>>,
}

impl VersionTree {
    /// Create a history holding only the root node `0` with `image`.
    pub fn new(image: Image) -> Self {
        Self::with_author(image, String::new())
    }

    pub fn with_author(image: Image, author: impl Into<String>) -> Self {
        let root = VersionNode {
            id: 0,
            parent: None,
            filter: None,
            mask: None,
            image,
            author: author.into(),
            message: None,
        };
        Self {
            nodes: vec![Arc::new(root)],
            children: vec![Vec::new()],
        }
    }

    pub fn root(&self) -> &Arc<VersionNode> {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Arc<VersionNode>> {
        self.index(id).map(|i| &self.nodes[i])
    }

    /// Direct children of `id` in creation order; empty for unknown ids.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.index(id).map_or(&[], |i| self.children[i].as_slice())
    }

    pub fn parent_of(&self, id: NodeId) -> Result<NodeId, HistoryError> {
        let node = self.get(id).ok_or(HistoryError::UnknownNode(id))?;
        node.parent.ok_or(HistoryError::AtRoot(id))
    }

    /// Run `filter` on the image of `parent`.
    pub fn prepare(&self, parent: NodeId, filter: Filter, mask: Option<Mask>) -> Result<PreparedEdit, HistoryError> {
        let node = self.get(parent).ok_or(HistoryError::UnknownParent(parent))?;
        Ok(PreparedEdit::compute(node, filter, mask)?)
    }

    /// Link a prepared edit below its parent and return the new node's id.
    ///
    /// The edit must have been prepared from this tree's own parent node; an edit
    /// computed against any other node, even one with the same id, is refused.
    pub fn commit(&mut self, edit: PreparedEdit, author: impl Into<String>, message: Option<String>) -> Result<NodeId, HistoryError> {
        let parent_id = edit.parent.id;
        let parent_index = self.index(parent_id).ok_or(HistoryError::UnknownParent(parent_id))?;
        if !Arc::ptr_eq(&self.nodes[parent_index], &edit.parent) {
            return Err(HistoryError::ForeignParent(parent_id));
        }
        debug_assert_eq!(
            edit.image.dimensions(),
            edit.filter.output_dimensions(edit.parent.image.width(), edit.parent.image.height())
        );
        let id = self.nodes.len() as NodeId;
        let node = VersionNode {
            id,
            parent: Some(parent_id),
            filter: Some(edit.filter),
            mask: edit.mask,
            image: edit.image,
            author: author.into(),
            message,
        };
        self.nodes.push(Arc::new(node));
        self.children.push(Vec::new());
        self.children[parent_index].push(id);
        log::debug!("history: node {id} appended below {parent_id}");
        Ok(id)
    }

    /// Apply `filter` to `parent` and append the result.
    pub fn append(&mut self, parent: NodeId, filter: Filter, mask: Option<Mask>, author: impl Into<String>, message: Option<String>) -> Result<NodeId, HistoryError> {
        let edit = self.prepare(parent, filter, mask)?;
        self.commit(edit, author, message)
    }

    /// Ids from `id` up to and including the root.
    pub fn path_to_root(&self, id: NodeId) -> Result<Vec<NodeId>, HistoryError> {
        let mut node = self.get(id).ok_or(HistoryError::UnknownNode(id))?;
        let mut path = vec![id];
        while let Some(parent) = node.parent {
            path.push(parent);
            node = &self.nodes[parent as usize];
        }
        Ok(path)
    }

    /// `true` if `ancestor` is `descendant` itself or lies on its path to the root.
    pub fn is_ancestor(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        if !self.contains(ancestor) {
            return false;
        }
        let mut current = self.get(descendant);
        while let Some(node) = current {
            if node.id == ancestor {
                return true;
            }
            if node.id < ancestor {
                return false;
            }
            current = node.parent.and_then(|p| self.get(p));
        }
        false
    }

    /// `true` if `id` is a child other than the first of its parent.
    pub fn is_side_node(&self, id: NodeId) -> bool {
        self.get(id)
            .and_then(|node| node.parent)
            .is_some_and(|parent| self.children_of(parent).first() != Some(&id))
    }

    pub fn summary(&self, id: NodeId) -> Option<NodeSummary> {
        let node = self.get(id)?;
        Some(NodeSummary {
            node_id: node.id,
            parent_id: node.parent,
            filter_kind: node.filter_kind(),
            author: node.author.clone(),
            message: node.message.clone(),
            children: self.children_of(id).to_vec(),
        })
    }

    fn index(&self, id: NodeId) -> Option<usize> {
        let index = usize::try_from(id).ok()?;
        (index < self.nodes.len()).then_some(index)
    }
}
