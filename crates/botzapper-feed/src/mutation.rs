//! Structural mutation records.

use crate::NodeId;

/// One structural change to a tree: children added to or removed from `target`.
///
/// Records are accumulated by the tree and handed out in batches through
/// [`FeedTree::take_records`](crate::FeedTree::take_records), mirroring how a
/// DOM mutation observer delivers `childList` records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Node whose child list changed.
    pub target: NodeId,
    /// Nodes inserted under `target`.
    pub added: Vec<NodeId>,
    /// Nodes removed from `target`.
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    /// Record for a single inserted child.
    #[must_use]
    pub fn added(target: NodeId, node: NodeId) -> Self {
        Self {
            target,
            added: vec![node],
            removed: Vec::new(),
        }
    }

    /// Record for a single removed child.
    #[must_use]
    pub fn removed(target: NodeId, node: NodeId) -> Self {
        Self {
            target,
            added: Vec::new(),
            removed: vec![node],
        }
    }

    /// Iterates over every node this record mentions, added first.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.added.iter().chain(self.removed.iter()).copied()
    }
}
