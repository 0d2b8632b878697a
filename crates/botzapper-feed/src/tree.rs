//! The traversable tree abstraction.

use crate::{MutationRecord, NodeId, Selector};

/// A rendered content tree the filtering engine can inspect and mutate.
///
/// Implementations are driven from a single logical thread; every method is
/// synchronous. Handles to detached nodes remain usable: a detached subtree
/// can be inspected, re-inserted, or simply forgotten.
///
/// Only the required methods touch storage. Traversal and selection helpers
/// are provided on top of them.
pub trait FeedTree {
    /// The document root. Always attached.
    fn root(&self) -> NodeId;

    /// Parent of `node`, or `None` for the root and for detached subtree roots.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Children of `node` in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lowercase tag name, or `None` for an unknown handle.
    fn tag(&self, node: NodeId) -> Option<&str>;

    /// Attribute value.
    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Adds a class to the node's class list.
    fn add_class(&mut self, node: NodeId, class: &str);

    /// Removes a class from the node's class list.
    fn remove_class(&mut self, node: NodeId, class: &str);

    /// Inline style property value.
    fn style(&self, node: NodeId, property: &str) -> Option<&str>;

    /// Sets an inline style property.
    fn set_style(&mut self, node: NodeId, property: &str, value: &str);

    /// Removes an inline style property.
    fn remove_style(&mut self, node: NodeId, property: &str);

    /// Detaches `node` from its parent.
    ///
    /// Returns `false` when the node has no parent (already detached, or root).
    fn detach(&mut self, node: NodeId) -> bool;

    /// Inserts `node` under `parent`, before `reference` (or last when
    /// `reference` is `None` or not a child of `parent`).
    ///
    /// A node that is attached elsewhere is moved. Returns `false` if the
    /// insertion would create a cycle.
    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> bool;

    /// Drains the mutation records accumulated since the last call.
    fn take_records(&mut self) -> Vec<MutationRecord>;

    /// Whether the node carries `class`.
    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Whether the node is reachable from the root.
    fn is_attached(&self, node: NodeId) -> bool {
        let root = self.root();
        let mut current = node;
        loop {
            if current == root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Sibling following `node` under its parent.
    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let children = self.children(parent);
        let position = children.iter().position(|&child| child == node)?;
        children.get(position + 1).copied()
    }

    /// All descendants of `node` in document (pre-)order, excluding `node`.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).into_iter().rev());
        }
        out
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }

    /// Descendants of `scope` matching `selector`, in document order.
    fn select_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&node| selector.matches(self, node))
            .collect()
    }

    /// First descendant of `scope` matching `selector`.
    fn select_first(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&node| selector.matches(self, node))
    }

    /// Whether `node` matches `selector` or has a matching descendant.
    fn matches_or_contains(&self, node: NodeId, selector: &Selector) -> bool {
        selector.matches(self, node) || self.select_first(node, selector).is_some()
    }
}
