//! Arena-backed in-memory tree.

use std::collections::BTreeMap;

use crate::{Element, FeedTree, MutationRecord, NodeId};

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn from_element(element: Element) -> Self {
        Self {
            tag: element.tag,
            attributes: element.attributes.into_iter().collect(),
            style: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// In-memory [`FeedTree`].
///
/// Nodes live in an arena and are never freed, so handles to removed nodes
/// stay valid. Every structural change made through [`append`](Self::append),
/// [`FeedTree::insert_before`] or [`FeedTree::detach`] is recorded and handed
/// out by [`FeedTree::take_records`], whether or not the parent is attached.
/// [`create`](Self::create) itself records nothing; the new node starts
/// detached.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    nodes: Vec<NodeData>,
    records: Vec<MutationRecord>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Creates a tree holding only a `body` root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::from_element(Element::new("body"))],
            records: Vec::new(),
        }
    }

    /// Creates a detached node.
    pub fn create(&mut self, element: Element) -> NodeId {
        self.nodes.push(NodeData::from_element(element));
        NodeId(self.nodes.len() - 1)
    }

    /// Appends `child` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert_before(parent, child, None)
    }

    /// Creates a node and appends it under `parent`.
    pub fn build(&mut self, parent: NodeId, element: Element) -> NodeId {
        let node = self.create(element);
        self.append(parent, node);
        node
    }

    /// Number of nodes ever created, including detached ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: the root exists from construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sets an attribute directly (no mutation record, like an attribute change).
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.nodes.get_mut(node.0) {
            data.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get_mut(node.0)?.parent.take()?;
        if let Some(data) = self.nodes.get_mut(parent.0) {
            data.children.retain(|&child| child != node);
        }
        Some(parent)
    }
}

impl FeedTree for MemoryTree {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|data| data.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|data| data.tag.as_str())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(node.0)
            .and_then(|data| data.attributes.get(name))
            .map(String::as_str)
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        if let Some(data) = self.nodes.get_mut(node.0) {
            let classes = data.attributes.entry("class".to_string()).or_default();
            if !classes.is_empty() {
                classes.push(' ');
            }
            classes.push_str(class);
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(classes) = self
            .nodes
            .get_mut(node.0)
            .and_then(|data| data.attributes.get_mut("class"))
        {
            *classes = classes
                .split_whitespace()
                .filter(|c| *c != class)
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.nodes
            .get(node.0)
            .and_then(|data| data.style.get(property))
            .map(String::as_str)
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        if let Some(data) = self.nodes.get_mut(node.0) {
            data.style.insert(property.to_string(), value.to_string());
        }
    }

    fn remove_style(&mut self, node: NodeId, property: &str) {
        if let Some(data) = self.nodes.get_mut(node.0) {
            data.style.remove(property);
        }
    }

    fn detach(&mut self, node: NodeId) -> bool {
        match self.unlink(node) {
            Some(parent) => {
                self.records.push(MutationRecord::removed(parent, node));
                true
            }
            None => false,
        }
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> bool {
        if parent.0 >= self.nodes.len() || node.0 >= self.nodes.len() || node == self.root() {
            return false;
        }
        if self.contains(node, parent) {
            return false;
        }
        self.detach(node);

        let data = &mut self.nodes[parent.0];
        let position = reference
            .and_then(|r| data.children.iter().position(|&child| child == r))
            .unwrap_or(data.children.len());
        data.children.insert(position, node);
        self.nodes[node.0].parent = Some(parent);
        self.records.push(MutationRecord::added(parent, node));
        true
    }

    fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_build_and_traverse() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let section = tree.build(root, Element::new("div").class("stream-container"));
        let first = tree.build(section, Element::new("article").id("jsid-post-1"));
        let link = tree.build(first, Element::new("a").href("/gag/1"));
        let second = tree.build(section, Element::new("article").id("jsid-post-2"));

        assert_eq!(tree.children(section), vec![first, second]);
        assert_eq!(tree.descendants(root), vec![section, first, link, second]);
        assert_eq!(tree.parent(link), Some(first));
        assert_eq!(tree.next_sibling(first), Some(second));
        assert!(tree.is_attached(link));
        assert_eq!(tree.attribute(first, "id"), Some("jsid-post-1"));
    }

    #[test]
    fn test_detach_keeps_subtree_inspectable() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let section = tree.build(root, Element::new("div"));
        let post = tree.build(section, Element::new("article"));
        tree.take_records();

        assert!(tree.detach(section));
        assert!(!tree.detach(section));
        assert!(!tree.is_attached(post));
        assert_eq!(tree.children(section), vec![post]);
        assert_eq!(
            tree.take_records(),
            vec![MutationRecord::removed(root, section)]
        );
        assert!(tree.take_records().is_empty());
    }

    #[test]
    fn test_insert_before_reference() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let a = tree.build(root, Element::new("div"));
        let b = tree.build(root, Element::new("div"));
        let c = tree.create(Element::new("div"));

        assert!(tree.insert_before(root, c, Some(b)));
        assert_eq!(tree.children(root), vec![a, c, b]);

        // Moving an attached node records a removal then an insertion.
        tree.take_records();
        assert!(tree.insert_before(root, b, Some(a)));
        assert_eq!(tree.children(root), vec![b, a, c]);
        assert_eq!(
            tree.take_records(),
            vec![
                MutationRecord::removed(root, b),
                MutationRecord::added(root, b)
            ]
        );
    }

    #[test]
    fn test_insert_rejects_cycles() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let outer = tree.build(root, Element::new("div"));
        let inner = tree.build(outer, Element::new("div"));

        assert!(!tree.insert_before(inner, outer, None));
        assert!(!tree.insert_before(outer, outer, None));
        assert!(!tree.append(inner, root));
        assert_eq!(tree.parent(outer), Some(root));
    }

    #[test]
    fn test_class_and_style() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let node = tree.build(root, Element::new("div").class("stream-container"));

        tree.add_class(node, "hidden");
        tree.add_class(node, "hidden");
        assert_eq!(tree.attribute(node, "class"), Some("stream-container hidden"));

        tree.remove_class(node, "stream-container");
        assert!(!tree.has_class(node, "stream-container"));
        assert!(tree.has_class(node, "hidden"));

        tree.set_style(node, "min-height", "0px");
        assert_eq!(tree.style(node, "min-height"), Some("0px"));
        tree.remove_style(node, "min-height");
        assert_eq!(tree.style(node, "min-height"), None);
    }

    #[test]
    fn test_insert_into_detached_subtree_is_recorded() {
        let mut tree = MemoryTree::new();
        let section = tree.create(Element::new("div"));
        assert!(tree.take_records().is_empty());

        tree.build(section, Element::new("article"));
        assert_eq!(tree.take_records().len(), 1);
        assert!(!tree.is_attached(section));
    }

    proptest! {
        #[test]
        fn prop_descendants_are_contained(widths in proptest::collection::vec(0usize..4, 1..6)) {
            let mut tree = MemoryTree::new();
            let mut parent = tree.root();
            for width in widths {
                let mut last = parent;
                for _ in 0..=width {
                    last = tree.build(parent, Element::new("div"));
                }
                parent = last;
            }
            let root = tree.root();
            for node in tree.descendants(root) {
                prop_assert!(tree.contains(root, node));
                prop_assert!(tree.is_attached(node));
            }
            prop_assert_eq!(tree.descendants(root).len(), tree.len() - 1);
        }
    }
}
