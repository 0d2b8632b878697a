//! Filters structural mutations down to the ones that concern the feed.

use std::collections::HashSet;

use botzapper_feed::{FeedTree, Markers, MutationRecord, NodeId, Selector};
use tracing::trace;

/// Decides whether a batch of mutations calls for a reconciliation pass.
///
/// A batch is relevant when any added or removed node is, or contains, a feed
/// section or a post. Everything else (menus, ads, comment widgets) is
/// ignored so busy pages do not trigger passes.
#[derive(Debug, Clone)]
pub struct ChangeWatcher {
    section: Selector,
    post: Selector,
}

impl ChangeWatcher {
    /// Creates a watcher for the given page contract.
    #[must_use]
    pub fn new(markers: &Markers) -> Self {
        Self {
            section: markers.section_any(),
            post: markers.post(),
        }
    }

    /// Whether `records` touch feed structure. Each node is examined once per
    /// batch.
    pub fn is_relevant<T>(&self, tree: &T, records: &[MutationRecord]) -> bool
    where
        T: FeedTree + ?Sized,
    {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let relevant = records
            .iter()
            .flat_map(MutationRecord::nodes)
            .filter(|&node| seen.insert(node))
            .any(|node| {
                tree.matches_or_contains(node, &self.section)
                    || tree.matches_or_contains(node, &self.post)
            });
        trace!(records = records.len(), relevant, "Mutation batch");
        relevant
    }

    /// Drains the tree's pending records and checks them as one batch.
    pub fn observe<T>(&self, tree: &mut T) -> bool
    where
        T: FeedTree + ?Sized,
    {
        let records = tree.take_records();
        !records.is_empty() && self.is_relevant(tree, &records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botzapper_feed::{Element, MemoryTree};

    fn setup() -> (MemoryTree, ChangeWatcher, NodeId) {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let section = tree.build(root, Element::new("div").class("stream-container"));
        tree.take_records();
        (tree, ChangeWatcher::new(&Markers::default()), section)
    }

    #[test]
    fn test_added_post_is_relevant() {
        let (mut tree, watcher, section) = setup();
        tree.build(section, Element::new("article").id("jsid-post-abc"));
        assert!(watcher.observe(&mut tree));
    }

    #[test]
    fn test_wrapper_containing_post_is_relevant() {
        let (mut tree, watcher, section) = setup();
        let wrapper = tree.create(Element::new("div").class("list-item"));
        tree.build(wrapper, Element::new("article").id("jsid-post-abc"));
        tree.take_records();

        tree.append(section, wrapper);
        assert!(watcher.observe(&mut tree));
    }

    #[test]
    fn test_removed_section_is_relevant() {
        let (mut tree, watcher, section) = setup();
        tree.detach(section);
        assert!(watcher.observe(&mut tree));
    }

    #[test]
    fn test_unrelated_churn_is_ignored() {
        let (mut tree, watcher, _) = setup();
        let root = tree.root();
        let menu = tree.build(root, Element::new("nav").class("menu"));
        tree.build(menu, Element::new("a").href("/hot"));
        tree.detach(menu);

        assert!(!watcher.observe(&mut tree));
        assert!(tree.take_records().is_empty());
    }

    #[test]
    fn test_empty_batch_is_not_relevant() {
        let (mut tree, watcher, _) = setup();
        assert!(!watcher.observe(&mut tree));
    }
}
