//! Feed reconciliation: hide denied posts and collapse emptied sections.
//!
//! A pass scans every feed section, extracts each post's identifier, asks the
//! classifier and detaches hidden posts. Sections left with no visible post
//! are detached too and remembered, so a later pass can put them back when
//! new visible content arrives in the same section.
//!
//! Passes are idempotent: a hidden post is detached and tagged once, and
//! only that first detachment is counted.

use std::collections::HashMap;

use botzapper_feed::{FeedTree, Markers, NodeId, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::classifier;
use crate::counters::CounterLedger;
use crate::denylist::Denylist;
use crate::policy::Policy;
use crate::storage::Store;

/// Class added to posts detached by a pass.
pub const HIDDEN_POST_CLASS: &str = "botzapper-post-hidden";
/// Class added to sections collapsed by a pass.
pub const COLLAPSED_SECTION_CLASS: &str = "botzapper-section-hidden";

/// What a single pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Sections scanned, attached or previously collapsed.
    pub sections: usize,
    /// Post nodes seen.
    pub posts: usize,
    /// Posts newly detached and counted.
    pub hidden: usize,
    /// Sections newly collapsed.
    pub collapsed: usize,
    /// Sections put back into view.
    pub restored: usize,
    /// Posts left in place because no identifier could be extracted.
    pub unidentified: usize,
}

impl PassReport {
    /// Whether the pass changed the tree.
    #[must_use]
    pub const fn changed_tree(&self) -> bool {
        self.hidden > 0 || self.collapsed > 0 || self.restored > 0
    }
}

/// Where a collapsed section used to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    parent: NodeId,
    next_sibling: Option<NodeId>,
}

/// Reconciles a rendered feed with the denylist and policy.
#[derive(Debug)]
pub struct Reconciler {
    markers: Markers,
    page_origin: Url,
    section: Selector,
    post: Selector,
    post_link: Selector,
    collapsed: HashMap<NodeId, Placement>,
}

impl Reconciler {
    /// Creates a reconciler for the given page contract. `page_origin`
    /// resolves relative permalinks.
    #[must_use]
    pub fn new(markers: Markers, page_origin: Url) -> Self {
        Self {
            section: markers.section(),
            post: markers.post(),
            post_link: markers.post_link(),
            markers,
            page_origin,
            collapsed: HashMap::new(),
        }
    }

    /// Structural markers in use.
    #[must_use]
    pub const fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Sections currently collapsed by this reconciler.
    #[must_use]
    pub fn collapsed_sections(&self) -> Vec<NodeId> {
        let mut sections: Vec<NodeId> = self.collapsed.keys().copied().collect();
        sections.sort_unstable();
        sections
    }

    /// Runs one full pass over `tree`.
    ///
    /// An empty denylist skips the pass entirely.
    pub fn reconcile<T, S>(
        &mut self,
        tree: &mut T,
        denylist: &Denylist,
        policy: Policy,
        ledger: &mut CounterLedger<S>,
    ) -> PassReport
    where
        T: FeedTree + ?Sized,
        S: Store + Clone + Send + Sync + 'static,
    {
        let mut report = PassReport::default();
        if denylist.is_empty() {
            debug!("Denylist is empty, skipping reconciliation");
            return report;
        }

        self.forget_orphaned(tree);
        let root = tree.root();
        let mut sections = tree.select_all(root, &self.section);
        sections.extend(
            self.collapsed_sections()
                .into_iter()
                .filter(|&section| !tree.is_attached(section)),
        );

        for section in sections {
            report.sections += 1;
            self.collapse_sizing(tree, section);
            let visible = self.reconcile_posts(tree, section, denylist, policy, ledger, &mut report);
            self.clear_sizing(tree, section);

            if visible {
                if self.restore_section(tree, section) {
                    report.restored += 1;
                }
            } else if self.collapse_section(tree, section) {
                report.collapsed += 1;
            }
        }

        if report.changed_tree() {
            info!(
                hidden = report.hidden,
                collapsed = report.collapsed,
                restored = report.restored,
                session = ledger.session_count(),
                "Reconciliation pass"
            );
        }
        report
    }

    /// Processes the posts of one section; returns whether any stays visible.
    fn reconcile_posts<T, S>(
        &self,
        tree: &mut T,
        section: NodeId,
        denylist: &Denylist,
        policy: Policy,
        ledger: &mut CounterLedger<S>,
        report: &mut PassReport,
    ) -> bool
    where
        T: FeedTree + ?Sized,
        S: Store + Clone + Send + Sync + 'static,
    {
        let mut visible = false;
        for post in tree.select_all(section, &self.post) {
            report.posts += 1;

            if tree.has_class(post, HIDDEN_POST_CLASS) {
                // Put back by the page; take it out again without counting.
                if tree.detach(post) {
                    debug!(%post, "Detached previously hidden post again");
                }
                continue;
            }

            let Some(id) = self.extract_id(tree, post) else {
                warn!(%post, "Could not extract post id, leaving post visible");
                report.unidentified += 1;
                visible = true;
                continue;
            };

            if classifier::decide(&id, denylist, policy) {
                tree.detach(post);
                tree.add_class(post, HIDDEN_POST_CLASS);
                ledger.record_hide();
                report.hidden += 1;
                info!(post_id = %id, %policy, "Hid post");
            } else {
                visible = true;
            }
        }
        visible
    }

    /// Extracts the post identifier, preferring the post's own `id`, then the
    /// permalink's data attribute, then the permalink's last path segment.
    fn extract_id<T: FeedTree + ?Sized>(&self, tree: &T, post: NodeId) -> Option<String> {
        let from_node = tree
            .attribute(post, "id")
            .and_then(|id| id.strip_prefix(self.markers.post_id_prefix.as_str()))
            .filter(|id| !id.is_empty());
        if let Some(id) = from_node {
            return Some(id.to_string());
        }

        let link = tree.select_first(post, &self.post_link)?;
        let from_data = tree
            .attribute(link, &self.markers.link_id_attribute)
            .filter(|id| !id.is_empty());
        if let Some(id) = from_data {
            return Some(id.to_string());
        }

        let href = tree.attribute(link, "href")?;
        let url = self.page_origin.join(href).ok()?;
        url.path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()
            .map(ToString::to_string)
    }

    /// Drops the height the host reserved so removed posts leave no gap.
    fn collapse_sizing<T: FeedTree + ?Sized>(&self, tree: &mut T, section: NodeId) {
        self.clear_sizing(tree, section);
        tree.set_style(section, "min-height", "0px");
        tree.set_style(section, "height", "auto");
    }

    fn clear_sizing<T: FeedTree + ?Sized>(&self, tree: &mut T, section: NodeId) {
        for property in &self.markers.reserved_sizing {
            tree.remove_style(section, property);
        }
    }

    /// Drops collapsed sections whose former parent left the page; they can
    /// no longer be put back.
    fn forget_orphaned<T: FeedTree + ?Sized>(&mut self, tree: &T) {
        let before = self.collapsed.len();
        self.collapsed
            .retain(|_, placement| tree.is_attached(placement.parent));
        let forgotten = before - self.collapsed.len();
        if forgotten > 0 {
            debug!(forgotten, "Forgot collapsed sections removed by the page");
        }
    }

    /// Detaches and tags a section; returns whether it was attached.
    fn collapse_section<T: FeedTree + ?Sized>(&mut self, tree: &mut T, section: NodeId) -> bool {
        let Some(parent) = tree.parent(section) else {
            return false;
        };
        let next_sibling = tree.next_sibling(section);
        if !tree.detach(section) {
            return false;
        }
        tree.add_class(section, COLLAPSED_SECTION_CLASS);
        self.collapsed.insert(section, Placement { parent, next_sibling });
        info!(%section, "Collapsed empty section");
        true
    }

    /// Puts a collapsed section back into view; returns whether it was collapsed.
    fn restore_section<T: FeedTree + ?Sized>(&mut self, tree: &mut T, section: NodeId) -> bool {
        let placement = self.collapsed.remove(&section);
        if !tree.has_class(section, COLLAPSED_SECTION_CLASS) && placement.is_none() {
            return false;
        }

        if let Some(Placement { parent, next_sibling }) = placement {
            if tree.parent(section).is_none() {
                // The former sibling may be gone; insert_before then appends.
                let reference = next_sibling.filter(|&sibling| tree.parent(sibling) == Some(parent));
                if !tree.insert_before(parent, section, reference) {
                    warn!(%section, %parent, "Could not re-attach collapsed section");
                }
            }
        }

        tree.remove_class(section, COLLAPSED_SECTION_CLASS);
        if tree.style(section, "display") == Some("none") {
            for property in ["display", "min-height", "height"] {
                tree.remove_style(section, property);
            }
        }
        info!(%section, "Restored section");
        true
    }
}
