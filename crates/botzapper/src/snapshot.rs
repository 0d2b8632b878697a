//! Feed snapshot files for the `scan` command.
//!
//! ```json
//! {
//!   "sections": [
//!     { "posts": [
//!         { "id": "aXb12" },
//!         { "link": "https://9gag.com/gag/aYc34" },
//!         { "link": "/gag/aZd56", "entry_id": "aZd56" }
//!     ] }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use botzapper_feed::{Element, FeedTree, Markers, MemoryTree, NodeId};
use serde::Deserialize;

/// A saved feed.
#[derive(Debug, Default, Deserialize)]
pub struct FeedSnapshot {
    /// Feed sections in page order.
    #[serde(default)]
    pub sections: Vec<SectionSnapshot>,
}

/// One feed section.
#[derive(Debug, Default, Deserialize)]
pub struct SectionSnapshot {
    /// Posts in page order.
    #[serde(default)]
    pub posts: Vec<PostSnapshot>,
}

/// One post; any subset of the identifying fields may be present.
#[derive(Debug, Default, Deserialize)]
pub struct PostSnapshot {
    /// Identifier carried by the post node itself.
    pub id: Option<String>,
    /// Permalink `href`.
    pub link: Option<String>,
    /// Identifier carried by the permalink's data attribute.
    pub entry_id: Option<String>,
}

impl PostSnapshot {
    /// Human-readable label for reports.
    #[must_use]
    pub fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.entry_id.as_deref())
            .or(self.link.as_deref())
            .unwrap_or("<anonymous>")
    }
}

/// A snapshot rendered into a tree, with handles back to its posts.
pub struct RenderedFeed {
    /// The rendered tree.
    pub tree: MemoryTree,
    /// Section nodes in order.
    pub sections: Vec<NodeId>,
    /// Post nodes with their labels.
    pub posts: Vec<(NodeId, String)>,
}

impl FeedSnapshot {
    /// Reads a snapshot file.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Renders the snapshot using the host page markers.
    #[must_use]
    pub fn render(&self, markers: &Markers) -> RenderedFeed {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let mut sections = Vec::with_capacity(self.sections.len());
        let mut posts = Vec::new();

        for section in &self.sections {
            let section_node = tree.build(
                root,
                Element::new(&markers.section_tag).class(&markers.section_class),
            );
            sections.push(section_node);

            for post in &section.posts {
                let post_id = format!(
                    "{}{}",
                    markers.post_id_prefix,
                    post.id.as_deref().unwrap_or_default()
                );
                let post_node = tree.build(section_node, Element::new(&markers.post_tag).id(post_id));
                if let Some(link) = &post.link {
                    let mut anchor = Element::new(&markers.link_tag).href(link);
                    if let Some(entry_id) = &post.entry_id {
                        anchor = anchor.attr(&markers.link_id_attribute, entry_id);
                    }
                    tree.build(post_node, anchor);
                }
                posts.push((post_node, post.label().to_string()));
            }
        }

        RenderedFeed {
            tree,
            sections,
            posts,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let snapshot: FeedSnapshot = serde_json::from_str(
            r#"{"sections": [{"posts": [
                {"id": "abc"},
                {"link": "/gag/def", "entry_id": "def"}
            ]}, {}]}"#,
        )
        .unwrap();
        let markers = Markers::default();

        let feed = snapshot.render(&markers);

        assert_eq!(feed.sections.len(), 2);
        assert_eq!(feed.posts.len(), 2);
        assert_eq!(
            feed.tree.attribute(feed.posts[0].0, "id"),
            Some("jsid-post-abc")
        );
        let link = feed.tree.select_first(feed.posts[1].0, &markers.post_link()).unwrap();
        assert_eq!(feed.tree.attribute(link, "data-entry-id"), Some("def"));
        assert_eq!(feed.posts[1].1, "def");
    }
}
