//! Host page contract: the structural markers that identify feed content.

use crate::Selector;

/// Structural markers consumed from the host page.
///
/// The defaults describe the 9GAG feed: sections are `div.stream-container`,
/// posts are `article[id^="jsid-post-"]` and permalinks look like
/// `a[href*="/gag/"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Markers {
    /// Tag of feed section containers.
    pub section_tag: String,
    /// Class identifying feed section containers.
    pub section_class: String,
    /// Tag of post nodes.
    pub post_tag: String,
    /// Prefix of a post node's `id`; the remainder is the post identifier.
    pub post_id_prefix: String,
    /// Tag of post permalinks.
    pub link_tag: String,
    /// Fragment every permalink `href` contains.
    pub link_href_fragment: String,
    /// Data attribute on a permalink carrying the post identifier.
    pub link_id_attribute: String,
    /// Inline sizing properties the host uses to reserve section height.
    pub reserved_sizing: Vec<String>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            section_tag: "div".to_string(),
            section_class: "stream-container".to_string(),
            post_tag: "article".to_string(),
            post_id_prefix: "jsid-post-".to_string(),
            link_tag: "a".to_string(),
            link_href_fragment: "/gag/".to_string(),
            link_id_attribute: "data-entry-id".to_string(),
            reserved_sizing: vec![
                "min-height".to_string(),
                "height".to_string(),
                "--662c6048".to_string(),
            ],
        }
    }
}

impl Markers {
    /// Feed sections as scanned by a reconciliation pass.
    #[must_use]
    pub fn section(&self) -> Selector {
        Selector::tag_class(&self.section_tag, &self.section_class)
    }

    /// Feed sections as matched against mutation records (any tag).
    #[must_use]
    pub fn section_any(&self) -> Selector {
        Selector::class(&self.section_class)
    }

    /// Post nodes.
    #[must_use]
    pub fn post(&self) -> Selector {
        Selector::id_prefix(&self.post_tag, &self.post_id_prefix)
    }

    /// Permalinks inside a post.
    #[must_use]
    pub fn post_link(&self) -> Selector {
        Selector::attr_contains(&self.link_tag, "href", &self.link_href_fragment)
    }
}
