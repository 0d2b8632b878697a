//! Structural selectors.
//!
//! A deliberately small subset of CSS selectors: exactly the shapes the host
//! page contract needs.

use std::fmt;

use crate::{FeedTree, NodeId};

/// A structural marker matched against single nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `tag.class` (or `.class` when `tag` is `None`).
    Class {
        /// Required tag name.
        tag: Option<String>,
        /// Required class.
        class: String,
    },
    /// `tag[attr^="prefix"]`.
    AttrPrefix {
        /// Required tag name.
        tag: String,
        /// Attribute name.
        attr: String,
        /// Required value prefix.
        prefix: String,
    },
    /// `tag[attr*="needle"]`.
    AttrContains {
        /// Required tag name.
        tag: String,
        /// Attribute name.
        attr: String,
        /// Required value substring.
        needle: String,
    },
}

impl Selector {
    /// `.class`
    #[must_use]
    pub fn class(class: impl Into<String>) -> Self {
        Self::Class {
            tag: None,
            class: class.into(),
        }
    }

    /// `tag.class`
    #[must_use]
    pub fn tag_class(tag: impl Into<String>, class: impl Into<String>) -> Self {
        Self::Class {
            tag: Some(tag.into()),
            class: class.into(),
        }
    }

    /// `tag[id^="prefix"]`
    #[must_use]
    pub fn id_prefix(tag: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::AttrPrefix {
            tag: tag.into(),
            attr: "id".to_string(),
            prefix: prefix.into(),
        }
    }

    /// `tag[attr*="needle"]`
    #[must_use]
    pub fn attr_contains(
        tag: impl Into<String>,
        attr: impl Into<String>,
        needle: impl Into<String>,
    ) -> Self {
        Self::AttrContains {
            tag: tag.into(),
            attr: attr.into(),
            needle: needle.into(),
        }
    }

    /// Whether `node` matches this selector.
    pub fn matches<T: FeedTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        let Some(node_tag) = tree.tag(node) else {
            return false;
        };
        match self {
            Self::Class { tag, class } => {
                tag.as_deref().is_none_or(|t| t == node_tag) && tree.has_class(node, class)
            }
            Self::AttrPrefix { tag, attr, prefix } => {
                tag == node_tag
                    && tree
                        .attribute(node, attr)
                        .is_some_and(|value| value.starts_with(prefix.as_str()))
            }
            Self::AttrContains { tag, attr, needle } => {
                tag == node_tag
                    && tree
                        .attribute(node, attr)
                        .is_some_and(|value| value.contains(needle.as_str()))
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class { tag, class } => write!(f, "{}.{class}", tag.as_deref().unwrap_or("")),
            Self::AttrPrefix { tag, attr, prefix } => write!(f, "{tag}[{attr}^=\"{prefix}\"]"),
            Self::AttrContains { tag, attr, needle } => write!(f, "{tag}[{attr}*=\"{needle}\"]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Element, MemoryTree};

    #[test]
    fn test_class_selector() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let div = tree.build(root, Element::new("div").class("feed stream-container"));
        let span = tree.build(root, Element::new("span").class("stream-container"));

        assert!(Selector::tag_class("div", "stream-container").matches(&tree, div));
        assert!(!Selector::tag_class("div", "stream-container").matches(&tree, span));
        assert!(Selector::class("stream-container").matches(&tree, span));
        assert!(!Selector::class("stream").matches(&tree, div));
    }

    #[test]
    fn test_attr_selectors() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let post = tree.build(root, Element::new("article").id("jsid-post-abc"));
        let other = tree.build(root, Element::new("article").id("promo-jsid-post-abc"));
        let link = tree.build(post, Element::new("a").href("https://9gag.com/gag/abc"));

        let posts = Selector::id_prefix("article", "jsid-post-");
        assert!(posts.matches(&tree, post));
        assert!(!posts.matches(&tree, other));
        assert!(Selector::attr_contains("a", "href", "/gag/").matches(&tree, link));
        assert!(!Selector::attr_contains("a", "href", "/u/").matches(&tree, link));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Selector::tag_class("div", "stream-container").to_string(),
            "div.stream-container"
        );
        assert_eq!(
            Selector::id_prefix("article", "jsid-post-").to_string(),
            "article[id^=\"jsid-post-\"]"
        );
        assert_eq!(
            Selector::attr_contains("a", "href", "/gag/").to_string(),
            "a[href*=\"/gag/\"]"
        );
    }
}
