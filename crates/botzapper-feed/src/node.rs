//! Node handles and element descriptions.

use std::fmt;

/// Opaque handle to a node of a [`FeedTree`](crate::FeedTree).
///
/// Handles stay valid after the node is detached, so a removed node can still
/// be inspected (mutation records refer to removed nodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Creates a new node handle.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Description of an element to insert into a tree.
///
/// ```ignore
/// let post = Element::new("article").id("jsid-post-aXb12").class("post");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in insertion order (`class` included).
    pub attributes: Vec<(String, String)>,
}

impl Element {
    /// Creates an element with the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attributes: Vec::new(),
        }
    }

    /// Sets an attribute, replacing any previous value.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
        self
    }

    /// Sets the `id` attribute.
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Adds a class to the `class` attribute.
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| n == "class") {
            if !slot.1.split_whitespace().any(|c| c == class) {
                if !slot.1.is_empty() {
                    slot.1.push(' ');
                }
                slot.1.push_str(&class);
            }
            self
        } else {
            self.attr("class", class)
        }
    }

    /// Sets the `href` attribute.
    #[must_use]
    pub fn href(self, href: impl Into<String>) -> Self {
        self.attr("href", href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_builder() {
        let element = Element::new("ARTICLE")
            .id("jsid-post-1")
            .class("post")
            .class("post")
            .class("wide");

        assert_eq!(element.tag, "article");
        assert_eq!(
            element.attributes,
            vec![
                ("id".to_string(), "jsid-post-1".to_string()),
                ("class".to_string(), "post wide".to_string()),
            ]
        );
    }

    #[test]
    fn test_attr_replaces() {
        let element = Element::new("a").href("/gag/1").href("/gag/2");
        assert_eq!(element.attributes.len(), 1);
        assert_eq!(element.attributes[0].1, "/gag/2");
    }
}
