//! # botzapper-feed
//!
//! The rendered-tree side of feed filtering.
//!
//! ## Features
//!
//! - **Tree abstraction**: [`FeedTree`] is everything the filtering engine needs
//!   from a rendered page: traversal, attributes, classes, inline style,
//!   detaching/re-inserting nodes and batched mutation records
//! - **Structural markers**: [`Selector`] and [`Markers`] describe the host
//!   page contract (feed sections, post nodes, post links)
//! - **In-memory tree**: [`MemoryTree`] is an arena implementation that records
//!   mutations the way a DOM mutation observer would
//!
//! ## Quick Start
//!
//! ```ignore
//! use botzapper_feed::{Element, FeedTree, Markers, MemoryTree};
//!
//! let markers = Markers::default();
//! let mut tree = MemoryTree::new();
//! let root = tree.root();
//! let section = tree.build(root, Element::new("div").class("stream-container"));
//! tree.build(section, Element::new("article").id("jsid-post-a1B2c3"));
//!
//! let posts = tree.select_all(section, &markers.post());
//! assert_eq!(posts.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod markers;
mod memory;
mod mutation;
mod node;
mod selector;
mod tree;

pub use markers::Markers;
pub use memory::MemoryTree;
pub use mutation::MutationRecord;
pub use node::{Element, NodeId};
pub use selector::Selector;
pub use tree::FeedTree;
