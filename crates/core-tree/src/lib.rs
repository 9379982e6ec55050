//! Node arena for branching documents.
//!
//! A document is a forest of text nodes. Each node owns a run of text and a
//! weak `parent_id` back-reference; ownership flows root to leaf and is
//! expressed purely as reachability from the roots. Concatenating `text`
//! along a root-to-node chain yields that node's *full text*, which is what
//! the host buffer shows when the node is active.
//!
//! This crate is intentionally free of policy: it stores nodes, resolves
//! paths, and reports corruption. Structural mutation rules (split, merge,
//! delete cascades) live in `core-state` on top of the [`NodeStore`] surface.
//!
//! Invariants maintained by callers and checked by [`NodeStore::validate`]:
//! - ids are unique (map keys);
//! - `parent_id = None` marks a root, multiple roots are permitted;
//! - every non-root parent resolves to an existing node;
//! - parent chains are acyclic.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

mod error;
mod store;

pub use error::{MergeBlock, TreeError, TreeResult};
pub use store::NodeStore;

/// Opaque node key. Persisted verbatim as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Mint a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Per-node search classification. A node with no classification (`None` on
/// [`Node::search_result_state`]) is outside any active search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchState {
    /// Node text contains the search term.
    Result,
    /// Node is a proper ancestor of at least one result.
    Ancestor,
    /// Node neither matches nor leads to a match.
    None,
}

/// A single text segment of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub text: String,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub bookmarked: bool,
    /// Unix timestamp (milliseconds) of the last switch to this node.
    #[serde(default)]
    pub last_visited: Option<i64>,
    #[serde(default)]
    pub search_result_state: Option<SearchState>,
}

impl Node {
    pub fn new(text: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            text: text.into(),
            parent_id,
            collapsed: false,
            unread: false,
            bookmarked: false,
            last_visited: None,
            search_result_state: None,
        }
    }

    pub fn root(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
