//! Document state: the node tree, the active node, view state, and the
//! operations that mutate them.
//!
//! A [`Document`] is the per-resource aggregate. It owns a [`NodeStore`], the
//! id of the active node (`current`), a hoist stack that scopes rendering to a
//! subtree, the last search term, and the advisory `generating` marker set
//! while a completion request is in flight.
//!
//! Invariant: `current` always resolves to an existing node. When the host is
//! synchronized, `full_text(current)` equals the host buffer exactly. Every
//! operation in this crate checks its preconditions before touching the tree
//! so a failed call leaves the document unchanged.
//!
//! Module map:
//! - `mutate`    - create / clone / split / merge / delete, collapse, bookmarks, hoist
//! - `navigate`  - active-path switching and traversal targets
//! - `search`    - full recomputation of per-node search classification
//! - `reconcile` - applies a buffer diff plan from `core-text` to the tree
//! - `workspace` - per-document map, persisted state, import/export

use core_tree::{Node, NodeId, NodeStore, TreeError, TreeResult};
use serde::{Deserialize, Serialize};

pub mod mutate;
pub mod navigate;
pub mod reconcile;
pub mod search;
pub mod workspace;

pub use mutate::{BreakOutcome, DeleteReport};
pub use navigate::{SwitchOutcome, preceding_text_unchanged};
pub use reconcile::ReconcileOutcome;
pub use search::SearchSummary;
pub use workspace::{PersistError, PersistedState, Workspace};

/// Per-resource tree aggregate. Serializes to the persisted `DocumentState` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    current: NodeId,
    #[serde(default)]
    hoisted: Vec<NodeId>,
    #[serde(default)]
    search_term: String,
    nodes: NodeStore,
    #[serde(default)]
    generating: Option<NodeId>,
}

impl Document {
    /// Wrap existing buffer content as the single root of a new tree.
    pub fn new(text: &str) -> Self {
        let mut nodes = NodeStore::new();
        let root = NodeId::generate();
        let mut node = Node::root(text);
        node.last_visited = Some(now_millis());
        nodes.insert_with_id(root.clone(), node);
        Self {
            current: root,
            hoisted: Vec::new(),
            search_term: String::new(),
            nodes,
            generating: None,
        }
    }

    /// Assemble a document from parts, validating every invariant.
    pub fn from_parts(nodes: NodeStore, current: NodeId) -> TreeResult<Self> {
        let doc = Self {
            current,
            hoisted: Vec::new(),
            search_term: String::new(),
            nodes,
            generating: None,
        };
        doc.validate()?;
        Ok(doc)
    }

    pub fn current(&self) -> &NodeId {
        &self.current
    }

    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    pub fn node(&self, id: &NodeId) -> TreeResult<&Node> {
        self.nodes.get(id)
    }

    pub fn hoisted(&self) -> &[NodeId] {
        &self.hoisted
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn generating(&self) -> Option<&NodeId> {
        self.generating.as_ref()
    }

    pub fn set_generating(&mut self, root: Option<NodeId>) {
        self.generating = root;
    }

    /// Full text of the active path (what the host buffer should show).
    pub fn active_text(&self) -> TreeResult<String> {
        self.nodes.full_text(&self.current)
    }

    /// Check tree shape plus document-level references.
    pub fn validate(&self) -> TreeResult<()> {
        self.nodes.validate()?;
        self.nodes.get(&self.current)?;
        for id in &self.hoisted {
            self.nodes.get(id)?;
        }
        if self.nodes.roots().is_empty() {
            return Err(TreeError::CorruptTree(self.current.clone()));
        }
        Ok(())
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    /// Build a document from `(id, parent, text)` triples; the first entry must be a root.
    pub fn doc(rows: &[(&str, Option<&str>, &str)], current: &str) -> Document {
        let mut nodes = NodeStore::new();
        for (nid, parent, text) in rows {
            nodes.insert_with_id(id(nid), Node::new(*text, parent.map(id)));
        }
        Document::from_parts(nodes, id(current)).expect("valid fixture")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_document_wraps_text_as_single_root() {
        let d = Document::new("It was a dark night");
        assert_eq!(d.nodes().len(), 1);
        assert_eq!(d.active_text().unwrap(), "It was a dark night");
        assert!(d.node(d.current()).unwrap().is_root());
        assert!(d.generating().is_none());
    }

    #[test]
    fn from_parts_rejects_missing_current() {
        let mut nodes = NodeStore::new();
        nodes.insert_with_id(id("r"), Node::root("x"));
        assert_eq!(
            Document::from_parts(nodes, id("ghost")),
            Err(TreeError::NodeNotFound(id("ghost")))
        );
    }

    #[test]
    fn serializes_to_document_state_shape() {
        let d = doc(&[("r", None, "a"), ("c", Some("r"), "b")], "c");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["current"], "c");
        assert_eq!(json["searchTerm"], "");
        assert!(json["generating"].is_null());
        assert_eq!(json["nodes"]["c"]["parentId"], "r");
        assert!(json["hoisted"].as_array().unwrap().is_empty());
    }
}
