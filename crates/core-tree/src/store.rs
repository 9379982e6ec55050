use crate::{Node, NodeId, TreeError, TreeResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Insertion-ordered arena of nodes keyed by id.
///
/// Sibling order is the order nodes were inserted; removals use
/// `shift_remove` so the relative order of survivors never changes. Every
/// traversal is bounded by the visited set and reports `CorruptTree` instead
/// of looping when a parent chain cycles or dangles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeStore {
    nodes: IndexMap<NodeId, Node>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> TreeResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.clone()))
    }

    pub fn get_mut(&mut self, id: &NodeId) -> TreeResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.clone()))
    }

    /// Insert a node under a freshly generated id. Fails without inserting when
    /// the node's parent does not exist.
    pub fn insert(&mut self, node: Node) -> TreeResult<NodeId> {
        if let Some(parent) = node.parent_id.as_ref()
            && !self.nodes.contains_key(parent)
        {
            return Err(TreeError::NodeNotFound(parent.clone()));
        }
        let id = NodeId::generate();
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Insert (or replace) a node under a caller-chosen id. Used when loading
    /// persisted state and in fixtures; no parent validation is performed.
    pub fn insert_with_id(&mut self, id: NodeId, node: Node) -> Option<Node> {
        self.nodes.insert(id, node)
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Node> {
        self.nodes.shift_remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&NodeId, &mut Node)> {
        self.nodes.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.is_root())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Direct children of `id` in insertion order (empty for unknown ids).
    pub fn children(&self, id: &NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.parent_id.as_ref() == Some(id))
            .map(|(cid, _)| cid.clone())
            .collect()
    }

    /// Nodes sharing `id`'s parent, `id` included, in insertion order. Roots
    /// are siblings of each other.
    pub fn siblings(&self, id: &NodeId) -> TreeResult<Vec<NodeId>> {
        let parent = self.get(id)?.parent_id.as_ref();
        Ok(self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent_id.as_ref() == parent)
            .map(|(sid, _)| sid.clone())
            .collect())
    }

    /// Proper ancestors of `id`, root first.
    pub fn ancestors(&self, id: &NodeId) -> TreeResult<Vec<NodeId>> {
        let mut node = self.get(id)?;
        let mut seen: HashSet<&NodeId> = HashSet::new();
        seen.insert(id);
        let mut chain = Vec::new();
        while let Some(parent) = node.parent_id.as_ref() {
            if !seen.insert(parent) {
                warn!(target: "tree", node = %id, at = %parent, "parent_cycle");
                return Err(TreeError::CorruptTree(parent.clone()));
            }
            node = match self.nodes.get(parent) {
                Some(n) => n,
                None => {
                    warn!(target: "tree", node = %id, missing = %parent, "dangling_parent");
                    return Err(TreeError::CorruptTree(parent.clone()));
                }
            };
            chain.push(parent.clone());
        }
        chain.reverse();
        Ok(chain)
    }

    /// `ancestors(id) + [id]`.
    pub fn family(&self, id: &NodeId) -> TreeResult<Vec<NodeId>> {
        let mut chain = self.ancestors(id)?;
        chain.push(id.clone());
        Ok(chain)
    }

    /// Texts along the family chain, root first.
    pub fn family_texts(&self, id: &NodeId) -> TreeResult<Vec<&str>> {
        let family = self.family(id)?;
        family
            .iter()
            .map(|fid| self.get(fid).map(|n| n.text.as_str()))
            .collect()
    }

    pub fn full_text(&self, id: &NodeId) -> TreeResult<String> {
        Ok(self.family_texts(id)?.concat())
    }

    /// True when `ancestor` lies strictly above `id`.
    pub fn is_ancestor_of(&self, ancestor: &NodeId, id: &NodeId) -> TreeResult<bool> {
        Ok(self.ancestors(id)?.contains(ancestor))
    }

    /// Every node below `id` (excluding `id`), parents before children.
    pub fn descendants(&self, id: &NodeId) -> TreeResult<Vec<NodeId>> {
        self.get(id)?;
        let mut index: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
        for (cid, node) in &self.nodes {
            if let Some(parent) = node.parent_id.as_ref() {
                index.entry(parent).or_default().push(cid);
            }
        }
        let mut out = Vec::new();
        let mut seen: HashSet<&NodeId> = HashSet::new();
        seen.insert(id);
        let mut queue = std::collections::VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            for child in index.get(next).map(Vec::as_slice).unwrap_or_default() {
                if !seen.insert(*child) {
                    return Err(TreeError::CorruptTree((*child).clone()));
                }
                out.push((*child).clone());
                queue.push_back(*child);
            }
        }
        Ok(out)
    }

    /// Check every parent chain. Used after importing external state.
    pub fn validate(&self) -> TreeResult<()> {
        for id in self.nodes.keys() {
            self.ancestors(id)?;
        }
        Ok(())
    }
}
