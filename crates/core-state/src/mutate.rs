//! Structural mutations.
//!
//! Every operation validates its inputs and computes its full affected set
//! before the first write, so an `Err` always means "tree unchanged". Cascades
//! (delete, merge) enumerate descendants explicitly; nothing is reclaimed
//! implicitly.

use crate::{Document, now_millis};
use core_text::grapheme;
use core_tree::{MergeBlock, Node, NodeId, TreeError, TreeResult};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Where a cursor offset falls relative to the active path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakOutcome {
    /// Offset sits at the start of `node`: branch by creating a sibling of it.
    AtNodeStart(NodeId),
    /// Offset sits at the end of the active path: branch by creating a child of `current`.
    AtEnd(NodeId),
    /// `before` kept the leading text; `after` is the new node holding the rest
    /// and adopting every former child of `before`.
    Split { before: NodeId, after: NodeId },
}

/// Result of a delete cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Every node removed, requested ids and their descendants.
    pub removed: Vec<NodeId>,
    /// Per-id refusals (`CannotDeleteLastRoot`).
    pub rejected: Vec<TreeError>,
    /// Set when `current` was removed and reassigned.
    pub new_current: Option<NodeId>,
}

impl Document {
    /// Append an empty-or-given-text child under `parent`.
    pub fn create_child(&mut self, parent: &NodeId, text: impl Into<String>) -> TreeResult<NodeId> {
        let id = self.nodes.insert(Node::new(text, Some(parent.clone())))?;
        trace!(target: "state.mutate", parent = %parent, child = %id, "create_child");
        Ok(id)
    }

    /// Append an empty node beside `id` (a new root when `id` is a root).
    pub fn create_sibling(&mut self, id: &NodeId) -> TreeResult<NodeId> {
        let parent = self.nodes.get(id)?.parent_id.clone();
        let sibling = self.nodes.insert(Node::new("", parent))?;
        trace!(target: "state.mutate", of = %id, sibling = %sibling, "create_sibling");
        Ok(sibling)
    }

    /// Duplicate `id`'s text into a new sibling. Flags are not copied.
    pub fn clone_node(&mut self, id: &NodeId) -> TreeResult<NodeId> {
        let source = self.nodes.get(id)?;
        let copy = Node::new(source.text.clone(), source.parent_id.clone());
        let clone = self.nodes.insert(copy)?;
        trace!(target: "state.mutate", of = %id, clone = %clone, "clone");
        Ok(clone)
    }

    /// Split the active path at an absolute byte offset into its full text.
    ///
    /// The offset is snapped back to a grapheme boundary. Offsets on a segment
    /// boundary belong to the later segment, so they report
    /// [`BreakOutcome::AtNodeStart`] rather than splitting.
    pub fn break_at_point(&mut self, offset: usize) -> TreeResult<BreakOutcome> {
        let family = self.nodes.family(&self.current)?;
        let full = self.nodes.full_text(&self.current)?;
        let offset = grapheme::snap_back(&full, offset);
        if offset >= full.len() {
            return Ok(BreakOutcome::AtEnd(self.current.clone()));
        }

        let mut start = 0usize;
        let mut owner = None;
        for id in &family {
            let len = self.nodes.get(id)?.text.len();
            if offset < start + len {
                owner = Some((id.clone(), offset - start));
                break;
            }
            start += len;
        }
        let Some((owner, local)) = owner else {
            return Ok(BreakOutcome::AtEnd(self.current.clone()));
        };
        if local == 0 {
            return Ok(BreakOutcome::AtNodeStart(owner));
        }

        let children = self.nodes.children(&owner);
        let node = self.nodes.get_mut(&owner)?;
        let after_text = node.text.split_off(local);
        let after = self.nodes.insert(Node::new(after_text, Some(owner.clone())))?;
        for child in &children {
            self.nodes.get_mut(child)?.parent_id = Some(after.clone());
        }
        if self.current == owner {
            self.current = after.clone();
        }
        debug!(target: "state.mutate", before = %owner, after = %after, moved_children = children.len(), "split");
        Ok(BreakOutcome::Split {
            before: owner,
            after,
        })
    }

    /// Break at `offset` and create the new empty branch the outcome calls for.
    /// Returns the new node; callers switch to it.
    pub fn branch_at_point(&mut self, offset: usize) -> TreeResult<NodeId> {
        match self.break_at_point(offset)? {
            BreakOutcome::AtNodeStart(node) => self.create_sibling(&node),
            BreakOutcome::AtEnd(current) => self.create_child(&current, ""),
            BreakOutcome::Split { before, .. } => self.create_child(&before, ""),
        }
    }

    /// Fold `id` into its parent. Requires a parent with `id` as its only child.
    /// Returns the surviving parent id.
    pub fn merge_with_parent(&mut self, id: &NodeId) -> TreeResult<NodeId> {
        let parent = self
            .nodes
            .get(id)?
            .parent_id
            .clone()
            .ok_or(TreeError::CannotMerge(MergeBlock::NoParent))?;
        self.nodes.get(&parent)?;
        if self.nodes.children(&parent).len() != 1 {
            return Err(TreeError::CannotMerge(MergeBlock::HasSiblings));
        }
        let grandchildren = self.nodes.children(id);
        // Preconditions hold; apply.
        let Some(merged) = self.nodes.remove(id) else {
            return Err(TreeError::NodeNotFound(id.clone()));
        };
        self.nodes.get_mut(&parent)?.text.push_str(&merged.text);
        for child in &grandchildren {
            self.nodes.get_mut(child)?.parent_id = Some(parent.clone());
        }
        if &self.current == id {
            self.current = parent.clone();
        }
        for entry in self.hoisted.iter_mut().filter(|h| *h == id) {
            *entry = parent.clone();
        }
        debug!(target: "state.mutate", merged = %id, into = %parent, adopted = grandchildren.len(), "merge_with_parent");
        Ok(parent)
    }

    /// Delete `ids` and their descendants.
    ///
    /// Unknown ids abort the whole call. An id whose removal would leave no
    /// root is refused individually and the rest proceed. When `current` is
    /// removed it moves to the next surviving sibling (wrapping from its
    /// original index), else the nearest surviving ancestor, else the first
    /// surviving root.
    pub fn delete(&mut self, ids: &[NodeId]) -> TreeResult<DeleteReport> {
        for id in ids {
            self.nodes.get(id)?;
        }

        let mut report = DeleteReport::default();
        let mut roots_alive = self.nodes.roots();
        let mut accepted: Vec<&NodeId> = Vec::new();
        for id in ids {
            if accepted.contains(&id) {
                continue;
            }
            if self.nodes.get(id)?.is_root() {
                if roots_alive.iter().all(|r| r == id) {
                    report
                        .rejected
                        .push(TreeError::CannotDeleteLastRoot(id.clone()));
                    continue;
                }
                roots_alive.retain(|r| r != id);
            }
            accepted.push(id);
        }

        let mut closure: HashSet<NodeId> = HashSet::new();
        let mut ordered: Vec<NodeId> = Vec::new();
        for id in &accepted {
            if closure.insert((*id).clone()) {
                ordered.push((*id).clone());
            }
            for desc in self.nodes.descendants(id)? {
                if closure.insert(desc.clone()) {
                    ordered.push(desc);
                }
            }
        }

        let fallback = if closure.contains(&self.current) {
            let target = self.fallback_for_current(&closure)?;
            Some(target.ok_or_else(|| TreeError::CorruptTree(self.current.clone()))?)
        } else {
            None
        };

        // Everything is known; apply.
        for id in &ordered {
            self.nodes.remove(id);
        }
        self.hoisted.retain(|h| !closure.contains(h));
        if let Some(target) = fallback.clone() {
            self.current = target;
        }
        debug!(
            target: "state.mutate",
            requested = ids.len(),
            removed = ordered.len(),
            rejected = report.rejected.len(),
            current_moved = fallback.is_some(),
            "delete"
        );
        report.removed = ordered;
        report.new_current = fallback;
        Ok(report)
    }

    fn fallback_for_current(&self, doomed: &HashSet<NodeId>) -> TreeResult<Option<NodeId>> {
        let siblings = self.nodes.siblings(&self.current)?;
        if let Some(idx) = siblings.iter().position(|s| s == &self.current) {
            let n = siblings.len();
            if let Some(next) = (1..n)
                .map(|step| &siblings[(idx + step) % n])
                .find(|s| !doomed.contains(*s))
            {
                return Ok(Some(next.clone()));
            }
        }
        let ancestors = self.nodes.ancestors(&self.current)?;
        if let Some(anc) = ancestors.iter().rev().find(|a| !doomed.contains(*a)) {
            return Ok(Some(anc.clone()));
        }
        Ok(self.nodes.roots().into_iter().find(|r| !doomed.contains(r)))
    }

    /// Delete every child of `id`.
    pub fn clear_children(&mut self, id: &NodeId) -> TreeResult<DeleteReport> {
        self.nodes.get(id)?;
        let children = self.nodes.children(id);
        self.delete(&children)
    }

    /// Delete every sibling of `id`, keeping `id`.
    pub fn clear_siblings(&mut self, id: &NodeId) -> TreeResult<DeleteReport> {
        let others: Vec<NodeId> = self
            .nodes
            .siblings(id)?
            .into_iter()
            .filter(|s| s != id)
            .collect();
        self.delete(&others)
    }

    /// Flip the collapsed flag; returns the new value.
    pub fn toggle_collapse(&mut self, id: &NodeId) -> TreeResult<bool> {
        let node = self.nodes.get_mut(id)?;
        node.collapsed = !node.collapsed;
        Ok(node.collapsed)
    }

    /// Flip the bookmark flag; returns the new value.
    pub fn toggle_bookmark(&mut self, id: &NodeId) -> TreeResult<bool> {
        let node = self.nodes.get_mut(id)?;
        node.bookmarked = !node.bookmarked;
        Ok(node.bookmarked)
    }

    /// Attach one unread child per completion under `parent`.
    pub fn attach_completions(&mut self, parent: &NodeId, texts: Vec<String>) -> TreeResult<Vec<NodeId>> {
        self.nodes.get(parent)?;
        let mut created = Vec::with_capacity(texts.len());
        for text in texts {
            let mut node = Node::new(text, Some(parent.clone()));
            node.unread = true;
            created.push(self.nodes.insert(node)?);
        }
        debug!(target: "state.mutate", parent = %parent, count = created.len(), "attach_completions");
        Ok(created)
    }

    /// Narrow rendering to the subtree under `id`.
    pub fn hoist(&mut self, id: &NodeId) -> TreeResult<()> {
        self.nodes.get(id)?;
        self.hoisted.push(id.clone());
        Ok(())
    }

    /// Pop the innermost hoist; `None` when nothing is hoisted.
    pub fn unhoist(&mut self) -> Option<NodeId> {
        self.hoisted.pop()
    }

    /// Mark a node visited right now.
    pub(crate) fn touch(&mut self, id: &NodeId) -> TreeResult<()> {
        let node = self.nodes.get_mut(id)?;
        node.unread = false;
        node.last_visited = Some(now_millis());
        Ok(())
    }
}
