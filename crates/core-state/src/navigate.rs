//! Active-path switching and traversal targets.
//!
//! Design Notes:
//! - `switch_to` only updates document state and reports the before/after
//!   path text; writing the buffer is the caller's job (it owns the host).
//! - Traversal helpers resolve a target id and return `None` when there is
//!   nowhere to go, so callers can treat "no target" as a no-op.

use crate::Document;
use core_tree::{NodeId, TreeResult};
use tracing::trace;

/// Text of the active path before and after a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchOutcome {
    pub previous_text: String,
    pub text: String,
}

impl SwitchOutcome {
    /// Whether everything before `offset` in the old text survives in the new one.
    pub fn prefix_unchanged(&self, offset: usize) -> bool {
        preceding_text_unchanged(&self.previous_text, &self.text, offset)
    }
}

/// True when `old[..offset]` is also a prefix of `new`. Offsets past the end
/// of `old`, or not on a char boundary, count as changed.
pub fn preceding_text_unchanged(old: &str, new: &str, offset: usize) -> bool {
    match old.get(..offset) {
        Some(prefix) => new.starts_with(prefix),
        None => false,
    }
}

impl Document {
    /// Make `id` the active node: mark it read and visited, and expand every
    /// ancestor so the path is visible.
    pub fn switch_to(&mut self, id: &NodeId) -> TreeResult<SwitchOutcome> {
        let ancestors = self.nodes.ancestors(id)?;
        let previous_text = self.active_text()?;
        for anc in &ancestors {
            self.nodes.get_mut(anc)?.collapsed = false;
        }
        self.touch(id)?;
        self.current = id.clone();
        let text = self.nodes.full_text(id)?;
        trace!(target: "state.navigate", to = %id, depth = ancestors.len(), "switch_to");
        Ok(SwitchOutcome {
            previous_text,
            text,
        })
    }

    pub fn parent_target(&self) -> TreeResult<Option<NodeId>> {
        Ok(self.nodes.get(&self.current)?.parent_id.clone())
    }

    /// Most recently visited child of `current`, else its first child.
    pub fn child_target(&self) -> TreeResult<Option<NodeId>> {
        let children = self.nodes.children(&self.current);
        let mut best: Option<(&NodeId, i64)> = None;
        for child in &children {
            if let Some(ts) = self.nodes.get(child)?.last_visited
                && best.is_none_or(|(_, b)| ts > b)
            {
                best = Some((child, ts));
            }
        }
        Ok(best
            .map(|(c, _)| c.clone())
            .or_else(|| children.first().cloned()))
    }

    /// Sibling `step` positions away from `current`, wrapping. `None` for an only child.
    pub fn sibling_target(&self, step: isize) -> TreeResult<Option<NodeId>> {
        let siblings = self.nodes.siblings(&self.current)?;
        let n = siblings.len();
        if n < 2 {
            return Ok(None);
        }
        let Some(idx) = siblings.iter().position(|s| s == &self.current) else {
            return Ok(None);
        };
        let next = (idx as isize + step).rem_euclid(n as isize) as usize;
        Ok(Some(siblings[next].clone()))
    }
}
