//! Applies a buffer diff plan to the tree.
//!
//! The planner in `core_text::reconcile` is pure; this module resolves the
//! active path, asks for a plan, and performs the writes it describes. After
//! any outcome other than an error, `active_text()` equals the buffer.

use crate::Document;
use core_text::reconcile::{EditPolicy, ReconcilePlan, plan};
use core_tree::{Node, NodeId, TreeResult};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Unchanged,
    /// Segments edited in place, root first.
    Rewritten(Vec<NodeId>),
    /// A fresh branch was created; `current` moved to its last node.
    Branched { fork: NodeId, current: NodeId },
}

impl Document {
    /// Bring the active path in line with `buffer`.
    pub fn reconcile(&mut self, buffer: &str, policy: EditPolicy) -> TreeResult<ReconcileOutcome> {
        let family = self.nodes.family(&self.current)?;
        let texts: Vec<String> = family
            .iter()
            .map(|id| self.nodes.get(id).map(|n| n.text.clone()))
            .collect::<TreeResult<_>>()?;
        let leaf_has_children = !self.nodes.children(&self.current).is_empty();

        match plan(texts.as_slice(), buffer, policy, leaf_has_children) {
            ReconcilePlan::Unchanged => Ok(ReconcileOutcome::Unchanged),
            ReconcilePlan::Rewrite { first, last, text } => {
                let touched: Vec<NodeId> = family[first..=last].to_vec();
                let mut replacement = Some(text);
                for id in &touched {
                    self.nodes.get_mut(id)?.text = replacement.take().unwrap_or_default();
                }
                debug!(target: "state.reconcile", first, last, "rewrite");
                Ok(ReconcileOutcome::Rewritten(touched))
            }
            ReconcilePlan::Branch {
                at,
                text,
                replay_from,
            } => {
                let parent = self.nodes.get(&family[at])?.parent_id.clone();
                let fork = self.nodes.insert(Node::new(text, parent))?;
                let mut tip = fork.clone();
                for source in &texts[replay_from.min(texts.len())..] {
                    tip = self.nodes.insert(Node::new(source.clone(), Some(tip)))?;
                }
                self.touch(&tip)?;
                self.current = tip.clone();
                debug!(target: "state.reconcile", at, replay_from, fork = %fork, "branch");
                Ok(ReconcileOutcome::Branched { fork, current: tip })
            }
        }
    }
}
