//! Generation lifecycle: `Idle -> Generating(root) -> Idle` per document.
//!
//! Design Notes:
//! - `begin_*` validate, mark the document as generating, and hand back a
//!   [`PendingGeneration`] holding everything the request needs. The runtime
//!   runs it off-loop and posts the outcome back as a `GenerationDone`.
//! - A request while one is in flight is refused with a notice and no change.
//! - [`finish_generation`] clears the marker whatever the outcome. Results for
//!   a root deleted in the meantime are dropped silently.

use crate::dispatcher::{DispatchResult, document_mut, materialize, sync_buffer};
use crate::ActionError;
use core_config::Settings;
use core_events::GenerationDone;
use core_state::{BreakOutcome, Workspace};
use core_text::HostBuffer;
use core_tree::NodeId;
use tracing::{debug, info, warn};

const BUSY_NOTICE: &str = "a generation is already in progress";

/// Everything a detached generation task needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingGeneration {
    pub document: String,
    pub root: NodeId,
    /// `full_text(root)` at request time.
    pub path_text: String,
    pub settings: Settings,
}

/// Mark `root` as generating and build the request ticket. `None` when a
/// generation is already running for this document.
pub fn begin_generation(
    ws: &mut Workspace,
    key: &str,
    root: &NodeId,
) -> Result<Option<PendingGeneration>, ActionError> {
    let settings = ws.settings().clone();
    let doc = document_mut(ws, key)?;
    if let Some(running) = doc.generating() {
        info!(target: "actions.generation", key, running = %running, "generation_rejected_busy");
        return Ok(None);
    }
    let path_text = doc.nodes().full_text(root)?;
    doc.set_generating(Some(root.clone()));
    info!(target: "actions.generation", key, root = %root, prompt_bytes = path_text.len(), "generation_begin");
    Ok(Some(PendingGeneration {
        document: key.to_string(),
        root: root.clone(),
        path_text,
        settings,
    }))
}

fn pending_result(pending: Option<PendingGeneration>) -> DispatchResult {
    match pending {
        Some(p) => DispatchResult {
            dirty: true,
            pending: Some(p),
            ..DispatchResult::default()
        },
        None => DispatchResult::clean().with_notice(BUSY_NOTICE),
    }
}

/// Continue the text before the cursor. A cursor inside the active path
/// splits the owning node first so the new branches hang off the cursor.
pub(crate) fn begin_complete(
    ws: &mut Workspace,
    key: &str,
    host: &dyn HostBuffer,
) -> Result<DispatchResult, ActionError> {
    let doc = document_mut(ws, key)?;
    if doc.generating().is_some() {
        return Ok(DispatchResult::clean().with_notice(BUSY_NOTICE));
    }
    let root = match doc.break_at_point(host.cursor())? {
        BreakOutcome::AtEnd(current) => current,
        BreakOutcome::Split { before, .. } => before,
        BreakOutcome::AtNodeStart(node) => match doc.node(&node)?.parent_id.clone() {
            Some(parent) => parent,
            None => {
                return Ok(DispatchResult::clean().with_notice("nothing before the cursor to continue"));
            }
        },
    };
    Ok(pending_result(begin_generation(ws, key, &root)?))
}

/// Generate alternatives to the active node: new children of its parent.
pub(crate) fn begin_siblings(ws: &mut Workspace, key: &str) -> Result<DispatchResult, ActionError> {
    let doc = document_mut(ws, key)?;
    let current = doc.current().clone();
    let Some(parent) = doc.node(&current)?.parent_id.clone() else {
        return Ok(DispatchResult::clean().with_notice("a root node has no siblings to generate"));
    };
    Ok(pending_result(begin_generation(ws, key, &parent)?))
}

/// Attach a finished generation. `host` must be the buffer of `done.document`.
pub fn finish_generation(
    ws: &mut Workspace,
    done: GenerationDone,
    host: &mut dyn HostBuffer,
) -> Result<DispatchResult, ActionError> {
    let key = done.document.as_str();
    let Some(doc) = ws.document_mut(key) else {
        debug!(target: "actions.generation", key, "generation_document_gone");
        return Ok(DispatchResult::clean());
    };
    doc.set_generating(None);
    sync_buffer(ws, key, host)?;
    let doc = document_mut(ws, key)?;

    let texts = match done.result {
        Ok(texts) => texts,
        Err(e) => {
            warn!(target: "actions.generation", key, root = %done.root, error = %e, "generation_failed");
            return Err(e.into());
        }
    };
    if !doc.nodes().contains(&done.root) {
        debug!(target: "actions.generation", key, root = %done.root, "generation_root_deleted");
        return Ok(DispatchResult::dirty());
    }

    let created = doc.attach_completions(&done.root, texts)?;
    let current = doc.current().clone();
    let follows = current == done.root || doc.nodes().is_ancestor_of(&done.root, &current)?;
    info!(target: "actions.generation", key, root = %done.root, created = created.len(), focus = follows, "generation_attached");

    let notice = format!("{} new branches", created.len());
    let result = match created.first() {
        Some(first) if follows => {
            let outcome = doc.switch_to(first)?;
            materialize(host, &outcome.text)
        }
        _ => DispatchResult::dirty(),
    };
    Ok(result.with_notice(notice))
}
