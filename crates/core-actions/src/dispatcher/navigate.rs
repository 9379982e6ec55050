//! Switching commands. A missing target is a no-op.

use super::{DispatchResult, materialize};
use crate::{ActionError, Command};
use core_state::Document;
use core_text::HostBuffer;
use core_tree::NodeId;

pub(super) fn handle(
    cmd: Command,
    doc: &mut Document,
    host: &mut dyn HostBuffer,
) -> Result<DispatchResult, ActionError> {
    let target = match cmd {
        Command::SwitchTo(id) => Some(id),
        Command::SwitchToParent => doc.parent_target()?,
        Command::SwitchToChild => doc.child_target()?,
        Command::SwitchToNextSibling => doc.sibling_target(1)?,
        Command::SwitchToPrevSibling => doc.sibling_target(-1)?,
        _ => None,
    };
    match target {
        Some(id) => switch(doc, &id, host),
        None => Ok(DispatchResult::clean()),
    }
}

/// Switch the document to `id` and mirror the new path into the host.
pub(crate) fn switch(
    doc: &mut Document,
    id: &NodeId,
    host: &mut dyn HostBuffer,
) -> Result<DispatchResult, ActionError> {
    let outcome = doc.switch_to(id)?;
    Ok(materialize(host, &outcome.text))
}
