//! Dispatcher applying a [`Command`] to a workspace document and its host buffer.
//!
//! Sub-modules:
//! * `structure`      - create / clone / split / merge / delete, flags, hoist
//! * `navigate`       - active-path switching
//! * `command_parser` - `:name args` lines to [`Command`]s
//!
//! Every call starts with [`sync_buffer`] so the tree reflects the host before
//! the command reads it, and ends with the host showing `active_text()`.

use crate::generation::{self, PendingGeneration};
use crate::{ActionError, Command, io_ops};
use core_state::{Document, ReconcileOutcome, Workspace, preceding_text_unchanged};
use core_text::HostBuffer;
use tracing::{debug, trace};

pub mod command_parser;
mod navigate;
mod structure;

/// Result of dispatching a single [`Command`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchResult {
    /// Document or settings changed and should be persisted.
    pub dirty: bool,
    /// The host buffer's text was rewritten.
    pub buffer_replaced: bool,
    /// Short message for the user.
    pub notice: Option<String>,
    /// Generation the runtime should start.
    pub pending: Option<PendingGeneration>,
}

impl DispatchResult {
    pub fn dirty() -> Self {
        Self {
            dirty: true,
            ..Self::default()
        }
    }
    pub fn clean() -> Self {
        Self::default()
    }
    pub fn buffer_replaced() -> Self {
        Self {
            dirty: true,
            buffer_replaced: true,
            ..Self::default()
        }
    }
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

pub(crate) fn document_mut<'a>(ws: &'a mut Workspace, key: &str) -> Result<&'a mut Document, ActionError> {
    ws.document_mut(key)
        .ok_or_else(|| ActionError::NoDocument(key.to_string()))
}

/// Reconcile the host's current text into the document.
pub fn sync_buffer(
    ws: &mut Workspace,
    key: &str,
    host: &dyn HostBuffer,
) -> Result<ReconcileOutcome, ActionError> {
    let policy = ws.edit_policy();
    let doc = document_mut(ws, key)?;
    let outcome = doc.reconcile(&host.value(), policy)?;
    if !matches!(outcome, ReconcileOutcome::Unchanged) {
        trace!(target: "actions.dispatch", key, ?outcome, "buffer_synced");
    }
    Ok(outcome)
}

/// Show `text` in the host. The cursor stays put when everything before it
/// is unchanged and moves to the end otherwise.
pub(crate) fn materialize(host: &mut dyn HostBuffer, text: &str) -> DispatchResult {
    let old = host.value();
    if old == text {
        return DispatchResult::dirty();
    }
    let cursor = host.cursor();
    let keep = preceding_text_unchanged(&old, text, cursor);
    host.set_value(text);
    host.set_cursor(if keep { cursor } else { text.len() });
    DispatchResult::buffer_replaced()
}

/// Apply `cmd` to document `key`, keeping `host` synchronized.
pub fn dispatch(
    cmd: Command,
    ws: &mut Workspace,
    key: &str,
    host: &mut dyn HostBuffer,
) -> Result<DispatchResult, ActionError> {
    sync_buffer(ws, key, host)?;
    debug!(target: "actions.dispatch", key, ?cmd, "dispatch");

    match cmd {
        Command::Complete => generation::begin_complete(ws, key, host),
        Command::GenerateSiblings => generation::begin_siblings(ws, key),
        Command::SetSetting { key: name, value } => {
            ws.settings_mut().set(&name, &value)?;
            Ok(DispatchResult::dirty().with_notice(format!("{name} = {value}")))
        }
        Command::Import(path) => {
            io_ops::import_file(ws, key, &path)?;
            let text = document_mut(ws, key)?.active_text()?;
            Ok(materialize(host, &text).with_notice(format!("imported {}", path.display())))
        }
        Command::Export(path) => {
            io_ops::export_file(ws, key, &path)?;
            Ok(DispatchResult::clean().with_notice(format!("exported {}", path.display())))
        }
        Command::SwitchTo(_)
        | Command::SwitchToParent
        | Command::SwitchToChild
        | Command::SwitchToNextSibling
        | Command::SwitchToPrevSibling => navigate::handle(cmd, document_mut(ws, key)?, host),
        other => structure::handle(other, document_mut(ws, key)?, host),
    }
}
