//! Command surface of the Loom engine.
//!
//! Every user-facing operation is a [`Command`] routed through
//! [`dispatcher::dispatch`]. Dispatch first reconciles the host buffer into the
//! document so no edit is lost, then runs the command, then writes the new
//! active-path text back to the host when it changed.
//!
//! Generation is split in two: `dispatch` returns a [`PendingGeneration`]
//! ticket for the runtime to execute off-loop, and
//! [`generation::finish_generation`] attaches the outcome when it comes back.

use core_config::SettingError;
use core_provider::CompletionError;
use core_state::PersistError;
use core_tree::{NodeId, TreeError};
use std::path::PathBuf;
use thiserror::Error;

pub mod dispatcher;
pub mod generation;
pub mod io_ops;
pub mod tree_view;

pub use dispatcher::command_parser::{CommandParser, ParsedCommand};
pub use dispatcher::{DispatchResult, dispatch, sync_buffer};
pub use generation::{PendingGeneration, begin_generation, finish_generation};

/// A single operation on the active document.
///
/// `Option<NodeId>` targets default to the active node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate continuations of the text before the cursor.
    Complete,
    /// Generate alternatives to the active node under its parent.
    GenerateSiblings,
    CreateChild,
    CreateSibling,
    Clone,
    SplitAtPoint,
    BranchAtPoint,
    MergeWithParent,
    /// Empty list deletes the active node.
    Delete(Vec<NodeId>),
    ClearChildren,
    ClearSiblings,
    SwitchTo(NodeId),
    SwitchToParent,
    SwitchToChild,
    SwitchToNextSibling,
    SwitchToPrevSibling,
    ToggleCollapse(Option<NodeId>),
    ToggleBookmark(Option<NodeId>),
    Hoist(Option<NodeId>),
    Unhoist,
    SetSetting { key: String, value: String },
    Import(PathBuf),
    Export(PathBuf),
    /// Empty term clears search state.
    Search(String),
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Setting(#[from] SettingError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no document open for {0}")]
    NoDocument(String),
}
