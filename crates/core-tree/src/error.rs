use crate::NodeId;
use thiserror::Error;

/// Structural failures. Every variant aborts the single operation that raised
/// it before any mutation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("cannot merge: {0}")]
    CannotMerge(MergeBlock),
    #[error("cannot delete the last root: {0}")]
    CannotDeleteLastRoot(NodeId),
    #[error("corrupt tree at {0}: cycle or dangling parent")]
    CorruptTree(NodeId),
}

/// Reason a merge-with-parent precondition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MergeBlock {
    #[error("no parent")]
    NoParent,
    #[error("has siblings")]
    HasSiblings,
}

pub type TreeResult<T> = Result<T, TreeError>;
