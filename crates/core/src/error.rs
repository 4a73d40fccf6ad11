use std::fmt;

use serde::Serialize;

/// Which of the two edge kinds a reference travels along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
    /// Ownership edge, `parentId`.
    Parent,
    /// Traversal edge, an answer option's `nextInteractionStepId`.
    NextStep,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Parent => write!(f, "parentId"),
            EdgeKind::NextStep => write!(f, "nextInteractionStepId"),
        }
    }
}

/// Data-integrity errors in an interaction-step tree, plus misuse of the
/// editor against step ids the tree does not know.
///
/// Everything except `UnknownStep` and `NotAQuestion` means the campaign
/// configuration is corrupt; see [`TreeError::is_fatal`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Zero or several parentless steps, or steps not owned by the root.
    #[error("malformed interaction-step tree: {reason}")]
    MalformedTree { reason: String },

    /// An edge names a step id that is not in the tree.
    #[error("interaction step {step_id} references unknown step {target} via {edge}")]
    DanglingReference {
        step_id: String,
        target: String,
        edge: EdgeKind,
    },

    /// Two steps share one id.
    #[error("duplicate interaction step id: {step_id}")]
    DuplicateStep { step_id: String },

    /// Answer options lead back to a step already on the path.
    #[error("answer options form a cycle through interaction step {step_id}")]
    Cycle { step_id: String },

    #[error("unknown interaction step: {step_id}")]
    UnknownStep { step_id: String },

    #[error("interaction step {step_id} has no question to answer")]
    NotAQuestion { step_id: String },
}

impl TreeError {
    /// Corrupt-configuration errors end the session; the rest are caller bugs
    /// that leave the session usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TreeError::UnknownStep { .. } | TreeError::NotAQuestion { .. }
        )
    }
}
