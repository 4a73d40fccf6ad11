use serde::Serialize;
use texter_core::TreeError;

/// Text shown for any failure the session cannot classify.
pub const GENERIC_FAILURE: &str = "Something went wrong!";
/// Text shown when a send is attempted with an empty draft.
pub const EMPTY_MESSAGE: &str = "Can't send empty message";

/// A follow-up the user may take after a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recovery {
    BackToTodos,
}

impl Recovery {
    pub fn label(&self) -> &'static str {
        match self {
            Recovery::BackToTodos => "Back to Todos",
        }
    }
}

/// Navigation the host must perform without asking the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Directive {
    ExitToWorklist,
}

/// All errors a contact session can surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// Local validation failed; nothing was sent and no state changed.
    #[error("{0}")]
    Validation(String),

    /// The contact no longer belongs to this texter.
    #[error("contact reassigned: {message}")]
    Reassigned { message: String },

    /// The backend refused the action for a business reason.
    #[error("{message}")]
    Rejected {
        message: String,
        recovery: Option<Recovery>,
    },

    /// Unexpected failure; `detail` is for logs, not for the user.
    #[error("{}", GENERIC_FAILURE)]
    Transient {
        status: Option<u16>,
        detail: String,
    },

    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Another action on this contact is still in flight.
    #[error("an action is already in flight for this contact")]
    Busy,

    /// The contact's last action already completed.
    #[error("this contact is already finished")]
    Finished,

    /// The contact opted out; nothing more may be sent to it.
    #[error("contact has opted out")]
    OptedOut,
}

impl SessionError {
    pub fn directive(&self) -> Option<Directive> {
        match self {
            SessionError::Reassigned { .. } => Some(Directive::ExitToWorklist),
            _ => None,
        }
    }

    pub fn recovery(&self) -> Option<Recovery> {
        match self {
            SessionError::Rejected { recovery, .. } => *recovery,
            _ => None,
        }
    }

    /// Corrupt campaign data; the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Tree(e) if e.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_hides_detail() {
        let err = SessionError::Transient {
            status: Some(500),
            detail: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), GENERIC_FAILURE);
        assert_eq!(err.directive(), None);
    }

    #[test]
    fn only_structural_tree_errors_are_fatal() {
        let malformed = SessionError::Tree(TreeError::MalformedTree {
            reason: "no root".to_string(),
        });
        assert!(malformed.is_fatal());
        let unknown = SessionError::Tree(TreeError::UnknownStep {
            step_id: "x".to_string(),
        });
        assert!(!unknown.is_fatal());
        assert!(!SessionError::Busy.is_fatal());
    }
}
