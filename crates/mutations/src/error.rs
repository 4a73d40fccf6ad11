/// Rejection text the backend uses when the contact moved to another texter.
pub const ASSIGNMENT_CHANGED: &str = "Your assignment has changed";

/// All errors a `TexterMutations` implementation can return.
///
/// The variants are the coarse classifier the session layer consumes; the
/// transport details behind them stay inside the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// The contact's assignment no longer belongs to the acting texter.
    /// Continuing to act on the contact is unsafe.
    #[error("contact reassigned: {message}")]
    Reassigned { message: String },

    /// A business rule rejected the mutation. `message` is shown to the user.
    #[error("rejected: {message}")]
    Rejected { message: String },

    /// Anything else: transport failure, server error, serialization.
    #[error("mutation failed: {message}")]
    Failed {
        status: Option<u16>,
        message: String,
    },
}

impl MutationError {
    /// Classify an HTTP-like status: 402 means reassigned, 400 means a
    /// business-rule rejection, everything else is unclassified.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            402 => MutationError::Reassigned { message },
            400 => MutationError::Rejected { message },
            _ => MutationError::Failed {
                status: Some(status),
                message,
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            MutationError::Reassigned { .. } => Some(402),
            MutationError::Rejected { .. } => Some(400),
            MutationError::Failed { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            MutationError::Reassigned { message }
            | MutationError::Rejected { message }
            | MutationError::Failed { message, .. } => message,
        }
    }
}
