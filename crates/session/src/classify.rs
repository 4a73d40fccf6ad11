use texter_mutations::{MutationError, ASSIGNMENT_CHANGED};

use crate::error::{Recovery, SessionError};

/// Convert a backend failure into what the session surfaces.
///
/// Reassignment short-circuits to [`SessionError::Reassigned`], whose
/// directive sends the host back to the worklist. Rejections keep their
/// message and gain a "Back to Todos" recovery when the assignment moved.
/// Everything else is transient and shown generically.
pub fn classify(err: MutationError) -> SessionError {
    match err {
        MutationError::Reassigned { message } => {
            tracing::warn!(%message, "contact reassigned; leaving contact");
            SessionError::Reassigned { message }
        }
        MutationError::Rejected { message } => {
            let recovery = (message == ASSIGNMENT_CHANGED).then_some(Recovery::BackToTodos);
            tracing::warn!(%message, ?recovery, "mutation rejected");
            SessionError::Rejected { message, recovery }
        }
        MutationError::Failed { status, message } => {
            tracing::error!(?status, error = %message, "mutation failed");
            SessionError::Transient {
                status,
                detail: message,
            }
        }
    }
}
