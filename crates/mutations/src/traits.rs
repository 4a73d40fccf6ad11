use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::MutationError;
use crate::record::{
    ContactStatus, MessageInput, OptOutInput, OptOutRecord, QuestionResponseInput, SendReceipt,
};
use texter_interchange::MessageRecord;

/// The backend operations a texting session drives.
///
/// Each call is one network round trip in a real deployment. The session
/// awaits them strictly one after another, so implementations never see two
/// calls for the same contact in flight from one session.
///
/// ## Errors
///
/// Failures are reported through [`MutationError`]'s three classes. A
/// backend that learns the contact is no longer assigned to the caller
/// returns `Reassigned`; a business-rule refusal returns `Rejected` with a
/// user-facing message; everything else is `Failed`.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a session can hold
/// them behind an `Arc` across task boundaries.
#[async_trait]
pub trait TexterMutations: Send + Sync + 'static {
    // ── Mutations ────────────────────────────────────────────────────────────

    /// Send a message to the contact.
    async fn send_message(
        &self,
        contact_id: &str,
        message: MessageInput,
    ) -> Result<SendReceipt, MutationError>;

    /// Record that the contact's cell must not be texted again.
    async fn create_opt_out(
        &self,
        contact_id: &str,
        opt_out: OptOutInput,
    ) -> Result<OptOutRecord, MutationError>;

    /// Upsert survey answers. An existing answer for the same step is replaced.
    async fn update_question_responses(
        &self,
        contact_id: &str,
        responses: Vec<QuestionResponseInput>,
    ) -> Result<(), MutationError>;

    /// Delete survey answers for the given steps. Unknown steps are ignored.
    async fn delete_question_responses(
        &self,
        contact_id: &str,
        interaction_step_ids: Vec<String>,
    ) -> Result<(), MutationError>;

    /// Move the contact to another worklist status.
    async fn edit_contact_status(
        &self,
        contact_id: &str,
        status: ContactStatus,
    ) -> Result<(), MutationError>;

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Persisted answers for the contact, step id to value.
    async fn question_responses(
        &self,
        contact_id: &str,
    ) -> Result<BTreeMap<String, String>, MutationError>;

    /// The contact's status; `NeedsMessage` for a contact never touched.
    async fn contact_status(&self, contact_id: &str) -> Result<ContactStatus, MutationError>;

    /// The conversation so far, oldest first.
    async fn messages(&self, contact_id: &str) -> Result<Vec<MessageRecord>, MutationError>;

    /// The opt-out record for a cell, if any.
    async fn opt_out(&self, cell: &str) -> Result<Option<OptOutRecord>, MutationError>;
}
