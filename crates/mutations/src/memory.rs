//! In-memory reference backend.
//!
//! Keeps every contact's conversation, status and answers in process, and
//! records a journal of every call (successful or not) in arrival order.
//! Used by the CLI's dry runs and by tests. Two knobs mimic a real server:
//!
//! - [`InMemoryMutations::assign`] pins a contact to an assignment; a send
//!   carrying another assignment id is rejected with [`ASSIGNMENT_CHANGED`].
//! - [`InMemoryMutations::fail_next`] makes the next call of one operation
//!   fail with a given error, once.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{MutationError, ASSIGNMENT_CHANGED};
use crate::record::{
    ContactStatus, MessageInput, OptOutInput, OptOutRecord, QuestionResponseInput, SendReceipt,
};
use crate::traits::TexterMutations;
use texter_interchange::MessageRecord;

/// The mutating operations of [`TexterMutations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SendMessage,
    CreateOptOut,
    UpdateQuestionResponses,
    DeleteQuestionResponses,
    EditContactStatus,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SendMessage => "send_message",
            Operation::CreateOptOut => "create_opt_out",
            Operation::UpdateQuestionResponses => "update_question_responses",
            Operation::DeleteQuestionResponses => "delete_question_responses",
            Operation::EditContactStatus => "edit_contact_status",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send_message" => Ok(Operation::SendMessage),
            "create_opt_out" => Ok(Operation::CreateOptOut),
            "update_question_responses" => Ok(Operation::UpdateQuestionResponses),
            "delete_question_responses" => Ok(Operation::DeleteQuestionResponses),
            "edit_contact_status" => Ok(Operation::EditContactStatus),
            other => Err(format!("unknown operation '{}'", other)),
        }
    }
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationCall {
    pub operation: Operation,
    pub contact_id: String,
    /// Operation arguments as JSON.
    pub detail: serde_json::Value,
    /// `None` on success, the error text otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Default)]
struct State {
    assignments: HashMap<String, String>,
    messages: HashMap<String, Vec<MessageRecord>>,
    statuses: HashMap<String, ContactStatus>,
    responses: HashMap<String, BTreeMap<String, String>>,
    opt_outs: HashMap<String, OptOutRecord>,
    faults: HashMap<Operation, MutationError>,
    journal: Vec<MutationCall>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    /// Consume an injected fault and journal the call either way.
    fn begin(
        &mut self,
        operation: Operation,
        contact_id: &str,
        detail: serde_json::Value,
    ) -> Result<(), MutationError> {
        let fault = self.faults.remove(&operation);
        tracing::debug!(
            operation = %operation,
            contact = contact_id,
            injected_fault = fault.is_some(),
            "mutation"
        );
        self.journal.push(MutationCall {
            operation,
            contact_id: contact_id.to_string(),
            detail,
            error: fault.as_ref().map(|e| e.to_string()),
        });
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fail_last(&mut self, err: MutationError) -> MutationError {
        if let Some(call) = self.journal.last_mut() {
            call.error = Some(err.to_string());
        }
        err
    }
}

#[derive(Default)]
pub struct InMemoryMutations {
    state: Mutex<State>,
}

impl InMemoryMutations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `contact_id` to `assignment_id`.
    pub async fn assign(&self, contact_id: &str, assignment_id: &str) {
        self.state
            .lock()
            .await
            .assignments
            .insert(contact_id.to_string(), assignment_id.to_string());
    }

    /// Set a contact's status without journaling a call.
    pub async fn seed_status(&self, contact_id: &str, status: ContactStatus) {
        self.state
            .lock()
            .await
            .statuses
            .insert(contact_id.to_string(), status);
    }

    /// Make the next call of `operation` fail with `err`.
    pub async fn fail_next(&self, operation: Operation, err: MutationError) {
        self.state.lock().await.faults.insert(operation, err);
    }

    /// Every call so far, in arrival order.
    pub async fn calls(&self) -> Vec<MutationCall> {
        self.state.lock().await.journal.clone()
    }

    /// Number of calls (successful or not) of one operation.
    pub async fn count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .await
            .journal
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }
}

fn to_detail<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[async_trait]
impl TexterMutations for InMemoryMutations {
    async fn send_message(
        &self,
        contact_id: &str,
        message: MessageInput,
    ) -> Result<SendReceipt, MutationError> {
        let mut state = self.state.lock().await;
        state.begin(Operation::SendMessage, contact_id, to_detail(&message))?;

        if let Some(owner) = state.assignments.get(contact_id) {
            if *owner != message.assignment_id {
                let err = MutationError::Rejected {
                    message: ASSIGNMENT_CHANGED.to_string(),
                };
                return Err(state.fail_last(err));
            }
        }

        let id = state.next_id("msg");
        let status = state
            .statuses
            .get(contact_id)
            .copied()
            .unwrap_or(ContactStatus::NeedsMessage)
            .after_send();
        state.statuses.insert(contact_id.to_string(), status);
        let conversation = state.messages.entry(contact_id.to_string()).or_default();
        conversation.push(MessageRecord {
            id,
            created_at: None,
            text: message.text,
            is_from_contact: false,
        });

        Ok(SendReceipt {
            contact_id: contact_id.to_string(),
            message_status: status,
            messages: conversation.clone(),
        })
    }

    async fn create_opt_out(
        &self,
        contact_id: &str,
        opt_out: OptOutInput,
    ) -> Result<OptOutRecord, MutationError> {
        let mut state = self.state.lock().await;
        state.begin(Operation::CreateOptOut, contact_id, to_detail(&opt_out))?;

        if let Some(existing) = state.opt_outs.get(&opt_out.cell) {
            return Ok(existing.clone());
        }
        let record = OptOutRecord {
            id: state.next_id("optout"),
            cell: opt_out.cell.clone(),
            assignment_id: opt_out.assignment_id,
        };
        state.opt_outs.insert(opt_out.cell, record.clone());
        Ok(record)
    }

    async fn update_question_responses(
        &self,
        contact_id: &str,
        responses: Vec<QuestionResponseInput>,
    ) -> Result<(), MutationError> {
        let mut state = self.state.lock().await;
        state.begin(
            Operation::UpdateQuestionResponses,
            contact_id,
            to_detail(&responses),
        )?;

        let stored = state.responses.entry(contact_id.to_string()).or_default();
        for r in responses {
            stored.insert(r.interaction_step_id, r.value);
        }
        Ok(())
    }

    async fn delete_question_responses(
        &self,
        contact_id: &str,
        interaction_step_ids: Vec<String>,
    ) -> Result<(), MutationError> {
        let mut state = self.state.lock().await;
        state.begin(
            Operation::DeleteQuestionResponses,
            contact_id,
            to_detail(&interaction_step_ids),
        )?;

        if let Some(stored) = state.responses.get_mut(contact_id) {
            for id in &interaction_step_ids {
                stored.remove(id);
            }
        }
        Ok(())
    }

    async fn edit_contact_status(
        &self,
        contact_id: &str,
        status: ContactStatus,
    ) -> Result<(), MutationError> {
        let mut state = self.state.lock().await;
        state.begin(Operation::EditContactStatus, contact_id, to_detail(&status))?;
        state.statuses.insert(contact_id.to_string(), status);
        Ok(())
    }

    async fn question_responses(
        &self,
        contact_id: &str,
    ) -> Result<BTreeMap<String, String>, MutationError> {
        let state = self.state.lock().await;
        Ok(state.responses.get(contact_id).cloned().unwrap_or_default())
    }

    async fn contact_status(&self, contact_id: &str) -> Result<ContactStatus, MutationError> {
        let state = self.state.lock().await;
        Ok(state
            .statuses
            .get(contact_id)
            .copied()
            .unwrap_or(ContactStatus::NeedsMessage))
    }

    async fn messages(&self, contact_id: &str) -> Result<Vec<MessageRecord>, MutationError> {
        let state = self.state.lock().await;
        Ok(state.messages.get(contact_id).cloned().unwrap_or_default())
    }

    async fn opt_out(&self, cell: &str) -> Result<Option<OptOutRecord>, MutationError> {
        let state = self.state.lock().await;
        Ok(state.opt_outs.get(cell).cloned())
    }
}
