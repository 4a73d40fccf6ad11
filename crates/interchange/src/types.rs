//! Typed structs for the session-load payload.
//!
//! Field names follow the camelCase JSON document; ids are always stored
//! as strings even when the document carries them as numbers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Everything read at session start for one assigned contact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionPayload {
    pub texter: TexterRecord,
    pub assignment: AssignmentRecord,
    pub campaign: CampaignRecord,
    pub contact: ContactRecord,
}

/// The volunteer working the assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TexterRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

/// The assignment the texter is currently working.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub id: String,
}

/// Campaign-level data consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignRecord {
    pub id: String,
    /// Custom field names declared by the campaign. Empty means "accept
    /// whatever the contact carries".
    pub custom_fields: Vec<String>,
}

/// A campaign contact, with its interaction steps and message history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactRecord {
    pub id: String,
    pub assignment_id: String,
    pub first_name: String,
    pub last_name: String,
    pub cell: String,
    pub zip: Option<String>,
    pub external_id: Option<String>,
    pub custom_fields: BTreeMap<String, String>,
    pub opt_out: Option<OptOutMarker>,
    pub message_status: String,
    pub messages: Vec<MessageRecord>,
    /// Server-computed script of the contact's current step, when supplied.
    pub current_interaction_step_script: Option<String>,
    pub interaction_steps: Vec<StepRecord>,
}

/// Present when the contact has already opted out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptOutMarker {
    pub id: String,
    pub created_at: Option<String>,
}

/// One message of the conversation so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    pub created_at: Option<String>,
    pub text: String,
    pub is_from_contact: bool,
}

/// One interaction step as loaded, including its persisted answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    pub id: String,
    pub parent_id: Option<String>,
    pub script: Option<String>,
    pub question: Option<QuestionRecord>,
    pub question_response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionRecord {
    pub text: String,
    pub answer_options: Vec<AnswerOptionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerOptionRecord {
    pub value: String,
    pub next_interaction_step_id: Option<String>,
}
