use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use texter_interchange::MessageRecord;

/// An outbound message from the texter to a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInput {
    pub contact_number: String,
    pub user_id: String,
    pub text: String,
    pub assignment_id: String,
}

/// Backend acknowledgement of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub contact_id: String,
    pub message_status: ContactStatus,
    /// The full conversation after the send.
    pub messages: Vec<MessageRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptOutInput {
    pub cell: String,
    pub assignment_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptOutRecord {
    pub id: String,
    pub cell: String,
    pub assignment_id: String,
}

/// One survey answer to upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponseInput {
    pub interaction_step_id: String,
    pub campaign_contact_id: String,
    pub value: String,
}

/// Where a contact sits in the texter's worklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContactStatus {
    NeedsMessage,
    NeedsResponse,
    Convo,
    Messaged,
    Closed,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::NeedsMessage => "needsMessage",
            ContactStatus::NeedsResponse => "needsResponse",
            ContactStatus::Convo => "convo",
            ContactStatus::Messaged => "messaged",
            ContactStatus::Closed => "closed",
        }
    }

    /// Status after the texter sends a message.
    pub fn after_send(self) -> Self {
        match self {
            ContactStatus::NeedsMessage => ContactStatus::Messaged,
            ContactStatus::NeedsResponse => ContactStatus::Convo,
            other => other,
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "needsMessage" => Ok(ContactStatus::NeedsMessage),
            "needsResponse" => Ok(ContactStatus::NeedsResponse),
            "convo" => Ok(ContactStatus::Convo),
            "messaged" => Ok(ContactStatus::Messaged),
            "closed" => Ok(ContactStatus::Closed),
            other => Err(format!("unknown contact status '{}'", other)),
        }
    }
}
