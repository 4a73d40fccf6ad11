//! Deserialization of the session-load JSON document into typed structs.
//!
//! The main entry point is [`from_json`], which takes a
//! `&serde_json::Value` and produces a [`SessionPayload`].
//!
//! The document comes from a GraphQL-shaped query, so a few fields are
//! accepted in more than one shape: ids may be strings or numbers, the
//! forward edge of an answer option may be `nextInteractionStepId` or a
//! nested `nextInteractionStep { id }`, and a contact's `customFields`
//! may be an object or a JSON-encoded string.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::types::*;

/// Errors during payload deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    /// The payload is missing a required top-level section.
    MissingField { field: String },
    /// A record inside the payload is malformed.
    RecordError {
        kind: String,
        id: String,
        message: String,
    },
    /// The payload structure is invalid.
    InvalidPayload(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::MissingField { field } => {
                write!(f, "payload missing required field: '{}'", field)
            }
            InterchangeError::RecordError { kind, id, message } => {
                write!(f, "{} '{}': {}", kind, id, message)
            }
            InterchangeError::InvalidPayload(msg) => {
                write!(f, "invalid payload: {}", msg)
            }
        }
    }
}

impl std::error::Error for InterchangeError {}

/// Deserialize a session-load document into a [`SessionPayload`].
pub fn from_json(doc: &Value) -> Result<SessionPayload, InterchangeError> {
    let texter = parse_texter(section(doc, "texter")?)?;
    let assignment = parse_assignment(section(doc, "assignment")?)?;
    let campaign = parse_campaign(section(doc, "campaign")?)?;
    let contact = parse_contact(section(doc, "contact")?)?;

    Ok(SessionPayload {
        texter,
        assignment,
        campaign,
        contact,
    })
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn section<'a>(doc: &'a Value, field: &str) -> Result<&'a Value, InterchangeError> {
    doc.get(field)
        .filter(|v| v.is_object())
        .ok_or_else(|| InterchangeError::MissingField {
            field: field.to_string(),
        })
}

/// Ids arrive as strings or integers depending on the backend.
fn id_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_id(obj: &Value, field: &str) -> Result<String, InterchangeError> {
    obj.get(field)
        .and_then(id_value)
        .ok_or_else(|| InterchangeError::InvalidPayload(format!("missing '{}' field", field)))
}

fn optional_id(obj: &Value, field: &str) -> Option<String> {
    obj.get(field).and_then(id_value)
}

fn optional_str(obj: &Value, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn str_or_empty(obj: &Value, field: &str) -> String {
    optional_str(obj, field).unwrap_or_default()
}

fn parse_texter(obj: &Value) -> Result<TexterRecord, InterchangeError> {
    Ok(TexterRecord {
        id: required_id(obj, "id")?,
        first_name: str_or_empty(obj, "firstName"),
        last_name: str_or_empty(obj, "lastName"),
    })
}

fn parse_assignment(obj: &Value) -> Result<AssignmentRecord, InterchangeError> {
    Ok(AssignmentRecord {
        id: required_id(obj, "id")?,
    })
}

fn parse_campaign(obj: &Value) -> Result<CampaignRecord, InterchangeError> {
    let id = required_id(obj, "id")?;

    let custom_fields = obj
        .get("customFields")
        .and_then(|c| c.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(CampaignRecord {
        id,
        custom_fields,
    })
}

fn parse_contact(obj: &Value) -> Result<ContactRecord, InterchangeError> {
    let id = required_id(obj, "id")?;

    let assignment_id = optional_id(obj, "assignmentId").ok_or_else(|| {
        InterchangeError::RecordError {
            kind: "Contact".to_string(),
            id: id.clone(),
            message: "missing 'assignmentId' field".to_string(),
        }
    })?;

    let cell = optional_str(obj, "cell").ok_or_else(|| InterchangeError::RecordError {
        kind: "Contact".to_string(),
        id: id.clone(),
        message: "missing 'cell' field".to_string(),
    })?;

    let custom_fields = parse_custom_fields(&id, obj.get("customFields"))?;

    let opt_out = obj
        .get("optOut")
        .filter(|o| !o.is_null())
        .map(|o| OptOutMarker {
            id: optional_id(o, "id").unwrap_or_default(),
            created_at: optional_str(o, "createdAt"),
        });

    let messages = match obj.get("messages") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(arr)) => arr
            .iter()
            .map(|m| parse_message(&id, m))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(InterchangeError::RecordError {
                kind: "Contact".to_string(),
                id,
                message: "'messages' must be an array".to_string(),
            })
        }
    };

    let interaction_steps = obj
        .get("interactionSteps")
        .and_then(|s| s.as_array())
        .ok_or_else(|| InterchangeError::RecordError {
            kind: "Contact".to_string(),
            id: id.clone(),
            message: "missing 'interactionSteps' array".to_string(),
        })?
        .iter()
        .map(parse_step)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ContactRecord {
        assignment_id,
        first_name: str_or_empty(obj, "firstName"),
        last_name: str_or_empty(obj, "lastName"),
        cell,
        zip: optional_str(obj, "zip"),
        external_id: optional_id(obj, "external_id").or_else(|| optional_id(obj, "externalId")),
        custom_fields,
        opt_out,
        message_status: optional_str(obj, "messageStatus")
            .unwrap_or_else(|| "needsMessage".to_string()),
        messages,
        current_interaction_step_script: optional_str(obj, "currentInteractionStepScript"),
        interaction_steps,
        id,
    })
}

fn parse_custom_fields(
    contact_id: &str,
    value: Option<&Value>,
) -> Result<BTreeMap<String, String>, InterchangeError> {
    let decoded;
    let map = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(Value::String(raw)) if raw.trim().is_empty() => return Ok(BTreeMap::new()),
        Some(Value::String(raw)) => {
            decoded = serde_json::from_str::<Value>(raw).map_err(|e| {
                InterchangeError::RecordError {
                    kind: "Contact".to_string(),
                    id: contact_id.to_string(),
                    message: format!("'customFields' is not valid JSON: {}", e),
                }
            })?;
            decoded.as_object().ok_or_else(|| InterchangeError::RecordError {
                kind: "Contact".to_string(),
                id: contact_id.to_string(),
                message: "'customFields' must encode an object".to_string(),
            })?
        }
        Some(_) => {
            return Err(InterchangeError::RecordError {
                kind: "Contact".to_string(),
                id: contact_id.to_string(),
                message: "'customFields' must be an object".to_string(),
            })
        }
    };

    Ok(map
        .iter()
        .filter_map(|(k, v)| {
            let rendered = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((k.clone(), rendered))
        })
        .collect())
}

fn parse_message(contact_id: &str, obj: &Value) -> Result<MessageRecord, InterchangeError> {
    let id = optional_id(obj, "id").ok_or_else(|| InterchangeError::RecordError {
        kind: "Message".to_string(),
        id: contact_id.to_string(),
        message: "message without 'id'".to_string(),
    })?;

    Ok(MessageRecord {
        created_at: optional_str(obj, "createdAt"),
        text: str_or_empty(obj, "text"),
        is_from_contact: obj
            .get("isFromContact")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        id,
    })
}

fn parse_step(obj: &Value) -> Result<StepRecord, InterchangeError> {
    let id = required_id(obj, "id")?;

    let parent_id = optional_id(obj, "parentId").or_else(|| optional_id(obj, "parentInteractionId"));

    let question = match obj.get("question") {
        None | Some(Value::Null) => None,
        Some(q) => Some(parse_question(&id, q)?),
    };

    let question_response = obj
        .get("questionResponse")
        .and_then(|r| match r {
            Value::Object(_) => r.get("value").and_then(|v| v.as_str()),
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })
        .map(|s| s.to_string());

    Ok(StepRecord {
        parent_id,
        script: optional_str(obj, "script"),
        question,
        question_response,
        id,
    })
}

fn parse_question(step_id: &str, obj: &Value) -> Result<QuestionRecord, InterchangeError> {
    let answer_options = match obj.get("answerOptions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(arr)) => arr
            .iter()
            .map(|opt| {
                let value = optional_str(opt, "value").ok_or_else(|| {
                    InterchangeError::RecordError {
                        kind: "InteractionStep".to_string(),
                        id: step_id.to_string(),
                        message: "answer option without 'value'".to_string(),
                    }
                })?;
                let next_interaction_step_id = optional_id(opt, "nextInteractionStepId").or_else(|| {
                    opt.get("nextInteractionStep")
                        .and_then(|n| n.get("id"))
                        .and_then(id_value)
                });
                Ok(AnswerOptionRecord {
                    value,
                    next_interaction_step_id,
                })
            })
            .collect::<Result<Vec<_>, InterchangeError>>()?,
        Some(_) => {
            return Err(InterchangeError::RecordError {
                kind: "InteractionStep".to_string(),
                id: step_id.to_string(),
                message: "'answerOptions' must be an array".to_string(),
            })
        }
    };

    Ok(QuestionRecord {
        text: str_or_empty(obj, "text"),
        answer_options,
    })
}
