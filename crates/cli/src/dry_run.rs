//! Session actions against the in-memory backend.
//!
//! Each command loads a payload, applies `--answer` edits, optionally arms
//! `--fail` faults, runs one action and reports the result together with
//! the backend's call journal.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use texter_interchange::SessionPayload;
use texter_mutations::{ContactStatus, InMemoryMutations, MutationCall, MutationError, Operation};
use texter_session::{ContactSession, CoordinatorState, SessionError, SessionSettings, SubmitReport};

/// `--answer STEP=VALUE`. An empty value clears the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerArg {
    pub step_id: String,
    pub value: Option<String>,
}

pub fn parse_answer(s: &str) -> Result<AnswerArg, String> {
    let (step, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected STEP=VALUE, got '{}'", s))?;
    if step.is_empty() {
        return Err(format!("missing step id in '{}'", s));
    }
    Ok(AnswerArg {
        step_id: step.to_string(),
        value: (!value.is_empty()).then(|| value.to_string()),
    })
}

/// `--fail OP=STATUS:MESSAGE`, e.g. `send_message=402:gone`.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultArg {
    pub operation: Operation,
    pub error: MutationError,
}

pub fn parse_fault(s: &str) -> Result<FaultArg, String> {
    let (op, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("expected OP=STATUS:MESSAGE, got '{}'", s))?;
    let operation: Operation = op.parse()?;
    let (status, message) = rest.split_once(':').unwrap_or((rest, ""));
    let status: u16 = status
        .parse()
        .map_err(|_| format!("invalid status '{}' in '{}'", status, s))?;
    Ok(FaultArg {
        operation,
        error: MutationError::from_status(status, message),
    })
}

pub fn read_payload(path: &Path) -> Result<SessionPayload, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading file '{}': {}", path.display(), e))?;
    let doc: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("error parsing JSON in '{}': {}", path.display(), e))?;
    texter_interchange::from_json(&doc).map_err(|e| format!("{}: {}", path.display(), e))
}

/// A started session plus the backend it talks to.
pub struct DryRun {
    pub backend: Arc<InMemoryMutations>,
    pub session: ContactSession<InMemoryMutations>,
}

impl DryRun {
    pub async fn start(
        payload: &SessionPayload,
        settings: SessionSettings,
        answers: &[AnswerArg],
        faults: &[FaultArg],
    ) -> Result<Self, SessionError> {
        let contact = &payload.contact;
        let backend = Arc::new(InMemoryMutations::new());
        backend.assign(&contact.id, &contact.assignment_id).await;
        match contact.message_status.parse::<ContactStatus>() {
            Ok(status) => backend.seed_status(&contact.id, status).await,
            Err(msg) => tracing::warn!(contact = %contact.id, "{}; backend starts at needsMessage", msg),
        }
        for fault in faults {
            backend.fail_next(fault.operation, fault.error.clone()).await;
        }

        let mut session = ContactSession::start(payload, Arc::clone(&backend), settings)?;
        for answer in answers {
            session.answer(&answer.step_id, answer.value.as_deref())?;
        }
        Ok(Self { backend, session })
    }

    pub async fn outcome(&self, result: Result<SubmitReport, SessionError>) -> ActionOutcome {
        ActionOutcome {
            state: self.session.state().await,
            report: result.as_ref().ok().cloned(),
            error: result.err(),
            calls: self.backend.calls().await,
        }
    }
}

/// What a dry-run action did.
#[derive(Debug, Serialize)]
pub struct ActionOutcome {
    pub state: CoordinatorState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SubmitReport>,
    #[serde(skip)]
    pub error: Option<SessionError>,
    pub calls: Vec<MutationCall>,
}
