use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use texter_core::{
    apply_answer, current_step, render_str, resolve_available_steps, AnswerOutcome,
    InteractionStep, ResponseStore, ScriptContext, StepTree,
};
use texter_interchange::SessionPayload;
use texter_mutations::{TexterMutations, ASSIGNMENT_CHANGED};

use crate::coordinator::{CoordinatorState, SubmissionCoordinator, SubmitReport, Target};
use crate::error::{Recovery, SessionError};

pub const DEFAULT_OPT_OUT_SCRIPT: &str =
    "I'm opting you out of text-based communication immediately. Have a great day.";

/// Library-side settings carried into every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Message sent when the texter opts a contact out without typing one.
    pub opt_out_script: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            opt_out_script: DEFAULT_OPT_OUT_SCRIPT.to_string(),
        }
    }
}

/// Whether the session may act on its contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Open,
    /// The contact now belongs to another assignment.
    Reassigned,
    /// The contact opted out earlier; the host should move on.
    OptedOut,
}

/// One texter working one contact.
///
/// Owns the step tree, the session-local answers and the draft. Editing
/// methods take `&mut self`; backend actions take `&self` and go through the
/// coordinator, which admits one action at a time.
pub struct ContactSession<M: TexterMutations> {
    contact_id: String,
    tree: StepTree,
    responses: ResponseStore,
    context: ScriptContext,
    draft: String,
    gate: Gate,
    settings: SessionSettings,
    coordinator: SubmissionCoordinator<M>,
}

impl<M: TexterMutations> ContactSession<M> {
    pub fn start(
        payload: &SessionPayload,
        mutations: Arc<M>,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let contact = &payload.contact;
        let tree = StepTree::from_records(&contact.interaction_steps)?;

        let persisted: BTreeMap<String, String> = contact
            .interaction_steps
            .iter()
            .filter_map(|s| Some((s.id.clone(), s.question_response.clone()?)))
            .collect();
        let responses = ResponseStore::seed(&tree, &persisted);
        let context = ScriptContext::from_payload(payload);

        let draft = if !contact.messages.is_empty() {
            String::new()
        } else {
            let template = contact
                .current_interaction_step_script
                .as_deref()
                .or(tree.root().script.as_deref())
                .unwrap_or("");
            render_str(template, &context)
        };

        let gate = if payload.assignment.id != contact.assignment_id {
            Gate::Reassigned
        } else if contact.opt_out.is_some() {
            Gate::OptedOut
        } else {
            Gate::Open
        };
        if gate != Gate::Open {
            tracing::warn!(contact = %contact.id, ?gate, "session gated");
        }

        let target = Target {
            contact_id: contact.id.clone(),
            cell: contact.cell.clone(),
            user_id: payload.texter.id.clone(),
            assignment_id: payload.assignment.id.clone(),
        };
        tracing::debug!(
            contact = %contact.id,
            steps = tree.len(),
            answered = persisted.len(),
            "session started"
        );

        Ok(Self {
            contact_id: contact.id.clone(),
            tree,
            responses,
            context,
            draft,
            gate,
            settings,
            coordinator: SubmissionCoordinator::new(mutations, target),
        })
    }

    pub fn contact_id(&self) -> &str {
        &self.contact_id
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    /// The host should skip this contact without showing it.
    pub fn should_skip(&self) -> bool {
        self.gate == Gate::OptedOut
    }

    /// Banner text and recovery action to show instead of the composer.
    pub fn banner(&self) -> Option<(&'static str, Recovery)> {
        match self.gate {
            Gate::Reassigned => Some((ASSIGNMENT_CHANGED, Recovery::BackToTodos)),
            _ => None,
        }
    }

    pub fn responses(&self) -> &ResponseStore {
        &self.responses
    }

    pub fn available_steps(&self) -> Result<Vec<&InteractionStep>, SessionError> {
        Ok(resolve_available_steps(&self.tree, &self.responses)?)
    }

    pub fn current_step(&self) -> Result<&InteractionStep, SessionError> {
        Ok(current_step(&self.tree, &self.responses)?)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Render a template against this contact.
    pub fn render(&self, template: &str) -> String {
        render_str(template, &self.context)
    }

    /// Record an answer. When the answer makes a step with a script current,
    /// the draft is replaced by that script rendered for this contact.
    pub fn answer(
        &mut self,
        step_id: &str,
        value: Option<&str>,
    ) -> Result<AnswerOutcome, SessionError> {
        let outcome = apply_answer(&mut self.responses, step_id, value, &self.tree)?;
        if let Some(script) = outcome.next_script.as_deref() {
            self.draft = render_str(script, &self.context);
        }
        Ok(outcome)
    }

    /// Replace the draft with a rendered canned response.
    pub fn apply_canned_response(&mut self, script: &str) {
        self.draft = render_str(script, &self.context);
    }

    pub async fn state(&self) -> CoordinatorState {
        self.coordinator.state().await
    }

    // ── Actions ──────────────────────────────────────────────────────────────

    /// Send the draft and save the answers.
    pub async fn submit(&self) -> Result<SubmitReport, SessionError> {
        self.check_gate(true)?;
        self.coordinator.submit(&self.draft, &self.responses).await
    }

    /// Send `message` (or the configured opt-out copy) and opt the contact out.
    pub async fn opt_out(&self, message: Option<&str>) -> Result<SubmitReport, SessionError> {
        self.check_gate(true)?;
        let text = message.unwrap_or(&self.settings.opt_out_script);
        self.coordinator.opt_out(text).await
    }

    /// Save the answers and close the conversation.
    pub async fn close(&self) -> Result<SubmitReport, SessionError> {
        self.check_gate(false)?;
        self.coordinator.close_contact(&self.responses).await
    }

    pub async fn reopen(&self) -> Result<SubmitReport, SessionError> {
        self.check_gate(false)?;
        self.coordinator.reopen().await
    }

    fn check_gate(&self, sends: bool) -> Result<(), SessionError> {
        match self.gate {
            Gate::Open => Ok(()),
            Gate::Reassigned => Err(SessionError::Reassigned {
                message: ASSIGNMENT_CHANGED.to_string(),
            }),
            Gate::OptedOut if sends => Err(SessionError::OptedOut),
            Gate::OptedOut => Ok(()),
        }
    }
}
