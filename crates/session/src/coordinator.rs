//! Submission coordinator.
//!
//! Every mutating action on a contact runs as a fixed, sequential pipeline
//! of backend calls. A stage starts only after the previous one succeeded;
//! the first failure stops the pipeline, moves the coordinator to `Failed`
//! and is classified before it leaves this module.
//!
//! ```text
//! submit        send -> persist -> delete
//! opt_out       send -> opt_out
//! close_contact persist -> delete -> status(closed)
//! reopen        status(needsResponse)
//! ```
//!
//! A message that was delivered is remembered until its action completes.
//! Re-running the same action after a later stage failed skips the send, so
//! fixing a persistence problem never texts the contact twice.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use texter_core::ResponseStore;
use texter_mutations::{
    ContactStatus, MessageInput, MutationError, OptOutInput, QuestionResponseInput, SendReceipt,
    TexterMutations,
};

use crate::classify::classify;
use crate::error::{SessionError, EMPTY_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Submit,
    OptOut,
    Close,
    Reopen,
}

/// One backend call within an action's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Send,
    Persist,
    Delete,
    OptOut,
    Status,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Send => "send",
            Stage::Persist => "persist",
            Stage::Delete => "delete",
            Stage::OptOut => "opt_out",
            Stage::Status => "status",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Sending,
    Completed,
    Failed { stage: Stage },
}

/// Who and what the coordinator acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub contact_id: String,
    pub cell: String,
    pub user_id: String,
    pub assignment_id: String,
}

/// A successfully completed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReport {
    pub action: Action,
    /// Stages that made a backend call, in order.
    pub stages: Vec<Stage>,
    /// Receipt of the delivered message, for actions that send one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<SendReceipt>,
}

struct StageFailure {
    stage: Stage,
    error: MutationError,
}

fn at(stage: Stage) -> impl FnOnce(MutationError) -> StageFailure {
    move |error| StageFailure { stage, error }
}

struct Inner {
    state: CoordinatorState,
    delivered: Option<(Action, SendReceipt)>,
}

pub struct SubmissionCoordinator<M: TexterMutations> {
    mutations: Arc<M>,
    target: Target,
    inner: Mutex<Inner>,
}

impl<M: TexterMutations> SubmissionCoordinator<M> {
    pub fn new(mutations: Arc<M>, target: Target) -> Self {
        Self {
            mutations,
            target,
            inner: Mutex::new(Inner {
                state: CoordinatorState::Idle,
                delivered: None,
            }),
        }
    }

    pub async fn state(&self) -> CoordinatorState {
        self.inner.lock().await.state
    }

    // ── Actions ──────────────────────────────────────────────────────────────

    /// Send `text`, then persist set answers and delete cleared ones.
    pub async fn submit(
        &self,
        text: &str,
        responses: &ResponseStore,
    ) -> Result<SubmitReport, SessionError> {
        let checkpoint = self.begin(Action::Submit, Some(text)).await?;
        let mut run = Run::new(Action::Submit);
        let result = self.run_submit(&mut run, checkpoint, text, responses).await;
        self.finish(run, result).await
    }

    /// Send the opt-out copy, then record the opt-out for the contact's cell.
    pub async fn opt_out(&self, text: &str) -> Result<SubmitReport, SessionError> {
        let checkpoint = self.begin(Action::OptOut, Some(text)).await?;
        let mut run = Run::new(Action::OptOut);
        let result = self.run_opt_out(&mut run, checkpoint, text).await;
        self.finish(run, result).await
    }

    /// Persist answers and mark the contact closed without sending anything.
    pub async fn close_contact(
        &self,
        responses: &ResponseStore,
    ) -> Result<SubmitReport, SessionError> {
        self.begin(Action::Close, None).await?;
        let mut run = Run::new(Action::Close);
        let result = self.run_close(&mut run, responses).await;
        self.finish(run, result).await
    }

    /// Put the contact back in the texter's queue. The only action accepted
    /// after completion; on success the coordinator is idle again.
    pub async fn reopen(&self) -> Result<SubmitReport, SessionError> {
        self.begin(Action::Reopen, None).await?;
        let mut run = Run::new(Action::Reopen);
        let result = self.set_status(&mut run, ContactStatus::NeedsResponse).await;
        self.finish(run, result).await
    }

    // ── Pipeline ─────────────────────────────────────────────────────────────

    /// Enter `Sending`, returning the delivered-message checkpoint for
    /// `action` if an earlier attempt got that far.
    ///
    /// `Busy` and `Finished` win over an empty `text`; a rejected text leaves
    /// the state untouched.
    async fn begin(
        &self,
        action: Action,
        text: Option<&str>,
    ) -> Result<Option<SendReceipt>, SessionError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CoordinatorState::Sending => return Err(SessionError::Busy),
            CoordinatorState::Completed if action != Action::Reopen => {
                return Err(SessionError::Finished)
            }
            _ => {}
        }
        if let Some(text) = text {
            validate(text)?;
        }
        inner.state = CoordinatorState::Sending;
        tracing::debug!(contact = %self.target.contact_id, ?action, "action started");
        Ok(inner
            .delivered
            .as_ref()
            .filter(|(a, _)| *a == action)
            .map(|(_, receipt)| receipt.clone()))
    }

    async fn finish(
        &self,
        run: Run,
        result: Result<(), StageFailure>,
    ) -> Result<SubmitReport, SessionError> {
        let mut inner = self.inner.lock().await;
        match result {
            Ok(()) => {
                inner.state = match run.action {
                    Action::Reopen => CoordinatorState::Idle,
                    _ => CoordinatorState::Completed,
                };
                inner.delivered = None;
                tracing::info!(
                    contact = %self.target.contact_id,
                    action = ?run.action,
                    stages = run.stages.len(),
                    "action completed"
                );
                Ok(SubmitReport {
                    action: run.action,
                    stages: run.stages,
                    receipt: run.receipt,
                })
            }
            Err(failure) => {
                inner.state = CoordinatorState::Failed {
                    stage: failure.stage,
                };
                tracing::debug!(
                    contact = %self.target.contact_id,
                    action = ?run.action,
                    stage = %failure.stage,
                    "action failed"
                );
                Err(classify(failure.error))
            }
        }
    }

    async fn run_submit(
        &self,
        run: &mut Run,
        checkpoint: Option<SendReceipt>,
        text: &str,
        responses: &ResponseStore,
    ) -> Result<(), StageFailure> {
        self.send_stage(run, checkpoint, text).await?;
        self.drain_responses(run, responses).await
    }

    async fn run_opt_out(
        &self,
        run: &mut Run,
        checkpoint: Option<SendReceipt>,
        text: &str,
    ) -> Result<(), StageFailure> {
        self.send_stage(run, checkpoint, text).await?;
        let input = OptOutInput {
            cell: self.target.cell.clone(),
            assignment_id: self.target.assignment_id.clone(),
        };
        self.mutations
            .create_opt_out(&self.target.contact_id, input)
            .await
            .map_err(at(Stage::OptOut))?;
        run.done(Stage::OptOut);
        Ok(())
    }

    async fn run_close(&self, run: &mut Run, responses: &ResponseStore) -> Result<(), StageFailure> {
        self.drain_responses(run, responses).await?;
        self.set_status(run, ContactStatus::Closed).await
    }

    async fn send_stage(
        &self,
        run: &mut Run,
        checkpoint: Option<SendReceipt>,
        text: &str,
    ) -> Result<(), StageFailure> {
        if let Some(receipt) = checkpoint {
            tracing::info!(
                contact = %self.target.contact_id,
                "message already delivered; not sending again"
            );
            run.receipt = Some(receipt);
            return Ok(());
        }

        let message = MessageInput {
            contact_number: self.target.cell.clone(),
            user_id: self.target.user_id.clone(),
            text: text.to_string(),
            assignment_id: self.target.assignment_id.clone(),
        };
        let receipt = self
            .mutations
            .send_message(&self.target.contact_id, message)
            .await
            .map_err(at(Stage::Send))?;

        self.inner.lock().await.delivered = Some((run.action, receipt.clone()));
        run.done(Stage::Send);
        run.receipt = Some(receipt);
        Ok(())
    }

    /// Persist before delete. An empty partition makes no call.
    async fn drain_responses(
        &self,
        run: &mut Run,
        responses: &ResponseStore,
    ) -> Result<(), StageFailure> {
        let partition = responses.partition();
        let contact_id = &self.target.contact_id;

        if !partition.to_persist.is_empty() {
            let inputs = partition
                .to_persist
                .into_iter()
                .map(|(step_id, value)| QuestionResponseInput {
                    interaction_step_id: step_id,
                    campaign_contact_id: contact_id.clone(),
                    value,
                })
                .collect();
            self.mutations
                .update_question_responses(contact_id, inputs)
                .await
                .map_err(at(Stage::Persist))?;
            run.done(Stage::Persist);
        }

        if !partition.to_delete.is_empty() {
            self.mutations
                .delete_question_responses(contact_id, partition.to_delete)
                .await
                .map_err(at(Stage::Delete))?;
            run.done(Stage::Delete);
        }
        Ok(())
    }

    async fn set_status(&self, run: &mut Run, status: ContactStatus) -> Result<(), StageFailure> {
        self.mutations
            .edit_contact_status(&self.target.contact_id, status)
            .await
            .map_err(at(Stage::Status))?;
        run.done(Stage::Status);
        Ok(())
    }
}

struct Run {
    action: Action,
    stages: Vec<Stage>,
    receipt: Option<SendReceipt>,
}

impl Run {
    fn new(action: Action) -> Self {
        Self {
            action,
            stages: Vec::new(),
            receipt: None,
        }
    }

    fn done(&mut self, stage: Stage) {
        tracing::info!(action = ?self.action, %stage, "stage completed");
        self.stages.push(stage);
    }
}

fn validate(text: &str) -> Result<(), SessionError> {
    if text.trim().is_empty() {
        return Err(SessionError::Validation(EMPTY_MESSAGE.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use texter_core::StepTree;
    use texter_mutations::{InMemoryMutations, MessageRecord, Operation, OptOutRecord};

    use super::*;
    use crate::error::Directive;

    fn target() -> Target {
        Target {
            contact_id: "k1".to_string(),
            cell: "+15555550100".to_string(),
            user_id: "u1".to_string(),
            assignment_id: "a1".to_string(),
        }
    }

    fn tree() -> StepTree {
        use texter_core::{AnswerOption, InteractionStep, Question};
        StepTree::new(vec![
            InteractionStep {
                id: "root".to_string(),
                parent_id: None,
                script: Some("Hi".to_string()),
                question: Some(Question {
                    text: "Support?".to_string(),
                    answer_options: vec![AnswerOption {
                        value: "yes".to_string(),
                        next_step_id: Some("b".to_string()),
                    }],
                }),
            },
            InteractionStep {
                id: "b".to_string(),
                parent_id: Some("root".to_string()),
                script: Some("Volunteer?".to_string()),
                question: Some(Question {
                    text: "Volunteer?".to_string(),
                    answer_options: Vec::new(),
                }),
            },
        ])
        .unwrap()
    }

    /// `root` answered, `b` cleared: one upsert and one delete.
    fn responses() -> ResponseStore {
        let persisted: BTreeMap<String, String> =
            [("root".to_string(), "yes".to_string())].into_iter().collect();
        ResponseStore::seed(&tree(), &persisted)
    }

    fn coordinator() -> (Arc<InMemoryMutations>, SubmissionCoordinator<InMemoryMutations>) {
        let backend = Arc::new(InMemoryMutations::new());
        let coordinator = SubmissionCoordinator::new(Arc::clone(&backend), target());
        (backend, coordinator)
    }

    fn ops(calls: &[texter_mutations::MutationCall]) -> Vec<Operation> {
        calls.iter().map(|c| c.operation).collect()
    }

    #[tokio::test]
    async fn submit_runs_send_persist_delete_in_order() {
        let (backend, c) = coordinator();
        let report = c.submit("Hello", &responses()).await.unwrap();
        assert_eq!(report.stages, vec![Stage::Send, Stage::Persist, Stage::Delete]);
        assert_eq!(report.receipt.unwrap().messages.len(), 1);
        assert_eq!(
            ops(&backend.calls().await),
            vec![
                Operation::SendMessage,
                Operation::UpdateQuestionResponses,
                Operation::DeleteQuestionResponses
            ]
        );
        assert_eq!(c.state().await, CoordinatorState::Completed);
        assert_eq!(
            backend.question_responses("k1").await.unwrap().get("root").map(String::as_str),
            Some("yes")
        );
    }

    #[tokio::test]
    async fn empty_message_fails_locally() {
        let (backend, c) = coordinator();
        for text in ["", "   "] {
            let err = c.submit(text, &responses()).await.unwrap_err();
            assert_eq!(err, SessionError::Validation(EMPTY_MESSAGE.to_string()));
        }
        assert!(backend.calls().await.is_empty());
        assert_eq!(c.state().await, CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn finished_outranks_empty_message() {
        let (backend, c) = coordinator();
        c.submit("Hello", &responses()).await.unwrap();
        assert_eq!(c.submit("  ", &responses()).await.unwrap_err(), SessionError::Finished);
        assert_eq!(c.opt_out("").await.unwrap_err(), SessionError::Finished);
        assert_eq!(backend.count(Operation::SendMessage).await, 1);
        assert_eq!(c.state().await, CoordinatorState::Completed);
    }

    #[tokio::test]
    async fn send_failure_skips_persistence() {
        let (backend, c) = coordinator();
        backend
            .fail_next(Operation::SendMessage, MutationError::from_status(500, "down"))
            .await;
        let err = c.submit("Hello", &responses()).await.unwrap_err();
        assert!(matches!(err, SessionError::Transient { .. }));
        assert_eq!(ops(&backend.calls().await), vec![Operation::SendMessage]);
        assert_eq!(
            c.state().await,
            CoordinatorState::Failed { stage: Stage::Send }
        );
    }

    #[tokio::test]
    async fn reassigned_send_exits_without_persistence() {
        let (backend, c) = coordinator();
        backend
            .fail_next(Operation::SendMessage, MutationError::from_status(402, "moved"))
            .await;
        let err = c.submit("Hello", &responses()).await.unwrap_err();
        assert_eq!(err.directive(), Some(Directive::ExitToWorklist));
        assert_eq!(backend.count(Operation::UpdateQuestionResponses).await, 0);
        assert_eq!(backend.count(Operation::DeleteQuestionResponses).await, 0);
        assert!(matches!(c.state().await, CoordinatorState::Failed { .. }));
    }

    #[tokio::test]
    async fn resubmit_after_persist_failure_does_not_resend() {
        let (backend, c) = coordinator();
        backend
            .fail_next(
                Operation::UpdateQuestionResponses,
                MutationError::from_status(503, "busy"),
            )
            .await;
        c.submit("Hello", &responses()).await.unwrap_err();
        assert_eq!(
            c.state().await,
            CoordinatorState::Failed {
                stage: Stage::Persist
            }
        );

        let report = c.submit("Hello", &responses()).await.unwrap();
        assert_eq!(report.stages, vec![Stage::Persist, Stage::Delete]);
        assert!(report.receipt.is_some());
        assert_eq!(backend.count(Operation::SendMessage).await, 1);
        assert_eq!(backend.messages("k1").await.unwrap().len(), 1);
        assert_eq!(c.state().await, CoordinatorState::Completed);
    }

    #[tokio::test]
    async fn resend_after_send_failure_is_allowed() {
        let (backend, c) = coordinator();
        backend
            .fail_next(Operation::SendMessage, MutationError::from_status(500, "down"))
            .await;
        c.submit("Hello", &responses()).await.unwrap_err();
        let report = c.submit("Hello", &responses()).await.unwrap();
        assert_eq!(report.stages[0], Stage::Send);
        assert_eq!(backend.messages("k1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn completed_refuses_further_actions() {
        let (_, c) = coordinator();
        c.submit("Hello", &responses()).await.unwrap();
        assert_eq!(
            c.submit("Again", &responses()).await.unwrap_err(),
            SessionError::Finished
        );
        assert_eq!(c.opt_out("bye").await.unwrap_err(), SessionError::Finished);
    }

    #[tokio::test]
    async fn opt_out_sends_then_records() {
        let (backend, c) = coordinator();
        let report = c.opt_out("Opting you out").await.unwrap();
        assert_eq!(report.stages, vec![Stage::Send, Stage::OptOut]);
        let record = backend.opt_out("+15555550100").await.unwrap().unwrap();
        assert_eq!(record.assignment_id, "a1");
        assert_eq!(backend.count(Operation::UpdateQuestionResponses).await, 0);
    }

    #[tokio::test]
    async fn opt_out_failure_after_send_keeps_checkpoint() {
        let (backend, c) = coordinator();
        backend
            .fail_next(Operation::CreateOptOut, MutationError::from_status(500, "x"))
            .await;
        c.opt_out("Opting you out").await.unwrap_err();
        let report = c.opt_out("Opting you out").await.unwrap();
        assert_eq!(report.stages, vec![Stage::OptOut]);
        assert_eq!(backend.count(Operation::SendMessage).await, 1);
    }

    #[tokio::test]
    async fn submit_checkpoint_does_not_leak_into_opt_out() {
        let (backend, c) = coordinator();
        backend
            .fail_next(Operation::DeleteQuestionResponses, MutationError::from_status(500, "x"))
            .await;
        c.submit("Hello", &responses()).await.unwrap_err();
        let report = c.opt_out("Opting you out").await.unwrap();
        assert_eq!(report.stages, vec![Stage::Send, Stage::OptOut]);
        assert_eq!(backend.messages("k1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn close_persists_then_closes() {
        let (backend, c) = coordinator();
        let report = c.close_contact(&responses()).await.unwrap();
        assert_eq!(
            report.stages,
            vec![Stage::Persist, Stage::Delete, Stage::Status]
        );
        assert_eq!(report.receipt, None);
        assert_eq!(backend.count(Operation::SendMessage).await, 0);
        assert_eq!(
            backend.contact_status("k1").await.unwrap(),
            ContactStatus::Closed
        );
    }

    #[tokio::test]
    async fn close_with_empty_store_only_edits_status() {
        let (backend, c) = coordinator();
        let report = c.close_contact(&ResponseStore::default()).await.unwrap();
        assert_eq!(report.stages, vec![Stage::Status]);
        assert_eq!(ops(&backend.calls().await), vec![Operation::EditContactStatus]);
    }

    #[tokio::test]
    async fn reopen_after_close_returns_to_idle() {
        let (backend, c) = coordinator();
        c.close_contact(&responses()).await.unwrap();
        let report = c.reopen().await.unwrap();
        assert_eq!(report.stages, vec![Stage::Status]);
        assert_eq!(c.state().await, CoordinatorState::Idle);
        assert_eq!(
            backend.contact_status("k1").await.unwrap(),
            ContactStatus::NeedsResponse
        );
    }

    /// Backend whose send yields once, so a second action can observe the
    /// coordinator mid-flight.
    struct YieldingSend(InMemoryMutations);

    #[async_trait]
    impl TexterMutations for YieldingSend {
        async fn send_message(
            &self,
            contact_id: &str,
            message: MessageInput,
        ) -> Result<SendReceipt, MutationError> {
            tokio::task::yield_now().await;
            self.0.send_message(contact_id, message).await
        }
        async fn create_opt_out(
            &self,
            contact_id: &str,
            opt_out: OptOutInput,
        ) -> Result<OptOutRecord, MutationError> {
            self.0.create_opt_out(contact_id, opt_out).await
        }
        async fn update_question_responses(
            &self,
            contact_id: &str,
            responses: Vec<QuestionResponseInput>,
        ) -> Result<(), MutationError> {
            self.0.update_question_responses(contact_id, responses).await
        }
        async fn delete_question_responses(
            &self,
            contact_id: &str,
            ids: Vec<String>,
        ) -> Result<(), MutationError> {
            self.0.delete_question_responses(contact_id, ids).await
        }
        async fn edit_contact_status(
            &self,
            contact_id: &str,
            status: ContactStatus,
        ) -> Result<(), MutationError> {
            self.0.edit_contact_status(contact_id, status).await
        }
        async fn question_responses(
            &self,
            contact_id: &str,
        ) -> Result<BTreeMap<String, String>, MutationError> {
            self.0.question_responses(contact_id).await
        }
        async fn contact_status(&self, contact_id: &str) -> Result<ContactStatus, MutationError> {
            self.0.contact_status(contact_id).await
        }
        async fn messages(&self, contact_id: &str) -> Result<Vec<MessageRecord>, MutationError> {
            self.0.messages(contact_id).await
        }
        async fn opt_out(&self, cell: &str) -> Result<Option<OptOutRecord>, MutationError> {
            self.0.opt_out(cell).await
        }
    }

    #[tokio::test]
    async fn overlapping_submit_is_refused_as_busy() {
        let backend = Arc::new(YieldingSend(InMemoryMutations::new()));
        let c = SubmissionCoordinator::new(Arc::clone(&backend), target());
        let store = responses();

        let (first, second) = tokio::join!(c.submit("one", &store), c.submit("two", &store));
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), SessionError::Busy);
        assert_eq!(backend.0.count(Operation::SendMessage).await, 1);
    }
}
