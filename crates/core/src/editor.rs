//! Recording an answer.
//!
//! Setting a step's answer nulls the answers of its direct children (by
//! ownership edge) that have keys in the store. Deeper descendants are left
//! alone; once the child is cleared the path resolver no longer reaches
//! them, so their stale answers have no effect on what is shown.

use serde::Serialize;

use crate::error::TreeError;
use crate::path::resolve_available_steps;
use crate::responses::ResponseStore;
use crate::tree::StepTree;

/// What changed after an answer was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    /// Direct children whose answers were nulled.
    pub cleared: Vec<String>,
    /// Available step ids after the change, root first.
    pub available: Vec<String>,
    /// Unrendered script of the step the chosen option leads to, when that
    /// step is now the current one. `None` when the answer leads nowhere,
    /// the answered step is off the available path, or the step has no script.
    pub next_script: Option<String>,
}

/// Set `responses[step_id] = new_value` and clear stale direct-child answers.
///
/// Fails without touching the store when `step_id` is not in the tree or
/// is not a question step.
pub fn apply_answer(
    responses: &mut ResponseStore,
    step_id: &str,
    new_value: Option<&str>,
    tree: &StepTree,
) -> Result<AnswerOutcome, TreeError> {
    let step = tree.get(step_id).ok_or_else(|| TreeError::UnknownStep {
        step_id: step_id.to_string(),
    })?;
    if !step.has_question() {
        return Err(TreeError::NotAQuestion {
            step_id: step_id.to_string(),
        });
    }

    responses.set(step_id, new_value);

    let cleared: Vec<String> = tree
        .children(step_id)
        .filter(|child| responses.clear_if_present(&child.id))
        .map(|child| child.id.clone())
        .collect();
    if !cleared.is_empty() {
        tracing::debug!(step = step_id, cleared = ?cleared, "cleared direct-child answers");
    }

    let path = resolve_available_steps(tree, responses)?;
    let current = path[path.len() - 1];
    // Only a step the answer actually made current refreshes the draft.
    let on_path = path.iter().any(|s| s.id == step_id);
    let next_script = responses
        .get(step_id)
        .filter(|_| on_path)
        .and_then(|value| step.matching_option(value))
        .and_then(|opt| opt.next_step_id.as_deref())
        .filter(|next| *next == current.id)
        .and_then(|_| current.script.clone());
    let available = path.into_iter().map(|s| s.id.clone()).collect();

    Ok(AnswerOutcome {
        cleared,
        available,
        next_script,
    })
}
