//! Path resolution: which steps are currently reachable.
//!
//! Starting at the root, each answered step contributes the successor of its
//! first matching answer option. The walk stops at the first unanswered
//! step, at an answer that matches no option, or at an option without a
//! successor. The result is therefore a prefix path of the tree and is
//! recomputed on demand rather than stored.

use std::collections::HashSet;

use crate::error::{EdgeKind, TreeError};
use crate::responses::ResponseStore;
use crate::tree::{InteractionStep, StepTree};

/// The ordered, never-empty sequence of available steps.
pub fn resolve_available_steps<'t>(
    tree: &'t StepTree,
    responses: &ResponseStore,
) -> Result<Vec<&'t InteractionStep>, TreeError> {
    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let mut current = tree.root();

    loop {
        if !visited.insert(current.id.as_str()) {
            return Err(TreeError::Cycle {
                step_id: current.id.clone(),
            });
        }
        path.push(current);

        let Some(value) = responses.get(&current.id) else {
            break;
        };
        let Some(option) = current.matching_option(value) else {
            break;
        };
        let Some(next_id) = option.next_step_id.as_deref() else {
            break;
        };
        current = tree
            .get(next_id)
            .ok_or_else(|| TreeError::DanglingReference {
                step_id: current.id.clone(),
                target: next_id.to_string(),
                edge: EdgeKind::NextStep,
            })?;
    }

    tracing::trace!(
        depth = path.len(),
        leaf = %path[path.len() - 1].id,
        "resolved available steps"
    );
    Ok(path)
}

/// The active (last available) step.
pub fn current_step<'t>(
    tree: &'t StepTree,
    responses: &ResponseStore,
) -> Result<&'t InteractionStep, TreeError> {
    let path = resolve_available_steps(tree, responses)?;
    Ok(path[path.len() - 1])
}
