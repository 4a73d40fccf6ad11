//! The interaction-step tree: an explicit node table keyed by id with two
//! derived indices.
//!
//! Steps carry two independent edge kinds over one node set. `parent_id` is
//! the ownership edge and defines the tree shape (children-by-parent index).
//! An answer option's `next_step_id` is the traversal edge followed by the
//! path resolver. The two are expected to agree, but only the ownership
//! edge is used for cascade invalidation and only the traversal edge for
//! path resolution.
//!
//! Validation happens once, in [`StepTree::new`]: duplicate ids, root count,
//! dangling references on both edge kinds, steps the root does not own, and
//! cycles along traversal edges.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use texter_interchange::StepRecord;

use crate::error::{EdgeKind, TreeError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub value: String,
    /// `None` ends the branch.
    pub next_step_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub text: String,
    pub answer_options: Vec<AnswerOption>,
}

/// One node of the scripted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionStep {
    pub id: String,
    pub parent_id: Option<String>,
    pub script: Option<String>,
    pub question: Option<Question>,
}

impl InteractionStep {
    /// The step's question, if it has one with non-empty text.
    pub fn active_question(&self) -> Option<&Question> {
        self.question.as_ref().filter(|q| !q.text.is_empty())
    }

    /// Whether answers to this step are tracked in the response store.
    pub fn has_question(&self) -> bool {
        self.active_question().is_some()
    }

    /// First answer option whose value equals `value` (list order wins).
    pub fn matching_option(&self, value: &str) -> Option<&AnswerOption> {
        self.question
            .as_ref()?
            .answer_options
            .iter()
            .find(|opt| opt.value == value)
    }
}

impl From<&StepRecord> for InteractionStep {
    fn from(record: &StepRecord) -> Self {
        InteractionStep {
            id: record.id.clone(),
            parent_id: record.parent_id.clone(),
            script: record.script.clone(),
            question: record.question.as_ref().map(|q| Question {
                text: q.text.clone(),
                answer_options: q
                    .answer_options
                    .iter()
                    .map(|opt| AnswerOption {
                        value: opt.value.clone(),
                        next_step_id: opt.next_interaction_step_id.clone(),
                    })
                    .collect(),
            }),
        }
    }
}

/// Validated, immutable interaction-step tree for one contact.
#[derive(Debug, Clone)]
pub struct StepTree {
    steps: Vec<InteractionStep>,
    index: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
    root: usize,
}

impl StepTree {
    /// Build the node table and indices, rejecting corrupt configurations.
    pub fn new(steps: Vec<InteractionStep>) -> Result<Self, TreeError> {
        let mut index = HashMap::with_capacity(steps.len());
        for (pos, step) in steps.iter().enumerate() {
            if index.insert(step.id.clone(), pos).is_some() {
                return Err(TreeError::DuplicateStep {
                    step_id: step.id.clone(),
                });
            }
        }

        let roots: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.parent_id.is_none())
            .map(|(pos, _)| pos)
            .collect();
        let root = match roots.as_slice() {
            [only] => *only,
            [] => {
                return Err(TreeError::MalformedTree {
                    reason: "no parentless root step".to_string(),
                })
            }
            many => {
                let ids: Vec<&str> = many.iter().map(|&p| steps[p].id.as_str()).collect();
                return Err(TreeError::MalformedTree {
                    reason: format!("{} root steps: {}", ids.len(), ids.join(", ")),
                });
            }
        };

        let mut children: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, step) in steps.iter().enumerate() {
            if let Some(parent) = &step.parent_id {
                if !index.contains_key(parent) {
                    return Err(TreeError::DanglingReference {
                        step_id: step.id.clone(),
                        target: parent.clone(),
                        edge: EdgeKind::Parent,
                    });
                }
                children.entry(parent.clone()).or_default().push(pos);
            }
            for target in next_step_ids(step) {
                if !index.contains_key(target) {
                    return Err(TreeError::DanglingReference {
                        step_id: step.id.clone(),
                        target: target.to_string(),
                        edge: EdgeKind::NextStep,
                    });
                }
            }
        }

        let tree = StepTree {
            steps,
            index,
            children,
            root,
        };
        tree.check_ownership()?;
        tree.check_traversal_acyclic()?;
        Ok(tree)
    }

    /// Convert loaded step records and validate them.
    pub fn from_records(records: &[StepRecord]) -> Result<Self, TreeError> {
        Self::new(records.iter().map(InteractionStep::from).collect())
    }

    pub fn root(&self) -> &InteractionStep {
        &self.steps[self.root]
    }

    pub fn get(&self, id: &str) -> Option<&InteractionStep> {
        self.index.get(id).map(|&pos| &self.steps[pos])
    }

    /// Direct children by ownership edge, in input order.
    pub fn children(&self, id: &str) -> impl Iterator<Item = &InteractionStep> + '_ {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.steps[pos])
    }

    /// All steps in input order.
    pub fn steps(&self) -> &[InteractionStep] {
        &self.steps
    }

    pub fn question_steps(&self) -> impl Iterator<Item = &InteractionStep> + '_ {
        self.steps.iter().filter(|s| s.has_question())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every step must be owned, transitively, by the root. A parent cycle
    /// shows up here as steps the walk never reaches.
    fn check_ownership(&self) -> Result<(), TreeError> {
        let mut seen = vec![false; self.steps.len()];
        let mut queue = VecDeque::from([self.root]);
        seen[self.root] = true;
        while let Some(pos) = queue.pop_front() {
            for &child in self.children.get(&self.steps[pos].id).into_iter().flatten() {
                if !seen[child] {
                    seen[child] = true;
                    queue.push_back(child);
                }
            }
        }

        let orphans: Vec<&str> = self
            .steps
            .iter()
            .zip(&seen)
            .filter(|(_, &reached)| !reached)
            .map(|(s, _)| s.id.as_str())
            .collect();
        if orphans.is_empty() {
            Ok(())
        } else {
            Err(TreeError::MalformedTree {
                reason: format!("steps not owned by the root: {}", orphans.join(", ")),
            })
        }
    }

    /// Kahn's algorithm over traversal edges; anything left unprocessed sits
    /// on a cycle.
    fn check_traversal_acyclic(&self) -> Result<(), TreeError> {
        let mut in_degree = vec![0usize; self.steps.len()];
        let adj: Vec<Vec<usize>> = self
            .steps
            .iter()
            .map(|step| {
                let mut targets: Vec<usize> = next_step_ids(step)
                    .filter_map(|id| self.index.get(id).copied())
                    .collect();
                targets.sort_unstable();
                targets.dedup();
                targets
            })
            .collect();
        for targets in &adj {
            for &t in targets {
                in_degree[t] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..self.steps.len())
            .filter(|&pos| in_degree[pos] == 0)
            .collect();
        let mut processed: HashSet<usize> = HashSet::new();
        while let Some(pos) = queue.pop_front() {
            processed.insert(pos);
            for &t in &adj[pos] {
                in_degree[t] -= 1;
                if in_degree[t] == 0 {
                    queue.push_back(t);
                }
            }
        }

        match (0..self.steps.len()).find(|pos| !processed.contains(pos)) {
            None => Ok(()),
            Some(pos) => Err(TreeError::Cycle {
                step_id: self.steps[pos].id.clone(),
            }),
        }
    }
}

fn next_step_ids(step: &InteractionStep) -> impl Iterator<Item = &str> {
    step.question
        .iter()
        .flat_map(|q| q.answer_options.iter())
        .filter_map(|opt| opt.next_step_id.as_deref())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn step(id: &str, parent: Option<&str>, script: &str) -> InteractionStep {
        InteractionStep {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            script: Some(script.to_string()),
            question: None,
        }
    }

    pub fn question_step(
        id: &str,
        parent: Option<&str>,
        script: &str,
        text: &str,
        options: &[(&str, Option<&str>)],
    ) -> InteractionStep {
        InteractionStep {
            question: Some(Question {
                text: text.to_string(),
                answer_options: options
                    .iter()
                    .map(|(value, next)| AnswerOption {
                        value: value.to_string(),
                        next_step_id: next.map(str::to_string),
                    })
                    .collect(),
            }),
            ..step(id, parent, script)
        }
    }

    /// root("Support?": yes -> b, no -> b2); b("Volunteer?": x -> c); c; b2.
    pub fn support_tree() -> StepTree {
        StepTree::new(vec![
            question_step(
                "root",
                None,
                "Hi {firstName}, it's {texterFirstName}.",
                "Support?",
                &[("yes", Some("b")), ("no", Some("b2"))],
            ),
            question_step(
                "b",
                Some("root"),
                "Great! Will you volunteer?",
                "Volunteer?",
                &[("x", Some("c")), ("later", None)],
            ),
            step("c", Some("b"), "Thanks, see you in {district}."),
            step("b2", Some("root"), "Sorry to hear that."),
        ])
        .unwrap()
    }
}
