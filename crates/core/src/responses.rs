//! Session-local answers, keyed by interaction step id.
//!
//! Only steps with a non-empty question text ever become keys. A key with a
//! `None` value is an explicitly cleared (or never given) answer; it is
//! distinct from a missing key, which the submission path never touches.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::tree::StepTree;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResponseStore {
    entries: BTreeMap<String, Option<String>>,
}

/// The store split into what the backend should upsert and what it should
/// delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub to_persist: Vec<(String, String)>,
    pub to_delete: Vec<String>,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.to_persist.is_empty() && self.to_delete.is_empty()
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

impl ResponseStore {
    /// One key per question step, valued from `persisted` when present.
    pub fn seed(tree: &StepTree, persisted: &BTreeMap<String, String>) -> Self {
        let entries = tree
            .question_steps()
            .map(|step| {
                let value = normalize(persisted.get(&step.id).map(String::as_str));
                (step.id.clone(), value)
            })
            .collect();
        ResponseStore { entries }
    }

    pub fn get(&self, step_id: &str) -> Option<&str> {
        self.entries.get(step_id).and_then(|v| v.as_deref())
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.entries.contains_key(step_id)
    }

    /// Empty strings are stored as `None`: an empty answer is no answer.
    pub(crate) fn set(&mut self, step_id: &str, value: Option<&str>) {
        self.entries.insert(step_id.to_string(), normalize(value));
    }

    /// Null out an existing key; returns whether a key was present.
    pub(crate) fn clear_if_present(&mut self, step_id: &str) -> bool {
        match self.entries.get_mut(step_id) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn partition(&self) -> Partition {
        let mut partition = Partition::default();
        for (step_id, value) in &self.entries {
            match value {
                Some(v) => partition.to_persist.push((step_id.clone(), v.clone())),
                None => partition.to_delete.push(step_id.clone()),
            }
        }
        partition
    }
}
