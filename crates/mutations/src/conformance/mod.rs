//! Conformance test suite for `TexterMutations` implementations.
//!
//! A backend-agnostic suite any `TexterMutations` implementation can run to
//! check that it behaves the way the session layer expects. It covers:
//!
//! - **Messages**: sends append to the conversation and advance the status
//! - **Responses**: upserts replace, deletes remove, unknown ids are ignored
//! - **Status**: edits are visible to queries, opt-outs are recorded per cell
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that builds a
//! fresh, empty backend for each test:
//!
//! ```ignore
//! use texter_mutations::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn graphql_conformance() {
//!     let report = run_conformance_suite(|| async { connect_test_backend().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod messages;
mod responses;
mod status;

use std::fmt;
use std::future::Future;

use crate::record::{MessageInput, QuestionResponseInput};
use crate::TexterMutations;

/// Outcome of one conformance check.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Suite the check belongs to: "messages", "responses" or "status".
    pub category: &'static str,
    pub name: &'static str,
    /// Why the check failed; `None` when it passed.
    pub failure: Option<String>,
}

impl TestResult {
    fn from_result(category: &'static str, name: &'static str, result: Result<(), String>) -> Self {
        Self {
            category,
            name,
            failure: result.err(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Per-suite tally inside a [`ConformanceReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryTally {
    pub category: &'static str,
    pub passed: usize,
    pub total: usize,
}

/// Every check of a suite run, in run order.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ConformanceReport {
    fn new(results: Vec<TestResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        let total = results.len();
        Self {
            results,
            passed,
            failed: total - passed,
            total,
        }
    }

    /// Tallies per category, in the order the suites ran.
    pub fn categories(&self) -> Vec<CategoryTally> {
        let mut tallies: Vec<CategoryTally> = Vec::new();
        for r in &self.results {
            let pos = match tallies.iter().position(|t| t.category == r.category) {
                Some(pos) => pos,
                None => {
                    tallies.push(CategoryTally {
                        category: r.category,
                        passed: 0,
                        total: 0,
                    });
                    tallies.len() - 1
                }
            };
            let tally = &mut tallies[pos];
            tally.total += 1;
            if r.passed() {
                tally.passed += 1;
            }
        }
        tallies
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mutations conformance: {}/{} checks passed", self.passed, self.total)?;
        for tally in self.categories() {
            writeln!(f, "  {:<10} {}/{}", tally.category, tally.passed, tally.total)?;
            let failures = self
                .results
                .iter()
                .filter(|r| r.category == tally.category)
                .filter_map(|r| Some((r.name, r.failure.as_deref()?)));
            for (name, why) in failures {
                writeln!(f, "    {}: {}", name, why)?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a backend.
///
/// `factory` is called once per test so every test starts from an empty
/// backend.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(messages::run_message_tests(&factory).await);
    results.extend(responses::run_response_tests(&factory).await);
    results.extend(status::run_status_tests(&factory).await);

    ConformanceReport::new(results)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const TEST_CELL: &str = "+15555550100";

fn make_message(text: &str) -> MessageInput {
    MessageInput {
        contact_number: TEST_CELL.to_string(),
        user_id: "texter-1".to_string(),
        text: text.to_string(),
        assignment_id: "assignment-1".to_string(),
    }
}

fn make_response(contact_id: &str, step_id: &str, value: &str) -> QuestionResponseInput {
    QuestionResponseInput {
        interaction_step_id: step_id.to_string(),
        campaign_contact_id: contact_id.to_string(),
        value: value.to_string(),
    }
}
