use std::future::Future;

use super::{TestResult, TEST_CELL};
use crate::{ContactStatus, OptOutInput, TexterMutations};

pub(super) async fn run_status_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "status",
            "edit_status_is_visible",
            edit_status_is_visible(factory).await,
        ),
        TestResult::from_result(
            "status",
            "closed_contact_can_be_reopened",
            closed_contact_can_be_reopened(factory).await,
        ),
        TestResult::from_result(
            "status",
            "opt_out_is_recorded_by_cell",
            opt_out_is_recorded_by_cell(factory).await,
        ),
        TestResult::from_result(
            "status",
            "unknown_cell_has_no_opt_out",
            unknown_cell_has_no_opt_out(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn edit_status_is_visible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.edit_contact_status("contact-1", ContactStatus::Closed)
        .await
        .map_err(|e| e.to_string())?;
    let status = s.contact_status("contact-1").await.map_err(|e| e.to_string())?;
    if status != ContactStatus::Closed {
        return Err(format!("expected closed, got {}", status));
    }
    Ok(())
}

async fn closed_contact_can_be_reopened<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for status in [ContactStatus::Closed, ContactStatus::NeedsResponse] {
        s.edit_contact_status("contact-1", status)
            .await
            .map_err(|e| e.to_string())?;
    }
    let status = s.contact_status("contact-1").await.map_err(|e| e.to_string())?;
    if status != ContactStatus::NeedsResponse {
        return Err(format!("expected needsResponse, got {}", status));
    }
    Ok(())
}

async fn opt_out_is_recorded_by_cell<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create_opt_out(
            "contact-1",
            OptOutInput {
                cell: TEST_CELL.to_string(),
                assignment_id: "assignment-1".to_string(),
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    if created.cell != TEST_CELL || created.assignment_id != "assignment-1" {
        return Err(format!("opt-out record has wrong fields: {:?}", created));
    }
    let found = s.opt_out(TEST_CELL).await.map_err(|e| e.to_string())?;
    if found.as_ref() != Some(&created) {
        return Err(format!("expected {:?}, got {:?}", created, found));
    }
    Ok(())
}

async fn unknown_cell_has_no_opt_out<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let found = s.opt_out("+15555550199").await.map_err(|e| e.to_string())?;
    if found.is_some() {
        return Err(format!("expected no opt-out, got {:?}", found));
    }
    Ok(())
}
