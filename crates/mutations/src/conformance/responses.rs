use std::future::Future;

use super::{make_response, TestResult};
use crate::TexterMutations;

pub(super) async fn run_response_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "responses",
            "update_stores_answers",
            update_stores_answers(factory).await,
        ),
        TestResult::from_result(
            "responses",
            "update_replaces_existing_answer",
            update_replaces_existing_answer(factory).await,
        ),
        TestResult::from_result(
            "responses",
            "delete_removes_only_named_steps",
            delete_removes_only_named_steps(factory).await,
        ),
        TestResult::from_result(
            "responses",
            "delete_of_unknown_step_is_ignored",
            delete_of_unknown_step_is_ignored(factory).await,
        ),
        TestResult::from_result(
            "responses",
            "empty_batches_are_accepted",
            empty_batches_are_accepted(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn update_stores_answers<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.update_question_responses(
        "contact-1",
        vec![
            make_response("contact-1", "step-1", "yes"),
            make_response("contact-1", "step-2", "later"),
        ],
    )
    .await
    .map_err(|e| e.to_string())?;

    let stored = s
        .question_responses("contact-1")
        .await
        .map_err(|e| e.to_string())?;
    if stored.get("step-1").map(String::as_str) != Some("yes")
        || stored.get("step-2").map(String::as_str) != Some("later")
    {
        return Err(format!("unexpected stored answers {:?}", stored));
    }
    Ok(())
}

async fn update_replaces_existing_answer<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for value in ["yes", "no"] {
        s.update_question_responses(
            "contact-1",
            vec![make_response("contact-1", "step-1", value)],
        )
        .await
        .map_err(|e| e.to_string())?;
    }

    let stored = s
        .question_responses("contact-1")
        .await
        .map_err(|e| e.to_string())?;
    if stored.len() != 1 || stored.get("step-1").map(String::as_str) != Some("no") {
        return Err(format!("expected only step-1 = no, got {:?}", stored));
    }
    Ok(())
}

async fn delete_removes_only_named_steps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.update_question_responses(
        "contact-1",
        vec![
            make_response("contact-1", "step-1", "yes"),
            make_response("contact-1", "step-2", "x"),
        ],
    )
    .await
    .map_err(|e| e.to_string())?;
    s.delete_question_responses("contact-1", vec!["step-2".to_string()])
        .await
        .map_err(|e| e.to_string())?;

    let stored = s
        .question_responses("contact-1")
        .await
        .map_err(|e| e.to_string())?;
    if stored.contains_key("step-2") {
        return Err("deleted answer still present".to_string());
    }
    if stored.get("step-1").map(String::as_str) != Some("yes") {
        return Err("delete removed an answer it was not asked to".to_string());
    }
    Ok(())
}

async fn delete_of_unknown_step_is_ignored<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.delete_question_responses("contact-1", vec!["never-answered".to_string()])
        .await
        .map_err(|e| format!("delete of unknown step failed: {}", e))?;
    Ok(())
}

async fn empty_batches_are_accepted<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.update_question_responses("contact-1", Vec::new())
        .await
        .map_err(|e| e.to_string())?;
    s.delete_question_responses("contact-1", Vec::new())
        .await
        .map_err(|e| e.to_string())?;
    let stored = s
        .question_responses("contact-1")
        .await
        .map_err(|e| e.to_string())?;
    if !stored.is_empty() {
        return Err(format!("expected no answers, got {:?}", stored));
    }
    Ok(())
}
