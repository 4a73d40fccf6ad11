use std::future::Future;

use super::{make_message, TestResult};
use crate::{ContactStatus, TexterMutations};

pub(super) async fn run_message_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "messages",
            "untouched_contact_has_no_messages",
            untouched_contact_has_no_messages(factory).await,
        ),
        TestResult::from_result(
            "messages",
            "send_appends_to_conversation",
            send_appends_to_conversation(factory).await,
        ),
        TestResult::from_result(
            "messages",
            "receipt_carries_full_conversation",
            receipt_carries_full_conversation(factory).await,
        ),
        TestResult::from_result(
            "messages",
            "first_send_marks_contact_messaged",
            first_send_marks_contact_messaged(factory).await,
        ),
        TestResult::from_result(
            "messages",
            "reply_to_waiting_contact_marks_convo",
            reply_to_waiting_contact_marks_convo(factory).await,
        ),
        TestResult::from_result(
            "messages",
            "conversations_are_per_contact",
            conversations_are_per_contact(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn untouched_contact_has_no_messages<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let messages = s.messages("contact-1").await.map_err(|e| e.to_string())?;
    if !messages.is_empty() {
        return Err(format!("expected no messages, got {}", messages.len()));
    }
    Ok(())
}

async fn send_appends_to_conversation<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.send_message("contact-1", make_message("first"))
        .await
        .map_err(|e| e.to_string())?;
    s.send_message("contact-1", make_message("second"))
        .await
        .map_err(|e| e.to_string())?;

    let texts: Vec<String> = s
        .messages("contact-1")
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|m| m.text)
        .collect();
    if texts != ["first", "second"] {
        return Err(format!("expected [first, second], got {:?}", texts));
    }
    Ok(())
}

/// The receipt's message list matches what a later query returns.
async fn receipt_carries_full_conversation<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.send_message("contact-1", make_message("one"))
        .await
        .map_err(|e| e.to_string())?;
    let receipt = s
        .send_message("contact-1", make_message("two"))
        .await
        .map_err(|e| e.to_string())?;

    if receipt.contact_id != "contact-1" {
        return Err(format!("receipt for wrong contact {}", receipt.contact_id));
    }
    let stored = s.messages("contact-1").await.map_err(|e| e.to_string())?;
    if receipt.messages != stored {
        return Err("receipt conversation differs from stored conversation".to_string());
    }
    if stored.iter().any(|m| m.is_from_contact) {
        return Err("texter message recorded as coming from the contact".to_string());
    }
    Ok(())
}

async fn first_send_marks_contact_messaged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let before = s.contact_status("contact-1").await.map_err(|e| e.to_string())?;
    if before != ContactStatus::NeedsMessage {
        return Err(format!("expected needsMessage before sending, got {}", before));
    }
    let receipt = s
        .send_message("contact-1", make_message("hello"))
        .await
        .map_err(|e| e.to_string())?;
    if receipt.message_status != ContactStatus::Messaged {
        return Err(format!(
            "expected receipt status messaged, got {}",
            receipt.message_status
        ));
    }
    let after = s.contact_status("contact-1").await.map_err(|e| e.to_string())?;
    if after != ContactStatus::Messaged {
        return Err(format!("expected messaged, got {}", after));
    }
    Ok(())
}

async fn reply_to_waiting_contact_marks_convo<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.edit_contact_status("contact-1", ContactStatus::NeedsResponse)
        .await
        .map_err(|e| e.to_string())?;
    let receipt = s
        .send_message("contact-1", make_message("reply"))
        .await
        .map_err(|e| e.to_string())?;
    if receipt.message_status != ContactStatus::Convo {
        return Err(format!("expected convo, got {}", receipt.message_status));
    }
    Ok(())
}

async fn conversations_are_per_contact<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TexterMutations,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.send_message("contact-1", make_message("for one"))
        .await
        .map_err(|e| e.to_string())?;
    let other = s.messages("contact-2").await.map_err(|e| e.to_string())?;
    if !other.is_empty() {
        return Err("message leaked into another contact's conversation".to_string());
    }
    let status = s.contact_status("contact-2").await.map_err(|e| e.to_string())?;
    if status != ContactStatus::NeedsMessage {
        return Err(format!("other contact's status changed to {}", status));
    }
    Ok(())
}
