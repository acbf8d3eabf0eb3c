//! Action executors
//!
//! One executor per task variant. Executors own their retry policy: the
//! invite and group-creation flows sleep out server-mandated waits and try
//! again, everything else treats provider errors as terminal. Outcomes are
//! logged here so the consumer stays a thin dispatch loop.

pub mod group;
pub mod invite;
pub mod payment_link;
pub mod remove;

use crate::backend::BackendApi;
use crate::logger::{self, LogTag};
use crate::messages::TaskMessage;
use crate::telegram::TelegramGate;

/// Terminal result of one task.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Success,
    /// Server-mandated wait on an action that does not retry
    RateLimited { wait_secs: u64 },
    /// Missing rights or an occupied alias; needs operator attention
    PermissionDenied(String),
    Failure(String),
}

/// Run one task to completion and log its outcome.
pub async fn dispatch(
    message: TaskMessage,
    gate: &dyn TelegramGate,
    backend: &dyn BackendApi,
) -> ActionOutcome {
    let action = message.action();
    let outcome = match message {
        TaskMessage::SendPaymentLink { user_id, payment_link } => {
            self::payment_link::run(gate, user_id, &payment_link).await
        }
        TaskMessage::CreateInvite { channel_alias, user_id, is_paid } => {
            invite::run(gate, &channel_alias, user_id, is_paid).await
        }
        TaskMessage::RemoveUser { channel_id, user_id } => {
            remove::run(gate, backend, channel_id, user_id).await
        }
        TaskMessage::CreateGroup { name, username, owner_id, is_private } => {
            group::run(gate, backend, &name, &username, owner_id, is_private).await
        }
    };

    match &outcome {
        ActionOutcome::Success => {
            logger::info(LogTag::Action, &format!("{} completed", action));
        }
        ActionOutcome::RateLimited { wait_secs } => {
            logger::warning(
                LogTag::Action,
                &format!("{} rate-limited for {}s, not retried", action, wait_secs),
            );
        }
        ActionOutcome::PermissionDenied(reason) => {
            logger::error(LogTag::Action, &format!("{} denied: {}", action, reason));
        }
        ActionOutcome::Failure(reason) => {
            logger::error(LogTag::Action, &format!("{} failed: {}", action, reason));
        }
    }
    outcome
}
