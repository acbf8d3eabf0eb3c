//! Expired-subscriber removal
//!
//! Exactly one kick attempt per task. The backend cleanup that follows a
//! successful kick is best-effort: the user is already out, so a failed
//! notification is logged and the task still counts as done.

use crate::actions::ActionOutcome;
use crate::backend::BackendApi;
use crate::logger::{self, LogTag};
use crate::telegram::{ProviderError, TelegramGate};

pub async fn run(
    gate: &dyn TelegramGate,
    backend: &dyn BackendApi,
    channel_id: i64,
    user_id: i64,
) -> ActionOutcome {
    match gate.soft_kick(channel_id, user_id).await {
        Ok(()) => {}
        Err(ProviderError::FloodWait(secs)) => {
            return ActionOutcome::RateLimited { wait_secs: secs }
        }
        Err(ProviderError::PermissionDenied(reason)) => {
            return ActionOutcome::PermissionDenied(reason)
        }
        Err(ProviderError::Other(reason)) => return ActionOutcome::Failure(reason),
    }
    logger::info(
        LogTag::Action,
        &format!("User {} removed from channel {}", user_id, channel_id),
    );

    if let Err(err) = backend.delete_subscription(user_id, channel_id).await {
        logger::warning(
            LogTag::Backend,
            &format!("Subscription delete for user {} failed: {}", user_id, err),
        );
    }
    if let Err(err) = backend.post_event("salida_canal", user_id, channel_id).await {
        logger::warning(
            LogTag::Backend,
            &format!("Exit event for user {} failed: {}", user_id, err),
        );
    }
    ActionOutcome::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::mocks::{MockBackend, MockGate};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_one_kick_one_delete_one_event() {
        let gate = MockGate::default();
        let backend = MockBackend::default();

        let outcome = run(&gate, &backend, -1001234, 42).await;

        assert_eq!(outcome, ActionOutcome::Success);
        assert_eq!(gate.kicks.lock().unwrap().as_slice(), &[(-1001234, 42)]);
        assert_eq!(backend.deletes.lock().unwrap().as_slice(), &[(42, -1001234)]);
        let events = backend.events.lock().unwrap();
        assert_eq!(events.as_slice(), &[("salida_canal".to_string(), 42, -1001234)]);
    }

    #[tokio::test]
    async fn test_failing_backend_does_not_rekick() {
        let gate = MockGate::default();
        let backend = MockBackend::default();
        backend.fail_all.store(true, Ordering::SeqCst);

        let outcome = run(&gate, &backend, -1001234, 42).await;

        // the user is out; backend trouble is the backend's problem
        assert_eq!(outcome, ActionOutcome::Success);
        assert_eq!(gate.kicks.lock().unwrap().len(), 1);
        assert!(backend.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flood_wait_is_terminal_here() {
        let gate = MockGate::default();
        let backend = MockBackend::default();
        gate.kick_errors
            .lock()
            .unwrap()
            .push_back(ProviderError::FloodWait(17));

        let outcome = run(&gate, &backend, -1001234, 42).await;

        assert_eq!(outcome, ActionOutcome::RateLimited { wait_secs: 17 });
        assert!(gate.kicks.lock().unwrap().is_empty());
        assert!(backend.deletes.lock().unwrap().is_empty());
        assert!(backend.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permission_denied_skips_backend() {
        let gate = MockGate::default();
        let backend = MockBackend::default();
        gate.kick_errors
            .lock()
            .unwrap()
            .push_back(ProviderError::PermissionDenied("CHAT_ADMIN_REQUIRED".to_string()));

        let outcome = run(&gate, &backend, -1001234, 42).await;

        assert!(matches!(outcome, ActionOutcome::PermissionDenied(_)));
        assert!(backend.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_tasks_kick_twice() {
        let gate = MockGate::default();
        let backend = MockBackend::default();

        run(&gate, &backend, -1001234, 42).await;
        run(&gate, &backend, -1001234, 42).await;

        assert_eq!(gate.kicks.lock().unwrap().len(), 2);
        assert_eq!(backend.deletes.lock().unwrap().len(), 2);
    }
}
