//! Managed channel creation
//!
//! Creates the supergroup, assigns the public alias when requested, then
//! registers the channel with the backend. A flood wait re-runs the whole
//! Telegram-side attempt; registration failure is logged but does not undo
//! the channel that already exists.

use crate::actions::ActionOutcome;
use crate::backend::{BackendApi, ChannelRecord};
use crate::logger::{self, LogTag};
use crate::telegram::{CreatedChannel, ProviderError, TelegramGate};
use std::time::Duration;

pub async fn run(
    gate: &dyn TelegramGate,
    backend: &dyn BackendApi,
    name: &str,
    username: &str,
    owner_id: i64,
    is_private: bool,
) -> ActionOutcome {
    let about = format!("Canal VIP administrado por el cliente {}.", owner_id);

    let mut attempt = 1u32;
    let channel = loop {
        match attempt_once(gate, name, &about, username, is_private).await {
            Ok(channel) => break channel,
            Err(ProviderError::FloodWait(secs)) => {
                logger::warning(
                    LogTag::Action,
                    &format!(
                        "Channel creation for owner {} rate-limited, waiting {}s (attempt {})",
                        owner_id, secs, attempt
                    ),
                );
                tokio::time::sleep(Duration::from_secs(secs)).await;
                attempt += 1;
            }
            Err(ProviderError::PermissionDenied(reason)) => {
                return ActionOutcome::PermissionDenied(reason)
            }
            Err(ProviderError::Other(reason)) => return ActionOutcome::Failure(reason),
        }
    };
    logger::info(
        LogTag::Action,
        &format!("Channel '{}' ({}) created for owner {}", channel.title, channel.id, owner_id),
    );

    let record = ChannelRecord {
        id: channel.id,
        title: channel.title.clone(),
        access_hash: channel.access_hash.to_string(),
        is_vip: true,
        owner_id,
    };
    if let Err(err) = backend.register_channel(&record).await {
        logger::warning(
            LogTag::Backend,
            &format!("Channel {} created but not registered: {}", channel.id, err),
        );
    }
    ActionOutcome::Success
}

async fn attempt_once(
    gate: &dyn TelegramGate,
    name: &str,
    about: &str,
    username: &str,
    is_private: bool,
) -> Result<CreatedChannel, ProviderError> {
    let channel = gate.create_channel(name, about).await?;
    if !is_private {
        gate.assign_username(&channel, username).await?;
    }
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::mocks::{MockBackend, MockGate};

    #[tokio::test]
    async fn test_public_channel_gets_alias_and_registration() {
        let gate = MockGate::default();
        let backend = MockBackend::default();

        let outcome = run(&gate, &backend, "Canal VIP", "canal_vip", 7, false).await;

        assert_eq!(outcome, ActionOutcome::Success);
        let created = gate.created.lock().unwrap();
        assert_eq!(created[0].0, "Canal VIP");
        assert!(created[0].1.contains("cliente 7"));
        assert_eq!(gate.usernames.lock().unwrap().as_slice(), &["canal_vip".to_string()]);

        let registered = backend.registered.lock().unwrap();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].title, "Canal VIP");
        assert_eq!(registered[0].owner_id, 7);
        assert!(registered[0].is_vip);
        // access_hash travels as a string
        assert_eq!(registered[0].access_hash, registered[0].access_hash.trim());
        assert!(registered[0].access_hash.parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn test_private_channel_skips_the_alias() {
        let gate = MockGate::default();
        let backend = MockBackend::default();

        let outcome = run(&gate, &backend, "Canal VIP", "ignored", 7, true).await;

        assert_eq!(outcome, ActionOutcome::Success);
        assert!(gate.usernames.lock().unwrap().is_empty());
        assert_eq!(backend.registered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_occupied_alias_is_terminal() {
        let gate = MockGate::default();
        let backend = MockBackend::default();
        gate.username_errors
            .lock()
            .unwrap()
            .push_back(ProviderError::PermissionDenied("USERNAME_OCCUPIED".to_string()));

        let outcome = run(&gate, &backend, "Canal VIP", "taken", 7, false).await;

        assert!(matches!(outcome, ActionOutcome::PermissionDenied(_)));
        assert!(backend.registered.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flood_wait_reruns_the_whole_attempt() {
        let gate = MockGate::default();
        let backend = MockBackend::default();
        gate.create_errors
            .lock()
            .unwrap()
            .push_back(ProviderError::FloodWait(3));

        let started = tokio::time::Instant::now();
        let outcome = run(&gate, &backend, "Canal VIP", "canal_vip", 7, false).await;

        assert_eq!(outcome, ActionOutcome::Success);
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(gate.created.lock().unwrap().len(), 1);
        assert_eq!(backend.registered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_registration_failure_is_still_success() {
        use std::sync::atomic::Ordering;

        let gate = MockGate::default();
        let backend = MockBackend::default();
        backend.fail_all.store(true, Ordering::SeqCst);

        let outcome = run(&gate, &backend, "Canal VIP", "canal_vip", 7, false).await;

        assert_eq!(outcome, ActionOutcome::Success);
        assert_eq!(gate.created.lock().unwrap().len(), 1);
        assert!(backend.registered.lock().unwrap().is_empty());
    }
}
