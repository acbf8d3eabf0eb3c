//! Single-use invite creation and delivery
//!
//! The whole attempt (export link, DM it) re-runs after a flood wait so
//! the user always receives a link that was just minted. The wait is
//! whatever the server mandated, no backoff on top.

use crate::actions::ActionOutcome;
use crate::logger::{self, LogTag};
use crate::telegram::{resolve_channel_alias, ProviderError, TelegramGate};
use std::time::Duration;

pub async fn run(
    gate: &dyn TelegramGate,
    channel_alias: &str,
    user_id: i64,
    is_paid: bool,
) -> ActionOutcome {
    let channel_id = match resolve_channel_alias(channel_alias) {
        Ok(id) => id,
        Err(err) => return ActionOutcome::Failure(err.to_string()),
    };

    let mut attempt = 1u32;
    loop {
        match attempt_once(gate, channel_id, user_id, is_paid).await {
            Ok(()) => return ActionOutcome::Success,
            Err(ProviderError::FloodWait(secs)) => {
                logger::warning(
                    LogTag::Action,
                    &format!(
                        "Invite for {} rate-limited, waiting {}s (attempt {})",
                        user_id, secs, attempt
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
    }
}

async fn attempt_once(
    gate: &dyn TelegramGate,
    channel_id: i64,
    user_id: i64,
    is_paid: bool,
) -> Result<(), ProviderError> {
    let link = gate.export_invite_link(channel_id).await?;
    let header = if is_paid {
        "✅ ¡Pago verificado!"
    } else {
        "🎁 ¡Invitación gratuita!"
    };
    let text = format!("{}\n\nAcceso único:\n{}", header, link);
    gate.send_with_link_button(user_id, &text, "🚀 ENTRAR AL CANAL", &link)
        .await
}
