//! Production Telegram client over a single admin user session
//!
//! One session per worker process, created at startup and owned by the
//! worker's main routine. Chats are resolved lazily per task (dialog scan,
//! participant scan as fallback) and never cached across tasks.

use crate::config::Config;
use crate::logger::{self, LogTag};
use crate::telegram::{bare_channel_id, CreatedChannel, ProviderError, TelegramGate};
use anyhow::{Context, Result};
use async_trait::async_trait;
use grammers_client::session::{PackedChat, PackedType, Session};
use grammers_client::{button, reply_markup, Client, Config as SessionConfig, InitParams, InputMessage};
use grammers_client::InvocationError;
use grammers_tl_types as tl;

pub struct MtprotoGate {
    client: Client,
}

impl MtprotoGate {
    /// Connect and verify the saved session is authorized. An
    /// unauthorized or unreachable session is an unrecoverable startup
    /// failure: the worker exits and the supervisor's relaunch loop
    /// surfaces the condition in the logs.
    pub async fn connect(config: &Config) -> Result<Self> {
        let session_file = format!("{}.session", config.session);
        let client = Client::connect(SessionConfig {
            session: Session::load_file_or_create(&session_file)
                .with_context(|| format!("failed to open session file {}", session_file))?,
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .context("failed to connect to Telegram")?;

        if !client
            .is_authorized()
            .await
            .context("failed to check session authorization")?
        {
            anyhow::bail!(
                "session '{}' is not authorized; authenticate it interactively first",
                config.session
            );
        }

        if let Err(e) = client.session().save_to_file(&session_file) {
            logger::warning(
                LogTag::Telegram,
                &format!("Could not persist session file {}: {}", session_file, e),
            );
        }

        logger::info(
            LogTag::Telegram,
            &format!("Session '{}' connected and authorized", config.session),
        );
        Ok(Self { client })
    }

    /// Find a channel among the session's dialogs by its marked id.
    async fn resolve_channel(&self, channel_id: i64) -> Result<PackedChat, ProviderError> {
        let bare = bare_channel_id(channel_id);
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await.map_err(map_invocation)? {
            let chat = dialog.chat();
            if chat.id() == bare {
                return Ok(chat.pack());
            }
        }
        Err(ProviderError::Other(format!(
            "channel {} not found among the session's dialogs",
            channel_id
        )))
    }

    /// Locate a member inside a channel. Needed when the target user has
    /// not been seen since client startup and is not directly addressable.
    async fn find_member(
        &self,
        channel: PackedChat,
        user_id: i64,
    ) -> Result<PackedChat, ProviderError> {
        let mut participants = self.client.iter_participants(channel);
        while let Some(participant) = participants.next().await.map_err(map_invocation)? {
            if participant.user.id() == user_id {
                return Ok(participant.user.pack());
            }
        }
        Err(ProviderError::Other(format!(
            "user {} is not a member of the channel",
            user_id
        )))
    }
}

#[async_trait]
impl TelegramGate for MtprotoGate {
    async fn send_with_link_button(
        &self,
        user_id: i64,
        text: &str,
        button_label: &str,
        url: &str,
    ) -> Result<(), ProviderError> {
        let target = PackedChat {
            ty: PackedType::User,
            id: user_id,
            access_hash: None,
        };
        let markup = reply_markup::inline(vec![vec![button::url(button_label, url)]]);
        let message = InputMessage::text(text).reply_markup(&markup);
        self.client
            .send_message(target, message)
            .await
            .map_err(map_invocation)?;
        logger::debug(LogTag::Telegram, &format!("DM sent to {}", user_id));
        Ok(())
    }

    async fn export_invite_link(&self, channel_id: i64) -> Result<String, ProviderError> {
        let channel = self.resolve_channel(channel_id).await?;
        let peer: tl::enums::InputPeer = tl::types::InputPeerChannel {
            channel_id: channel.id,
            access_hash: channel.access_hash.unwrap_or(0),
        }
        .into();

        let request = tl::functions::messages::ExportChatInvite {
            legacy_revoke_permanent: false,
            request_needed: false,
            peer,
            expire_date: None,
            usage_limit: Some(1),
            title: Some("Acceso VIP".to_string()),
            subscription_pricing: None,
        };
        match self.client.invoke(&request).await.map_err(map_invocation)? {
            tl::enums::ExportedChatInvite::ChatInviteExported(invite) => Ok(invite.link),
            other => Err(ProviderError::Other(format!(
                "unexpected invite response: {:?}",
                other
            ))),
        }
    }

    async fn soft_kick(&self, channel_id: i64, user_id: i64) -> Result<(), ProviderError> {
        let channel = self.resolve_channel(channel_id).await?;

        // Direct resolution first; fall back to the member list when the
        // user is unknown to the session cache.
        let direct = PackedChat {
            ty: PackedType::User,
            id: user_id,
            access_hash: None,
        };
        match self.client.kick_participant(channel, direct).await {
            Ok(()) => Ok(()),
            Err(err) if is_unresolved_peer(&err) => {
                logger::debug(
                    LogTag::Telegram,
                    &format!("User {} not cached, scanning the member list", user_id),
                );
                let member = self.find_member(channel, user_id).await?;
                self.client
                    .kick_participant(channel, member)
                    .await
                    .map_err(map_invocation)
            }
            Err(err) => Err(map_invocation(err)),
        }
    }

    async fn create_channel(
        &self,
        title: &str,
        about: &str,
    ) -> Result<CreatedChannel, ProviderError> {
        let request = tl::functions::channels::CreateChannel {
            broadcast: false,
            megagroup: true,
            for_import: false,
            forum: false,
            title: title.to_string(),
            about: about.to_string(),
            geo_point: None,
            address: None,
            ttl_period: None,
        };
        let updates = self.client.invoke(&request).await.map_err(map_invocation)?;

        let chats = match updates {
            tl::enums::Updates::Updates(u) => u.chats,
            tl::enums::Updates::Combined(u) => u.chats,
            _ => Vec::new(),
        };
        for chat in chats {
            if let tl::enums::Chat::Channel(ch) = chat {
                return Ok(CreatedChannel {
                    id: ch.id,
                    access_hash: ch.access_hash.unwrap_or(0),
                    title: ch.title,
                });
            }
        }
        Err(ProviderError::Other(
            "channel creation returned no channel".to_string(),
        ))
    }

    async fn assign_username(
        &self,
        channel: &CreatedChannel,
        username: &str,
    ) -> Result<(), ProviderError> {
        let input: tl::enums::InputChannel = tl::types::InputChannel {
            channel_id: channel.id,
            access_hash: channel.access_hash,
        }
        .into();
        let accepted = self
            .client
            .invoke(&tl::functions::channels::UpdateUsername {
                channel: input,
                username: username.to_string(),
            })
            .await
            .map_err(map_invocation)?;
        if !accepted {
            return Err(ProviderError::Other(format!(
                "provider refused the alias @{}",
                username
            )));
        }
        Ok(())
    }
}

/// Map a raw invocation error onto the executor-facing taxonomy.
fn map_invocation(err: InvocationError) -> ProviderError {
    match err {
        InvocationError::Rpc(rpc) => {
            if rpc.code == 420 || rpc.name.starts_with("FLOOD_WAIT") {
                ProviderError::FloodWait(u64::from(rpc.value.unwrap_or(30)))
            } else if matches!(
                rpc.name.as_str(),
                "CHAT_ADMIN_REQUIRED"
                    | "CHAT_WRITE_FORBIDDEN"
                    | "USER_ADMIN_INVALID"
                    | "CHANNELS_ADMIN_PUBLIC_TOO_MUCH"
                    | "USERNAME_OCCUPIED"
                    | "USERNAME_INVALID"
            ) {
                ProviderError::PermissionDenied(rpc.to_string())
            } else {
                ProviderError::Other(rpc.to_string())
            }
        }
        other => ProviderError::Other(other.to_string()),
    }
}

fn is_unresolved_peer(err: &InvocationError) -> bool {
    match err {
        InvocationError::Rpc(rpc) => matches!(
            rpc.name.as_str(),
            "PEER_ID_INVALID" | "USER_ID_INVALID" | "PARTICIPANT_ID_INVALID"
        ),
        _ => false,
    }
}
