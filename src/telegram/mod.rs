//! Telegram provider seam
//!
//! The action executors run against the [`TelegramGate`] trait so the state
//! machines stay testable without a live session; [`client::MtprotoGate`]
//! is the production implementation over a single admin user session.

pub mod client;

use async_trait::async_trait;
use thiserror::Error;

/// Provider-side failures, classified the way the executors react to them.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Server-mandated wait before the operation may be retried
    #[error("flood wait of {0}s required by the provider")]
    FloodWait(u64),

    /// Missing admin rights, occupied alias, and other terminal
    /// permission-class refusals; operator intervention required
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Anything else; terminal for the current task
    #[error("{0}")]
    Other(String),
}

/// A channel created on behalf of a client. `id` is the bare (unmarked)
/// channel id as the provider reports it; `access_hash` is the credential
/// the backend stores alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedChannel {
    pub id: i64,
    pub access_hash: i64,
    pub title: String,
}

/// The Telegram operations the executors need. One live session per worker
/// process; the session serializes its own network I/O, so interleaved
/// calls from concurrent executors are safe.
#[async_trait]
pub trait TelegramGate: Send + Sync {
    /// DM `text` to a user with a single URL button underneath. The URL is
    /// expected to also appear in the text as a fallback.
    async fn send_with_link_button(
        &self,
        user_id: i64,
        text: &str,
        button_label: &str,
        url: &str,
    ) -> Result<(), ProviderError>;

    /// Request a single-use invite link (usage limit 1) for a channel.
    /// `channel_id` is the marked (`-100…`) id. Resolution happens per
    /// call; nothing is cached across tasks.
    async fn export_invite_link(&self, channel_id: i64) -> Result<String, ProviderError>;

    /// Remove a member with a self-expiring restriction (soft-kick): the
    /// user is kicked out but their standing to rejoin is restored
    /// automatically. Never a permanent ban.
    async fn soft_kick(&self, channel_id: i64, user_id: i64) -> Result<(), ProviderError>;

    /// Create a managed supergroup.
    async fn create_channel(
        &self,
        title: &str,
        about: &str,
    ) -> Result<CreatedChannel, ProviderError>;

    /// Assign a public alias to a freshly created channel.
    async fn assign_username(
        &self,
        channel: &CreatedChannel,
        username: &str,
    ) -> Result<(), ProviderError>;
}

/// Resolve a numeric channel alias into a marked channel id: aliases with
/// no sign prefix get the `-100` supergroup prefix, already-signed values
/// pass through untouched.
pub fn resolve_channel_alias(alias: &str) -> Result<i64, ProviderError> {
    let trimmed = alias.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::Other("empty channel alias".to_string()));
    }
    let marked = if trimmed.starts_with('-') {
        trimmed.to_string()
    } else {
        format!("-100{}", trimmed)
    };
    marked
        .parse::<i64>()
        .map_err(|_| ProviderError::Other(format!("non-numeric channel alias: {}", alias)))
}

/// Strip the marker from a channel id: `-100`-prefixed supergroup ids and
/// plain negative chat ids both map back to the provider's bare positive
/// id. Bare ids pass through.
pub fn bare_channel_id(marked: i64) -> i64 {
    if marked <= -1_000_000_000_000 {
        -marked - 1_000_000_000_000
    } else if marked < 0 {
        -marked
    } else {
        marked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_gets_100_prefix() {
        assert_eq!(resolve_channel_alias("1234567890").unwrap(), -1001234567890);
        assert_eq!(resolve_channel_alias("42").unwrap(), -10042);
    }

    #[test]
    fn test_signed_alias_passes_through() {
        assert_eq!(resolve_channel_alias("-1001234567890").unwrap(), -1001234567890);
        assert_eq!(resolve_channel_alias("-123").unwrap(), -123);
    }

    #[test]
    fn test_non_numeric_alias_is_an_error() {
        assert!(resolve_channel_alias("canal_vip").is_err());
        assert!(resolve_channel_alias("").is_err());
    }

    #[test]
    fn test_bare_channel_id_unmarks() {
        assert_eq!(bare_channel_id(-1001234567890), 1234567890);
        assert_eq!(bare_channel_id(-12345), 12345);
        assert_eq!(bare_channel_id(1234567890), 1234567890);
    }
}
