//! Task message schema shared by producers and workers
//!
//! Messages travel as JSON over the bus; the `action` field selects the
//! variant. Messages are immutable once published and carry no identity or
//! deduplication key: publishing the same task twice runs it twice.

use serde::{Deserialize, Serialize};

/// Queue (bus channel) names in use
pub mod queues {
    /// Payment links and invite creation
    pub const INVITATION: &str = "invitation_queue";
    /// Managed channel/supergroup creation
    pub const GROUP_CREATION: &str = "group_creation_queue";
    /// Expired subscriber removal
    pub const USER_REMOVAL: &str = "user_removal_queue";
}

/// A single task for a worker, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskMessage {
    /// DM a payment link to a user, as text plus an actionable button
    SendPaymentLink { user_id: i64, payment_link: String },

    /// Issue a single-use invite for a channel and DM it to the user
    CreateInvite {
        channel_alias: String,
        user_id: i64,
        #[serde(default = "default_true")]
        is_paid: bool,
    },

    /// Soft-kick an expired subscriber out of a channel
    RemoveUser { channel_id: i64, user_id: i64 },

    /// Create a managed channel/supergroup for a client
    CreateGroup {
        name: String,
        username: String,
        owner_id: i64,
        #[serde(default)]
        is_private: bool,
    },
}

fn default_true() -> bool {
    true
}

impl TaskMessage {
    /// Parse a raw bus payload. Unknown actions and missing fields are
    /// errors; the consumer drops such messages without stopping.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Action name as it appears on the wire
    pub fn action(&self) -> &'static str {
        match self {
            TaskMessage::SendPaymentLink { .. } => "send_payment_link",
            TaskMessage::CreateInvite { .. } => "create_invite",
            TaskMessage::RemoveUser { .. } => "remove_user",
            TaskMessage::CreateGroup { .. } => "create_group",
        }
    }
}
