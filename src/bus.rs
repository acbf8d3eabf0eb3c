//! Message bus adapter over Redis pub/sub
//!
//! Delivery is at-most-once and non-durable: a message published with no
//! live subscriber is lost, and a reconnecting subscriber sees nothing
//! retroactively. The system tolerates that loss (workers are restarted by
//! the supervisor); it never tolerates corruption, so payload validation
//! happens in the consumer, not here.

use crate::logger::{self, LogTag};
use crate::messages::TaskMessage;
use anyhow::{Context, Result};
use redis::AsyncCommands;

/// Handle to the bus. Cheap to clone; connections are created per use
/// (publishers) or per subscription loop (workers).
#[derive(Clone)]
pub struct Bus {
    client: redis::Client,
}

impl Bus {
    /// Validate the address and build a client. No connection is opened
    /// until the first publish/subscribe.
    pub fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .with_context(|| format!("invalid bus address: {}", url))?;
        Ok(Self { client })
    }

    /// Publish one task message on a named queue. Fan-out to whatever
    /// subscribers are currently connected; zero subscribers means the
    /// message is gone.
    pub async fn publish(&self, queue: &str, message: &TaskMessage) -> Result<()> {
        let payload = message.to_json().context("failed to serialize task message")?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to the bus")?;
        let receivers: i64 = conn
            .publish(queue, &payload)
            .await
            .with_context(|| format!("failed to publish on '{}'", queue))?;
        if receivers == 0 {
            logger::warning(
                LogTag::Bus,
                &format!("Published on '{}' with no live subscribers (message lost)", queue),
            );
        }
        Ok(())
    }

    /// Blocking subscription loop, meant for a dedicated thread.
    ///
    /// Calls `on_message` with each raw payload; when the handler returns
    /// `false` (receiver side hung up) the loop stops. Returns an error if
    /// the connection drops, so the caller can decide to exit the process
    /// and let the supervisor restart it.
    pub fn subscribe_blocking<F>(&self, queue: &str, mut on_message: F) -> Result<()>
    where
        F: FnMut(String) -> bool,
    {
        let mut conn = self
            .client
            .get_connection()
            .context("failed to connect to the bus")?;
        let mut pubsub = conn.as_pubsub();
        pubsub
            .subscribe(queue)
            .with_context(|| format!("failed to subscribe to '{}'", queue))?;

        logger::info(LogTag::Bus, &format!("Subscribed to '{}'", queue));

        loop {
            let msg = pubsub
                .get_message()
                .with_context(|| format!("bus connection lost on '{}'", queue))?;
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    logger::warning(
                        LogTag::Bus,
                        &format!("Dropping non-text payload on '{}': {}", queue, e),
                    );
                    continue;
                }
            };
            if !on_message(payload) {
                logger::info(LogTag::Bus, &format!("Receiver gone, leaving '{}'", queue));
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_accepts_lazy_address() {
        // No server needed: the client is lazy until the first command.
        assert!(Bus::connect("redis://localhost:6379").is_ok());
    }

    #[test]
    fn test_connect_rejects_malformed_address() {
        assert!(Bus::connect("not a redis url").is_err());
    }
}
