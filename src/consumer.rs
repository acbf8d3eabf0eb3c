//! Task consumer
//!
//! The bus subscription is blocking, so it lives on its own named thread
//! and feeds a bounded channel. The async side parses, drops what does not
//! parse, and spawns one dispatch per task so a slow action (a flood-wait
//! retry can sleep for minutes) never stalls the receive loop.

use crate::actions;
use crate::backend::BackendApi;
use crate::bus::Bus;
use crate::logger::{self, LogTag};
use crate::messages::TaskMessage;
use crate::telegram::TelegramGate;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Hand-off depth between the bus thread and the async loop. When actions
/// fall this far behind, the bus thread blocks and Redis buffers for us.
pub const QUEUE_DEPTH: usize = 64;

/// Shared collaborators for task dispatch.
pub struct Dispatcher {
    pub gate: Arc<dyn TelegramGate>,
    pub backend: Arc<dyn BackendApi>,
}

/// Start the dedicated subscription thread for one queue. The thread ends
/// when the receiver is dropped or the bus connection is lost; the latter
/// is logged as an error so the exiting worker leaves a trace.
pub fn spawn_listener(
    bus: Bus,
    queue: &'static str,
    capacity: usize,
) -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(capacity);
    std::thread::Builder::new()
        .name(format!("bus-{}", queue))
        .spawn(move || {
            let outcome =
                bus.subscribe_blocking(queue, |payload| tx.blocking_send(payload).is_ok());
            if let Err(err) = outcome {
                logger::error(
                    LogTag::Bus,
                    &format!("Subscription on '{}' ended: {:#}", queue, err),
                );
            }
        })
        .with_context(|| format!("failed to start listener thread for '{}'", queue))?;
    Ok(rx)
}

/// Drain tasks until the feeding side hangs up. Malformed payloads are
/// dropped with a warning; the loop itself never fails.
pub async fn consume(mut rx: mpsc::Receiver<String>, dispatcher: Dispatcher) {
    while let Some(raw) = rx.recv().await {
        let message = match TaskMessage::parse(&raw) {
            Ok(message) => message,
            Err(err) => {
                logger::warning(
                    LogTag::Consumer,
                    &format!("Dropping malformed message ({}): {}", err, raw),
                );
                continue;
            }
        };
        logger::info(
            LogTag::Consumer,
            &format!("Task received: {}", message.action()),
        );
        let gate = Arc::clone(&dispatcher.gate);
        let backend = Arc::clone(&dispatcher.backend);
        tokio::spawn(async move {
            actions::dispatch(message, gate.as_ref(), backend.as_ref()).await;
        });
    }
    logger::info(LogTag::Consumer, "Task stream closed, consumer stopping");
}

/// Full worker startup: configuration, Telegram session, backend client,
/// bus subscription, then the consume loop. Any startup failure bubbles up
/// so the worker exits non-zero and the supervisor relaunches it; an
/// unauthorized session therefore shows up as a visible crash-loop instead
/// of a silently idle process.
pub async fn run_worker(name: &str, queue: &'static str) -> Result<()> {
    let config = crate::config::Config::from_env()?;
    let gate = crate::telegram::client::MtprotoGate::connect(&config).await?;
    let backend = crate::backend::HttpBackend::new(&config.backend_url);
    let bus = Bus::connect(&config.redis_url)?;
    let rx = spawn_listener(bus, queue, QUEUE_DEPTH)?;

    logger::info(LogTag::System, &format!("{} ready on '{}'", name, queue));
    consume(
        rx,
        Dispatcher {
            gate: Arc::new(gate),
            backend: Arc::new(backend),
        },
    )
    .await;
    // The stream only ends when the bus connection is gone. Exit non-zero
    // so the supervisor relaunches us with a fresh connection.
    anyhow::bail!("bus subscription on '{}' ended", queue)
}
