//! Worker platform for a Telegram subscription business
//!
//! Producers (payment glue) publish JSON tasks on Redis pub/sub queues;
//! per-queue worker processes consume them and act on Telegram (payment
//! links, single-use invites, subscriber removal, channel creation),
//! notifying the system-of-record backend about the results. A supervisor
//! binary launches the workers and relaunches whatever crashes.

pub mod actions;
pub mod backend;
pub mod bus;
pub mod config;
pub mod consumer;
pub mod logger;
pub mod messages;
pub mod supervisor;
pub mod telegram;
