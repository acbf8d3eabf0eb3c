//! workers-manager: launches and supervises the worker processes
//!
//! Runs as a single service (systemd-friendly): starts every executable in
//! the workers directory, relaunches crashed children after a cool-down,
//! and terminates them all on SIGINT/SIGTERM.

use plataforma_workers::config::SupervisorSettings;
use plataforma_workers::logger::{self, LogTag};
use plataforma_workers::supervisor::{Supervisor, SupervisorConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    logger::init();
    let settings = SupervisorSettings::from_env();

    if let Err(err) = std::fs::create_dir_all(&settings.log_dir) {
        logger::error(
            LogTag::System,
            &format!("Cannot create {}: {}", settings.log_dir.display(), err),
        );
        std::process::exit(1);
    }
    if let Err(err) = logger::init_file_sink(&settings.log_dir.join("manager.log")) {
        logger::warning(LogTag::System, &format!("No manager log file: {}", err));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(err) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        logger::error(LogTag::System, &format!("Cannot install signal handler: {}", err));
        std::process::exit(1);
    }

    let mut supervisor = Supervisor::new(
        SupervisorConfig::new(settings.workers_dir.clone(), settings.log_dir.clone()),
        shutdown,
    );
    if let Err(err) = supervisor.launch_all() {
        logger::error(LogTag::Supervisor, &format!("Startup failed: {:#}", err));
        std::process::exit(1);
    }

    logger::info(
        LogTag::System,
        &format!("Supervising workers from {}", settings.workers_dir.display()),
    );
    supervisor.run().await;

    for (name, restarts) in supervisor.restart_counts() {
        logger::info(
            LogTag::Supervisor,
            &format!("{}: {} restart(s) this run", name, restarts),
        );
    }
    logger::info(LogTag::System, "Manager stopped");
}
