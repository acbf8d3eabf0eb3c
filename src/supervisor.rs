//! Worker process supervisor
//!
//! Launches every executable found in the workers directory, reaps exits
//! and relaunches after a short cool-down, forever. Meant to run as a
//! single service (e.g. under systemd) that owns all worker children.
//! Child stdout/stderr go to an append-mode `<name>.log` per worker.

use crate::logger::{self, LogTag};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub workers_dir: PathBuf,
    pub log_dir: PathBuf,
    /// How often exited children are reaped
    pub poll_interval: Duration,
    /// Cool-down between an observed exit and the relaunch
    pub restart_delay: Duration,
}

impl SupervisorConfig {
    pub fn new(workers_dir: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            workers_dir,
            log_dir,
            poll_interval: Duration::from_secs(1),
            restart_delay: Duration::from_secs(3),
        }
    }
}

struct WorkerProcess {
    name: String,
    executable: PathBuf,
    child: Child,
    restart_count: u32,
}

pub struct Supervisor {
    config: SupervisorConfig,
    workers: Vec<WorkerProcess>,
    shutdown: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self { config, workers: Vec::new(), shutdown }
    }

    /// Enumerate worker executables. Hidden files, underscore-prefixed
    /// files and obvious non-executables (logs, configs, docs) are
    /// skipped; on unix the executable bit is required too.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let entries = std::fs::read_dir(&self.config.workers_dir)
            .with_context(|| format!("cannot read {}", self.config.workers_dir.display()))?;
        for entry in entries {
            let entry = entry.context("failed to read workers directory entry")?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if name.starts_with('.') || name.starts_with('_') {
                continue;
            }
            if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("log" | "toml" | "md" | "json" | "lock")
            ) {
                continue;
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mode = entry
                    .metadata()
                    .with_context(|| format!("cannot stat {}", path.display()))?
                    .permissions()
                    .mode();
                if mode & 0o111 == 0 {
                    continue;
                }
            }
            found.push(path);
        }
        found.sort();
        Ok(found)
    }

    /// Discover and start every worker. An empty workers directory is an
    /// error: a supervisor with nothing to supervise is a deployment bug.
    pub fn launch_all(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.config.log_dir)
            .with_context(|| format!("cannot create {}", self.config.log_dir.display()))?;

        let executables = self.discover()?;
        if executables.is_empty() {
            anyhow::bail!(
                "no worker executables found in {}",
                self.config.workers_dir.display()
            );
        }
        for executable in executables {
            let name = worker_name(&executable);
            let child = spawn_child(&self.config.log_dir, &name, &executable)?;
            logger::info(
                LogTag::Supervisor,
                &format!("Started {} (pid={})", name, child.id()),
            );
            self.workers.push(WorkerProcess { name, executable, child, restart_count: 0 });
        }
        Ok(())
    }

    /// Reap-and-relaunch loop. Returns once the shutdown flag is set and
    /// every child has been terminated.
    pub async fn run(&mut self) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            for worker in &mut self.workers {
                let status = match worker.child.try_wait() {
                    Ok(Some(status)) => status,
                    Ok(None) => continue,
                    Err(err) => {
                        logger::error(
                            LogTag::Supervisor,
                            &format!("Cannot poll {}: {}", worker.name, err),
                        );
                        continue;
                    }
                };
                logger::warning(
                    LogTag::Supervisor,
                    &format!(
                        "{} exited with {}; restarting in {:?}",
                        worker.name, status, self.config.restart_delay
                    ),
                );
                tokio::time::sleep(self.config.restart_delay).await;
                if self.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                match spawn_child(&self.config.log_dir, &worker.name, &worker.executable) {
                    Ok(child) => {
                        worker.restart_count += 1;
                        logger::info(
                            LogTag::Supervisor,
                            &format!(
                                "Restarted {} (pid={}, restarts={})",
                                worker.name,
                                child.id(),
                                worker.restart_count
                            ),
                        );
                        worker.child = child;
                    }
                    Err(err) => {
                        logger::error(
                            LogTag::Supervisor,
                            &format!("Failed to restart {}: {:#}", worker.name, err),
                        );
                    }
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        self.terminate_all();
    }

    /// Graceful stop: SIGTERM to every child, then a bounded wait before
    /// the hard kill.
    pub fn terminate_all(&mut self) {
        for worker in &mut self.workers {
            terminate(&mut worker.child);
        }
        for worker in &mut self.workers {
            let mut waited = Duration::ZERO;
            loop {
                match worker.child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if waited < Duration::from_secs(5) => {
                        std::thread::sleep(Duration::from_millis(100));
                        waited += Duration::from_millis(100);
                    }
                    Ok(None) => {
                        logger::warning(
                            LogTag::Supervisor,
                            &format!("{} ignored SIGTERM, killing", worker.name),
                        );
                        if let Err(err) = worker.child.kill() {
                            logger::error(
                                LogTag::Supervisor,
                                &format!("Cannot kill {}: {}", worker.name, err),
                            );
                        }
                        break;
                    }
                    Err(err) => {
                        logger::error(
                            LogTag::Supervisor,
                            &format!("Cannot poll {}: {}", worker.name, err),
                        );
                        break;
                    }
                }
            }
        }
        logger::info(LogTag::Supervisor, "All workers terminated");
    }

    /// Restart counters per worker, for the shutdown summary.
    pub fn restart_counts(&self) -> Vec<(String, u32)> {
        self.workers
            .iter()
            .map(|w| (w.name.clone(), w.restart_count))
            .collect()
    }
}

fn worker_name(executable: &Path) -> String {
    executable
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("worker")
        .to_string()
}

fn spawn_child(log_dir: &Path, name: &str, executable: &Path) -> Result<Child> {
    let log_path = log_dir.join(format!("{}.log", name));
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("cannot open {}", log_path.display()))?;
    let stderr_file = log_file
        .try_clone()
        .with_context(|| format!("cannot clone handle for {}", log_path.display()))?;
    Command::new(executable)
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(stderr_file))
        .spawn()
        .with_context(|| format!("cannot start {}", executable.display()))
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    // SIGTERM first so the child gets to flush and disconnect
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
}
