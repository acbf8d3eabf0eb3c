use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Runtime configuration, resolved from the environment (a `.env` file is
/// honored when present). One instance is built at process start and owned
/// by the worker/supervisor main routine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Message bus address (Redis)
    pub redis_url: String,
    /// Telegram application credentials
    pub api_id: i32,
    pub api_hash: String,
    /// Session file stem for the admin account
    pub session: String,
    /// Base URL of the system-of-record backend
    pub backend_url: String,
    /// Directory the supervisor scans for worker executables
    pub workers_dir: PathBuf,
    /// Directory for per-worker log files
    pub log_dir: PathBuf,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Telegram credentials are required: a worker without them cannot do
    /// anything useful, so this fails startup instead of limping along.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let api_id_raw = env::var("TG_API_ID")
            .or_else(|_| env::var("TG_API_ID_ADMIN"))
            .context("TG_API_ID is not set")?;
        let api_id: i32 = api_id_raw
            .parse()
            .with_context(|| format!("TG_API_ID is not numeric: {}", api_id_raw))?;

        let api_hash = env::var("TG_API_HASH")
            .or_else(|_| env::var("TG_API_HASH_ADMIN"))
            .context("TG_API_HASH is not set")?;
        if api_hash.is_empty() {
            anyhow::bail!("TG_API_HASH is empty");
        }

        Ok(Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            api_id,
            api_hash,
            session: env::var("TG_SESSION")
                .unwrap_or_else(|_| "plataforma_session".to_string()),
            backend_url: env::var("API_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            workers_dir: env::var("WORKERS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./workers")),
            log_dir: env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./logs")),
        })
    }
}

/// The subset the supervisor needs. The manager process launches workers
/// and tails their exits; it never talks to Telegram itself, so it must
/// not fail startup over missing credentials.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub workers_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl SupervisorSettings {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            workers_dir: env::var("WORKERS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./workers")),
            log_dir: env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./logs")),
        }
    }
}
