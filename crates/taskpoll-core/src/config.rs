use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TABLE_FILE: &str = "process_schedule.csv";
pub const DEFAULT_LOG_FILE: &str = "task_log.log";
pub const DEFAULT_CONFIG_FILE: &str = "taskpoll.toml";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_POOL_SIZE: usize = 5;
pub const DEFAULT_PERSIST_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_BASE_MS: u64 = 1_000;
pub const DEFAULT_RETRY_STEP_MS: u64 = 500;
/// Well-known loopback port held as the single-instance token. Never used for traffic.
pub const DEFAULT_LOCK_PORT: u16 = 62000;
pub const DEFAULT_APP_NAME: &str = "taskpoll";

/// Top-level config (taskpoll.toml + TASKPOLL_* env overrides).
///
/// Every field has a default, so an absent config file yields a usable value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskpollConfig {
    /// Base for relative `ExecutablePath` values and the default file locations.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Task table file. Relative paths resolve against `base_dir`.
    #[serde(default)]
    pub table_path: Option<PathBuf>,
    /// Persistent log file. Relative paths resolve against `base_dir`.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Number of atomic-replace attempts before a commit is abandoned.
    #[serde(default = "default_persist_retries")]
    pub persist_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_step_ms")]
    pub retry_step_ms: u64,
    #[serde(default = "default_lock_port")]
    pub lock_port: u16,
    /// Interpreter used for `.py` tasks.
    #[serde(default = "default_python")]
    pub python: String,
    /// Name of the login-registration entry.
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for TaskpollConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            table_path: None,
            log_path: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            pool_size: DEFAULT_POOL_SIZE,
            persist_retries: DEFAULT_PERSIST_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
            retry_step_ms: DEFAULT_RETRY_STEP_MS,
            lock_port: DEFAULT_LOCK_PORT,
            python: default_python(),
            app_name: default_app_name(),
        }
    }
}

impl TaskpollConfig {
    /// Load config from a TOML file with TASKPOLL_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `TASKPOLL_CONFIG` env var
    ///   3. `<exe dir>/taskpoll.toml`
    ///
    /// A missing file contributes nothing; defaults fill every field.
    pub fn load(config_path: Option<&Path>) -> crate::error::Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("TASKPOLL_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| default_base_dir().join(DEFAULT_CONFIG_FILE));

        let config: TaskpollConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TASKPOLL_").split("__"))
            .extract()
            .map_err(|e| crate::error::TaskpollError::Config(e.to_string()))?;

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Config rooted at `base_dir` with every other field at its default.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn resolved_table_path(&self) -> PathBuf {
        self.resolve(self.table_path.as_deref(), DEFAULT_TABLE_FILE)
    }

    pub fn resolved_log_path(&self) -> PathBuf {
        self.resolve(self.log_path.as_deref(), DEFAULT_LOG_FILE)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Pool size, never below one slot.
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.max(1)
    }

    fn resolve(&self, configured: Option<&Path>, default_name: &str) -> PathBuf {
        match configured {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => self.base_dir.join(p),
            None => self.base_dir.join(default_name),
        }
    }
}

fn default_base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}
fn default_persist_retries() -> u32 {
    DEFAULT_PERSIST_RETRIES
}
fn default_retry_base_ms() -> u64 {
    DEFAULT_RETRY_BASE_MS
}
fn default_retry_step_ms() -> u64 {
    DEFAULT_RETRY_STEP_MS
}
fn default_lock_port() -> u16 {
    DEFAULT_LOCK_PORT
}
fn default_python() -> String {
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}
fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}
