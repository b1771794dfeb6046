//! Application configuration resolved once at startup from environment
//! variables. Ported from `original_source/api/app/config.py`'s `Settings`
//! class: same search order for `ENGINE_PATH`, same defaults, same env var
//! names.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// HTTP header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Flat, non-expiring set of accepted API keys (§4.6). No per-tenant
/// scoping -- matching the Python original's module-level constant set.
fn valid_api_keys() -> HashSet<&'static str> {
    ["test-key-1", "test-key-2", "dev-key", "aztec-demo-key"]
        .into_iter()
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {name} has an invalid value {value:?}: {source}")]
    InvalidInt {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Resolved, immutable application configuration. Built once at startup and
/// handed around behind `Arc<AppConfig>`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_root: PathBuf,
    pub engine_path: PathBuf,
    pub data_dir: PathBuf,
    pub event_log_path: PathBuf,
    pub snapshot_dir: PathBuf,
    pub rate_limit_requests: u32,
    pub rate_limit_window_seconds: u64,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Resolves configuration from the process environment. Never fails on
    /// a missing `ENGINE_PATH` -- it falls back to a search, exactly as the
    /// original does -- but does fail on a present-but-unparseable numeric
    /// env var, since that is almost certainly an operator typo.
    pub fn from_env() -> Result<Self, ConfigError> {
        // `api/` sits one level below the project root in the original
        // layout; the gateway binary plays the same role, so its own crate
        // root stands in for `api/`'s parent.
        let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let engine_path = resolve_engine_path(&project_root);

        let data_dir = env_path("DATA_DIR").unwrap_or_else(|| project_root.join("data"));
        let event_log_path =
            env_path("EVENT_LOG_PATH").unwrap_or_else(|| data_dir.join("events.jsonl"));
        let snapshot_dir = env_path("SNAPSHOT_DIR").unwrap_or_else(|| data_dir.join("snapshots"));

        let rate_limit_requests = env_int("RATE_LIMIT_REQUESTS", 100)?;
        let rate_limit_window_seconds = env_int("RATE_LIMIT_WINDOW_SECONDS", 60)?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_int("PORT", 8000)?;

        Ok(Self {
            project_root,
            engine_path,
            data_dir,
            event_log_path,
            snapshot_dir,
            rate_limit_requests: rate_limit_requests as u32,
            rate_limit_window_seconds: rate_limit_window_seconds as u64,
            host,
            port: port as u16,
        })
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        valid_api_keys().contains(key)
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Project Root:    {}", self.project_root.display())?;
        writeln!(f, "ENGINE_PATH:     {}", self.engine_path.display())?;
        writeln!(f, "  exists:        {}", self.engine_path.exists())?;
        writeln!(f, "DATA_DIR:        {}", self.data_dir.display())?;
        writeln!(f, "EVENT_LOG_PATH:  {}", self.event_log_path.display())?;
        write!(f, "SNAPSHOT_DIR:    {}", self.snapshot_dir.display())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(|v| {
        Path::new(&v)
            .canonicalize()
            .unwrap_or_else(|_| PathBuf::from(v))
    })
}

fn env_int(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v.parse::<i64>().map_err(|source| ConfigError::InvalidInt {
            name,
            value: v,
            source,
        }),
        Err(_) => Ok(default),
    }
}

/// Search order per spec §4.1 / the original's `ENGINE_PATH` property:
/// 1. `ENGINE_PATH` env var, if it points at a file that exists.
/// 2. `build/engine/Debug/exchange_engine[.exe]`
/// 3. `build/engine/Release/exchange_engine[.exe]`
/// 4. `build/engine/exchange_engine[.exe]`
///
/// If none exist, returns the first search candidate so error messages at
/// least name a plausible path.
fn resolve_engine_path(project_root: &Path) -> PathBuf {
    if let Ok(env_path) = std::env::var("ENGINE_PATH") {
        let p = PathBuf::from(&env_path);
        if p.exists() {
            return p.canonicalize().unwrap_or(p);
        }
        tracing::warn!(
            engine_path = %env_path,
            "ENGINE_PATH does not exist, searching default locations"
        );
    }

    let exe_suffix = if cfg!(windows) { ".exe" } else { "" };
    let search_paths = [
        project_root
            .join("build")
            .join("engine")
            .join("Debug")
            .join(format!("exchange_engine{exe_suffix}")),
        project_root
            .join("build")
            .join("engine")
            .join("Release")
            .join(format!("exchange_engine{exe_suffix}")),
        project_root
            .join("build")
            .join("engine")
            .join(format!("exchange_engine{exe_suffix}")),
    ];

    for path in &search_paths {
        if path.exists() {
            return path.canonicalize().unwrap_or_else(|_| path.clone());
        }
    }

    search_paths[0].clone()
}
