use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TrackerConfig;
use crate::exec::{ServerInstaller, ShellRunner};
use crate::job::JobStore;
use crate::operations::Operations;
use crate::source::{SourceRouter, VanillaConfig};
use crate::tracker::JobTracker;

pub const DEFAULT_PORT: u16 = 8080;

fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_opt(key).map(PathBuf::from)
}

fn env_u64(key: &str) -> Option<u64> {
    env_opt(key).and_then(|raw| raw.parse::<u64>().ok())
}

/// Seconds value where `0` switches the feature off.
fn env_optional_secs(key: &str, fallback: Option<Duration>) -> Option<Duration> {
    match env_u64(key) {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => fallback,
    }
}

pub fn load_config_from_env() -> TrackerConfig {
    let mut cfg = TrackerConfig::default();
    if let Some(path) = env_path("DOWNLOADS_PATH") {
        cfg.downloads_path = path;
    }
    if let Some(path) = env_path("SERVERS_PATH") {
        cfg.servers_path = path;
    }
    if let Some(path) = env_path("SERVER_PATH") {
        cfg.install_dir = path;
    }
    if let Some(repo) = env_opt("MC_JOBS_UPDATE_REPO") {
        cfg.update_repo = repo;
    }
    if let Some(ms) = env_u64("MC_JOBS_TICK_MS") {
        cfg.tick_interval = Duration::from_millis(ms.max(1));
    }
    cfg.job_deadline = env_optional_secs("MC_JOBS_DEADLINE_SECS", cfg.job_deadline);
    cfg.retention = env_optional_secs("MC_JOBS_RETENTION_SECS", cfg.retention);
    if let Some(secs) = env_u64("MC_JOBS_SWEEP_SECS") {
        cfg.sweep_interval = Duration::from_secs(secs.max(1));
    }
    cfg.persist_path = env_path("MC_JOBS_PERSIST");
    cfg
}

pub fn load_port() -> u16 {
    env_opt("PORT")
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Wires the tracker with the real process runner, installer and artifact
/// sources.
pub fn build_tracker(cfg: TrackerConfig) -> JobTracker {
    let store = match cfg.persist_path.clone() {
        Some(path) => JobStore::restore(path),
        None => JobStore::new(None),
    };
    let installer = ServerInstaller::new(cfg.servers_path.clone());
    let ops = Operations::new(
        cfg,
        Arc::new(ShellRunner),
        Arc::new(installer),
        SourceRouter::with_defaults(VanillaConfig::default()),
    );
    JobTracker::new(Arc::new(store), ops)
}
