use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::fs;
use tracing::{info, warn};

use crate::config::TrackerConfig;
use crate::error::JobError;
use crate::exec::{CommandRunner, CommandSpec, LineHandler};

pub const UNKNOWN_VERSION: &str = "unknown";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub current_version: String,
    pub last_checked: Option<String>,
    pub last_updated: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    pub current_version: String,
    pub latest_version: String,
    pub update_available: bool,
}

/// Installed version from `.version`, trimmed. `None` if missing or empty.
pub async fn read_version(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).await.ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub async fn write_last_update(path: &Path, version: Option<&str>) -> Result<(), JobError> {
    let record = json!({
        "date": Utc::now().to_rfc3339(),
        "version": version,
    });
    fs::write(path, record.to_string()).await?;
    Ok(())
}

pub async fn update_status(cfg: &TrackerConfig) -> UpdateStatus {
    UpdateStatus {
        current_version: read_version(&cfg.version_file())
            .await
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
        last_checked: read_date(&cfg.last_check_file()).await,
        last_updated: read_date(&cfg.last_update_file()).await,
    }
}

pub async fn check_for_updates(
    cfg: &TrackerConfig,
    runner: &dyn CommandRunner,
) -> Result<UpdateCheck, JobError> {
    let current_version = read_version(&cfg.version_file())
        .await
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string());

    let cmd = CommandSpec::new("git")
        .arg("ls-remote")
        .arg(cfg.update_repo.clone())
        .arg("HEAD");
    let ignore: LineHandler = Arc::new(|_: &str| {});
    let output = runner.run(&cmd, ignore).await?.into_result()?;
    let latest_version = parse_ls_remote(&output.stdout)
        .ok_or_else(|| JobError::Resolve("git ls-remote returned no HEAD".to_string()))?;

    let check = UpdateCheck {
        update_available: current_version != latest_version && current_version != UNKNOWN_VERSION,
        current_version,
        latest_version,
    };

    let mut record = serde_json::to_value(&check).unwrap_or_else(|_| json!({}));
    record["date"] = json!(Utc::now().to_rfc3339());
    if let Err(err) = fs::write(cfg.last_check_file(), record.to_string()).await {
        warn!("failed to record update check: {err}");
    }
    info!(
        current = %check.current_version,
        latest = %check.latest_version,
        available = check.update_available,
        "update check finished"
    );
    Ok(check)
}

fn parse_ls_remote(stdout: &str) -> Option<String> {
    let first = stdout.lines().find(|line| !line.trim().is_empty())?;
    let hash = first.split('\t').next()?.trim();
    if hash.is_empty() {
        None
    } else {
        Some(hash.to_string())
    }
}

async fn read_date(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).await.ok()?;
    let value: Value = serde_json::from_str(&raw).ok()?;
    value.get("date")?.as_str().map(|date| date.to_string())
}
