use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::types::{Artifact, ArtifactSource};
use crate::error::JobError;
use crate::job::DownloadSpec;

pub const MOJANG_MANIFEST_URL: &str = "https://launchermeta.mojang.com/mc/game/version_manifest.json";

pub struct VanillaConfig {
    pub manifest_url: String,
    pub timeout: Duration,
}

impl Default for VanillaConfig {
    fn default() -> Self {
        Self {
            manifest_url: MOJANG_MANIFEST_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Looks the server jar up in Mojang's version manifest, then in the
/// per-version details document it points to.
pub struct VanillaSource {
    cfg: VanillaConfig,
    client: Client,
}

impl VanillaSource {
    pub fn new(mut cfg: VanillaConfig) -> Self {
        if cfg.manifest_url.is_empty() {
            cfg.manifest_url = MOJANG_MANIFEST_URL.to_string();
        }
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { cfg, client }
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, JobError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| JobError::Resolve(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(JobError::Resolve(format!(
                "http {} from {}",
                status.as_u16(),
                url
            )));
        }
        resp.json::<Value>()
            .await
            .map_err(|err| JobError::Resolve(format!("invalid json from {}: {}", url, err)))
    }
}

#[async_trait]
impl ArtifactSource for VanillaSource {
    async fn resolve(&self, spec: &DownloadSpec) -> Result<Artifact, JobError> {
        let version = spec.mc_version.trim();
        let manifest = self.fetch_json(&self.cfg.manifest_url).await?;
        let details_url = find_version_url(&manifest, version)
            .ok_or_else(|| JobError::Resolve(format!("version not found: {}", version)))?;
        debug!(version, url = %details_url, "resolved vanilla version details");

        let details = self.fetch_json(&details_url).await?;
        let url = server_download_url(&details).ok_or_else(|| {
            JobError::Resolve(format!("version {} has no server download", version))
        })?;
        Ok(Artifact {
            url,
            file_name: format!("minecraft_server.{}.jar", version),
        })
    }
}

fn find_version_url(manifest: &Value, version: &str) -> Option<String> {
    manifest
        .get("versions")?
        .as_array()?
        .iter()
        .find(|entry| entry.get("id").and_then(|v| v.as_str()) == Some(version))?
        .get("url")?
        .as_str()
        .map(|url| url.to_string())
}

fn server_download_url(details: &Value) -> Option<String> {
    details
        .get("downloads")?
        .get("server")?
        .get("url")?
        .as_str()
        .map(|url| url.to_string())
}
