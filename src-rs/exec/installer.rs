use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::JobError;
use crate::job::DownloadSpec;
use crate::result::JobOutput;

const DEFAULT_PORT: u16 = 25565;
const DEFAULT_MEMORY_MB: u32 = 2048;

const SERVER_PROPERTIES: &str = "server-port=25565
gamemode=survival
difficulty=normal
spawn-protection=16
max-players=20
view-distance=10
enable-command-block=false
motd=A Minecraft Server
";

#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(
        &self,
        job_id: &str,
        spec: &DownloadSpec,
        artifact: &Path,
    ) -> Result<JobOutput, JobError>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerManifest {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub server_type: String,
    pub version: String,
    pub build: String,
    pub jar_file: String,
    pub memory: u32,
    pub port: u16,
    pub auto_start: bool,
    pub created: DateTime<Utc>,
}

/// Lays a downloaded jar out as a ready-to-start server directory under
/// `servers_path/server_<id8>`.
pub struct ServerInstaller {
    servers_path: PathBuf,
}

impl ServerInstaller {
    pub fn new(servers_path: PathBuf) -> Self {
        Self { servers_path }
    }
}

#[async_trait]
impl Installer for ServerInstaller {
    async fn install(
        &self,
        job_id: &str,
        spec: &DownloadSpec,
        artifact: &Path,
    ) -> Result<JobOutput, JobError> {
        let server_id = short_id(job_id);
        let server_dir = self.servers_path.join(format!("server_{}", server_id));
        create_dir(&server_dir).await?;

        let jar_path = server_dir.join("server.jar");
        fs::copy(artifact, &jar_path).await.map_err(|err| {
            JobError::setup(format!("copy {} -> {}: {}", artifact.display(), jar_path.display(), err))
        })?;

        write_file(&server_dir.join("server.properties"), SERVER_PROPERTIES).await?;
        write_file(&server_dir.join("eula.txt"), "eula=true\n").await?;

        let server_type = spec.server_type.trim().to_ascii_lowercase();
        let manifest = ServerManifest {
            id: server_id.clone(),
            name: format!("{}-{}", server_type, spec.mc_version.trim()),
            server_type,
            version: spec.mc_version.trim().to_string(),
            build: spec.build_version.trim().to_string(),
            jar_file: "server.jar".to_string(),
            memory: DEFAULT_MEMORY_MB,
            port: DEFAULT_PORT,
            auto_start: false,
            created: Utc::now(),
        };
        let serialized = serde_json::to_string_pretty(&manifest).map_err(JobError::setup)?;
        write_file(&server_dir.join("server.json"), &serialized).await?;

        create_dir(&server_dir.join("logs")).await?;

        info!(server_id = %server_id, path = %server_dir.display(), "server installed");
        Ok(JobOutput::Installed {
            server_id,
            server_path: server_dir,
            jar_path,
        })
    }
}

pub fn short_id(job_id: &str) -> String {
    job_id.chars().take(8).collect()
}

async fn create_dir(path: &Path) -> Result<(), JobError> {
    fs::create_dir_all(path)
        .await
        .map_err(|err| JobError::setup(format!("create {}: {}", path.display(), err)))
}

async fn write_file(path: &Path, contents: &str) -> Result<(), JobError> {
    fs::write(path, contents)
        .await
        .map_err(|err| JobError::setup(format!("write {}: {}", path.display(), err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> DownloadSpec {
        DownloadSpec {
            server_type: "Paper".to_string(),
            mc_version: "1.20.1".to_string(),
            build_version: "10".to_string(),
        }
    }

    #[tokio::test]
    async fn installs_server_layout() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("paper-1.20.1-10.jar");
        std::fs::write(&artifact, b"jar-bytes").unwrap();
        let installer = ServerInstaller::new(dir.path().join("servers"));

        let output = installer
            .install("0123456789abcdef", &spec(), &artifact)
            .await
            .unwrap();

        let server_dir = dir.path().join("servers").join("server_01234567");
        assert_eq!(
            output,
            JobOutput::Installed {
                server_id: "01234567".to_string(),
                server_path: server_dir.clone(),
                jar_path: server_dir.join("server.jar"),
            }
        );
        assert_eq!(std::fs::read(server_dir.join("server.jar")).unwrap(), b"jar-bytes");
        assert_eq!(
            std::fs::read_to_string(server_dir.join("eula.txt")).unwrap(),
            "eula=true\n"
        );
        let properties = std::fs::read_to_string(server_dir.join("server.properties")).unwrap();
        assert!(properties.contains("server-port=25565"));
        assert!(server_dir.join("logs").is_dir());

        let manifest: ServerManifest =
            serde_json::from_str(&std::fs::read_to_string(server_dir.join("server.json")).unwrap())
                .unwrap();
        assert_eq!(manifest.name, "paper-1.20.1");
        assert_eq!(manifest.server_type, "paper");
        assert_eq!(manifest.memory, 2048);
        assert!(!manifest.auto_start);
    }

    #[tokio::test]
    async fn missing_artifact_is_a_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let installer = ServerInstaller::new(dir.path().join("servers"));
        let err = installer
            .install("abcdef012345", &spec(), &dir.path().join("missing.jar"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Setup(_)));
        assert!(dir.path().join("servers").join("server_abcdef01").is_dir());
    }
}
