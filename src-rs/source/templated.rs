use async_trait::async_trait;

use super::types::{Artifact, ArtifactSource, ServerFlavor};
use crate::error::JobError;
use crate::job::DownloadSpec;

/// Flavors whose download URL is a fixed pattern over version and build.
pub struct TemplatedSource {
    flavor: ServerFlavor,
}

impl TemplatedSource {
    pub fn new(flavor: ServerFlavor) -> Self {
        Self { flavor }
    }

    pub fn artifact(&self, mc: &str, build: &str) -> Result<Artifact, JobError> {
        let (url, file_name) = match self.flavor {
            ServerFlavor::Paper => (
                format!(
                    "https://api.papermc.io/v2/projects/paper/versions/{mc}/builds/{build}/downloads/paper-{mc}-{build}.jar"
                ),
                format!("paper-{mc}-{build}.jar"),
            ),
            ServerFlavor::Purpur => (
                format!("https://api.purpurmc.org/v2/purpur/{mc}/{build}/download"),
                format!("purpur-{mc}-{build}.jar"),
            ),
            ServerFlavor::Fabric => (
                format!("https://meta.fabricmc.net/v2/versions/loader/{mc}/{build}/server/jar"),
                format!("fabric-server-{mc}-{build}.jar"),
            ),
            ServerFlavor::Forge => (
                format!(
                    "https://maven.minecraftforge.net/net/minecraftforge/forge/{mc}-{build}/forge-{mc}-{build}-installer.jar"
                ),
                format!("forge-{mc}-{build}-installer.jar"),
            ),
            ServerFlavor::Vanilla => {
                return Err(JobError::Resolve(
                    "vanilla downloads are resolved from the version manifest".to_string(),
                ))
            }
        };
        Ok(Artifact { url, file_name })
    }
}

#[async_trait]
impl ArtifactSource for TemplatedSource {
    async fn resolve(&self, spec: &DownloadSpec) -> Result<Artifact, JobError> {
        self.artifact(spec.mc_version.trim(), spec.build_version.trim())
    }
}
