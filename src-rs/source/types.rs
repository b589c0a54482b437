use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::job::DownloadSpec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerFlavor {
    Paper,
    Purpur,
    Fabric,
    Forge,
    Vanilla,
}

impl ServerFlavor {
    pub const ALL: [ServerFlavor; 5] = [
        ServerFlavor::Paper,
        ServerFlavor::Purpur,
        ServerFlavor::Fabric,
        ServerFlavor::Forge,
        ServerFlavor::Vanilla,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServerFlavor::Paper => "paper",
            ServerFlavor::Purpur => "purpur",
            ServerFlavor::Fabric => "fabric",
            ServerFlavor::Forge => "forge",
            ServerFlavor::Vanilla => "vanilla",
        }
    }
}

impl FromStr for ServerFlavor {
    type Err = JobError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lowered = raw.trim().to_ascii_lowercase();
        ServerFlavor::ALL
            .into_iter()
            .find(|flavor| flavor.as_str() == lowered)
            .ok_or_else(|| JobError::spec(format!("unsupported server type: {}", raw)))
    }
}

impl fmt::Display for ServerFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub url: String,
    pub file_name: String,
}

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn resolve(&self, spec: &DownloadSpec) -> Result<Artifact, JobError>;
}
