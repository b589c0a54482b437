use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobOutput {
    #[serde(rename_all = "camelCase")]
    Installed {
        server_id: String,
        server_path: PathBuf,
        jar_path: PathBuf,
    },
    #[serde(rename_all = "camelCase")]
    Updated {
        version: Option<String>,
        stdout: String,
    },
}
