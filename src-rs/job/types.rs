use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::result::JobOutput;
use crate::source::ServerFlavor;

pub type JobId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Download,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Finalizing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, Finalizing)
                | (Running, Completed)
                | (Running, Failed)
                | (Finalizing, Completed)
                | (Finalizing, Failed)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSpec {
    pub server_type: String,
    pub mc_version: String,
    pub build_version: String,
}

impl DownloadSpec {
    pub fn flavor(&self) -> Result<ServerFlavor, JobError> {
        self.server_type.parse()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSpec {
    pub script: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobSpec {
    Download(DownloadSpec),
    Update(UpdateSpec),
}

impl JobSpec {
    pub fn kind(&self) -> JobKind {
        match self {
            JobSpec::Download(_) => JobKind::Download,
            JobSpec::Update(_) => JobKind::Update,
        }
    }

    /// Shape checks only. Whether the artifact or script actually exists is
    /// discovered by the executor.
    pub fn validate(&self) -> Result<(), JobError> {
        match self {
            JobSpec::Download(spec) => {
                let fields = [
                    ("serverType", &spec.server_type),
                    ("mcVersion", &spec.mc_version),
                    ("buildVersion", &spec.build_version),
                ];
                for (name, value) in fields {
                    if value.trim().is_empty() {
                        return Err(JobError::spec(format!("{} is required", name)));
                    }
                }
                spec.flavor().map(|_| ())
            }
            JobSpec::Update(spec) => {
                if spec.script.as_os_str().is_empty() {
                    return Err(JobError::spec("update script path is required"));
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    #[serde(rename = "status")]
    pub state: JobState,
    pub progress: u8,
    pub spec: JobSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download(server_type: &str, mc: &str, build: &str) -> JobSpec {
        JobSpec::Download(DownloadSpec {
            server_type: server_type.to_string(),
            mc_version: mc.to_string(),
            build_version: build.to_string(),
        })
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let all = [
            JobState::Pending,
            JobState::Running,
            JobState::Finalizing,
            JobState::Completed,
            JobState::Failed,
        ];
        for from in [JobState::Completed, JobState::Failed] {
            for to in all {
                assert!(!from.can_transition_to(to), "{:?} -> {:?}", from, to);
            }
        }
        assert!(!JobState::Finalizing.can_transition_to(JobState::Running));
        assert!(!JobState::Running.can_transition_to(JobState::Pending));
        assert!(JobState::Pending.can_transition_to(JobState::Running));
    }

    #[test]
    fn download_spec_requires_all_fields() {
        assert!(download("paper", "1.20.1", "10").validate().is_ok());
        assert!(download("Vanilla", "1.20.1", "latest").validate().is_ok());

        let err = download("paper", " ", "10").validate().unwrap_err();
        assert!(matches!(err, JobError::SpecInvalid(ref msg) if msg.contains("mcVersion")));

        let err = download("bukkit", "1.20.1", "10").validate().unwrap_err();
        assert!(matches!(err, JobError::SpecInvalid(_)));
    }

    #[test]
    fn update_spec_requires_script() {
        let spec = JobSpec::Update(UpdateSpec {
            script: PathBuf::new(),
        });
        assert!(spec.validate().is_err());
    }

    #[test]
    fn job_serializes_state_as_status() {
        let job = Job {
            id: "abc".to_string(),
            kind: JobKind::Download,
            state: JobState::Finalizing,
            progress: 96,
            spec: download("paper", "1.20.1", "10"),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "finalizing");
        assert_eq!(value["kind"], "download");
        assert_eq!(value["spec"]["serverType"], "paper");
        assert!(value.get("error").is_none());
        assert!(value.get("createdAt").is_some());
    }
}
