use std::time::Duration;

use thiserror::Error;

use crate::job::JobState;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job spec: {0}")]
    SpecInvalid(String),
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition { from: JobState, to: JobState },
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("process exited with status {}: {stderr}", format_code(*exit_code))]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("artifact resolution failed: {0}")]
    Resolve(String),
    #[error("server setup failed: {0}")]
    Setup(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("job cancelled")]
    Cancelled,
    #[error("job timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("executor crashed: {0}")]
    Crashed(String),
    #[error("job registry unavailable: {0}")]
    Registry(String),
}

fn format_code(code: Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

impl JobError {
    pub fn spec(message: impl Into<String>) -> Self {
        JobError::SpecInvalid(message.into())
    }

    pub fn setup(err: impl std::fmt::Display) -> Self {
        JobError::Setup(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_failed_message_carries_stderr() {
        let err = JobError::ProcessFailed {
            exit_code: Some(1),
            stderr: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "process exited with status 1: disk full");

        let killed = JobError::ProcessFailed {
            exit_code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("signal"));
    }

    #[test]
    fn timed_out_reports_seconds() {
        let err = JobError::TimedOut(Duration::from_secs(90));
        assert_eq!(err.to_string(), "job timed out after 90s");
    }
}
