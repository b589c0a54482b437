use std::path::PathBuf;
use std::sync::Arc;

use crate::error::JobError;

/// Called with every output line as it arrives, from either stream.
pub type LineHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn display(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Turns a non-zero exit into `ProcessFailed`, keeping the tail of
    /// stderr (or stdout when stderr is empty) as the message.
    pub fn into_result(self) -> Result<Self, JobError> {
        if self.success {
            return Ok(self);
        }
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        Err(JobError::ProcessFailed {
            exit_code: self.exit_code,
            stderr: tail_lines(source, 10),
        })
    }
}

pub fn tail_lines(text: &str, keep: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(keep);
    lines[start..].join("\n")
}
