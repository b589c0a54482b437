use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::TrackerConfig;
use crate::error::JobError;
use crate::exec::installer::short_id;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec, Installer, LineHandler};
use crate::job::{DownloadSpec, Job};
use crate::operations::Operations;
use crate::progress::{StepMode, SyntheticProgress};
use crate::result::JobOutput;
use crate::source::{SourceRouter, VanillaConfig};
use crate::tracker::JobTracker;

/// Emits a fixed list of output lines, one per `delay`, then exits.
pub struct ScriptedRunner {
    lines: Vec<String>,
    delay: Duration,
    exit_code: i32,
    stderr: String,
    pub calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn succeeding(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|line| line.to_string()).collect(),
            delay: Duration::from_millis(5),
            exit_code: 0,
            stderr: String::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stderr: stderr.to_string(),
            ..Self::succeeding(&[])
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec, on_line: LineHandler) -> Result<CommandOutput, JobError> {
        self.calls.lock().unwrap().push(spec.clone());
        for line in &self.lines {
            tokio::time::sleep(self.delay).await;
            on_line(line);
        }
        tokio::time::sleep(self.delay).await;
        Ok(CommandOutput {
            exit_code: Some(self.exit_code),
            success: self.exit_code == 0,
            stdout: self.lines.join("\n"),
            stderr: self.stderr.clone(),
        })
    }
}

pub struct FakeInstaller {
    failure: Option<String>,
}

impl FakeInstaller {
    pub fn ok() -> Self {
        Self { failure: None }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl Installer for FakeInstaller {
    async fn install(
        &self,
        job_id: &str,
        _spec: &DownloadSpec,
        artifact: &Path,
    ) -> Result<JobOutput, JobError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let Some(message) = &self.failure {
            return Err(JobError::Setup(message.clone()));
        }
        let server_path = artifact.with_file_name(format!("server_{}", short_id(job_id)));
        Ok(JobOutput::Installed {
            server_id: short_id(job_id),
            jar_path: server_path.join("server.jar"),
            server_path,
        })
    }
}

/// Config rooted in `dir` with fast synthetic ticks and an update script in
/// place.
pub fn scratch_config(dir: &Path) -> TrackerConfig {
    let cfg = TrackerConfig {
        downloads_path: dir.join("downloads"),
        servers_path: dir.join("servers"),
        install_dir: dir.to_path_buf(),
        tick_interval: Duration::from_millis(10),
        job_deadline: None,
        ..TrackerConfig::default()
    };
    let script = cfg.update_script();
    std::fs::create_dir_all(script.parent().unwrap()).unwrap();
    std::fs::write(&script, "#!/bin/bash\nexit 0\n").unwrap();
    cfg
}

pub fn tracker_with(
    cfg: TrackerConfig,
    runner: impl CommandRunner + 'static,
    installer: impl Installer + 'static,
) -> JobTracker {
    let ops = Operations::new(
        cfg,
        Arc::new(runner),
        Arc::new(installer),
        SourceRouter::with_defaults(VanillaConfig::default()),
    )
    .with_synthetic(SyntheticProgress {
        interval: Duration::from_millis(10),
        cap: 95,
        steps: StepMode::Fixed(10),
    });
    JobTracker::new(Arc::new(crate::job::JobStore::new(None)), ops)
}

pub fn scratch_tracker(
    dir: &Path,
    runner: impl CommandRunner + 'static,
    installer: impl Installer + 'static,
) -> JobTracker {
    tracker_with(scratch_config(dir), runner, installer)
}

/// Polls until the job is terminal, returning every snapshot seen.
pub async fn wait_terminal(tracker: &JobTracker, id: &str) -> Vec<Job> {
    let mut seen = Vec::new();
    for _ in 0..1000 {
        let job = tracker.get_status(id).unwrap();
        let done = job.state.is_terminal();
        seen.push(job);
        if done {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} never reached a terminal state", id);
}
