use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use crate::config::TrackerConfig;
use crate::error::JobError;
use crate::exec::types::tail_lines;
use crate::exec::{CommandRunner, CommandSpec, Installer, LineHandler};
use crate::job::{DownloadSpec, JobSpec, JobState, JobStore, UpdateSpec};
use crate::progress::{parse_percent_line, ProgressSink, StoreProgress, SyntheticProgress, Ticker};
use crate::result::JobOutput;
use crate::source::SourceRouter;
use crate::update_check::{read_version, write_last_update};

/// The collaborators a job needs to run, shared by every executor.
pub struct Operations {
    pub config: TrackerConfig,
    pub runner: Arc<dyn CommandRunner>,
    pub installer: Arc<dyn Installer>,
    pub sources: SourceRouter,
    pub synthetic: SyntheticProgress,
}

impl Operations {
    pub fn new(
        config: TrackerConfig,
        runner: Arc<dyn CommandRunner>,
        installer: Arc<dyn Installer>,
        sources: SourceRouter,
    ) -> Self {
        let synthetic = SyntheticProgress {
            interval: config.tick_interval,
            cap: config.synthetic_cap,
            ..SyntheticProgress::default()
        };
        Self {
            config,
            runner,
            installer,
            sources,
            synthetic,
        }
    }

    pub fn with_synthetic(mut self, synthetic: SyntheticProgress) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub async fn run(
        &self,
        store: &Arc<JobStore>,
        id: &str,
        spec: &JobSpec,
    ) -> Result<JobOutput, JobError> {
        let sink: Arc<dyn ProgressSink> = Arc::new(StoreProgress::new(store.clone(), id.to_string()));
        match spec {
            JobSpec::Download(spec) => self.download(store, id, spec, sink).await,
            JobSpec::Update(spec) => self.update(store, id, spec, sink).await,
        }
    }

    async fn download(
        &self,
        store: &JobStore,
        id: &str,
        spec: &DownloadSpec,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<JobOutput, JobError> {
        let artifact = self.sources.resolve(spec).await?;
        fs::create_dir_all(&self.config.downloads_path).await?;
        let output_path = self.config.downloads_path.join(&artifact.file_name);
        info!(job_id = %id, url = %artifact.url, "downloading artifact");

        let on_line: LineHandler = Arc::new(move |line: &str| {
            if let Some(percent) = parse_percent_line(line) {
                sink.report(percent);
            }
        });
        let cmd = CommandSpec::new("wget")
            .arg("--progress=dot:mega")
            .arg("-O")
            .arg(output_path.to_string_lossy().to_string())
            .arg(artifact.url.clone());
        self.runner.run(&cmd, on_line).await?.into_result()?;

        store.transition(id, JobState::Finalizing)?;
        self.installer.install(id, spec, &output_path).await
    }

    async fn update(
        &self,
        store: &JobStore,
        id: &str,
        spec: &UpdateSpec,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<JobOutput, JobError> {
        if fs::metadata(&spec.script).await.is_err() {
            return Err(JobError::Spawn {
                program: spec.script.display().to_string(),
                message: "update script not found".to_string(),
            });
        }
        info!(job_id = %id, script = %spec.script.display(), "running update script");

        let ticker = Ticker::start(self.synthetic.clone(), sink);
        let cmd = CommandSpec::new("bash")
            .arg(spec.script.to_string_lossy().to_string())
            .cwd(&self.config.install_dir);
        let ignore: LineHandler = Arc::new(|_: &str| {});
        let ran = self.runner.run(&cmd, ignore).await;
        ticker.stop().await;
        let output = ran?.into_result()?;

        store.transition(id, JobState::Finalizing)?;
        let version = read_version(&self.config.version_file()).await;
        if version.is_none() {
            warn!(job_id = %id, "no version recorded after update");
        }
        if let Err(err) = write_last_update(&self.config.last_update_file(), version.as_deref()).await {
            warn!(job_id = %id, "failed to record last update: {err}");
        }
        Ok(JobOutput::Updated {
            version,
            stdout: tail_lines(&output.stdout, 20),
        })
    }
}
