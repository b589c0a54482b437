use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::config::TrackerConfig;
use crate::error::JobError;
use crate::job::{DownloadSpec, Job, JobId, JobKind, JobSpec, JobState, JobStore, UpdateSpec};
use crate::operations::Operations;
use crate::result::JobOutput;

type CancelMap = Arc<Mutex<HashMap<JobId, oneshot::Sender<()>>>>;

/// Owns every job record and the executors driving them. Callers get
/// snapshots back; only executors write.
///
/// `submit` spawns onto the current tokio runtime.
pub struct JobTracker {
    store: Arc<JobStore>,
    ops: Arc<Operations>,
    cancels: CancelMap,
}

impl JobTracker {
    pub fn new(store: Arc<JobStore>, ops: Operations) -> Self {
        Self {
            store,
            ops: Arc::new(ops),
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.ops.config
    }

    pub fn operations(&self) -> &Operations {
        &self.ops
    }

    pub fn submit(&self, spec: JobSpec) -> Result<JobId, JobError> {
        spec.validate()?;
        let job = self.store.create(spec)?;
        let id = job.id.clone();

        let (cancel_tx, cancel_rx) = oneshot::channel();
        if let Ok(mut cancels) = self.cancels.lock() {
            cancels.insert(id.clone(), cancel_tx);
        }

        info!(job_id = %id, kind = ?job.kind, "job submitted");
        let executor = Executor {
            store: self.store.clone(),
            ops: self.ops.clone(),
            cancels: self.cancels.clone(),
            deadline: self.ops.config.job_deadline,
        };
        tokio::spawn(executor.drive(id.clone(), job.spec, cancel_rx));
        Ok(id)
    }

    pub fn submit_download(
        &self,
        server_type: &str,
        mc_version: &str,
        build_version: &str,
    ) -> Result<JobId, JobError> {
        self.submit(JobSpec::Download(DownloadSpec {
            server_type: server_type.to_string(),
            mc_version: mc_version.to_string(),
            build_version: build_version.to_string(),
        }))
    }

    pub fn submit_update(&self) -> Result<JobId, JobError> {
        self.submit(JobSpec::Update(UpdateSpec {
            script: self.ops.config.update_script(),
        }))
    }

    pub fn get_status(&self, id: &str) -> Result<Job, JobError> {
        self.store
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub fn list(&self, limit: usize, kind: Option<JobKind>) -> Vec<Job> {
        self.store.list(limit, kind)
    }

    /// Asks the job's executor to stop. The job turns `Failed` once the
    /// executor observes the signal; terminal jobs are returned unchanged.
    pub fn cancel(&self, id: &str) -> Result<Job, JobError> {
        let job = self.get_status(id)?;
        if job.state.is_terminal() {
            return Ok(job);
        }
        let sender = self
            .cancels
            .lock()
            .ok()
            .and_then(|mut cancels| cancels.remove(id));
        match sender {
            Some(tx) => {
                info!(job_id = %id, "cancellation requested");
                let _ = tx.send(());
            }
            None => warn!(job_id = %id, "no executor to cancel"),
        }
        self.get_status(id)
    }

    pub fn evict_expired(&self) -> usize {
        let retention = match self.ops.config.retention {
            Some(retention) => retention,
            None => return 0,
        };
        let removed = self.store.evict_expired(retention, Utc::now());
        if removed > 0 {
            info!(removed, "evicted expired jobs");
        }
        removed
    }

    /// Periodically evicts terminal jobs past their retention. `None` when
    /// retention is disabled.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let retention = self.ops.config.retention?;
        let every = self.ops.config.sweep_interval;
        let store = self.store.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = store.evict_expired(retention, Utc::now());
                if removed > 0 {
                    info!(removed, "evicted expired jobs");
                }
            }
        }))
    }

    /// Cancels every job still in flight.
    pub fn shutdown(&self) -> usize {
        let senders: Vec<(JobId, oneshot::Sender<()>)> = match self.cancels.lock() {
            Ok(mut cancels) => cancels.drain().collect(),
            Err(_) => return 0,
        };
        let count = senders.len();
        for (id, tx) in senders {
            if tx.send(()).is_ok() {
                info!(job_id = %id, "cancelled on shutdown");
            }
        }
        count
    }
}

struct Executor {
    store: Arc<JobStore>,
    ops: Arc<Operations>,
    cancels: CancelMap,
    deadline: Option<Duration>,
}

impl Executor {
    async fn drive(self, id: JobId, spec: JobSpec, cancel_rx: oneshot::Receiver<()>) {
        if let Err(err) = self.store.transition(&id, JobState::Running) {
            warn!(job_id = %id, "executor could not start job: {err}");
            self.forget(&id);
            return;
        }

        let work = {
            let store = self.store.clone();
            let ops = self.ops.clone();
            let id = id.clone();
            tokio::spawn(async move { ops.run(&store, &id, &spec).await })
        };

        match wait_for(work, cancel_rx, self.deadline).await {
            Ok(output) => self.finish(&id, output),
            Err(err) => {
                warn!(job_id = %id, "job failed: {err}");
                if let Err(err) = self.store.fail(&id, err.to_string()) {
                    error!(job_id = %id, "could not record failure: {err}");
                }
            }
        }
        self.forget(&id);
    }

    fn finish(&self, id: &str, output: JobOutput) {
        match self.store.complete(id, output) {
            Ok(_) => info!(job_id = %id, "job completed"),
            Err(err) => error!(job_id = %id, "could not record completion: {err}"),
        }
    }

    fn forget(&self, id: &str) {
        if let Ok(mut cancels) = self.cancels.lock() {
            cancels.remove(id);
        }
    }
}

/// Waits for the operation task, a cancel signal or the deadline, whichever
/// comes first. On cancel or timeout the task is aborted and joined before
/// returning, so nothing it owns outlives the call.
async fn wait_for(
    mut work: JoinHandle<Result<JobOutput, JobError>>,
    cancel_rx: oneshot::Receiver<()>,
    deadline: Option<Duration>,
) -> Result<JobOutput, JobError> {
    let expiry = async {
        match deadline {
            Some(limit) => {
                tokio::time::sleep(limit).await;
                limit
            }
            None => std::future::pending::<Duration>().await,
        }
    };

    let stopped = tokio::select! {
        joined = &mut work => return flatten(joined),
        Ok(()) = cancel_rx => JobError::Cancelled,
        limit = expiry => JobError::TimedOut(limit),
    };
    work.abort();
    let _ = work.await;
    Err(stopped)
}

fn flatten(joined: Result<Result<JobOutput, JobError>, JoinError>) -> Result<JobOutput, JobError> {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(JobError::Crashed("operation panicked".to_string())),
        Err(err) => Err(JobError::Crashed(err.to_string())),
    }
}
