use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::types::{Job, JobId, JobKind, JobSpec, JobState};
use crate::error::JobError;
use crate::result::JobOutput;

/// Progress reported while a job is still running never reaches 100; only
/// `complete` does.
pub const MAX_ACTIVE_PROGRESS: u8 = 99;
pub const FINALIZING_FLOOR: u8 = 95;

const MAX_ID_ATTEMPTS: usize = 8;

pub struct JobStore {
    persist_path: Option<PathBuf>,
    jobs: RwLock<HashMap<JobId, Job>>,
    save_lock: Mutex<()>,
}

impl JobStore {
    pub fn new(persist_path: Option<PathBuf>) -> Self {
        Self {
            persist_path,
            jobs: RwLock::new(HashMap::new()),
            save_lock: Mutex::new(()),
        }
    }

    /// Reload a persisted registry. Jobs that were still in flight lost their
    /// executor with the previous process and are closed out as failed.
    pub fn restore(path: PathBuf) -> Self {
        let store = Self::new(Some(path.clone()));
        let jobs = match Self::load_from_disk(&path) {
            Ok(jobs) if jobs.is_empty() => return store,
            Ok(jobs) => jobs,
            Err(err) => {
                error!(path = %path.display(), "job registry unreadable, starting empty: {err}");
                if !matches!(err, JobError::Io(_)) {
                    set_aside(&path);
                }
                return store;
            }
        };
        let now = Utc::now();
        let mut interrupted = 0;
        if let Ok(mut map) = store.jobs.write() {
            for mut job in jobs {
                if !job.state.is_terminal() {
                    job.state = JobState::Failed;
                    job.error = Some("interrupted by restart".to_string());
                    job.result = None;
                    job.ended_at = Some(now);
                    interrupted += 1;
                }
                map.insert(job.id.clone(), job);
            }
        }
        if interrupted > 0 {
            warn!(interrupted, "closed out jobs interrupted by restart");
        }
        store.save_if_needed();
        store
    }

    pub fn create(&self, spec: JobSpec) -> Result<Job, JobError> {
        self.create_with(spec, new_id)
    }

    pub fn create_with<F>(&self, spec: JobSpec, mut next_id: F) -> Result<Job, JobError>
    where
        F: FnMut() -> JobId,
    {
        let job = {
            let mut map = self.write()?;
            let mut id = next_id();
            let mut attempts = 1;
            while map.contains_key(&id) {
                if attempts >= MAX_ID_ATTEMPTS {
                    return Err(JobError::Registry(
                        "could not allocate a unique job id".to_string(),
                    ));
                }
                warn!(job_id = %id, "job id collision, regenerating");
                id = next_id();
                attempts += 1;
            }
            let job = Job {
                id: id.clone(),
                kind: spec.kind(),
                state: JobState::Pending,
                progress: 0,
                spec,
                result: None,
                error: None,
                created_at: Utc::now(),
                started_at: None,
                ended_at: None,
            };
            map.insert(id, job.clone());
            job
        };
        self.save_if_needed();
        Ok(job)
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        match self.jobs.read() {
            Ok(map) => map.get(id).cloned(),
            Err(err) => {
                error!("job registry lock poisoned on read: {err}");
                None
            }
        }
    }

    pub fn list(&self, limit: usize, kind: Option<JobKind>) -> Vec<Job> {
        let map = match self.jobs.read() {
            Ok(lock) => lock,
            Err(err) => {
                error!("job registry lock poisoned on list: {err}");
                return vec![];
            }
        };
        let mut items: Vec<Job> = map
            .values()
            .filter(|job| kind.map_or(true, |kind| job.kind == kind))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if items.len() > limit {
            items.truncate(limit);
        }
        items
    }

    pub fn len(&self) -> usize {
        self.jobs.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn transition(&self, id: &str, to: JobState) -> Result<Job, JobError> {
        self.mutate(id, |job| {
            apply_transition(job, to)?;
            if to == JobState::Finalizing {
                job.progress = job.progress.max(FINALIZING_FLOOR);
            }
            Ok(())
        })
    }

    /// Records the latest observed percentage. Returns the stored value, or
    /// `None` when the job is not running (unknown, pending or terminal).
    pub fn report_progress(&self, id: &str, percent: u8) -> Option<u8> {
        let stored = {
            let mut map = self.write().ok()?;
            let job = map.get_mut(id)?;
            if !matches!(job.state, JobState::Running | JobState::Finalizing) {
                return None;
            }
            let clamped = percent.min(MAX_ACTIVE_PROGRESS);
            if clamped <= job.progress {
                return Some(job.progress);
            }
            job.progress = clamped;
            clamped
        };
        debug!(job_id = %id, progress = stored, "progress");
        self.save_if_needed();
        Some(stored)
    }

    pub fn complete(&self, id: &str, output: JobOutput) -> Result<Job, JobError> {
        self.mutate(id, |job| {
            apply_transition(job, JobState::Completed)?;
            job.progress = 100;
            job.result = Some(output);
            job.error = None;
            Ok(())
        })
    }

    pub fn fail(&self, id: &str, message: impl Into<String>) -> Result<Job, JobError> {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "unknown error".to_string();
        }
        self.mutate(id, |job| {
            apply_transition(job, JobState::Failed)?;
            job.result = None;
            job.error = Some(message);
            Ok(())
        })
    }

    /// Drops terminal jobs that ended more than `retention` before `now`.
    pub fn evict_expired(&self, retention: Duration, now: DateTime<Utc>) -> usize {
        let retention = match chrono::Duration::from_std(retention) {
            Ok(retention) => retention,
            Err(_) => return 0,
        };
        let removed = {
            let mut map = match self.write() {
                Ok(map) => map,
                Err(_) => return 0,
            };
            let before = map.len();
            map.retain(|_, job| match (job.state.is_terminal(), job.ended_at) {
                (true, Some(ended)) => now - ended < retention,
                _ => true,
            });
            before - map.len()
        };
        if removed > 0 {
            self.save_if_needed();
        }
        removed
    }

    fn mutate<F>(&self, id: &str, f: F) -> Result<Job, JobError>
    where
        F: FnOnce(&mut Job) -> Result<(), JobError>,
    {
        let updated = {
            let mut map = self.write()?;
            let job = map
                .get_mut(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            f(job)?;
            job.clone()
        };
        self.save_if_needed();
        Ok(updated)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<JobId, Job>>, JobError> {
        self.jobs.write().map_err(|err| {
            error!("job registry lock poisoned on write: {err}");
            JobError::Registry(err.to_string())
        })
    }

    fn save_if_needed(&self) {
        let path = match &self.persist_path {
            Some(path) => path,
            None => return,
        };
        let _guard = match self.save_lock.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let serialized = {
            let map = match self.jobs.read() {
                Ok(lock) => lock,
                Err(_) => return,
            };
            let list: Vec<&Job> = map.values().collect();
            match serde_json::to_string_pretty(&list) {
                Ok(serialized) => serialized,
                Err(err) => {
                    error!("failed to serialize job registry: {err}");
                    return;
                }
            }
        };
        // Written beside the target and renamed over it, so a crash mid-write
        // never leaves a truncated registry behind.
        let tmp = with_suffix(path, ".tmp");
        if let Err(err) = fs::write(&tmp, serialized).and_then(|_| fs::rename(&tmp, path)) {
            warn!(path = %path.display(), "failed to persist job registry: {err}");
        }
    }

    /// Reads a persisted registry. A missing file is an empty registry.
    pub fn load_from_disk(path: &Path) -> Result<Vec<Job>, JobError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str::<Vec<Job>>(&data)
            .map_err(|err| JobError::Registry(format!("invalid registry file: {err}")))
    }
}

/// Moves an unreadable registry out of the way so the next save doesn't
/// overwrite it.
fn set_aside(path: &Path) {
    let aside = with_suffix(path, &format!(".corrupt-{}", Utc::now().timestamp()));
    match fs::rename(path, &aside) {
        Ok(()) => warn!(path = %aside.display(), "kept unreadable job registry"),
        Err(err) => error!(path = %path.display(), "could not move unreadable registry aside: {err}"),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn apply_transition(job: &mut Job, to: JobState) -> Result<(), JobError> {
    if !job.state.can_transition_to(to) {
        return Err(JobError::InvalidTransition {
            from: job.state,
            to,
        });
    }
    job.state = to;
    let now = Utc::now();
    if to == JobState::Running {
        job.started_at = Some(now);
    }
    if to.is_terminal() {
        job.ended_at = Some(now);
    }
    Ok(())
}

fn new_id() -> JobId {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::UpdateSpec;

    fn update_spec() -> JobSpec {
        JobSpec::Update(UpdateSpec {
            script: PathBuf::from("/tmp/auto-update.sh"),
        })
    }

    fn updated() -> JobOutput {
        JobOutput::Updated {
            version: Some("abc123".to_string()),
            stdout: String::new(),
        }
    }

    #[test]
    fn create_inserts_pending_job() {
        let store = JobStore::new(None);
        let job = store.create(update_spec()).unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.kind, JobKind::Update);
        assert_eq!(store.get(&job.id), Some(job));
    }

    #[test]
    fn id_collision_regenerates_instead_of_overwriting() {
        let store = JobStore::new(None);
        let first = store
            .create_with(update_spec(), || "fixed".to_string())
            .unwrap();
        store.transition(&first.id, JobState::Running).unwrap();

        let mut ids = vec!["other".to_string(), "fixed".to_string()];
        let second = store
            .create_with(update_spec(), move || ids.pop().unwrap())
            .unwrap();

        assert_eq!(second.id, "other");
        assert_eq!(store.get("fixed").unwrap().state, JobState::Running);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn id_allocation_gives_up_after_repeated_collisions() {
        let store = JobStore::new(None);
        store
            .create_with(update_spec(), || "same".to_string())
            .unwrap();
        let err = store
            .create_with(update_spec(), || "same".to_string())
            .unwrap_err();
        assert!(matches!(err, JobError::Registry(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn progress_is_monotonic_and_clamped_below_completion() {
        let store = JobStore::new(None);
        let job = store.create(update_spec()).unwrap();

        assert_eq!(store.report_progress(&job.id, 10), None);
        store.transition(&job.id, JobState::Running).unwrap();

        assert_eq!(store.report_progress(&job.id, 40), Some(40));
        assert_eq!(store.report_progress(&job.id, 20), Some(40));
        assert_eq!(store.report_progress(&job.id, 100), Some(99));
        assert_eq!(store.get(&job.id).unwrap().progress, 99);
    }

    #[test]
    fn finalizing_raises_progress_floor() {
        let store = JobStore::new(None);
        let job = store.create(update_spec()).unwrap();
        store.transition(&job.id, JobState::Running).unwrap();
        store.report_progress(&job.id, 30);

        let job = store.transition(&job.id, JobState::Finalizing).unwrap();
        assert_eq!(job.progress, FINALIZING_FLOOR);
    }

    #[test]
    fn complete_sets_result_and_full_progress() {
        let store = JobStore::new(None);
        let job = store.create(update_spec()).unwrap();
        store.transition(&job.id, JobState::Running).unwrap();
        let job = store.complete(&job.id, updated()).unwrap();

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.error.is_none());
        assert!(job.ended_at.is_some());
    }

    #[test]
    fn terminal_jobs_reject_further_writes() {
        let store = JobStore::new(None);
        let job = store.create(update_spec()).unwrap();
        store.transition(&job.id, JobState::Running).unwrap();
        let failed = store.fail(&job.id, "disk full").unwrap();

        assert!(matches!(
            store.complete(&job.id, updated()),
            Err(JobError::InvalidTransition { .. })
        ));
        assert!(store.fail(&job.id, "again").is_err());
        assert_eq!(store.report_progress(&job.id, 50), None);
        assert_eq!(store.get(&job.id).unwrap(), failed);
    }

    #[test]
    fn fail_never_stores_blank_error() {
        let store = JobStore::new(None);
        let job = store.create(update_spec()).unwrap();
        let job = store.fail(&job.id, "").unwrap();
        assert_eq!(job.error.as_deref(), Some("unknown error"));
        assert!(job.result.is_none());
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let store = JobStore::new(None);
        assert!(store.get("nonexistent-id").is_none());
        assert!(matches!(
            store.transition("nonexistent-id", JobState::Running),
            Err(JobError::NotFound(_))
        ));
    }

    #[test]
    fn eviction_only_removes_expired_terminal_jobs() {
        let store = JobStore::new(None);
        let done = store.create(update_spec()).unwrap();
        store.transition(&done.id, JobState::Running).unwrap();
        store.complete(&done.id, updated()).unwrap();
        let running = store.create(update_spec()).unwrap();
        store.transition(&running.id, JobState::Running).unwrap();

        let retention = Duration::from_secs(60);
        assert_eq!(store.evict_expired(retention, Utc::now()), 0);

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(store.evict_expired(retention, later), 1);
        assert!(store.get(&done.id).is_none());
        assert!(store.get(&running.id).is_some());
    }

    #[test]
    fn list_is_newest_first_and_filters_kind() {
        let store = JobStore::new(None);
        let first = store.create(update_spec()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = store.create(update_spec()).unwrap();

        let listed = store.list(10, None);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert_eq!(store.list(1, None).len(), 1);
        assert!(store.list(10, Some(JobKind::Download)).is_empty());
    }

    #[test]
    fn restore_fails_jobs_left_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");

        let store = JobStore::new(Some(path.clone()));
        let done = store.create(update_spec()).unwrap();
        store.transition(&done.id, JobState::Running).unwrap();
        store.complete(&done.id, updated()).unwrap();
        let running = store.create(update_spec()).unwrap();
        store.transition(&running.id, JobState::Running).unwrap();
        drop(store);

        let restored = JobStore::restore(path);
        assert_eq!(restored.get(&done.id).unwrap().state, JobState::Completed);
        let interrupted = restored.get(&running.id).unwrap();
        assert_eq!(interrupted.state, JobState::Failed);
        assert_eq!(interrupted.error.as_deref(), Some("interrupted by restart"));
    }

    #[test]
    fn saves_replace_the_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let store = JobStore::new(Some(path.clone()));
        let job = store.create(update_spec()).unwrap();
        store.transition(&job.id, JobState::Running).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("jobs.json")]);
        let loaded = JobStore::load_from_disk(&path).unwrap();
        assert_eq!(loaded[0].state, JobState::Running);
    }

    #[test]
    fn missing_registry_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = JobStore::load_from_disk(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn truncated_registry_is_kept_aside_on_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let store = JobStore::new(Some(path.clone()));
        for _ in 0..3 {
            store.create(update_spec()).unwrap();
        }
        drop(store);

        let full = std::fs::read_to_string(&path).unwrap();
        let truncated = &full[..full.len() / 2];
        std::fs::write(&path, truncated).unwrap();
        assert!(matches!(
            JobStore::load_from_disk(&path),
            Err(JobError::Registry(_))
        ));

        let restored = JobStore::restore(path.clone());
        assert!(restored.is_empty());
        assert!(!path.exists());
        let aside: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.to_string_lossy().contains("jobs.json.corrupt-"))
            .collect();
        assert_eq!(aside.len(), 1);
        assert_eq!(std::fs::read_to_string(&aside[0]).unwrap(), truncated);

        restored.create(update_spec()).unwrap();
        assert_eq!(JobStore::load_from_disk(&path).unwrap().len(), 1);
    }
}
