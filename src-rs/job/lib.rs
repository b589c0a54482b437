pub mod store;
pub mod types;

pub use store::JobStore;
pub use types::{DownloadSpec, Job, JobId, JobKind, JobSpec, JobState, UpdateSpec};
