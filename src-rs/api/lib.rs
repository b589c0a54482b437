pub use crate::config::TrackerConfig;
pub use crate::error::JobError;
pub use crate::job::{Job, JobKind, JobSpec, JobState, JobStore};
pub use crate::result::JobOutput;
pub use crate::tracker::JobTracker;

pub mod handlers;
pub mod server;
