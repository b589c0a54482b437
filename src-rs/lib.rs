pub mod config;
pub mod error;
pub mod helpers;
pub mod operations;
pub mod progress;
pub mod result;
pub mod tracker;
pub mod update_check;

#[path = "source/lib.rs"]
pub mod source;
#[path = "exec/lib.rs"]
pub mod exec;
#[path = "job/lib.rs"]
pub mod job;
#[path = "api/lib.rs"]
pub mod api;

#[cfg(test)]
mod test_support;

pub use config::TrackerConfig;
pub use error::JobError;
pub use result::JobOutput;
pub use tracker::JobTracker;
