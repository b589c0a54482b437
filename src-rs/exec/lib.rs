pub mod installer;
pub mod runner;
pub mod types;

pub use installer::{Installer, ServerInstaller, ServerManifest};
pub use runner::{CommandRunner, ShellRunner};
pub use types::{CommandOutput, CommandSpec, LineHandler};
