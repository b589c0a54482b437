use std::collections::VecDeque;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error};

use super::types::{CommandOutput, CommandSpec, LineHandler};
use crate::error::JobError;

const KEEP_LINES: usize = 200;

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec, on_line: LineHandler) -> Result<CommandOutput, JobError>;
}

/// Runs commands with `tokio::process`. The child is killed if the future
/// driving it is dropped, which is how cancellation reaches the process.
#[derive(Clone, Debug, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, spec: &CommandSpec, on_line: LineHandler) -> Result<CommandOutput, JobError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        debug!(command = %spec.display(), "spawning");
        let mut child = cmd.spawn().map_err(|err| {
            error!(program = %spec.program, "failed to spawn: {err}");
            JobError::Spawn {
                program: spec.program.clone(),
                message: err.to_string(),
            }
        })?;
        let mut group = GroupKill {
            pgid: child.id().and_then(|pid| i32::try_from(pid).ok()),
        };

        let stdout = child.stdout.take().ok_or_else(|| JobError::Spawn {
            program: spec.program.clone(),
            message: "failed to capture stdout".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| JobError::Spawn {
            program: spec.program.clone(),
            message: "failed to capture stderr".to_string(),
        })?;

        let (stdout_lines, stderr_lines, status) = tokio::join!(
            read_lines(stdout, on_line.clone()),
            read_lines(stderr, on_line),
            child.wait(),
        );
        let status = status?;
        group.disarm();

        Ok(CommandOutput {
            exit_code: status.code(),
            success: status.success(),
            stdout: join_lines(stdout_lines),
            stderr: join_lines(stderr_lines),
        })
    }
}

/// Kills the child's process group when dropped, so whatever a script is
/// running in the foreground goes down with it. Declared after the child so
/// it fires while the child is still unreaped and the group id is still ours.
struct GroupKill {
    pgid: Option<i32>,
}

impl GroupKill {
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    // SAFETY: plain syscall; a negative pid targets the whole group.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!(pgid, "process group already gone: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {}

/// Splits on both `\r` and `\n` so carriage-return progress redraws count as
/// separate lines. Only the most recent lines are kept.
async fn read_lines<R: AsyncRead + Unpin>(reader: R, on_line: LineHandler) -> VecDeque<String> {
    let mut reader = BufReader::new(reader);
    let mut kept = VecDeque::new();
    let mut line_buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for byte in &chunk[..read] {
            match byte {
                b'\r' | b'\n' => flush_line(&mut line_buf, &on_line, &mut kept),
                other => line_buf.push(*other),
            }
        }
    }
    flush_line(&mut line_buf, &on_line, &mut kept);
    kept
}

fn flush_line(line_buf: &mut Vec<u8>, on_line: &LineHandler, kept: &mut VecDeque<String>) {
    if line_buf.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(line_buf).trim().to_string();
    line_buf.clear();
    if line.is_empty() {
        return;
    }
    on_line(&line);
    if kept.len() == KEEP_LINES {
        kept.pop_front();
    }
    kept.push_back(line);
}

fn join_lines(lines: VecDeque<String>) -> String {
    lines.into_iter().collect::<Vec<_>>().join("\n")
}
