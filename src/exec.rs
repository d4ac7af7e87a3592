//! Blocking invocation of external command line tools.
//!
//! The mesh export and metric computation collaborators are external
//! processes. They are run synchronously, with their exit status checked
//! explicitly: a tool that exits abnormally is reported as a tool failure in
//! its own right, never left to surface later as a missing output file. An
//! optional timeout guards against a hung invocation stalling the batch.

use serde::{Deserialize, Serialize};
use tracing::debug;

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{GyrificationError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An external tool invocation: program plus fixed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// The structured result of a finished tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolCommand {
    pub fn new<S: Into<String>>(program: S) -> ToolCommand {
        ToolCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> ToolCommand {
        self.args.push(arg.into());
        self
    }

    /// Run the tool to completion and capture its output.
    ///
    /// With a timeout, the child is polled and killed once the deadline
    /// passes; without one, the call blocks for as long as the tool runs.
    pub fn run(&self, timeout: Option<Duration>) -> Result<ToolOutput> {
        debug!(program = %self.program, args = ?self.args, "invoking external tool");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                GyrificationError::ExternalToolFailure(
                    self.program.clone(),
                    format!("could not be started: {}", e),
                )
            })?;

        // Drain the pipes on their own threads so a chatty tool cannot
        // deadlock against a full pipe buffer while we wait on it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_with_deadline(&mut child, timeout)?;

        let output = ToolOutput {
            success: status.success(),
            code: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };
        debug!(program = %self.program, code = ?output.code, "external tool finished");
        Ok(output)
    }

    /// Like [`run`](Self::run), but an abnormal exit is an error.
    pub fn run_checked(&self, timeout: Option<Duration>) -> Result<ToolOutput> {
        let output = self.run(timeout)?;
        if !output.success {
            return Err(GyrificationError::ExternalToolFailure(
                self.program.clone(),
                format!(
                    "exit code {:?}, stderr: {}",
                    output.code,
                    output.stderr.trim()
                ),
            ));
        }
        Ok(output)
    }

    fn wait_with_deadline(
        &self,
        child: &mut Child,
        timeout: Option<Duration>,
    ) -> Result<ExitStatus> {
        let limit = match timeout {
            None => return Ok(child.wait()?),
            Some(limit) => limit,
        };
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GyrificationError::ExternalToolTimeout(self.program.clone()));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_string(&mut buf);
        }
        buf
    })
}
