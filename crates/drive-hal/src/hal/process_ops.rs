//! Process execution helpers.
//!
//! External commands are considered "world-touching" and must go through the HAL so the
//! diagnostic pipeline can be tested without spawning real processes.

use crate::{HalError, HalResult};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Everything observed about one finished external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub program: String,
    pub args: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl ProcessRecord {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Error describing this record as a failed run of its program.
    pub fn failure(&self) -> HalError {
        let stderr = self
            .stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string();
        HalError::CommandFailed {
            program: self.program.clone(),
            code: self.exit_code,
            stderr,
        }
    }
}

/// Process execution trait (external command runner).
pub trait ProcessOps: Send + Sync {
    /// Run `program` to completion, killing it once `timeout` elapses.
    ///
    /// A nonzero exit is *not* an error here; callers decide what exit codes mean.
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<ProcessRecord>;
}

/// Runs real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcess;

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return HalError::CommandNotFound(program.to_string());
    }
    HalError::Io(err)
}

impl ProcessOps for SystemProcess {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<ProcessRecord> {
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        log::debug!("Running command: {}", command_line);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        // Drain pipes concurrently; badblocks and smartctl can be chatty.
        let stdout_handle = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout.take() {
                let _ = out.read_to_end(&mut buf);
            }
            buf
        });
        let stderr_handle = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr.take() {
                let _ = err.read_to_end(&mut buf);
            }
            buf
        });

        let status: ExitStatus = match child.wait_timeout(timeout).map_err(HalError::Io)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                log::warn!(
                    "Command timed out after {}s: {}",
                    timeout.as_secs(),
                    command_line
                );
                return Err(HalError::CommandTimeout {
                    program: program.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();
        let elapsed = started.elapsed();

        log::info!(
            "Command exited: {} (exit={:?}, time={:.3}s)",
            command_line,
            status.code(),
            elapsed.as_secs_f64()
        );

        Ok(ProcessRecord {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            stdout: String::from_utf8_lossy(&stdout).replace("\r\n", "\n"),
            stderr: String::from_utf8_lossy(&stderr).replace("\r\n", "\n"),
            exit_code: status.code(),
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_process_captures_output_and_exit_code() {
        let record = SystemProcess
            .run(
                "sh",
                &["-c", "echo out; echo err >&2; exit 3"],
                Duration::from_secs(10),
            )
            .unwrap();
        assert_eq!(record.stdout, "out\n");
        assert_eq!(record.stderr, "err\n");
        assert_eq!(record.exit_code, Some(3));
        assert!(!record.success());
    }

    #[test]
    fn system_process_times_out() {
        let err = SystemProcess
            .run("sleep", &["5"], Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, HalError::CommandTimeout { .. }));
    }

    #[test]
    fn missing_program_is_command_not_found() {
        let err = SystemProcess
            .run("drive-tester-no-such-tool", &[], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, HalError::CommandNotFound(_)));
    }

    #[test]
    fn failure_keeps_last_stderr_line() {
        let record = ProcessRecord {
            program: "parted".to_string(),
            args: vec!["--machine".to_string()],
            stdout: String::new(),
            stderr: "Warning: foo\nError: could not stat device\n\n".to_string(),
            exit_code: Some(1),
            elapsed: Duration::ZERO,
        };
        match record.failure() {
            HalError::CommandFailed { stderr, code, .. } => {
                assert_eq!(stderr, "Error: could not stat device");
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(record.command_line(), "parted --machine");
    }
}
