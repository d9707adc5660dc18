//! External command execution utilities.
//!
//! Provides a Builder-based API for running the TeX toolchain as opaque
//! subprocesses, with output redirected to a log file and cooperative
//! cancellation while waiting for exit.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let exit = Cmd::new("pdflatex")
//!     .args(["-interaction=nonstopmode", "main.tex"])
//!     .cwd(root)
//!     .log_to(out.join("pass-1.log"))
//!     .spawn_supervised(is_shutdown)?;
//! ```

use std::{
    ffi::{OsStr, OsString},
    fs::File,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    time::Duration,
};
use thiserror::Error;

/// Interval between exit/cancellation checks while a child runs.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    log_file: Option<PathBuf>,
}

/// How a supervised child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Finished(ExitStatus),
    /// Killed because cancellation was requested.
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start `{0}`")]
    Spawn(String, #[source] std::io::Error),

    #[error("failed to wait for `{0}`")]
    Wait(String, #[source] std::io::Error),

    #[error("failed to open log file `{0}`")]
    Log(PathBuf, #[source] std::io::Error),
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set environment variables for the subprocess.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self.envs.push((k.as_ref().to_owned(), v.as_ref().to_owned()));
        }
        self
    }

    /// Redirect stdout and stderr into `path` (inherit the terminal if unset).
    pub fn log_to<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.log_file = Some(path.as_ref().to_owned());
        self
    }

    /// Get the program name for error messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Start the process and block until it exits or `cancel` returns true.
    ///
    /// On cancellation the child is killed and reaped before returning, so no
    /// orphaned process outlives the call.
    pub fn spawn_supervised(self, cancel: impl Fn() -> bool) -> Result<Exit, ExecError> {
        let name = self.program_name();
        let mut child = self.spawn()?;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Exit::Finished(status)),
                Ok(None) if cancel() => {
                    kill_and_reap(&mut child);
                    return Ok(Exit::Cancelled);
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill_and_reap(&mut child);
                    return Err(ExecError::Wait(name, e));
                }
            }
        }
    }

    fn spawn(self) -> Result<Child, ExecError> {
        let name = self.program_name();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().cloned())
            .stdin(Stdio::null());

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        if let Some(path) = &self.log_file {
            let file = File::create(path).map_err(|e| ExecError::Log(path.clone(), e))?;
            let err = file
                .try_clone()
                .map_err(|e| ExecError::Log(path.clone(), e))?;
            cmd.stdout(file).stderr(err);
        }

        cmd.spawn().map_err(|e| ExecError::Spawn(name, e))
    }
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    #[test]
    fn test_spawn_missing_binary() {
        let result = Cmd::new("arxify-definitely-not-a-binary").spawn_supervised(|| false);
        assert!(matches!(result, Err(ExecError::Spawn(..))));
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let exit = Cmd::new("sh")
            .args(["-c", "exit 3"])
            .spawn_supervised(|| false)
            .unwrap();
        match exit {
            Exit::Finished(status) => assert_eq!(status.code(), Some(3)),
            Exit::Cancelled => panic!("not cancelled"),
        }
    }

    #[test]
    fn test_output_goes_to_log_file() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("pass.log");
        Cmd::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .cwd(temp.path())
            .log_to(&log)
            .spawn_supervised(|| false)
            .unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("out"));
        assert!(content.contains("err"));
    }

    #[test]
    fn test_cancel_kills_child() {
        let start = Instant::now();
        let exit = Cmd::new("sleep")
            .arg("30")
            .spawn_supervised(|| start.elapsed() > Duration::from_millis(100))
            .unwrap();
        assert_eq!(exit, Exit::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_envs_are_passed() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("env.log");
        Cmd::new("sh")
            .args(["-c", "echo $BIBINPUTS"])
            .envs([("BIBINPUTS", "/paper:")])
            .log_to(&log)
            .spawn_supervised(|| false)
            .unwrap();
        assert_eq!(std::fs::read_to_string(&log).unwrap().trim(), "/paper:");
    }
}
