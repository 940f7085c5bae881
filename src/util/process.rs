//! Subprocess execution utilities.
//!
//! External tools (javac, the batch compiler, make) are run through
//! [`ProcessBuilder`]. Output can be captured wholesale, inherited, or
//! streamed line-by-line through a bounded channel fed by one reader
//! thread per stream. A configured timeout terminates the child's whole
//! process group on unix so no orphaned build tool is left running.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

/// A line produced by a running subprocess, tagged with its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    Stdout(String),
    Stderr(String),
}

impl StreamLine {
    /// The line text without the stream tag.
    pub fn text(&self) -> &str {
        match self {
            StreamLine::Stdout(s) | StreamLine::Stderr(s) => s,
        }
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            timeout: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Terminate the subprocess (and its process group) after `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        // Put the child in its own group so a timeout can take down the
        // whole tree, not just the immediate child.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }

    /// Execute the command, capturing output, and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        Ok(output)
    }

    /// Execute with captured output and require success.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` failed with exit code {:?}\n{}",
                self.display_command(),
                output.status.code(),
                stderr
            );
        }
        Ok(output)
    }

    /// Run with inherited stdio and return the exit code.
    pub fn run(&self) -> Result<i32> {
        let mut cmd = self.build_command();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;
        self.wait_child(&mut child)
    }

    /// Run, delivering each output line to `sink` as it is produced.
    ///
    /// One reader thread per stream feeds a bounded channel; the calling
    /// thread drains it at a single waiting point, so output arrives
    /// incrementally rather than all at once after exit.
    pub fn run_streamed(&self, mut sink: impl FnMut(StreamLine)) -> Result<i32> {
        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let (tx, rx) = mpsc::sync_channel::<StreamLine>(256);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut readers = Vec::new();
        if let Some(out) = stdout {
            let tx = tx.clone();
            readers.push(thread::spawn(move || {
                for line in BufReader::new(out).lines().map_while(|l| l.ok()) {
                    if tx.send(StreamLine::Stdout(line)).is_err() {
                        break;
                    }
                }
            }));
        }
        if let Some(err) = stderr {
            let tx = tx.clone();
            readers.push(thread::spawn(move || {
                for line in BufReader::new(err).lines().map_while(|l| l.ok()) {
                    if tx.send(StreamLine::Stderr(line)).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut exit: Option<i32> = None;
        loop {
            match rx.recv_timeout(Duration::from_millis(50)) {
                Ok(line) => sink(line),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    // Both streams closed; the child is done or about to be.
                    if exit.is_none() {
                        exit = Some(self.wait_child(&mut child)?);
                    }
                    break;
                }
            }
            if let Some(code) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                exit = Some(code.code().unwrap_or(-1));
            }
            if let Some(deadline) = deadline {
                if exit.is_none() && Instant::now() >= deadline {
                    kill_group(&mut child);
                    for r in readers.drain(..) {
                        let _ = r.join();
                    }
                    bail!(
                        "process timed out after {} seconds: {}",
                        self.timeout.unwrap_or_default().as_secs(),
                        self.display_command()
                    );
                }
            }
        }
        for r in readers {
            let _ = r.join();
        }
        // exit is set on every path out of the loop above
        Ok(exit.unwrap_or(-1))
    }

    /// Wait for an already-spawned child, honoring the configured timeout.
    fn wait_child(&self, child: &mut Child) -> Result<i32> {
        match self.timeout {
            None => {
                let status = child
                    .wait()
                    .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;
                Ok(status.code().unwrap_or(-1))
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                let mut delay = Duration::from_micros(500);
                loop {
                    if let Some(status) = child.try_wait().with_context(|| {
                        format!("failed to wait for `{}`", self.program.display())
                    })? {
                        return Ok(status.code().unwrap_or(-1));
                    }
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        kill_group(child);
                        bail!(
                            "process timed out after {} seconds: {}",
                            timeout.as_secs(),
                            self.display_command()
                        );
                    }
                    thread::sleep(delay.min(remaining));
                    delay = (delay * 2).min(Duration::from_millis(50));
                }
            }
        }
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Kill a child's whole process group (unix), or the child alone elsewhere.
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    let pid = child.id() as libc::pid_t;
    unsafe {
        if libc::killpg(pid, libc::SIGKILL) != 0 {
            tracing::warn!("failed to kill process group {}", pid);
            let _ = child.kill();
        }
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find the GNU make command for this platform.
pub fn find_make() -> Option<PathBuf> {
    for make in &["gmake", "make"] {
        if let Some(path) = find_executable(make) {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_builder() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.trim() == "hello" || stdout.contains("hello"));
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("javac").args(["-d", "bin", "@files.txt"]);

        assert_eq!(pb.display_command(), "javac -d bin @files.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_streamed_delivers_both_streams() {
        let pb = ProcessBuilder::new("sh").args(["-c", "echo out; echo err >&2"]);

        let mut lines = Vec::new();
        let code = pb.run_streamed(|l| lines.push(l)).unwrap();

        assert_eq!(code, 0);
        assert!(lines.contains(&StreamLine::Stdout("out".to_string())));
        assert!(lines.contains(&StreamLine::Stderr("err".to_string())));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_hung_process() {
        let pb = ProcessBuilder::new("sleep")
            .arg("30")
            .timeout(Some(Duration::from_millis(200)));

        let err = pb.run().unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_nonzero_exit_code() {
        let pb = ProcessBuilder::new("sh").args(["-c", "exit 3"]);
        assert_eq!(pb.run().unwrap(), 3);
    }
}
