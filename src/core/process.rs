//! Shell process launcher
//!
//! Starts PowerShell reading statements from stdin, with all three standard
//! streams attached to pipes, and hands the pipes out as a [`Transport`].

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use tracing::debug;

use super::error::{Result, ShellError};

/// Program and arguments used to start the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Windows PowerShell (powershell.exe)
    pub fn powershell() -> Self {
        Self::new("powershell.exe", interactive_args())
    }

    /// PowerShell 7 (pwsh.exe)
    pub fn pwsh() -> Self {
        Self::new("pwsh.exe", interactive_args())
    }

    /// Locate the program on PATH
    pub fn resolve(&self) -> Result<PathBuf> {
        which::which(&self.program).map_err(|source| ShellError::DependencyNotFound {
            program: self.program.clone(),
            source,
        })
    }
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self::powershell()
    }
}

/// Keep the shell alive and read commands from stdin
pub fn interactive_args() -> Vec<String> {
    ["-NoLogo", "-NoExit", "-Command", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// The three pipes of a running shell, plus its process handle
pub struct Transport {
    stdin: Option<Box<dyn Write + Send>>,
    pub(crate) stdout: Box<dyn Read + Send>,
    pub(crate) stderr: Box<dyn Read + Send>,
    child: Option<Child>,
}

impl Transport {
    /// Build a transport from arbitrary pipe ends (no process attached)
    pub fn from_pipes(
        stdin: Box<dyn Write + Send>,
        stdout: Box<dyn Read + Send>,
        stderr: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            stdin: Some(stdin),
            stdout,
            stderr,
            child: None,
        }
    }

    /// Write all of `bytes` to the shell's stdin and flush
    pub fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(stdin_closed)?;
        stdin.write_all(bytes)?;
        stdin.flush()
    }

    /// Flush and drop stdin so the shell sees end of input
    pub fn close_stdin(&mut self) -> io::Result<()> {
        let mut stdin = self.stdin.take().ok_or_else(stdin_closed)?;
        stdin.flush()
    }

    pub fn is_stdin_open(&self) -> bool {
        self.stdin.is_some()
    }

    /// True when a child process is attached
    pub fn has_process(&self) -> bool {
        self.child.is_some()
    }

    /// Process id, if a process is attached
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Exit status once the process has ended, without blocking
    pub fn try_wait(&mut self) -> Option<ExitStatus> {
        self.child.as_mut().and_then(|c| c.try_wait().ok().flatten())
    }
}

fn stdin_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "shell stdin is closed")
}

/// Start the shell with piped stdio
pub fn launch(shell: &ShellCommand) -> Result<Transport> {
    let path = shell.resolve()?;
    debug!("Launching {} {:?}", path.display(), shell.args);

    let mut child = Command::new(&path)
        .args(&shell.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(ShellError::Spawn)?;

    let stdin = child.stdin.take().ok_or(ShellError::Pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or(ShellError::Pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(ShellError::Pipe("stderr"))?;

    debug!("Shell started with pid {}", child.id());

    Ok(Transport {
        stdin: Some(Box::new(stdin)),
        stdout: Box::new(stdout),
        stderr: Box::new(stderr),
        child: Some(child),
    })
}
