//! Session management
//!
//! A [`Session`] owns one long-lived PowerShell process and runs commands
//! in it one at a time. Each command is framed with a boundary token (see
//! [`framing`](super::framing)) and the session reads stdout and stderr until
//! both streams have echoed that token back.
//!
//! ```no_run
//! use psession::Session;
//!
//! let mut shell = Session::new()?;
//! let out = shell.exec("echo こんにちは")?;
//! assert_eq!(out.trim(), "こんにちは");
//! shell.exit()?;
//! # Ok::<(), psession::ShellError>(())
//! ```

use std::process::ExitStatus;

use tracing::{debug, trace};

use super::boundary::BoundaryGenerator;
use super::encoding::{self, Codec};
use super::error::{Result, ShellError};
use super::framing::{self, EXIT_LINE};
use super::process::{self, ShellCommand, Transport};
use super::reader::{self, DEFAULT_CHUNK_SIZE};

/// Statement that prints the active code page
const CODE_PAGE_QUERY: &str = "chcp";

/// Separator before the numeric field in the code page query output
const CODE_PAGE_DELIMITER: &str = ": ";

/// How to start a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Shell program and arguments
    pub shell: ShellCommand,
    /// Code page to use; detected with `chcp` when `None`
    pub code_page: Option<u32>,
    /// Raw read size for the output readers
    pub chunk_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            shell: ShellCommand::default(),
            code_page: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A PowerShell session.
///
/// Commands run serially; `exec` takes `&mut self`, so a session cannot
/// have two commands in flight.
pub struct Session {
    code_page: u32,
    codec: Codec,
    transport: Transport,
    boundaries: BoundaryGenerator,
    chunk_size: usize,
}

impl Session {
    /// Start `powershell.exe` and detect its code page
    pub fn new() -> Result<Self> {
        Self::with_options(SessionOptions::default())
    }

    /// Start `powershell.exe` with a known code page, skipping detection
    pub fn with_code_page(code_page: u32) -> Result<Self> {
        Self::with_options(SessionOptions {
            code_page: Some(code_page),
            ..SessionOptions::default()
        })
    }

    pub fn with_options(options: SessionOptions) -> Result<Self> {
        // Reject an unknown explicit code page before starting a process
        if let Some(cp) = options.code_page {
            encoding::lookup(cp).ok_or(ShellError::UnsupportedCodePage(cp))?;
        }

        let transport = process::launch(&options.shell)?;
        Self::from_transport(transport, options.code_page, options.chunk_size)
    }

    /// Build a session over an already running shell.
    ///
    /// With `code_page == None` the code page is queried through the
    /// transport before anything else is sent.
    pub fn from_transport(
        transport: Transport,
        code_page: Option<u32>,
        chunk_size: usize,
    ) -> Result<Self> {
        let mut session = Self {
            code_page: 0,
            codec: Codec::transparent(),
            transport,
            boundaries: BoundaryGenerator::new(),
            chunk_size: chunk_size.max(1),
        };

        let cp = match code_page {
            Some(cp) => cp,
            None => session.detect_code_page()?,
        };
        let codec = encoding::lookup(cp).ok_or(ShellError::UnsupportedCodePage(cp))?;

        session.code_page = cp;
        session.codec = codec;
        debug!("Session ready: code page {} ({})", cp, codec.name());
        Ok(session)
    }

    /// The session's code page
    pub fn code_page(&self) -> u32 {
        self.code_page
    }

    /// Name of the codec used for this session
    pub fn encoding_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Process id of the shell, if this session started one
    pub fn pid(&self) -> Option<u32> {
        self.transport.id()
    }

    /// Check if the shell process is still running.
    ///
    /// Always false for a session built over bare pipes.
    pub fn is_running(&mut self) -> bool {
        self.transport.has_process() && self.transport.try_wait().is_none()
    }

    /// Exit status once the shell has ended
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.transport.try_wait()
    }

    /// True once `exit` has closed the shell's input
    pub fn is_closed(&self) -> bool {
        !self.transport.is_stdin_open()
    }

    /// Run `command` and return what it wrote to stdout.
    ///
    /// If the command wrote anything to stderr the result is
    /// [`ShellError::Command`], which still carries the stdout text.
    pub fn exec(&mut self, command: &str) -> Result<String> {
        let boundary = self.boundaries.next_boundary();
        self.send_command(command, &boundary)?;

        let marker = framing::boundary_marker(&boundary);
        let (stdout, stderr) = reader::read_both(
            &mut self.transport.stdout,
            &mut self.transport.stderr,
            self.codec,
            &marker,
            self.chunk_size,
        );
        debug!(
            "Command finished: {} stdout bytes (complete: {}), {} stderr bytes (complete: {})",
            stdout.text.len(),
            stdout.complete,
            stderr.text.len(),
            stderr.complete
        );

        if !stderr.text.is_empty() {
            return Err(ShellError::Command {
                stderr: stderr.text,
                stdout: stdout.text,
            });
        }
        Ok(stdout.text)
    }

    /// Ask the shell to exit and close its input.
    ///
    /// Does not wait for or kill the process.
    pub fn exit(&mut self) -> Result<()> {
        self.transport
            .send(EXIT_LINE.as_bytes())
            .map_err(ShellError::Write)?;
        self.transport.close_stdin().map_err(ShellError::Close)?;
        debug!("Session input closed");
        Ok(())
    }

    fn send_command(&mut self, command: &str, boundary: &str) -> Result<()> {
        let line = framing::frame_command(command, boundary);
        let bytes = self.codec.encode(&line).ok_or(ShellError::Encode {
            code_page: self.code_page,
            encoding: self.codec.name(),
        })?;
        trace!("Sending {} bytes", bytes.len());

        self.transport.send(&bytes).map_err(ShellError::Write)
    }

    fn detect_code_page(&mut self) -> Result<u32> {
        let out = self
            .exec(CODE_PAGE_QUERY)
            .map_err(|e| ShellError::DetectCodePage(Box::new(e)))?;
        let cp = parse_code_page(&out)?;
        debug!("Detected code page {}", cp);
        Ok(cp)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.transport.is_stdin_open() {
            // Best effort; the shell may already be gone
            if let Err(e) = self.exit() {
                debug!("Exit on drop failed: {}", e);
            }
        }
    }
}

/// Extract the number after the last `": "` in code page query output
pub fn parse_code_page(output: &str) -> Result<u32> {
    let trimmed = output.trim_end_matches([' ', '\r', '\n']);
    let start = trimmed
        .rfind(CODE_PAGE_DELIMITER)
        .ok_or_else(|| ShellError::InvalidCodePageOutput(trimmed.to_string()))?;
    let digits = &trimmed[start + CODE_PAGE_DELIMITER.len()..];
    digits
        .parse()
        .map_err(|_| ShellError::NonNumericCodePage(digits.to_string()))
}
