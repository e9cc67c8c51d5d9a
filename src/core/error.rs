//! Error types for shell sessions

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("need {program}: {source}")]
    DependencyNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("Failed to capture {0} pipe")]
    Pipe(&'static str),

    #[error("Failed to start shell: {0}")]
    Spawn(#[source] io::Error),

    #[error("get codepage: {0}")]
    DetectCodePage(#[source] Box<ShellError>),

    #[error("invalid codepage output: {0:?}")]
    InvalidCodePageOutput(String),

    #[error("non-numeric codepage: {0:?}")]
    NonNumericCodePage(String),

    #[error("unsupported code page: {0}")]
    UnsupportedCodePage(u32),

    #[error("unknown encoding label {label:?} for code page {code_page}")]
    UnknownEncodingLabel { code_page: u32, label: String },

    #[error("encode command: text not representable in {encoding} (code page {code_page})")]
    Encode {
        code_page: u32,
        encoding: &'static str,
    },

    #[error("write command: {0}")]
    Write(#[source] io::Error),

    #[error("close stdin: {0}")]
    Close(#[source] io::Error),

    /// The command wrote to the error stream. Whatever it wrote to the
    /// output stream is kept alongside.
    #[error("{stderr}")]
    Command { stderr: String, stdout: String },
}

impl ShellError {
    /// Output-stream text captured with a command failure.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            ShellError::Command { stdout, .. } => Some(stdout),
            _ => None,
        }
    }

    /// True when the failure came from the command itself rather than the transport.
    pub fn is_command_error(&self) -> bool {
        matches!(self, ShellError::Command { .. })
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
