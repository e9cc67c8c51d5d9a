//! psession - serial command execution in a long-lived PowerShell session
//!
//! psession starts one PowerShell process, detects its console code page,
//! and runs commands in it one at a time, returning each command's output
//! decoded with the codec for that code page.
//!
//! # Features
//!
//! - **Output framing**: every command is followed by a random boundary
//!   token echoed to stdout and stderr, so output ends are found exactly
//! - **Code page aware**: Shift_JIS, GBK, EUC-KR, Big5 and UTF-8 out of the
//!   box, more via [`encoding::register`] or `config.toml`
//! - **Error stream capture**: anything written to stderr becomes a
//!   [`ShellError::Command`] that still carries the stdout text
//!
//! # Quick Start
//!
//! ```no_run
//! use psession::Session;
//!
//! let mut shell = Session::new()?;
//! println!("code page: {}", shell.code_page());
//!
//! let out = shell.exec("Get-TimeZone | Select-Object StandardName")?;
//! println!("{}", out.trim());
//!
//! shell.exit()?;
//! # Ok::<(), psession::ShellError>(())
//! ```

pub mod config;
pub mod core;

pub use crate::core::encoding;
pub use crate::core::error::{Result, ShellError};
pub use crate::core::process::{ShellCommand, Transport};
pub use crate::core::session::{Session, SessionOptions};
