//! Core session components.
//!
//! - **encoding**: code page to codec registry and incremental decoding
//! - **boundary**: per-command boundary tokens
//! - **process**: launching the shell with piped stdio
//! - **framing**: the line written to the shell for each command
//! - **reader**: boundary-aware readers for stdout and stderr
//! - **session**: high-level session combining all of the above
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Transport (stdin / stdout / stderr pipes + child process)
//! ├── Codec (fixed once the code page is known)
//! └── BoundaryGenerator
//!
//! exec(cmd)
//! ├── frame_command → encode → stdin
//! └── read_both
//!     ├── stdout reader ─┐
//!     └── stderr reader ─┴─ join
//! ```

pub mod boundary;
pub mod encoding;
pub mod error;
pub mod framing;
pub mod process;
pub mod reader;
pub mod session;

#[cfg(test)]
pub(crate) mod fake_shell;
