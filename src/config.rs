//! Configuration for psession.
//!
//! Settings are read from `~/.psession/config.toml`:
//!
//! ```toml
//! # Shell program, looked up on PATH
//! shell = "pwsh.exe"
//!
//! # Arguments that keep the shell reading commands from stdin
//! args = ["-NoLogo", "-NoExit", "-Command", "-"]
//!
//! # Skip code page detection
//! codepage = 65001
//!
//! # Raw read size for output readers
//! chunk_size = 64
//!
//! # Extra code pages (WHATWG encoding labels)
//! [[encodings]]
//! code_page = 1252
//! label = "windows-1252"
//! ```
//!
//! A missing or unreadable file yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::encoding;
use crate::core::error::Result;
use crate::core::process::{interactive_args, ShellCommand};
use crate::core::reader::DEFAULT_CHUNK_SIZE;
use crate::core::session::SessionOptions;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell program
    pub shell: String,
    /// Shell arguments
    pub args: Vec<String>,
    /// Fixed code page
    pub codepage: Option<u32>,
    /// Reader chunk size in bytes
    pub chunk_size: usize,
    /// Additional registry entries
    pub encodings: Vec<EncodingEntry>,
}

impl Default for Config {
    fn default() -> Self {
        let shell = ShellCommand::default();
        Self {
            shell: shell.program,
            args: shell.args,
            codepage: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            encodings: Vec::new(),
        }
    }
}

/// Code page mapped to an encoding label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingEntry {
    pub code_page: u32,
    pub label: String,
}

impl Config {
    /// Load configuration from `~/.psession/config.toml`
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::default(),
        }
    }

    /// Load configuration from a file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> std::result::Result<(), String> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// Get config file path
    pub fn get_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Add the configured encodings to the process-wide registry.
    ///
    /// Call before creating sessions.
    pub fn register_encodings(&self) -> Result<()> {
        for entry in &self.encodings {
            encoding::register_label(entry.code_page, &entry.label)?;
        }
        Ok(())
    }

    /// Session options described by this configuration
    pub fn session_options(&self) -> SessionOptions {
        let args = if self.args.is_empty() {
            interactive_args()
        } else {
            self.args.clone()
        };
        SessionOptions {
            shell: ShellCommand::new(self.shell.clone(), args),
            code_page: self.codepage,
            chunk_size: self.chunk_size,
        }
    }
}

/// `~/.psession`, also home of the log file
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".psession"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
