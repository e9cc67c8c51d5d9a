//! Boundary tokens
//!
//! Each command is followed by a freshly generated token echoed to both
//! output streams, so the readers know where that command's output ends.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::debug;

/// Fixed token prefix (a PowerShell variable name, so it never expands inside single quotes)
pub const BOUNDARY_PREFIX: &str = "$command";

/// Random bytes per token (96 bits)
pub const BOUNDARY_RANDOM_BYTES: usize = 12;

/// Length of every generated token
pub const BOUNDARY_LEN: usize = BOUNDARY_PREFIX.len() + 2 * BOUNDARY_RANDOM_BYTES;

/// Session-local token source
pub struct BoundaryGenerator {
    rng: StdRng,
}

impl BoundaryGenerator {
    /// Seed from the OS, falling back to the clock
    pub fn new() -> Self {
        let rng = StdRng::try_from_os_rng().unwrap_or_else(|e| {
            debug!("OS random source unavailable ({}), seeding from clock", e);
            StdRng::seed_from_u64(clock_seed())
        });
        Self { rng }
    }

    #[cfg(test)]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produce the next token: prefix followed by 24 lowercase hex digits
    pub fn next_boundary(&mut self) -> String {
        let mut random = [0u8; BOUNDARY_RANDOM_BYTES];
        self.rng.fill_bytes(&mut random);

        format!("{}{}", BOUNDARY_PREFIX, hex::encode(random))
    }
}

impl Default for BoundaryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
