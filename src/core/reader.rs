//! Boundary-aware stream readers
//!
//! One reader runs per output stream and per command. Each decodes small
//! raw chunks as they arrive and stops as soon as its accumulated text ends
//! with the boundary marker. The two streams are flushed independently by
//! the shell, so both readers run on their own thread and the caller waits
//! for both.

use std::io::{ErrorKind, Read};
use std::panic;
use std::thread;

use tracing::{trace, warn};

use super::encoding::{Codec, StreamDecoder};

/// Default raw read size. Small so the marker is seen as soon as it lands.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Text read from one stream for one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamText {
    /// Decoded text with the marker removed
    pub text: String,
    /// False when the stream ended or failed before the marker arrived
    pub complete: bool,
}

/// Read from `reader` until the decoded text ends with `marker`.
///
/// Malformed bytes decode to U+FFFD and reading goes on. EOF, read errors
/// and decoder overflow end the loop early; whatever was decoded so far is
/// returned with `complete == false`.
pub fn read_until_marker<R: Read>(
    reader: &mut R,
    mut decoder: StreamDecoder,
    marker: &str,
    chunk_size: usize,
) -> StreamText {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut text = String::new();

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => {
                trace!("Stream closed before marker");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                trace!("Stream read failed before marker: {}", e);
                break;
            }
        };
        trace!("Read {} bytes", n);

        if decoder.decode(&buf[..n], &mut text).is_err() {
            warn!("Decoder overflow in shell output, stopping read");
            break;
        }

        if text.ends_with(marker) {
            text.truncate(text.len() - marker.len());
            return StreamText {
                text,
                complete: true,
            };
        }
    }

    StreamText {
        text,
        complete: false,
    }
}

/// Read stdout and stderr concurrently until both reach `marker` or end.
///
/// Returns `(stdout, stderr)`. Neither reader outlives this call.
pub fn read_both<O, E>(
    stdout: &mut O,
    stderr: &mut E,
    codec: Codec,
    marker: &str,
    chunk_size: usize,
) -> (StreamText, StreamText)
where
    O: Read + Send,
    E: Read + Send,
{
    thread::scope(|s| {
        let out = s.spawn(|| read_until_marker(stdout, codec.new_decoder(), marker, chunk_size));
        let err = s.spawn(|| read_until_marker(stderr, codec.new_decoder(), marker, chunk_size));

        let out = out.join().unwrap_or_else(|e| panic::resume_unwind(e));
        let err = err.join().unwrap_or_else(|e| panic::resume_unwind(e));
        (out, err)
    })
}
