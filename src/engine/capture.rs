// src/engine/capture.rs

//! Per-execution output capture.
//!
//! Every unit execution gets a [`CaptureSink`]: a tee that echoes bytes to
//! the real stdout and keeps a copy in an in-memory buffer. The terminal
//! sees the raw bytes (colors included); downstream consumers read the
//! captured copy with ANSI escape sequences stripped. Stderr shares the
//! sink with stdout, so downstream units receive exactly what the terminal
//! showed.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Tee sink handed to a unit for the duration of one execution.
///
/// Clones share the same buffer, so the run unit can hand one clone to its
/// stdout pump and one to its stderr pump.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes to the capture buffer and echo them to stdout.
    pub fn write_chunk(&self, bytes: &[u8]) {
        {
            let mut buf = self.buf.lock().expect("capture buffer lock poisoned");
            buf.extend_from_slice(bytes);
        }

        let mut out = std::io::stdout().lock();
        let _ = out.write_all(bytes);
        let _ = out.flush();
    }

    /// Write a full line of text (a trailing newline is added).
    pub fn line(&self, text: &str) {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(b'\n');
        self.write_chunk(&bytes);
    }

    /// The captured output with ANSI escape sequences stripped.
    ///
    /// This is the form propagated to downstream units (logs, emails); the
    /// terminal keeps the raw bytes.
    pub fn captured(&self) -> String {
        let buf = self.buf.lock().expect("capture buffer lock poisoned");
        strip_ansi(&String::from_utf8_lossy(&buf))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StripState {
    Text,
    Escape,
    Csi,
    Osc,
}

/// Strip ANSI CSI (`ESC [ ... final-byte`) and OSC (`ESC ] ... BEL`)
/// sequences from a string.
///
/// Implemented as a single-pass state machine rather than a regex so large
/// captures do not need a second buffer.
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut state = StripState::Text;

    for c in input.chars() {
        match state {
            StripState::Text => {
                if c == '\x1b' {
                    state = StripState::Escape;
                } else {
                    out.push(c);
                }
            }
            StripState::Escape => match c {
                '[' => state = StripState::Csi,
                ']' => state = StripState::Osc,
                // Not a sequence we strip; emit the escape and the byte.
                _ => {
                    out.push('\x1b');
                    out.push(c);
                    state = StripState::Text;
                }
            },
            StripState::Csi => {
                // Parameter and intermediate bytes are skipped; the final
                // byte (0x40..=0x7e) ends the sequence.
                if ('\x40'..='\x7e').contains(&c) {
                    state = StripState::Text;
                }
            }
            StripState::Osc => {
                if c == '\x07' {
                    state = StripState::Text;
                }
            }
        }
    }

    out
}
