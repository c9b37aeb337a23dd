//! Keystroke buffering for keyboard-wedge barcode scanners.
//!
//! A scanner types the barcode as a burst of key presses followed by a
//! termination key. Keys arriving after a long pause start a new barcode.

use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKey {
    Char(char),
    Enter,
    Other,
}

impl ScanKey {
    pub fn from_char(c: char) -> Self {
        match c {
            '\n' | '\r' => ScanKey::Enter,
            c if c.is_control() => ScanKey::Other,
            c => ScanKey::Char(c),
        }
    }
}

#[derive(Debug)]
pub struct ScanBuffer {
    termination: ScanKey,
    timeout: Duration,
    buffer: String,
    last_input: Option<Instant>,
}

impl ScanBuffer {
    pub fn new(termination: ScanKey, timeout: Duration) -> Self {
        Self {
            termination,
            timeout,
            buffer: String::new(),
            last_input: None,
        }
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Feeds one key press; returns a barcode when the termination key
    /// completes a non-empty buffer.
    pub fn push(&mut self, key: ScanKey, at: Instant) -> Option<String> {
        if key == self.termination {
            if self.buffer.is_empty() {
                return None;
            }
            let barcode = std::mem::take(&mut self.buffer);
            debug!(%barcode, "barcode complete");
            return Some(barcode);
        }

        if let Some(last) = self.last_input {
            if at.saturating_duration_since(last) > self.timeout && !self.buffer.is_empty() {
                debug!(stale = %self.buffer, "scan timeout, discarding buffer");
                self.buffer.clear();
            }
        }

        if let ScanKey::Char(c) = key {
            self.buffer.push(c);
            self.last_input = Some(at);
        }
        None
    }
}
