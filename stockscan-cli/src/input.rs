//! Scanner input from stdin.
//!
//! Reads happen on a plain OS thread: a blocking read parked on Tokio's
//! blocking pool would keep the runtime alive after Ctrl-C.

use std::io::Read;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Characters delivered by one read, stamped with their arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBatch {
    pub text: String,
    pub at: Instant,
}

/// UTF-8 decoder that holds back a character split across two reads.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // valid_up_to() marks a char boundary
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }
}

/// Spawns the stdin reader. The receiver yields `None` once stdin hits EOF.
pub fn spawn_stdin_reader() -> mpsc::Receiver<KeyBatch> {
    let (tx, rx) = mpsc::channel(64);
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || read_loop(std::io::stdin().lock(), tx));
    if let Err(e) = spawned {
        warn!(error = %e, "failed to start stdin reader");
    }
    rx
}

fn read_loop(mut source: impl Read, tx: mpsc::Sender<KeyBatch>) {
    let mut decoder = Utf8Carry::default();
    let mut chunk = [0u8; 512];
    loop {
        let n = match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "failed to read scanner input");
                break;
            }
        };
        let at = Instant::now();
        let text = decoder.decode(&chunk[..n]);
        if text.is_empty() {
            continue;
        }
        if tx.blocking_send(KeyBatch { text, at }).is_err() {
            break;
        }
    }
    debug!("stdin reader finished");
}
