//! Bounded output capture
//!
//! A reader thread drains one pipe into a shared buffer. Bytes past the cap
//! are read and discarded so the writer never blocks on a full pipe.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

const CHUNK_SIZE: usize = 8192;

/// Captured output of one stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    /// Output exceeded the cap and was cut
    pub truncated: bool,
}

impl Captured {
    /// Lossy UTF-8 view of the captured bytes
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[derive(Debug, Default)]
struct Shared {
    captured: Captured,
}

/// Handle to a running capture thread
#[derive(Debug)]
pub struct OutputCapture {
    shared: Arc<Mutex<Shared>>,
    done: Receiver<()>,
}

impl OutputCapture {
    /// Start draining `reader`, keeping at most `limit` bytes.
    pub fn spawn<R>(mut reader: R, limit: usize) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&shared);

        thread::Builder::new()
            .name("codefort-capture".into())
            .spawn(move || {
                let mut chunk = [0u8; CHUNK_SIZE];
                loop {
                    match reader.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => append(&mut lock(&sink).captured, &chunk[..n], limit),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
                let _ = tx.send(());
            })?;

        Ok(Self { shared, done })
    }

    /// Wait up to `grace` for end of stream, then return what was captured.
    ///
    /// A descendant that escaped the kill may still hold the pipe open; its
    /// later output is dropped rather than blocking the caller.
    pub fn finish(self, grace: Duration) -> Captured {
        match self.done.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                log::debug!("output stream still open after {:?}, taking snapshot", grace)
            }
        }
        lock(&self.shared).captured.clone()
    }
}

fn append(captured: &mut Captured, data: &[u8], limit: usize) {
    let room = limit.saturating_sub(captured.bytes.len());
    if data.len() > room {
        captured.truncated = true;
    }
    captured.bytes.extend_from_slice(&data[..data.len().min(room)]);
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poison| poison.into_inner())
}
