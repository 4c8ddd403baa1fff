//! Result streaming — the channel the pipeline pushes partial output through
//! and the slicing helpers for paced delivery.
//!
//! The analyze handler turns the receiving end into the HTTP response body;
//! the engine owns the sending end. A closed channel means the client has
//! disconnected, which the engine treats as a signal to abandon remaining
//! work at the next stage boundary.

use bytes::Bytes;
use futures::channel::mpsc;
use futures::SinkExt;

/// Buffered chunk capacity between the engine and the response body.
const CHANNEL_BUFFER: usize = 32;

/// Sending half of the analyze response stream.
pub struct Emitter {
    tx: mpsc::Sender<Bytes>,
}

impl Emitter {
    /// Creates an emitter and the receiver the handler wraps into a body.
    pub fn channel() -> (Emitter, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        (Emitter { tx }, rx)
    }

    /// Sends one text chunk to the client. Returns false once the client has
    /// disconnected; the caller stops emitting but keeps its own state.
    pub async fn send(&mut self, text: &str) -> bool {
        self.tx
            .send(Bytes::from(text.to_string().into_bytes()))
            .await
            .is_ok()
    }

    /// True once the receiving end (the client connection) is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Splits text into slices of at most `chunk_chars` characters, always on
/// char boundaries. A zero chunk size falls back to one chunk.
pub fn slice_chunks(text: &str, chunk_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if chunk_chars == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == chunk_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
