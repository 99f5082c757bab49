//! Output sinks for session text.

use std::sync::{Arc, Mutex, PoisonError};

/// Where the last command in a pipeline writes its text.
pub trait Output: Send + Sync {
    /// Writes one chunk of text.
    fn write(&self, text: &str);
}

/// Writes to standard output, one line per chunk.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutOutput;

impl Output for StdoutOutput {
    fn write(&self, text: &str) {
        println!("{text}");
    }
}

/// Collects output in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferOutput {
    chunks: Arc<Mutex<Vec<String>>>,
}

impl BufferOutput {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every chunk written so far.
    pub fn chunks(&self) -> Vec<String> {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns everything written, joined by newlines.
    pub fn contents(&self) -> String {
        self.chunks().join("\n")
    }

    /// Discards everything written so far.
    pub fn clear(&self) {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Output for BufferOutput {
    fn write(&self, text: &str) {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }
}
