//! Line-buffered NDJSON decoder.
//!
//! Turns arbitrarily chunked text into a sequence of decoded events. Chunk
//! boundaries carry no meaning: a partial trailing line is retained across
//! `push` calls and only parsed once its terminating newline arrives (or at
//! `flush`).

use serde::de::DeserializeOwned;

/// Push-based decoder for newline-delimited JSON streams.
///
/// Complete non-blank lines are parsed with `serde_json`; successes are
/// delivered to the event callback, failures to the error callback together
/// with the raw line. Malformed input never aborts the stream.
pub struct NdjsonDecoder<T> {
    carry: String,
    on_event: Box<dyn FnMut(T) + Send>,
    on_error: Box<dyn FnMut(serde_json::Error, &str) + Send>,
}

impl<T> std::fmt::Debug for NdjsonDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdjsonDecoder")
            .field("carry_len", &self.carry.len())
            .finish_non_exhaustive()
    }
}

impl<T: DeserializeOwned> NdjsonDecoder<T> {
    /// Create a decoder with the given event and error callbacks.
    pub fn new(
        on_event: impl FnMut(T) + Send + 'static,
        on_error: impl FnMut(serde_json::Error, &str) + Send + 'static,
    ) -> Self {
        Self {
            carry: String::new(),
            on_event: Box::new(on_event),
            on_error: Box::new(on_error),
        }
    }

    /// Feed a chunk of stream text into the decoder.
    ///
    /// Every newline-terminated line accumulated so far is parsed; the
    /// fragment after the last newline becomes the new carry-over.
    pub fn push(&mut self, chunk: &str) {
        self.carry.push_str(chunk);

        let data = std::mem::take(&mut self.carry);
        let mut fragments: Vec<&str> = data.split('\n').collect();
        // The final fragment is incomplete (possibly empty) by construction.
        self.carry = fragments.pop().unwrap_or_default().to_string();

        for line in fragments {
            self.dispatch(line);
        }
    }

    /// Process any remaining carry-over as a final line and clear state.
    ///
    /// Call once when the underlying stream reaches EOF.
    pub fn flush(&mut self) {
        let rest = std::mem::take(&mut self.carry);
        self.dispatch(&rest);
    }

    fn dispatch(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(event) => (self.on_event)(event),
            Err(err) => (self.on_error)(err, trimmed),
        }
    }
}
