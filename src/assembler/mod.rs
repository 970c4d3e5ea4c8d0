//! Line assembly — turn arriving byte chunks into complete log lines.
//!
//! The server pushes raw log bytes in arbitrarily sized frames, so a frame
//! can end in the middle of a line (or in the middle of a multi-byte UTF-8
//! sequence). [`LineAssembler`] carries the incomplete tail of each chunk
//! over to the next one and only emits lines once their terminating newline
//! has arrived.
//!
//! Both `\n` and `\r\n` terminate a line. Completed lines are decoded as
//! UTF-8 (lossily) and otherwise kept literal; escape sequences are removed
//! only when the terminal renderer prints them.
//!
//! There is no upper bound on the length of a pending line: a producer that
//! never emits a newline grows the carry-over buffer without limit.

/// Incremental newline splitter with a carry-over buffer.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, in order.
    ///
    /// The bytes after the last newline are retained and prefixed to the
    /// next chunk. A chunk ending exactly on a newline leaves nothing
    /// pending.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        // `complete` ends with '\n', so the final split segment is empty.
        let mut segments: Vec<&[u8]> = complete.split(|&b| b == b'\n').collect();
        segments.pop();

        segments.into_iter().map(decode_line).collect()
    }

    /// Return the pending partial line, if any, and reset the buffer.
    ///
    /// Used when a stream ends without a trailing newline.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let pending = std::mem::take(&mut self.pending);
        Some(decode_line(&pending))
    }

    /// Discard any pending partial line.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of bytes waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
