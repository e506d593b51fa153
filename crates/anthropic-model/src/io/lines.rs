use super::{Chunks, ChunksError};

/// A type for reading newline-terminated lines from a chunk stream.
///
/// Lines may span any number of chunks. A trailing fragment that is not
/// terminated by a line feed when the stream ends is dropped.
pub struct Lines {
    buf: Vec<u8>,
    // Length of the buffer prefix known to hold no line feed.
    scanned: usize,
    chunks: Chunks,
    eof: bool,
}

impl Lines {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            chunks,
            eof: false,
        }
    }

    /// Returns the next line without its line terminator, or `None` once
    /// the stream is exhausted.
    pub async fn next_line(&mut self) -> Result<Option<String>, ChunksError> {
        loop {
            // Serve complete lines from the buffer before reading more, so
            // a chunk carrying several lines is drained one at a time.
            let unscanned = &self.buf[self.scanned..];
            if let Some(pos) = unscanned.iter().position(|b| *b == b'\n') {
                let lf_idx = self.scanned + pos;
                self.scanned = 0;
                let mut line: Vec<u8> = self.buf.drain(..=lf_idx).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            self.scanned = self.buf.len();

            if self.eof {
                return Ok(None);
            }

            match self.chunks.next_chunk().await? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => {
                    if !self.buf.is_empty() {
                        trace!(
                            "dropping {} bytes of unterminated input",
                            self.buf.len()
                        );
                        self.buf.clear();
                        self.scanned = 0;
                    }
                    self.eof = true;
                }
            }
        }
    }
}
