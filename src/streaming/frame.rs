use bytes::BytesMut;

/// Accumulates raw network chunks and yields complete text lines.
///
/// Lines may be split across arbitrarily many physical reads; a line is
/// yielded only once its `\n` terminator has arrived. Invalid UTF-8 is
/// decoded lossily rather than failing the stream. A trailing `\r` is
/// stripped so CRLF and LF framing look identical to the parser.
#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Feed one network chunk, returning every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(pos + 1);
            let text = String::from_utf8_lossy(&raw[..pos]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line, e.g. when abandoning an attempt.
    pub fn clear(&mut self) {
        self.buffer.clear();
        if self.buffer.capacity() > 65536 {
            self.buffer = BytesMut::with_capacity(8192);
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
