//! Incremental UTF-8 decoding for chunked subprocess output.

/// Decodes a byte stream into text across arbitrary chunk boundaries.
///
/// A multi-byte sequence split across two reads is held back until its
/// remaining bytes arrive; invalid sequences decode to U+FFFD. Concatenating
/// the emitted strings over any chunking of a valid UTF-8 input reproduces
/// the input exactly.
#[derive(Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning all text decodable so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let keep = incomplete_suffix_len(&self.pending);
        let ready = self.pending.len() - keep;
        let text = String::from_utf8_lossy(&self.pending[..ready]).into_owned();
        self.pending.drain(..ready);
        text
    }

    /// Flush any held-back bytes; an incomplete tail decodes to U+FFFD.
    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of a trailing multi-byte sequence that is still missing bytes.
///
/// An incomplete sequence is at most 3 bytes long (a 4-byte lead missing its
/// last continuation byte), so only the final 3 bytes need scanning.
fn incomplete_suffix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    let start = len.saturating_sub(3);
    for i in (start..len).rev() {
        let byte = bytes[i];
        let width = match byte {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xFF => 4,
            // continuation byte, keep scanning for the lead
            _ => continue,
        };
        if i + width > len {
            return len - i;
        }
        return 0;
    }
    0
}
