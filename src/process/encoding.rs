//! Text encodings for tool streams and patched files.
//!
//! Tools disagree on how they write text: Python in UTF-8 mode emits
//! UTF-8, older Windows tools write the ANSI code page, some write
//! UTF-16. Each stream of a [`Cmd`](super::Cmd) is decoded with its own
//! [`Encoding`] so nothing downstream sees mojibake.

use std::fmt;

use encoding_rs::{UTF_16LE, UTF_8, WINDOWS_1252};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Whatever the host hands us: UTF-8 when the bytes are valid UTF-8,
    /// otherwise the ANSI code page.
    #[default]
    Inherit,
    Utf8,
    Utf16Le,
    /// The Windows ANSI code page (Windows-1252).
    Acp,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Inherit => write!(f, "inherited code page"),
            Encoding::Utf8 => write!(f, "utf-8"),
            Encoding::Utf16Le => write!(f, "utf-16le"),
            Encoding::Acp => write!(f, "windows-1252"),
        }
    }
}

impl Encoding {
    /// Decode bytes to text. Invalid sequences become U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Inherit => match std::str::from_utf8(bytes) {
                Ok(s) => s.to_string(),
                Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned(),
            },
            Encoding::Utf8 => UTF_8.decode_with_bom_removal(bytes).0.into_owned(),
            Encoding::Utf16Le => UTF_16LE.decode_with_bom_removal(bytes).0.into_owned(),
            Encoding::Acp => WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned(),
        }
    }

    /// Encode text, or `None` if some character has no representation.
    pub fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Encoding::Inherit | Encoding::Utf8 => Some(text.as_bytes().to_vec()),
            Encoding::Utf16Le => Some(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Encoding::Acp => {
                let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
                if had_errors {
                    None
                } else {
                    Some(bytes.into_owned())
                }
            }
        }
    }

    fn unit_width(self) -> usize {
        match self {
            Encoding::Utf16Le => 2,
            _ => 1,
        }
    }
}

/// Splits a byte stream into decoded lines as chunks arrive.
///
/// Line terminators are `\n` (or `\n\0` in UTF-16); a trailing `\r` is
/// removed from each line.
pub struct LineDecoder {
    encoding: Encoding,
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
        }
    }

    /// Feed a chunk, returning every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let width = self.encoding.unit_width();
        let mut lines = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i + width <= self.pending.len() {
            let newline = if width == 2 {
                self.pending[i] == b'\n' && self.pending[i + 1] == 0
            } else {
                self.pending[i] == b'\n'
            };

            if newline {
                lines.push(self.decode_line(start, i));
                start = i + width;
            }
            i += width;
        }

        self.pending.drain(..start);
        lines
    }

    /// Flush whatever is left after the stream closes.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = self.decode_line(0, self.pending.len());
        self.pending.clear();
        Some(line)
    }

    fn decode_line(&self, start: usize, end: usize) -> String {
        let mut line = self.encoding.decode(&self.pending[start..end]);
        if line.ends_with('\r') {
            line.pop();
        }
        line
    }
}
