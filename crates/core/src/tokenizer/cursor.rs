use edi_toolchain_diagnostics::Span;
use serde::Serialize;

/// Scan position of a [`Tokenizer`](super::Tokenizer).
///
/// All counters are updated together on every advance, so a copy of the
/// cursor is a consistent snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    /// Characters consumed from the start of the stream.
    pub chars: usize,
    /// Characters consumed since the current segment began.
    pub segment_chars: usize,
    /// Segments begun so far.
    pub segments: usize,
    /// Tokens (name, elements) counted within the current segment.
    pub segment_tokens: usize,
}

impl Cursor {
    pub(crate) fn advance(&mut self) {
        self.chars += 1;
        self.segment_chars += 1;
    }

    pub(crate) fn retreat(&mut self) {
        self.chars = self.chars.saturating_sub(1);
        self.segment_chars = self.segment_chars.saturating_sub(1);
    }

    pub(crate) fn begin_segment(&mut self) {
        self.segments += 1;
        self.segment_chars = 0;
        self.segment_tokens = 0;
    }

    /// Span of the segment in progress, from its first character to the
    /// current position.
    pub fn segment_span(&self) -> Span {
        Span::new(self.chars - self.segment_chars.min(self.chars), self.chars)
    }
}
