//! Character-level tokenizer over a streaming [`CharSource`].
//!
//! The tokenizer owns a fixed-size character buffer. It hands out one
//! classified character at a time through [`Tokenizer::next_char`], supports
//! one character of push-back and arbitrary lookahead up to the buffer
//! capacity, and can copy consumed characters to a mirror sink or into a
//! recording.
//!
//! The mirror and the recording lag by one character: a character is copied
//! when the tokenizer moves past it, not when it is delivered. A character that
//! is pushed back and delivered again is therefore copied exactly once.

mod cursor;
mod source;

pub use cursor::Cursor;
pub use source::{CharSource, Latin1Source, StrSource, decode_latin1, encode_latin1};

use std::io::{self, Write};

use serde::Serialize;
use tracing::trace;

use crate::error::EdiError;
use crate::syntax::{CharClass, SyntaxConfig};

/// Default capacity of the tokenizer buffer, in characters.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Character used to pad a lookahead that runs past the end of input.
pub const LOOKAHEAD_FILLER: char = '?';

/// A single classified character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
    /// Classification under the tokenizer's current syntax.
    pub class: CharClass,
    /// The character itself; `'\0'` for end of input.
    pub value: char,
    /// Zero-based stream position of the character.
    pub position: usize,
}

impl Token {
    /// Whether this token marks the end of input.
    pub fn is_eof(&self) -> bool {
        self.class == CharClass::EndOfInput
    }
}

/// Streaming character tokenizer.
///
/// `'m` bounds the lifetime of an attached mirror sink.
pub struct Tokenizer<'m, S> {
    source: S,
    syntax: SyntaxConfig,
    buf: Box<[char]>,
    start: usize,
    end: usize,
    /// The character most recently delivered; `None` before the first read
    /// and after end of input.
    current: Option<char>,
    pushed_back: bool,
    source_exhausted: bool,
    at_eof: bool,
    mirror: Option<Box<dyn Write + 'm>>,
    mirror_suspended: bool,
    recording: Option<String>,
    cursor: Cursor,
}

impl<S> std::fmt::Debug for Tokenizer<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("cursor", &self.cursor)
            .field("buffered", &(self.end - self.start))
            .field("capacity", &self.buf.len())
            .field("pushed_back", &self.pushed_back)
            .field("at_eof", &self.at_eof)
            .field("mirror", &self.mirror.is_some())
            .field("recording", &self.recording.is_some())
            .finish()
    }
}

impl<'m, S: CharSource> Tokenizer<'m, S> {
    /// Tokenizer with the default buffer capacity and no pre-read input.
    pub fn new(source: S) -> Self {
        Self::build(source, DEFAULT_BUFFER_CAPACITY)
    }

    /// Tokenizer whose first characters are `pre_read`, followed by `source`.
    ///
    /// Fails when `pre_read` does not fit the default buffer.
    pub fn with_pre_read(source: S, pre_read: &[char]) -> Result<Self, EdiError> {
        Self::with_capacity(source, DEFAULT_BUFFER_CAPACITY, pre_read)
    }

    /// Tokenizer with an explicit buffer capacity and pre-read input.
    pub fn with_capacity(source: S, capacity: usize, pre_read: &[char]) -> Result<Self, EdiError> {
        if capacity == 0 {
            return Err(EdiError::Configuration(
                "tokenizer buffer capacity must be at least 1".into(),
            ));
        }
        if pre_read.len() > capacity {
            return Err(EdiError::Capacity {
                what: "pre-read",
                requested: pre_read.len(),
                capacity,
            });
        }
        let mut tokenizer = Self::build(source, capacity);
        tokenizer.buf[..pre_read.len()].copy_from_slice(pre_read);
        tokenizer.end = pre_read.len();
        Ok(tokenizer)
    }

    fn build(source: S, capacity: usize) -> Self {
        Self {
            source,
            syntax: SyntaxConfig::default(),
            buf: vec!['\0'; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
            current: None,
            pushed_back: false,
            source_exhausted: false,
            at_eof: false,
            mirror: None,
            mirror_suspended: false,
            recording: None,
            cursor: Cursor::default(),
        }
    }

    // ── Syntax ──────────────────────────────────────────────────────────

    /// Replace the syntax used to classify characters.
    pub fn set_syntax(&mut self, syntax: SyntaxConfig) {
        self.syntax = syntax;
    }

    /// The syntax currently used to classify characters.
    pub fn syntax(&self) -> &SyntaxConfig {
        &self.syntax
    }

    /// Buffer capacity in characters.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    // ── Reading ─────────────────────────────────────────────────────────

    /// Advance one character.
    ///
    /// Returns an [`EndOfInput`](CharClass::EndOfInput) token once the source
    /// is exhausted, and keeps returning it without polling the source again.
    pub fn next_char(&mut self) -> Result<Token, EdiError> {
        self.syntax.ensure_resolved()?;

        if self.pushed_back {
            self.pushed_back = false;
            if self.current.is_some() {
                self.cursor.advance();
            }
            return Ok(self.current_token());
        }

        if let Some(c) = self.current.take() {
            self.leave_behind(c)?;
        }

        if self.at_eof {
            return Ok(self.eof_token());
        }
        if self.start == self.end {
            self.fill_at_least(1)?;
        }
        if self.start == self.end {
            trace!(chars = self.cursor.chars, "end of input");
            self.at_eof = true;
            return Ok(self.eof_token());
        }

        let c = self.buf[self.start];
        self.start += 1;
        self.current = Some(c);
        self.cursor.advance();
        Ok(self.current_token())
    }

    /// Un-read the most recently delivered character.
    ///
    /// Only one character can be pushed back; further calls before the next
    /// [`next_char`](Self::next_char) are ignored.
    pub fn push_back(&mut self) {
        if self.pushed_back {
            return;
        }
        if self.current.is_none() && !self.at_eof {
            return;
        }
        self.pushed_back = true;
        if self.current.is_some() {
            self.cursor.retreat();
        }
    }

    /// The next `n` characters without consuming them.
    ///
    /// The mirror, the recording and the cursor are untouched. Characters past
    /// the end of input are returned as [`LOOKAHEAD_FILLER`].
    pub fn lookahead(&mut self, n: usize) -> Result<Vec<char>, EdiError> {
        if n > self.buf.len() {
            return Err(EdiError::Capacity {
                what: "lookahead",
                requested: n,
                capacity: self.buf.len(),
            });
        }
        let mut out = Vec::with_capacity(n);
        if n == 0 {
            return Ok(out);
        }
        if self.pushed_back {
            out.push(self.current.unwrap_or(LOOKAHEAD_FILLER));
        }
        if !self.at_eof {
            let wanted = n - out.len();
            self.fill_at_least(wanted)?;
            let available = (self.end - self.start).min(wanted);
            out.extend_from_slice(&self.buf[self.start..self.start + available]);
        }
        out.resize(n, LOOKAHEAD_FILLER);
        Ok(out)
    }

    /// Characters already buffered but not yet consumed, including a
    /// pushed-back one. Empty once end of input has been reached.
    pub fn buffered_input(&self) -> String {
        if self.at_eof {
            return String::new();
        }
        let mut s = String::with_capacity(self.end - self.start + 1);
        if self.pushed_back
            && let Some(c) = self.current
        {
            s.push(c);
        }
        s.extend(&self.buf[self.start..self.end]);
        s
    }

    /// Whether end of input has been delivered.
    pub fn is_eof(&self) -> bool {
        self.at_eof
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    /// Snapshot of the scan position.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Mark the start of a new segment.
    pub fn begin_segment(&mut self) {
        self.cursor.begin_segment();
    }

    /// Count one token within the current segment.
    pub fn count_token(&mut self) {
        self.cursor.segment_tokens += 1;
    }

    // ── Side channels ───────────────────────────────────────────────────

    /// Copy every consumed character to `sink` (UTF-8 encoded).
    pub fn attach_mirror(&mut self, sink: Box<dyn Write + 'm>) {
        self.mirror = Some(sink);
        self.mirror_suspended = false;
    }

    /// Stop mirroring and return the sink, flushed.
    pub fn detach_mirror(&mut self) -> Result<Option<Box<dyn Write + 'm>>, EdiError> {
        let mut sink = self.mirror.take();
        if let Some(w) = sink.as_mut() {
            w.flush()?;
        }
        Ok(sink)
    }

    /// Pause (`true`) or resume (`false`) the mirror without detaching it.
    pub fn suspend_mirror(&mut self, suspended: bool) {
        self.mirror_suspended = suspended;
    }

    /// Begin recording consumed characters, discarding any earlier recording.
    pub fn start_recording(&mut self) {
        self.recording = Some(String::new());
    }

    /// Stop recording and return what was recorded.
    pub fn stop_recording(&mut self) -> String {
        self.recording.take().unwrap_or_default()
    }

    /// Whether a recording is in progress.
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Recover the underlying source. Buffered characters are lost.
    pub fn into_source(self) -> S {
        self.source
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn current_token(&self) -> Token {
        match self.current {
            Some(c) => Token {
                class: self.syntax.classify(c),
                value: c,
                position: self.cursor.chars.saturating_sub(1),
            },
            None => self.eof_token(),
        }
    }

    fn eof_token(&self) -> Token {
        Token {
            class: CharClass::EndOfInput,
            value: '\0',
            position: self.cursor.chars,
        }
    }

    fn leave_behind(&mut self, c: char) -> io::Result<()> {
        if !self.mirror_suspended
            && let Some(w) = self.mirror.as_mut()
        {
            let mut utf8 = [0u8; 4];
            w.write_all(c.encode_utf8(&mut utf8).as_bytes())?;
        }
        if let Some(rec) = self.recording.as_mut() {
            rec.push(c);
        }
        Ok(())
    }

    /// Make at least `needed` characters available, unless the source runs
    /// dry first. `needed` never exceeds the capacity.
    fn fill_at_least(&mut self, needed: usize) -> Result<(), EdiError> {
        if self.end - self.start >= needed || self.source_exhausted {
            return Ok(());
        }
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        while self.end - self.start < needed && self.end < self.buf.len() {
            match self.source.read_chars(&mut self.buf[self.end..]) {
                Ok(None) => {
                    self.source_exhausted = true;
                    break;
                }
                Ok(Some(0)) => continue,
                Ok(Some(n)) => {
                    trace!(read = n, buffered = self.end + n, "tokenizer refill");
                    self.end += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
