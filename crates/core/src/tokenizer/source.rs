use std::io::{self, Read};

/// A pull source of characters.
///
/// `read_chars` fills a prefix of `buf` and returns how many characters it
/// wrote, or `None` once the source is exhausted. A return of `Some(0)` or an
/// error of kind [`io::ErrorKind::Interrupted`] means "nothing yet" and the
/// caller retries.
pub trait CharSource {
    /// Read up to `buf.len()` characters into `buf`.
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<Option<usize>>;
}

impl<S: CharSource + ?Sized> CharSource for &mut S {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<Option<usize>> {
        (**self).read_chars(buf)
    }
}

impl<S: CharSource + ?Sized> CharSource for Box<S> {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<Option<usize>> {
        (**self).read_chars(buf)
    }
}

/// In-memory source over a string slice.
#[derive(Debug, Clone)]
pub struct StrSource<'a> {
    chars: std::str::Chars<'a>,
}

impl<'a> StrSource<'a> {
    /// Source that yields the characters of `text`.
    pub fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars(),
        }
    }
}

impl CharSource for StrSource<'_> {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<Option<usize>> {
        if buf.is_empty() {
            return Ok(Some(0));
        }
        let mut n = 0;
        for slot in buf.iter_mut() {
            match self.chars.next() {
                Some(c) => {
                    *slot = c;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(if n == 0 { None } else { Some(n) })
    }
}

/// Byte source decoded as ISO-8859-1, the customary EDI character set.
///
/// Every byte maps to the code point of the same value, so decoding never
/// fails.
#[derive(Debug)]
pub struct Latin1Source<R> {
    inner: R,
    bytes: Vec<u8>,
}

impl<R: Read> Latin1Source<R> {
    /// Wrap a byte reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes: Vec::new(),
        }
    }

    /// Recover the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> CharSource for Latin1Source<R> {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<Option<usize>> {
        if buf.is_empty() {
            return Ok(Some(0));
        }
        self.bytes.resize(buf.len(), 0);
        let n = self.inner.read(&mut self.bytes)?;
        if n == 0 {
            return Ok(None);
        }
        for (slot, &b) in buf.iter_mut().zip(&self.bytes[..n]) {
            *slot = char::from(b);
        }
        Ok(Some(n))
    }
}

/// Decode a whole ISO-8859-1 byte slice.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode text as ISO-8859-1. Characters outside the set become `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
