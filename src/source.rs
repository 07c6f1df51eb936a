use std::collections::VecDeque;
use std::io::{self, BufReader, Read};

/// A pull interface over decoded text.
///
/// Readers are generic over this trait the same way the writers are generic
/// over [`std::io::Write`]: anything that can hand out characters one at a
/// time can feed a tokenizer. Errors from the underlying medium are
/// propagated unchanged as [`std::io::Error`].
pub trait CharSource {
    /// Returns the next character, or `None` at end of input.
    fn read_char(&mut self) -> io::Result<Option<char>>;

    /// Fills `buf` with up to `buf.len()` characters and returns how many
    /// were produced. Zero means end of input.
    fn read_bulk(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.read_char()? {
                Some(ch) => {
                    buf[n] = ch;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

/// A character source over an owned string.
pub struct StringSource {
    chars: std::vec::IntoIter<char>,
}

impl StringSource {
    pub fn new(text: impl Into<String>) -> Self {
        let chars: Vec<char> = text.into().chars().collect();
        StringSource {
            chars: chars.into_iter(),
        }
    }
}

impl CharSource for StringSource {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        Ok(self.chars.next())
    }
}

/// A character source decoding UTF-8 from any [`Read`] implementation.
///
/// The input is buffered internally; the wrapped reader is borrowed for the
/// lifetime of the source and never closed.
pub struct IoSource<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> IoSource<R> {
    pub fn new(reader: R) -> Self {
        IoSource {
            inner: BufReader::new(reader),
        }
    }
}

impl<R: Read> CharSource for IoSource<R> {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        let mut first = [0u8; 1];
        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let width = match first[0] {
            b if b < 0x80 => return Ok(Some(b as char)),
            b if (0xc0..0xe0).contains(&b) => 2,
            b if (0xe0..0xf0).contains(&b) => 3,
            b if (0xf0..0xf8).contains(&b) => 4,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "stream is not valid UTF-8",
                ))
            }
        };
        let mut buf = [0u8; 4];
        buf[0] = first[0];
        self.inner.read_exact(&mut buf[1..width])?;
        match std::str::from_utf8(&buf[..width]) {
            Ok(s) => Ok(s.chars().next()),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "stream is not valid UTF-8",
            )),
        }
    }
}

/// A character cursor with arbitrary lookahead and pushback.
///
/// The tokenizers never consume input blindly: they peek at what is coming,
/// and either take it or leave the cursor exactly where it was. `peek` and
/// `consume` are equivalent to reading into a buffer and restoring it; no
/// character is ever skipped silently.
pub struct RetryReader<S> {
    source: S,
    lookahead: VecDeque<char>,
    eof: bool,
}

impl<S: CharSource> RetryReader<S> {
    pub fn new(source: S) -> Self {
        RetryReader {
            source,
            lookahead: VecDeque::new(),
            eof: false,
        }
    }

    /// Pulls from the source until `n` characters are buffered or the source
    /// is exhausted.
    fn fill(&mut self, n: usize) -> io::Result<()> {
        while self.lookahead.len() < n && !self.eof {
            match self.source.read_char()? {
                Some(ch) => self.lookahead.push_back(ch),
                None => self.eof = true,
            }
        }
        Ok(())
    }

    /// Examines the next `n` characters without consuming them. Fewer are
    /// returned at end of input.
    pub fn peek(&mut self, n: usize) -> io::Result<&[char]> {
        self.fill(n)?;
        let have = n.min(self.lookahead.len());
        Ok(&self.lookahead.make_contiguous()[..have])
    }

    /// Examines the next character without consuming it.
    pub fn peek_char(&mut self) -> io::Result<Option<char>> {
        self.fill(1)?;
        Ok(self.lookahead.front().copied())
    }

    /// Consumes and returns the next character.
    pub fn next_char(&mut self) -> io::Result<Option<char>> {
        self.fill(1)?;
        Ok(self.lookahead.pop_front())
    }

    /// Returns a character to the cursor; it will be the next one produced.
    pub fn push_back(&mut self, ch: char) {
        self.lookahead.push_front(ch);
    }

    /// True iff the upcoming characters equal `literal`. Never consumes.
    pub fn looking_at(&mut self, literal: &str) -> io::Result<bool> {
        let n = literal.chars().count();
        self.fill(n)?;
        if self.lookahead.len() < n {
            return Ok(false);
        }
        for (buffered, expected) in self.lookahead.iter().zip(literal.chars()) {
            if *buffered != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// If the upcoming characters equal `literal`, advances past them and
    /// returns `true`; otherwise leaves the cursor untouched.
    pub fn consume(&mut self, literal: &str) -> io::Result<bool> {
        if !self.looking_at(literal)? {
            return Ok(false);
        }
        self.lookahead.drain(..literal.chars().count());
        Ok(true)
    }

    /// Tries each literal in order and consumes the first that matches.
    /// Returns the matched literal.
    pub fn consume_any<'a>(&mut self, literals: &[&'a str]) -> io::Result<Option<&'a str>> {
        for literal in literals {
            if self.consume(literal)? {
                return Ok(Some(literal));
            }
        }
        Ok(None)
    }

    /// Consumes characters while `keep` holds and returns the span.
    pub fn read_while(&mut self, mut keep: impl FnMut(char) -> bool) -> io::Result<String> {
        let mut span = String::new();
        while let Some(ch) = self.peek_char()? {
            if !keep(ch) {
                break;
            }
            self.lookahead.pop_front();
            span.push(ch);
        }
        Ok(span)
    }

    /// True iff no further characters exist.
    pub fn at_eof(&mut self) -> io::Result<bool> {
        self.fill(1)?;
        Ok(self.lookahead.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(text: &str) -> RetryReader<StringSource> {
        RetryReader::new(StringSource::new(text))
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = reader("abc");
        assert_eq!(r.peek(2).unwrap(), &['a', 'b']);
        assert_eq!(r.peek(2).unwrap(), &['a', 'b']);
        assert_eq!(r.next_char().unwrap(), Some('a'));
    }

    #[test]
    fn peek_returns_fewer_at_eof() {
        let mut r = reader("ab");
        assert_eq!(r.peek(5).unwrap(), &['a', 'b']);
    }

    #[test]
    fn consume_is_all_or_nothing() {
        let mut r = reader("::rest");
        assert!(!r.consume(":::").unwrap());
        assert!(r.consume("::").unwrap());
        assert_eq!(r.read_while(|_| true).unwrap(), "rest");
    }

    #[test]
    fn consume_any_prefers_earlier_literals() {
        let mut r = reader("\r\nx");
        assert_eq!(r.consume_any(&["\r\n", "\r", "\n"]).unwrap(), Some("\r\n"));
        assert_eq!(r.next_char().unwrap(), Some('x'));
    }

    #[test]
    fn push_back_restores_order() {
        let mut r = reader("bc");
        r.push_back('a');
        assert_eq!(r.read_while(|_| true).unwrap(), "abc");
    }

    #[test]
    fn read_while_stops_on_predicate() {
        let mut r = reader("123,rest");
        assert_eq!(r.read_while(|c| c.is_ascii_digit()).unwrap(), "123");
        assert_eq!(r.peek_char().unwrap(), Some(','));
    }

    #[test]
    fn eof_contract() {
        let mut r = reader("a");
        assert!(!r.at_eof().unwrap());
        r.next_char().unwrap();
        assert!(r.at_eof().unwrap());
        assert_eq!(r.next_char().unwrap(), None);
    }

    #[test]
    fn io_source_decodes_multibyte() {
        let bytes = "héllo ☃".as_bytes();
        let mut src = IoSource::new(bytes);
        let mut out = String::new();
        while let Some(ch) = src.read_char().unwrap() {
            out.push(ch);
        }
        assert_eq!(out, "héllo ☃");
    }

    #[test]
    fn io_source_rejects_invalid_utf8() {
        let bytes: &[u8] = &[0x66, 0xff, 0x67];
        let mut src = IoSource::new(bytes);
        assert_eq!(src.read_char().unwrap(), Some('f'));
        assert!(src.read_char().is_err());
    }
}
