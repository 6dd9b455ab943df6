//! Logical line reconstruction over fragmented reads
//!
//! [`FragmentReader`] hands out at most one buffer's worth of bytes per read, so a
//! long physical line arrives as several [`Fragment::Prefix`] pieces followed by one
//! [`Fragment::Terminal`]. [`LineReframer`] stitches them back together and yields
//! one complete logical line at a time, without its terminator.
//!
//! ```rust
//! use std::io::BufReader;
//! use tsdb_import::reframe::LineReframer;
//!
//! let data: &[u8] = b"{\"metric\":\"cpu\"}\n{\"metric\":\"mem\"}\n";
//! let lines: Vec<Vec<u8>> = LineReframer::new(BufReader::with_capacity(8, data))
//!     .collect::<std::io::Result<_>>()
//!     .unwrap();
//! assert_eq!(lines, vec![b"{\"metric\":\"cpu\"}".to_vec(), b"{\"metric\":\"mem\"}".to_vec()]);
//! ```

use std::io::{self, BufRead};

/// One piece of a physical line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// More bytes of the same line follow
    Prefix(Vec<u8>),
    /// Last piece of the line; the `\n` itself is not included
    Terminal(Vec<u8>),
}

/// Splits a buffered stream into line fragments no larger than the reader's buffer
pub struct FragmentReader<R> {
    inner: R,
}

impl<R: BufRead> FragmentReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next fragment, or `None` at end of stream
    pub fn next_fragment(&mut self) -> io::Result<Option<Fragment>> {
        let available = loop {
            match self.inner.fill_buf() {
                Ok(buf) => break buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        if available.is_empty() {
            return Ok(None);
        }

        let (fragment, consumed) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (Fragment::Terminal(available[..pos].to_vec()), pos + 1),
            None => (Fragment::Prefix(available.to_vec()), available.len()),
        };
        self.inner.consume(consumed);

        Ok(Some(fragment))
    }
}

/// Iterator of complete logical lines
///
/// Blank lines are skipped and a trailing `\r` before the newline is dropped.
/// A final line without a newline is still yielded at end of stream. After an
/// I/O error is yielded the iterator is exhausted.
pub struct LineReframer<R> {
    fragments: FragmentReader<R>,
    partial: Vec<u8>,
    done: bool,
}

impl<R: BufRead> LineReframer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            fragments: FragmentReader::new(inner),
            partial: Vec::new(),
            done: false,
        }
    }

    fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            match self.fragments.next_fragment()? {
                Some(Fragment::Prefix(bytes)) => self.partial.extend_from_slice(&bytes),
                Some(Fragment::Terminal(bytes)) => {
                    let mut line = if self.partial.is_empty() {
                        bytes
                    } else {
                        let mut line = std::mem::take(&mut self.partial);
                        line.extend_from_slice(&bytes);
                        line
                    };
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if !line.is_empty() {
                        return Ok(Some(line));
                    }
                },
                None if self.partial.is_empty() => return Ok(None),
                None => return Ok(Some(std::mem::take(&mut self.partial))),
            }
        }
    }
}

impl<R: BufRead> Iterator for LineReframer<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for LineReframer<R> {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::{BufReader, Read};

    fn reframe(data: &[u8], capacity: usize) -> Vec<Vec<u8>> {
        LineReframer::new(BufReader::with_capacity(capacity, data))
            .collect::<io::Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_fragments_split_long_line() {
        let data: &[u8] = b"abcdefghij\nxy\n";
        let mut reader = FragmentReader::new(BufReader::with_capacity(4, data));

        let mut fragments = Vec::new();
        while let Some(fragment) = reader.next_fragment().unwrap() {
            fragments.push(fragment);
        }

        assert_eq!(
            fragments,
            vec![
                Fragment::Prefix(b"abcd".to_vec()),
                Fragment::Prefix(b"efgh".to_vec()),
                Fragment::Terminal(b"ij".to_vec()),
                // only the rest of the current buffer, no refill
                Fragment::Prefix(b"x".to_vec()),
                Fragment::Terminal(b"y".to_vec()),
            ]
        );
    }

    #[test]
    fn test_long_lines_are_reassembled() {
        let long = "x".repeat(10_000);
        let data = format!("{{\"v\":\"{}\"}}\n{{\"v\":1}}\n", long);

        for capacity in [1, 3, 7, 64, 4096, 65_536] {
            let lines = reframe(data.as_bytes(), capacity);
            assert_eq!(lines.len(), 2, "capacity {}", capacity);
            assert_eq!(lines[0], format!("{{\"v\":\"{}\"}}", long).into_bytes());
            assert_eq!(lines[1], b"{\"v\":1}".to_vec());
        }
    }

    #[test]
    fn test_immediate_terminal_line() {
        assert_eq!(reframe(b"{\"a\":1}\n", 64), vec![b"{\"a\":1}".to_vec()]);
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let lines = reframe(b"\n{\"a\":1}\r\n\r\n\n{\"a\":2}\n", 3);
        assert_eq!(lines, vec![b"{\"a\":1}".to_vec(), b"{\"a\":2}".to_vec()]);
    }

    #[test]
    fn test_last_line_without_newline() {
        let lines = reframe(b"{\"a\":1}\n{\"a\":2}", 5);
        assert_eq!(lines, vec![b"{\"a\":1}".to_vec(), b"{\"a\":2}".to_vec()]);
    }

    #[test]
    fn test_empty_stream() {
        assert!(reframe(b"", 16).is_empty());
    }

    struct FailAfter<'a> {
        data: &'a [u8],
    }

    impl Read for FailAfter<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt deflate stream"));
            }
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_read_error_ends_sequence() {
        let reader = BufReader::with_capacity(4, FailAfter { data: b"{\"a\":1}\n{\"a\"" });
        let mut lines = LineReframer::new(reader);

        assert_eq!(lines.next().unwrap().unwrap(), b"{\"a\":1}".to_vec());
        assert!(lines.next().unwrap().is_err());
        assert!(lines.next().is_none());
    }
}
