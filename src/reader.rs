use crate::config::READER_BUFFER_SIZE;
use anyhow::{Context, Result};
use bzip2::read::MultiBzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::info;

/// Anything that yields dump lines one at a time.
pub trait LineSource {
    /// Next line without its terminator, or `None` at end of input.
    fn next_line(&mut self) -> Result<Option<String>>;
}

/// Line reader over any buffered byte stream. Invalid UTF-8 is replaced rather
/// than failing the run.
pub struct LineReader<R: BufRead> {
    inner: R,
    buf: Vec<u8>,
    lines_read: u64,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(1024),
            lines_read: 0,
        }
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl<R: BufRead> LineSource for LineReader<R> {
    fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let n = self
            .inner
            .read_until(b'\n', &mut self.buf)
            .with_context(|| format!("Failed to read line {}", self.lines_read + 1))?;
        if n == 0 {
            return Ok(None);
        }
        self.lines_read += 1;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// In-memory source, mostly for tests and embedding.
impl LineSource for std::vec::IntoIter<String> {
    fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.next())
    }
}

pub type DumpReader = LineReader<BufReader<Box<dyn Read>>>;

/// Opens a dump file. `.bz2` files are decompressed on the fly, including
/// multi-stream archives; anything else is read as plain text.
pub fn open_dump(path: impl AsRef<Path>) -> Result<DumpReader> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open dump at: {}", path.display()))?;

    let compressed = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"));
    let inner: Box<dyn Read> = if compressed {
        Box::new(MultiBzDecoder::new(file))
    } else {
        Box::new(file)
    };

    info!(path = %path.display(), compressed, "Opened dump");
    Ok(LineReader::new(BufReader::with_capacity(
        READER_BUFFER_SIZE,
        inner,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(source: &mut impl LineSource) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn strips_line_terminators() {
        let mut reader = LineReader::new(Cursor::new("a\r\nb\nc"));
        assert_eq!(collect(&mut reader), vec!["a", "b", "c"]);
        assert_eq!(reader.lines_read(), 3);
    }

    #[test]
    fn keeps_blank_lines() {
        let mut reader = LineReader::new(Cursor::new("a\n\nb\n"));
        assert_eq!(collect(&mut reader), vec!["a", "", "b"]);
    }

    #[test]
    fn replaces_invalid_utf8() {
        let mut reader = LineReader::new(Cursor::new(vec![b'o', 0xff, b'k', b'\n']));
        assert_eq!(collect(&mut reader), vec!["o\u{fffd}k"]);
    }

    #[test]
    fn vec_source_yields_in_order() {
        let mut source = vec!["x".to_string(), "y".to_string()].into_iter();
        assert_eq!(collect(&mut source), vec!["x", "y"]);
    }

    #[test]
    fn open_dump_missing_file_has_context() {
        match open_dump("/nonexistent/dump.xml.bz2") {
            Ok(_) => panic!("expected an error"),
            Err(err) => assert!(format!("{:#}", err).contains("Failed to open dump")),
        }
    }
}
