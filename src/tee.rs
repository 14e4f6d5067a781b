//! Fan one byte stream out to the console and the log file.

use std::io::{self, Read, Write};

use tracing::warn;

const CHUNK_SIZE: usize = 8 * 1024;

/// What happened to the stream once the source hit EOF
#[derive(Debug)]
pub struct TeeSummary {
    pub bytes: u64,
    /// First write error on the log file; later bytes were only shown on the console
    pub file_error: Option<io::Error>,
}

/// Single reader, two writers. A failing sink is dropped and the other keeps
/// receiving data so the source is always drained.
pub struct Tee<C: Write, F: Write> {
    console: Option<C>,
    file: Option<F>,
    bytes: u64,
    file_error: Option<io::Error>,
}

impl<C: Write, F: Write> Tee<C, F> {
    pub fn new(console: C, file: F) -> Self {
        Self {
            console: Some(console),
            file: Some(file),
            bytes: 0,
            file_error: None,
        }
    }

    /// Write one chunk to every live sink, flushing each
    pub fn write_chunk(&mut self, chunk: &[u8]) {
        self.bytes += chunk.len() as u64;

        if let Some(console) = self.console.as_mut() {
            if let Err(e) = console.write_all(chunk).and_then(|()| console.flush()) {
                warn!(error = %e, "console output failed, continuing with log file only");
                self.console = None;
            }
        }

        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(chunk).and_then(|()| file.flush()) {
                warn!(error = %e, "log file write failed, continuing with console only");
                self.file = None;
                self.file_error = Some(e);
            }
        }
    }

    /// Copy `reader` to both sinks until EOF
    pub fn copy_from<R: Read>(&mut self, mut reader: R) -> io::Result<()> {
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => self.write_chunk(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn finish(self) -> TeeSummary {
        TeeSummary {
            bytes: self.bytes,
            file_error: self.file_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that fails after accepting `limit` bytes
    struct FailingWriter {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Reader that interrupts once before every chunk
    struct InterruptingReader<'a> {
        chunks: Vec<&'a [u8]>,
        interrupted: bool,
    }

    impl Read for InterruptingReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            self.interrupted = false;
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn test_copy_duplicates_bytes() {
        let input: Vec<u8> = (0..=255u8).cycle().take(3 * CHUNK_SIZE + 17).collect();
        let mut tee = Tee::new(Vec::new(), Vec::new());
        tee.copy_from(input.as_slice()).unwrap();

        assert_eq!(tee.console.as_deref(), Some(input.as_slice()));
        assert_eq!(tee.file.as_deref(), Some(input.as_slice()));
        let summary = tee.finish();
        assert_eq!(summary.bytes, input.len() as u64);
        assert!(summary.file_error.is_none());
    }

    #[test]
    fn test_copy_empty_source() {
        let mut tee = Tee::new(Vec::new(), Vec::new());
        tee.copy_from(io::empty()).unwrap();
        assert_eq!(tee.finish().bytes, 0);
    }

    #[test]
    fn test_console_failure_keeps_logging() {
        let console = FailingWriter {
            written: Vec::new(),
            limit: 4,
        };
        let mut tee = Tee::new(console, Vec::new());
        tee.write_chunk(b"abc");
        tee.write_chunk(b"defg");
        tee.write_chunk(b"h");

        assert!(tee.console.is_none());
        assert_eq!(tee.file.as_deref(), Some(&b"abcdefgh"[..]));
        assert!(tee.finish().file_error.is_none());
    }

    #[test]
    fn test_file_failure_is_recorded_and_console_continues() {
        let file = FailingWriter {
            written: Vec::new(),
            limit: 2,
        };
        let mut tee = Tee::new(Vec::new(), file);
        tee.copy_from(&b"line one\nline two\n"[..]).unwrap();

        assert_eq!(tee.console.as_deref(), Some(&b"line one\nline two\n"[..]));
        let summary = tee.finish();
        assert_eq!(summary.bytes, 18);
        assert_eq!(
            summary.file_error.map(|e| e.kind()),
            Some(io::ErrorKind::BrokenPipe)
        );
    }

    #[test]
    fn test_copy_retries_interrupted_reads() {
        let reader = InterruptingReader {
            chunks: vec![&b"out\n"[..], &b"err\n"[..]],
            interrupted: false,
        };
        let mut tee = Tee::new(Vec::new(), Vec::new());
        tee.copy_from(reader).unwrap();
        assert_eq!(tee.file.as_deref(), Some(&b"out\nerr\n"[..]));
    }
}
