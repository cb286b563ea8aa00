//! Caller-side ends of the contained program's standard streams

use prograreno_core::{ContainError, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, LineWriter, Read, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

/// Writes to the contained program's stdin, flushed at every newline
#[derive(Debug)]
pub struct ProcessStdin {
    inner: LineWriter<File>,
}

impl ProcessStdin {
    pub(crate) fn new(fd: OwnedFd) -> Self {
        Self {
            inner: LineWriter::new(File::from(fd)),
        }
    }

    /// Send one line; a newline is appended
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.inner, "{}", line)?;
        Ok(())
    }
}

impl Write for ProcessStdin {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl AsFd for ProcessStdin {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.get_ref().as_fd()
    }
}

/// Reads the contained program's stdout
#[derive(Debug)]
pub struct ProcessStdout {
    inner: BufReader<File>,
}

impl ProcessStdout {
    pub(crate) fn new(fd: OwnedFd) -> Self {
        Self {
            inner: BufReader::new(File::from(fd)),
        }
    }

    /// Next line without its line terminator, or `None` once the program has
    /// closed its output. Blocks until one of the two happens.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self.inner.read_line(&mut line).map_err(|e| {
            if e.kind() == io::ErrorKind::InvalidData {
                ContainError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "contained program wrote invalid UTF-8",
                ))
            } else {
                ContainError::Io(e)
            }
        })?;
        if read == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

impl Read for ProcessStdout {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for ProcessStdout {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

impl AsFd for ProcessStdout {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.get_ref().as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdio::Pipe;

    fn connected() -> (ProcessStdin, ProcessStdout) {
        let pipe = Pipe::new().unwrap();
        (ProcessStdin::new(pipe.write), ProcessStdout::new(pipe.read))
    }

    #[test]
    fn lines_arrive_in_order() {
        let (mut stdin, mut stdout) = connected();
        stdin.write_line("21").unwrap();
        stdin.write_line("22").unwrap();

        assert_eq!(stdout.read_line().unwrap().as_deref(), Some("21"));
        assert_eq!(stdout.read_line().unwrap().as_deref(), Some("22"));
    }

    #[test]
    fn newline_flushes_without_explicit_flush() {
        let (mut stdin, mut stdout) = connected();
        stdin.write_all(b"partial").unwrap();
        stdin.write_all(b" line\r\n").unwrap();
        assert_eq!(stdout.read_line().unwrap().as_deref(), Some("partial line"));
    }

    #[test]
    fn eof_after_writer_closed() {
        let (mut stdin, mut stdout) = connected();
        stdin.write_line("last").unwrap();
        drop(stdin);

        assert_eq!(stdout.read_line().unwrap().as_deref(), Some("last"));
        assert_eq!(stdout.read_line().unwrap(), None);
        assert_eq!(stdout.read_line().unwrap(), None);
    }

    #[test]
    fn unterminated_last_line() {
        let (mut stdin, mut stdout) = connected();
        stdin.write_all(b"no newline").unwrap();
        stdin.flush().unwrap();
        drop(stdin);
        assert_eq!(stdout.read_line().unwrap().as_deref(), Some("no newline"));
        assert_eq!(stdout.read_line().unwrap(), None);
    }

    #[test]
    fn invalid_utf8_is_io_error() {
        let (mut stdin, mut stdout) = connected();
        stdin.write_all(&[0xff, 0xfe, b'\n']).unwrap();
        let err = stdout.read_line().unwrap_err();
        assert!(matches!(err, ContainError::Io(_)));
    }

    #[test]
    fn write_to_closed_reader_fails() {
        let (mut stdin, stdout) = connected();
        drop(stdout);
        assert!(stdin.write_line("nobody listening").is_err());
    }
}
