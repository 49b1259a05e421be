//! Writer used when a launch logs to the console and a file at once.

use std::io::{self, Stderr, Write};

use tracing_subscriber::fmt::MakeWriter;

/// Copies every formatted event to the console and the log file.
///
/// The file is the durable record of a launch, so only its errors are
/// reported. A console that has gone away is ignored.
pub(crate) struct ConsoleAndFile<C, F> {
    console: C,
    file: F,
}

impl<C: Write, F: Write> Write for ConsoleAndFile<C, F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        let _ = self.console.write_all(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

/// Pairs stderr with the writers produced by `file`.
#[derive(Clone)]
pub(crate) struct LaunchLogWriter<M> {
    file: M,
}

impl<M> LaunchLogWriter<M> {
    pub(crate) fn new(file: M) -> Self {
        Self { file }
    }
}

impl<'a, M> MakeWriter<'a> for LaunchLogWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = ConsoleAndFile<Stderr, M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleAndFile {
            console: io::stderr(),
            file: self.file.make_writer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn both_sinks_receive_each_line() {
        let mut writer = ConsoleAndFile {
            console: Vec::new(),
            file: Vec::new(),
        };
        writeln!(writer, "vApp web launched").unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.console, b"vApp web launched\n");
        assert_eq!(writer.file, writer.console);
    }

    #[test]
    fn lost_console_does_not_lose_the_file() {
        let mut writer = ConsoleAndFile {
            console: Closed,
            file: Vec::new(),
        };
        writeln!(writer, "still recorded").unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.file, b"still recorded\n");
    }

    #[test]
    fn file_errors_are_reported() {
        let mut writer = ConsoleAndFile {
            console: Vec::new(),
            file: Closed,
        };
        assert!(writer.write(b"dropped").is_err());
        assert!(writer.console.is_empty());
    }
}
