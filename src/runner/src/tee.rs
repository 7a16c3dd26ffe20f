use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Duplicates every write to the original destination and to the run log.
///
/// Both sides are flushed before a write returns, so a crash mid-run leaves a log that is complete
/// up to the last line printed.
pub struct OutputTee<O: Write, L: Write> {
    original: O,
    log: L,
}

impl<O: Write, L: Write> OutputTee<O, L> {
    pub fn new(original: O, log: L) -> Self {
        Self { original, log }
    }

    pub fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.original.write_all(text.as_bytes())?;
        self.original.flush()?;
        self.log.write_all(text.as_bytes())?;
        self.log.flush()
    }

    pub fn original(&self) -> &O {
        &self.original
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn into_parts(self) -> (O, L) {
        (self.original, self.log)
    }
}

impl<O: Write, L: Write> Write for OutputTee<O, L> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.original.write_all(buf)?;
        self.original.flush()?;
        self.log.write_all(buf)?;
        self.log.flush()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.original.flush()?;
        self.log.flush()
    }
}

/// Clonable handle to the single log destination shared by the stdout and stderr tees.
#[derive(Clone)]
pub struct SharedLog {
    inner: Arc<Mutex<dyn Write + Send>>,
}

impl SharedLog {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn from_shared<W: Write + Send + 'static>(shared: Arc<Mutex<W>>) -> Self {
        Self { inner: shared }
    }
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .flush()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

type ConsoleTee = OutputTee<Box<dyn Write + Send>, SharedLog>;

/// The run transcript: everything printed during a run goes through here and lands both on the
/// terminal and in the per-run log file.
pub struct Console {
    out: ConsoleTee,
    err: ConsoleTee,
}

impl Console {
    pub fn new(stdout: Box<dyn Write + Send>, stderr: Box<dyn Write + Send>, log: SharedLog) -> Self {
        Self {
            out: OutputTee::new(stdout, log.clone()),
            err: OutputTee::new(stderr, log),
        }
    }

    /// Console attached to the process' own stdout and stderr.
    pub fn stdio(log: SharedLog) -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()), log)
    }

    pub fn println(&mut self, line: impl Display) {
        self.line(Stream::Stdout, line);
    }

    pub fn eprintln(&mut self, line: impl Display) {
        self.line(Stream::Stderr, line);
    }

    pub fn blank(&mut self) {
        self.println("");
    }

    pub fn line(&mut self, stream: Stream, line: impl Display) {
        let tee = match stream {
            Stream::Stdout => &mut self.out,
            Stream::Stderr => &mut self.err,
        };
        if let Err(e) = tee.write_text(&format!("{line}\n")) {
            tracing::warn!("failed to write transcript line: {e}");
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.out)?;
        Write::flush(&mut self.err)
    }
}
