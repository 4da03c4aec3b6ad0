//! Host-side destinations for captured output.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

/// A destination that accepts text and can be flushed.
pub trait Sink: Send {
    fn accept(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Shared handle to a [`Sink`].
///
/// The caller that built the sink and the registry it is bound to both hold a
/// share; the sink lives until the last share drops.
#[derive(Clone)]
pub struct SinkHandle {
    inner: Arc<Mutex<dyn Sink>>,
}

impl SinkHandle {
    pub fn new<S: Sink + 'static>(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn accept(&self, bytes: &[u8]) -> io::Result<()> {
        self.inner.lock().accept(bytes)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }

    pub fn ptr_eq(&self, other: &SinkHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live shares of this sink.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkHandle")
            .field("shares", &self.share_count())
            .finish()
    }
}

/// In-memory capture. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data.lock()).into_owned()
    }

    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.data.lock())
    }

    pub fn handle(&self) -> SinkHandle {
        SinkHandle::new(self.clone())
    }
}

impl Sink for MemorySink {
    fn accept(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.data.lock().extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Discards everything, like writing to `/dev/null`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn accept(&mut self, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapts any [`Write`] implementor.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn accept(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileMode {
    /// Truncate and write.
    Write,
    Append,
}

/// A file opened in write or append mode.
pub struct FileSink {
    file: io::BufWriter<File>,
}

impl FileSink {
    pub fn open(path: &Path, mode: FileMode) -> io::Result<Self> {
        let mut opts = OpenOptions::new();
        match mode {
            FileMode::Write => opts.write(true).create(true).truncate(true),
            FileMode::Append => opts.append(true).create(true),
        };
        let file = opts.open(path)?;
        Ok(Self {
            file: io::BufWriter::new(file),
        })
    }
}

impl Sink for FileSink {
    fn accept(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
