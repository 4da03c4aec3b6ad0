//! Per-invocation stdio context: channel bindings, the format buffer and the
//! OS-stream fallback.
//!
//! Every text primitive a legacy routine uses (formatted writes, single
//! characters, raw strings, line writes, flush) goes through [`Stdio`]. A
//! bound channel routes to its [`SinkHandle`]; an unbound channel falls back
//! to the real process stream.

use std::fmt;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::channel::Channel;
use crate::error::{Result, WrapioError};
use crate::format::{FormatBuffer, DEFAULT_BUFFER_CAPACITY};
use crate::settings::Settings;
use crate::sink::SinkHandle;

/// The fallback used when a channel has no sink bound.
pub trait OsStreams: Send {
    fn write(&mut self, channel: Channel, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self, channel: Channel) -> io::Result<()>;
}

/// The process's real stdout/stderr.
///
/// Flushing also flushes the C library's stdio buffers, which is where
/// native routines writing through `printf` leave their pending output.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessStreams;

impl OsStreams for ProcessStreams {
    fn write(&mut self, channel: Channel, bytes: &[u8]) -> io::Result<()> {
        match channel {
            Channel::Output => io::stdout().lock().write_all(bytes),
            Channel::Error => io::stderr().lock().write_all(bytes),
        }
    }

    fn flush(&mut self, channel: Channel) -> io::Result<()> {
        // SAFETY: fflush(NULL) flushes every open C output stream.
        if unsafe { libc::fflush(std::ptr::null_mut()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        match channel {
            Channel::Output => io::stdout().lock().flush(),
            Channel::Error => io::stderr().lock().flush(),
        }
    }
}

pub struct Stdio {
    sinks: [Option<SinkHandle>; 2],
    buffer: FormatBuffer,
    os: Box<dyn OsStreams>,
    deferred: Option<WrapioError>,
}

impl Default for Stdio {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Stdio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stdio")
            .field("stdout_bound", &self.is_bound(Channel::Output))
            .field("stderr_bound", &self.is_bound(Channel::Error))
            .field("buffer_capacity", &self.buffer.capacity())
            .finish()
    }
}

impl Stdio {
    pub fn new() -> Self {
        Self::with_buffer_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_buffer_capacity(capacity: usize) -> Self {
        Self {
            sinks: [None, None],
            buffer: FormatBuffer::with_capacity(capacity),
            os: Box::new(ProcessStreams),
            deferred: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_buffer_capacity(settings.initial_buffer_capacity)
    }

    /// Replaces the OS-stream fallback.
    pub fn with_os_streams<O: OsStreams + 'static>(mut self, os: O) -> Self {
        self.os = Box::new(os);
        self
    }

    /// Binds `sink` to `channel`, dropping the registry's share of any
    /// previously bound sink.
    pub fn register(&mut self, channel: Channel, sink: SinkHandle) {
        self.replace(channel, Some(sink));
    }

    /// Unbinds `channel`; it falls back to its OS stream.
    pub fn unregister(&mut self, channel: Channel) {
        self.replace(channel, None);
    }

    fn replace(&mut self, channel: Channel, sink: Option<SinkHandle>) -> Option<SinkHandle> {
        debug!(%channel, bound = sink.is_some(), "stdio binding changed");
        std::mem::replace(&mut self.sinks[channel.index()], sink)
    }

    pub fn sink(&self, channel: Channel) -> Option<&SinkHandle> {
        self.sinks[channel.index()].as_ref()
    }

    pub fn is_bound(&self, channel: Channel) -> bool {
        self.sinks[channel.index()].is_some()
    }

    pub fn buffer(&self) -> &FormatBuffer {
        &self.buffer
    }

    pub fn write(&mut self, channel: Channel, bytes: &[u8]) -> Result<usize> {
        emit(&self.sinks, self.os.as_mut(), channel, bytes)?;
        Ok(bytes.len())
    }

    pub fn write_str(&mut self, channel: Channel, s: &str) -> Result<usize> {
        self.write(channel, s.as_bytes())
    }

    pub fn write_char(&mut self, channel: Channel, ch: char) -> Result<()> {
        let mut tmp = [0u8; 4];
        self.write(channel, ch.encode_utf8(&mut tmp).as_bytes())?;
        Ok(())
    }

    /// Writes `s` followed by a newline.
    pub fn puts(&mut self, channel: Channel, s: &str) -> Result<()> {
        self.write(channel, s.as_bytes())?;
        self.write(channel, b"\n")?;
        Ok(())
    }

    /// Formats `args` through the shared buffer and writes the result in one piece.
    pub fn print(&mut self, channel: Channel, args: fmt::Arguments<'_>) -> Result<usize> {
        let Stdio {
            sinks, buffer, os, ..
        } = self;
        let n = buffer.format(args)?;
        emit(sinks, os.as_mut(), channel, buffer.as_bytes())?;
        Ok(n)
    }

    pub fn flush(&mut self, channel: Channel) -> Result<()> {
        let res = match &self.sinks[channel.index()] {
            Some(sink) => sink.flush(),
            None => self.os.flush(channel),
        };
        res.map_err(|e| WrapioError::sink(channel, e))
    }

    /// Binds `sink` to `channel` until the returned guard drops, then restores
    /// whatever was bound before.
    pub fn redirect(&mut self, channel: Channel, sink: SinkHandle) -> Redirect<'_> {
        let previous = self.replace(channel, Some(sink));
        Redirect {
            stdio: self,
            channel,
            previous,
        }
    }

    /// A [`Write`] view of one channel.
    pub fn writer(&mut self, channel: Channel) -> ChannelWriter<'_> {
        ChannelWriter {
            stdio: self,
            channel,
        }
    }

    /// Room for a natively formatted write of `len` bytes plus a terminator.
    pub(crate) fn reserve_format(&mut self, len: usize) -> Result<*mut u8> {
        self.buffer.reserve(len)
    }

    /// Emits `len` bytes written into the buffer after [`Stdio::reserve_format`].
    ///
    /// # Safety
    ///
    /// As for [`FormatBuffer::commit`].
    pub(crate) unsafe fn commit_format(&mut self, channel: Channel, len: usize) -> Result<()> {
        let Stdio {
            sinks, buffer, os, ..
        } = self;
        let bytes = buffer.commit(len)?;
        emit(sinks, os.as_mut(), channel, bytes)
    }

    /// Records an error raised where it cannot be returned (C shims). The
    /// first one is kept.
    pub(crate) fn defer_error(&mut self, err: WrapioError) {
        if self.deferred.is_none() {
            self.deferred = Some(err);
        }
    }

    pub(crate) fn take_deferred_error(&mut self) -> Option<WrapioError> {
        self.deferred.take()
    }
}

fn emit(
    sinks: &[Option<SinkHandle>; 2],
    os: &mut dyn OsStreams,
    channel: Channel,
    bytes: &[u8],
) -> Result<()> {
    let res = match &sinks[channel.index()] {
        Some(sink) => sink.accept(bytes),
        None => os.write(channel, bytes),
    };
    res.map_err(|e| WrapioError::sink(channel, e))
}

/// Scoped binding returned by [`Stdio::redirect`].
pub struct Redirect<'a> {
    stdio: &'a mut Stdio,
    channel: Channel,
    previous: Option<SinkHandle>,
}

impl Deref for Redirect<'_> {
    type Target = Stdio;

    fn deref(&self) -> &Stdio {
        self.stdio
    }
}

impl DerefMut for Redirect<'_> {
    fn deref_mut(&mut self) -> &mut Stdio {
        self.stdio
    }
}

impl Drop for Redirect<'_> {
    fn drop(&mut self) {
        let previous = self.previous.take();
        self.stdio.replace(self.channel, previous);
    }
}

/// [`Write`] adapter for one channel. `write!` goes through the format buffer.
pub struct ChannelWriter<'a> {
    stdio: &'a mut Stdio,
    channel: Channel,
}

impl Write for ChannelWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdio.write(self.channel, buf).map_err(into_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdio.flush(self.channel).map_err(into_io_error)
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.stdio
            .print(self.channel, args)
            .map(|_| ())
            .map_err(into_io_error)
    }
}

fn into_io_error(err: WrapioError) -> io::Error {
    match err {
        WrapioError::Sink { source, .. } => source,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}
