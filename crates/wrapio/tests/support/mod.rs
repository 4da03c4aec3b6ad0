#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use wrapio::{Channel, OsStreams, Sink, SinkHandle};

#[derive(Default)]
pub struct Counters {
    pub accepts: AtomicUsize,
    pub flushes: AtomicUsize,
    pub data: Mutex<Vec<u8>>,
}

impl Counters {
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data.lock()).into_owned()
    }
}

/// Records every call; can be told to fail accepts or flushes.
#[derive(Clone, Default)]
pub struct CountingSink {
    pub counters: Arc<Counters>,
    pub fail_accept: bool,
    pub fail_flush: bool,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_flush() -> Self {
        Self {
            fail_flush: true,
            ..Self::default()
        }
    }

    pub fn failing_accept() -> Self {
        Self {
            fail_accept: true,
            ..Self::default()
        }
    }

    pub fn handle(&self) -> SinkHandle {
        SinkHandle::new(self.clone())
    }
}

impl Sink for CountingSink {
    fn accept(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.counters.accepts.fetch_add(1, Ordering::SeqCst);
        if self.fail_accept {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        self.counters.data.lock().extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.counters.flushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_flush {
            return Err(io::Error::new(io::ErrorKind::Other, "flush refused"));
        }
        Ok(())
    }
}

/// Stand-in for the process streams.
#[derive(Clone, Default)]
pub struct RecordingStreams {
    pub out: Arc<Counters>,
    pub err: Arc<Counters>,
}

impl RecordingStreams {
    pub fn channel(&self, channel: Channel) -> &Counters {
        match channel {
            Channel::Output => &self.out,
            Channel::Error => &self.err,
        }
    }
}

impl OsStreams for RecordingStreams {
    fn write(&mut self, channel: Channel, bytes: &[u8]) -> io::Result<()> {
        let c = self.channel(channel);
        c.accepts.fetch_add(1, Ordering::SeqCst);
        c.data.lock().extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self, channel: Channel) -> io::Result<()> {
        self.channel(channel).flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
