//! The reusable buffer behind formatted writes.

use std::fmt::{self, Write as _};

use crate::error::{Result, WrapioError};

pub const DEFAULT_BUFFER_CAPACITY: usize = 512;

/// Growable byte buffer for formatted text.
///
/// Formatting is two-pass: the output length is measured first, the buffer is
/// grown to `len + 1` if needed, and the arguments are then written exactly
/// once. The buffer never shrinks.
#[derive(Debug)]
pub struct FormatBuffer {
    buf: Vec<u8>,
    /// Bytes handed out by the last [`FormatBuffer::reserve`].
    reserved: usize,
}

impl Default for FormatBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }
}

impl FormatBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            reserved: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Bytes produced by the last successful [`FormatBuffer::format`].
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Grows the buffer so that `required` bytes plus a terminator fit.
    ///
    /// On failure the buffer (contents and capacity) is left unchanged.
    pub fn ensure_capacity(&mut self, required: usize) -> Result<()> {
        let needed = required
            .checked_add(1)
            .ok_or(WrapioError::Allocation { requested: required })?;
        if self.buf.capacity() >= needed {
            return Ok(());
        }
        let additional = needed - self.buf.len();
        self.buf
            .try_reserve_exact(additional)
            .map_err(|_| WrapioError::Allocation { requested: needed })
    }

    /// Formats `args` into the buffer and returns the written length.
    pub fn format(&mut self, args: fmt::Arguments<'_>) -> Result<usize> {
        let required = measure(args)?;
        self.ensure_capacity(required)?;

        self.buf.clear();
        self.reserved = 0;
        let mut w = FillBuffer { buf: &mut self.buf };
        if w.write_fmt(args).is_err() {
            self.buf.clear();
            return Err(WrapioError::Format);
        }
        Ok(self.buf.len())
    }
}

impl FormatBuffer {
    /// Second half of a format measured elsewhere (`vsnprintf` in native
    /// code): grows to `len + 1` and returns the start of the buffer.
    pub(crate) fn reserve(&mut self, len: usize) -> Result<*mut u8> {
        self.ensure_capacity(len)?;
        self.buf.clear();
        self.reserved = len;
        Ok(self.buf.as_mut_ptr())
    }

    /// Takes the first `len` bytes written since [`FormatBuffer::reserve`].
    ///
    /// # Safety
    ///
    /// Those bytes must have been initialized through the reserved pointer.
    pub(crate) unsafe fn commit(&mut self, len: usize) -> Result<&[u8]> {
        if len > self.reserved {
            return Err(WrapioError::Format);
        }
        self.reserved = 0;
        // SAFETY: len <= reserved < capacity and the caller wrote the bytes.
        self.buf.set_len(len);
        Ok(&self.buf)
    }
}

pub fn measure(args: fmt::Arguments<'_>) -> Result<usize> {
    if let Some(s) = args.as_str() {
        return Ok(s.len());
    }
    let mut m = Measure(0);
    m.write_fmt(args).map_err(|_| WrapioError::Format)?;
    Ok(m.0)
}

struct Measure(usize);

impl fmt::Write for Measure {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

struct FillBuffer<'a> {
    buf: &'a mut Vec<u8>,
}

impl fmt::Write for FillBuffer<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}
