//! Descriptor-level capture for C routines that write to fds 1 and 2 directly.
//!
//! While a capture is active the channel's descriptor points at an anonymous
//! spool file. Descriptors are process-wide, so captures are serialized.

use crate::channel::Channel;
use crate::error::Result;

#[cfg(unix)]
pub(crate) use imp::FdCapture;

#[cfg(unix)]
mod imp {
    use std::fs::File;
    use std::io::{self, Read, Seek, SeekFrom, Write};
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    use parking_lot::{const_mutex, Mutex, MutexGuard};
    use tracing::warn;

    use super::{Channel, Result};
    use crate::error::WrapioError;

    static FD_SWAP: Mutex<()> = const_mutex(());

    struct Swapped {
        channel: Channel,
        saved: OwnedFd,
        spool: File,
    }

    pub(crate) struct FdCapture {
        swapped: Vec<Swapped>,
        _lock: MutexGuard<'static, ()>,
    }

    impl FdCapture {
        /// Redirects the descriptors of `channels` into spool files.
        pub(crate) fn begin(channels: &[Channel]) -> Result<Self> {
            let mut cap = FdCapture {
                swapped: Vec::with_capacity(channels.len()),
                _lock: FD_SWAP.lock(),
            };
            for &channel in channels {
                let swapped = swap_in(channel).map_err(|e| WrapioError::sink(channel, e))?;
                cap.swapped.push(swapped);
            }
            Ok(cap)
        }

        /// Restores every descriptor and returns what was written meanwhile.
        pub(crate) fn finish(mut self) -> Result<Vec<(Channel, Vec<u8>)>> {
            let flushed = flush_process_streams();
            let swapped = std::mem::take(&mut self.swapped);
            let mut first_err = match (flushed, swapped.first()) {
                (Err(e), Some(s)) => Some(WrapioError::sink(s.channel, e)),
                _ => None,
            };
            let mut out = Vec::with_capacity(swapped.len());
            for s in swapped {
                let channel = s.channel;
                match restore(&s).and_then(|()| drain(s.spool)) {
                    Ok(bytes) => out.push((channel, bytes)),
                    Err(e) if first_err.is_none() => {
                        first_err = Some(WrapioError::sink(channel, e));
                    }
                    Err(e) => warn!(%channel, error = %e, "capture failed after an earlier error"),
                }
            }
            match first_err {
                Some(err) => Err(err),
                None => Ok(out),
            }
        }
    }

    impl Drop for FdCapture {
        fn drop(&mut self) {
            if self.swapped.is_empty() {
                return;
            }
            let _ = flush_process_streams();
            for s in self.swapped.drain(..) {
                if let Err(e) = restore(&s) {
                    warn!(channel = %s.channel, error = %e, "restoring descriptor failed");
                }
            }
        }
    }

    fn swap_in(channel: Channel) -> io::Result<Swapped> {
        flush_process_streams()?;
        let spool = tempfile::tempfile()?;
        let fd = channel.fd();
        // SAFETY: plain descriptor calls; results are checked before use.
        let saved = unsafe { libc::dup(fd) };
        if saved < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `saved` is a fresh descriptor owned by nobody else.
        let saved = unsafe { OwnedFd::from_raw_fd(saved) };
        if unsafe { libc::dup2(spool.as_raw_fd(), fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Swapped {
            channel,
            saved,
            spool,
        })
    }

    fn restore(s: &Swapped) -> io::Result<()> {
        // SAFETY: `saved` stays open for the duration of the call.
        if unsafe { libc::dup2(s.saved.as_raw_fd(), s.channel.fd()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn drain(mut spool: File) -> io::Result<Vec<u8>> {
        spool.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        spool.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn flush_process_streams() -> io::Result<()> {
        io::stdout().flush()?;
        io::stderr().flush()?;
        // SAFETY: fflush(NULL) flushes every open C output stream.
        if unsafe { libc::fflush(std::ptr::null_mut()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Descriptor swapping is Unix-only; elsewhere plain routines always write to
/// the real streams.
#[cfg(not(unix))]
pub(crate) struct FdCapture;

#[cfg(not(unix))]
impl FdCapture {
    pub(crate) fn begin(_channels: &[Channel]) -> Result<Self> {
        Ok(FdCapture)
    }

    pub(crate) fn finish(self) -> Result<Vec<(Channel, Vec<u8>)>> {
        Ok(Vec::new())
    }
}
