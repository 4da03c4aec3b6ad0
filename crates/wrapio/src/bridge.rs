//! Calling legacy entry points.

use std::ffi::{c_char, c_int};

use tracing::{debug, warn};

use crate::capture::FdCapture;
use crate::channel::Channel;
use crate::error::{Result, WrapioError};
use crate::ffi::WrapioIo;
use crate::marshal::Argv;
use crate::settings::Settings;
use crate::stdio::Stdio;

/// `int main(int argc, char **argv)`.
pub type MainFn = unsafe extern "C" fn(c_int, *mut *mut c_char) -> c_int;

/// `int main(int argc, char **argv, wrapio_io *io)`.
pub type IoMainFn = unsafe extern "C" fn(c_int, *mut *mut c_char, *const WrapioIo) -> c_int;

/// A legacy routine. Returns its exit status.
pub trait EntryPoint {
    fn call(&self, argv: Argv, io: &mut Stdio) -> Result<i32>;
}

impl<F> EntryPoint for F
where
    F: Fn(Argv, &mut Stdio) -> Result<i32>,
{
    fn call(&self, argv: Argv, io: &mut Stdio) -> Result<i32> {
        self(argv, io)
    }
}

/// A C routine writing straight to file descriptors 1 and 2.
///
/// On Unix, each channel bound to a sink has its descriptor pointed at a
/// spool file for the duration of the call; the spooled bytes are then
/// written to the sink. Unbound channels reach the real streams.
#[derive(Clone, Copy, Debug)]
pub struct CMainEntryPoint {
    func: MainFn,
}

impl CMainEntryPoint {
    /// # Safety
    ///
    /// `func` must be safe to call with a valid null-terminated argv table.
    pub unsafe fn new(func: MainFn) -> Self {
        Self { func }
    }
}

impl EntryPoint for CMainEntryPoint {
    fn call(&self, argv: Argv, io: &mut Stdio) -> Result<i32> {
        let mut c_argv = argv.to_c()?;
        let bound: Vec<Channel> = Channel::ALL
            .into_iter()
            .filter(|&c| io.is_bound(c))
            .collect();
        let capture = if bound.is_empty() {
            None
        } else {
            Some(FdCapture::begin(&bound)?)
        };

        // SAFETY: guaranteed by the `new` contract; the table and its strings
        // outlive the call.
        let code = unsafe { (self.func)(c_argv.argc(), c_argv.as_mut_ptr()) };

        if let Some(capture) = capture {
            // Reported like a shim write error: ahead of the status.
            match capture.finish() {
                Ok(spooled) => {
                    for (channel, bytes) in spooled {
                        if bytes.is_empty() {
                            continue;
                        }
                        debug!(%channel, len = bytes.len(), "forwarding captured output");
                        if let Err(err) = io.write(channel, &bytes) {
                            io.defer_error(err);
                        }
                    }
                }
                Err(err) => io.defer_error(err),
            }
        }
        Ok(code)
    }
}

/// A C routine that writes through the `wrapio_*` shims.
#[derive(Clone, Copy, Debug)]
pub struct CIoEntryPoint {
    func: IoMainFn,
}

impl CIoEntryPoint {
    /// # Safety
    ///
    /// `func` must be safe to call with a valid null-terminated argv table and
    /// must not keep the host table past its return.
    pub unsafe fn new(func: IoMainFn) -> Self {
        Self { func }
    }
}

impl EntryPoint for CIoEntryPoint {
    fn call(&self, argv: Argv, io: &mut Stdio) -> Result<i32> {
        let mut c_argv = argv.to_c()?;
        let host = WrapioIo::for_stdio(io);
        // SAFETY: guaranteed by the `new` contract; `host` borrows `io` and
        // lives until the call returns.
        let code = unsafe { (self.func)(c_argv.argc(), c_argv.as_mut_ptr(), &host) };
        Ok(code)
    }
}

#[derive(Debug)]
pub struct InvocationResult {
    pub program: String,
    /// `None` when the routine was never called.
    pub status: Option<i32>,
    pub error: Option<WrapioError>,
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bridge {
    echo_command: bool,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            echo_command: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            echo_command: settings.echo_command,
        }
    }

    pub fn echo_command(mut self, on: bool) -> Self {
        self.echo_command = on;
        self
    }

    /// Calls `entry` with `argv`, then flushes both channels once each.
    ///
    /// The routine takes ownership of `argv`. A write error recorded by the C
    /// shims during the call is reported ahead of the exit status; a flush
    /// error is reported only when nothing failed before it.
    pub fn invoke(&self, entry: &dyn EntryPoint, argv: Argv, io: &mut Stdio) -> InvocationResult {
        let program = argv.program().to_string();
        let command = argv.command_line();
        debug!(%program, %command, "invoking entry point");

        let mut status = None;
        let mut error = None;

        // Stale detail from a previous call must not leak into this one.
        let _ = io.take_deferred_error();

        if self.echo_command {
            if let Err(err) = io.print(Channel::Error, format_args!("> {command}\n")) {
                error = Some(err);
            }
        }

        if error.is_none() {
            match entry.call(argv, io) {
                Ok(code) => {
                    status = Some(code);
                    if let Some(err) = io.take_deferred_error() {
                        if code != 0 {
                            warn!(%program, code, "routine failed after a write error");
                        }
                        error = Some(err);
                    } else if code != 0 {
                        error = Some(WrapioError::Invocation {
                            program: program.clone(),
                            code,
                        });
                    }
                }
                Err(err) => error = Some(err),
            }
        }

        for channel in Channel::ALL {
            match io.flush(channel) {
                Ok(()) => debug!(%channel, "flushed"),
                Err(err) if error.is_none() => error = Some(err),
                Err(err) => warn!(%channel, error = %err, "flush failed after an earlier error"),
            }
        }

        InvocationResult {
            program,
            status,
            error,
        }
    }
}
