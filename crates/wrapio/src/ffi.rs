//! C ABI for native routines built against `wrapio`.
//!
//! A routine receives a `wrapio_io *` host table and calls the `wrapio_*`
//! shims in place of `fputs`, `puts`, `fputc`, `fwrite` and `fflush`. `stream`
//! is 1 for output and 2 for error. Formatted writes (`wrapio_fprintf`) are
//! `static inline` in `wrapio.h`: they measure with `vsnprintf`, format into
//! the host buffer handed out by `reserve` and emit it with `commit`. Failures return `EOF` (0 items for
//! `wrapio_fwrite`); the error itself stays in the host context and the bridge
//! reports it after the routine returns.
//!
//! The shims only call through the table, so a library linking its own copy
//! of this crate as a staticlib still talks to the host's `Stdio`.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::channel::Channel;
use crate::error::{Result, WrapioError};
use crate::stdio::Stdio;

pub const EOF: c_int = -1;
pub const WRAPIO_IO_ABI_VERSION: u32 = 2;

pub type HostWriteFn = unsafe extern "C" fn(*mut c_void, c_int, *const u8, usize) -> c_int;
pub type HostFlushFn = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;
pub type HostReserveFn = unsafe extern "C" fn(*mut c_void, usize) -> *mut u8;
pub type HostCommitFn = unsafe extern "C" fn(*mut c_void, c_int, usize) -> c_int;

/// Host table handed to `int f(int, char **, wrapio_io *)` routines.
#[repr(C)]
pub struct WrapioIo {
    pub abi_version: u32,
    ctx: *mut c_void,
    write: HostWriteFn,
    flush: HostFlushFn,
    reserve: HostReserveFn,
    commit: HostCommitFn,
}

impl WrapioIo {
    /// A table borrowing `io`. It must not outlive the borrow.
    pub(crate) fn for_stdio(io: &mut Stdio) -> Self {
        Self {
            abi_version: WRAPIO_IO_ABI_VERSION,
            ctx: (io as *mut Stdio).cast::<c_void>(),
            write: host_write,
            flush: host_flush,
            reserve: host_reserve,
            commit: host_commit,
        }
    }
}

fn channel(stream: c_int) -> Result<Channel> {
    Channel::from_fd(stream)
        .ok_or_else(|| WrapioError::InvalidConfig(format!("unknown stream number {stream}")))
}

unsafe fn host_call(ctx: *mut c_void, f: impl FnOnce(&mut Stdio) -> Result<()>) -> c_int {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(io) = ctx.cast::<Stdio>().as_mut() else {
            return EOF;
        };
        match f(io) {
            Ok(()) => 0,
            Err(err) => {
                io.defer_error(err);
                EOF
            }
        }
    }))
    .unwrap_or(EOF)
}

unsafe extern "C" fn host_write(ctx: *mut c_void, stream: c_int, ptr: *const u8, len: usize) -> c_int {
    if len > 0 && ptr.is_null() {
        return EOF;
    }
    let bytes: &[u8] = if len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len)
    };
    host_call(ctx, |io| {
        io.write(channel(stream)?, bytes)?;
        Ok(())
    })
}

unsafe extern "C" fn host_flush(ctx: *mut c_void, stream: c_int) -> c_int {
    host_call(ctx, |io| io.flush(channel(stream)?))
}

unsafe extern "C" fn host_reserve(ctx: *mut c_void, len: usize) -> *mut u8 {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(io) = ctx.cast::<Stdio>().as_mut() else {
            return std::ptr::null_mut();
        };
        match io.reserve_format(len) {
            Ok(ptr) => ptr,
            Err(err) => {
                io.defer_error(err);
                std::ptr::null_mut()
            }
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

unsafe extern "C" fn host_commit(ctx: *mut c_void, stream: c_int, len: usize) -> c_int {
    // SAFETY: the routine wrote `len` bytes through the pointer from `reserve`.
    host_call(ctx, |io| io.commit_format(channel(stream)?, len))
}

unsafe fn write_bytes(io: *const WrapioIo, stream: c_int, bytes: &[u8]) -> c_int {
    match io.as_ref() {
        Some(io) => (io.write)(io.ctx, stream, bytes.as_ptr(), bytes.len()),
        None => EOF,
    }
}

/// # Safety
///
/// `io` must be the table passed to the running routine; `s` a valid C string.
#[no_mangle]
pub unsafe extern "C" fn wrapio_fputs(io: *const WrapioIo, stream: c_int, s: *const c_char) -> c_int {
    if s.is_null() {
        return EOF;
    }
    write_bytes(io, stream, CStr::from_ptr(s).to_bytes())
}

/// Writes `s` and a newline.
///
/// # Safety
///
/// As for [`wrapio_fputs`].
#[no_mangle]
pub unsafe extern "C" fn wrapio_puts(io: *const WrapioIo, stream: c_int, s: *const c_char) -> c_int {
    if wrapio_fputs(io, stream, s) == EOF {
        return EOF;
    }
    write_bytes(io, stream, b"\n")
}

/// Writes the low byte of `c` and returns it.
///
/// # Safety
///
/// `io` must be the table passed to the running routine.
#[no_mangle]
pub unsafe extern "C" fn wrapio_fputc(io: *const WrapioIo, stream: c_int, c: c_int) -> c_int {
    let byte = c as u8;
    if write_bytes(io, stream, &[byte]) == EOF {
        return EOF;
    }
    c_int::from(byte)
}

/// Returns `nmemb` on success, 0 on failure.
///
/// # Safety
///
/// `ptr` must point to `size * nmemb` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn wrapio_fwrite(
    io: *const WrapioIo,
    stream: c_int,
    ptr: *const u8,
    size: usize,
    nmemb: usize,
) -> usize {
    let Some(len) = size.checked_mul(nmemb) else {
        return 0;
    };
    if len == 0 || ptr.is_null() {
        return 0;
    }
    let bytes = std::slice::from_raw_parts(ptr, len);
    if write_bytes(io, stream, bytes) == EOF {
        return 0;
    }
    nmemb
}

/// # Safety
///
/// `io` must be the table passed to the running routine.
#[no_mangle]
pub unsafe extern "C" fn wrapio_fflush(io: *const WrapioIo, stream: c_int) -> c_int {
    match io.as_ref() {
        Some(io) => (io.flush)(io.ctx, stream),
        None => EOF,
    }
}

/// Returns room for `len` bytes plus a terminator in the host format buffer,
/// or null if it cannot grow. The pointer is valid until the next call
/// through `io`.
///
/// # Safety
///
/// `io` must be the table passed to the running routine.
#[no_mangle]
pub unsafe extern "C" fn wrapio_reserve(io: *const WrapioIo, len: usize) -> *mut u8 {
    match io.as_ref() {
        Some(io) => (io.reserve)(io.ctx, len),
        None => std::ptr::null_mut(),
    }
}

/// Emits the first `len` bytes written since [`wrapio_reserve`].
///
/// # Safety
///
/// Those bytes must have been written through the reserved pointer.
#[no_mangle]
pub unsafe extern "C" fn wrapio_commit(io: *const WrapioIo, stream: c_int, len: usize) -> c_int {
    match io.as_ref() {
        Some(io) => (io.commit)(io.ctx, stream, len),
        None => EOF,
    }
}
