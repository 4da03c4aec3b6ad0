//! Plain C routines write to descriptors 1 and 2 themselves. This binary
//! holds a single test so nothing else writes to them while they are swapped.

use std::ffi::{c_char, c_int};

use wrapio::{Argv, Bridge, CMainEntryPoint, Channel, MemorySink, Stdio};

mod support;

use support::RecordingStreams;

unsafe extern "C" fn printing_main(argc: c_int, argv: *mut *mut c_char) -> c_int {
    // Left in the C library's buffer until the bridge flushes it.
    libc::printf(c"argc=%d first=%s\n".as_ptr(), argc, *argv.add(1));
    let raw = b"straight to fd 2\n";
    libc::write(2, raw.as_ptr().cast(), raw.len());
    4
}

#[test]
#[cfg(unix)]
fn bound_channels_capture_plain_routine_output() {
    let os = RecordingStreams::default();
    let mut io = Stdio::new().with_os_streams(os.clone());
    let out = MemorySink::new();
    let err = MemorySink::new();
    io.register(Channel::Output, out.handle());
    io.register(Channel::Error, err.handle());

    let entry = unsafe { CMainEntryPoint::new(printing_main) };
    let argv = Argv::from_tokens(vec!["run".to_string(), "-i".to_string()]).expect("argv");
    let res = Bridge::new().invoke(&entry, argv, &mut io);

    assert_eq!(res.status, Some(4));
    assert_eq!(res.error.expect("status 4").exit_code(), Some(4));
    assert_eq!(out.text(), "argc=2 first=-i\n");
    assert_eq!(err.text(), "straight to fd 2\n");
    assert_eq!(os.out.accepts(), 0);
    assert_eq!(os.err.accepts(), 0);

    // A second call gets a fresh spool.
    let argv = Argv::from_tokens(vec!["run".to_string(), "x".to_string()]).expect("argv");
    Bridge::new().invoke(&entry, argv, &mut io);
    assert_eq!(out.text(), "argc=2 first=-i\nargc=2 first=x\n");
}
