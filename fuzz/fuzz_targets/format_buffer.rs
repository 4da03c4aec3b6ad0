#![no_main]

use libfuzzer_sys::fuzz_target;
use wrapio::FormatBuffer;

fuzz_target!(|data: &[u8]| {
    let Some((&cap, rest)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(rest);
    let mut buf = FormatBuffer::with_capacity(usize::from(cap));
    let n = buf.format(format_args!("{text}|{}", rest.len())).expect("format");
    let want = format!("{text}|{}", rest.len());
    assert_eq!(n, want.len());
    assert_eq!(buf.as_bytes(), want.as_bytes());
    assert!(buf.capacity() > n);
});
