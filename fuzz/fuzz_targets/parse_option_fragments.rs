#![no_main]

use libfuzzer_sys::fuzz_target;
use wrapio::{marshal, parse_option_fragments};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let fragments: Vec<&str> = text.split('\n').collect();
    let map = parse_option_fragments(&fragments);
    for key in map.keys() {
        assert_eq!(key.chars().count(), 1, "option names are one character");
    }
    // Values may carry a NUL byte; keys never make marshalling fail.
    match marshal(&map, "run", None) {
        Ok(argv) => assert!(argv.argc() > map.len()),
        Err(wrapio::WrapioError::Marshal { reason, .. }) => {
            assert!(reason.contains("NUL"), "unexpected reason: {reason}")
        }
        Err(err) => panic!("unexpected error: {err}"),
    }
});
