#![no_main]

use libfuzzer_sys::fuzz_target;
use wrapio::{marshal_entry, ConfigMap, ConfigValue};

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 64 * 1024 {
        &data[..64 * 1024]
    } else {
        data
    };

    let Ok(map) = ConfigMap::from_json_slice(data) else {
        return;
    };

    let Ok(argv) = marshal_entry(&map, "run", Some("pair")) else {
        return;
    };
    assert_eq!(argv.program(), "run");

    let flags = map.keys().filter(|k| *k != "pair").count();
    let values = map
        .iter()
        .filter(|(k, v)| k.as_str() != "pair" && !v.is_absent())
        .count();
    let pair_tokens = match map.get("pair").and_then(ConfigValue::as_map) {
        Some(p) => 2 + p.len() + p.iter().filter(|(_, v)| !v.is_absent()).count(),
        None => 0,
    };
    assert_eq!(argv.argc(), 1 + pair_tokens + flags + values);

    if let Ok(mut c) = argv.to_c() {
        assert_eq!(c.argc() as usize, argv.argc());
        assert!(!c.as_mut_ptr().is_null());
    }
});
