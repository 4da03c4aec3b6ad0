//! Parsing of pre-rendered legacy option groups.
//!
//! Wrapper scripts around the legacy tools keep option groups as strings such
//! as `" -b 62 "`, `"-F"` or `"-+ 16"`. [`parse_option_fragments`] turns them
//! back into mapping entries so they can be merged into a [`ConfigMap`].
//!
//! Option names are a single ASCII letter or `+`. A value runs up to the next
//! whitespace or `-`, so a negative number cannot be expressed in a fragment;
//! pass such values as ordinary mapping entries instead.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{ConfigMap, ConfigValue};

static OPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-([+a-zA-Z])\s*([^-\s]*)").expect("option fragment regex must compile")
});

/// Parses option fragments into a mapping. Later occurrences of a key replace
/// earlier ones but keep the first position.
pub fn parse_option_fragments<S: AsRef<str>>(fragments: &[S]) -> ConfigMap {
    let mut out = ConfigMap::new();
    for fragment in fragments {
        for caps in OPTION_RE.captures_iter(fragment.as_ref()) {
            let key = &caps[1];
            let value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let value = if value.is_empty() {
                ConfigValue::Absent
            } else {
                ConfigValue::Text(value.to_string())
            };
            out.insert(key, value);
        }
    }
    out
}

impl ConfigMap {
    /// Merges parsed option fragments into this mapping.
    pub fn extend_from_fragments<S: AsRef<str>>(&mut self, fragments: &[S]) {
        self.merge(parse_option_fragments(fragments));
    }
}
