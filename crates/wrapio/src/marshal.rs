//! Configuration mapping to argument vector.
//!
//! Every mapping entry becomes `-key` optionally followed by one value token.
//! A nested "pair" mapping is emitted first, wrapped in two `_` delimiter
//! tokens directly after the program name:
//!
//! ```text
//! prog _ -pk pv -pflag _ -k v -flag
//! ```

use std::ffi::{c_char, c_int};
use std::fmt;

use crate::config::{ConfigMap, ConfigValue};
use crate::error::{Result, WrapioError};

pub const FLAG_PREFIX: char = '-';
pub const PAIR_DELIMITER: &str = "_";

/// An owned argument vector. Token 0 is the program name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argv {
    tokens: Vec<String>,
}

impl Argv {
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(WrapioError::marshal("", "argument vector needs a program name"));
        }
        Ok(Self { tokens })
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens after the program name.
    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn argc(&self) -> usize {
        self.tokens.len()
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }

    /// `prog tok tok ...`, as echoed before an invocation.
    pub fn command_line(&self) -> String {
        self.tokens.join(" ")
    }

    /// Renders the vector for a `main(int, char **)`-shaped C routine.
    pub fn to_c(&self) -> Result<CArgv> {
        CArgv::new(&self.tokens)
    }
}

impl fmt::Display for Argv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Builds an argument vector from `map`, with an optional pair mapping ahead of it.
pub fn marshal(map: &ConfigMap, program: &str, pair: Option<&ConfigMap>) -> Result<Argv> {
    let pair_len = pair.map_or(0, ConfigMap::len);
    let mut tokens: Vec<String> = Vec::new();
    let cap = 2 * map.len() + 2 * pair_len + 2;
    tokens
        .try_reserve_exact(cap)
        .map_err(|_| WrapioError::Allocation {
            requested: cap.saturating_mul(std::mem::size_of::<String>()),
        })?;

    tokens.push(program.to_string());
    if let Some(pair) = pair {
        tokens.push(PAIR_DELIMITER.to_string());
        push_entries(&mut tokens, pair)?;
        tokens.push(PAIR_DELIMITER.to_string());
    }
    push_entries(&mut tokens, map)?;

    Ok(Argv { tokens })
}

/// Builds the argument vector for an entry point.
///
/// With `pair_key` set, that key is taken out of `map` and, if present, must
/// hold a mapping which is emitted as the pair block. Without it, any nested
/// mapping is rejected by [`marshal`].
pub fn marshal_entry(map: &ConfigMap, program: &str, pair_key: Option<&str>) -> Result<Argv> {
    let Some(pair_key) = pair_key else {
        return marshal(map, program, None);
    };
    match map.get(pair_key) {
        None => marshal(map, program, None),
        Some(ConfigValue::Map(pair)) => {
            let mut rest = map.clone();
            rest.remove(pair_key);
            marshal(&rest, program, Some(pair))
        }
        Some(other) => Err(WrapioError::marshal(
            pair_key,
            format!("pair argument must be a mapping, got {}", other.type_name()),
        )),
    }
}

fn push_entries(tokens: &mut Vec<String>, map: &ConfigMap) -> Result<()> {
    for (key, value) in map {
        check_key(key)?;
        tokens.push(format!("{FLAG_PREFIX}{key}"));
        if let Some(text) = render_value(key, value)? {
            tokens.push(text);
        }
    }
    Ok(())
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(WrapioError::marshal(key, "key is empty"));
    }
    if key.contains('\0') {
        return Err(WrapioError::marshal(key, "key contains a NUL byte"));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(WrapioError::marshal(key, "key contains whitespace"));
    }
    Ok(())
}

/// Textual form of a value token, or `None` for a flag-only entry.
pub fn render_value(key: &str, value: &ConfigValue) -> Result<Option<String>> {
    let text = match value {
        ConfigValue::Absent => return Ok(None),
        ConfigValue::Bool(v) => if *v { "1" } else { "0" }.to_string(),
        ConfigValue::Int(v) => v.to_string(),
        ConfigValue::Double(v) => with_decimal_point(v.to_string(), v.is_finite()),
        ConfigValue::Float(v) => with_decimal_point(v.to_string(), v.is_finite()),
        ConfigValue::Text(v) => {
            if v.contains('\0') {
                return Err(WrapioError::marshal(key, "value contains a NUL byte"));
            }
            v.clone()
        }
        ConfigValue::Map(_) => {
            return Err(WrapioError::marshal(key, "nested mapping outside the pair slot"));
        }
    };
    Ok(Some(text))
}

// Integral floats keep a decimal point so the token still reads as a float.
fn with_decimal_point(s: String, finite: bool) -> String {
    if finite && !s.contains('.') {
        format!("{s}.0")
    } else {
        s
    }
}

/// A C-compatible argument vector.
///
/// The callee receives a pointer table it may rearrange freely (legacy
/// `getopt`-style parsers do). Token storage is held separately and released
/// when the `CArgv` drops, independent of what the callee did to the table.
pub struct CArgv {
    storage: Vec<*mut [u8]>,
    table: Vec<*mut c_char>,
}

impl CArgv {
    fn new(tokens: &[String]) -> Result<Self> {
        if let Some(tok) = tokens.iter().find(|t| t.as_bytes().contains(&0)) {
            return Err(WrapioError::marshal(tok.as_str(), "token contains a NUL byte"));
        }
        let mut out = CArgv {
            storage: Vec::with_capacity(tokens.len()),
            table: Vec::with_capacity(tokens.len() + 1),
        };
        for tok in tokens {
            let mut bytes = Vec::with_capacity(tok.len() + 1);
            bytes.extend_from_slice(tok.as_bytes());
            bytes.push(0);
            let raw = Box::into_raw(bytes.into_boxed_slice());
            out.storage.push(raw);
            out.table.push(raw.cast::<c_char>());
        }
        out.table.push(std::ptr::null_mut());
        Ok(out)
    }

    pub fn argc(&self) -> c_int {
        c_int::try_from(self.storage.len()).unwrap_or(c_int::MAX)
    }

    /// Null-terminated pointer table, valid while `self` is alive.
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.table.as_mut_ptr()
    }
}

impl Drop for CArgv {
    fn drop(&mut self) {
        for raw in self.storage.drain(..) {
            // SAFETY: every pointer came from `Box::into_raw` in `CArgv::new`
            // and is released exactly once here.
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}
