use std::path::Path;

use serde::{Deserialize, Serialize};

use wrapio_contracts::WRAPIO_SETTINGS_SCHEMA_VERSION;

use crate::error::{Result, WrapioError};
use crate::format::DEFAULT_BUFFER_CAPACITY;

pub const ENV_ECHO_COMMAND: &str = "WRAPIO_ECHO_COMMAND";
pub const ENV_BUFFER_CAPACITY: &str = "WRAPIO_BUFFER_CAPACITY";
pub const DEFAULT_PAIR_KEY: &str = "pair";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Echo `> prog args...` to the error channel before each invocation. Off
    /// by default since the line is not output of the routine.
    pub echo_command: bool,
    pub initial_buffer_capacity: usize,
    /// Key holding the nested pair mapping for entry points that take one.
    pub pair_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: None,
            echo_command: false,
            initial_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            pair_key: DEFAULT_PAIR_KEY.to_string(),
        }
    }
}

impl Settings {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let settings: Settings = serde_json::from_slice(bytes)
            .map_err(|e| WrapioError::Settings(format!("parse settings JSON: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            WrapioError::Settings(format!("read settings {}: {e}", path.display()))
        })?;
        Self::from_json_slice(&bytes)
    }

    /// Applies `WRAPIO_ECHO_COMMAND` and `WRAPIO_BUFFER_CAPACITY`. Unparseable
    /// values are ignored.
    pub fn apply_env(mut self) -> Self {
        self.echo_command = env_bool(ENV_ECHO_COMMAND, self.echo_command);
        self.initial_buffer_capacity =
            env_usize_nonzero(ENV_BUFFER_CAPACITY, self.initial_buffer_capacity);
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(v) = &self.schema_version {
            if v != WRAPIO_SETTINGS_SCHEMA_VERSION {
                return Err(WrapioError::Settings(format!(
                    "schema_version mismatch: expected {WRAPIO_SETTINGS_SCHEMA_VERSION} got {v}"
                )));
            }
        }
        if self.initial_buffer_capacity == 0 {
            return Err(WrapioError::Settings(
                "initial_buffer_capacity must be >= 1".to_string(),
            ));
        }
        if self.pair_key.is_empty() {
            return Err(WrapioError::Settings("pair_key must not be empty".to_string()));
        }
        Ok(())
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_usize_nonzero(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v != 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let s = Settings::from_json_slice(b"{}").expect("parse");
        assert_eq!(s, Settings::default());
        assert!(!s.echo_command);
        assert_eq!(s.initial_buffer_capacity, 512);
        assert_eq!(s.pair_key, "pair");
    }

    #[test]
    fn rejects_unknown_fields_and_bad_schema() {
        assert!(Settings::from_json_slice(br#"{"echo":false}"#).is_err());
        let err = Settings::from_json_slice(br#"{"schema_version":"wrapio.settings@9"}"#)
            .expect_err("schema mismatch");
        assert!(matches!(err, WrapioError::Settings(_)));
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(Settings::from_json_slice(br#"{"initial_buffer_capacity":0}"#).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        std::env::set_var(ENV_BUFFER_CAPACITY, "4096");
        std::env::set_var(ENV_ECHO_COMMAND, "yes");
        let s = Settings::default().apply_env();
        std::env::remove_var(ENV_BUFFER_CAPACITY);
        std::env::remove_var(ENV_ECHO_COMMAND);
        assert_eq!(s.initial_buffer_capacity, 4096);
        assert!(s.echo_command);
    }
}
