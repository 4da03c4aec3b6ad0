//! Typed extraction of single fields from a [`ConfigMap`].
//!
//! A missing key is not an error: extraction yields `None`. A present key must
//! coerce to the requested [`FieldKind`], otherwise the call fails with
//! [`WrapioError::TypeMismatch`] and nothing is written.

use std::fmt;

use crate::config::{ConfigMap, ConfigValue};
use crate::error::{Result, WrapioError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Boolean,
    Integer,
    Double,
    Float,
    Text,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Boolean => "boolean",
            FieldKind::Integer => "integer",
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::Text => "text",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Float(f32),
    Text(String),
}

/// Returns the value under `key` coerced to `kind`, or `None` if the key is missing.
pub fn extract(map: &ConfigMap, key: &str, kind: FieldKind) -> Result<Option<FieldValue>> {
    let Some(value) = map.get(key) else {
        return Ok(None);
    };
    let out = match kind {
        FieldKind::Boolean => coerce_bool(value).map(FieldValue::Boolean),
        FieldKind::Integer => coerce_int(value).map(FieldValue::Integer),
        FieldKind::Double => coerce_double(value).map(FieldValue::Double),
        FieldKind::Float => coerce_float(value).map(FieldValue::Float),
        FieldKind::Text => coerce_text(value).map(FieldValue::Text),
    };
    match out {
        Some(v) => Ok(Some(v)),
        None => Err(WrapioError::TypeMismatch {
            key: key.to_string(),
            kind,
        }),
    }
}

/// Types that can be pulled out of a configuration mapping.
pub trait FromConfig: Sized {
    const KIND: FieldKind;

    fn from_config(value: &ConfigValue) -> Option<Self>;
}

impl FromConfig for bool {
    const KIND: FieldKind = FieldKind::Boolean;

    fn from_config(value: &ConfigValue) -> Option<Self> {
        coerce_bool(value)
    }
}

impl FromConfig for i64 {
    const KIND: FieldKind = FieldKind::Integer;

    fn from_config(value: &ConfigValue) -> Option<Self> {
        coerce_int(value)
    }
}

impl FromConfig for i32 {
    const KIND: FieldKind = FieldKind::Integer;

    fn from_config(value: &ConfigValue) -> Option<Self> {
        coerce_int(value).and_then(|v| i32::try_from(v).ok())
    }
}

impl FromConfig for f64 {
    const KIND: FieldKind = FieldKind::Double;

    fn from_config(value: &ConfigValue) -> Option<Self> {
        coerce_double(value)
    }
}

impl FromConfig for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn from_config(value: &ConfigValue) -> Option<Self> {
        coerce_float(value)
    }
}

impl FromConfig for String {
    const KIND: FieldKind = FieldKind::Text;

    fn from_config(value: &ConfigValue) -> Option<Self> {
        coerce_text(value)
    }
}

impl ConfigMap {
    /// Typed form of [`extract`].
    pub fn get_as<T: FromConfig>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        T::from_config(value).map(Some).ok_or_else(|| WrapioError::TypeMismatch {
            key: key.to_string(),
            kind: T::KIND,
        })
    }

    /// Writes the value under `key` into `slot`.
    ///
    /// Returns `Ok(true)` if the slot was written. On a missing key or a failed
    /// coercion the slot keeps its previous value.
    pub fn extract_into<T: FromConfig>(&self, key: &str, slot: &mut T) -> Result<bool> {
        match self.get_as::<T>(key)? {
            Some(v) => {
                *slot = v;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn coerce_bool(value: &ConfigValue) -> Option<bool> {
    Some(match value {
        ConfigValue::Bool(v) => *v,
        ConfigValue::Int(v) => *v != 0,
        ConfigValue::Double(v) => *v != 0.0,
        ConfigValue::Float(v) => *v != 0.0,
        ConfigValue::Text(v) => !v.is_empty(),
        ConfigValue::Absent => false,
        ConfigValue::Map(m) => !m.is_empty(),
    })
}

fn coerce_int(value: &ConfigValue) -> Option<i64> {
    match value {
        ConfigValue::Int(v) => Some(*v),
        ConfigValue::Bool(v) => Some(i64::from(*v)),
        ConfigValue::Text(v) => v.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_double(value: &ConfigValue) -> Option<f64> {
    match value {
        ConfigValue::Double(v) => Some(*v),
        ConfigValue::Float(v) => Some(f64::from(*v)),
        ConfigValue::Int(v) => Some(*v as f64),
        ConfigValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        ConfigValue::Text(v) => v.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Narrows to `f32`. A finite double outside `f32` range is a mismatch.
fn coerce_float(value: &ConfigValue) -> Option<f32> {
    let wide = coerce_double(value)?;
    let narrow = wide as f32;
    if wide.is_finite() && !narrow.is_finite() {
        return None;
    }
    Some(narrow)
}

fn coerce_text(value: &ConfigValue) -> Option<String> {
    match value {
        ConfigValue::Text(v) => Some(v.clone()),
        _ => None,
    }
}
