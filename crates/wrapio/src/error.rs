use thiserror::Error;

use crate::channel::Channel;
use crate::extract::FieldKind;

pub type Result<T, E = WrapioError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum WrapioError {
    /// A configuration value could not be coerced to the requested kind.
    #[error("expected {kind} value for key '{key}'")]
    TypeMismatch { key: String, kind: FieldKind },

    /// A key or value cannot be rendered as an argument token.
    #[error("cannot marshal key '{key}': {reason}")]
    Marshal { key: String, reason: String },

    /// Growing the format buffer (or an argument table) failed.
    #[error("failed to allocate {requested} bytes")]
    Allocation { requested: usize },

    /// The legacy routine returned a non-zero status.
    #[error("{program}: abnormal exit code: {code}")]
    Invocation { program: String, code: i32 },

    /// The bound sink (or OS stream) rejected a write or flush.
    #[error("{channel} sink failed: {source}")]
    Sink {
        channel: Channel,
        #[source]
        source: std::io::Error,
    },

    /// A `Display` implementation reported an error while formatting.
    #[error("formatter returned an error")]
    Format,

    #[error("unknown entry point: {0}")]
    UnknownEntryPoint(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid settings: {0}")]
    Settings(String),
}

impl WrapioError {
    pub(crate) fn marshal(key: impl Into<String>, reason: impl Into<String>) -> Self {
        WrapioError::Marshal {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn sink(channel: Channel, source: std::io::Error) -> Self {
        WrapioError::Sink { channel, source }
    }

    /// Exit code carried by an [`WrapioError::Invocation`], if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            WrapioError::Invocation { code, .. } => Some(*code),
            _ => None,
        }
    }
}
