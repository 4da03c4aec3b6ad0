//! Adapter between structured configuration and CLI-shaped native routines.
//!
//! A [`ConfigMap`] is marshalled into an [`Argv`] (`prog -k v -flag ...`),
//! handed to an [`EntryPoint`] through the [`Bridge`], and whatever the routine
//! prints goes through a [`Stdio`] context into host sinks.

pub mod bridge;
mod capture;
pub mod channel;
pub mod config;
pub mod entry;
pub mod error;
pub mod extract;
pub mod ffi;
pub mod format;
pub mod marshal;
pub mod options;
pub mod settings;
pub mod sink;
pub mod stdio;

pub use bridge::{
    Bridge, CIoEntryPoint, CMainEntryPoint, EntryPoint, InvocationResult, IoMainFn, MainFn,
};
pub use channel::Channel;
pub use config::{ConfigMap, ConfigValue};
pub use entry::{EntryPoints, PairMode};
pub use error::{Result, WrapioError};
pub use extract::{extract, FieldKind, FieldValue, FromConfig};
pub use ffi::WrapioIo;
pub use format::FormatBuffer;
pub use marshal::{marshal, marshal_entry, Argv, CArgv};
pub use options::parse_option_fragments;
pub use settings::Settings;
pub use sink::{FileMode, FileSink, MemorySink, NullSink, Sink, SinkHandle, WriterSink};
pub use stdio::{ChannelWriter, OsStreams, ProcessStreams, Redirect, Stdio};
