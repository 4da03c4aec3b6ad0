//! Named entry points: one callable per legacy routine.

use indexmap::IndexMap;
use tracing::debug;

use crate::bridge::{Bridge, EntryPoint, InvocationResult};
use crate::config::ConfigMap;
use crate::error::{Result, WrapioError};
use crate::marshal::{marshal_entry, Argv};
use crate::settings::Settings;
use crate::stdio::Stdio;

/// Whether an entry point takes a nested pair mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairMode {
    Plain,
    /// The mapping's pair key is lifted out and emitted between `_` delimiters.
    Paired,
}

struct Registered {
    program: String,
    pair: PairMode,
    entry: Box<dyn EntryPoint>,
}

pub struct EntryPoints {
    entries: IndexMap<String, Registered>,
    bridge: Bridge,
    pair_key: String,
}

impl Default for EntryPoints {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl EntryPoints {
    pub fn new(settings: &Settings) -> Self {
        Self {
            entries: IndexMap::new(),
            bridge: Bridge::from_settings(settings),
            pair_key: settings.pair_key.clone(),
        }
    }

    /// Registers `entry` under `name`, replacing any earlier registration.
    pub fn register<E: EntryPoint + 'static>(
        &mut self,
        name: &str,
        program: &str,
        pair: PairMode,
        entry: E,
    ) -> &mut Self {
        self.entries.insert(
            name.to_string(),
            Registered {
                program: program.to_string(),
                pair,
                entry: Box::new(entry),
            },
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn lookup(&self, name: &str) -> Result<&Registered> {
        self.entries
            .get(name)
            .ok_or_else(|| WrapioError::UnknownEntryPoint(name.to_string()))
    }

    /// The argument vector `name` would be called with.
    pub fn argv(&self, name: &str, config: &ConfigMap) -> Result<Argv> {
        let reg = self.lookup(name)?;
        let pair_key = match reg.pair {
            PairMode::Paired => Some(self.pair_key.as_str()),
            PairMode::Plain => None,
        };
        marshal_entry(config, &reg.program, pair_key)
    }

    /// Marshals `config` and calls `name`. Errors raised before the call
    /// (unknown name, unrenderable configuration) are returned directly.
    pub fn invoke(&self, name: &str, config: &ConfigMap, io: &mut Stdio) -> Result<InvocationResult> {
        let argv = self.argv(name, config)?;
        debug!(entry = name, argc = argv.argc(), "dispatching");
        let reg = self.lookup(name)?;
        Ok(self.bridge.invoke(reg.entry.as_ref(), argv, io))
    }

    pub fn run(&self, name: &str, config: &ConfigMap, io: &mut Stdio) -> Result<()> {
        self.invoke(name, config, io)?.into_result()
    }
}
