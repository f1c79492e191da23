//! Property sources and their ordered list.
//!
//! # Responsibilities
//! - Define the [`PropertySource`] contract (name plus string lookup)
//! - Provide map, command-line and process-environment sources
//! - Keep sources in precedence order: earlier sources win
//!
//! # Design Decisions
//! - Values are strings; typed conversion happens in the environment
//! - Adding a source whose name is already present replaces the old entry's
//!   slot only through `replace`; `add_*` removes it first
//! - Lookups snapshot the list so no lock is held while a source answers

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::env::error::EnvError;

/// A named set of string properties.
pub trait PropertySource: Send + Sync {
    fn name(&self) -> &str;

    fn property(&self, key: &str) -> Option<String>;

    fn contains(&self, key: &str) -> bool {
        self.property(key).is_some()
    }

    /// Every key this source can answer, sorted.
    fn property_names(&self) -> Vec<String>;
}

impl<T: PropertySource + ?Sized> PropertySource for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn property(&self, key: &str) -> Option<String> {
        (**self).property(key)
    }

    fn contains(&self, key: &str) -> bool {
        (**self).contains(key)
    }

    fn property_names(&self) -> Vec<String> {
        (**self).property_names()
    }
}

fn sorted_keys(values: &HashMap<String, String>) -> Vec<String> {
    let mut keys: Vec<String> = values.keys().cloned().collect();
    keys.sort();
    keys
}

/// In-memory source, also used for flattened config files.
#[derive(Debug, Clone, Default)]
pub struct MapPropertySource {
    name: String,
    values: HashMap<String, String>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>, values: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn from_pairs<I, K, V>(name: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            name,
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn property(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn property_names(&self) -> Vec<String> {
        sorted_keys(&self.values)
    }
}

pub const COMMAND_LINE_SOURCE_NAME: &str = "commandLineArgs";
pub const NON_OPTION_ARGS: &str = "nonOptionArgs";

/// Properties parsed from `--key=value` arguments.
///
/// A bare `--flag` is `"true"`. Repeating a key joins the values with commas.
/// Everything else is a non-option argument, available comma-joined under
/// `nonOptionArgs`.
#[derive(Debug, Clone, Default)]
pub struct CommandLinePropertySource {
    values: HashMap<String, String>,
    non_option_args: Vec<String>,
}

impl CommandLinePropertySource {
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut source = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            let option = arg.strip_prefix("--").filter(|rest| {
                !rest.is_empty() && !rest.starts_with('=')
            });
            let Some(option) = option else {
                source.non_option_args.push(arg.to_string());
                continue;
            };
            let (key, value) = option.split_once('=').unwrap_or((option, "true"));
            source
                .values
                .entry(key.to_string())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        source
    }

    pub fn non_option_args(&self) -> &[String] {
        &self.non_option_args
    }
}

impl PropertySource for CommandLinePropertySource {
    fn name(&self) -> &str {
        COMMAND_LINE_SOURCE_NAME
    }

    fn property(&self, key: &str) -> Option<String> {
        if key == NON_OPTION_ARGS {
            return (!self.non_option_args.is_empty()).then(|| self.non_option_args.join(","));
        }
        self.values.get(key).cloned()
    }

    fn property_names(&self) -> Vec<String> {
        let mut names = sorted_keys(&self.values);
        if !self.non_option_args.is_empty() {
            names.push(NON_OPTION_ARGS.to_string());
        }
        names
    }
}

pub const SYSTEM_ENVIRONMENT_SOURCE_NAME: &str = "systemEnvironment";

/// Process environment variables. `server.port` also answers from
/// `SERVER_PORT`.
#[derive(Debug, Clone, Default)]
pub struct SystemEnvironmentPropertySource {
    values: HashMap<String, String>,
}

impl SystemEnvironmentPropertySource {
    /// Snapshot of the current process environment.
    pub fn new() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    fn env_key(key: &str) -> String {
        key.chars()
            .map(|c| match c {
                '.' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl PropertySource for SystemEnvironmentPropertySource {
    fn name(&self) -> &str {
        SYSTEM_ENVIRONMENT_SOURCE_NAME
    }

    fn property(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .or_else(|| self.values.get(&Self::env_key(key)))
            .cloned()
    }

    fn property_names(&self) -> Vec<String> {
        sorted_keys(&self.values)
    }
}

/// Ordered, mutable list of property sources. Index 0 has the highest
/// precedence.
#[derive(Default)]
pub struct PropertySources {
    sources: RwLock<Vec<Arc<dyn PropertySource>>>,
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_first(&self, source: impl PropertySource + 'static) {
        let source: Arc<dyn PropertySource> = Arc::new(source);
        let mut sources = self.sources.write();
        sources.retain(|s| s.name() != source.name());
        sources.insert(0, source);
    }

    pub fn add_last(&self, source: impl PropertySource + 'static) {
        let source: Arc<dyn PropertySource> = Arc::new(source);
        let mut sources = self.sources.write();
        sources.retain(|s| s.name() != source.name());
        sources.push(source);
    }

    /// Insert at `index`, counted after any same-named source was removed.
    pub fn add_at_index(
        &self,
        index: usize,
        source: impl PropertySource + 'static,
    ) -> Result<(), EnvError> {
        let source: Arc<dyn PropertySource> = Arc::new(source);
        let mut sources = self.sources.write();
        let remaining = sources.iter().filter(|s| s.name() != source.name()).count();
        if index > remaining {
            return Err(EnvError::IndexOutOfRange {
                index,
                len: remaining,
            });
        }
        sources.retain(|s| s.name() != source.name());
        sources.insert(index, source);
        Ok(())
    }

    /// Swap the source named `name` in place.
    pub fn replace(&self, name: &str, source: impl PropertySource + 'static) -> Result<(), EnvError> {
        let mut sources = self.sources.write();
        let slot = sources
            .iter_mut()
            .find(|s| s.name() == name)
            .ok_or_else(|| EnvError::SourceNotFound(name.to_string()))?;
        *slot = Arc::new(source);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn PropertySource>> {
        let mut sources = self.sources.write();
        let index = sources.iter().position(|s| s.name() == name)?;
        Some(sources.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PropertySource>> {
        self.sources.read().iter().find(|s| s.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.read().iter().any(|s| s.name() == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.sources.read().iter().position(|s| s.name() == name)
    }

    /// Source names in precedence order.
    pub fn names(&self) -> Vec<String> {
        self.sources.read().iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn PropertySource>> {
        self.sources.read().clone()
    }

    /// The value from the first source containing `key`.
    pub fn property(&self, key: &str) -> Option<String> {
        self.snapshot().iter().find_map(|source| source.property(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(name: &str, pairs: &[(&str, &str)]) -> MapPropertySource {
        MapPropertySource::from_pairs(name, pairs.iter().copied())
    }

    #[test]
    fn first_source_wins_and_removal_falls_through() {
        let sources = PropertySources::new();
        sources.add_last(map("defaults", &[("port", "8080")]));
        sources.add_first(map("overrides", &[("port", "9090")]));

        assert_eq!(sources.property("port").as_deref(), Some("9090"));
        sources.remove("overrides");
        assert_eq!(sources.property("port").as_deref(), Some("8080"));
        sources.remove("defaults");
        assert_eq!(sources.property("port"), None);
    }

    #[test]
    fn replace_keeps_position() {
        let sources = PropertySources::new();
        sources.add_last(map("a", &[]));
        sources.add_last(map("b", &[("k", "old")]));
        sources.add_last(map("c", &[("k", "other")]));

        sources.replace("b", map("b", &[("k", "new")])).unwrap();
        assert_eq!(sources.names(), vec!["a", "b", "c"]);
        assert_eq!(sources.property("k").as_deref(), Some("new"));
        assert!(sources.replace("zzz", map("zzz", &[])).is_err());
    }

    #[test]
    fn add_at_index_bounds() {
        let sources = PropertySources::new();
        sources.add_last(map("a", &[]));
        sources.add_at_index(0, map("b", &[])).unwrap();
        sources.add_at_index(2, map("c", &[])).unwrap();
        assert_eq!(sources.names(), vec!["b", "a", "c"]);

        let err = sources.add_at_index(9, map("d", &[])).unwrap_err();
        assert_eq!(err, EnvError::IndexOutOfRange { index: 9, len: 3 });
    }

    #[test]
    fn adding_same_name_moves_the_source() {
        let sources = PropertySources::new();
        sources.add_last(map("a", &[]));
        sources.add_last(map("b", &[]));
        sources.add_first(map("b", &[]));
        assert_eq!(sources.names(), vec!["b", "a"]);
    }

    #[test]
    fn command_line_parsing() {
        let source = CommandLinePropertySource::parse([
            "--server.port=9000",
            "--debug",
            "serve",
            "--tag=a",
            "--tag=b",
            "input.txt",
            "--",
        ]);

        assert_eq!(source.property("server.port").as_deref(), Some("9000"));
        assert_eq!(source.property("debug").as_deref(), Some("true"));
        assert_eq!(source.property("tag").as_deref(), Some("a,b"));
        assert_eq!(source.property(NON_OPTION_ARGS).as_deref(), Some("serve,input.txt,--"));
        assert_eq!(source.non_option_args().len(), 3);
    }

    #[test]
    fn system_environment_maps_dotted_keys() {
        let source = SystemEnvironmentPropertySource::from_vars([
            ("SERVER_PORT", "7000"),
            ("LOGGING_LEVEL", "debug"),
        ]);
        assert_eq!(source.property("server.port").as_deref(), Some("7000"));
        assert_eq!(source.property("logging.level").as_deref(), Some("debug"));
        assert_eq!(source.property("SERVER_PORT").as_deref(), Some("7000"));
        assert_eq!(source.property("missing"), None);
    }
}
