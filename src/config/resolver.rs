//! Locates profile-scoped config files and feeds them to the environment.
//!
//! # Responsibilities
//! - Enumerate `{name}-{profile}.{ext}` and `{name}.{ext}` in every location
//! - Parse each present file with the loader registered for its extension
//! - Insert the results into the environment below command-line arguments
//!
//! # Design Decisions
//! - Profile files outrank the default file; among profiles the last one
//!   listed wins; among locations the first one listed wins
//! - Missing files are skipped, files that fail to parse abort loading
//! - Locations and the config name can be overridden from the environment,
//!   so `--procyon.config.location=...` works from the command line

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::loader::{load_file, ConfigError, SourceLoader, TomlSourceLoader, YamlSourceLoader};
use crate::env::source::COMMAND_LINE_SOURCE_NAME;
use crate::env::{Environment, MapPropertySource, PropertySource};

pub const CONFIG_LOCATION_PROPERTY: &str = "procyon.config.location";
pub const CONFIG_NAME_PROPERTY: &str = "procyon.config.name";
pub const ACTIVE_PROFILES_PROPERTY: &str = "procyon.profiles.active";

pub const DEFAULT_CONFIG_LOCATION: &str = "./resources";
pub const DEFAULT_CONFIG_NAME: &str = "procyon";

#[derive(Clone)]
pub struct ConfigResolver {
    locations: Vec<PathBuf>,
    name: String,
    loaders: Vec<Arc<dyn SourceLoader>>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self {
            locations: vec![PathBuf::from(DEFAULT_CONFIG_LOCATION)],
            name: DEFAULT_CONFIG_NAME.to_string(),
            loaders: vec![Arc::new(YamlSourceLoader), Arc::new(TomlSourceLoader)],
        }
    }
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locations<I, P>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Register a loader; it is consulted after the built-in ones.
    pub fn with_loader(mut self, loader: impl SourceLoader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply location and name overrides found in `env`.
    pub fn configured_from(mut self, env: &Environment) -> Self {
        if let Some(locations) = env.property(CONFIG_LOCATION_PROPERTY) {
            let parsed: Vec<PathBuf> = locations
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(PathBuf::from)
                .collect();
            if !parsed.is_empty() {
                self.locations = parsed;
            }
        }
        if let Some(name) = env.property(CONFIG_NAME_PROPERTY) {
            if !name.trim().is_empty() {
                self.name = name.trim().to_string();
            }
        }
        self
    }

    /// Load every present config file for `profiles`, highest precedence
    /// first.
    pub fn resolve(&self, profiles: &[String]) -> Result<Vec<MapPropertySource>, ConfigError> {
        let mut sources = Vec::new();
        for profile in profiles.iter().rev() {
            let stem = format!("{}-{}", self.name, profile);
            self.load_stem(&stem, &mut sources)?;
        }
        self.load_stem(&self.name, &mut sources)?;
        Ok(sources)
    }

    fn load_stem(&self, stem: &str, sources: &mut Vec<MapPropertySource>) -> Result<(), ConfigError> {
        for location in &self.locations {
            for loader in &self.loaders {
                for ext in loader.extensions() {
                    let path = location.join(format!("{stem}.{ext}"));
                    if let Some(source) = self.load_path(&path, loader.as_ref())? {
                        sources.push(source);
                    }
                }
            }
        }
        Ok(())
    }

    fn load_path(
        &self,
        path: &Path,
        loader: &dyn SourceLoader,
    ) -> Result<Option<MapPropertySource>, ConfigError> {
        let loaded = load_file(path, loader)?;
        match &loaded {
            Some(source) => tracing::info!(
                path = %path.display(),
                properties = source.len(),
                "Config file loaded"
            ),
            None => tracing::trace!(path = %path.display(), "Config file not present"),
        }
        Ok(loaded)
    }

    /// Resolve profiles and files against `env` and insert the sources right
    /// after the command-line source (or first, when there is none).
    /// Returns the names of the sources added.
    pub fn load_into(&self, env: &Environment) -> Result<Vec<String>, ConfigError> {
        let resolver = self.clone().configured_from(env);

        if env.active_profiles().is_empty() {
            if let Some(profiles) = env.property(ACTIVE_PROFILES_PROPERTY) {
                env.set_active_profiles(profiles.split(','));
            }
        }
        let profiles = env.effective_profiles();
        let sources = resolver.resolve(&profiles)?;

        let property_sources = env.property_sources();
        let base = property_sources
            .index_of(COMMAND_LINE_SOURCE_NAME)
            .map(|i| i + 1)
            .unwrap_or(0);
        let mut names = Vec::with_capacity(sources.len());
        for (offset, source) in sources.into_iter().enumerate() {
            names.push(source.name().to_string());
            property_sources
                .add_at_index(base + offset, source)
                .map_err(|e| ConfigError::Binding {
                    key: CONFIG_LOCATION_PROPERTY.to_string(),
                    message: e.to_string(),
                })?;
        }

        tracing::debug!(
            profiles = ?profiles,
            locations = ?resolver.locations,
            sources = names.len(),
            "Config resolved"
        );
        Ok(names)
    }
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("locations", &self.locations)
            .field("name", &self.name)
            .field("loaders", &self.loaders.len())
            .finish()
    }
}
