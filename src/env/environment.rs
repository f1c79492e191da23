//! The application environment: property sources plus profiles.

use std::fmt::Display;
use std::str::FromStr;

use parking_lot::RwLock;

use crate::env::error::EnvError;
use crate::env::resolver::PlaceholderResolver;
use crate::env::source::PropertySources;

pub const DEFAULT_PROFILE: &str = "default";

/// Property lookup over ordered sources, with active and default profiles.
///
/// Property values have their `${key}` placeholders expanded against the
/// same environment; unresolvable ones are left as written.
pub struct Environment {
    sources: PropertySources,
    active: RwLock<Vec<String>>,
    defaults: RwLock<Vec<String>>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            sources: PropertySources::new(),
            active: RwLock::new(Vec::new()),
            defaults: RwLock::new(vec![DEFAULT_PROFILE.to_string()]),
        }
    }

    pub fn property_sources(&self) -> &PropertySources {
        &self.sources
    }

    /// The value as stored in the first source containing `key`.
    pub fn raw_property(&self, key: &str) -> Option<String> {
        self.sources.property(key)
    }

    /// The value of `key` with placeholders expanded.
    pub fn property(&self, key: &str) -> Option<String> {
        let raw = self.raw_property(key)?;
        let lookup = |k: &str| self.raw_property(k);
        let resolver = PlaceholderResolver::permissive(&lookup);
        Some(resolver.resolve_value_of(key, &raw).unwrap_or(raw))
    }

    pub fn contains_property(&self, key: &str) -> bool {
        self.raw_property(key).is_some()
    }

    /// The value of `key`; every placeholder in it must resolve.
    pub fn required_property(&self, key: &str) -> Result<String, EnvError> {
        let raw = self
            .raw_property(key)
            .ok_or_else(|| EnvError::MissingProperty(key.to_string()))?;
        let lookup = |k: &str| self.raw_property(k);
        PlaceholderResolver::strict(&lookup).resolve_value_of(key, &raw)
    }

    /// The value of `key` converted with `FromStr`; `Ok(None)` when absent.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, EnvError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.property(key) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| EnvError::Conversion {
                    key: key.to_string(),
                    value,
                    message: e.to_string(),
                }),
        }
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, EnvError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Expand placeholders in `text`, leaving unresolvable ones unchanged.
    pub fn resolve_placeholders(&self, text: &str) -> String {
        let lookup = |k: &str| self.raw_property(k);
        PlaceholderResolver::permissive(&lookup)
            .resolve(text)
            .unwrap_or_else(|_| text.to_string())
    }

    /// Expand placeholders in `text`; fails naming the first unresolvable key.
    pub fn resolve_required_placeholders(&self, text: &str) -> Result<String, EnvError> {
        let lookup = |k: &str| self.raw_property(k);
        PlaceholderResolver::strict(&lookup).resolve(text)
    }

    // ---- profiles ----

    pub fn active_profiles(&self) -> Vec<String> {
        self.active.read().clone()
    }

    /// Replace the active profiles. Blank names are ignored; duplicates
    /// collapse. Active profiles are removed from the defaults.
    pub fn set_active_profiles<I, S>(&self, profiles: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let profiles = normalize(profiles);
        self.defaults.write().retain(|p| !profiles.contains(p));
        *self.active.write() = profiles;
    }

    pub fn add_active_profile(&self, profile: &str) {
        let profile = profile.trim();
        if profile.is_empty() {
            return;
        }
        let mut active = self.active.write();
        if !active.iter().any(|p| p == profile) {
            active.push(profile.to_string());
        }
        self.defaults.write().retain(|p| p != profile);
    }

    pub fn default_profiles(&self) -> Vec<String> {
        self.defaults.read().clone()
    }

    /// Replace the default profiles, skipping any that are already active.
    pub fn set_default_profiles<I, S>(&self, profiles: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let active = self.active.read().clone();
        let mut profiles = normalize(profiles);
        profiles.retain(|p| !active.contains(p));
        *self.defaults.write() = profiles;
    }

    /// Active profiles, or the defaults when none are active.
    pub fn effective_profiles(&self) -> Vec<String> {
        let active = self.active_profiles();
        if active.is_empty() {
            self.default_profiles()
        } else {
            active
        }
    }

    /// True if any of `profiles` is effective.
    pub fn accepts_profiles(&self, profiles: &[&str]) -> bool {
        let effective = self.effective_profiles();
        profiles.iter().any(|p| effective.iter().any(|e| e == p))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("sources", &self.sources.names())
            .field("active_profiles", &self.active_profiles())
            .field("default_profiles", &self.default_profiles())
            .finish()
    }
}

fn normalize<I, S>(profiles: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for profile in profiles {
        let profile = profile.as_ref().trim();
        if !profile.is_empty() && !out.iter().any(|p| p == profile) {
            out.push(profile.to_string());
        }
    }
    out
}
