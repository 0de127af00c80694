//! Wiring of the registry, the settings store and the preferences.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jiff::civil::Date;
use log::debug;

use crate::{
    connect::Connect,
    error::{DossierError, Result},
    meta::{DbMeta, DossierDirectory, Period},
    preferences::Preferences,
    provider::ProviderRegistry,
    settings::{JsonSettings, SettingsHandle},
};

/// Builder for creating and configuring [`Context`] instances.
#[derive(Default)]
pub struct ContextBuilder {
    settings_path: Option<PathBuf>,
    settings: Option<SettingsHandle>,
    registry: Option<ProviderRegistry>,
}

impl ContextBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom settings file path.
    ///
    /// If not specified, uses XDG Base Directory specification:
    /// `$XDG_CONFIG_HOME/dossier/settings.json` or
    /// `~/.config/dossier/settings.json`
    pub fn with_settings_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.settings_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Uses an already opened settings store instead of a file.
    pub fn with_settings(mut self, settings: SettingsHandle) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Replaces the built-in providers.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the configured context.
    ///
    /// # Errors
    ///
    /// Returns `DossierError::XdgDirectory` if no default location exists
    /// Returns `DossierError::FileSystem` or `Serialization` if the settings
    /// file cannot be read
    pub fn build(self) -> Result<Context> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => {
                let path = match self.settings_path {
                    Some(path) => path,
                    None => Self::default_settings_path()?,
                };
                Arc::new(JsonSettings::open(path)?) as SettingsHandle
            }
        };
        let registry = self.registry.unwrap_or_else(ProviderRegistry::builtin);
        let preferences = Preferences::load(settings.as_ref());
        debug!("Providers available: {}", registry.list().join(", "));

        Ok(Context {
            registry,
            settings,
            preferences,
        })
    }

    fn default_settings_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("dossier")
            .place_config_file("settings.json")
            .map_err(|e| DossierError::XdgDirectory(e.to_string()))
    }
}

/// Everything the application needs to reach its dossiers.
pub struct Context {
    registry: ProviderRegistry,
    settings: SettingsHandle,
    preferences: Preferences,
}

impl Context {
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Replaces the command template overrides and persists them.
    pub fn set_preferences(&mut self, preferences: Preferences) -> Result<()> {
        preferences.save(self.settings.as_ref())?;
        self.preferences = preferences;
        Ok(())
    }

    pub fn directory(&self) -> DossierDirectory {
        DossierDirectory::new(Arc::clone(&self.settings))
    }

    /// A not yet opened connection through the provider of `meta`.
    pub fn connect_for(&self, meta: &DbMeta) -> Result<Connect> {
        if meta.provider_name().is_empty() {
            return Err(DossierError::ProviderNotDefined {
                dossier: meta.dossier_name().to_string(),
            });
        }
        let provider = self.registry.resolve(meta.provider_name())?;
        Ok(Connect::new(provider).with_preferences(self.preferences.clone()))
    }

    /// The period of `meta` its provider deems suitable for the given dates.
    pub fn period_for(
        &self,
        meta: &DbMeta,
        begin: Option<Date>,
        end: Option<Date>,
    ) -> Result<Option<Period>> {
        let provider = self.registry.resolve(meta.provider_name())?;
        Ok(meta.period_for(provider.as_ref(), begin, end).cloned())
    }

    /// A not yet opened connection through the named provider.
    pub fn connect_with(&self, provider: &str) -> Result<Connect> {
        let provider = self.registry.resolve(provider)?;
        Ok(Connect::new(provider).with_preferences(self.preferences.clone()))
    }
}
