//! Registry of the available DBMS providers.

use std::sync::Arc;

use log::debug;

use super::{MySqlProvider, Provider, SqliteProvider};
use crate::error::{DossierError, Result};

/// The providers known to the application.
///
/// The registry is built once at start-up and handed to whatever needs to
/// resolve a provider by name; it is never mutated afterwards.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the providers compiled into this crate.
    pub fn builtin() -> Self {
        Self::new()
            .with(Arc::new(MySqlProvider::new()))
            .with(Arc::new(SqliteProvider::new()))
    }

    /// Adds a provider; a provider of the same name is replaced in place.
    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        debug!("Registering DBMS provider {}", provider.name());
        match self
            .providers
            .iter_mut()
            .find(|p| p.name() == provider.name())
        {
            Some(slot) => *slot = provider,
            None => self.providers.push(provider),
        }
    }

    /// Looks a provider up by its exact, case-sensitive name.
    ///
    /// # Errors
    ///
    /// Returns `DossierError::ProviderNotFound` when no such provider is
    /// installed.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| DossierError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    /// Names of the registered providers, in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_providers() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.list(), vec!["MySQL", "SQLite"]);
        assert_eq!(registry.resolve("MySQL").unwrap().name(), "MySQL");
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let registry = ProviderRegistry::builtin();
        let err = registry.resolve("mysql").err().expect("lookup should fail");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ProviderRegistry::builtin();
        registry.register(Arc::new(SqliteProvider::new()));
        assert_eq!(registry.list(), vec!["MySQL", "SQLite"]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.list().is_empty());
        assert!(registry.resolve("MySQL").is_err());
    }
}
