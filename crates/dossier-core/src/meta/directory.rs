//! Collection of the dossiers recorded in the settings store.

use log::warn;

use super::{is_reserved, keys, DbMeta, EditorParams};
use crate::{
    error::{DossierError, Result},
    settings::{SettingsHandle, SettingsStore},
};

/// Directory of the dossiers known to the application.
///
/// A group of the settings store is a dossier when it names a provider;
/// other groups (application preferences for instance) are ignored.
#[derive(Clone)]
pub struct DossierDirectory {
    settings: SettingsHandle,
}

impl DossierDirectory {
    pub fn new(settings: SettingsHandle) -> Self {
        Self { settings }
    }

    /// Names of the recorded dossiers, sorted.
    pub fn names(&self) -> Vec<String> {
        self.settings
            .groups()
            .into_iter()
            .filter(|group| self.exists(group))
            .collect()
    }

    pub fn exists(&self, name: &str) -> bool {
        !is_reserved(name) && self.settings.get_string(name, keys::PROVIDER).is_some()
    }

    /// Loads one dossier by name.
    pub fn load(&self, name: &str) -> Result<DbMeta> {
        if is_reserved(name) || !self.settings.has_group(name) {
            return Err(DossierError::DossierNotDefined {
                name: name.to_string(),
            });
        }
        DbMeta::load_from_settings(self.settings.clone(), name)
    }

    /// Loads every dossier, skipping (and logging) the broken ones.
    pub fn load_all(&self) -> Vec<DbMeta> {
        self.names()
            .into_iter()
            .filter_map(|name| match self.load(&name) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    warn!("Ignoring dossier '{name}': {e}");
                    None
                }
            })
            .collect()
    }

    /// Records a new dossier; an existing dossier of the same name is an
    /// error.
    pub fn define(&self, name: &str, editor: &EditorParams) -> Result<DbMeta> {
        if self.exists(name) {
            return Err(DossierError::invalid_input("dossier")
                .with_reason(format!("'{name}' is already defined")));
        }
        DbMeta::define_from_editor(editor, self.settings.clone(), name)
    }

    /// Removes a dossier from the settings; the value is consumed so it
    /// cannot be used afterwards.
    pub fn remove(&self, mut meta: DbMeta) -> Result<()> {
        meta.remove()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{meta::ServerInfo, settings::MemorySettings};

    fn directory() -> DossierDirectory {
        let store = Arc::new(MemorySettings::new());
        store
            .set_string("preferences", "backup-command", "true")
            .unwrap();
        DossierDirectory::new(store)
    }

    #[test]
    fn test_define_list_remove() {
        let dir = directory();
        assert!(dir.names().is_empty());

        let editor = EditorParams::new("SQLite")
            .with_server(ServerInfo::default().with_host("/tmp"))
            .with_database("books");
        dir.define("books", &editor).expect("Failed to define dossier");
        assert_eq!(dir.names(), vec!["books".to_string()]);
        assert_eq!(dir.load_all().len(), 1);

        let meta = dir.load("books").unwrap();
        dir.remove(meta).unwrap();
        assert!(dir.names().is_empty());
        assert!(matches!(
            dir.load("books"),
            Err(DossierError::DossierNotDefined { .. })
        ));
    }

    #[test]
    fn test_preferences_group_is_not_a_dossier() {
        let dir = directory();
        let editor = EditorParams::new("SQLite").with_database("books");
        assert!(matches!(
            dir.define("preferences", &editor),
            Err(DossierError::InvalidInput { .. })
        ));
        assert!(matches!(
            dir.load("preferences"),
            Err(DossierError::DossierNotDefined { .. })
        ));

        // even a hand-edited provider key does not turn it into a dossier
        dir.settings
            .set_string("preferences", keys::PROVIDER, "SQLite")
            .unwrap();
        assert!(dir.names().is_empty());
        assert_eq!(
            dir.settings.get_string("preferences", "backup-command").as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_define_twice_is_rejected() {
        let dir = directory();
        let editor = EditorParams::new("SQLite").with_database("books");
        dir.define("books", &editor).unwrap();
        assert!(matches!(
            dir.define("books", &editor),
            Err(DossierError::InvalidInput { .. })
        ));
    }
}
