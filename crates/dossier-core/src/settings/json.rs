//! JSON-file backed settings store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::debug;

use super::{Group, SettingValue, SettingsStore};
use crate::error::{DossierError, Result};

/// Settings store persisted as a single JSON document.
///
/// Every mutation rewrites the file, so the on-disk state always reflects
/// the last successful setter. The file is created on the first write.
#[derive(Debug)]
pub struct JsonSettings {
    path: PathBuf,
    groups: Mutex<BTreeMap<String, Group>>,
}

impl JsonSettings {
    /// Opens the settings file, or starts empty if it does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let groups = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| DossierError::FileSystem {
                path: path.clone(),
                source: e,
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        debug!("Settings loaded from {} ({} groups)", path.display(), groups.len());

        Ok(Self {
            path,
            groups: Mutex::new(groups),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Group>> {
        self.groups.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(&self, groups: &BTreeMap<String, Group>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| DossierError::FileSystem {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let content = serde_json::to_string_pretty(groups)?;
        fs::write(&self.path, content).map_err(|e| DossierError::FileSystem {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl SettingsStore for JsonSettings {
    fn group(&self, group: &str) -> Option<Group> {
        self.lock().get(group).cloned()
    }

    fn set_value(&self, group: &str, key: &str, value: SettingValue) -> Result<()> {
        let mut groups = self.lock();
        groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.flush(&groups)
    }

    fn remove_key(&self, group: &str, key: &str) -> Result<()> {
        let mut groups = self.lock();
        let removed = groups
            .get_mut(group)
            .and_then(|g| g.remove(key))
            .is_some();
        if removed {
            self.flush(&groups)?;
        }
        Ok(())
    }

    fn remove_group(&self, group: &str) -> Result<()> {
        let mut groups = self.lock();
        if groups.remove(group).is_some() {
            self.flush(&groups)?;
        }
        Ok(())
    }

    fn groups(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}
