//! In-memory settings store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{Group, SettingValue, SettingsStore};
use crate::error::Result;

/// Settings store which lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySettings {
    groups: Mutex<BTreeMap<String, Group>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Group>> {
        // a poisoned map is still structurally valid
        self.groups.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SettingsStore for MemorySettings {
    fn group(&self, group: &str) -> Option<Group> {
        self.lock().get(group).cloned()
    }

    fn set_value(&self, group: &str, key: &str, value: SettingValue) -> Result<()> {
        self.lock()
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove_key(&self, group: &str, key: &str) -> Result<()> {
        if let Some(g) = self.lock().get_mut(group) {
            g.remove(key);
        }
        Ok(())
    }

    fn remove_group(&self, group: &str) -> Result<()> {
        self.lock().remove(group);
        Ok(())
    }

    fn groups(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}
