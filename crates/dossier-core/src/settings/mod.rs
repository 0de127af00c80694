//! Group-oriented key/value settings store.
//!
//! Dossier metadata and application preferences are persisted in a store
//! addressed by `(group, key)`, much like an INI file. The storage layer only
//! depends on the [`SettingsStore`] trait; every getter returns an empty
//! value (`None` or an empty list) when the key is absent, never an error.
//!
//! Two implementations are provided:
//!
//! - [`JsonSettings`]: write-through JSON file, used by the application
//! - [`MemorySettings`]: process-local store, used by tests and tools

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod json;
pub mod memory;

pub use json::JsonSettings;
pub use memory::MemorySettings;

/// Shared handle on a settings store.
pub type SettingsHandle = Arc<dyn SettingsStore>;

/// A single persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i64),
    Text(String),
    List(Vec<String>),
}

/// Keys of one group.
pub type Group = BTreeMap<String, SettingValue>;

/// Synchronous group-oriented key/value store.
///
/// Implementations use interior mutability so that a single handle can be
/// shared between the dossier directory, the metadata objects and the
/// connections opened on them.
pub trait SettingsStore: Send + Sync {
    /// Returns a copy of the whole group, if it exists.
    fn group(&self, group: &str) -> Option<Group>;

    /// Replaces (or creates) a key in a group.
    fn set_value(&self, group: &str, key: &str, value: SettingValue) -> Result<()>;

    /// Removes a single key; absent keys are ignored.
    fn remove_key(&self, group: &str, key: &str) -> Result<()>;

    /// Removes the group and all its keys; absent groups are ignored.
    fn remove_group(&self, group: &str) -> Result<()>;

    /// Names of all recorded groups, sorted.
    fn groups(&self) -> Vec<String>;

    fn has_group(&self, group: &str) -> bool {
        self.group(group).is_some()
    }

    fn get_string(&self, group: &str, key: &str) -> Option<String> {
        match self.group(group)?.remove(key)? {
            SettingValue::Text(s) if !s.is_empty() => Some(s),
            SettingValue::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }

    fn get_int(&self, group: &str, key: &str) -> Option<i64> {
        match self.group(group)?.remove(key)? {
            SettingValue::Int(i) => Some(i),
            SettingValue::Text(s) => s.trim().parse().ok(),
            SettingValue::List(_) => None,
        }
    }

    fn get_string_list(&self, group: &str, key: &str) -> Vec<String> {
        match self.group(group).and_then(|mut g| g.remove(key)) {
            Some(SettingValue::List(list)) => list,
            Some(SettingValue::Text(s)) if !s.is_empty() => {
                s.split(';').map(str::to_string).collect()
            }
            _ => Vec::new(),
        }
    }

    fn set_string(&self, group: &str, key: &str, value: &str) -> Result<()> {
        self.set_value(group, key, SettingValue::Text(value.to_string()))
    }

    fn set_int(&self, group: &str, key: &str, value: i64) -> Result<()> {
        self.set_value(group, key, SettingValue::Int(value))
    }

    fn set_string_list(&self, group: &str, key: &str, values: &[String]) -> Result<()> {
        self.set_value(group, key, SettingValue::List(values.to_vec()))
    }
}
