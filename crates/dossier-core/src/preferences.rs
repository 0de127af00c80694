//! User overrides of the external command templates.

use crate::{error::Result, settings::SettingsStore};

/// Settings group of the application preferences.
pub const GROUP: &str = "preferences";

const BACKUP_COMMAND: &str = "backup-command";
const RESTORE_COMMAND: &str = "restore-command";
const ARCHIVE_COMMAND: &str = "archive-command";

/// Command templates configured by the user; `None` selects the provider
/// default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub backup_command: Option<String>,
    pub restore_command: Option<String>,
    pub archive_command: Option<String>,
}

impl Preferences {
    /// Reads the overrides; absent or empty keys read as `None`.
    pub fn load(settings: &dyn SettingsStore) -> Self {
        Self {
            backup_command: settings.get_string(GROUP, BACKUP_COMMAND),
            restore_command: settings.get_string(GROUP, RESTORE_COMMAND),
            archive_command: settings.get_string(GROUP, ARCHIVE_COMMAND),
        }
    }

    /// Writes the overrides back; `None` removes the key.
    pub fn save(&self, settings: &dyn SettingsStore) -> Result<()> {
        for (key, value) in [
            (BACKUP_COMMAND, &self.backup_command),
            (RESTORE_COMMAND, &self.restore_command),
            (ARCHIVE_COMMAND, &self.archive_command),
        ] {
            match value {
                Some(template) => settings.set_string(GROUP, key, template)?,
                None => settings.remove_key(GROUP, key)?,
            }
        }
        Ok(())
    }

    pub fn with_backup_command(mut self, template: impl Into<String>) -> Self {
        self.backup_command = Some(template.into());
        self
    }

    pub fn with_restore_command(mut self, template: impl Into<String>) -> Self {
        self.restore_command = Some(template.into());
        self
    }

    pub fn with_archive_command(mut self, template: impl Into<String>) -> Self {
        self.archive_command = Some(template.into());
        self
    }

    /// The backup template, or `default` when not overridden.
    pub fn backup_template<'a>(&'a self, default: &'a str) -> &'a str {
        self.backup_command.as_deref().unwrap_or(default)
    }

    pub fn restore_template<'a>(&'a self, default: &'a str) -> &'a str {
        self.restore_command.as_deref().unwrap_or(default)
    }

    pub fn archive_template<'a>(&'a self, default: &'a str) -> &'a str {
        self.archive_command.as_deref().unwrap_or(default)
    }
}
