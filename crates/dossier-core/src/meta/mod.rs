//! Persisted identity of a dossier and its financial periods.
//!
//! A [`DbMeta`] mirrors one group of the settings store. The group is named
//! after the dossier and records which DBMS provider serves it, where the
//! server lives and the list of financial periods, each one stored in its
//! own database:
//!
//! ```text
//! [acme]
//! provider          = "MySQL"
//! host              = "localhost"
//! port              = 3306
//! socket            = "/run/mysqld/mysqld.sock"
//! current-database  = "acme_2"
//! periods           = ["acme_1", "acme_2"]
//! period.acme_2.begin   = "2024-01-01"
//! period.acme_2.end     = "2024-12-31"
//! period.acme_2.current = 1
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! Unbound ──load_from_settings──▶ Loaded ──┐
//!    │                                     ├──remove──▶ Removed
//!    └─────define_from_editor───▶ Defined ─┘
//! ```
//!
//! Once removed, every mutating operation fails with
//! [`DossierError::MetaRemoved`]; the surrounding [`DossierDirectory`] is
//! expected to drop the value.

use std::fmt;
use std::path::PathBuf;

use jiff::civil::Date;
use log::{debug, info, warn};

use crate::{
    error::{DossierError, Result},
    preferences,
    provider::Provider,
    settings::{SettingsHandle, SettingsStore},
};

pub mod directory;
pub mod period;
pub mod server;

pub use directory::DossierDirectory;
pub use period::Period;
pub use server::{EditorParams, ServerInfo};

/// Settings keys of a dossier group.
pub mod keys {
    pub const PROVIDER: &str = "provider";
    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const SOCKET: &str = "socket";
    pub const CURRENT_DATABASE: &str = "current-database";
    pub const PERIODS: &str = "periods";

    pub fn period(storage: &str, field: &str) -> String {
        format!("period.{storage}.{field}")
    }
}

/// Whether `group` holds application settings rather than a dossier.
pub fn is_reserved(group: &str) -> bool {
    group == preferences::GROUP
}

/// Where a [`DbMeta`] stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaState {
    Unbound,
    Loaded,
    Defined,
    Removed,
}

/// Persisted identity of one dossier.
#[derive(Clone)]
pub struct DbMeta {
    dossier: String,
    provider: Option<String>,
    server: ServerInfo,
    settings: SettingsHandle,
    group: String,
    periods: Vec<Period>,
    state: MetaState,
}

impl fmt::Debug for DbMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbMeta")
            .field("dossier", &self.dossier)
            .field("provider", &self.provider)
            .field("server", &self.server)
            .field("group", &self.group)
            .field("periods", &self.periods)
            .field("state", &self.state)
            .finish()
    }
}

impl DbMeta {
    /// Creates an unbound metadata object for the given settings group.
    pub fn new(settings: SettingsHandle, group: impl Into<String>) -> Self {
        let group = group.into();
        Self {
            dossier: group.clone(),
            provider: None,
            server: ServerInfo::default(),
            settings,
            group,
            periods: Vec::new(),
            state: MetaState::Unbound,
        }
    }

    /// Reads an existing dossier from its settings group.
    pub fn load_from_settings(settings: SettingsHandle, group: &str) -> Result<Self> {
        let mut meta = Self::new(settings, group);
        meta.reload()?;
        Ok(meta)
    }

    /// Records the connection information of an editor into the settings
    /// group, creating the group if needed.
    ///
    /// When the editor names a database, it becomes the single, current
    /// period of the dossier.
    pub fn define_from_editor(
        editor: &EditorParams,
        settings: SettingsHandle,
        group: &str,
    ) -> Result<Self> {
        if group.trim().is_empty() {
            return Err(DossierError::invalid_input("dossier").with_reason("name is empty"));
        }
        if is_reserved(group) {
            return Err(DossierError::invalid_input("dossier")
                .with_reason(format!("'{group}' is reserved for application settings")));
        }
        if editor.provider.is_empty() {
            return Err(DossierError::ProviderNotDefined {
                dossier: group.to_string(),
            });
        }

        let previous = settings.get_string_list(group, keys::PERIODS);
        let mut meta = Self::new(settings, group);
        meta.provider = Some(editor.provider.clone());
        meta.server = editor.server.clone();
        meta.write_server()?;

        meta.periods.clear();
        if let Some(database) = editor.database.as_deref().filter(|d| !d.is_empty()) {
            meta.periods.push(
                Period::new(database)
                    .with_dates(editor.begin, editor.end)
                    .with_current(true),
            );
        }
        meta.write_periods(&previous)?;
        meta.state = MetaState::Defined;

        info!(
            "Dossier '{}' defined for provider {}",
            meta.dossier, editor.provider
        );
        Ok(meta)
    }

    /// Re-reads the whole group, replacing the previously held periods.
    pub fn reload(&mut self) -> Result<()> {
        self.ensure_not_removed()?;
        let settings = &self.settings;
        if !settings.has_group(&self.group) {
            return Err(DossierError::DossierNotDefined {
                name: self.group.clone(),
            });
        }

        let provider = settings
            .get_string(&self.group, keys::PROVIDER)
            .ok_or_else(|| DossierError::ProviderNotDefined {
                dossier: self.dossier.clone(),
            })?;

        let server = ServerInfo {
            host: settings.get_string(&self.group, keys::HOST),
            port: settings
                .get_int(&self.group, keys::PORT)
                .and_then(|p| u16::try_from(p).ok())
                .filter(|p| *p > 0),
            socket: settings.get_string(&self.group, keys::SOCKET).map(PathBuf::from),
        };

        let mut periods: Vec<Period> = settings
            .get_string_list(&self.group, keys::PERIODS)
            .into_iter()
            .filter(|id| !id.is_empty())
            .map(|id| self.read_period(&id))
            .collect();

        // a dossier recorded with a single database and no period list
        if periods.is_empty() {
            if let Some(database) = settings.get_string(&self.group, keys::CURRENT_DATABASE) {
                periods.push(Period::new(database).with_current(true));
            }
        }

        self.provider = Some(provider);
        self.server = server;
        self.periods = periods;
        self.state = MetaState::Loaded;
        debug!("Dossier '{}' loaded with {} periods", self.dossier, self.periods.len());
        Ok(())
    }

    /// Deletes the settings group of the dossier.
    ///
    /// Any connection opened on this dossier must have been closed first.
    pub fn remove(&mut self) -> Result<()> {
        self.ensure_not_removed()?;
        self.settings.remove_group(&self.group)?;
        self.periods.clear();
        self.state = MetaState::Removed;
        info!("Dossier '{}' removed", self.dossier);
        Ok(())
    }

    /// Records a new period.
    ///
    /// Adding a current period clears the flag on every other period.
    pub fn add_period(&mut self, period: Period) -> Result<()> {
        self.ensure_not_removed()?;
        if period.storage.is_empty() {
            return Err(DossierError::invalid_input("storage").with_reason("is empty"));
        }
        if self.period(&period.storage).is_some() {
            return Err(DossierError::invalid_input("storage")
                .with_reason(format!("'{}' is already recorded", period.storage)));
        }
        if period.current {
            self.clear_current();
        }
        debug!("Dossier '{}': adding period {}", self.dossier, period);
        self.periods.push(period);
        self.write_periods(&[])
    }

    /// Updates the flags and bounds of the period stored in `storage`.
    ///
    /// Making a period current clears the flag on every other period, so at
    /// most one period is ever current.
    pub fn update_period(
        &mut self,
        storage: &str,
        current: bool,
        begin: Option<Date>,
        end: Option<Date>,
    ) -> Result<()> {
        self.ensure_not_removed()?;
        let index = self.index_of(storage)?;
        if current {
            self.clear_current();
        }
        let period = &mut self.periods[index];
        period.current = current;
        period.begin = begin;
        period.end = end;
        debug!("Dossier '{}': updating period {}", self.dossier, period);
        self.write_periods(&[])
    }

    /// Forgets the period stored in `storage`.
    ///
    /// Removing the last remaining period removes the whole dossier.
    pub fn remove_period(&mut self, storage: &str) -> Result<()> {
        self.ensure_not_removed()?;
        let index = self.index_of(storage)?;
        if self.periods.len() == 1 {
            return self.remove();
        }
        let removed = self.periods.remove(index);
        debug!("Dossier '{}': removing period {}", self.dossier, removed);
        self.write_periods(&[removed.storage])
    }

    /// The current period, if any.
    pub fn current_period(&self) -> Option<&Period> {
        let mut current = self.periods.iter().filter(|p| p.current);
        let first = current.next();
        if current.next().is_some() {
            warn!("Dossier '{}' has more than one current period", self.dossier);
        }
        first
    }

    /// The first period `provider` deems suitable for the given dates.
    pub fn period_for(
        &self,
        provider: &dyn Provider,
        begin: Option<Date>,
        end: Option<Date>,
    ) -> Option<&Period> {
        self.period_for_with(begin, end, |p, b, e| provider.is_period_suitable(p, b, e))
    }

    /// The first period accepted by the `suitable` predicate.
    pub fn period_for_with<F>(
        &self,
        begin: Option<Date>,
        end: Option<Date>,
        suitable: F,
    ) -> Option<&Period>
    where
        F: Fn(&Period, Option<Date>, Option<Date>) -> bool,
    {
        self.periods.iter().find(|p| suitable(p, begin, end))
    }

    pub fn period(&self, storage: &str) -> Option<&Period> {
        self.periods.iter().find(|p| p.storage == storage)
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn dossier_name(&self) -> &str {
        &self.dossier
    }

    /// The provider name; empty while the metadata is unbound.
    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().unwrap_or_default()
    }

    pub fn server(&self) -> &ServerInfo {
        &self.server
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn state(&self) -> MetaState {
        self.state
    }

    pub fn is_removed(&self) -> bool {
        self.state == MetaState::Removed
    }

    fn ensure_not_removed(&self) -> Result<()> {
        if self.is_removed() {
            return Err(DossierError::MetaRemoved {
                dossier: self.dossier.clone(),
            });
        }
        Ok(())
    }

    fn index_of(&self, storage: &str) -> Result<usize> {
        self.periods
            .iter()
            .position(|p| p.storage == storage)
            .ok_or_else(|| DossierError::PeriodNotFound {
                storage: storage.to_string(),
            })
    }

    fn clear_current(&mut self) {
        for period in &mut self.periods {
            period.current = false;
        }
    }

    fn read_period(&self, storage: &str) -> Period {
        let settings = &self.settings;
        let date = |field: &str| {
            let key = keys::period(storage, field);
            let text = settings.get_string(&self.group, &key)?;
            match text.parse::<Date>() {
                Ok(date) => Some(date),
                Err(e) => {
                    warn!("Dossier '{}': ignoring invalid {key} '{text}': {e}", self.dossier);
                    None
                }
            }
        };
        Period {
            begin: date("begin"),
            end: date("end"),
            current: settings
                .get_int(&self.group, &keys::period(storage, "current"))
                .unwrap_or(0)
                != 0,
            storage: storage.to_string(),
        }
    }

    fn write_server(&self) -> Result<()> {
        let settings = &self.settings;
        let group = &self.group;
        settings.set_string(group, keys::PROVIDER, self.provider_name())?;
        match self.server.host() {
            Some(host) => settings.set_string(group, keys::HOST, host)?,
            None => settings.remove_key(group, keys::HOST)?,
        }
        match self.server.port() {
            Some(port) => settings.set_int(group, keys::PORT, i64::from(port))?,
            None => settings.remove_key(group, keys::PORT)?,
        }
        match self.server.socket() {
            Some(socket) => settings.set_string(group, keys::SOCKET, &socket.to_string_lossy())?,
            None => settings.remove_key(group, keys::SOCKET)?,
        }
        Ok(())
    }

    /// Persists the period list, dropping the keys of `forgotten` periods.
    fn write_periods(&self, forgotten: &[String]) -> Result<()> {
        let settings = &self.settings;
        let group = &self.group;

        for storage in forgotten {
            for field in ["begin", "end", "current"] {
                settings.remove_key(group, &keys::period(storage, field))?;
            }
        }

        for period in &self.periods {
            let storage = &period.storage;
            for (field, value) in [("begin", period.begin), ("end", period.end)] {
                let key = keys::period(storage, field);
                match value {
                    Some(date) => settings.set_string(group, &key, &date.to_string())?,
                    None => settings.remove_key(group, &key)?,
                }
            }
            settings.set_int(group, &keys::period(storage, "current"), i64::from(period.current))?;
        }

        let ids: Vec<String> = self.periods.iter().map(|p| p.storage.clone()).collect();
        settings.set_string_list(group, keys::PERIODS, &ids)?;

        match self.current_period() {
            Some(current) => settings.set_string(group, keys::CURRENT_DATABASE, &current.storage),
            None => settings.remove_key(group, keys::CURRENT_DATABASE),
        }
    }
}

impl fmt::Display for DbMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.dossier)?;
        writeln!(f)?;
        writeln!(f, "**Provider:** {}", self.provider_name())?;
        writeln!(f, "**Server:** {}", self.server)?;
        if self.periods.is_empty() {
            writeln!(f, "\nNo financial period recorded.")?;
        } else {
            writeln!(f, "\n## Periods\n")?;
            for period in &self.periods {
                writeln!(f, "- {period}")?;
            }
        }
        Ok(())
    }
}
