//! Pluggable DBMS providers.
//!
//! A [`Provider`] is a stateless capability object identified by a stable,
//! unlocalized name. Its only mandatory job is to open a [`Backend`], the
//! thin client-library handle the connection mediator talks to. Everything
//! else is optional and exposed as a capability:
//!
//! - [`DossierAdmin`]: create the storage of a new dossier and grant an
//!   administrative account
//! - [`Lifecycle`]: backup, restore and archive through external tools
//!
//! A provider which leaves a capability out makes the corresponding
//! [`Connect`](crate::connect::Connect) operation fail with
//! [`DossierError::Unsupported`](crate::error::DossierError::Unsupported).
//!
//! ```text
//! ┌──────────────────┐  resolve(name)  ┌──────────────┐  open()  ┌─────────┐
//! │ ProviderRegistry │────────────────▶│   Provider   │─────────▶│ Backend │
//! └──────────────────┘                 │ admin()?     │          └─────────┘
//!                                      │ lifecycle()? │
//!                                      └──────────────┘
//! ```

use std::fmt;
use std::path::Path;

use jiff::civil::Date;

use crate::{
    connect::{Connect, RowSet},
    error::Result,
    meta::{DbMeta, Period, ServerInfo},
};

pub mod mysql;
pub mod registry;
pub mod sqlite;

pub use mysql::MySqlProvider;
pub use registry::ProviderRegistry;
pub use sqlite::SqliteProvider;

/// A secret which never shows up in logs or debug output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub const MASK: &'static str = "******";

    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The clear text, for the backend and the rendered command line only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::MASK)
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::MASK)
    }
}

/// What a backend connection points at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectTarget {
    pub server: ServerInfo,
    /// Database to select; `None` for a server-level connection
    pub database: Option<String>,
}

/// Synchronous client-library handle of a DBMS.
///
/// Errors are reported as the backend message; the same text stays
/// available through [`Backend::last_error`] until the next statement.
pub trait Backend {
    /// Runs a statement which returns no rows.
    fn execute(&mut self, sql: &str) -> std::result::Result<(), String>;

    /// Runs a statement and returns its rows as nullable strings.
    fn fetch(&mut self, sql: &str) -> std::result::Result<RowSet, String>;

    /// Message of the last failure; empty when the last statement succeeded.
    fn last_error(&self) -> String;

    /// Releases the underlying handle.
    fn close(&mut self) {}
}

/// A DBMS backend plugin.
pub trait Provider: Send + Sync {
    /// Stable, unlocalized, case-sensitive name (e.g. `"MySQL"`).
    fn name(&self) -> &str;

    /// Opens a client handle on `target`.
    fn open(
        &self,
        target: &ConnectTarget,
        account: &str,
        password: &Password,
    ) -> std::result::Result<Box<dyn Backend>, String>;

    /// Dossier administration capability.
    fn admin(&self) -> Option<&dyn DossierAdmin> {
        None
    }

    /// Backup/restore/archive capability.
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }

    /// Whether `period` is the one bounded by `begin` and `end`.
    fn is_period_suitable(&self, period: &Period, begin: Option<Date>, end: Option<Date>) -> bool {
        period.matches_dates(begin, end)
    }
}

/// Dossier administration, run on privileged connections.
pub trait DossierAdmin {
    /// Creates the database of `period` and its service tables through a
    /// server-level connection.
    fn create_storage(&self, cnx: &mut Connect, meta: &DbMeta, period: &Period) -> Result<()>;

    /// Grants `account` full access to the database of `period` at the
    /// server level; the roles table is handled by the mediator.
    fn grant_server_access(
        &self,
        cnx: &mut Connect,
        meta: &DbMeta,
        period: &Period,
        account: &str,
        password: &Password,
    ) -> Result<()>;

    /// Statement inserting `account` in the roles table unless present.
    fn insert_role_sql(&self, account: &str) -> String;

    /// Whether `database` exists on the server of a server-level connection.
    fn database_exists(&self, cnx: &mut Connect, database: &str) -> Result<bool>;
}

/// Backup, restore and archive through the external DBMS tools.
pub trait Lifecycle {
    /// Dumps the database of the connection into `file`.
    fn backup(&self, cnx: &mut Connect, file: &Path) -> Result<()>;

    /// Replaces the database of `period` with the content of `file`; `cnx`
    /// is a privileged, server-level connection.
    fn restore(
        &self,
        cnx: &mut Connect,
        period: &Period,
        file: &Path,
        admin_account: &str,
        admin_password: &Password,
    ) -> Result<()>;

    /// Closes the current exercice of the connection and opens the next
    /// one in a copy of its database; returns the new period.
    fn archive_and_new(
        &self,
        cnx: &mut Connect,
        root_account: &str,
        root_password: &Password,
        begin_next: Option<Date>,
        end_next: Option<Date>,
    ) -> Result<Period>;
}
