//! Embedded SQLite provider.
//!
//! The "server" of a dossier is a directory (recorded as its host) and each
//! financial period is the file `<directory>/<database>.sqlite`. Accounts
//! and passwords are accepted and ignored.
//!
//! The provider supports dossier administration only; backup, restore and
//! archive are reported as unsupported.

use std::path::Path;

use log::debug;

use super::{Backend, ConnectTarget, DossierAdmin, Password, Provider};
use crate::{
    connect::{
        audit::{escape_literal, AUDIT_TABLE, ROLES_TABLE},
        Connect,
    },
    error::{DossierError, Result},
    meta::{DbMeta, Period},
    template,
};

pub mod backend;

pub use backend::{database_file, SqliteBackend};

/// Dossier administration of an SQLite directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteOps;

/// The built-in SQLite provider.
#[derive(Debug, Default)]
pub struct SqliteProvider {
    ops: SqliteOps,
}

impl SqliteProvider {
    pub const NAME: &'static str = "SQLite";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Provider for SqliteProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn open(
        &self,
        target: &ConnectTarget,
        _account: &str,
        _password: &Password,
    ) -> std::result::Result<Box<dyn Backend>, String> {
        Ok(Box::new(SqliteBackend::connect(target)?))
    }

    fn admin(&self) -> Option<&dyn DossierAdmin> {
        Some(&self.ops)
    }
}

fn directory(cnx: &Connect) -> Result<&Path> {
    cnx.server()
        .host()
        .map(Path::new)
        .ok_or_else(|| DossierError::Configuration {
            message: "the SQLite provider needs a directory as host".to_string(),
        })
}

impl DossierAdmin for SqliteOps {
    /// Attaches the new file to the in-memory server connection, which
    /// creates it, then lays out the service tables.
    fn create_storage(&self, cnx: &mut Connect, meta: &DbMeta, period: &Period) -> Result<()> {
        template::check_identifier("database", &period.storage)?;
        let dir = directory(cnx)?.to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| DossierError::FileSystem {
            path: dir.clone(),
            source: e,
        })?;

        let file = database_file(&dir, &period.storage);
        debug!(
            "Creating {} for dossier '{}'",
            file.display(),
            meta.dossier_name()
        );
        let schema = &period.storage;
        cnx.query(
            &format!(
                "ATTACH DATABASE '{}' AS \"{schema}\"",
                escape_literal(&file.to_string_lossy())
            ),
            true,
        )?;
        let created = cnx
            .query(
                &format!(
                    "CREATE TABLE IF NOT EXISTS \"{schema}\".{AUDIT_TABLE} (\
                     AUD_ID INTEGER PRIMARY KEY AUTOINCREMENT, \
                     AUD_STAMP TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                     AUD_QUERY TEXT NOT NULL)"
                ),
                true,
            )
            .and_then(|()| {
                cnx.query(
                    &format!(
                        "CREATE TABLE IF NOT EXISTS \"{schema}\".{ROLES_TABLE} (\
                         ROL_USER TEXT NOT NULL PRIMARY KEY, \
                         ROL_IS_ADMIN INTEGER NOT NULL DEFAULT 0)"
                    ),
                    true,
                )
            });
        let detached = cnx.query(&format!("DETACH DATABASE \"{schema}\""), true);
        created?;
        detached
    }

    /// Files have no access control.
    fn grant_server_access(
        &self,
        _cnx: &mut Connect,
        _meta: &DbMeta,
        period: &Period,
        account: &str,
        _password: &Password,
    ) -> Result<()> {
        debug!("No server access to grant to '{account}' on '{}'", period.storage);
        Ok(())
    }

    fn insert_role_sql(&self, account: &str) -> String {
        format!(
            "INSERT OR IGNORE INTO {ROLES_TABLE} (ROL_USER) VALUES ('{}')",
            escape_literal(account)
        )
    }

    fn database_exists(&self, cnx: &mut Connect, database: &str) -> Result<bool> {
        Ok(database_file(directory(cnx)?, database).exists())
    }
}
