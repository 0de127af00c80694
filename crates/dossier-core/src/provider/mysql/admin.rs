//! Dossier creation and account management on a MySQL server.

use log::debug;

use super::MySqlOps;
use crate::{
    connect::{
        audit::{escape_literal, AUDIT_TABLE, ROLES_TABLE},
        Connect,
    },
    error::Result,
    meta::{DbMeta, Period},
    provider::{DossierAdmin, Password},
    template,
};

/// Hosts an account is declared for: local socket and remote clients.
const ACCOUNT_HOSTS: [&str; 2] = ["localhost", "%"];

impl MySqlOps {
    pub(crate) fn create_database_sql(database: &str) -> String {
        format!("CREATE DATABASE IF NOT EXISTS `{database}`")
    }

    fn service_tables_sql(database: &str) -> [String; 2] {
        [
            format!(
                "CREATE TABLE IF NOT EXISTS `{database}`.{AUDIT_TABLE} (\
                 AUD_ID INTEGER NOT NULL AUTO_INCREMENT PRIMARY KEY, \
                 AUD_STAMP TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                 AUD_QUERY TEXT NOT NULL)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS `{database}`.{ROLES_TABLE} (\
                 ROL_USER VARCHAR(128) NOT NULL PRIMARY KEY, \
                 ROL_IS_ADMIN INTEGER NOT NULL DEFAULT 0)"
            ),
        ]
    }
}

impl DossierAdmin for MySqlOps {
    fn create_storage(&self, cnx: &mut Connect, meta: &DbMeta, period: &Period) -> Result<()> {
        template::check_identifier("database", &period.storage)?;
        debug!(
            "Creating database '{}' for dossier '{}'",
            period.storage,
            meta.dossier_name()
        );
        cnx.query(&Self::create_database_sql(&period.storage), true)?;
        for sql in Self::service_tables_sql(&period.storage) {
            cnx.query(&sql, true)?;
        }
        Ok(())
    }

    fn grant_server_access(
        &self,
        cnx: &mut Connect,
        _meta: &DbMeta,
        period: &Period,
        account: &str,
        password: &Password,
    ) -> Result<()> {
        template::check_identifier("database", &period.storage)?;
        template::check_identifier("account", account)?;
        for host in ACCOUNT_HOSTS {
            cnx.query_sensitive(
                &format!(
                    "CREATE USER IF NOT EXISTS '{account}'@'{host}' IDENTIFIED BY '{}'",
                    escape_literal(password.expose())
                ),
                true,
            )?;
            cnx.query_unaudited(
                &format!(
                    "GRANT ALL ON `{}`.* TO '{account}'@'{host}' WITH GRANT OPTION",
                    period.storage
                ),
                true,
            )?;
        }
        cnx.query_unaudited("FLUSH PRIVILEGES", true)
    }

    fn insert_role_sql(&self, account: &str) -> String {
        format!(
            "INSERT IGNORE INTO {ROLES_TABLE} (ROL_USER) VALUES ('{}')",
            escape_literal(account)
        )
    }

    fn database_exists(&self, cnx: &mut Connect, database: &str) -> Result<bool> {
        let count = cnx.query_int(
            &format!(
                "SELECT COUNT(*) FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME='{}'",
                escape_literal(database)
            ),
            true,
        )?;
        Ok(count > 0)
    }
}
