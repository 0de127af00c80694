//! Backup, restore and archive of MySQL databases.
//!
//! The heavy lifting is done by the command-line tools, rendered from the
//! templates below unless the user configured an override:
//!
//! | operation | tokens used              |
//! |-----------|--------------------------|
//! | backup    | `%O %U %P %B %F`         |
//! | restore   | `%O %U %P %B %F`         |
//! | archive   | `%O %U %P %B %N`         |

use std::path::Path;
use std::sync::Arc;

use jiff::civil::Date;
use log::{info, warn};

use super::MySqlOps;
use crate::{
    connect::Connect,
    error::{DossierError, Result},
    lifecycle::{self, next_database_name, rewrite_grant},
    meta::Period,
    provider::{DossierAdmin, Lifecycle, Password},
};

pub const DEFAULT_BACKUP_COMMAND: &str =
    "mysqldump --verbose %O --user=%U --password=%P %B | gzip -c > %F";

pub const DEFAULT_RESTORE_COMMAND: &str = "mysql %O --user=%U --password=%P \
     -e 'DROP DATABASE IF EXISTS %B; CREATE DATABASE %B' \
     && gzip -cd %F | mysql --verbose %O --user=%U --password=%P %B";

pub const DEFAULT_ARCHIVE_COMMAND: &str = "mysql %O --user=%U --password=%P \
     -e 'DROP DATABASE IF EXISTS %N; CREATE DATABASE %N' \
     && mysqldump %O --user=%U --password=%P %B | mysql %O --user=%U --password=%P %N";

const LOCK_TABLES: &str = "FLUSH TABLES WITH READ LOCK";
const UNLOCK_TABLES: &str = "UNLOCK TABLES";
const SHOW_GRANTS: &str = "SHOW GRANTS FOR CURRENT_USER()";

fn require_database(cnx: &Connect, operation: &str) -> Result<String> {
    cnx.database()
        .map(str::to_string)
        .ok_or_else(|| DossierError::Configuration {
            message: format!("{operation} requires a connection on a dossier period"),
        })
}

impl Lifecycle for MySqlOps {
    /// The tables stay read-locked while the dump runs; the lock is
    /// released whatever the outcome of the dump.
    fn backup(&self, cnx: &mut Connect, file: &Path) -> Result<()> {
        let database = require_database(cnx, "backup")?;
        let template = cnx
            .preferences()
            .backup_template(DEFAULT_BACKUP_COMMAND)
            .to_string();
        let params = cnx.command_params().with_file(file);

        info!("Backing up '{database}' to {}", file.display());
        cnx.query_unaudited(LOCK_TABLES, true)?;
        let dumped = lifecycle::run_once(cnx, &template, &params);
        let unlocked = cnx.query_unaudited(UNLOCK_TABLES, true);
        dumped?;
        unlocked
    }

    fn restore(
        &self,
        cnx: &mut Connect,
        period: &Period,
        file: &Path,
        admin_account: &str,
        admin_password: &Password,
    ) -> Result<()> {
        let template = cnx
            .preferences()
            .restore_template(DEFAULT_RESTORE_COMMAND)
            .to_string();

        // the drop in the pipeline fails on some servers when the database
        // is missing
        if !self.database_exists(cnx, &period.storage)? {
            cnx.query(&Self::create_database_sql(&period.storage), true)?;
        }

        let params = cnx
            .command_params()
            .with_database(&period.storage)
            .with_file(file);
        info!("Restoring '{}' from {}", period.storage, file.display());
        lifecycle::run_with_retry(cnx, &template, &params)?;

        cnx.grant_admin_credentials(Some(period), admin_account, admin_password)
    }

    fn archive_and_new(
        &self,
        cnx: &mut Connect,
        root_account: &str,
        root_password: &Password,
        begin_next: Option<Date>,
        end_next: Option<Date>,
    ) -> Result<Period> {
        let current = require_database(cnx, "archiving")?;
        let meta = cnx
            .meta()
            .cloned()
            .ok_or_else(|| DossierError::Configuration {
                message: "archiving requires a connection bound to a dossier".to_string(),
            })?;
        let template = cnx
            .preferences()
            .archive_template(DEFAULT_ARCHIVE_COMMAND)
            .to_string();

        let mut root =
            Connect::new(Arc::clone(cnx.provider())).with_preferences(cnx.preferences().clone());
        root.open_with_meta(root_account, root_password, &meta, None)?;

        let next = next_database_name(&current, |candidate| {
            self.database_exists(&mut root, candidate)
        })?;
        let params = root
            .command_params()
            .with_database(&current)
            .with_new_database(&next);
        info!("Archiving '{current}' and opening '{next}'");
        lifecycle::run_with_retry(cnx, &template, &params)?;

        let period = Period::new(&next)
            .with_dates(begin_next, end_next)
            .with_current(true);
        if let Some(meta) = cnx.meta_mut() {
            meta.add_period(period.clone())?;
        }

        let grants = cnx.query_rows(SHOW_GRANTS, true)?;
        for line in grants.first_column() {
            if let Some(grant) = rewrite_grant(line, &current, &next) {
                root.query_unaudited(&grant, true)?;
            }
        }
        if let Err(e) = root.query_unaudited("FLUSH PRIVILEGES", false) {
            warn!("Unable to reload privileges: {e}");
        }
        root.close();

        Ok(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        meta::ServerInfo,
        template::{render, render_redacted, CommandParams},
    };

    fn params() -> CommandParams {
        CommandParams::new(ServerInfo::default().with_host("db").with_port(3306))
            .with_database("acme_2")
            .with_new_database("acme_3")
            .with_file("/tmp/acme.gz")
            .with_credentials("root", Password::new("pw"))
    }

    #[test]
    fn test_default_backup_command() {
        assert_eq!(
            render(DEFAULT_BACKUP_COMMAND, &params()).unwrap(),
            "mysqldump --verbose --host=db --port=3306 --user=root --password=pw acme_2 \
             | gzip -c > /tmp/acme.gz"
        );
    }

    #[test]
    fn test_default_archive_command_is_redacted() {
        let shown = render_redacted(DEFAULT_ARCHIVE_COMMAND, &params()).unwrap();
        assert!(shown.contains("CREATE DATABASE acme_3"));
        assert!(shown.contains("--password=******"));
        assert!(!shown.contains("--password=pw"));
    }
}
