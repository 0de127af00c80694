//! MySQL / MariaDB provider.
//!
//! Each financial period lives in its own database of the server. The
//! client side goes through sqlx; backup, restore and archive drive the
//! `mysql`, `mysqldump` and `gzip` command-line tools.
//!
//! The statements and command templates are carried by [`MySqlOps`], which
//! does not depend on the client library: any provider talking to a
//! MySQL-compatible server can reuse it through its own backend.

use jiff::civil::Date;

use super::{Backend, ConnectTarget, DossierAdmin, Lifecycle, Password, Provider};
use crate::meta::Period;

pub mod admin;
pub mod backend;
pub mod lifecycle;

pub use backend::MySqlBackend;
pub use lifecycle::{DEFAULT_ARCHIVE_COMMAND, DEFAULT_BACKUP_COMMAND, DEFAULT_RESTORE_COMMAND};

/// Administration and lifecycle operations of a MySQL-compatible server.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlOps;

/// The built-in MySQL provider.
#[derive(Debug, Default)]
pub struct MySqlProvider {
    ops: MySqlOps,
}

impl MySqlProvider {
    pub const NAME: &'static str = "MySQL";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Provider for MySqlProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn open(
        &self,
        target: &ConnectTarget,
        account: &str,
        password: &Password,
    ) -> Result<Box<dyn Backend>, String> {
        let backend = MySqlBackend::connect(target, account, password)?;
        Ok(Box::new(backend))
    }

    fn admin(&self) -> Option<&dyn DossierAdmin> {
        Some(&self.ops)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(&self.ops)
    }

    /// A period with no recorded bounds accepts any dates; otherwise the
    /// bounds must match exactly.
    fn is_period_suitable(&self, period: &Period, begin: Option<Date>, end: Option<Date>) -> bool {
        if period.begin.is_none() && period.end.is_none() {
            return true;
        }
        period.matches_dates(begin, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_capabilities() {
        let provider = MySqlProvider::new();
        assert_eq!(provider.name(), "MySQL");
        assert!(provider.admin().is_some());
        assert!(provider.lifecycle().is_some());
    }

    #[test]
    fn test_period_suitability() {
        let provider = MySqlProvider::new();
        let begin = date(2024, 1, 1);
        let end = date(2024, 12, 31);

        let open = Period::new("acme_1");
        assert!(provider.is_period_suitable(&open, Some(begin), Some(end)));

        let bounded = Period::new("acme_2").with_dates(Some(begin), Some(end));
        assert!(provider.is_period_suitable(&bounded, Some(begin), Some(end)));
        assert!(!provider.is_period_suitable(&bounded, Some(begin), None));
    }
}
