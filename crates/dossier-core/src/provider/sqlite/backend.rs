//! rusqlite client handle.

use std::path::{Path, PathBuf};

use log::debug;
use rusqlite::{types::ValueRef, Connection, OpenFlags};

use crate::{
    connect::{Row, RowSet},
    provider::{Backend, ConnectTarget},
};

/// File holding `database` in the dossier directory `dir`.
pub fn database_file(dir: &Path, database: &str) -> PathBuf {
    dir.join(format!("{database}.sqlite"))
}

/// An SQLite session: an in-memory engine at server level, or the file of
/// one period.
pub struct SqliteBackend {
    conn: Option<Connection>,
    last_error: String,
}

impl SqliteBackend {
    /// Opens the file of the selected database, which must already exist;
    /// without a database, opens an in-memory engine.
    pub fn connect(target: &ConnectTarget) -> Result<Self, String> {
        let dir = target
            .server
            .host()
            .ok_or_else(|| "the SQLite provider needs a directory as host".to_string())?;

        let conn = match target.database.as_deref() {
            Some(database) => {
                let path = database_file(Path::new(dir), database);
                Connection::open_with_flags(
                    &path,
                    OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(|e| format!("{}: {e}", path.display()))?
            }
            None => Connection::open_in_memory().map_err(|e| e.to_string())?,
        };
        debug!("SQLite session opened in {dir}");

        Ok(Self {
            conn: Some(conn),
            last_error: String::new(),
        })
    }

    fn record<T>(&mut self, result: Result<T, String>) -> Result<T, String> {
        match &result {
            Ok(_) => self.last_error.clear(),
            Err(message) => self.last_error.clone_from(message),
        }
        result
    }
}

fn fetch_all(conn: &Connection, sql: &str) -> rusqlite::Result<RowSet> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut out = RowSet::new();
    while let Some(row) = rows.next()? {
        let mut fields: Row = Vec::with_capacity(width);
        for i in 0..width {
            fields.push(match row.get_ref(i)? {
                ValueRef::Null => None,
                ValueRef::Integer(v) => Some(v.to_string()),
                ValueRef::Real(v) => Some(v.to_string()),
                ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                    Some(String::from_utf8_lossy(bytes).into_owned())
                }
            });
        }
        out.0.push(fields);
    }
    Ok(out)
}

impl Backend for SqliteBackend {
    fn execute(&mut self, sql: &str) -> Result<(), String> {
        let result = match &self.conn {
            Some(conn) => conn.execute_batch(sql).map_err(|e| e.to_string()),
            None => Err("SQLite session is closed".to_string()),
        };
        self.record(result)
    }

    fn fetch(&mut self, sql: &str) -> Result<RowSet, String> {
        let result = match &self.conn {
            Some(conn) => fetch_all(conn, sql).map_err(|e| e.to_string()),
            None => Err("SQLite session is closed".to_string()),
        };
        self.record(result)
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                debug!("SQLite session closed uncleanly: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ServerInfo;
    use tempfile::TempDir;

    #[test]
    fn test_missing_database_is_not_created() {
        let dir = TempDir::new().unwrap();
        let target = ConnectTarget {
            server: ServerInfo::default().with_host(dir.path().to_string_lossy()),
            database: Some("acme_1".to_string()),
        };
        assert!(SqliteBackend::connect(&target).is_err());
        assert!(!database_file(dir.path(), "acme_1").exists());
    }

    #[test]
    fn test_fetch_nullable_fields() {
        let dir = TempDir::new().unwrap();
        let target = ConnectTarget {
            server: ServerInfo::default().with_host(dir.path().to_string_lossy()),
            database: None,
        };
        let mut backend = SqliteBackend::connect(&target).unwrap();
        let rows = backend.fetch("SELECT 1, NULL, 'x', 2.5").unwrap();
        assert_eq!(
            rows.into_inner(),
            vec![vec![
                Some("1".to_string()),
                None,
                Some("x".to_string()),
                Some("2.5".to_string())
            ]]
        );

        assert!(backend.execute("NOT SQL").is_err());
        assert!(!backend.last_error().is_empty());
        backend.execute("CREATE TABLE T (X)").unwrap();
        assert!(backend.last_error().is_empty());
    }
}
