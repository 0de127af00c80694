//! Server location and editor parameters.

use std::fmt;
use std::path::PathBuf;

use jiff::civil::Date;

/// Where the DBMS server of a dossier lives.
///
/// Every field is optional: an unset host means the backend default
/// (usually the local server), a zero port is treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<PathBuf>,
}

impl ServerInfo {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    /// Host, if set and not empty.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }

    /// Port, if set and positive.
    pub fn port(&self) -> Option<u16> {
        self.port.filter(|p| *p > 0)
    }

    /// Socket path, if set and not empty.
    pub fn socket(&self) -> Option<&std::path::Path> {
        self.socket
            .as_deref()
            .filter(|s| !s.as_os_str().is_empty())
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host().unwrap_or("localhost"))?;
        if let Some(port) = self.port() {
            write!(f, ":{port}")?;
        }
        if let Some(socket) = self.socket() {
            write!(f, " ({})", socket.display())?;
        }
        Ok(())
    }
}

/// Connection information gathered by a provider-specific editor.
///
/// This is what a "new dossier" form collects: which provider to use,
/// where its server is, and optionally the database and bounds of the
/// first financial period.
#[derive(Debug, Clone, Default)]
pub struct EditorParams {
    pub provider: String,
    pub server: ServerInfo,
    pub database: Option<String>,
    pub begin: Option<Date>,
    pub end: Option<Date>,
}

impl EditorParams {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    pub fn with_server(mut self, server: ServerInfo) -> Self {
        self.server = server;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_dates(mut self, begin: Option<Date>, end: Option<Date>) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_values_are_filtered() {
        let server = ServerInfo {
            host: Some(String::new()),
            port: Some(0),
            socket: Some(PathBuf::new()),
        };
        assert_eq!(server.host(), None);
        assert_eq!(server.port(), None);
        assert_eq!(server.socket(), None);
        assert_eq!(server.to_string(), "localhost");
    }

    #[test]
    fn test_display_full() {
        let server = ServerInfo::default()
            .with_host("db.example.org")
            .with_port(3307)
            .with_socket("/run/mysqld/mysqld.sock");
        assert_eq!(
            server.to_string(),
            "db.example.org:3307 (/run/mysqld/mysqld.sock)"
        );
    }
}
