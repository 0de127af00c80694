//! Synchronous client handle over the sqlx MySQL driver.

use log::debug;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow},
    Connection, Executor, Row,
};
use tokio::runtime::{Builder, Runtime};

use crate::{
    connect::{Row as Fields, RowSet},
    provider::{Backend, ConnectTarget, Password},
};

const CLOSED: &str = "MySQL session is closed";

/// One MySQL session, driven on its own current-thread runtime.
///
/// Statements are sent without arguments, so the driver uses the text
/// protocol and every field comes back as text, which is what the mediator
/// hands out anyway.
pub struct MySqlBackend {
    runtime: Runtime,
    conn: Option<MySqlConnection>,
    last_error: String,
}

impl MySqlBackend {
    pub fn connect(
        target: &ConnectTarget,
        account: &str,
        password: &Password,
    ) -> Result<Self, String> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Unable to start the client event loop: {e}"))?;

        let mut options = MySqlConnectOptions::new()
            .username(account)
            .password(password.expose());
        if let Some(host) = target.server.host() {
            options = options.host(host);
        }
        if let Some(port) = target.server.port() {
            options = options.port(port);
        }
        if let Some(socket) = target.server.socket() {
            options = options.socket(socket);
        }
        if let Some(database) = target.database.as_deref() {
            options = options.database(database);
        }

        let conn = runtime
            .block_on(MySqlConnection::connect_with(&options))
            .map_err(|e| e.to_string())?;
        debug!("MySQL session opened on {}", target.server);

        Ok(Self {
            runtime,
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

impl Backend for MySqlBackend {
    fn execute(&mut self, sql: &str) -> Result<(), String> {
        let result = match self.conn.as_mut() {
            Some(conn) => self
                .runtime
                .block_on(conn.execute(sql))
                .map(|_| ())
                .map_err(|e| e.to_string()),
            None => Err(CLOSED.to_string()),
        };
        self.record(result)
    }

    fn fetch(&mut self, sql: &str) -> Result<RowSet, String> {
        let result = match self.conn.as_mut() {
            Some(conn) => self
                .runtime
                .block_on(conn.fetch_all(sql))
                .map_err(|e| e.to_string())
                .and_then(|rows| rows.iter().map(decode).collect()),
            None => Err(CLOSED.to_string()),
        };
        self.record(result)
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.close()) {
                debug!("MySQL session closed uncleanly: {e}");
            }
        }
    }
}

/// Fields of a text-protocol row, NULLs preserved.
fn decode(row: &MySqlRow) -> Result<Fields, String> {
    (0..row.len())
        .map(|i| {
            row.try_get_unchecked::<Option<Vec<u8>>, _>(i)
                .map(|field| field.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
                .map_err(|e| e.to_string())
        })
        .collect()
}

impl Drop for MySqlBackend {
    fn drop(&mut self) {
        self.close();
    }
}
