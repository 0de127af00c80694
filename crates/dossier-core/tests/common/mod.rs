#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use dossier_core::{
    provider::mysql::MySqlOps, Backend, ConnectTarget, Context, ContextBuilder, DbMeta,
    DossierAdmin, EditorParams, Lifecycle, MemorySettings, Password, Period, Preferences,
    Provider, ProviderRegistry, RowSet, ServerInfo, SettingsStore,
};
use tempfile::TempDir;

pub const FAKE_PROVIDER: &str = "FakeSQL";

/// Statement received by the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    pub account: String,
    pub database: Option<String>,
    pub sql: String,
}

#[derive(Default)]
struct ServerState {
    executed: Vec<Executed>,
    grants: HashMap<String, Vec<String>>,
}

/// A MySQL-like server whose databases are the subdirectories of a
/// temporary directory.
///
/// It understands just enough SQL for the dossier operations: database
/// creation and probing, grants, and `SHOW GRANTS`. Every other statement
/// succeeds unless it contains `FAIL`.
#[derive(Clone)]
pub struct FakeServer {
    root: PathBuf,
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            state: Arc::new(Mutex::new(ServerState::default())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_dir(&self, database: &str) -> PathBuf {
        self.root.join(database)
    }

    /// Creates a database holding one data file.
    pub fn seed_database(&self, database: &str) {
        let dir = self.database_dir(database);
        std::fs::create_dir_all(&dir).expect("Failed to create database dir");
        std::fs::write(dir.join("data"), database).expect("Failed to write data file");
    }

    pub fn add_grant(&self, account: &str, grant: &str) {
        self.lock()
            .grants
            .entry(account.to_string())
            .or_default()
            .push(grant.to_string());
    }

    pub fn grants(&self, account: &str) -> Vec<String> {
        self.lock().grants.get(account).cloned().unwrap_or_default()
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.lock().executed.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.sql).collect()
    }

    /// Audit rows written in `database`, in order.
    pub fn audited(&self, database: &str) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|e| e.database.as_deref() == Some(database))
            .filter(|e| e.sql.starts_with("INSERT INTO T_AUDIT"))
            .map(|e| e.sql)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("Fake server state poisoned")
    }
}

struct FakeBackend {
    server: FakeServer,
    account: String,
    database: Option<String>,
    last_error: String,
}

fn quoted_name(sql: &str, open: char, close: char) -> Option<&str> {
    let start = sql.find(open)? + 1;
    let len = sql[start..].find(close)?;
    Some(&sql[start..start + len])
}

impl Backend for FakeBackend {
    fn execute(&mut self, sql: &str) -> Result<(), String> {
        self.server.lock().executed.push(Executed {
            account: self.account.clone(),
            database: self.database.clone(),
            sql: sql.to_string(),
        });

        if sql.contains("FAIL") {
            self.last_error = format!("You have an error in your SQL syntax near '{sql}'");
            return Err(self.last_error.clone());
        }
        if sql.starts_with("CREATE DATABASE") {
            if let Some(name) = quoted_name(sql, '`', '`') {
                std::fs::create_dir_all(self.server.database_dir(name))
                    .map_err(|e| e.to_string())?;
            }
        }
        if sql.starts_with("GRANT ") {
            if let Some(account) = sql.split(" TO '").nth(1).and_then(|s| s.split('\'').next()) {
                self.server.add_grant(account, sql);
            }
        }
        self.last_error.clear();
        Ok(())
    }

    fn fetch(&mut self, sql: &str) -> Result<RowSet, String> {
        if sql.contains("INFORMATION_SCHEMA.SCHEMATA") {
            let name = quoted_name(sql, '\'', '\'').unwrap_or_default();
            let count = i32::from(self.server.database_dir(name).is_dir());
            return Ok(RowSet(vec![vec![Some(count.to_string())]]));
        }
        if sql.starts_with("SHOW GRANTS") {
            let mut lines = vec![format!("GRANT USAGE ON *.* TO '{}'@'%'", self.account)];
            lines.extend(self.server.grants(&self.account));
            return Ok(lines.into_iter().map(|l| vec![Some(l)]).collect());
        }
        Ok(RowSet::new())
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }
}

/// Provider talking to a [`FakeServer`] with the MySQL statements and
/// lifecycle.
pub struct FakeProvider {
    server: FakeServer,
    ops: MySqlOps,
}

impl FakeProvider {
    pub fn new(server: FakeServer) -> Self {
        Self {
            server,
            ops: MySqlOps,
        }
    }
}

impl Provider for FakeProvider {
    fn name(&self) -> &str {
        FAKE_PROVIDER
    }

    fn open(
        &self,
        target: &ConnectTarget,
        account: &str,
        password: &Password,
    ) -> Result<Box<dyn Backend>, String> {
        if password.expose() == "wrong" {
            return Err(format!("Access denied for user '{account}'"));
        }
        if let Some(database) = &target.database {
            if !self.server.database_dir(database).is_dir() {
                return Err(format!("Unknown database '{database}'"));
            }
        }
        Ok(Box::new(FakeBackend {
            server: self.server.clone(),
            account: account.to_string(),
            database: target.database.clone(),
            last_error: String::new(),
        }))
    }

    fn admin(&self) -> Option<&dyn DossierAdmin> {
        Some(&self.ops)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(&self.ops)
    }
}

/// A context on a fake server, with the given command templates.
pub struct FakeEnv {
    pub dir: TempDir,
    pub server: FakeServer,
    pub context: Context,
}

impl FakeEnv {
    pub fn new(preferences: impl FnOnce(&Path) -> Preferences) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().join("server");
        std::fs::create_dir_all(&root).expect("Failed to create server root");
        let server = FakeServer::new(&root);

        let settings = Arc::new(MemorySettings::new());
        preferences(dir.path())
            .save(settings.as_ref())
            .expect("Failed to save preferences");
        let context = ContextBuilder::new()
            .with_settings(settings)
            .with_registry(
                ProviderRegistry::new().with(Arc::new(FakeProvider::new(server.clone()))),
            )
            .build()
            .expect("Failed to build context");

        Self {
            dir,
            server,
            context,
        }
    }

    /// Records dossier "acme" with the given periods, the last one being
    /// current; each period database is seeded on the server.
    pub fn define_acme(&self, storages: &[&str]) -> DbMeta {
        let mut meta = self
            .context
            .directory()
            .define("acme", &EditorParams::new(FAKE_PROVIDER))
            .expect("Failed to define dossier");
        for (i, storage) in storages.iter().enumerate() {
            self.server.seed_database(storage);
            meta.add_period(Period::new(*storage).with_current(i + 1 == storages.len()))
                .expect("Failed to add period");
        }
        meta
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// A SQLite context whose dossiers live in a temporary directory.
pub fn sqlite_context() -> (TempDir, Context) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let settings = Arc::new(MemorySettings::new());
    let context = ContextBuilder::new()
        .with_settings(settings)
        .build()
        .expect("Failed to build context");
    (dir, context)
}

/// Defines dossier "acme" on SQLite and creates its first period with
/// "bob" as administrator.
pub fn create_sqlite_acme(context: &Context, dir: &Path) -> DbMeta {
    let editor = EditorParams::new("SQLite")
        .with_server(ServerInfo::default().with_host(dir.to_string_lossy()))
        .with_database("acme_1");
    let meta = context
        .directory()
        .define("acme", &editor)
        .expect("Failed to define dossier");

    let mut root = context.connect_for(&meta).expect("Failed to resolve provider");
    root.open_with_meta("root", &Password::new("root"), &meta, None)
        .expect("Failed to open server connection");
    root.create_dossier(&meta, "bob", &Password::new("bob"))
        .expect("Failed to create dossier");
    root.close();
    meta
}

pub fn settings_of(context: &Context) -> &dyn SettingsStore {
    context.settings().as_ref()
}
