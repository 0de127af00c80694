//! Connection mediator.
//!
//! A [`Connect`] is a handle on one dossier period (or on the server of a
//! dossier) through a provider. All application queries go through it so
//! that every mutating statement is recorded in the audit table of the
//! dossier database, right after the statement itself and on the same
//! backend handle.
//!
//! ## Lifecycle
//!
//! ```text
//! new ──open_with_editor / open_with_meta──▶ open ──close──▶ (consumed)
//! ```
//!
//! A connection is opened at most once; a second open request fails with
//! [`DossierError::AlreadyConnected`]. [`Connect::close`] consumes the value,
//! so a closed connection cannot be used again.
//!
//! Operations which need a second, independent connection (dossier
//! creation, administrative grants, archiving) open their own instead of
//! sharing this one.

use std::fmt;
use std::sync::Arc;

use jiff::civil::Date;
use log::{debug, error, info, warn};

use crate::{
    error::{DossierError, Result},
    lifecycle,
    meta::{DbMeta, EditorParams, Period, ServerInfo},
    preferences::Preferences,
    process::{Discard, ExitOutcome, Orchestrator, OutputSink},
    provider::{Backend, ConnectTarget, DossierAdmin, Lifecycle, Password, Provider},
    template::{self, CommandParams},
};

pub mod audit;
pub mod rows;

pub use rows::{Row, RowSet};

enum State {
    Idle,
    Open(Box<dyn Backend>),
}

/// A connection to a dossier period, or to its server.
pub struct Connect {
    provider: Arc<dyn Provider>,
    preferences: Preferences,
    monitor: Option<Box<dyn OutputSink>>,
    meta: Option<DbMeta>,
    period: Option<Period>,
    target: ConnectTarget,
    account: Option<String>,
    password: Option<Password>,
    state: State,
}

impl fmt::Debug for Connect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connect")
            .field("provider", &self.provider.name())
            .field("dossier", &self.meta.as_ref().map(DbMeta::dossier_name))
            .field("target", &self.target)
            .field("account", &self.account)
            .field("password", &self.password)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Connect {
    /// A new, not yet opened connection through `provider`.
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            preferences: Preferences::default(),
            monitor: None,
            meta: None,
            period: None,
            target: ConnectTarget::default(),
            account: None,
            password: None,
            state: State::Idle,
        }
    }

    /// Command template overrides used by backup, restore and archive.
    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Shows the output of external tools live (verbose mode); without a
    /// monitor they run silently.
    pub fn with_monitor(mut self, monitor: Box<dyn OutputSink>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Opens with raw parameters gathered by an editor.
    ///
    /// With `server_only`, no database is selected, which is what
    /// administrative operations need.
    pub fn open_with_editor(
        &mut self,
        account: &str,
        password: &Password,
        editor: &EditorParams,
        server_only: bool,
    ) -> Result<()> {
        if !editor.provider.is_empty() && editor.provider != self.provider.name() {
            warn!(
                "Editor was filled for provider {} but the connection uses {}",
                editor.provider,
                self.provider.name()
            );
        }
        let target = ConnectTarget {
            server: editor.server.clone(),
            database: if server_only {
                None
            } else {
                editor.database.clone()
            },
        };
        self.open(target, account, password, None, None)
    }

    /// Opens on `period` of `meta`, or at server level when `period` is
    /// `None`.
    pub fn open_with_meta(
        &mut self,
        account: &str,
        password: &Password,
        meta: &DbMeta,
        period: Option<&Period>,
    ) -> Result<()> {
        if meta.is_removed() {
            return Err(DossierError::MetaRemoved {
                dossier: meta.dossier_name().to_string(),
            });
        }
        if meta.provider_name() != self.provider.name() {
            return Err(DossierError::Configuration {
                message: format!(
                    "dossier '{}' is served by {}, not by {}",
                    meta.dossier_name(),
                    meta.provider_name(),
                    self.provider.name()
                ),
            });
        }
        let target = ConnectTarget {
            server: meta.server().clone(),
            database: period.map(|p| p.storage.clone()),
        };
        self.open(target, account, password, Some(meta.clone()), period.cloned())
    }

    fn open(
        &mut self,
        target: ConnectTarget,
        account: &str,
        password: &Password,
        meta: Option<DbMeta>,
        period: Option<Period>,
    ) -> Result<()> {
        if self.is_open() {
            return Err(DossierError::AlreadyConnected);
        }

        let dossier = meta
            .as_ref()
            .map(|m| m.dossier_name().to_string())
            .unwrap_or_default();
        let database = target.database.clone().unwrap_or_default();
        debug!(
            "Opening {} connection on '{}' (server={}, database={}, account={})",
            self.provider.name(),
            dossier,
            target.server,
            database,
            account
        );

        let backend = self
            .provider
            .open(&target, account, password)
            .map_err(|message| DossierError::Connection {
                dossier,
                provider: self.provider.name().to_string(),
                database,
                account: account.to_string(),
                message,
            })?;

        info!(
            "Connected to {} as {} ({})",
            self.provider.name(),
            account,
            target.database.as_deref().unwrap_or("server level")
        );
        self.state = State::Open(backend);
        self.target = target;
        self.account = Some(account.to_string());
        self.password = Some(password.clone());
        self.meta = meta;
        self.period = period;
        Ok(())
    }

    /// Executes a statement which returns no rows, then records it in the
    /// audit table of the dossier database.
    ///
    /// A failure of the audit insert is logged but does not fail the
    /// statement, which has already been applied. Server-level connections
    /// have no audit table and record nothing.
    pub fn query(&mut self, sql: &str, display_error: bool) -> Result<()> {
        self.execute(sql, display_error, true, true)
    }

    /// Executes a statement which must not reach the audit table (locks,
    /// privilege management).
    pub fn query_unaudited(&mut self, sql: &str, display_error: bool) -> Result<()> {
        self.execute(sql, display_error, false, true)
    }

    /// Same as [`Connect::query_unaudited`], and the statement text is kept
    /// out of the logs and error messages because it carries credentials.
    pub fn query_sensitive(&mut self, sql: &str, display_error: bool) -> Result<()> {
        self.execute(sql, display_error, false, false)
    }

    fn execute(&mut self, sql: &str, display_error: bool, audit: bool, loggable: bool) -> Result<()> {
        let audited = audit && self.target.database.is_some();
        let shown = if loggable { sql } else { "<redacted statement>" };
        let backend = self.backend_mut()?;

        debug!("Executing: {shown}");
        if let Err(message) = backend.execute(sql) {
            let err = DossierError::query(shown).with_message(message);
            report(&err, display_error);
            return Err(err);
        }

        if audited {
            if let Err(message) = backend.execute(&audit::audit_statement(sql)) {
                warn!("Unable to audit statement: {message}");
            }
        }
        Ok(())
    }

    /// Executes a statement which returns rows.
    ///
    /// An empty result is a valid outcome, not an error.
    pub fn query_rows(&mut self, sql: &str, display_error: bool) -> Result<RowSet> {
        let backend = self.backend_mut()?;
        debug!("Fetching: {sql}");
        backend.fetch(sql).map_err(|message| {
            let err = DossierError::query(sql).with_message(message);
            report(&err, display_error);
            err
        })
    }

    /// The first column of the first row as an integer, 0 when the result
    /// is empty or not numeric.
    pub fn query_int(&mut self, sql: &str, display_error: bool) -> Result<i64> {
        let rows = self.query_rows(sql, display_error)?;
        Ok(rows
            .first_field()
            .and_then(|field| field.trim().parse().ok())
            .unwrap_or(0))
    }

    /// Backend message of the last failure; empty when there is nothing to
    /// report.
    pub fn last_error(&self) -> String {
        match &self.state {
            State::Open(backend) => backend.last_error(),
            State::Idle => String::new(),
        }
    }

    /// Whether `database` exists on the server of this connection.
    pub fn database_exists(&mut self, database: &str) -> Result<bool> {
        self.ensure_open()?;
        let provider = Arc::clone(&self.provider);
        let admin = admin_capability(provider.as_ref(), "database probing")?;
        admin.database_exists(self, database)
    }

    /// Creates the storage of the current period of `meta` and grants
    /// `admin_account` the administrator role on it.
    ///
    /// The connection must be opened at server level with privileged
    /// credentials.
    pub fn create_dossier(
        &mut self,
        meta: &DbMeta,
        admin_account: &str,
        admin_password: &Password,
    ) -> Result<()> {
        self.ensure_server_level("create a dossier")?;
        let provider = Arc::clone(&self.provider);
        let admin = admin_capability(provider.as_ref(), "dossier creation")?;
        let period = meta
            .current_period()
            .cloned()
            .ok_or_else(|| DossierError::Configuration {
                message: format!("dossier '{}' has no current period", meta.dossier_name()),
            })?;

        template::check_identifier("database", &period.storage)?;
        info!(
            "Creating storage '{}' of dossier '{}'",
            period.storage,
            meta.dossier_name()
        );
        admin.create_storage(self, meta, &period)?;
        self.grant_admin(admin, meta, &period, admin_account, admin_password)
    }

    /// Ensures `account` is an administrator of `period` (the current
    /// period of the bound dossier when `None`).
    ///
    /// The roles row is inserted when absent and its flag then updated
    /// unconditionally, so the operation is correct whether or not the row
    /// already existed.
    pub fn grant_admin_credentials(
        &mut self,
        period: Option<&Period>,
        account: &str,
        password: &Password,
    ) -> Result<()> {
        let provider = Arc::clone(&self.provider);
        let admin = admin_capability(provider.as_ref(), "administrative grants")?;
        let meta = self.bound_meta()?.clone();
        let period = resolve_period(&meta, period)?;
        self.grant_admin(admin, &meta, &period, account, password)
    }

    fn grant_admin(
        &mut self,
        admin: &dyn DossierAdmin,
        meta: &DbMeta,
        period: &Period,
        account: &str,
        password: &Password,
    ) -> Result<()> {
        self.ensure_open()?;
        template::check_identifier("account", account)?;
        admin.grant_server_access(self, meta, period, account, password)?;

        let mut scoped = Connect::new(Arc::clone(&self.provider))
            .with_preferences(self.preferences.clone());
        let own_password = self.password.clone().unwrap_or_default();
        scoped.open_with_meta(self.account(), &own_password, meta, Some(period))?;
        scoped.query(&admin.insert_role_sql(account), true)?;
        scoped.query(&audit::set_admin_statement(account), true)?;
        scoped.close();

        info!(
            "Account '{}' is administrator of '{}'",
            account, period.storage
        );
        Ok(())
    }

    /// Dumps the database of this connection into the file at `uri`.
    pub fn backup(&mut self, uri: &str) -> Result<()> {
        self.ensure_open()?;
        let provider = Arc::clone(&self.provider);
        let ops = lifecycle_capability(provider.as_ref(), "backup")?;
        ops.backup(self, &lifecycle::file_path(uri))
    }

    /// Restores the file at `uri` into `period` (the current period when
    /// `None`), then grants `admin_account` on it.
    ///
    /// The connection must be a privileged, server-level connection bound
    /// to the dossier, and the target database must not be in use.
    pub fn restore(
        &mut self,
        period: Option<&Period>,
        uri: &str,
        admin_account: &str,
        admin_password: &Password,
    ) -> Result<()> {
        self.ensure_server_level("restore a dossier")?;
        let provider = Arc::clone(&self.provider);
        let ops = lifecycle_capability(provider.as_ref(), "restore")?;
        let meta = self.bound_meta()?.clone();
        let period = resolve_period(&meta, period)?;
        ops.restore(
            self,
            &period,
            &lifecycle::file_path(uri),
            admin_account,
            admin_password,
        )
    }

    /// Closes the exercice of this connection and opens the next one in a
    /// new database; the new period is recorded in the dossier settings and
    /// returned.
    pub fn archive_and_new(
        &mut self,
        root_account: &str,
        root_password: &Password,
        begin_next: Option<Date>,
        end_next: Option<Date>,
    ) -> Result<Period> {
        self.ensure_open()?;
        let provider = Arc::clone(&self.provider);
        let ops = lifecycle_capability(provider.as_ref(), "archiving")?;
        ops.archive_and_new(self, root_account, root_password, begin_next, end_next)
    }

    /// Renders `template` and runs it through the shell, showing the output
    /// on the monitor when there is one.
    pub fn run_command(&mut self, template: &str, params: &CommandParams) -> Result<ExitOutcome> {
        let command = template::render(template, params)?;
        let display = template::render_redacted(template, params)?;
        info!("Running: {display}");

        let orchestrator = Orchestrator::new()?;
        let outcome = match self.monitor.as_deref_mut() {
            Some(monitor) => orchestrator.run_logged(&command, &display, monitor)?,
            None => orchestrator.run_logged(&command, &display, &mut Discard)?,
        };
        if !outcome.success() {
            warn!("'{display}' {outcome}");
        }
        Ok(outcome)
    }

    /// Template parameters describing this connection: server, database
    /// and credentials.
    pub fn command_params(&self) -> CommandParams {
        let mut params = CommandParams::new(self.target.server.clone());
        params.database = self.target.database.clone();
        params.account = self.account.clone();
        params.password = self.password.clone();
        params
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn meta(&self) -> Option<&DbMeta> {
        self.meta.as_ref()
    }

    /// Mutable access to the bound dossier, for operations which record new
    /// periods.
    pub fn meta_mut(&mut self) -> Option<&mut DbMeta> {
        self.meta.as_mut()
    }

    pub fn period(&self) -> Option<&Period> {
        self.period.as_ref()
    }

    pub fn server(&self) -> &ServerInfo {
        &self.target.server
    }

    /// Selected database; `None` at server level or before opening.
    pub fn database(&self) -> Option<&str> {
        self.target.database.as_deref()
    }

    /// Account of the connection; empty before opening.
    pub fn account(&self) -> &str {
        self.account.as_deref().unwrap_or_default()
    }

    pub fn password(&self) -> Option<&Password> {
        self.password.as_ref()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Releases the backend and every reference held by the connection.
    ///
    /// Closing never touches the dossier settings.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let State::Open(mut backend) = std::mem::replace(&mut self.state, State::Idle) {
            backend.close();
            info!(
                "Disconnected from {} ({})",
                self.provider.name(),
                self.target.database.as_deref().unwrap_or("server level")
            );
        }
        self.meta = None;
        self.period = None;
        self.password = None;
    }

    fn backend_mut(&mut self) -> Result<&mut Box<dyn Backend>> {
        match &mut self.state {
            State::Open(backend) => Ok(backend),
            State::Idle => Err(DossierError::NotConnected),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DossierError::NotConnected)
        }
    }

    fn ensure_server_level(&self, action: &str) -> Result<()> {
        self.ensure_open()?;
        if self.target.database.is_some() {
            return Err(DossierError::Configuration {
                message: format!("a server-level connection is required to {action}"),
            });
        }
        Ok(())
    }

    fn bound_meta(&self) -> Result<&DbMeta> {
        self.meta.as_ref().ok_or_else(|| DossierError::Configuration {
            message: "the connection is not bound to a dossier".to_string(),
        })
    }
}

impl Drop for Connect {
    fn drop(&mut self) {
        self.release();
    }
}

fn report(err: &DossierError, display_error: bool) {
    if display_error {
        error!("{err}");
    } else {
        debug!("{err}");
    }
}

fn admin_capability<'a>(
    provider: &'a dyn Provider,
    operation: &'static str,
) -> Result<&'a dyn DossierAdmin> {
    provider.admin().ok_or_else(|| {
        warn!("{} does not support {operation}", provider.name());
        DossierError::unsupported(provider.name(), operation)
    })
}

fn lifecycle_capability<'a>(
    provider: &'a dyn Provider,
    operation: &'static str,
) -> Result<&'a dyn Lifecycle> {
    provider.lifecycle().ok_or_else(|| {
        warn!("{} does not support {operation}", provider.name());
        DossierError::unsupported(provider.name(), operation)
    })
}

fn resolve_period(meta: &DbMeta, period: Option<&Period>) -> Result<Period> {
    match period {
        Some(period) => Ok(period.clone()),
        None => meta
            .current_period()
            .cloned()
            .ok_or_else(|| DossierError::Configuration {
                message: format!("dossier '{}' has no current period", meta.dossier_name()),
            }),
    }
}
