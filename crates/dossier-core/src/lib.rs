//! Storage access layer for accounting dossiers.
//!
//! A dossier is an accounting file whose financial periods (exercices) are
//! each stored in a database of some DBMS. This crate provides:
//!
//! - a registry of pluggable DBMS [providers](provider) (MySQL and SQLite
//!   are built in)
//! - the persisted [metadata](meta) of each dossier and of its periods
//! - a [connection mediator](connect) which audits every mutating statement
//! - backup, restore and archiving through external tools, rendered from
//!   [command templates](template) and run by the [process](process)
//!   orchestrator
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dossier_core::{ContextBuilder, EditorParams, Password, ServerInfo};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ContextBuilder::new().build()?;
//!
//! // Record a dossier served by a local MySQL server
//! let editor = EditorParams::new("MySQL")
//!     .with_server(ServerInfo::default().with_host("localhost"))
//!     .with_database("acme_1");
//! let meta = context.directory().define("acme", &editor)?;
//!
//! // Create its database as root, with "bob" as administrator
//! let mut root = context.connect_for(&meta)?;
//! root.open_with_meta("root", &Password::new("secret"), &meta, None)?;
//! root.create_dossier(&meta, "bob", &Password::new("bob-secret"))?;
//! root.close();
//!
//! // Work on the current period
//! let mut cnx = context.connect_for(&meta)?;
//! cnx.open_with_meta("bob", &Password::new("bob-secret"), &meta, meta.current_period())?;
//! let count = cnx.query_int("SELECT COUNT(*) FROM T_AUDIT", true)?;
//! println!("{count} statements audited");
//! # Ok(())
//! # }
//! ```

pub mod connect;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod meta;
pub mod preferences;
pub mod process;
pub mod provider;
pub mod settings;
pub mod template;

// Re-export commonly used types
pub use connect::{Connect, Row, RowSet};
pub use context::{Context, ContextBuilder};
pub use error::{DossierError, Result, ResultExt};
pub use meta::{DbMeta, DossierDirectory, EditorParams, MetaState, Period, ServerInfo};
pub use preferences::Preferences;
pub use process::{Callbacks, Captured, Discard, ExitOutcome, Orchestrator, OutputSink};
pub use provider::{
    Backend, ConnectTarget, DossierAdmin, Lifecycle, MySqlProvider, Password, Provider,
    ProviderRegistry, SqliteProvider,
};
pub use settings::{JsonSettings, MemorySettings, SettingValue, SettingsHandle, SettingsStore};
pub use template::CommandParams;
