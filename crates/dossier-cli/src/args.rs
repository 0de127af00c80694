//! Command-line arguments.
//!
//! Arguments stay free of core types where a conversion is needed; each
//! wrapper converts into the matching core value explicitly:
//!
//! ```text
//! User Input → CLI Args (clap) → Core Params → Connect / DbMeta
//! ```

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use dossier_core::{EditorParams, Password, ServerInfo};
use jiff::civil::Date;

/// Manage accounting dossiers and their financial periods
///
/// A dossier is recorded in the settings file with the DBMS provider serving
/// it and one database per financial period. Dossiers can be created,
/// queried with auditing, backed up, restored and archived into a new
/// period.
#[derive(Parser)]
#[command(version, about, name = "dossier")]
pub struct Args {
    /// Path to the settings file. Defaults to
    /// $XDG_CONFIG_HOME/dossier/settings.json
    #[arg(long, global = true)]
    pub settings_file: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the available DBMS providers
    Providers,
    /// List the recorded dossiers
    #[command(alias = "ls")]
    List,
    /// Show a dossier and its periods
    Show {
        /// Name of the dossier
        dossier: String,
    },
    /// Record a new dossier
    Define(DefineArgs),
    /// Forget a dossier (its databases are left untouched)
    Remove {
        /// Name of the dossier
        dossier: String,
    },
    /// Create the database of the current period of a dossier
    Create(CreateArgs),
    /// Run a statement on a period of a dossier
    Query(QueryArgs),
    /// Dump a period of a dossier into a file
    Backup(BackupArgs),
    /// Replace a period of a dossier with the content of a file
    Restore(RestoreArgs),
    /// Close the current period and open the next one
    Archive(ArchiveArgs),
    /// Manage the financial periods of a dossier
    #[command(alias = "p")]
    Period {
        #[command(subcommand)]
        command: PeriodCommands,
    },
}

#[derive(Subcommand)]
pub enum PeriodCommands {
    /// Show the current period
    Current {
        /// Name of the dossier
        dossier: String,
    },
    /// Make a period the current one
    SetCurrent {
        /// Name of the dossier
        dossier: String,
        /// Database of the period
        storage: String,
    },
    /// Find the period covering the given dates
    Find {
        /// Name of the dossier
        dossier: String,
        /// First day of the period (YYYY-MM-DD)
        #[arg(long)]
        begin: Option<Date>,
        /// Last day of the period (YYYY-MM-DD)
        #[arg(long)]
        end: Option<Date>,
    },
    /// Forget a period; forgetting the last one forgets the dossier
    Remove {
        /// Name of the dossier
        dossier: String,
        /// Database of the period
        storage: String,
    },
}

/// Account used to connect.
#[derive(ClapArgs)]
pub struct Credentials {
    /// Account name
    #[arg(short = 'u', long)]
    pub account: String,
    /// Account password
    #[arg(short = 'p', long, default_value = "")]
    pub password: String,
}

impl Credentials {
    pub fn password(&self) -> Password {
        Password::new(self.password.clone())
    }
}

/// Privileged account of the server.
#[derive(ClapArgs)]
pub struct RootCredentials {
    /// Privileged account name
    #[arg(long, default_value = "root")]
    pub root_account: String,
    /// Privileged account password
    #[arg(long, default_value = "")]
    pub root_password: String,
}

impl RootCredentials {
    pub fn password(&self) -> Password {
        Password::new(self.root_password.clone())
    }
}

/// Account made administrator of the dossier.
#[derive(ClapArgs)]
pub struct AdminCredentials {
    /// Administrator account name
    #[arg(long)]
    pub admin_account: String,
    /// Administrator account password
    #[arg(long, default_value = "")]
    pub admin_password: String,
}

impl AdminCredentials {
    pub fn password(&self) -> Password {
        Password::new(self.admin_password.clone())
    }
}

#[derive(ClapArgs)]
pub struct DefineArgs {
    /// Name of the new dossier
    pub dossier: String,
    /// DBMS provider serving the dossier
    #[arg(long)]
    pub provider: String,
    /// Server host (a directory for SQLite)
    #[arg(long)]
    pub host: Option<String>,
    /// Server port
    #[arg(long)]
    pub port: Option<u16>,
    /// Server socket
    #[arg(long)]
    pub socket: Option<PathBuf>,
    /// Database of the first period
    #[arg(long)]
    pub database: Option<String>,
    /// First day of the first period (YYYY-MM-DD)
    #[arg(long)]
    pub begin: Option<Date>,
    /// Last day of the first period (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<Date>,
}

impl From<DefineArgs> for EditorParams {
    fn from(val: DefineArgs) -> Self {
        let server = ServerInfo {
            host: val.host,
            port: val.port,
            socket: val.socket,
        };
        EditorParams {
            provider: val.provider,
            server,
            database: val.database,
            begin: val.begin,
            end: val.end,
        }
    }
}

#[derive(ClapArgs)]
pub struct CreateArgs {
    /// Name of the dossier
    pub dossier: String,
    #[command(flatten)]
    pub root: RootCredentials,
    #[command(flatten)]
    pub admin: AdminCredentials,
}

#[derive(ClapArgs)]
pub struct QueryArgs {
    /// Name of the dossier
    pub dossier: String,
    /// Statement to run
    pub sql: String,
    #[command(flatten)]
    pub credentials: Credentials,
    /// Database of the period; defaults to the current period
    #[arg(long)]
    pub period: Option<String>,
    /// The statement returns rows
    #[arg(long)]
    pub rows: bool,
}

#[derive(ClapArgs)]
pub struct BackupArgs {
    /// Name of the dossier
    pub dossier: String,
    /// Target file (path or file:// URI)
    pub file: String,
    #[command(flatten)]
    pub credentials: Credentials,
    /// Database of the period; defaults to the current period
    #[arg(long)]
    pub period: Option<String>,
}

#[derive(ClapArgs)]
pub struct RestoreArgs {
    /// Name of the dossier
    pub dossier: String,
    /// Source file (path or file:// URI)
    pub file: String,
    #[command(flatten)]
    pub root: RootCredentials,
    #[command(flatten)]
    pub admin: AdminCredentials,
    /// Database of the period; defaults to the current period
    #[arg(long)]
    pub period: Option<String>,
}

#[derive(ClapArgs)]
pub struct ArchiveArgs {
    /// Name of the dossier
    pub dossier: String,
    #[command(flatten)]
    pub credentials: Credentials,
    #[command(flatten)]
    pub root: RootCredentials,
    /// First day of the new period (YYYY-MM-DD)
    #[arg(long)]
    pub begin: Option<Date>,
    /// Last day of the new period (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<Date>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_define_into_editor() {
        let args = Args::parse_from([
            "dossier", "define", "acme", "--provider", "MySQL", "--host", "db", "--port", "3307",
            "--database", "acme_1", "--begin", "2024-01-01",
        ]);
        let Some(Commands::Define(define)) = args.command else {
            panic!("expected define");
        };
        let editor = EditorParams::from(define);
        assert_eq!(editor.provider, "MySQL");
        assert_eq!(editor.server.host(), Some("db"));
        assert_eq!(editor.server.port(), Some(3307));
        assert_eq!(editor.database.as_deref(), Some("acme_1"));
        assert_eq!(editor.begin, Some(jiff::civil::date(2024, 1, 1)));
        assert_eq!(editor.end, None);
    }
}
