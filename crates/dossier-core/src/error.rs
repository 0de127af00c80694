//! Error types for the dossier storage layer.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::process::ExitOutcome;

/// Comprehensive error type for all dossier operations.
#[derive(Error, Debug)]
pub enum DossierError {
    /// No settings group is recorded for the dossier
    #[error("Dossier '{name}' is not defined")]
    DossierNotDefined { name: String },
    /// The dossier settings do not name a DBMS provider
    #[error("No DBMS provider is defined for dossier '{dossier}'")]
    ProviderNotDefined { dossier: String },
    /// The named provider is not installed in the registry
    #[error("DBMS provider '{name}' is not available")]
    ProviderNotFound { name: String },
    /// The provider does not implement the requested capability
    #[error("DBMS provider '{provider}' does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },
    /// The backend refused the connection
    #[error(
        "Unable to connect to dossier '{dossier}' (provider={provider}, database={database}, account={account}): {message}"
    )]
    Connection {
        dossier: String,
        provider: String,
        database: String,
        account: String,
        message: String,
    },
    /// A connection was requested on an already opened handle
    #[error("Connection is already opened")]
    AlreadyConnected,
    /// A query was issued on a handle which is not opened
    #[error("Connection is not opened")]
    NotConnected,
    /// The backend rejected a statement
    #[error("Query failed: {message} (statement: {statement})")]
    Query { statement: String, message: String },
    /// The external command could not be started at all
    #[error("Unable to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// The external command ran but did not succeed
    #[error("Command '{command}' failed: {outcome}")]
    Process {
        command: String,
        outcome: ExitOutcome,
    },
    /// The dossier has been removed from the settings
    #[error("Dossier '{dossier}' has been removed")]
    MetaRemoved { dossier: String },
    /// No period of the dossier is stored in the given database
    #[error("No financial period is stored in '{storage}'")]
    PeriodNotFound { storage: String },
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating query errors with the backend message.
pub struct QueryErrorBuilder {
    statement: String,
}

impl QueryErrorBuilder {
    /// Create a new query error builder for a statement.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
        }
    }

    /// Build the error with the backend last-error text.
    pub fn with_message(self, message: impl Into<String>) -> DossierError {
        DossierError::Query {
            statement: self.statement,
            message: message.into(),
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> DossierError {
        DossierError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl DossierError {
    /// Creates a builder for query errors.
    pub fn query(statement: impl Into<String>) -> QueryErrorBuilder {
        QueryErrorBuilder::new(statement)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Creates an error for a capability the provider leaves out.
    pub fn unsupported(provider: impl Into<String>, operation: &'static str) -> Self {
        DossierError::Unsupported {
            provider: provider.into(),
            operation,
        }
    }

    /// Whether this error reports a missing provider rather than a failure.
    ///
    /// A dossier configured for a provider which is no longer installed is
    /// an expected situation and callers usually handle it differently from
    /// I/O or backend errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DossierError::ProviderNotFound { .. })
    }

    /// Whether this error reports a capability the provider does not have.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, DossierError::Unsupported { .. })
    }
}

/// Extension trait for Result to provide concise error mapping with
/// anyhow-style context.
pub trait ResultExt<T, E> {
    /// Add context to any error type, converting to DossierError.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| DossierError::Configuration {
            message: format!("{}: {}", context, e),
        })
    }
}

/// Result type alias for dossier operations
pub type Result<T> = std::result::Result<T, DossierError>;
