//! Command-line templates for the external DBMS tools.
//!
//! Backup, restore and archive run external programs through `/bin/sh -c`.
//! The command line comes from a template, either the provider default or a
//! user override, in which the following tokens are substituted:
//!
//! | Token | Replaced by                                         |
//! |-------|-----------------------------------------------------|
//! | `%B`  | current database                                    |
//! | `%F`  | backup/restore file path, shell-quoted              |
//! | `%N`  | new database name                                   |
//! | `%O`  | `--host=`, `--port=`, `--socket=` options, when set |
//! | `%P`  | password, shell-quoted                              |
//! | `%U`  | account                                             |
//!
//! Substitution is done in a single left-to-right pass, so a value which
//! itself contains a token-looking sequence is never substituted again.
//! Database and account names are restricted to a safe character set; any
//! other value reaching the shell is quoted.

use std::path::{Path, PathBuf};

use crate::{
    error::{DossierError, Result},
    meta::ServerInfo,
    provider::Password,
};

/// Values substituted into a command template.
#[derive(Debug, Clone, Default)]
pub struct CommandParams {
    pub database: Option<String>,
    pub file: Option<PathBuf>,
    pub new_database: Option<String>,
    pub server: ServerInfo,
    pub account: Option<String>,
    pub password: Option<Password>,
}

impl CommandParams {
    pub fn new(server: ServerInfo) -> Self {
        Self {
            server,
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    pub fn with_new_database(mut self, database: impl Into<String>) -> Self {
        self.new_database = Some(database.into());
        self
    }

    pub fn with_credentials(mut self, account: impl Into<String>, password: Password) -> Self {
        self.account = Some(account.into());
        self.password = Some(password);
        self
    }
}

/// Renders `template` into a shell command line.
///
/// # Errors
///
/// Returns `DossierError::InvalidInput` when a token has no value or when a
/// database, account or host name contains characters outside the safe set.
pub fn render(template: &str, params: &CommandParams) -> Result<String> {
    substitute(template, params, false)
}

/// Renders `template` with the password masked, for logging.
pub fn render_redacted(template: &str, params: &CommandParams) -> Result<String> {
    substitute(template, params, true)
}

fn substitute(template: &str, params: &CommandParams, redact: bool) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 64);
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(token) = chars.next() else {
            out.push('%');
            break;
        };
        match token {
            'B' => out.push_str(identifier("%B", params.database.as_deref())?),
            'N' => out.push_str(identifier("%N", params.new_database.as_deref())?),
            'U' => out.push_str(identifier("%U", params.account.as_deref())?),
            'F' => {
                let file = params.file.as_deref().ok_or_else(|| {
                    DossierError::invalid_input("%F").with_reason("no file was given")
                })?;
                out.push_str(&shell_words::quote(&file.to_string_lossy()));
            }
            'P' => {
                if redact {
                    out.push_str(Password::MASK);
                } else {
                    let secret = params.password.as_ref().map_or("", Password::expose);
                    out.push_str(&shell_words::quote(secret));
                }
            }
            'O' => out.push_str(&connection_options(&params.server)?),
            other => {
                out.push('%');
                out.push(other);
            }
        }
    }

    Ok(out)
}

/// Builds the `%O` block; unset, empty or non-positive values are omitted.
fn connection_options(server: &ServerInfo) -> Result<String> {
    let mut options = Vec::new();
    if let Some(host) = server.host() {
        if host.starts_with('-')
            || !host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':'))
        {
            return Err(DossierError::invalid_input("host")
                .with_reason(format!("'{host}' contains unsafe characters")));
        }
        options.push(format!("--host={host}"));
    }
    if let Some(port) = server.port() {
        options.push(format!("--port={port}"));
    }
    if let Some(socket) = server.socket() {
        options.push(format!(
            "--socket={}",
            shell_words::quote(&socket.to_string_lossy())
        ));
    }
    Ok(options.join(" "))
}

/// Checks a database or account name against the safe character set.
pub fn check_identifier(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(DossierError::invalid_input(field).with_reason("is empty"));
    }
    let safe = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '@' | '-'));
    if !safe || value.starts_with('-') {
        return Err(DossierError::invalid_input(field)
            .with_reason(format!("'{value}' contains unsafe characters")));
    }
    Ok(())
}

fn identifier<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str> {
    let value = value.ok_or_else(|| {
        DossierError::invalid_input(field).with_reason("no value was given")
    })?;
    check_identifier(field, value)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CommandParams {
        CommandParams::new(
            ServerInfo::default()
                .with_host("db.example.org")
                .with_port(3307)
                .with_socket("/run/my sql/mysqld.sock"),
        )
        .with_database("acme_2")
        .with_new_database("acme_3")
        .with_file("/backups/acme 2024.gz")
        .with_credentials("bob", Password::new("s3cret"))
    }

    #[test]
    fn test_every_token_is_replaced() {
        let rendered = render("dump %O -u%U -p%P %B %N > %F", &params()).unwrap();
        assert_eq!(
            rendered,
            "dump --host=db.example.org --port=3307 --socket='/run/my sql/mysqld.sock' \
             -ubob -ps3cret acme_2 acme_3 > '/backups/acme 2024.gz'"
        );
    }

    #[test]
    fn test_repeated_tokens_and_unrelated_text() {
        let rendered = render("echo %B; echo %B 100% %X", &params()).unwrap();
        assert_eq!(rendered, "echo acme_2; echo acme_2 100% %X");
    }

    #[test]
    fn test_substitution_is_literal() {
        let params = params().with_credentials("bob", Password::new("%B%F"));
        let rendered = render("-p%P %B", &params).unwrap();
        assert_eq!(rendered, format!("-p{} acme_2", shell_words::quote("%B%F")));
        assert!(rendered.contains("%B%F"));
    }

    #[test]
    fn test_unset_options_are_omitted() {
        let params = CommandParams::new(ServerInfo {
            host: Some(String::new()),
            port: Some(0),
            socket: None,
        })
        .with_database("acme_2");
        assert_eq!(render("mysql %O %B", &params).unwrap(), "mysql  acme_2");
        assert_eq!(
            render("%O", &CommandParams::new(ServerInfo::default().with_port(3306))).unwrap(),
            "--port=3306"
        );
    }

    #[test]
    fn test_unsafe_identifiers_are_rejected() {
        let params = params().with_database("acme; rm -rf /");
        let err = render("mysqldump %B", &params).unwrap_err();
        assert!(matches!(err, DossierError::InvalidInput { ref field, .. } if field == "%B"));

        let params = CommandParams::default().with_credentials("--all", Password::new("x"));
        assert!(render("-u%U", &params).is_err());

        let params = CommandParams::new(ServerInfo::default().with_host("$(reboot)"));
        assert!(render("%O", &params).is_err());
    }

    #[test]
    fn test_missing_values() {
        assert!(render("%B", &CommandParams::default()).is_err());
        assert!(render("%F", &CommandParams::default()).is_err());
        assert_eq!(render("-p%P", &CommandParams::default()).unwrap(), "-p''");
    }

    #[test]
    fn test_redacted_rendering() {
        let rendered = render_redacted("mysql -u%U -p%P", &params()).unwrap();
        assert_eq!(rendered, "mysql -ubob -p******");
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_trailing_percent() {
        assert_eq!(render("50%", &CommandParams::default()).unwrap(), "50%");
    }
}
