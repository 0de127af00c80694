//! Building blocks shared by the backup, restore and archive use-cases.
//!
//! Providers implement [`Lifecycle`](crate::provider::Lifecycle) with their
//! own statements and command templates; the parts which do not depend on
//! the DBMS live here.

use std::path::PathBuf;

use log::{info, warn};

use crate::{
    connect::Connect,
    error::{DossierError, Result},
    process::ExitOutcome,
    template::{self, CommandParams},
};

/// Upper bound of the suffixes probed for a new database name.
const MAX_SUFFIX: u32 = 9999;

/// Runs a rendered command template, once more if the first attempt exits
/// with a non-zero code.
///
/// The second attempt works around a transient race of the DBMS tools
/// after a database has just been dropped and recreated. A command which
/// cannot be started, or which is killed by a signal, is not retried.
pub fn run_with_retry(cnx: &mut Connect, template: &str, params: &CommandParams) -> Result<()> {
    let mut outcome = cnx.run_command(template, params)?;
    if matches!(outcome, ExitOutcome::Exited(code) if code != 0) {
        warn!("Command {outcome}, trying once more");
        outcome = cnx.run_command(template, params)?;
    }
    if outcome.success() {
        return Ok(());
    }
    Err(DossierError::Process {
        command: template::render_redacted(template, params)?,
        outcome,
    })
}

/// Runs a rendered command template once.
pub fn run_once(cnx: &mut Connect, template: &str, params: &CommandParams) -> Result<()> {
    let outcome = cnx.run_command(template, params)?;
    if outcome.success() {
        return Ok(());
    }
    Err(DossierError::Process {
        command: template::render_redacted(template, params)?,
        outcome,
    })
}

/// The name without its trailing `_<N>` suffix, if any.
///
/// ```
/// use dossier_core::lifecycle::database_prefix;
///
/// assert_eq!(database_prefix("acme_2"), "acme");
/// assert_eq!(database_prefix("acme"), "acme");
/// assert_eq!(database_prefix("acme_x"), "acme_x");
/// ```
pub fn database_prefix(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((prefix, suffix))
            if !prefix.is_empty()
                && !suffix.is_empty()
                && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            prefix
        }
        _ => name,
    }
}

/// First of `prefix_1`, `prefix_2`, … for which `exists` says no.
pub fn next_database_name<F>(current: &str, mut exists: F) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    let prefix = database_prefix(current);
    for suffix in 1..=MAX_SUFFIX {
        let candidate = format!("{prefix}_{suffix}");
        if !exists(&candidate)? {
            info!("Next database of '{current}' is '{candidate}'");
            return Ok(candidate);
        }
    }
    Err(DossierError::Configuration {
        message: format!("no free database name left for prefix '{prefix}'"),
    })
}

/// Rewrites a grant line of `old` so that it applies to `new`.
///
/// Both the plain `` `old`. `` form and the wildcard-escaped
/// `` `old\_…` `` form the server reports are recognized. Returns `None`
/// when the line does not mention `old`.
pub fn rewrite_grant(line: &str, old: &str, new: &str) -> Option<String> {
    let plain = format!("`{old}`.");
    let escaped = format!("`{}`.", escape_wildcards(old));

    if line.contains(&plain) {
        return Some(line.replace(&plain, &format!("`{new}`.")));
    }
    if escaped != plain && line.contains(&escaped) {
        return Some(line.replace(&escaped, &format!("`{}`.", escape_wildcards(new))));
    }
    None
}

fn escape_wildcards(name: &str) -> String {
    name.replace('_', "\\_").replace('%', "\\%")
}

/// Local path of a file designated either by a path or a `file://` URI.
pub fn file_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}
