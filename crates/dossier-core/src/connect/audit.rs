//! Service tables every dossier database carries.
//!
//! The audit table receives one row per mutating statement run through a
//! [`Connect`](super::Connect); the roles table records which accounts are
//! dossier administrators. Their DDL is provider specific, the statements
//! below are portable.

/// Append-only log of the mutating statements.
pub const AUDIT_TABLE: &str = "T_AUDIT";

/// Known accounts and their administrator flag.
pub const ROLES_TABLE: &str = "T_ROLES";

/// Escapes a value for a single-quoted SQL literal.
///
/// Backslashes are stripped and single quotes doubled, which every
/// supported engine reads back as the original quote.
pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "").replace('\'', "''")
}

/// The statement recording `sql` into the audit table.
pub fn audit_statement(sql: &str) -> String {
    format!(
        "INSERT INTO {AUDIT_TABLE} (AUD_QUERY) VALUES ('{}')",
        escape_literal(sql)
    )
}

/// The statement raising the administrator flag of `account`.
pub fn set_admin_statement(account: &str) -> String {
    format!(
        "UPDATE {ROLES_TABLE} SET ROL_IS_ADMIN=1 WHERE ROL_USER='{}'",
        escape_literal(account)
    )
}
