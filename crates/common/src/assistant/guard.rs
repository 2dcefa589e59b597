//! Read-only SQL vetting for statements returned by the text-to-SQL service
//!
//! Literals and quoted identifiers are blanked before scanning so that a
//! vendor called 'Update Corp' does not trip the keyword check.

use crate::errors::{AppError, Result};
use regex_lite::Regex;
use std::sync::OnceLock;

const LITERALS: &str = r#"'(?:[^']|'')*'|"(?:[^"]|"")*""#;

const FORBIDDEN: &str = r"(?i)\b(insert|update|delete|merge|upsert|drop|alter|create|truncate|grant|revoke|copy|call|do|execute|prepare|deallocate|vacuum|analyze|reindex|cluster|refresh|lock|listen|notify|unlisten|set|reset|discard|comment|security|load|import|into|share|pg_sleep|pg_read_file|pg_read_binary_file|pg_ls_dir|pg_terminate_backend|pg_cancel_backend|set_config|lo_import|lo_export|dblink)\b";

fn literals() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LITERALS).expect("literal pattern is valid"))
}

fn forbidden() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FORBIDDEN).expect("keyword pattern is valid"))
}

fn refuse(reason: impl Into<String>) -> AppError {
    AppError::UnsafeSql {
        reason: reason.into(),
    }
}

/// Accept a single `SELECT`/`WITH` statement without comments or
/// write/session keywords. Returns the statement without trailing
/// semicolons.
pub fn vet_read_only(sql: &str) -> Result<String> {
    let statement = sql.trim().trim_end_matches(';').trim_end();
    if statement.is_empty() {
        return Err(refuse("empty statement"));
    }

    let unquoted = literals().replace_all(statement, "''");
    if unquoted.contains('\'') && unquoted.matches('\'').count() % 2 != 0 {
        return Err(refuse("unterminated string literal"));
    }
    if unquoted.contains(';') {
        return Err(refuse("multiple statements"));
    }
    if unquoted.contains("--") || unquoted.contains("/*") {
        return Err(refuse("comments are not allowed"));
    }
    if unquoted.contains("$$") {
        return Err(refuse("dollar-quoted strings are not allowed"));
    }

    let first = unquoted
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|word| !word.is_empty())
        .unwrap_or_default()
        .to_ascii_uppercase();
    if first != "SELECT" && first != "WITH" {
        return Err(refuse(format!("statement starts with {}", first)));
    }

    if let Some(found) = forbidden().find(&unquoted) {
        return Err(refuse(format!(
            "keyword {} is not allowed",
            found.as_str().to_ascii_uppercase()
        )));
    }

    Ok(statement.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_select() {
        let sql = "SELECT vendor_name, SUM(invoice_total) FROM summaries GROUP BY 1;";
        assert_eq!(
            vet_read_only(sql).unwrap(),
            "SELECT vendor_name, SUM(invoice_total) FROM summaries GROUP BY 1"
        );
    }

    #[test]
    fn test_accepts_cte_and_keywords_inside_literals() {
        let sql = "with v as (select * from vendors where vendor_name = 'Update; Corp') select * from v";
        assert!(vet_read_only(sql).is_ok());
    }

    #[test]
    fn test_rejects_writes_and_ddl() {
        for sql in [
            "DELETE FROM invoices",
            "SELECT 1; DROP TABLE invoices",
            "WITH gone AS (DELETE FROM vendors RETURNING *) SELECT * FROM gone",
            "SELECT * INTO backup FROM invoices",
            "SELECT * FROM invoices FOR UPDATE",
            "SELECT pg_sleep(10)",
        ] {
            assert!(
                matches!(vet_read_only(sql), Err(AppError::UnsafeSql { .. })),
                "accepted: {}",
                sql
            );
        }
    }

    #[test]
    fn test_rejects_comments_and_empty_input() {
        assert!(vet_read_only("SELECT 1 -- trailing").is_err());
        assert!(vet_read_only("SELECT /* hidden */ 1").is_err());
        assert!(vet_read_only("  ;  ").is_err());
    }

    #[test]
    fn test_identifier_substrings_are_not_keywords() {
        assert!(vet_read_only("SELECT created_at, updated_at, dataset FROM documents").is_ok());
    }
}
