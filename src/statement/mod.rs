//! Statement Shape Guard
//!
//! Textual analysis of SQL before it reaches the statement layer.
//!
//! # Responsibilities
//! - Pre-processing (trim, comment stripping, multi-statement rejection)
//! - Read/write shape classification for generic statement tools
//! - Automatic row caps for unbounded single SELECTs
//! - Identifier validation and quoting for the structured data tools
//! - Parameterized INSERT/UPDATE/DELETE construction
//!
//! Classification is conservative: anything not positively recognised as a read is
//! treated as write-shaped.

use serde_json::{Map, Value};

use crate::error::{GateError, Result};

/// Maximum length of a single MySQL identifier
const MAX_IDENTIFIER_LEN: usize = 64;

/// Shape of a statement as seen from its text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementShape {
    /// Returns rows and modifies nothing
    Read,
    /// Anything else (DML, DDL, locking, session changes, ...)
    Write,
}

/// Classify a single statement
///
/// # Errors
/// Returns `InvalidArgument` for empty or multi-statement input.
pub fn classify(sql: &str) -> Result<StatementShape> {
    let processed = preprocess_sql(sql)?;
    if is_read_only(&processed) {
        Ok(StatementShape::Read)
    } else {
        Ok(StatementShape::Write)
    }
}

/// Whether a statement would modify state (unparseable input counts as write-shaped)
#[must_use]
pub fn is_write_shaped(sql: &str) -> bool {
    !matches!(classify(sql), Ok(StatementShape::Read))
}

/// Pre-process SQL query before classification
///
/// This function:
/// 1. Trims leading/trailing whitespace
/// 2. Strips SQL comments (`-- `, `#` and `/* */`), keeping `/*! */` bodies as code
/// 3. Detects multi-statement queries (rejects them)
/// 4. Normalizes to uppercase for pattern matching
fn preprocess_sql(sql: &str) -> Result<String> {
    let processed = strip_comments(sql.trim());
    let processed = processed.trim();

    if processed.is_empty() {
        return Err(GateError::invalid_argument("Query cannot be empty"));
    }

    // A single trailing semicolon is allowed
    let body = processed.trim_end_matches(';').trim_end();
    if contains_unquoted(body, ';') {
        return Err(GateError::invalid_argument("Multi-statement queries are not supported"));
    }

    Ok(body.to_uppercase())
}

/// Strip SQL comments from query, leaving quoted text untouched
///
/// Follows what the MySQL server executes:
/// - `#` starts a line comment
/// - `--` starts a line comment only when followed by whitespace or end of input
///   (`--1` is two minus signs)
/// - `/* */` is removed, but the body of an executable comment `/*! */` or
///   `/*!NNNNN */` is kept as statement text
fn strip_comments(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_executable = false;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            result.push(ch);
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                result.push(ch);
            }
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                if chars.peek().map_or(true, |c| c.is_whitespace()) {
                    skip_line(&mut chars, &mut result);
                } else {
                    result.push_str("--");
                }
            }
            '#' => skip_line(&mut chars, &mut result),
            '*' if in_executable && chars.peek() == Some(&'/') => {
                chars.next();
                in_executable = false;
                result.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next(); // consume '*'
                if chars.peek() == Some(&'!') {
                    chars.next();
                    // Optional server version gate
                    while chars.peek().is_some_and(char::is_ascii_digit) {
                        chars.next();
                    }
                    in_executable = true;
                    result.push(' ');
                    continue;
                }
                let mut prev = ' ';
                for ch in chars.by_ref() {
                    if prev == '*' && ch == '/' {
                        break;
                    }
                    prev = ch;
                }
                result.push(' '); // replace comment with space
            }
            _ => result.push(ch),
        }
    }

    result
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, result: &mut String) {
    for ch in chars.by_ref() {
        if ch == '\n' {
            result.push('\n'); // preserve newline
            break;
        }
    }
}

/// Whether `needle` occurs outside of quoted strings and quoted identifiers
fn contains_unquoted(sql: &str, needle: char) -> bool {
    let mut quote: Option<char> = None;
    let mut chars = sql.chars();

    while let Some(ch) = chars.next() {
        match quote {
            Some(_) if ch == '\\' => {
                chars.next();
            }
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if matches!(ch, '\'' | '"' | '`') => quote = Some(ch),
            None if ch == needle => return true,
            None => {}
        }
    }

    false
}

/// Split uppercase SQL into bare words (identifier characters only)
fn words(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .filter(|w| !w.is_empty())
}

/// Whether `keyword` appears as a bare word outside quotes and parentheses
fn has_top_level_keyword(sql: &str, keyword: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut word = String::new();
    let mut chars = sql.chars();

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            if ch == '\\' {
                chars.next();
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
            if depth == 0 {
                word.push(ch);
            }
            continue;
        }

        if word == keyword {
            return true;
        }
        word.clear();

        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    word == keyword
}

/// Every identifier-like token of a statement, in original case
pub fn identifier_tokens(sql: &str) -> impl Iterator<Item = &str> {
    words(sql).filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
}

/// Strip EXPLAIN/EXPLAIN ANALYZE prefix from query
fn strip_explain_prefix(sql: &str) -> &str {
    let sql = sql.trim();

    if let Some(stripped) = sql.strip_prefix("EXPLAIN ANALYZE") {
        return stripped.trim();
    }

    if let Some(stripped) = sql.strip_prefix("EXPLAIN") {
        return stripped.trim();
    }

    sql
}

/// MySQL read-only check on pre-processed (uppercase, single statement) SQL
fn is_read_only(sql: &str) -> bool {
    let sql = strip_explain_prefix(sql);
    let first = words(sql).next().unwrap_or_default();

    match first {
        "SELECT" => !selects_into_or_locks(sql),
        // CTEs may front UPDATE/DELETE in MySQL 8
        "WITH" => !selects_into_or_locks(sql) && !words(sql).any(is_write_keyword),
        "SHOW" | "DESCRIBE" | "DESC" => true,
        _ => false,
    }
}

/// `SELECT ... INTO OUTFILE/@var` and `SELECT ... FOR UPDATE` are not plain reads
fn selects_into_or_locks(sql: &str) -> bool {
    let tokens: Vec<&str> = words(sql).collect();
    tokens.contains(&"INTO")
        || tokens.windows(2).any(|w| w == ["FOR", "UPDATE"] || w == ["LOCK", "IN"])
}

fn is_write_keyword(word: &str) -> bool {
    matches!(word, "INSERT" | "UPDATE" | "DELETE" | "REPLACE" | "MERGE")
}

/// Append `LIMIT <limit>` to a single, unbounded SELECT
///
/// Anything that is not a plain SELECT, or that already carries a LIMIT, is returned
/// unchanged (minus a trailing semicolon).
///
/// # Errors
/// Returns `InvalidArgument` for empty or multi-statement input, or a zero limit.
pub fn apply_row_limit(sql: &str, limit: u64) -> Result<String> {
    if limit == 0 {
        return Err(GateError::invalid_argument("limit must be at least 1"));
    }

    let processed = preprocess_sql(sql)?;
    let original = sql.trim().trim_end_matches(';').trim_end();

    let is_plain_select = words(&processed).next() == Some("SELECT")
        && !selects_into_or_locks(&processed)
        && !has_top_level_keyword(&processed, "LIMIT");

    // A trailing line comment would swallow the appended clause
    if is_plain_select && strip_comments(original).trim_end() == original {
        Ok(format!("{original} LIMIT {limit}"))
    } else if is_plain_select {
        Ok(format!("{original}\nLIMIT {limit}"))
    } else {
        Ok(original.to_string())
    }
}

/// Validate and backtick-quote a table or database identifier
///
/// Accepts `name` or `schema.name`, each part made of `[A-Za-z0-9_$]`.
///
/// # Errors
/// Returns `InvalidArgument` when the identifier is empty, too long, or contains
/// other characters.
pub fn quote_identifier(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GateError::invalid_argument("Identifier cannot be empty"));
    }

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(GateError::invalid_argument(format!(
            "Invalid identifier '{name}': at most one '.' separator is allowed"
        )));
    }

    let mut quoted = Vec::with_capacity(parts.len());
    for part in parts {
        let valid = !part.is_empty()
            && part.len() <= MAX_IDENTIFIER_LEN
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if !valid {
            return Err(GateError::invalid_argument(format!(
                "Invalid identifier '{name}': only letters, digits, '_' and '$' are allowed"
            )));
        }
        quoted.push(format!("`{part}`"));
    }

    Ok(quoted.join("."))
}

/// Validate a caller-supplied WHERE clause
fn check_where_clause(where_clause: &str) -> Result<&str> {
    let clause = where_clause.trim();
    if clause.is_empty() {
        return Err(GateError::invalid_argument(
            "A non-empty 'where' condition is required",
        ));
    }
    if contains_unquoted(&strip_comments(clause), ';') {
        return Err(GateError::invalid_argument(
            "The 'where' condition must not contain statement separators",
        ));
    }
    Ok(clause)
}

fn check_data(data: &Map<String, Value>) -> Result<()> {
    if data.is_empty() {
        return Err(GateError::invalid_argument("'data' must contain at least one column"));
    }
    Ok(())
}

/// Build a parameterized INSERT
///
/// # Errors
/// Returns `InvalidArgument` for invalid identifiers or empty data.
pub fn build_insert(table: &str, data: &Map<String, Value>) -> Result<(String, Vec<Value>)> {
    let table = quote_identifier(table)?;
    check_data(data)?;

    let columns = data.keys().map(|c| quote_identifier(c)).collect::<Result<Vec<_>>>()?;
    let placeholders = vec!["?"; columns.len()].join(", ");

    let sql = format!("INSERT INTO {table} ({}) VALUES ({placeholders})", columns.join(", "));
    Ok((sql, data.values().cloned().collect()))
}

/// Build a parameterized UPDATE
///
/// # Errors
/// Returns `InvalidArgument` for invalid identifiers, empty data, or an empty WHERE.
pub fn build_update(
    table: &str,
    data: &Map<String, Value>,
    where_clause: &str,
) -> Result<(String, Vec<Value>)> {
    let table = quote_identifier(table)?;
    check_data(data)?;
    let clause = check_where_clause(where_clause)?;

    let assignments = data
        .keys()
        .map(|c| quote_identifier(c).map(|q| format!("{q} = ?")))
        .collect::<Result<Vec<_>>>()?;

    let sql = format!("UPDATE {table} SET {} WHERE {clause}", assignments.join(", "));
    Ok((sql, data.values().cloned().collect()))
}

/// Build a DELETE
///
/// # Errors
/// Returns `InvalidArgument` for an invalid identifier or an empty WHERE.
pub fn build_delete(table: &str, where_clause: &str) -> Result<String> {
    let table = quote_identifier(table)?;
    let clause = check_where_clause(where_clause)?;
    Ok(format!("DELETE FROM {table} WHERE {clause}"))
}
