//! Schema introspection over a [`StatementClient`]
//!
//! All lookups go through `information_schema` with bound parameters and are scoped to
//! the connection's current database (`DATABASE()`), so `use_database` changes what
//! they see.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::engine::{
    ColumnComment, ColumnInfo, IndexInfo, Row, StatementClient, TableComments, TableSummary,
};
use crate::error::{GateError, Result};

/// List database names visible to the connected user
pub async fn list_databases<C: StatementClient>(client: &mut C) -> Result<Vec<String>> {
    let result = client.query("SHOW DATABASES", &[]).await?;
    // SHOW DATABASES has a single column whose header varies between servers
    Ok(result
        .rows
        .iter()
        .filter_map(|row| row.values().next().and_then(text))
        .collect())
}

/// List tables and views of the current database
pub async fn list_tables<C: StatementClient>(client: &mut C) -> Result<Vec<TableSummary>> {
    let query = "SELECT table_name AS name, table_type AS type, table_comment AS comment
                 FROM information_schema.tables
                 WHERE table_schema = DATABASE()
                 ORDER BY table_name";

    let result = client.query(query, &[]).await?;
    result
        .rows
        .iter()
        .map(|row| {
            Ok(TableSummary {
                name: required_text(row, "name")?,
                table_type: optional_text(row, "type").unwrap_or_default(),
                comment: optional_text(row, "comment").filter(|c| !c.is_empty()),
            })
        })
        .collect()
}

/// Describe the columns of a table
pub async fn describe_table<C: StatementClient>(
    client: &mut C,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let query = "SELECT column_name AS name, column_type AS data_type, is_nullable AS nullable,
                        column_default AS default_value, column_key AS column_key,
                        extra AS extra, column_comment AS comment
                 FROM information_schema.columns
                 WHERE table_schema = DATABASE() AND table_name = ?
                 ORDER BY ordinal_position";

    let result = client.query(query, &[Value::from(table)]).await?;
    if result.rows.is_empty() {
        return Err(table_not_found(table));
    }

    result
        .rows
        .iter()
        .map(|row| {
            Ok(ColumnInfo {
                name: required_text(row, "name")?,
                data_type: required_text(row, "data_type")?,
                nullable: optional_text(row, "nullable").is_some_and(|v| v == "YES"),
                default: optional_text(row, "default_value"),
                key: optional_text(row, "column_key").filter(|k| !k.is_empty()),
                extra: optional_text(row, "extra").filter(|e| !e.is_empty()),
                comment: optional_text(row, "comment").filter(|c| !c.is_empty()),
                sensitive: false,
            })
        })
        .collect()
}

/// List the indexes of a table, columns in index order
pub async fn table_indexes<C: StatementClient>(
    client: &mut C,
    table: &str,
) -> Result<Vec<IndexInfo>> {
    let query = "SELECT index_name AS name, column_name AS column_name,
                        non_unique AS non_unique, index_type AS index_type
                 FROM information_schema.statistics
                 WHERE table_schema = DATABASE() AND table_name = ?
                 ORDER BY index_name, seq_in_index";

    let result = client.query(query, &[Value::from(table)]).await?;

    // Group by index name
    let mut grouped: BTreeMap<String, IndexInfo> = BTreeMap::new();
    for row in &result.rows {
        let name = required_text(row, "name")?;
        let column = required_text(row, "column_name")?;
        let unique = !flag(row.get("non_unique"));
        let index_type = optional_text(row, "index_type");

        grouped
            .entry(name.clone())
            .or_insert_with(|| IndexInfo { name, columns: Vec::new(), unique, index_type })
            .columns
            .push(column);
    }

    Ok(grouped.into_values().collect())
}

/// Read the table comment and every column comment
pub async fn table_comments<C: StatementClient>(
    client: &mut C,
    table: &str,
) -> Result<TableComments> {
    let table_query = "SELECT table_comment AS comment
                       FROM information_schema.tables
                       WHERE table_schema = DATABASE() AND table_name = ?";

    let result = client.query(table_query, &[Value::from(table)]).await?;
    let comment = match result.rows.first() {
        Some(row) => optional_text(row, "comment").unwrap_or_default(),
        None => return Err(table_not_found(table)),
    };

    let column_query = "SELECT column_name AS name, column_comment AS comment
                        FROM information_schema.columns
                        WHERE table_schema = DATABASE() AND table_name = ?
                        ORDER BY ordinal_position";

    let result = client.query(column_query, &[Value::from(table)]).await?;
    let columns = result
        .rows
        .iter()
        .map(|row| {
            Ok(ColumnComment {
                name: required_text(row, "name")?,
                comment: optional_text(row, "comment").unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TableComments { table: table.to_string(), comment, columns })
}

fn table_not_found(table: &str) -> GateError {
    GateError::statement_failed(format!("Table '{table}' does not exist in the current database"))
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_text(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(text)
}

fn required_text(row: &Row, column: &str) -> Result<String> {
    optional_text(row, column).ok_or_else(|| {
        GateError::statement_failed(format!("Failed to extract '{column}' from introspection row"))
    })
}

/// Interpret a 0/1 flag that may arrive as a number or a string
fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        Some(Value::String(s)) => s != "0",
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flag_parsing() {
        assert!(flag(Some(&json!(1))));
        assert!(!flag(Some(&json!(0))));
        assert!(flag(Some(&json!("1"))));
        assert!(!flag(Some(&json!("0"))));
        assert!(!flag(None));
    }

    #[test]
    fn test_text_extraction() {
        let r = row(json!({"name": "users", "count": 3, "missing": null}));
        assert_eq!(optional_text(&r, "name").as_deref(), Some("users"));
        assert_eq!(optional_text(&r, "count").as_deref(), Some("3"));
        assert_eq!(optional_text(&r, "missing"), None);
        assert!(required_text(&r, "absent").is_err());
    }
}
