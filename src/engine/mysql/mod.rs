//! MySQL Statement Client Implementation
//!
//! This module implements [`Connector`] and [`StatementClient`] for MySQL databases
//! (including MariaDB).
//!
//! # Implementation Notes
//! - Uses `mysql_async` (async driver, requires tokio runtime)
//! - One connection per active environment, owned by the gateway session
//! - Statements without parameters use the text protocol (`USE`, `SHOW` are not preparable)
//! - Statements with parameters use server-side prepared statements
//! - ENUM and SET types arrive as strings
//! - BLOB data is Base64-encoded for JSON safety
//! - No timeouts and no retries: failures surface immediately

use mysql_async::{prelude::*, Column, Conn, OptsBuilder, Params, Row, Value};

use crate::engine::{ConnectionParams, Connector, ExecResult, QueryResult, StatementClient};
use crate::error::{GateError, Result};

/// Opens MySQL connections
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

/// A single live MySQL connection
pub struct MySqlClient {
    conn: Conn,
}

impl Connector for MySqlConnector {
    type Client = MySqlClient;

    async fn connect(&self, params: &ConnectionParams) -> Result<MySqlClient> {
        let opts = build_mysql_opts(params)?;

        let conn = Conn::new(opts).await.map_err(|e| {
            GateError::connection_failed(format!(
                "Failed to connect to MySQL at {}:{}: {e}",
                params.host, params.port
            ))
        })?;

        Ok(MySqlClient { conn })
    }
}

impl StatementClient for MySqlClient {
    async fn ping(&mut self) -> Result<()> {
        self.conn
            .ping()
            .await
            .map_err(|e| GateError::connection_failed(format!("MySQL health check failed: {e}")))
    }

    async fn execute(&mut self, sql: &str, params: &[serde_json::Value]) -> Result<ExecResult> {
        if params.is_empty() {
            self.conn.query_drop(sql).await.map_err(statement_error)?;
        } else {
            self.conn.exec_drop(sql, bind_params(params)).await.map_err(statement_error)?;
        }

        Ok(ExecResult {
            rows_affected: self.conn.affected_rows(),
            last_insert_id: self.conn.last_insert_id().filter(|id| *id != 0),
        })
    }

    async fn query(&mut self, sql: &str, params: &[serde_json::Value]) -> Result<QueryResult> {
        let (columns, rows) = if params.is_empty() {
            let mut result = self.conn.query_iter(sql).await.map_err(statement_error)?;
            let columns = column_names(result.columns_ref());
            let rows: Vec<Row> = result.collect().await.map_err(statement_error)?;
            (columns, rows)
        } else {
            let mut result =
                self.conn.exec_iter(sql, bind_params(params)).await.map_err(statement_error)?;
            let columns = column_names(result.columns_ref());
            let rows: Vec<Row> = result.collect().await.map_err(statement_error)?;
            (columns, rows)
        };

        let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;

        Ok(QueryResult { columns, rows })
    }

    async fn close(self) -> Result<()> {
        self.conn
            .disconnect()
            .await
            .map_err(|e| GateError::connection_failed(format!("Failed to disconnect: {e}")))
    }
}

/// Build MySQL connection options from [`ConnectionParams`]
fn build_mysql_opts(params: &ConnectionParams) -> Result<OptsBuilder> {
    if !params.is_complete() {
        return Err(GateError::configuration(format!(
            "MySQL requires {} parameter(s)",
            params.missing_fields().join(", ")
        )));
    }

    let password = (!params.password.is_empty()).then(|| params.password.clone());

    let opts = OptsBuilder::default()
        .ip_or_hostname(params.host.clone())
        .tcp_port(params.port)
        .user(Some(params.user.clone()))
        .pass(password)
        .db_name(params.database.clone());

    Ok(opts)
}

fn statement_error(e: mysql_async::Error) -> GateError {
    GateError::statement_failed(e.to_string())
}

fn column_names(columns: &[Column]) -> Vec<String> {
    columns.iter().map(|col| col.name_str().to_string()).collect()
}

/// Convert JSON parameters to positional MySQL parameters
fn bind_params(params: &[serde_json::Value]) -> Params {
    Params::Positional(params.iter().map(json_to_mysql_value).collect())
}

fn json_to_mysql_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::NULL,
        serde_json::Value::Bool(b) => Value::Int(i64::from(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::UInt(u)
            } else {
                Value::Double(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::Bytes(s.as_bytes().to_vec()),
        // Nested values are stored as their JSON text (JSON columns)
        other => Value::Bytes(other.to_string().into_bytes()),
    }
}

/// Convert a MySQL row to a JSON object
fn row_to_json(row: &Row) -> Result<crate::engine::Row> {
    let mut map = crate::engine::Row::new();

    for (idx, column) in row.columns_ref().iter().enumerate() {
        let value = row.as_ref(idx).ok_or_else(|| {
            GateError::statement_failed(format!("Failed to get value at index {idx}"))
        })?;
        map.insert(column.name_str().to_string(), mysql_value_to_json(value));
    }

    Ok(map)
}

/// Convert MySQL value to JSON value
fn mysql_value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::NULL => serde_json::Value::Null,

        Value::Bytes(bytes) => {
            // Try to convert to UTF-8 string first
            if let Ok(s) = std::str::from_utf8(bytes) {
                serde_json::Value::String(s.to_string())
            } else {
                // Binary data - encode as Base64
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                serde_json::Value::String(encoded)
            }
        }

        Value::Int(i) => serde_json::Value::Number((*i).into()),

        Value::UInt(u) => serde_json::Value::Number((*u).into()),

        Value::Float(f) => serde_json::Number::from_f64(f64::from(*f))
            .map_or(serde_json::Value::Null, serde_json::Value::Number),

        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),

        Value::Date(year, month, day, hour, minute, second, micro) => serde_json::Value::String(
            format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{micro:06}"),
        ),

        Value::Time(is_negative, days, hours, minutes, seconds, microseconds) => {
            let sign = if *is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(*hours);
            serde_json::Value::String(format!(
                "{sign}{total_hours}:{minutes:02}:{seconds:02}.{microseconds:06}"
            ))
        }
    }
}
