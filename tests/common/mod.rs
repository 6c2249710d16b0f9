//! Shared fixtures for integration tests
//!
//! [`RecordingConnector`] stands in for a real database: it records every connect,
//! statement and close, answers queries from scripted results, and can be told to
//! refuse connections to particular hosts.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tiergate::{
    ConnectionParams, Connector, Environment, EnvironmentRegistry, ExecResult, GateError, Gateway,
    PermissionTier, QueryResult, Row, StatementClient,
};

pub const LOCAL_HOST: &str = "local.db";
pub const STAGING_HOST: &str = "staging.db";
pub const PRODUCTION_HOST: &str = "prod.db";

/// One statement seen by a client
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub host: String,
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct State {
    connects: Vec<String>,
    closes: Vec<String>,
    statements: Vec<Recorded>,
    responses: Vec<(String, QueryResult)>,
    failing_hosts: HashSet<String>,
    failing_pings: HashSet<String>,
    failing_statements: Vec<(String, String)>,
    rows_affected: u64,
}

/// In-memory connector recording everything it is asked to do
#[derive(Clone, Default)]
pub struct RecordingConnector {
    state: Arc<Mutex<State>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        let connector = Self::default();
        connector.state.lock().unwrap().rows_affected = 1;
        connector
    }

    /// Refuse connections to `host`
    pub fn fail_connect(&self, host: &str) {
        self.state.lock().unwrap().failing_hosts.insert(host.to_string());
    }

    /// Accept connections to `host` but fail their health check
    pub fn fail_ping(&self, host: &str) {
        self.state.lock().unwrap().failing_pings.insert(host.to_string());
    }

    /// Fail any statement containing `fragment`
    pub fn fail_statement(&self, fragment: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_statements
            .push((fragment.to_string(), message.to_string()));
    }

    /// Answer queries containing `fragment` with `rows`
    pub fn respond(&self, fragment: &str, columns: &[&str], rows: Vec<Value>) {
        let rows = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => map,
                other => panic!("scripted rows must be objects, got {other}"),
            })
            .collect::<Vec<Row>>();
        let result = QueryResult { columns: columns.iter().map(ToString::to_string).collect(), rows };
        self.state.lock().unwrap().responses.push((fragment.to_string(), result));
    }

    pub fn set_rows_affected(&self, rows: u64) {
        self.state.lock().unwrap().rows_affected = rows;
    }

    pub fn connects(&self) -> Vec<String> {
        self.state.lock().unwrap().connects.clone()
    }

    pub fn closes(&self) -> Vec<String> {
        self.state.lock().unwrap().closes.clone()
    }

    pub fn statements(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn statement_count(&self) -> usize {
        self.state.lock().unwrap().statements.len()
    }

    pub fn last_statement(&self) -> Option<Recorded> {
        self.state.lock().unwrap().statements.last().cloned()
    }
}

impl Connector for RecordingConnector {
    type Client = RecordingClient;

    async fn connect(&self, params: &ConnectionParams) -> tiergate::Result<RecordingClient> {
        let mut state = self.state.lock().unwrap();
        if state.failing_hosts.contains(&params.host) {
            return Err(GateError::connection_failed(format!("{} refused the connection", params.host)));
        }
        state.connects.push(params.host.clone());
        Ok(RecordingClient { host: params.host.clone(), state: Arc::clone(&self.state) })
    }
}

pub struct RecordingClient {
    host: String,
    state: Arc<Mutex<State>>,
}

impl RecordingClient {
    fn record(&self, sql: &str, params: &[Value]) -> tiergate::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(Recorded {
            host: self.host.clone(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match state.failing_statements.iter().find(|(fragment, _)| sql.contains(fragment.as_str())) {
            Some((_, message)) => Err(GateError::statement_failed(message.clone())),
            None => Ok(()),
        }
    }
}

impl StatementClient for RecordingClient {
    async fn ping(&mut self) -> tiergate::Result<()> {
        if self.state.lock().unwrap().failing_pings.contains(&self.host) {
            return Err(GateError::connection_failed(format!("{} did not answer ping", self.host)));
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> tiergate::Result<ExecResult> {
        self.record(sql, params)?;
        let rows_affected = self.state.lock().unwrap().rows_affected;
        let last_insert_id = sql.starts_with("INSERT").then_some(42);
        Ok(ExecResult { rows_affected, last_insert_id })
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> tiergate::Result<QueryResult> {
        self.record(sql, params)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .responses
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }

    async fn close(self) -> tiergate::Result<()> {
        self.state.lock().unwrap().closes.push(self.host.clone());
        Ok(())
    }
}

fn params(host: &str, database: Option<&str>) -> ConnectionParams {
    ConnectionParams::new(host, 3306, "agent", "secret-password", database.map(String::from))
}

/// local (full access), staging (confirm required), production (read only) and an
/// incompletely configured `broken` environment; `local` is active
pub fn registry() -> EnvironmentRegistry {
    EnvironmentRegistry::new(
        [
            Environment::new("local", params(LOCAL_HOST, Some("shop_dev")), PermissionTier::FullAccess)
                .with_description("Developer database"),
            Environment::new("staging", params(STAGING_HOST, Some("shop")), PermissionTier::ConfirmRequired),
            Environment::new("production", params(PRODUCTION_HOST, Some("shop")), PermissionTier::ReadOnly)
                .with_label("Production"),
            Environment::new("broken", params("", None), PermissionTier::FullAccess),
        ],
        None,
        "production",
    )
    .unwrap()
}

pub fn gateway() -> (Gateway<RecordingConnector>, RecordingConnector) {
    let connector = RecordingConnector::new();
    (Gateway::new(connector.clone(), registry()), connector)
}

/// Serialize a response for assertions on its JSON shape
pub fn json_of(response: &tiergate::ToolResponse) -> Value {
    response.to_value()
}
