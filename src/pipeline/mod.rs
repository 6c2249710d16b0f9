//! Request Pipeline
//!
//! [`Gateway::handle`] drives every tool call through the same stages, stopping at the
//! first one that rejects it:
//!
//! 1. **Tool lookup**: unknown names are refused (`PERMISSION_DENIED`)
//! 2. **Tier check**: write tools under a read-only tier are refused (`PRODUCTION_PROTECTION`)
//! 3. **Argument validation**: the arguments must decode into the tool's input type
//! 4. **Confirmation check**: unconfirmed writes under a confirm-required tier return
//!    `confirmation_required`
//! 5. **Shape guard**: generic statements are classified; `select_query` only runs reads
//! 6. **Execute** against the session's connection
//! 7. **Redact** rows and schemas through the active environment's filter
//!
//! Nothing before step 6 touches the connection. Execution failures become error
//! responses; the session state is unaffected by them.

use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::confirmation::{self, Gate};
use crate::engine::{introspect, Connector, QueryResult, Row, StatementClient};
use crate::environment::EnvironmentRegistry;
use crate::error::{GateError, Result};
use crate::output::{ConfirmationEnvelope, ErrorEnvelope, Metadata, SuccessEnvelope, ToolResponse};
use crate::permission::{decide, PermissionDecision, PermissionTier};
use crate::security::SENSITIVE_DATA_NOTICE;
use crate::session::Session;
use crate::statement::{self, StatementShape};
use crate::tools::{ToolKind, ToolRequest};

/// Result of a successful execution, before it is wrapped in an envelope
struct Outcome {
    data: Value,
    rows_returned: Option<usize>,
    notice: Option<String>,
    masked_fields: Vec<String>,
}

impl Outcome {
    fn new(data: impl Serialize) -> Result<Self> {
        let data = serde_json::to_value(data)
            .map_err(|e| GateError::statement_failed(format!("Failed to serialize result: {e}")))?;
        Ok(Self { data, rows_returned: None, notice: None, masked_fields: Vec::new() })
    }

    fn with_rows(mut self, rows: usize) -> Self {
        self.rows_returned = Some(rows);
        self
    }
}

/// The access-control gateway in front of one session
pub struct Gateway<C: Connector> {
    session: Session<C>,
}

impl<C: Connector> Gateway<C> {
    /// Create a gateway on the registry's active environment
    pub fn new(connector: C, registry: EnvironmentRegistry) -> Self {
        Self { session: Session::new(connector, registry) }
    }

    #[must_use]
    pub const fn session(&self) -> &Session<C> {
        &self.session
    }

    /// Close the live connection, if any
    ///
    /// # Errors
    /// Returns the error reported by the connection's close.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.session.close().await
    }

    /// Handle one tool call
    pub async fn handle(&mut self, name: &str, arguments: Option<&Value>) -> ToolResponse {
        let started = Instant::now();
        let environment = self.session.active().id.clone();
        let tier = self.session.active().tier;

        let Some(kind) = ToolKind::from_name(name) else {
            warn!(tool = name, %environment, "Unknown tool rejected");
            let err = GateError::permission_denied(format!("Unknown tool '{name}'"));
            return ToolResponse::Error(ErrorEnvelope::from_error(environment, name, &err));
        };

        let request = match self.admit(kind, tier, &environment, arguments) {
            Ok(Admission::Run(request)) => request,
            Ok(Admission::Confirm(envelope)) => return ToolResponse::ConfirmationRequired(envelope),
            Err(err) => return ToolResponse::Error(ErrorEnvelope::from_error(environment, name, &err)),
        };

        match self.execute(request).await {
            Ok(outcome) => {
                let execution_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                let mut meta = Metadata::new(execution_ms).with_masked_fields(outcome.masked_fields);
                meta.rows_returned = outcome.rows_returned;
                meta.notice = outcome.notice;

                debug!(tool = name, execution_ms, "Tool succeeded");
                // switch_environment reports the environment it switched to
                let environment = self.session.active().id.clone();
                ToolResponse::Success(SuccessEnvelope::new(environment, name, outcome.data, meta))
            }
            Err(err) => {
                warn!(tool = name, %environment, code = err.error_code(), error = %err, "Tool failed");
                ToolResponse::Error(ErrorEnvelope::from_error(environment, name, &err))
            }
        }
    }

    /// Tier check, argument validation, confirmation check and shape guard
    fn admit(
        &self,
        kind: ToolKind,
        tier: PermissionTier,
        environment: &str,
        arguments: Option<&Value>,
    ) -> Result<Admission> {
        let descriptor = kind.descriptor();
        let decision = decide(descriptor, tier);
        debug!(tool = descriptor.name, environment, %tier, ?decision, "Permission decision");

        if decision == PermissionDecision::Blocked {
            warn!(tool = descriptor.name, environment, %tier, "Write blocked by read-only tier");
            return Err(GateError::production_protection(format!(
                "'{}' modifies data and is blocked in environment '{environment}' (tier: {tier}). \
                 Switch to an environment that allows writes.",
                descriptor.name
            )));
        }

        let request = ToolRequest::parse(kind, arguments)?;

        if let Gate::ConfirmationRequired(prompt) =
            confirmation::check(descriptor, tier, environment, request.is_confirmed())
        {
            info!(tool = descriptor.name, environment, "Confirmation required");
            return Ok(Admission::Confirm(ConfirmationEnvelope::new(prompt)));
        }

        guard_shape(&request, tier, environment)?;
        Ok(Admission::Run(request))
    }

    async fn execute(&mut self, request: ToolRequest) -> Result<Outcome> {
        match request {
            ToolRequest::SwitchEnvironment(args) => {
                let outcome = self.session.switch_to(&args.environment).await?;
                Outcome::new(outcome)
            }

            ToolRequest::ListEnvironments => {
                let registry = self.session.registry();
                let environments = registry.list();
                let count = environments.len();
                Outcome::new(json!({
                    "active": registry.active_id(),
                    "environments": environments,
                }))
                .map(|o| o.with_rows(count))
            }

            ToolRequest::ListDatabases => {
                let databases = introspect::list_databases(self.session.client().await?).await?;
                let count = databases.len();
                Outcome::new(json!({ "databases": databases })).map(|o| o.with_rows(count))
            }

            ToolRequest::ListTables => {
                let tables = introspect::list_tables(self.session.client().await?).await?;
                let count = tables.len();
                Outcome::new(json!({
                    "database": self.session.current_database(),
                    "tables": tables,
                }))
                .map(|o| o.with_rows(count))
            }

            ToolRequest::UseDatabase(args) => {
                self.session.use_database(&args.database).await?;
                Outcome::new(json!({ "database": args.database }))
            }

            ToolRequest::DescribeTable(args) => {
                check_table_name(&args.table)?;
                let columns = introspect::describe_table(self.session.client().await?, &args.table).await?;
                let columns = self.session.security_filter().filter_schema(columns);

                let masked_fields: Vec<String> =
                    columns.iter().filter(|c| c.sensitive).map(|c| c.name.clone()).collect();
                let count = columns.len();

                let mut outcome =
                    Outcome::new(json!({ "table": args.table, "columns": columns }))?.with_rows(count);
                if !masked_fields.is_empty() {
                    outcome.notice = Some(SENSITIVE_DATA_NOTICE.to_string());
                }
                outcome.masked_fields = masked_fields;
                Ok(outcome)
            }

            ToolRequest::GetTableIndexes(args) => {
                check_table_name(&args.table)?;
                let indexes = introspect::table_indexes(self.session.client().await?, &args.table).await?;
                let count = indexes.len();
                Outcome::new(json!({ "table": args.table, "indexes": indexes })).map(|o| o.with_rows(count))
            }

            ToolRequest::GetTableComments(args) => {
                check_table_name(&args.table)?;
                let comments = introspect::table_comments(self.session.client().await?, &args.table).await?;
                Outcome::new(comments)
            }

            ToolRequest::SelectQuery(args) => {
                let sql = statement::apply_row_limit(&args.query, args.limit)?;
                debug!(sql = %sql, "Running read statement");
                let result = self.session.client().await?.query(&sql, &[]).await?;
                self.rows_outcome(&args.query, result)
            }

            ToolRequest::InsertData(args) => {
                let (sql, params) = statement::build_insert(&args.table, &args.data)?;
                self.exec_outcome(&sql, &params).await
            }

            ToolRequest::UpdateData(args) => {
                let (sql, params) = statement::build_update(&args.table, &args.data, &args.where_clause)?;
                self.exec_outcome(&sql, &params).await
            }

            ToolRequest::DeleteData(args) => {
                let sql = statement::build_delete(&args.table, &args.where_clause)?;
                self.exec_outcome(&sql, &[]).await
            }

            ToolRequest::ExecuteQuery(args) => match statement::classify(&args.query)? {
                StatementShape::Read => {
                    let result = self.session.client().await?.query(&args.query, &[]).await?;
                    self.rows_outcome(&args.query, result)
                }
                StatementShape::Write => self.exec_outcome(&args.query, &[]).await,
            },
        }
    }

    async fn exec_outcome(&mut self, sql: &str, params: &[Value]) -> Result<Outcome> {
        debug!(sql, params = params.len(), "Running write statement");
        let result = self.session.client().await?.execute(sql, params).await?;
        info!(
            environment = %self.session.active().id,
            rows_affected = result.rows_affected,
            "Write executed"
        );
        Outcome::new(result)
    }

    /// Redact a row-returning result and attach the advisory note
    fn rows_outcome(&self, sql: &str, result: QueryResult) -> Result<Outcome> {
        let QueryResult { columns, rows } = result;
        let columns = if columns.is_empty() { column_names(&rows) } else { columns };

        let filter = self.session.security_filter();
        let masked_fields = filter.sensitive_fields(columns.iter());
        let rows = filter.filter_rows(rows);
        let count = rows.len();

        let mut outcome = Outcome::new(json!({ "columns": columns, "rows": rows }))?.with_rows(count);
        if filter.is_active() && (!masked_fields.is_empty() || filter.would_touch_sensitive_data(sql)) {
            outcome.notice = Some(SENSITIVE_DATA_NOTICE.to_string());
        }
        if !masked_fields.is_empty() {
            debug!(fields = ?masked_fields, "Masked sensitive fields");
        }
        outcome.masked_fields = masked_fields;
        Ok(outcome)
    }
}

enum Admission {
    Run(ToolRequest),
    Confirm(ConfirmationEnvelope),
}

/// Reject statements whose shape does not fit the tool or the tier
fn guard_shape(request: &ToolRequest, tier: PermissionTier, environment: &str) -> Result<()> {
    let Some(sql) = request.statement() else {
        return Ok(());
    };

    let shape = statement::classify(sql)?;
    match (request.kind(), shape) {
        (ToolKind::SelectQuery, StatementShape::Write) if tier == PermissionTier::ReadOnly => {
            warn!(environment, "Write-shaped statement blocked by read-only tier");
            Err(GateError::production_protection(format!(
                "Write-shaped statements are blocked in environment '{environment}' (tier: {tier})"
            )))
        }
        (ToolKind::SelectQuery, StatementShape::Write) => Err(GateError::invalid_argument(
            "select_query only accepts read-only statements (SELECT, SHOW, DESCRIBE, EXPLAIN); use execute_query",
        )),
        _ => Ok(()),
    }
}

/// Introspection resolves names in the current database only
fn check_table_name(table: &str) -> Result<()> {
    if table.contains('.') {
        return Err(GateError::invalid_argument(format!(
            "Invalid table name '{table}': select the database with use_database instead of qualifying the table"
        )));
    }
    statement::quote_identifier(table).map(|_| ())
}

/// Column names taken from the first row when the client reported none
fn column_names(rows: &[Row]) -> Vec<String> {
    rows.first().map(|row| row.keys().cloned().collect()).unwrap_or_default()
}
