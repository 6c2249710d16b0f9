//! Tool Catalog
//!
//! The closed set of operations exposed to callers. Each tool has a static
//! [`ToolDescriptor`] (category and confirmation flag) and a typed input struct.
//! Requests are parsed into a [`ToolRequest`] variant before anything else happens, so
//! a missing required field fails fast with `InvalidArgument` instead of surfacing at
//! the point of use.
//!
//! Input schemas advertised through `tools/list` are generated from the input structs
//! with `schemars`.

use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GateError, Result};

/// Default row cap for `select_query`
pub const DEFAULT_SELECT_LIMIT: u64 = 100;

/// How a tool interacts with the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Never modifies data
    ReadOnly,
    /// May modify data
    WriteOperation,
    /// Changes gateway state (environment selection), never data
    Administrative,
}

/// Static description of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Wire name of the tool
    pub name: &'static str,
    /// Permission category
    pub category: ToolCategory,
    /// Whether the call must carry `confirm: true` under a confirm-required tier
    pub requires_confirmation: bool,
    /// Description advertised to callers
    pub description: &'static str,
}

/// Every tool the gateway knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SwitchEnvironment,
    ListEnvironments,
    ListDatabases,
    ListTables,
    UseDatabase,
    DescribeTable,
    GetTableIndexes,
    GetTableComments,
    SelectQuery,
    InsertData,
    UpdateData,
    DeleteData,
    ExecuteQuery,
}

const fn read_only(name: &'static str, description: &'static str) -> ToolDescriptor {
    ToolDescriptor { name, category: ToolCategory::ReadOnly, requires_confirmation: false, description }
}

const fn write(name: &'static str, description: &'static str) -> ToolDescriptor {
    ToolDescriptor {
        name,
        category: ToolCategory::WriteOperation,
        requires_confirmation: true,
        description,
    }
}

const fn administrative(name: &'static str, description: &'static str) -> ToolDescriptor {
    ToolDescriptor {
        name,
        category: ToolCategory::Administrative,
        requires_confirmation: false,
        description,
    }
}

const SWITCH_ENVIRONMENT: ToolDescriptor = administrative(
    "switch_environment",
    "Switch the active database environment (e.g. local, staging, production). Closes the current connection and opens a health-checked connection to the target. Always allowed, even from read-only environments. The response reports the new environment's permission tier and whether production data protection is active.",
);
const LIST_ENVIRONMENTS: ToolDescriptor = administrative(
    "list_environments",
    "List the configured environments with their permission tiers and which one is active. Never returns credentials.",
);
const LIST_DATABASES: ToolDescriptor =
    read_only("list_databases", "List databases visible to the active environment's user.");
const LIST_TABLES: ToolDescriptor =
    read_only("list_tables", "List tables and views of the current database with their comments.");
const USE_DATABASE: ToolDescriptor = read_only(
    "use_database",
    "Select the current database for subsequent calls. Reset to the environment default on switch_environment.",
);
const DESCRIBE_TABLE: ToolDescriptor = read_only(
    "describe_table",
    "Describe a table's columns (type, nullability, default, key, comment). In production, sensitive columns report type [SENSITIVE] and are marked sensitive.",
);
const GET_TABLE_INDEXES: ToolDescriptor =
    read_only("get_table_indexes", "List a table's indexes with their ordered columns and uniqueness.");
const GET_TABLE_COMMENTS: ToolDescriptor =
    read_only("get_table_comments", "Read the table comment and every column comment.");
const SELECT_QUERY: ToolDescriptor = read_only(
    "select_query",
    "Run a single read-only statement (SELECT, SHOW, DESCRIBE, EXPLAIN). A LIMIT is appended to unbounded SELECTs. In production, sensitive fields are masked.",
);
const INSERT_DATA: ToolDescriptor = write(
    "insert_data",
    "Insert one row from a column/value mapping. Blocked in read-only environments; requires confirm=true in confirm-required environments.",
);
const UPDATE_DATA: ToolDescriptor = write(
    "update_data",
    "Update rows matching a WHERE condition with a column/value mapping. Blocked in read-only environments; requires confirm=true in confirm-required environments.",
);
const DELETE_DATA: ToolDescriptor = write(
    "delete_data",
    "Delete rows matching a WHERE condition. Blocked in read-only environments; requires confirm=true in confirm-required environments.",
);
const EXECUTE_QUERY: ToolDescriptor = write(
    "execute_query",
    "Execute an arbitrary single statement. Blocked in read-only environments; requires confirm=true in confirm-required environments. Row-returning statements are masked in production.",
);

impl ToolKind {
    /// The full catalog, in advertisement order
    pub const ALL: [Self; 13] = [
        Self::SwitchEnvironment,
        Self::ListEnvironments,
        Self::ListDatabases,
        Self::ListTables,
        Self::UseDatabase,
        Self::DescribeTable,
        Self::GetTableIndexes,
        Self::GetTableComments,
        Self::SelectQuery,
        Self::InsertData,
        Self::UpdateData,
        Self::DeleteData,
        Self::ExecuteQuery,
    ];

    /// Static descriptor of this tool
    #[must_use]
    pub const fn descriptor(self) -> &'static ToolDescriptor {
        match self {
            Self::SwitchEnvironment => &SWITCH_ENVIRONMENT,
            Self::ListEnvironments => &LIST_ENVIRONMENTS,
            Self::ListDatabases => &LIST_DATABASES,
            Self::ListTables => &LIST_TABLES,
            Self::UseDatabase => &USE_DATABASE,
            Self::DescribeTable => &DESCRIBE_TABLE,
            Self::GetTableIndexes => &GET_TABLE_INDEXES,
            Self::GetTableComments => &GET_TABLE_COMMENTS,
            Self::SelectQuery => &SELECT_QUERY,
            Self::InsertData => &INSERT_DATA,
            Self::UpdateData => &UPDATE_DATA,
            Self::DeleteData => &DELETE_DATA,
            Self::ExecuteQuery => &EXECUTE_QUERY,
        }
    }

    /// Wire name of this tool
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Look a tool up by its wire name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// JSON schema of this tool's input
    #[must_use]
    pub fn input_schema(self) -> Value {
        match self {
            Self::SwitchEnvironment => schema_of::<SwitchEnvironmentArgs>(),
            Self::ListEnvironments | Self::ListDatabases | Self::ListTables => schema_of::<NoArgs>(),
            Self::UseDatabase => schema_of::<UseDatabaseArgs>(),
            Self::DescribeTable | Self::GetTableIndexes | Self::GetTableComments => {
                schema_of::<TableArgs>()
            }
            Self::SelectQuery => schema_of::<SelectQueryArgs>(),
            Self::InsertData => schema_of::<InsertDataArgs>(),
            Self::UpdateData => schema_of::<UpdateDataArgs>(),
            Self::DeleteData => schema_of::<DeleteDataArgs>(),
            Self::ExecuteQuery => schema_of::<ExecuteQueryArgs>(),
        }
    }
}

/// Input of tools that take no arguments
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

/// Input of `switch_environment`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SwitchEnvironmentArgs {
    /// Name of the configured environment to activate
    pub environment: String,
}

/// Input of `use_database`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UseDatabaseArgs {
    /// Database to select
    pub database: String,
}

/// Input of the single-table introspection tools
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TableArgs {
    /// Table name in the current database
    pub table: String,
}

fn default_limit() -> u64 {
    DEFAULT_SELECT_LIMIT
}

/// Input of `select_query`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SelectQueryArgs {
    /// A single read-only SQL statement
    pub query: String,
    /// Row cap appended to unbounded SELECTs
    #[serde(default = "default_limit")]
    #[schemars(range(min = 1))]
    pub limit: u64,
}

/// Input of `insert_data`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct InsertDataArgs {
    /// Target table
    pub table: String,
    /// Column name to value mapping of the row to insert
    pub data: Map<String, Value>,
    /// Acknowledge the write (required in confirm-required environments)
    #[serde(default)]
    pub confirm: bool,
}

/// Input of `update_data`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateDataArgs {
    /// Target table
    pub table: String,
    /// Column name to new value mapping
    pub data: Map<String, Value>,
    /// WHERE condition selecting the rows to update (without the WHERE keyword)
    #[serde(rename = "where")]
    pub where_clause: String,
    /// Acknowledge the write (required in confirm-required environments)
    #[serde(default)]
    pub confirm: bool,
}

/// Input of `delete_data`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DeleteDataArgs {
    /// Target table
    pub table: String,
    /// WHERE condition selecting the rows to delete (without the WHERE keyword)
    #[serde(rename = "where")]
    pub where_clause: String,
    /// Acknowledge the write (required in confirm-required environments)
    #[serde(default)]
    pub confirm: bool,
}

/// Input of `execute_query`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecuteQueryArgs {
    /// A single SQL statement
    pub query: String,
    /// Acknowledge the write (required in confirm-required environments)
    #[serde(default)]
    pub confirm: bool,
}

/// A validated tool call
#[derive(Debug, Clone)]
pub enum ToolRequest {
    SwitchEnvironment(SwitchEnvironmentArgs),
    ListEnvironments,
    ListDatabases,
    ListTables,
    UseDatabase(UseDatabaseArgs),
    DescribeTable(TableArgs),
    GetTableIndexes(TableArgs),
    GetTableComments(TableArgs),
    SelectQuery(SelectQueryArgs),
    InsertData(InsertDataArgs),
    UpdateData(UpdateDataArgs),
    DeleteData(DeleteDataArgs),
    ExecuteQuery(ExecuteQueryArgs),
}

impl ToolRequest {
    /// Parse and validate the arguments of `kind`
    ///
    /// Absent or `null` arguments are treated as an empty object.
    ///
    /// # Errors
    /// Returns `InvalidArgument` naming the tool when a required field is missing,
    /// has the wrong type, is blank, or an unknown field is present.
    pub fn parse(kind: ToolKind, arguments: Option<&Value>) -> Result<Self> {
        let args = match arguments {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(value) => value.clone(),
        };

        let request = match kind {
            ToolKind::SwitchEnvironment => Self::SwitchEnvironment(decode(kind, args)?),
            ToolKind::ListEnvironments => decode::<NoArgs>(kind, args).map(|_| Self::ListEnvironments)?,
            ToolKind::ListDatabases => decode::<NoArgs>(kind, args).map(|_| Self::ListDatabases)?,
            ToolKind::ListTables => decode::<NoArgs>(kind, args).map(|_| Self::ListTables)?,
            ToolKind::UseDatabase => Self::UseDatabase(decode(kind, args)?),
            ToolKind::DescribeTable => Self::DescribeTable(decode(kind, args)?),
            ToolKind::GetTableIndexes => Self::GetTableIndexes(decode(kind, args)?),
            ToolKind::GetTableComments => Self::GetTableComments(decode(kind, args)?),
            ToolKind::SelectQuery => Self::SelectQuery(decode(kind, args)?),
            ToolKind::InsertData => Self::InsertData(decode(kind, args)?),
            ToolKind::UpdateData => Self::UpdateData(decode(kind, args)?),
            ToolKind::DeleteData => Self::DeleteData(decode(kind, args)?),
            ToolKind::ExecuteQuery => Self::ExecuteQuery(decode(kind, args)?),
        };

        request.check_required_text()?;
        Ok(request)
    }

    /// Which tool this request targets
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        match self {
            Self::SwitchEnvironment(_) => ToolKind::SwitchEnvironment,
            Self::ListEnvironments => ToolKind::ListEnvironments,
            Self::ListDatabases => ToolKind::ListDatabases,
            Self::ListTables => ToolKind::ListTables,
            Self::UseDatabase(_) => ToolKind::UseDatabase,
            Self::DescribeTable(_) => ToolKind::DescribeTable,
            Self::GetTableIndexes(_) => ToolKind::GetTableIndexes,
            Self::GetTableComments(_) => ToolKind::GetTableComments,
            Self::SelectQuery(_) => ToolKind::SelectQuery,
            Self::InsertData(_) => ToolKind::InsertData,
            Self::UpdateData(_) => ToolKind::UpdateData,
            Self::DeleteData(_) => ToolKind::DeleteData,
            Self::ExecuteQuery(_) => ToolKind::ExecuteQuery,
        }
    }

    /// Whether the call carries an explicit `confirm: true`
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        match self {
            Self::InsertData(args) => args.confirm,
            Self::UpdateData(args) => args.confirm,
            Self::DeleteData(args) => args.confirm,
            Self::ExecuteQuery(args) => args.confirm,
            _ => false,
        }
    }

    /// Raw statement text of the generic statement tools
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::SelectQuery(args) => Some(&args.query),
            Self::ExecuteQuery(args) => Some(&args.query),
            _ => None,
        }
    }

    fn check_required_text(&self) -> Result<()> {
        let fields: Vec<(&str, &str)> = match self {
            Self::SwitchEnvironment(a) => vec![("environment", a.environment.as_str())],
            Self::UseDatabase(a) => vec![("database", a.database.as_str())],
            Self::DescribeTable(a) | Self::GetTableIndexes(a) | Self::GetTableComments(a) => {
                vec![("table", a.table.as_str())]
            }
            Self::SelectQuery(a) => vec![("query", a.query.as_str())],
            Self::InsertData(a) => vec![("table", a.table.as_str())],
            Self::UpdateData(a) => vec![("table", a.table.as_str()), ("where", a.where_clause.as_str())],
            Self::DeleteData(a) => vec![("table", a.table.as_str()), ("where", a.where_clause.as_str())],
            Self::ExecuteQuery(a) => vec![("query", a.query.as_str())],
            Self::ListEnvironments | Self::ListDatabases | Self::ListTables => Vec::new(),
        };

        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(GateError::invalid_argument(format!(
                "{}: '{field}' must not be empty",
                self.kind().name()
            ))),
            None => Ok(()),
        }
    }
}

fn decode<T: DeserializeOwned>(kind: ToolKind, args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| GateError::invalid_argument(format!("{}: {e}", kind.name())))
}

fn schema_of<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object.entry("properties").or_insert_with(|| Value::Object(Map::new()));
    }
    value
}

/// Tool definitions for `tools/list`
#[must_use]
pub fn tool_definitions() -> Vec<Value> {
    ToolKind::ALL
        .into_iter()
        .map(|kind| {
            serde_json::json!({
                "name": kind.name(),
                "description": kind.descriptor().description,
                "inputSchema": kind.input_schema(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("drop_everything"), None);
    }

    #[test]
    fn test_catalog_categories() {
        assert_eq!(ToolKind::SwitchEnvironment.descriptor().category, ToolCategory::Administrative);
        assert_eq!(ToolKind::SelectQuery.descriptor().category, ToolCategory::ReadOnly);
        for kind in [ToolKind::InsertData, ToolKind::UpdateData, ToolKind::DeleteData, ToolKind::ExecuteQuery] {
            let descriptor = kind.descriptor();
            assert_eq!(descriptor.category, ToolCategory::WriteOperation);
            assert!(descriptor.requires_confirmation);
        }
    }

    #[test]
    fn test_parse_select_query_defaults_limit() {
        let request = ToolRequest::parse(ToolKind::SelectQuery, Some(&json!({"query": "SELECT 1"}))).unwrap();
        match request {
            ToolRequest::SelectQuery(args) => assert_eq!(args.limit, DEFAULT_SELECT_LIMIT),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_required_field() {
        let err = ToolRequest::parse(ToolKind::DeleteData, Some(&json!({"table": "users"}))).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
        assert!(err.message().contains("delete_data"));
        assert!(err.message().contains("where"));
    }

    #[test]
    fn test_parse_blank_required_field() {
        let err = ToolRequest::parse(ToolKind::DescribeTable, Some(&json!({"table": "  "}))).unwrap_err();
        assert!(err.message().contains("'table' must not be empty"));
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let err = ToolRequest::parse(ToolKind::ListTables, Some(&json!({"schema": "x"}))).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_parse_no_arguments() {
        assert!(matches!(ToolRequest::parse(ToolKind::ListDatabases, None).unwrap(), ToolRequest::ListDatabases));
        assert!(matches!(
            ToolRequest::parse(ToolKind::ListTables, Some(&Value::Null)).unwrap(),
            ToolRequest::ListTables
        ));
    }

    #[test]
    fn test_confirmation_flag() {
        let request = ToolRequest::parse(
            ToolKind::DeleteData,
            Some(&json!({"table": "users", "where": "id = 42"})),
        )
        .unwrap();
        assert!(!request.is_confirmed());

        let request = ToolRequest::parse(
            ToolKind::DeleteData,
            Some(&json!({"table": "users", "where": "id = 42", "confirm": true})),
        )
        .unwrap();
        assert!(request.is_confirmed());
    }

    #[test]
    fn test_confirm_must_be_boolean() {
        let err = ToolRequest::parse(
            ToolKind::ExecuteQuery,
            Some(&json!({"query": "DELETE FROM t", "confirm": "yes"})),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_tool_definitions() {
        let definitions = tool_definitions();
        assert_eq!(definitions.len(), ToolKind::ALL.len());

        let update = definitions.iter().find(|d| d["name"] == "update_data").unwrap();
        let schema = &update["inputSchema"];
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["where"].is_object());
        let required: Vec<&str> =
            schema["required"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
        assert!(required.contains(&"table"));
        assert!(required.contains(&"where"));
        assert!(!required.contains(&"confirm"));

        let list = definitions.iter().find(|d| d["name"] == "list_tables").unwrap();
        assert!(list["inputSchema"]["properties"].is_object());
    }
}
